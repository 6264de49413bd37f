use std::path::Path;

use crate::runner::{Step, ToolInvocation};

/// Builds mkvmerge / mkvpropedit calls
#[derive(Debug, Clone)]
pub struct ContainerMuxer {
    mkvmerge: String,
    mkvpropedit: String,
}

impl ContainerMuxer {
    pub fn new(mkvmerge: impl Into<String>, mkvpropedit: impl Into<String>) -> Self {
        Self {
            mkvmerge: mkvmerge.into(),
            mkvpropedit: mkvpropedit.into(),
        }
    }

    /// Create `output` from `audio`, optionally adding chapters and a cover attachment
    pub fn mux(
        &self,
        audio: &Path,
        chapters: Option<&Path>,
        cover: Option<&Path>,
        output: &Path,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(Step::Mux, &self.mkvmerge)
            .arg("-o")
            .path_arg(output);

        if let Some(chapters) = chapters {
            invocation = invocation.arg("--chapters").path_arg(chapters);
        }

        if let Some(cover) = cover {
            invocation = invocation
                .args(["--attachment-description", "Cover", "--attach-file"])
                .path_arg(cover);
        }

        invocation.path_arg(audio)
    }

    /// Replace the chapters of an existing container in place
    pub fn replace_chapters(&self, target: &Path, chapters: &Path) -> ToolInvocation {
        ToolInvocation::new(Step::EditMetadata, &self.mkvpropedit)
            .path_arg(target)
            .arg("--chapters")
            .path_arg(chapters)
    }
}

impl Default for ContainerMuxer {
    fn default() -> Self {
        Self::new("mkvmerge", "mkvpropedit")
    }
}
