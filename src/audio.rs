use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Codec;
use crate::error::Result;
use crate::runner::{Step, ToolInvocation};

/// Builds ffmpeg calls for merging and transcoding input audio
#[derive(Debug, Clone)]
pub struct AudioTranscoder {
    ffmpeg: String,
}

impl AudioTranscoder {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// ffmpeg concat demuxer manifest listing `inputs` in path order.
    ///
    /// Order is lexicographic by path, not natural track order.
    pub fn concat_manifest(inputs: &[PathBuf]) -> String {
        let mut sorted: Vec<&PathBuf> = inputs.iter().collect();
        sorted.sort();

        sorted
            .into_iter()
            .map(|input| format!("file '{}'\n", escape_concat_path(input)))
            .collect()
    }

    /// Write the concat manifest for `inputs` to `path`
    pub async fn write_concat_manifest(&self, inputs: &[PathBuf], path: &Path) -> Result<()> {
        tokio::fs::write(path, Self::concat_manifest(inputs)).await?;
        debug!("📝 Wrote concat list with {} files: {}", inputs.len(), path.display());
        Ok(())
    }

    /// Merge the files listed in `manifest` into `output` without re-encoding
    pub fn concat(&self, manifest: &Path, output: &Path) -> ToolInvocation {
        ToolInvocation::new(Step::Concatenate, &self.ffmpeg)
            .args(["-nostdin", "-f", "concat", "-safe", "0", "-i"])
            .path_arg(manifest)
            .args(["-c", "copy"])
            .path_arg(output)
    }

    /// Encode `input` with `codec` into `output`.
    ///
    /// `copy` is a plain stream copy and ignores `bitrate`.
    pub fn transcode(
        &self,
        input: &Path,
        codec: Codec,
        bitrate: Option<&str>,
        output: &Path,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(Step::Transcode, &self.ffmpeg)
            .args(["-nostdin", "-i"])
            .path_arg(input)
            .args(["-acodec", codec.ffmpeg_name()]);

        if let (false, Some(bitrate)) = (codec.is_copy(), bitrate) {
            invocation = invocation.args(["-b:a", bitrate]);
        }

        invocation.path_arg(output)
    }
}

impl Default for AudioTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Quote a path for a single-quoted concat manifest entry
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_manifest_is_sorted() {
        let inputs = vec![
            PathBuf::from("/books/Dune/10.mp3"),
            PathBuf::from("/books/Dune/02.mp3"),
            PathBuf::from("/books/Dune/01.mp3"),
        ];

        assert_eq!(
            AudioTranscoder::concat_manifest(&inputs),
            "file '/books/Dune/01.mp3'\nfile '/books/Dune/02.mp3'\nfile '/books/Dune/10.mp3'\n"
        );
    }

    #[test]
    fn test_concat_manifest_escapes_quotes() {
        let inputs = vec![PathBuf::from("/books/Ender's Game/01.mp3")];
        assert_eq!(
            AudioTranscoder::concat_manifest(&inputs),
            "file '/books/Ender'\\''s Game/01.mp3'\n"
        );
    }

    #[test]
    fn test_concat_invocation() {
        let transcoder = AudioTranscoder::default();
        let invocation = transcoder.concat(Path::new("/tmp/w/concat.txt"), Path::new("/tmp/w/concat.mka"));

        assert_eq!(invocation.step, Step::Concatenate);
        assert_eq!(
            invocation.command_line(),
            "ffmpeg -nostdin -f concat -safe 0 -i /tmp/w/concat.txt -c copy /tmp/w/concat.mka"
        );
    }

    #[test]
    fn test_transcode_with_bitrate() {
        let transcoder = AudioTranscoder::new("/opt/ffmpeg/bin/ffmpeg");
        let invocation = transcoder.transcode(
            Path::new("in.mp3"),
            Codec::LibfdkAac,
            Some("64k"),
            Path::new("out.mka"),
        );

        assert_eq!(invocation.program, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(
            invocation.args,
            vec!["-nostdin", "-i", "in.mp3", "-acodec", "libfdk_aac", "-b:a", "64k", "out.mka"]
        );
    }

    #[test]
    fn test_copy_ignores_bitrate() {
        let invocation = AudioTranscoder::default().transcode(
            Path::new("in.m4b"),
            Codec::Copy,
            Some("64k"),
            Path::new("out.mka"),
        );
        assert_eq!(
            invocation.args,
            vec!["-nostdin", "-i", "in.m4b", "-acodec", "copy", "out.mka"]
        );
    }

    #[tokio::test]
    async fn test_write_concat_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("concat.txt");
        let inputs = vec![PathBuf::from("/b.mp3"), PathBuf::from("/a.mp3")];

        AudioTranscoder::default()
            .write_concat_manifest(&inputs, &path)
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "file '/a.mp3'\nfile '/b.mp3'\n");
    }
}
