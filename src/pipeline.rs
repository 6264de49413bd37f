//! Per-item state machine: skip check, convert, or metadata update.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::audio::AudioTranscoder;
use crate::chapters::{self, ChapterLayout};
use crate::config::{Codec, ItemConfig, ResolvedItem, RunOptions};
use crate::error::{MkabookError, Result};
use crate::mux::ContainerMuxer;
use crate::output::DisplayOptions;
use crate::runner::{ToolPaths, ToolRunner};

/// Prefix for per-item scratch directories
pub const WORKSPACE_PREFIX: &str = "mkabook";

const CONCAT_LIST: &str = "concat.txt";
const CONCAT_AUDIO: &str = "concat.mka";
const CONVERTED_AUDIO: &str = "converted.mka";
const CONVERTED_CHAPTERS: &str = "chapters.xml";

/// Final state of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineOutcome {
    Converted {
        codec: Codec,
        has_chapters: bool,
        has_cover: bool,
    },
    Updated {
        has_chapters: bool,
        has_cover: bool,
    },
    Skipped,
    Failed {
        cause: String,
    },
}

impl PipelineOutcome {
    /// Failure outcome carrying the error and any captured tool output
    pub fn failed(err: &MkabookError) -> Self {
        let cause = match err.diagnostics() {
            Some(diagnostics) => format!("{}\n{}", err, diagnostics.trim_end()),
            None => err.to_string(),
        };
        Self::Failed { cause }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converted {
                codec,
                has_chapters,
                has_cover,
            } => write!(
                f,
                "Converted\n\tCodec: {}\n\tChapters: {}\n\tCover: {}\n\tTags: No",
                codec,
                yes_no(*has_chapters),
                yes_no(*has_cover)
            ),
            Self::Updated {
                has_chapters,
                has_cover,
            } => write!(
                f,
                "Updated\n\tChapters: {}\n\tCover: {}\n\tTags: No",
                yes_no(*has_chapters),
                yes_no(*has_cover)
            ),
            Self::Skipped => f.write_str("Already exists, nothing to do"),
            Self::Failed { cause } => {
                f.write_str("An Error Occurred")?;
                for line in cause.lines() {
                    write!(f, "\n\t{}", line)?;
                }
                Ok(())
            }
        }
    }
}

/// Which branch an item takes once its configuration is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Skip,
    Convert,
    UpdateMetadata,
}

impl PipelineState {
    /// Metadata update wins over the skip check; an absent output always converts
    pub fn plan(options: &RunOptions, output_exists: bool) -> Self {
        match (output_exists, options.update_metadata, options.diff_only) {
            (true, true, _) => Self::UpdateMetadata,
            (true, false, true) => Self::Skip,
            _ => Self::Convert,
        }
    }
}

/// Runs one item from resolved configuration to a finished audiobook
pub struct ItemPipeline {
    runner: Arc<dyn ToolRunner>,
    transcoder: AudioTranscoder,
    muxer: ContainerMuxer,
}

impl ItemPipeline {
    pub fn new(runner: Arc<dyn ToolRunner>, tools: &ToolPaths) -> Self {
        debug!("🔧 Using {} tool runner", runner.name());
        Self {
            runner,
            transcoder: AudioTranscoder::new(tools.ffmpeg.clone()),
            muxer: ContainerMuxer::new(tools.mkvmerge.clone(), tools.mkvpropedit.clone()),
        }
    }

    /// Resolve configuration for `input` and process it.
    ///
    /// Cover and chapter probes run only once the item is known not to be skipped.
    pub async fn run(
        &self,
        input: &Path,
        options: &RunOptions,
        display: &DisplayOptions,
    ) -> Result<PipelineOutcome> {
        let (state, item) = Self::prepare(input, options, display).await?;
        self.dispatch(state, &item.config, display).await
    }

    /// Resolve `input` and pick its branch without running any tool
    pub async fn prepare(
        input: &Path,
        options: &RunOptions,
        display: &DisplayOptions,
    ) -> Result<(PipelineState, ResolvedItem)> {
        let mut item = ResolvedItem::resolve_inputs(input, options, display).await?;
        let state = plan_item(&item, options).await?;
        if state != PipelineState::Skip {
            item.probe_assets(display);
        }
        Ok((state, item))
    }

    /// Process an item whose configuration is already resolved
    pub async fn process(
        &self,
        item: &ResolvedItem,
        options: &RunOptions,
        display: &DisplayOptions,
    ) -> Result<PipelineOutcome> {
        let state = plan_item(item, options).await?;
        self.dispatch(state, &item.config, display).await
    }

    async fn dispatch(
        &self,
        state: PipelineState,
        config: &ItemConfig,
        display: &DisplayOptions,
    ) -> Result<PipelineOutcome> {
        match state {
            PipelineState::Skip => {
                display.good(&format!(
                    "Output already exists: {}",
                    config.output_file.display()
                ));
                Ok(PipelineOutcome::Skipped)
            }
            PipelineState::UpdateMetadata => self.update_metadata(config, display).await,
            PipelineState::Convert => self.convert(config, display).await,
        }
    }

    async fn convert(&self, config: &ItemConfig, display: &DisplayOptions) -> Result<PipelineOutcome> {
        let workspace = create_workspace()?;
        let chapters = prepare_chapters(config, workspace.path(), display).await?;

        let merged = if config.input_files.len() > 1 {
            let manifest = workspace.path().join(CONCAT_LIST);
            let merged = workspace.path().join(CONCAT_AUDIO);
            self.transcoder
                .write_concat_manifest(&config.input_files, &manifest)
                .await?;
            self.runner
                .run(&self.transcoder.concat(&manifest, &merged), display)
                .await?;
            merged
        } else {
            match config.input_files.first() {
                Some(input) => input.clone(),
                None => {
                    return Err(MkabookError::NoInputFilesFound {
                        dir: workspace.path().to_path_buf(),
                    })
                }
            }
        };

        let converted = workspace.path().join(CONVERTED_AUDIO);
        let transcode = self.transcoder.transcode(
            &merged,
            config.codec,
            config.bitrate.as_deref(),
            &converted,
        );
        self.runner.run(&transcode, display).await?;

        if let Some(parent) = config.output_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mux = self.muxer.mux(
            &converted,
            chapters.as_deref(),
            config.cover_file.as_deref(),
            &config.output_file,
        );
        self.runner.run(&mux, display).await?;

        info!("💾 Wrote {}", config.output_file.display());
        Ok(PipelineOutcome::Converted {
            codec: config.codec,
            has_chapters: chapters.is_some(),
            has_cover: config.cover_file.is_some(),
        })
    }

    async fn update_metadata(
        &self,
        config: &ItemConfig,
        display: &DisplayOptions,
    ) -> Result<PipelineOutcome> {
        let workspace = create_workspace()?;
        let Some(chapters) = prepare_chapters(config, workspace.path(), display).await? else {
            display.good("No metadata to update");
            return Ok(PipelineOutcome::Skipped);
        };

        let edit = self.muxer.replace_chapters(&config.output_file, &chapters);
        self.runner.run(&edit, display).await?;

        Ok(PipelineOutcome::Updated {
            has_chapters: true,
            has_cover: false,
        })
    }
}

/// Branch for `item`. A failed stat of the output is an error, not "absent".
async fn plan_item(item: &ResolvedItem, options: &RunOptions) -> Result<PipelineState> {
    let output_exists = tokio::fs::try_exists(&item.config.output_file).await?;
    Ok(PipelineState::plan(options, output_exists))
}

/// Scratch directory removed when the returned handle drops
fn create_workspace() -> Result<TempDir> {
    let workspace = tempfile::Builder::new()
        .prefix(WORKSPACE_PREFIX)
        .tempdir()?;
    debug!("📁 Workspace: {}", workspace.path().display());
    Ok(workspace)
}

/// Chapter file to hand to mkvtoolnix, converting text definitions when enabled
async fn prepare_chapters(
    config: &ItemConfig,
    workspace: &Path,
    display: &DisplayOptions,
) -> Result<Option<PathBuf>> {
    let Some(ref source) = config.chapter_file else {
        return Ok(None);
    };

    let is_xml = source
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("xml"));
    if is_xml || !config.convert_text_chapters {
        return Ok(Some(source.clone()));
    }

    let tree = match chapters::parse_chapter_file(source).await {
        Ok(tree) => tree,
        Err(e) => {
            display.fail("Converting chapters file");
            return Err(e);
        }
    };

    let target = workspace.join(CONVERTED_CHAPTERS);
    let layout = ChapterLayout::from_sub_chapters(config.use_sub_chapters);
    chapters::write_chapter_xml(&tree, layout, &target).await?;
    display.good(&format!("Converted {} chapters to XML", tree.len()));

    Ok(Some(target))
}
