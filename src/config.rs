use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::discovery::{self, CHAPTERS_SEARCH_ITEMS, COVER_SEARCH_ITEMS};
use crate::error::{MkabookError, Result};
use crate::output::DisplayOptions;

/// Extension of the produced audiobook container
pub const CONTAINER_EXTENSION: &str = "mka";

/// Per-directory configuration files, probed in order
pub const PERSISTED_CONFIG_FILES: &[&str] = &["config.toml", "config.json"];

/// Audio codec for the final audio track
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// Keep the source stream, no re-encoding
    Copy,
    Aac,
    #[default]
    #[value(name = "libfdk_aac")]
    LibfdkAac,
    Flac,
    Mp3,
}

impl Codec {
    /// Encoder name understood by ffmpeg's `-acodec`
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Codec::Copy => "copy",
            Codec::Aac => "aac",
            Codec::LibfdkAac => "libfdk_aac",
            Codec::Flac => "flac",
            Codec::Mp3 => "mp3",
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, Codec::Copy)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// Effective configuration for one item, fixed before the pipeline starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemConfig {
    /// Input audio, never empty once resolved
    pub input_files: Vec<PathBuf>,

    /// Codec for the audio track
    pub codec: Codec,

    /// Target bitrate handed to ffmpeg (`-b:a`), e.g. `64k`
    pub bitrate: Option<String>,

    /// Cover image attached to the container
    pub cover_file: Option<PathBuf>,

    /// Chapter definitions, text or XML
    pub chapter_file: Option<PathBuf>,

    /// Convert non-XML chapter files to chapter XML before muxing
    pub convert_text_chapters: bool,

    /// Emit real sub-chapters instead of tab-indented titles
    pub use_sub_chapters: bool,

    /// Final audiobook path
    pub output_file: PathBuf,
}

/// Shape of the per-directory `config.toml` / `config.json`.
///
/// Every key is optional; missing keys fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedConfig {
    pub input_files: Option<Vec<PathBuf>>,
    pub codec: Option<Codec>,
    pub bitrate: Option<String>,
    pub cover_file: Option<PathBuf>,
    pub chapter_file: Option<PathBuf>,
    pub convert_text_chapters: Option<bool>,
    pub use_sub_chapters: Option<bool>,
    pub output_file: Option<PathBuf>,
}

impl PersistedConfig {
    /// Load the first configuration file present in `dir`
    pub async fn load(dir: &Path) -> Result<Option<(PathBuf, Self)>> {
        for name in PERSISTED_CONFIG_FILES {
            let path = dir.join(name);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let config = Self::parse(&path, &content)?;
            return Ok(Some((path, config)));
        }

        Ok(None)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let parsed = if path.extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| MkabookError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Resolve relative paths against the directory holding the file
    fn relative_to(mut self, dir: &Path) -> Self {
        self.input_files = self
            .input_files
            .map(|files| files.iter().map(|f| dir.join(f)).collect());
        self.cover_file = self.cover_file.map(|p| dir.join(p));
        self.chapter_file = self.chapter_file.map(|p| dir.join(p));
        self.output_file = self.output_file.map(|p| dir.join(p));
        self
    }
}

/// Explicit per-run choices that beat persisted configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOverrides {
    pub codec: Option<Codec>,
    pub cover_file: Option<PathBuf>,
    pub chapter_file: Option<PathBuf>,
    pub use_sub_chapters: Option<bool>,
}

impl ItemOverrides {
    /// Only values that were actually given replace lower layers
    fn apply(&self, layer: &mut PersistedConfig, work_dir: &Path) {
        if let Some(codec) = self.codec {
            layer.codec = Some(codec);
        }
        if let Some(ref cover) = self.cover_file {
            layer.cover_file = Some(work_dir.join(cover));
        }
        if let Some(ref chapters) = self.chapter_file {
            layer.chapter_file = Some(work_dir.join(chapters));
        }
        if let Some(use_sub_chapters) = self.use_sub_chapters {
            layer.use_sub_chapters = Some(use_sub_chapters);
        }
    }
}

/// What the caller asked for, shared by every item of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Output file, or directory receiving `<item>.mka`
    pub output: PathBuf,
    /// Skip the per-directory configuration file
    pub ignore_config: bool,
    /// Only rewrite metadata of an existing output
    pub update_metadata: bool,
    /// Skip items whose output already exists
    pub diff_only: bool,
    pub overrides: ItemOverrides,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("."),
            ignore_config: false,
            update_metadata: false,
            diff_only: false,
            overrides: ItemOverrides::default(),
        }
    }
}

/// An item with its configuration fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    /// Directory inputs, cover and chapters are searched in
    pub work_dir: PathBuf,
    pub config: ItemConfig,
}

impl ResolvedItem {
    /// Merge defaults, persisted configuration and overrides for `input`,
    /// then probe for cover and chapter files.
    ///
    /// `input` is either an item directory or a single audio file.
    pub async fn resolve(
        input: &Path,
        options: &RunOptions,
        display: &DisplayOptions,
    ) -> Result<Self> {
        let mut item = Self::resolve_inputs(input, options, display).await?;
        item.probe_assets(display);
        Ok(item)
    }

    /// Everything up to input and output paths. Cover and chapters are only
    /// set when configured explicitly; see [`ResolvedItem::probe_assets`].
    pub async fn resolve_inputs(
        input: &Path,
        options: &RunOptions,
        display: &DisplayOptions,
    ) -> Result<Self> {
        let metadata = tokio::fs::metadata(input)
            .await
            .map_err(|source| MkabookError::InputUnavailable {
                path: input.to_path_buf(),
                source,
            })?;
        let (work_dir, explicit_input) = if metadata.is_dir() {
            (input.to_path_buf(), None)
        } else {
            let parent = match input.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (parent, Some(tokio::fs::canonicalize(input).await?))
        };
        let work_dir = tokio::fs::canonicalize(&work_dir).await?;

        let mut layer = PersistedConfig::default();
        if !options.ignore_config {
            match PersistedConfig::load(&work_dir).await {
                Ok(Some((path, persisted))) => {
                    debug!("📄 Loaded configuration from: {}", path.display());
                    display.good(&format!(
                        "Loaded {} values",
                        path.file_name().unwrap_or_default().to_string_lossy()
                    ));
                    layer = persisted.relative_to(&work_dir);
                }
                Ok(None) => {}
                Err(e) if e.is_recoverable() => {
                    display.warn(&format!("{}. Continuing with defaults", e));
                }
                Err(e) => return Err(e),
            }
        }

        options.overrides.apply(&mut layer, &work_dir);
        if let Some(file) = explicit_input {
            layer.input_files = Some(vec![file]);
        }

        let output_file = match layer.output_file.take() {
            Some(output_file) => output_file,
            None => default_output_file(&options.output, &work_dir).await,
        };

        let input_files = match layer.input_files.take() {
            Some(files) if !files.is_empty() => files,
            _ => discovery::discover_audio_files(&work_dir, Some(&output_file))?,
        };
        match input_files.len() {
            0 => {
                display.fail("Could not find any input audio files");
                return Err(MkabookError::NoInputFilesFound { dir: work_dir });
            }
            1 => display.good(&format!("Input Audio: {}", input_files[0].display())),
            _ => display.good(&format!("Merging Input Audio: {:?}", input_files)),
        }
        display.good(&format!("Output to: {}", output_file.display()));

        let config = ItemConfig {
            input_files,
            codec: layer.codec.unwrap_or_default(),
            bitrate: layer.bitrate,
            cover_file: layer.cover_file,
            chapter_file: layer.chapter_file,
            convert_text_chapters: layer.convert_text_chapters.unwrap_or(true),
            use_sub_chapters: layer.use_sub_chapters.unwrap_or(false),
            output_file,
        };

        Ok(Self { work_dir, config })
    }

    /// Look for cover and chapter files in the work dir when none are configured
    pub fn probe_assets(&mut self, display: &DisplayOptions) {
        if self.config.cover_file.is_none() {
            let found = discovery::find_first_file(&self.work_dir, COVER_SEARCH_ITEMS);
            match found {
                Some(ref cover) => display.good(&format!("Using cover: {}", cover.display())),
                None => display.warn("No cover found"),
            }
            self.config.cover_file = found;
        }

        if self.config.chapter_file.is_none() {
            let found = discovery::find_first_file(&self.work_dir, CHAPTERS_SEARCH_ITEMS);
            match found {
                Some(ref chapters) => {
                    display.good(&format!("Using chapters: {}", chapters.display()))
                }
                None => display.warn("No chapter info found"),
            }
            self.config.chapter_file = found;
        }
    }
}

/// Output path when no configuration names one.
///
/// An existing regular file is used as-is; anything else is a directory that
/// receives `<work dir name>.mka`.
pub async fn default_output_file(target: &Path, work_dir: &Path) -> PathBuf {
    let is_file = tokio::fs::metadata(target)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if is_file {
        return target.to_path_buf();
    }

    let name = work_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "audiobook".to_string());
    target.join(format!("{}.{}", name, CONTAINER_EXTENSION))
}
