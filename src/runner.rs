//! External tool invocation.
//!
//! Every mutating step of the pipeline is a call to an external program. The
//! pipeline only builds [`ToolInvocation`]s; a [`ToolRunner`] executes them and
//! judges them by exit status alone.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{MkabookError, Result};
use crate::output::DisplayOptions;

const SPINNER_FRAMES: &[&str] = &["▖", "▘", "▝", "▗", "✓"];
const SPINNER_TICK: Duration = Duration::from_millis(250);

/// The external steps an item can go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Merge several input files into one stream (stream copy)
    Concatenate,
    /// Re-encode (or copy) the merged stream with the chosen codec
    Transcode,
    /// Build the final container with chapters and cover
    Mux,
    /// Rewrite chapters of an existing container in place
    EditMetadata,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Concatenate => "Merging audio tracks",
            Step::Transcode => "Converting Audio",
            Step::Mux => "Merging MKV Meta-data",
            Step::EditMetadata => "Updating MKV Meta-data",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Program names for the external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub mkvmerge: String,
    pub mkvpropedit: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            mkvmerge: "mkvmerge".to_string(),
            mkvpropedit: "mkvpropedit".to_string(),
        }
    }
}

impl ToolPaths {
    /// Defaults overridden by `MKABOOK_FFMPEG`, `MKABOOK_MKVMERGE` and `MKABOOK_MKVPROPEDIT`
    pub fn from_env() -> Self {
        let mut paths = Self::default();

        if let Ok(ffmpeg) = std::env::var("MKABOOK_FFMPEG") {
            paths.ffmpeg = ffmpeg;
        }
        if let Ok(mkvmerge) = std::env::var("MKABOOK_MKVMERGE") {
            paths.mkvmerge = mkvmerge;
        }
        if let Ok(mkvpropedit) = std::env::var("MKABOOK_MKVPROPEDIT") {
            paths.mkvpropedit = mkvpropedit;
        }

        paths
    }
}

/// One external program call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub step: Step,
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(step: Step, program: impl Into<String>) -> Self {
        Self {
            step,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Executes external tool invocations
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs the invocation to completion.
    ///
    /// A non-zero exit status is reported as
    /// [`MkabookError::ExternalToolFailure`] carrying the captured stderr.
    async fn run(&self, invocation: &ToolInvocation, display: &DisplayOptions) -> Result<()>;
}

/// Runs tools as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn spinner(msg: String) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("[{spinner:.cyan}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_FRAMES),
        );
        spinner.set_message(msg);
        spinner.enable_steady_tick(SPINNER_TICK);
        spinner
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn run(&self, invocation: &ToolInvocation, display: &DisplayOptions) -> Result<()> {
        let label = invocation.step.label();
        debug!("🔧 {}", invocation.command_line());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if display.verbose {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::piped());
        }

        let spinner = if display.show_spinner() {
            Some(Self::spinner(display.tag(label)))
        } else {
            display.progress(label);
            None
        };

        let child = command.spawn();
        let output = match child {
            Ok(child) => child.wait_with_output().await,
            Err(e) => Err(e),
        };

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let output = output.map_err(|e| {
            display.fail(label);
            MkabookError::ExternalToolFailure {
                step: invocation.step,
                program: invocation.program.clone(),
                exit_status: None,
                diagnostics: format!("could not run {}: {}", invocation.program, e),
            }
        })?;

        if output.status.success() {
            display.good(label);
            return Ok(());
        }

        display.fail(label);
        let diagnostics = String::from_utf8_lossy(&output.stderr).to_string();
        for line in diagnostics.lines() {
            error!("\t{}", line);
        }

        Err(MkabookError::ExternalToolFailure {
            step: invocation.step,
            program: invocation.program.clone(),
            exit_status: output.status.code(),
            diagnostics,
        })
    }
}
