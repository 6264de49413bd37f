//! In-memory tool runner for exercising pipelines without ffmpeg or mkvtoolnix.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{MkabookError, Result};
use crate::output::DisplayOptions;
use crate::runner::{Step, ToolInvocation, ToolRunner};

#[derive(Debug, Clone)]
struct FailureRule {
    step: Step,
    /// Only fail invocations with an argument containing this text
    matching: Option<String>,
}

impl FailureRule {
    fn matches(&self, invocation: &ToolInvocation) -> bool {
        self.step == invocation.step
            && self
                .matching
                .as_ref()
                .map_or(true, |needle| invocation.args.iter().any(|a| a.contains(needle)))
    }
}

/// Records every invocation and succeeds unless told otherwise.
///
/// The `--chapters` document of a [`Step::Mux`] or [`Step::EditMetadata`]
/// call is read while the call runs, before the item workspace is removed.
/// A successful [`Step::Mux`] writes an empty file at the `-o` target so a
/// later run sees the output as existing.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    chapter_documents: Mutex<Vec<(Step, String)>>,
    failures: Mutex<Vec<FailureRule>>,
    panics: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every invocation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every invocation of `step`
    pub fn fail_step(self, step: Step) -> Self {
        self.push_failure(step, None)
    }

    /// Fail invocations of `step` whose arguments mention `matching`
    pub fn fail_step_matching(self, step: Step, matching: &str) -> Self {
        self.push_failure(step, Some(matching.to_string()))
    }

    /// Panic inside any invocation whose arguments mention `matching`
    pub fn panic_matching(self, matching: &str) -> Self {
        if let Ok(mut panics) = self.panics.lock() {
            panics.push(matching.to_string());
        }
        self
    }

    fn push_failure(self, step: Step, matching: Option<String>) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(FailureRule { step, matching });
        }
        self
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Chapter XML passed to the muxer or metadata editor, in call order
    pub fn chapter_documents(&self) -> Vec<(Step, String)> {
        self.chapter_documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.invocations().iter().map(|call| call.step).collect()
    }

    pub fn count(&self, step: Step) -> usize {
        self.invocations().iter().filter(|call| call.step == step).count()
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self, invocation: &ToolInvocation, display: &DisplayOptions) -> Result<()> {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(invocation.clone());
        }

        if matches!(invocation.step, Step::Mux | Step::EditMetadata) {
            let chapters = invocation
                .args
                .iter()
                .position(|a| a == "--chapters")
                .and_then(|i| invocation.args.get(i + 1));
            if let Some(chapters) = chapters {
                if let Ok(xml) = tokio::fs::read_to_string(chapters).await {
                    if let Ok(mut docs) = self.chapter_documents.lock() {
                        docs.push((invocation.step, xml));
                    }
                }
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let should_panic = self
            .panics
            .lock()
            .map(|panics| {
                panics
                    .iter()
                    .any(|needle| invocation.args.iter().any(|a| a.contains(needle)))
            })
            .unwrap_or(false);
        if should_panic {
            panic!("simulated crash in {}", invocation.program);
        }

        let should_fail = self
            .failures
            .lock()
            .map(|rules| rules.iter().any(|rule| rule.matches(invocation)))
            .unwrap_or(false);
        if should_fail {
            display.fail(invocation.step.label());
            return Err(MkabookError::ExternalToolFailure {
                step: invocation.step,
                program: invocation.program.clone(),
                exit_status: Some(1),
                diagnostics: format!("simulated {} failure", invocation.program),
            });
        }

        if invocation.step == Step::Mux {
            let target = invocation
                .args
                .iter()
                .position(|a| a == "-o")
                .and_then(|i| invocation.args.get(i + 1));
            if let Some(target) = target {
                tokio::fs::write(PathBuf::from(target), b"").await?;
            }
        }

        display.good(invocation.step.label());
        Ok(())
    }
}
