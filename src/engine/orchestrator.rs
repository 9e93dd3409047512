//! Per-file state machine: evaluate, retry or relocate.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::fsops::{
    DirectoryCleaner, ErrorLogWriter, ErrorRecord, QuarantineOutcome, Relocator,
};
use crate::paths::Roots;
use crate::processor::{ContentProcessor, Metadata, Outcome};
use crate::retry::{RetryDecision, RetryPolicy};

use super::stats::EngineStats;
use super::task::{FileTask, TaskState};

/// What the lane does with a task after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Re-submit after the delay.
    Retry(Duration),
    /// Terminal state reached; the task can be discarded.
    Done,
}

/// Result of calling the processor once.
struct Evaluation {
    outcome: Outcome,
    /// Underlying fault chain for the error log, when there is one.
    detail: Option<String>,
}

/// Drives a [`FileTask`] through the processor and the filesystem.
///
/// Every filesystem mutation goes through here, and the lane calls it for
/// one task at a time.
pub struct Orchestrator {
    roots: Roots,
    processor: Arc<dyn ContentProcessor>,
    policy: RetryPolicy,
    timeout: Duration,
    relocator: Relocator,
    cleaner: DirectoryCleaner,
    logs: ErrorLogWriter,
    stats: Arc<EngineStats>,
}

impl Orchestrator {
    pub fn new(
        roots: Roots,
        processor: Arc<dyn ContentProcessor>,
        policy: RetryPolicy,
        timeout: Duration,
        stats: Arc<EngineStats>,
    ) -> Self {
        let relocator = Relocator::new(&roots.watch);
        let cleaner = DirectoryCleaner::new(roots.clone());
        Self {
            roots,
            processor,
            policy,
            timeout,
            relocator,
            cleaner,
            logs: ErrorLogWriter::new(),
            stats,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_cleaner(mut self, cleaner: DirectoryCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Run one attempt for `task` and apply its outcome.
    pub async fn attempt(&self, task: &mut FileTask) -> Step {
        task.state = TaskState::Attempting;
        crate::debug_event!(
            "engine",
            "attempting",
            "{} (evaluation {})",
            task.relative.display(),
            task.evaluations()
        );

        let Evaluation { outcome, detail } = self.evaluate(&task.source).await;

        match outcome {
            Outcome::Success(metadata) => {
                self.succeed(task, &metadata);
                Step::Done
            }
            failure => match self.policy.decide(&failure, task.attempts) {
                RetryDecision::Retry { delay } => {
                    task.attempts += 1;
                    task.state = TaskState::Retrying;
                    crate::log_event!(
                        "retry",
                        "scheduled",
                        "{} in {delay:?} (retry {}/{}): {}",
                        task.relative.display(),
                        task.attempts,
                        self.policy.max_attempts(),
                        failure.reason().unwrap_or_default()
                    );
                    Step::Retry(delay)
                }
                RetryDecision::GiveUp => {
                    let reason = match &failure {
                        Outcome::TransientFailure(reason) => format!(
                            "{reason} (giving up after {} attempts)",
                            task.evaluations()
                        ),
                        other => other.reason().unwrap_or_default().to_string(),
                    };
                    self.fail(task, &reason, detail);
                    Step::Done
                }
            },
        }
    }

    async fn evaluate(&self, path: &Path) -> Evaluation {
        if !self.processor.supports(path) {
            return Evaluation {
                outcome: Outcome::PermanentFailure("unsupported type".to_string()),
                detail: None,
            };
        }

        match tokio::time::timeout(self.timeout, self.processor.process(path)).await {
            Ok(Ok(outcome)) => Evaluation {
                outcome,
                detail: None,
            },
            Ok(Err(e)) => {
                let detail = Some(error_chain(&e));
                let outcome = if e.is_transient() {
                    Outcome::TransientFailure(e.to_string())
                } else {
                    Outcome::PermanentFailure(e.to_string())
                };
                Evaluation { outcome, detail }
            }
            Err(_) => Evaluation {
                outcome: Outcome::TransientFailure(format!(
                    "processing timed out after {:?}",
                    self.timeout
                )),
                detail: None,
            },
        }
    }

    fn succeed(&self, task: &mut FileTask, metadata: &Metadata) {
        match self.relocator.move_file(&task.source, &self.roots.saved) {
            Ok(_) => {
                task.state = TaskState::Succeeded;
                self.stats.record_success();
                crate::outcome!(
                    "saved",
                    "{}{}",
                    task.relative.display(),
                    describe_metadata(metadata)
                );
                crate::debug_event!(
                    "saved",
                    "elapsed",
                    "{} in {:?}",
                    task.relative.display(),
                    task.first_seen.elapsed()
                );
                self.cleanup_parent(task);
            }
            Err(e) => {
                tracing::error!(
                    "[saved] could not move {} to saved root: {e}",
                    task.relative.display()
                );
                let reason = format!("relocation to saved root failed: {e}");
                self.fail(task, &reason, Some(error_chain(&e)));
            }
        }
    }

    fn fail(&self, task: &mut FileTask, reason: &str, detail: Option<String>) {
        task.state = TaskState::Failed;
        self.stats.record_failure();

        let relocated = match self.relocator.move_file(&task.source, &self.roots.error) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(
                    "[failed] could not move {} to error root, leaving it in place: {e}",
                    task.relative.display()
                );
                return;
            }
        };

        let mut record = ErrorRecord::new(&task.source, reason)
            .with_context("relative_path", task.relative.display())
            .with_context("attempts", task.evaluations())
            .with_context("processor", self.processor.name())
            .with_file_context(&relocated);
        if let Some(detail) = &detail {
            record = record.with_detail(detail.clone());
        }
        if let Err(e) = self.logs.write_failure(&relocated, &record) {
            tracing::error!(
                "[failed] could not write error log for {}: {e}",
                task.relative.display()
            );
        }

        crate::outcome!("failed", "{}: {reason}", task.relative.display());
        tracing::error!(
            "[failed] {}: {}",
            task.relative.display(),
            detail.as_deref().unwrap_or(reason)
        );

        self.cleanup_parent(task);
    }

    fn cleanup_parent(&self, task: &FileTask) {
        if let Some(parent) = task.source.parent() {
            let removed = self.cleaner.cleanup_after_move(parent);
            self.stats.record_dirs_removed(removed);
        }
    }

    /// Quarantine a directory reported empty by the startup scan.
    pub fn quarantine(&self, dir: &Path) {
        match self.cleaner.quarantine(dir) {
            Ok(QuarantineOutcome::Quarantined { .. }) => self.stats.record_quarantine(),
            Ok(other) => {
                crate::debug_event!("quarantine", "skipped", "{}: {other:?}", dir.display());
            }
            Err(e) => {
                tracing::warn!("[quarantine] could not quarantine {}: {e}", dir.display());
            }
        }
    }
}

/// `error: cause: cause` rendering of an error and its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn describe_metadata(metadata: &Metadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }
    let fields: Vec<String> = metadata
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{key}={s}"),
            other => format!("{key}={other}"),
        })
        .collect();
    format!(" ({})", fields.join(", "))
}
