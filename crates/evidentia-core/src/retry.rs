//! Per-step retry policy (spec §4.2): timeout, retry budget, and
//! exponential backoff, one policy per workflow step.
//!
//! Grounded on the teacher's step-retry loop shape (bounded retries with
//! exponential backoff before surfacing a terminal error up the workflow),
//! adapted to the fixed per-step timeout/retry table spec §4.2 specifies
//! rather than a single global policy.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// The eight pipeline steps, in their fixed execution order (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    /// Step 1: OCR.
    Ocr,
    /// Step 2: classification and extraction.
    Classification,
    /// Step 3: register gaps found during extraction.
    RegisterGaps,
    /// Step 4: resolve extracted parties to entities.
    EntityResolution,
    /// Step 5: update the authority graph.
    AuthorityGraphUpdate,
    /// Step 6: generate and upsert the document's embedding.
    Embedding,
    /// Step 7: run duplicate detection against this one document.
    PostIngestDuplicateCheck,
    /// Step 8: mark the document complete.
    Finalize,
}

impl WorkflowStep {
    /// All steps, in execution order.
    pub const ALL: [WorkflowStep; 8] = [
        WorkflowStep::Ocr,
        WorkflowStep::Classification,
        WorkflowStep::RegisterGaps,
        WorkflowStep::EntityResolution,
        WorkflowStep::AuthorityGraphUpdate,
        WorkflowStep::Embedding,
        WorkflowStep::PostIngestDuplicateCheck,
        WorkflowStep::Finalize,
    ];

    /// The stable step name recorded in [`crate::model::ProcessingLog`].
    pub fn name(self) -> &'static str {
        match self {
            WorkflowStep::Ocr => "ocr",
            WorkflowStep::Classification => "classification",
            WorkflowStep::RegisterGaps => "register_gaps",
            WorkflowStep::EntityResolution => "entity_resolution",
            WorkflowStep::AuthorityGraphUpdate => "authority_graph_update",
            WorkflowStep::Embedding => "embedding",
            WorkflowStep::PostIngestDuplicateCheck => "post_ingest_duplicate_check",
            WorkflowStep::Finalize => "finalize",
        }
    }

    /// This step's retry policy (spec §4.2 per-step table).
    pub fn retry_policy(self) -> RetryPolicy {
        match self {
            WorkflowStep::Ocr => RetryPolicy::new(Duration::from_secs(300), 5, Duration::from_secs(10)),
            WorkflowStep::Classification => {
                RetryPolicy::new(Duration::from_secs(180), 3, Duration::from_secs(10))
            }
            WorkflowStep::RegisterGaps => {
                RetryPolicy::new(Duration::from_secs(60), 2, Duration::from_secs(5))
            }
            WorkflowStep::EntityResolution => {
                RetryPolicy::new(Duration::from_secs(120), 3, Duration::from_secs(5))
            }
            WorkflowStep::AuthorityGraphUpdate => {
                RetryPolicy::new(Duration::from_secs(120), 3, Duration::from_secs(5))
            }
            WorkflowStep::Embedding => {
                RetryPolicy::new(Duration::from_secs(180), 3, Duration::from_secs(10))
            }
            WorkflowStep::PostIngestDuplicateCheck => {
                RetryPolicy::new(Duration::from_secs(60), 2, Duration::from_secs(5))
            }
            WorkflowStep::Finalize => RetryPolicy::new(Duration::from_secs(30), 1, Duration::from_secs(1)),
        }
    }
}

/// Timeout, retry budget, and exponential backoff base for one step.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    /// Construct a policy directly; `WorkflowStep::retry_policy` is the
    /// normal way to obtain one.
    pub fn new(timeout: Duration, max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff_base,
        }
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff delay before retry attempt number `attempt` (1-indexed),
    /// doubling each time.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `operation`, retrying on [`Error::is_retryable`] failures up to
    /// `max_retries` times with exponential backoff, and bounding every
    /// attempt (including retries) by `timeout`.
    ///
    /// Returns the last error if the budget is exhausted, or immediately
    /// propagates a non-retryable error without consuming the budget.
    pub async fn run<F, Fut, T>(&self, step: WorkflowStep, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let started = std::time::Instant::now();
            let outcome = tokio::time::timeout(self.timeout, operation()).await;
            let result = match outcome {
                Ok(inner) => inner,
                Err(_) => Err(Error::StepTimeout {
                    step: step.name().to_string(),
                    elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        step = step.name(),
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "workflow step failed, retrying"
                    );
                    tokio::time::sleep(self.backoff_for_attempt(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
