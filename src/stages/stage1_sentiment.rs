use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, ClassificationError};
use crate::llm::{ClassificationContext, PromptTemplate, SentimentClassifier};
use crate::models::{Conversation, Sentiment};

/// Configuration for Stage 1
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Attempts per segment, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff: Duration,
    /// Upper bound for a single backoff delay
    pub max_backoff: Duration,
    /// Per-call timeout; an elapsed call counts as a transient failure
    pub call_timeout: Duration,
    /// Maximum classifier calls in flight
    pub concurrency: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            call_timeout: Duration::from_secs(30),
            concurrency: 4,
        }
    }
}

impl AnalyzerConfig {
    /// Backoff before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Counters describing how Stage 1 went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Segments with a real classifier verdict
    pub classified: usize,
    /// Segments filled with the neutral default
    pub degraded: usize,
    /// Retries spent across all segments
    pub retries: u32,
    /// The caller aborted before every segment finished
    pub cancelled: bool,
}

/// Result of Stage 1 processing
#[derive(Debug, Clone)]
pub struct AnalyzedConversation {
    /// Same segments, same order, each carrying a sentiment
    pub conversation: Conversation,
    pub stats: AnalysisStats,
}

impl AnalyzedConversation {
    pub fn is_degraded(&self) -> bool {
        self.stats.degraded > 0
    }
}

/// Outcome of classifying one segment after retries
#[derive(Debug)]
struct SegmentOutcome {
    result: Result<Sentiment, ClassificationError>,
    attempts: u32,
}

/// Stage 1: classify every segment of a conversation
pub struct SentimentAnalyzer {
    classifier: Arc<dyn SentimentClassifier>,
    prompt: Arc<PromptTemplate>,
    config: AnalyzerConfig,
}

impl SentimentAnalyzer {
    pub fn new(
        classifier: Arc<dyn SentimentClassifier>,
        prompt: Arc<PromptTemplate>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            classifier,
            prompt,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classify every segment; see [`SentimentAnalyzer::analyze_until`]
    pub async fn analyze(
        &self,
        conversation: Conversation,
    ) -> Result<AnalyzedConversation, AnalysisError> {
        self.analyze_until(conversation, std::future::pending::<()>()).await
    }

    /// Classify every segment until `cancel` resolves.
    ///
    /// Segments are classified independently, at most `concurrency` at a
    /// time, and written back into their own slot so the output keeps the
    /// input order. A segment that cannot be classified is degraded to
    /// neutral/1 instead of failing the conversation. The analysis fails when
    /// the service could not be used for any segment, and stops at the first
    /// rejected credential.
    ///
    /// On cancellation, in-flight calls are aborted; finished verdicts are
    /// kept and the remaining segments are degraded.
    pub async fn analyze_until<F>(
        &self,
        mut conversation: Conversation,
        cancel: F,
    ) -> Result<AnalyzedConversation, AnalysisError>
    where
        F: Future<Output = ()>,
    {
        let total = conversation.len();
        info!(
            "Stage 1: classifying {} segments (concurrency {}, {} attempts per segment)",
            total, self.config.concurrency, self.config.max_attempts
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, segment) in conversation.segments().iter().enumerate() {
            let classifier = Arc::clone(&self.classifier);
            let context = ClassificationContext::for_segment(segment, Arc::clone(&self.prompt));
            let text = segment.text.clone();
            let semaphore = Arc::clone(&semaphore);
            let config = self.config.clone();

            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome =
                    classify_with_retry(classifier.as_ref(), &text, &context, &config).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<SegmentOutcome>> = (0..total).map(|_| None).collect();
        let mut cancelled = false;
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, outcome))) => {
                        if let Err(ClassificationError::Unauthorized(reason)) = &outcome.result {
                            warn!("Classifier rejected credentials; aborting analysis");
                            tasks.abort_all();
                            return Err(AnalysisError::Credentials(reason.clone()));
                        }
                        store(&mut slots, index, outcome);
                    }
                    Some(Err(e)) => warn!("Classification task ended abnormally: {}", e),
                    None => break,
                },
                _ = &mut cancel => {
                    warn!("Analysis cancelled; keeping finished segments");
                    cancelled = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        if cancelled {
            // Tasks that finished before the abort still hand back their result
            while let Some(joined) = tasks.join_next().await {
                if let Ok((index, outcome)) = joined {
                    store(&mut slots, index, outcome);
                }
            }
        }

        let mut stats = AnalysisStats {
            cancelled,
            ..Default::default()
        };
        let mut service_failures = 0;
        let mut last_error = None;

        for (segment, slot) in conversation.segments_mut().iter_mut().zip(slots) {
            match slot {
                Some(SegmentOutcome {
                    result: Ok(sentiment),
                    attempts,
                }) => {
                    stats.retries += attempts.saturating_sub(1);
                    stats.classified += 1;
                    segment.annotate(sentiment);
                }
                Some(SegmentOutcome {
                    result: Err(ClassificationError::Unauthorized(reason)),
                    ..
                }) => {
                    return Err(AnalysisError::Credentials(reason));
                }
                Some(SegmentOutcome {
                    result: Err(err),
                    attempts,
                }) => {
                    stats.retries += attempts.saturating_sub(1);
                    stats.degraded += 1;
                    if err.is_service_failure() {
                        service_failures += 1;
                    }
                    warn!(
                        "Segment {} degraded after {} attempt(s): {}",
                        segment.sequence, attempts, err
                    );
                    segment.degrade(err.to_string());
                    last_error = Some(err);
                }
                None => {
                    stats.degraded += 1;
                    let reason = if cancelled {
                        "cancelled before classification finished"
                    } else {
                        "classification task aborted"
                    };
                    segment.degrade(reason);
                }
            }
        }

        if !cancelled && stats.classified == 0 && service_failures == total {
            return Err(AnalysisError::Unavailable {
                segments: total,
                last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
            });
        }

        info!(
            "Stage 1: {} classified, {} degraded, {} retries{}",
            stats.classified,
            stats.degraded,
            stats.retries,
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(AnalyzedConversation {
            conversation,
            stats,
        })
    }
}

/// Each slot is written at most once
fn store(slots: &mut [Option<SegmentOutcome>], index: usize, outcome: SegmentOutcome) {
    if let Some(slot) = slots.get_mut(index) {
        if slot.is_none() {
            *slot = Some(outcome);
        }
    }
}

/// Classify one segment, retrying transient failures with backoff
async fn classify_with_retry(
    classifier: &dyn SentimentClassifier,
    text: &str,
    context: &ClassificationContext,
    config: &AnalyzerConfig,
) -> SegmentOutcome {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let call = classifier.classify(text, context);
        let result = match tokio::time::timeout(config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ClassificationError::Timeout(config.call_timeout)),
        };

        match result {
            Ok(sentiment) => {
                return SegmentOutcome {
                    result: Ok(sentiment),
                    attempts: attempt,
                };
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = config
                    .backoff_for(attempt)
                    .max(err.retry_after().unwrap_or_default());
                debug!(
                    "Attempt {} of {} failed ({}); retrying in {:?}",
                    attempt, max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return SegmentOutcome {
                    result: Err(err),
                    attempts: attempt,
                };
            }
        }
    }
}
