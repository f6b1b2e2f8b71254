use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClassificationError;
use crate::llm::PromptTemplate;
use crate::models::{Segment, Sentiment, Speaker, Timestamp};

/// Framing passed to the classifier alongside the utterance text
#[derive(Debug, Clone)]
pub struct ClassificationContext {
    pub speaker: Speaker,
    pub timestamp: Option<Timestamp>,
    pub prompt: Arc<PromptTemplate>,
}

impl ClassificationContext {
    pub fn for_segment(segment: &Segment, prompt: Arc<PromptTemplate>) -> Self {
        Self {
            speaker: segment.speaker,
            timestamp: segment.timestamp,
            prompt,
        }
    }

    /// Render the prompt for `text` with this context's slots
    pub fn render(&self, text: &str) -> String {
        self.prompt.render(self.speaker, text, self.timestamp)
    }
}

/// External sentiment capability.
///
/// Implementations may be slow, rate limited, or return unparseable answers;
/// the analyzer applies timeouts and retries around every call.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        context: &ClassificationContext,
    ) -> Result<Sentiment, ClassificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_renders_segment_slots() {
        let segment = Segment::new(
            Speaker::Customer,
            "mi tarjeta no funciona",
            Some(Timestamp::from_seconds(95)),
        )
        .unwrap();
        let prompt = Arc::new(PromptTemplate::new("{speaker}@{timestamp}: {text}").unwrap());
        let context = ClassificationContext::for_segment(&segment, prompt);

        assert_eq!(
            context.render(&segment.text),
            "Customer@01:35: mi tarjeta no funciona"
        );
    }
}
