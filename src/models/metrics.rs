use serde::{Deserialize, Serialize};

use super::{SentimentLabel, Speaker};

/// Label counts across every annotated segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentDistribution {
    pub fn record(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }

    pub fn count(&self, label: SentimentLabel) -> usize {
        match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Neutral => self.neutral,
            SentimentLabel::Negative => self.negative,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    /// Most frequent label; ties prefer positive, then neutral.
    /// Neutral when nothing was counted.
    pub fn dominant(&self) -> SentimentLabel {
        if self.total() == 0 {
            return SentimentLabel::Neutral;
        }
        [
            SentimentLabel::Positive,
            SentimentLabel::Neutral,
            SentimentLabel::Negative,
        ]
        .into_iter()
        .fold(SentimentLabel::Positive, |best, label| {
            if self.count(label) > self.count(best) {
                label
            } else {
                best
            }
        })
    }

    /// Share of each label in percent, in positive/neutral/negative order
    pub fn percentages(&self) -> [f64; 3] {
        let total = self.total().max(1) as f64;
        [
            self.positive as f64 / total * 100.0,
            self.neutral as f64 / total * 100.0,
            self.negative as f64 / total * 100.0,
        ]
    }
}

/// First-to-last movement for one role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerTrend {
    pub segments: usize,
    pub first_score: Option<i8>,
    pub last_score: Option<i8>,
    /// Fewer than two segments: no trend can be measured
    pub insufficient_data: bool,
}

/// Banded reading of the customer improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    HighlySuccessful,
    Successful,
    Neutral,
    NeedsAttention,
}

impl CallOutcome {
    pub fn from_improvement(improvement: i32) -> Self {
        if improvement > 2 {
            CallOutcome::HighlySuccessful
        } else if improvement > 0 {
            CallOutcome::Successful
        } else if improvement > -2 {
            CallOutcome::Neutral
        } else {
            CallOutcome::NeedsAttention
        }
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CallOutcome::HighlySuccessful => "highly successful",
            CallOutcome::Successful => "successful",
            CallOutcome::Neutral => "neutral",
            CallOutcome::NeedsAttention => "needs attention",
        };
        f.write_str(text)
    }
}

/// Conditions the caller should show next to the scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultWarning {
    /// Customer or Agent never speaks, so one trend is meaningless
    SingleSpeakerRole,
    InsufficientData(Speaker),
    /// Number of segments carrying a neutral fill-in instead of a verdict
    DegradedSegments(usize),
}

impl std::fmt::Display for ResultWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultWarning::SingleSpeakerRole => {
                write!(f, "only one of Customer/Agent speaks; success flag may be misleading")
            }
            ResultWarning::InsufficientData(speaker) => {
                write!(f, "fewer than two {} segments; no trend measurable", speaker)
            }
            ResultWarning::DegradedSegments(n) => write!(
                f,
                "{} segment(s) could not be classified and were scored neutral",
                n
            ),
        }
    }
}

/// Metrics computed once per analyzed conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementResult {
    pub customer_improvement: i32,
    pub agent_improvement: i32,
    /// Strictly positive customer improvement
    pub call_successful: bool,
    pub sentiment_distribution: SentimentDistribution,
    pub customer: SpeakerTrend,
    pub agent: SpeakerTrend,
    /// Second-half mean score minus first-half mean, over all segments
    pub overall_improvement: f64,
    pub outcome: CallOutcome,
    pub average_intensity: f64,
    pub dominant_sentiment: SentimentLabel,
    pub total_segments: usize,
    pub degraded_segments: usize,
    pub degraded: bool,
    pub warnings: Vec<ResultWarning>,
}

impl ImprovementResult {
    pub fn trend(&self, speaker: Speaker) -> Option<&SpeakerTrend> {
        match speaker {
            Speaker::Customer => Some(&self.customer),
            Speaker::Agent => Some(&self.agent),
            Speaker::Unknown => None,
        }
    }

    pub fn insufficient_data(&self, speaker: Speaker) -> bool {
        self.trend(speaker).is_some_and(|t| t.insufficient_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_of_empty_distribution_is_neutral() {
        let dist = SentimentDistribution::default();
        assert_eq!(dist.total(), 0);
        assert_eq!(dist.dominant(), SentimentLabel::Neutral);
    }

    #[test]
    fn test_dominant_prefers_positive_on_tie() {
        let dist = SentimentDistribution {
            positive: 2,
            neutral: 2,
            negative: 1,
        };
        assert_eq!(dist.dominant(), SentimentLabel::Positive);

        let dist = SentimentDistribution {
            positive: 0,
            neutral: 1,
            negative: 3,
        };
        assert_eq!(dist.dominant(), SentimentLabel::Negative);
    }

    #[test]
    fn test_outcome_bands() {
        assert_eq!(CallOutcome::from_improvement(8), CallOutcome::HighlySuccessful);
        assert_eq!(CallOutcome::from_improvement(1), CallOutcome::Successful);
        assert_eq!(CallOutcome::from_improvement(0), CallOutcome::Neutral);
        assert_eq!(CallOutcome::from_improvement(-1), CallOutcome::Neutral);
        assert_eq!(CallOutcome::from_improvement(-2), CallOutcome::NeedsAttention);
    }

    #[test]
    fn test_percentages() {
        let mut dist = SentimentDistribution::default();
        dist.record(SentimentLabel::Positive);
        dist.record(SentimentLabel::Negative);
        dist.record(SentimentLabel::Negative);
        dist.record(SentimentLabel::Neutral);
        assert_eq!(dist.total(), 4);
        assert_eq!(dist.percentages(), [25.0, 25.0, 50.0]);
    }
}
