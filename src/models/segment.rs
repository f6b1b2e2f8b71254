use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Conversational role of a speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Speaker {
    Customer,
    Agent,
    Unknown,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Customer => "Customer",
            Speaker::Agent => "Agent",
            Speaker::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polarity assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Polarity multiplier: +1, 0 or -1
    pub fn polarity(&self) -> i8 {
        match self {
            SentimentLabel::Positive => 1,
            SentimentLabel::Neutral => 0,
            SentimentLabel::Negative => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment strength, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    pub const MIN: Intensity = Intensity(1);
    pub const MAX: Intensity = Intensity(5);

    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    /// Clamp any integer into the valid range
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(1, 5) as u8)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Intensity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Intensity::new(value).ok_or_else(|| format!("intensity {} outside 1..=5", value))
    }
}

impl From<Intensity> for u8 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

/// Classifier verdict for one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub intensity: Intensity,
    /// Short explanation returned by the classifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Sentiment {
    pub fn new(label: SentimentLabel, intensity: Intensity) -> Self {
        Self {
            label,
            intensity,
            rationale: None,
        }
    }

    /// Neutral, weakest intensity: the fill-in for failed classifications
    pub fn neutral_default() -> Self {
        Self::new(SentimentLabel::Neutral, Intensity::MIN)
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Intensity signed by polarity, in [-5, 5]
    pub fn signed_score(&self) -> i8 {
        self.label.polarity() * self.intensity.get() as i8
    }
}

/// Offset from call start, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u32);

impl Timestamp {
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self((ms / 1000).min(u32::MAX as u64) as u32)
    }

    pub fn seconds(&self) -> u32 {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = String;

    /// Accepts `mm:ss` and `hh:mm:ss`; the trailing fields must be below 60
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let fields: Vec<u64> = parts
            .iter()
            .map(|p| {
                if p.is_empty() || p.len() > 6 || !p.chars().all(|c| c.is_ascii_digit()) {
                    Err(format!("invalid timestamp '{}'", s))
                } else {
                    p.parse::<u64>().map_err(|_| format!("invalid timestamp '{}'", s))
                }
            })
            .collect::<Result<_, _>>()?;

        let seconds: u64 = match fields.as_slice() {
            [m, sec] if *sec < 60 && parts[1].len() == 2 => m * 60 + sec,
            [h, m, sec] if *m < 60 && *sec < 60 && parts[1].len() == 2 && parts[2].len() == 2 => {
                h * 3600 + m * 60 + sec
            }
            _ => return Err(format!("invalid timestamp '{}'", s)),
        };
        u32::try_from(seconds)
            .map(Self)
            .map_err(|_| format!("timestamp '{}' out of range", s))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        if hours > 0 {
            write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            write!(f, "{:02}:{:02}", minutes, seconds)
        }
    }
}

/// One speaker-attributed utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub speaker: Speaker,
    /// Trimmed, never empty
    pub text: String,
    pub timestamp: Option<Timestamp>,
    /// Position within the conversation
    pub sequence: usize,
    pub sentiment: Option<Sentiment>,
    /// Sentiment is a neutral fill-in, not a classifier verdict
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Segment {
    /// Build a segment; returns `None` when the text is blank
    pub fn new(speaker: Speaker, text: &str, timestamp: Option<Timestamp>) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            speaker,
            text: text.to_string(),
            timestamp,
            sequence: 0,
            sentiment: None,
            degraded: false,
            failure: None,
        })
    }

    pub fn annotate(&mut self, sentiment: Sentiment) {
        self.sentiment = Some(sentiment);
        self.degraded = false;
        self.failure = None;
    }

    /// Fill in the neutral default and flag the segment as untrustworthy
    pub fn degrade(&mut self, reason: impl Into<String>) {
        self.sentiment = Some(Sentiment::neutral_default());
        self.degraded = true;
        self.failure = Some(reason.into());
    }

    pub fn label(&self) -> Option<SentimentLabel> {
        self.sentiment.as_ref().map(|s| s.label)
    }

    pub fn intensity(&self) -> Option<Intensity> {
        self.sentiment.as_ref().map(|s| s.intensity)
    }

    /// Signed intensity, 0 when unannotated
    pub fn signed_score(&self) -> i8 {
        self.sentiment.as_ref().map(Sentiment::signed_score).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotated(label: SentimentLabel, intensity: u8) -> Segment {
        let mut segment = Segment::new(Speaker::Customer, "hola", None).unwrap();
        segment.annotate(Sentiment::new(label, Intensity::new(intensity).unwrap()));
        segment
    }

    #[test]
    fn test_signed_score() {
        assert_eq!(annotated(SentimentLabel::Positive, 3).signed_score(), 3);
        assert_eq!(annotated(SentimentLabel::Negative, 5).signed_score(), -5);
        assert_eq!(annotated(SentimentLabel::Neutral, 4).signed_score(), 0);

        let unset = Segment::new(Speaker::Agent, "x", None).unwrap();
        assert_eq!(unset.signed_score(), 0);
    }

    #[test]
    fn test_intensity_bounds() {
        assert!(Intensity::new(0).is_none());
        assert!(Intensity::new(6).is_none());
        assert_eq!(Intensity::new(5).unwrap().get(), 5);
        assert_eq!(Intensity::clamped(9).get(), 5);
        assert_eq!(Intensity::clamped(-2).get(), 1);
        assert!(serde_json::from_str::<Intensity>("7").is_err());
    }

    #[test]
    fn test_segment_trims_and_rejects_blank() {
        let segment = Segment::new(Speaker::Agent, "  buenos días  ", None).unwrap();
        assert_eq!(segment.text, "buenos días");
        assert!(Segment::new(Speaker::Agent, "   ", None).is_none());
    }

    #[test]
    fn test_degrade_fills_neutral_default() {
        let mut segment = Segment::new(Speaker::Customer, "???", None).unwrap();
        segment.degrade("timeout");
        assert!(segment.degraded);
        assert_eq!(segment.label(), Some(SentimentLabel::Neutral));
        assert_eq!(segment.intensity(), Some(Intensity::MIN));
        assert_eq!(segment.failure.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_timestamp_parse_and_format() {
        assert_eq!("00:30".parse::<Timestamp>().unwrap().seconds(), 30);
        assert_eq!("2:05".parse::<Timestamp>().unwrap().seconds(), 125);
        assert_eq!("01:02:03".parse::<Timestamp>().unwrap().seconds(), 3723);
        assert!("bad".parse::<Timestamp>().is_err());
        assert!("00:75".parse::<Timestamp>().is_err());
        assert!("1:5".parse::<Timestamp>().is_err());
        assert!("".parse::<Timestamp>().is_err());

        assert_eq!(Timestamp::from_seconds(90).to_string(), "01:30");
        assert_eq!(Timestamp::from_seconds(3723).to_string(), "01:02:03");
        assert_eq!(Timestamp::from_millis(61_900).seconds(), 61);
    }
}
