use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::{Segment, Speaker, Timestamp};

/// Ordered, non-empty sequence of segments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    segments: Vec<Segment>,
}

impl Conversation {
    /// Wrap segments in order, renumbering their sequence indices.
    /// Returns `None` for an empty sequence.
    ///
    /// Present timestamps are non-decreasing: one earlier than the latest
    /// seen so far is dropped and its segment kept.
    pub fn new(mut segments: Vec<Segment>) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }

        let mut latest: Option<Timestamp> = None;
        for (index, segment) in segments.iter_mut().enumerate() {
            segment.sequence = index;
            let Some(timestamp) = segment.timestamp else {
                continue;
            };
            match latest {
                Some(previous) if timestamp < previous => {
                    warn!(
                        "Timestamp {} goes backwards (previous {}); dropped",
                        timestamp, previous
                    );
                    segment.timestamp = None;
                }
                _ => latest = Some(timestamp),
            }
        }

        Some(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Mutable access for annotation; the sequence length cannot change
    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments spoken by one role, in conversation order
    pub fn by_speaker(&self, speaker: Speaker) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.speaker == speaker)
    }

    /// Distinct roles present, in Customer, Agent, Unknown order
    pub fn roles_present(&self) -> Vec<Speaker> {
        let mut roles: Vec<Speaker> = self.segments.iter().map(|s| s.speaker).collect();
        roles.sort();
        roles.dedup();
        roles
    }

    /// Both Customer and Agent speak at least once
    pub fn is_analyzable(&self) -> bool {
        let roles = self.roles_present();
        roles.contains(&Speaker::Customer) && roles.contains(&Speaker::Agent)
    }

    pub fn degraded_count(&self) -> usize {
        self.segments.iter().filter(|s| s.degraded).count()
    }

    /// Summarize the conversation and list anything worth warning about
    pub fn validate(&self) -> ConversationValidation {
        let mut speaker_counts = BTreeMap::new();
        for segment in &self.segments {
            *speaker_counts.entry(segment.speaker).or_insert(0) += 1;
        }

        let avg_text_length = self.segments.iter().map(|s| s.text.chars().count()).sum::<usize>()
            as f64
            / self.segments.len().max(1) as f64;

        let mut issues = Vec::new();
        if self.segments.len() < 2 {
            issues.push(ValidationIssue::TooShort);
        }
        if !self.is_analyzable() {
            issues.push(ValidationIssue::SingleRole);
        }
        if let Some(&unknown) = speaker_counts.get(&Speaker::Unknown) {
            issues.push(ValidationIssue::UnknownSpeakers(unknown));
        }

        ConversationValidation {
            total_segments: self.segments.len(),
            speaker_counts,
            avg_text_length,
            timestamped: self.segments.iter().any(|s| s.timestamp.is_some()),
            issues,
        }
    }
}

/// Statistics and warnings about a parsed conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationValidation {
    pub total_segments: usize,
    pub speaker_counts: BTreeMap<Speaker, usize>,
    pub avg_text_length: f64,
    pub timestamped: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ConversationValidation {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Fewer than two segments
    TooShort,
    /// Customer or Agent never speaks
    SingleRole,
    /// Segments whose speaker could not be resolved
    UnknownSpeakers(usize),
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::TooShort => {
                write!(f, "conversation too short (fewer than 2 segments)")
            }
            ValidationIssue::SingleRole => {
                write!(f, "conversation needs both a Customer and an Agent speaker")
            }
            ValidationIssue::UnknownSpeakers(n) => {
                write!(f, "{} segment(s) have an unrecognized speaker", n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(speaker: Speaker, text: &str) -> Segment {
        Segment::new(speaker, text, None).unwrap()
    }

    #[test]
    fn test_empty_conversation_rejected() {
        assert!(Conversation::new(vec![]).is_none());
    }

    #[test]
    fn test_sequence_renumbered() {
        let conversation = Conversation::new(vec![
            seg(Speaker::Customer, "a"),
            seg(Speaker::Agent, "b"),
            seg(Speaker::Customer, "c"),
        ])
        .unwrap();

        let sequences: Vec<usize> = conversation.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(conversation.by_speaker(Speaker::Customer).count(), 2);
    }

    #[test]
    fn test_backwards_timestamp_dropped_on_construction() {
        let at = |seconds| Some(Timestamp::from_seconds(seconds));
        let conversation = Conversation::new(vec![
            Segment::new(Speaker::Customer, "a", at(30)).unwrap(),
            Segment::new(Speaker::Agent, "b", at(10)).unwrap(),
            Segment::new(Speaker::Customer, "c", None).unwrap(),
            Segment::new(Speaker::Agent, "d", at(30)).unwrap(),
            Segment::new(Speaker::Customer, "e", at(45)).unwrap(),
        ])
        .unwrap();

        let timestamps: Vec<Option<u32>> = conversation
            .iter()
            .map(|s| s.timestamp.map(|t| t.seconds()))
            .collect();
        assert_eq!(timestamps, vec![Some(30), None, None, Some(30), Some(45)]);
        assert_eq!(conversation.len(), 5);
    }

    #[test]
    fn test_validate_single_role() {
        let conversation = Conversation::new(vec![
            seg(Speaker::Customer, "hola"),
            seg(Speaker::Unknown, "ruido"),
        ])
        .unwrap();

        let validation = conversation.validate();
        assert!(!conversation.is_analyzable());
        assert!(validation.issues.contains(&ValidationIssue::SingleRole));
        assert!(validation.issues.contains(&ValidationIssue::UnknownSpeakers(1)));
        assert_eq!(validation.speaker_counts[&Speaker::Customer], 1);
    }

    #[test]
    fn test_validate_clean_dialogue() {
        let conversation = Conversation::new(vec![
            seg(Speaker::Customer, "hola"),
            seg(Speaker::Agent, "buenas"),
        ])
        .unwrap();

        let validation = conversation.validate();
        assert!(validation.is_clean());
        assert_eq!(validation.avg_text_length, 5.0);
        assert_eq!(
            conversation.roles_present(),
            vec![Speaker::Customer, Speaker::Agent]
        );
    }
}
