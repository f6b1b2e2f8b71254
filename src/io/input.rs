use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::SpeakerAliases;
use crate::error::ParseError;
use crate::heuristics::{assign_speaker_roles, RoleHeuristicsConfig};
use crate::models::{Conversation, Segment, Speaker, Timestamp, Transcript};
use crate::transcription::{Transcriber, TranscriptionConfig};

/// `[<ts>] <rest>`; the bracket content is validated separately
static TIMESTAMPED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]*)\]\s*(.*)$").expect("static pattern compiles"));

/// Raw conversation layouts the parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `<Speaker>: <text>` per line
    Simple,
    /// `[mm:ss] <Speaker>: <text>` per line
    Timestamped,
    /// JSON records with `speaker`, `text` and optional `timestamp`
    Structured,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Timestamped => "timestamped",
            Self::Structured => "structured",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "text" => Ok(Self::Simple),
            "timestamped" => Ok(Self::Timestamped),
            "structured" | "json" => Ok(Self::Structured),
            other => Err(format!(
                "unknown input format '{}' (expected simple, timestamped or structured)",
                other
            )),
        }
    }
}

/// One structured input record; unknown fields are ignored
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    timestamp: Option<RawTimestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Seconds(f64),
}

/// Turns raw conversation input into an ordered [`Conversation`]
#[derive(Debug, Clone, Default)]
pub struct ConversationParser {
    aliases: SpeakerAliases,
    role_heuristics: RoleHeuristicsConfig,
}

impl ConversationParser {
    pub fn new(aliases: SpeakerAliases) -> Self {
        Self {
            aliases,
            role_heuristics: RoleHeuristicsConfig::default(),
        }
    }

    /// Cue phrases used when mapping transcription speakers to roles
    pub fn with_role_heuristics(mut self, role_heuristics: RoleHeuristicsConfig) -> Self {
        self.role_heuristics = role_heuristics;
        self
    }

    /// Parse `raw` in the given format, or auto-detect it when `None`
    pub fn parse(
        &self,
        raw: &str,
        format: Option<InputFormat>,
    ) -> Result<Conversation, ParseError> {
        let format = match format {
            Some(format) => format,
            None => {
                let detected = detect_format(raw);
                debug!("Detected input format: {}", detected);
                detected
            }
        };

        let segments = match format {
            InputFormat::Simple => self.parse_lines(raw, false),
            InputFormat::Timestamped => self.parse_lines(raw, true),
            InputFormat::Structured => self.parse_structured(raw)?,
        };

        let conversation = finish(segments)?;
        info!(
            "Parsed {} segments ({} format)",
            conversation.len(),
            format
        );
        Ok(conversation)
    }

    /// Read a UTF-8 file and parse it
    pub fn parse_file(
        &self,
        path: &Path,
        format: Option<InputFormat>,
    ) -> Result<Conversation, ParseError> {
        let content = std::fs::read_to_string(path)?;
        debug!("Read {} bytes from {:?}", content.len(), path);
        self.parse(&content, format)
    }

    /// Build a conversation from a diarized transcript
    pub fn from_transcript(&self, transcript: &Transcript) -> Result<Conversation, ParseError> {
        let roles = assign_speaker_roles(transcript, &self.role_heuristics);

        let segments = transcript
            .utterances
            .iter()
            .filter_map(|utterance| {
                let speaker = roles
                    .get(&utterance.speaker_label)
                    .copied()
                    .unwrap_or(Speaker::Unknown);
                Segment::new(
                    speaker,
                    &utterance.text,
                    Some(Timestamp::from_millis(utterance.start_ms)),
                )
            })
            .collect();

        finish(segments)
    }

    /// Transcribe audio, then build a conversation from the result
    pub async fn parse_audio(
        &self,
        transcriber: &dyn Transcriber,
        audio: Vec<u8>,
        config: &TranscriptionConfig,
    ) -> Result<Conversation, ParseError> {
        let transcript = transcriber.transcribe(audio, config).await?;
        self.from_transcript(&transcript)
    }

    fn parse_lines(&self, raw: &str, timestamped: bool) -> Vec<Segment> {
        let mut segments = Vec::new();

        for (index, line) in raw.lines().enumerate() {
            let line_number = index + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let segment = if timestamped {
                self.parse_timestamped_line(line, line_number)
            } else {
                self.parse_simple_line(line, None, line_number)
            };
            segments.extend(segment);
        }

        segments
    }

    fn parse_timestamped_line(&self, line: &str, line_number: usize) -> Option<Segment> {
        let Some(captures) = TIMESTAMPED_LINE.captures(line) else {
            return self.parse_simple_line(line, None, line_number);
        };

        let raw_timestamp = captures.get(1).map_or("", |m| m.as_str());
        let rest = captures.get(2).map_or("", |m| m.as_str());

        let timestamp = match raw_timestamp.parse::<Timestamp>() {
            Ok(timestamp) => Some(timestamp),
            Err(reason) => {
                warn!(
                    "Line {}: malformed timestamp [{}] ({}); parsing without timestamp",
                    line_number, raw_timestamp, reason
                );
                None
            }
        };

        self.parse_simple_line(rest, timestamp, line_number)
    }

    fn parse_simple_line(
        &self,
        line: &str,
        timestamp: Option<Timestamp>,
        line_number: usize,
    ) -> Option<Segment> {
        if let Some((prefix, rest)) = line.split_once(':') {
            if let Some(speaker) = self.aliases.resolve(prefix) {
                let segment = Segment::new(speaker, rest, timestamp);
                if segment.is_none() {
                    warn!("Line {}: {} line has no text; skipped", line_number, speaker);
                }
                return segment;
            }
        }

        Segment::new(Speaker::Unknown, line, timestamp)
    }

    fn parse_structured(&self, raw: &str) -> Result<Vec<Segment>, ParseError> {
        let value: Value = serde_json::from_str(raw.trim())
            .map_err(|e| ParseError::InvalidStructured(e.to_string()))?;
        let records = record_values(value).ok_or_else(|| {
            ParseError::InvalidStructured(
                "expected an array of records or an object with a 'segments' array".to_string(),
            )
        })?;

        let mut segments = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let record: RawRecord = match serde_json::from_value(record) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Record {}: not a segment record ({}); skipped", index, e);
                    continue;
                }
            };

            let speaker = match record.speaker.as_deref() {
                Some(name) => self.aliases.resolve_or_unknown(name),
                None => Speaker::Unknown,
            };
            let timestamp = record
                .timestamp
                .and_then(|ts| structured_timestamp(ts, index));

            match record.text.as_deref().and_then(|t| Segment::new(speaker, t, timestamp)) {
                Some(segment) => segments.push(segment),
                None => warn!("Record {}: missing or empty text; skipped", index),
            }
        }

        Ok(segments)
    }
}

/// Structured when the whole input is JSON records, timestamped when every
/// non-blank line opens with a bracket, simple otherwise
pub fn detect_format(raw: &str) -> InputFormat {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            if record_values(value).is_some_and(|records| records.iter().all(Value::is_object)) {
                return InputFormat::Structured;
            }
        }
    }

    let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    if lines.peek().is_some() && lines.all(|l| TIMESTAMPED_LINE.is_match(l)) {
        return InputFormat::Timestamped;
    }

    InputFormat::Simple
}

/// Records from either a bare array or a report object's `segments`
fn record_values(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(records) => Some(records),
        Value::Object(mut object) => match object.remove("segments") {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        },
        _ => None,
    }
}

fn structured_timestamp(raw: RawTimestamp, index: usize) -> Option<Timestamp> {
    match raw {
        RawTimestamp::Text(text) => match text.trim() {
            "" | "N/A" => None,
            text => match text.parse::<Timestamp>() {
                Ok(timestamp) => Some(timestamp),
                Err(reason) => {
                    warn!("Record {}: malformed timestamp '{}' ({})", index, text, reason);
                    None
                }
            },
        },
        RawTimestamp::Seconds(seconds) => {
            if seconds.is_finite() && seconds >= 0.0 && seconds <= u32::MAX as f64 {
                Some(Timestamp::from_seconds(seconds.floor() as u32))
            } else {
                warn!("Record {}: timestamp {} out of range", index, seconds);
                None
            }
        }
    }
}

/// Enforce non-decreasing timestamps and wrap into a conversation
fn finish(segments: Vec<Segment>) -> Result<Conversation, ParseError> {
    Conversation::new(segments).ok_or(ParseError::NoSegments)
}
