use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{Speaker, Timestamp};

/// Default prompt: Spanish retail-banking call analysis
pub const SPANISH_BANKING_PROMPT: &str = r#"Eres un analista de sentimientos especializado en llamadas bancarias en español.

Analiza el siguiente segmento de una llamada bancaria:

Hablante: {speaker}
Texto: "{text}"
Momento: {timestamp}

Proporciona EXACTAMENTE en este formato:
Sentimiento: [Positivo/Neutral/Negativo]
Intensidad: [1-5] (1=muy bajo, 5=muy alto)
Contexto: [breve explicación del contexto bancario]"#;

/// Language-neutral prompt
pub const GENERAL_PROMPT: &str = r#"Analyze this conversation segment for sentiment:
Speaker: {speaker}
Text: "{text}"
Timestamp: {timestamp}

Provide in this exact format:
Sentiment: [Positive/Neutral/Negative]
Intensity: [1-5] (1=very low, 5=very high)
Context: [brief explanation]"#;

/// Prompt asking whether the customer's issue was resolved
pub const RESOLUTION_PROMPT: &str = "Analyze the following customer service call transcript and determine if the customer's issue was resolved during the call. \
Return ONLY a JSON object with a single key 'solved' set to 1 if the problem was resolved, or 0 if not resolved. Do not include any extra text.\n\nTranscript:\n";

/// Substitution keys a prompt template may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Speaker,
    Text,
    Timestamp,
}

impl Slot {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "speaker" => Some(Slot::Speaker),
            "text" => Some(Slot::Text),
            "timestamp" => Some(Slot::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Slot(Slot),
}

/// Prompt template with `{speaker}`, `{text}` and `{timestamp}` slots.
///
/// Validated on construction, so rendering cannot fail. `{{` and `}}` are
/// literal braces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromptTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Result<Self, ConfigError> {
        let source = source.into();
        let pieces = parse_template(&source)?;
        if !pieces.contains(&Piece::Slot(Slot::Text)) {
            return Err(ConfigError::InvalidTemplate(
                "template must contain the {text} slot".to_string(),
            ));
        }
        Ok(Self { source, pieces })
    }

    /// Built-in template by name: `spanish_banking` or `general`
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "spanish_banking" => Self::new(SPANISH_BANKING_PROMPT),
            "general" => Self::new(GENERAL_PROMPT),
            other => Err(ConfigError::InvalidValue {
                field: "prompt_preset",
                reason: format!("unknown preset '{}' (expected spanish_banking or general)", other),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, speaker: Speaker, text: &str, timestamp: Option<Timestamp>) -> String {
        let mut prompt = String::with_capacity(self.source.len() + text.len());
        for piece in &self.pieces {
            match piece {
                Piece::Literal(literal) => prompt.push_str(literal),
                Piece::Slot(Slot::Speaker) => prompt.push_str(speaker.as_str()),
                Piece::Slot(Slot::Text) => prompt.push_str(text),
                Piece::Slot(Slot::Timestamp) => match timestamp {
                    Some(ts) => prompt.push_str(&ts.to_string()),
                    None => prompt.push_str("N/A"),
                },
            }
        }
        prompt
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            source: SPANISH_BANKING_PROMPT.to_string(),
            pieces: parse_template(SPANISH_BANKING_PROMPT).unwrap_or_default(),
        }
    }
}

impl TryFrom<String> for PromptTemplate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PromptTemplate> for String {
    fn from(template: PromptTemplate) -> Self {
        template.source
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_template(source: &str) -> Result<Vec<Piece>, ConfigError> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ConfigError::InvalidTemplate(format!(
                                "unclosed slot '{{{}'",
                                name
                            )));
                        }
                    }
                }
                let slot = Slot::from_name(name.trim()).ok_or_else(|| {
                    ConfigError::InvalidTemplate(format!(
                        "unknown slot '{{{}}}' (allowed: speaker, text, timestamp)",
                        name
                    ))
                })?;
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Slot(slot));
            }
            '}' => {
                return Err(ConfigError::InvalidTemplate(
                    "unmatched '}' (use '}}' for a literal brace)".to_string(),
                ));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

/// Build the resolution question for a whole transcript
pub fn build_resolution_prompt(transcript: &str) -> String {
    format!("{}{}", RESOLUTION_PROMPT, transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(PromptTemplate::preset("spanish_banking").is_ok());
        assert!(PromptTemplate::preset("general").is_ok());
        assert!(PromptTemplate::preset("klingon").is_err());
        assert_eq!(PromptTemplate::default().source(), SPANISH_BANKING_PROMPT);
    }

    #[test]
    fn test_render_fills_slots() {
        let template = PromptTemplate::new("[{timestamp}] {speaker} said {text}").unwrap();
        let rendered = template.render(
            Speaker::Customer,
            "hola",
            Some(Timestamp::from_seconds(30)),
        );
        assert_eq!(rendered, "[00:30] Customer said hola");

        let rendered = template.render(Speaker::Agent, "adiós", None);
        assert_eq!(rendered, "[N/A] Agent said adiós");
    }

    #[test]
    fn test_escaped_braces() {
        let template = PromptTemplate::new("{{\"text\": \"{text}\"}}").unwrap();
        assert_eq!(template.render(Speaker::Agent, "x", None), "{\"text\": \"x\"}");
    }

    #[test]
    fn test_rejects_unknown_slot() {
        let err = PromptTemplate::new("{text} {customer_name}").unwrap_err();
        assert!(err.to_string().contains("customer_name"));
    }

    #[test]
    fn test_rejects_missing_text_and_unbalanced() {
        assert!(PromptTemplate::new("{speaker} only").is_err());
        assert!(PromptTemplate::new("{text").is_err());
        assert!(PromptTemplate::new("{text} }").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<PromptTemplate, _> = serde_json::from_str("\"say {text}\"");
        assert!(ok.is_ok());
        let bad: Result<PromptTemplate, _> = serde_json::from_str("\"say {nope}\"");
        assert!(bad.is_err());
    }
}
