use crate::error::ClassificationError;
use crate::models::{Intensity, Sentiment, SentimentLabel};

const DEFAULT_INTENSITY: u8 = 3;

/// Parse the line-oriented classifier reply into a sentiment.
///
/// Expects `Sentimiento:`/`Sentiment:` (required), `Intensidad:`/`Intensity:`
/// and `Contexto:`/`Context:` lines, in Spanish or English.
pub fn parse_sentiment_reply(reply: &str) -> Result<Sentiment, ClassificationError> {
    let mut label = None;
    let mut intensity = None;
    let mut rationale = None;

    for line in reply.lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('*').to_lowercase();
        let value = value.trim().trim_matches('*').trim();

        match key.as_str() {
            "sentimiento" | "sentiment" => label = Some(parse_label(value)),
            "intensidad" | "intensity" => {
                intensity = value
                    .chars()
                    .find(|c| c.is_ascii_digit())
                    .and_then(|c| c.to_digit(10))
                    .map(|d| Intensity::clamped(d as i64));
            }
            "contexto" | "context" if !value.is_empty() => rationale = Some(value.to_string()),
            _ => {}
        }
    }

    let label = label.ok_or_else(|| {
        ClassificationError::Malformed(format!(
            "no sentiment line in reply: {:?}",
            truncate(reply, 80)
        ))
    })?;
    let intensity = intensity.unwrap_or_else(|| Intensity::clamped(DEFAULT_INTENSITY as i64));

    let mut sentiment = Sentiment::new(label, intensity);
    sentiment.rationale = rationale;
    Ok(sentiment)
}

fn parse_label(value: &str) -> SentimentLabel {
    let value = value.to_lowercase();
    if value.contains("positiv") {
        SentimentLabel::Positive
    } else if value.contains("negativ") {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Parse the `{"solved": 0|1}` resolution answer
pub fn parse_resolution_reply(reply: &str) -> Result<bool, ClassificationError> {
    let trimmed = reply.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(ClassificationError::Malformed(format!(
                "no JSON object in resolution reply: {:?}",
                truncate(trimmed, 80)
            )));
        }
    };

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ClassificationError::Malformed(format!("resolution reply: {}", e)))?;

    match value.get("solved") {
        Some(serde_json::Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) == 1),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::String(s)) => Ok(s.trim() == "1"),
        _ => Err(ClassificationError::Malformed(
            "resolution reply has no 'solved' key".to_string(),
        )),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
