use serde::{Deserialize, Serialize};

/// Transcript resource returned by the AssemblyAI API
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssemblyAiTranscript {
    pub id: String,
    /// queued, processing, completed or error
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<AssemblyAiUtterance>>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Duration in seconds
    #[serde(default)]
    pub audio_duration: Option<f64>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A diarized utterance
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssemblyAiUtterance {
    /// Diarization label ("A", "B", ...)
    pub speaker: String,
    pub text: String,
    /// Start in milliseconds
    pub start: u64,
    /// End in milliseconds
    pub end: u64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub words: Vec<AssemblyAiWord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssemblyAiWord {
    pub text: String,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// Provider-neutral transcription output consumed by the parser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub utterances: Vec<Utterance>,
    pub confidence: f64,
    pub audio_duration_ms: u64,
    pub language_code: Option<String>,
}

/// One speaker-labeled span of speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Provider diarization label, not yet mapped to a role
    pub speaker_label: String,
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f64,
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f64,
}

impl Transcript {
    /// Distinct diarization labels in order of first appearance
    pub fn speaker_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for utterance in &self.utterances {
            if !labels.contains(&utterance.speaker_label.as_str()) {
                labels.push(&utterance.speaker_label);
            }
        }
        labels
    }
}

impl From<AssemblyAiTranscript> for Transcript {
    fn from(raw: AssemblyAiTranscript) -> Self {
        let utterances = raw
            .utterances
            .unwrap_or_default()
            .into_iter()
            .map(|u| Utterance {
                speaker_label: u.speaker,
                text: u.text.trim().to_string(),
                start_ms: u.start,
                end_ms: u.end,
                confidence: u.confidence,
                words: u
                    .words
                    .into_iter()
                    .map(|w| Word {
                        text: w.text,
                        start_ms: w.start,
                        end_ms: w.end,
                        confidence: w.confidence,
                    })
                    .collect(),
            })
            .collect();

        Self {
            utterances,
            confidence: raw.confidence.unwrap_or(0.0),
            audio_duration_ms: (raw.audio_duration.unwrap_or(0.0) * 1000.0) as u64,
            language_code: raw.language_code,
        }
    }
}
