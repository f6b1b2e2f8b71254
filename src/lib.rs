pub mod config;
pub mod error;
pub mod heuristics;
pub mod io;
pub mod llm;
pub mod models;
pub mod stages;
pub mod transcription;

pub use config::{AppConfig, FileConfig, SpeakerAliases};
pub use error::{
    AnalysisError, ClassificationError, ConfigError, Error, ParseError, Result, TranscriptionError,
};
pub use heuristics::{assign_speaker_roles, RoleHeuristicsConfig};
pub use io::{AnalysisReport, ConversationParser, HumanSummary, InputFormat, StructuredRecord};
pub use llm::{CohereClient, CohereConfig, PromptTemplate, SentimentClassifier};
pub use models::{
    CallOutcome, Conversation, ImprovementResult, Segment, Sentiment, SentimentLabel, Speaker,
    Timestamp, Transcript,
};
pub use stages::{
    build_report, compute_improvement, execute_stage3, AnalyzedConversation, AnalyzerConfig,
    ImprovementCalculator, SentimentAnalyzer, Stage3Config,
};
pub use transcription::{AssemblyAiClient, AssemblyAiConfig, Transcriber, TranscriptionConfig};
