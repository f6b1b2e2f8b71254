use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use callsentiment::io::write_segments_json;
use callsentiment::llm::COHERE_API_KEY_VAR;
use callsentiment::{
    build_report, execute_stage3, AppConfig, AssemblyAiClient, CohereClient, Conversation,
    ConversationParser, HumanSummary, ImprovementCalculator, InputFormat, SentimentAnalyzer,
    Stage3Config,
};

#[derive(Parser)]
#[command(name = "callsentiment")]
#[command(author, version, about = "Call-center conversation sentiment analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a conversation and report validation statistics (no network)
    Parse {
        /// Conversation file (simple, timestamped or structured JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format; auto-detected when omitted
        #[arg(short, long)]
        format: Option<InputFormat>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Classify every segment and measure sentiment improvement
    Analyze {
        /// Conversation file (simple, timestamped or structured JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format; auto-detected when omitted
        #[arg(short, long)]
        format: Option<InputFormat>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the analysis report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file for annotated segment records (JSON)
        #[arg(long)]
        segments: Option<PathBuf>,

        /// Output file for the segment table (CSV)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Output file for the human-readable summary (text)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Maximum classifier calls in flight (1 = sequential)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Also ask the model whether the customer's issue was resolved
        #[arg(long)]
        check_resolution: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Transcribe call audio into structured segment records
    Transcribe {
        /// Audio file (wav, mp3, m4a, ...)
        #[arg(short, long)]
        audio: PathBuf,

        /// Output file for segment records (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Spoken language code
        #[arg(long)]
        language: Option<String>,

        /// Expected number of speakers
        #[arg(long)]
        speakers: Option<u32>,

        /// Stereo audio with one speaker per channel
        #[arg(long)]
        dual_channel: bool,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            input,
            format,
            config,
            verbose,
        } => {
            setup_logging(verbose);
            let config = load_config(config.as_deref())?;
            parse_conversation(&input, format, &config)
        }
        Commands::Analyze {
            input,
            format,
            config,
            output,
            segments,
            csv,
            summary,
            concurrency,
            check_resolution,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = load_config(config.as_deref())?;
            if let Some(concurrency) = concurrency {
                anyhow::ensure!(concurrency > 0, "--concurrency must be at least 1");
                config.analyzer.concurrency = concurrency;
            }
            let outputs = Stage3Config {
                report: output,
                segments,
                csv,
                summary,
            };
            analyze_conversation(&input, format, &config, &outputs, check_resolution).await
        }
        Commands::Transcribe {
            audio,
            output,
            language,
            speakers,
            dual_channel,
            config,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = load_config(config.as_deref())?;
            if let Some(language) = language {
                config.transcription.language_code = language;
            }
            if let Some(speakers) = speakers {
                config.transcription.speakers_expected = speakers;
            }
            if dual_channel {
                config.transcription.dual_channel = true;
            }
            transcribe_audio(&audio, &output, &config).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(level);
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()).ok();
        }
        Err(_) => {
            tracing::subscriber::set_global_default(builder.finish()).ok();
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(path).context("Failed to load configuration")
}

fn parser_for(config: &AppConfig) -> ConversationParser {
    ConversationParser::new(config.aliases.clone())
        .with_role_heuristics(config.role_heuristics.clone())
}

fn parse_conversation(input: &Path, format: Option<InputFormat>, config: &AppConfig) -> Result<()> {
    info!("Parsing conversation from {:?}", input);
    let conversation = parser_for(config)
        .parse_file(input, format)
        .context("Failed to parse conversation")?;
    let validation = conversation.validate();

    println!("Conversation Validation");
    println!("=======================");
    println!("Total segments: {}", validation.total_segments);
    for (speaker, count) in &validation.speaker_counts {
        println!("{} segments: {}", speaker, count);
    }
    println!("Average text length: {:.1} chars", validation.avg_text_length);
    println!("Timestamped: {}", if validation.timestamped { "yes" } else { "no" });
    println!();

    if validation.is_clean() {
        println!("Ready for analysis");
    } else {
        println!("Issues");
        println!("------");
        for issue in &validation.issues {
            println!("- {}", issue);
        }
    }

    Ok(())
}

async fn analyze_conversation(
    input: &Path,
    format: Option<InputFormat>,
    config: &AppConfig,
    outputs: &Stage3Config,
    check_resolution: bool,
) -> Result<()> {
    info!("Loading conversation from {:?}", input);
    let conversation = parser_for(config)
        .parse_file(input, format)
        .context("Failed to parse conversation")?;

    for issue in &conversation.validate().issues {
        warn!("{}", issue);
    }

    let cohere_config = config.cohere_config()?;
    let client = Arc::new(CohereClient::new(cohere_config));

    match client.test_connection().await {
        Ok(()) => info!("Connected to sentiment service"),
        Err(e) => match e.credential_error(COHERE_API_KEY_VAR) {
            Some(invalid) => {
                return Err(invalid).context("Sentiment service rejected the credentials");
            }
            None => warn!("Connection check failed ({}); continuing with retries", e),
        },
    }

    // Stage 1: Sentiment classification
    let analyzer = SentimentAnalyzer::new(
        client.clone(),
        Arc::new(config.prompt.clone()),
        config.analyzer.clone(),
    );
    let analyzed = analyzer
        .analyze_until(conversation, interrupted())
        .await
        .context("Sentiment analysis failed")?;

    if analyzed.stats.cancelled {
        warn!("Analysis interrupted; reporting partial results");
    }

    // Stage 2: Improvement metrics
    info!("Stage 2: computing improvement metrics");
    let metrics = ImprovementCalculator.compute(&analyzed.conversation);

    let resolved = if check_resolution && !analyzed.stats.cancelled {
        let transcript = plain_transcript(&analyzed.conversation);
        match client.assess_resolution(&transcript).await {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                warn!("Resolution check failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Stage 3: Rendering
    info!("Stage 3: rendering output");
    let report = build_report(&analyzed, metrics, resolved);
    execute_stage3(&report, &analyzed, outputs).context("Failed to write analysis output")?;

    print!("{}", HumanSummary::new(&report).format());

    Ok(())
}

async fn transcribe_audio(audio: &Path, output: &Path, config: &AppConfig) -> Result<()> {
    info!("Reading audio from {:?}", audio);
    let bytes = std::fs::read(audio).with_context(|| format!("Failed to read file: {:?}", audio))?;

    let client = AssemblyAiClient::new(config.assemblyai_config()?);
    let conversation = parser_for(config)
        .parse_audio(&client, bytes, &config.transcription)
        .await
        .context("Failed to transcribe audio")?;

    write_segments_json(&conversation, output)
        .with_context(|| format!("Failed to write segments to {:?}", output))?;

    let validation = conversation.validate();
    info!(
        "Wrote {} segments to {:?} ({:?})",
        validation.total_segments, output, validation.speaker_counts
    );

    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, cancelling analysis");
}

fn plain_transcript(conversation: &Conversation) -> String {
    conversation
        .iter()
        .map(|s| format!("{}: {}", s.speaker, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}
