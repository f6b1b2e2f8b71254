use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::io::{write_csv, write_segments_json, AnalysisReport, HumanSummary};
use crate::models::ImprovementResult;
use crate::stages::{recommendations, AnalyzedConversation};

/// Where Stage 3 writes each view; `None` skips that view
#[derive(Debug, Clone, Default)]
pub struct Stage3Config {
    /// Full analysis report (JSON)
    pub report: Option<PathBuf>,
    /// Segment records (JSON), re-parseable as structured input
    pub segments: Option<PathBuf>,
    /// Segment table (CSV)
    pub csv: Option<PathBuf>,
    /// Human-readable summary (text)
    pub summary: Option<PathBuf>,
}

/// Paths actually written by Stage 3
#[derive(Debug, Default)]
pub struct Stage3Result {
    pub report_path: Option<PathBuf>,
    pub segments_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
}

/// Assemble the report for an analyzed conversation
pub fn build_report(
    analyzed: &AnalyzedConversation,
    metrics: ImprovementResult,
    resolved: Option<bool>,
) -> AnalysisReport {
    let advice = recommendations(&metrics);
    AnalysisReport::new(analyzed, metrics, advice).with_resolution(resolved)
}

/// Execute Stage 3: Rendering
///
/// Writes each configured view of the analysis. The report and segment
/// records are JSON, the table is CSV and the summary is plain text.
pub fn execute_stage3(
    report: &AnalysisReport,
    analyzed: &AnalyzedConversation,
    config: &Stage3Config,
) -> Result<Stage3Result> {
    let mut result = Stage3Result::default();

    if let Some(path) = &config.report {
        info!("Writing analysis report to {:?}", path);
        report.write_json(path)?;
        result.report_path = Some(path.clone());
    }

    if let Some(path) = &config.segments {
        info!("Writing segment records to {:?}", path);
        write_segments_json(&analyzed.conversation, path)?;
        result.segments_path = Some(path.clone());
    }

    if let Some(path) = &config.csv {
        info!("Writing segment table to {:?}", path);
        write_csv(&analyzed.conversation, path)?;
        result.csv_path = Some(path.clone());
    }

    if let Some(path) = &config.summary {
        info!("Writing summary to {:?}", path);
        HumanSummary::new(report).write_file(path)?;
        result.summary_path = Some(path.clone());
    }

    Ok(result)
}
