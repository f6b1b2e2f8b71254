use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Conversation, ImprovementResult, Segment, SentimentLabel, Speaker};
use crate::stages::{AnalysisStats, AnalyzedConversation};

/// One exported segment; re-parses as structured input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub speaker: Speaker,
    pub text: String,
    /// "mm:ss" or "hh:mm:ss"
    pub timestamp: Option<String>,
    pub sentiment_label: Option<SentimentLabel>,
    pub sentiment_intensity: Option<u8>,
    pub signed_score: i8,
    pub degraded: bool,
}

impl From<&Segment> for StructuredRecord {
    fn from(segment: &Segment) -> Self {
        Self {
            speaker: segment.speaker,
            text: segment.text.clone(),
            timestamp: segment.timestamp.map(|ts| ts.to_string()),
            sentiment_label: segment.label(),
            sentiment_intensity: segment.intensity().map(|i| i.get()),
            signed_score: segment.signed_score(),
            degraded: segment.degraded,
        }
    }
}

/// Structured records for every segment, in conversation order
pub fn structured_records(conversation: &Conversation) -> Vec<StructuredRecord> {
    conversation.iter().map(StructuredRecord::from).collect()
}

/// Write the segments as a pretty JSON array of [`StructuredRecord`]
pub fn write_segments_json(conversation: &Conversation, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &structured_records(conversation))?;
    Ok(())
}

/// One row of the segment table
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    sequence: usize,
    timestamp: Option<String>,
    speaker: Speaker,
    text: &'a str,
    sentiment_label: Option<SentimentLabel>,
    sentiment_intensity: Option<u8>,
    signed_score: i8,
    degraded: bool,
}

impl<'a> From<&'a Segment> for CsvRow<'a> {
    fn from(segment: &'a Segment) -> Self {
        Self {
            sequence: segment.sequence,
            timestamp: segment.timestamp.map(|ts| ts.to_string()),
            speaker: segment.speaker,
            text: &segment.text,
            sentiment_label: segment.label(),
            sentiment_intensity: segment.intensity().map(|i| i.get()),
            signed_score: segment.signed_score(),
            degraded: segment.degraded,
        }
    }
}

fn csv_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.terminator(csv::Terminator::CRLF);
    builder
}

fn write_rows<W: Write>(conversation: &Conversation, writer: &mut csv::Writer<W>) -> Result<()> {
    for segment in conversation.iter() {
        writer.serialize(CsvRow::from(segment))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the segment table as CSV
pub fn to_csv(conversation: &Conversation) -> Result<String> {
    let mut writer = csv_builder().from_writer(Vec::new());
    write_rows(conversation, &mut writer)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write the segment table as a CSV file
pub fn write_csv(conversation: &Conversation, path: &Path) -> Result<()> {
    let mut writer = csv_builder().from_path(path)?;
    write_rows(conversation, &mut writer)
}

/// Full analysis result as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub call_id: String,
    /// RFC 3339
    pub analyzed_at: String,
    pub metrics: ImprovementResult,
    pub stats: AnalysisStats,
    pub recommendations: Vec<String>,
    /// Whether the customer's issue was resolved, when that was checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    pub segments: Vec<StructuredRecord>,
}

impl AnalysisReport {
    pub fn new(
        analyzed: &AnalyzedConversation,
        metrics: ImprovementResult,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
            metrics,
            stats: analyzed.stats.clone(),
            recommendations,
            resolved: None,
            segments: structured_records(&analyzed.conversation),
        }
    }

    pub fn with_resolution(mut self, resolved: Option<bool>) -> Self {
        self.resolved = resolved;
        self
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Plain-text call summary for terminals and reports
pub struct HumanSummary<'a> {
    report: &'a AnalysisReport,
}

impl<'a> HumanSummary<'a> {
    pub fn new(report: &'a AnalysisReport) -> Self {
        Self { report }
    }

    pub fn format(&self) -> String {
        let report = self.report;
        let metrics = &report.metrics;
        let mut output = String::new();

        output.push_str(&format!("Call {} ({})\n", report.call_id, report.analyzed_at));
        output.push_str(&format!(
            "Outcome: {} (customer {:+}, agent {:+})\n",
            metrics.outcome, metrics.customer_improvement, metrics.agent_improvement
        ));
        output.push_str(&format!(
            "Call successful: {}\n",
            if metrics.call_successful { "yes" } else { "no" }
        ));
        if let Some(resolved) = report.resolved {
            output.push_str(&format!(
                "Issue resolved: {}\n",
                if resolved { "yes" } else { "no" }
            ));
        }

        let [positive, neutral, negative] = metrics.sentiment_distribution.percentages();
        output.push_str(&format!(
            "Sentiment: {:.0}% positive, {:.0}% neutral, {:.0}% negative (dominant {})\n",
            positive, neutral, negative, metrics.dominant_sentiment
        ));
        output.push_str(&format!(
            "Segments: {} total, {} degraded, average intensity {:.2}\n",
            metrics.total_segments, metrics.degraded_segments, metrics.average_intensity
        ));
        if report.stats.cancelled {
            output.push_str("Analysis was cancelled; unfinished segments are scored neutral\n");
        }

        if !metrics.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &metrics.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }

        if !report.recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            for advice in &report.recommendations {
                output.push_str(&format!("  - {}\n", advice));
            }
        }

        output.push_str("\nTimeline:\n");
        for record in &report.segments {
            let timestamp = record.timestamp.as_deref().unwrap_or("--:--");
            let verdict = match (record.sentiment_label, record.sentiment_intensity) {
                (Some(label), Some(intensity)) if !record.degraded => {
                    format!("{} {}", label, intensity)
                }
                _ => "unscored".to_string(),
            };
            output.push_str(&format!("[{}] {} ({}):\n", timestamp, record.speaker, verdict));
            output.push_str(&indent(&wrap_text(&record.text, 76), "    "));
            output.push_str("\n");
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}\n", prefix, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeakerAliases;
    use crate::io::ConversationParser;
    use crate::models::{Intensity, Sentiment, Timestamp};
    use crate::stages::compute_improvement;

    fn annotated() -> Conversation {
        let mut segments = vec![
            Segment::new(
                Speaker::Customer,
                "No me funciona la tarjeta, \"otra vez\"",
                Some(Timestamp::from_seconds(5)),
            )
            .unwrap(),
            Segment::new(Speaker::Agent, "Lo reviso ahora", Some(Timestamp::from_seconds(3725)))
                .unwrap(),
            Segment::new(Speaker::Unknown, "línea, con coma", None).unwrap(),
        ];
        segments[0].annotate(Sentiment::new(SentimentLabel::Negative, Intensity::new(4).unwrap()));
        segments[1].annotate(Sentiment::new(SentimentLabel::Positive, Intensity::new(2).unwrap()));
        segments[2].degrade("timeout");
        Conversation::new(segments).unwrap()
    }

    #[test]
    fn test_structured_export_round_trips() {
        let conversation = annotated();
        let json = serde_json::to_string(&structured_records(&conversation)).unwrap();

        let reparsed = ConversationParser::new(SpeakerAliases::default())
            .parse(&json, None)
            .unwrap();

        let triples = |c: &Conversation| {
            c.iter()
                .map(|s| (s.speaker, s.text.clone(), s.timestamp))
                .collect::<Vec<_>>()
        };
        assert_eq!(triples(&reparsed), triples(&conversation));
    }

    #[test]
    fn test_structured_record_fields() {
        let records = structured_records(&annotated());
        assert_eq!(records[0].timestamp.as_deref(), Some("00:05"));
        assert_eq!(records[0].signed_score, -4);
        assert_eq!(records[1].timestamp.as_deref(), Some("01:02:05"));
        assert_eq!(records[2].sentiment_label, Some(SentimentLabel::Neutral));
        assert!(records[2].degraded);

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["speaker"], "Customer");
        assert_eq!(json["sentiment_label"], "negative");
        assert_eq!(json["sentiment_intensity"], 4);
    }

    #[test]
    fn test_csv_quoting() {
        let csv = to_csv(&annotated()).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert_eq!(
            lines[0],
            "sequence,timestamp,speaker,text,sentiment_label,sentiment_intensity,signed_score,degraded"
        );
        assert_eq!(
            lines[1],
            "0,00:05,Customer,\"No me funciona la tarjeta, \"\"otra vez\"\"\",negative,4,-4,false"
        );
        assert_eq!(lines[2], "1,01:02:05,Agent,Lo reviso ahora,positive,2,2,false");
        assert_eq!(lines[3], "2,,Unknown,\"línea, con coma\",neutral,1,0,true");
        assert_eq!(lines[4], "");
    }

    #[test]
    fn test_report_and_summary_files() {
        let conversation = annotated();
        let metrics = compute_improvement(&conversation);
        let analyzed = AnalyzedConversation {
            conversation,
            stats: AnalysisStats {
                classified: 2,
                degraded: 1,
                retries: 0,
                cancelled: false,
            },
        };
        let report = AnalysisReport::new(&analyzed, metrics, vec!["Follow up".to_string()])
            .with_resolution(Some(true));

        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).unwrap();

        let content = std::fs::read_to_string(&report_path).unwrap();
        let parsed: AnalysisReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.call_id, report.call_id);
        assert_eq!(parsed.resolved, Some(true));
        assert_eq!(parsed.segments.len(), 3);
        assert!(chrono::DateTime::parse_from_rfc3339(&parsed.analyzed_at).is_ok());
        assert!(uuid::Uuid::parse_str(&parsed.call_id).is_ok());

        let summary_path = dir.path().join("summary.txt");
        HumanSummary::new(&report).write_file(&summary_path).unwrap();
        let summary = std::fs::read_to_string(&summary_path).unwrap();
        assert!(summary.contains("Issue resolved: yes"));
        assert!(summary.contains("[00:05] Customer (negative 4):"));
        assert!(summary.contains("[--:--] Unknown (unscored):"));
        assert!(summary.contains("  - Follow up"));
    }

    #[test]
    fn test_segments_json_and_csv_files() {
        let conversation = annotated();
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("segments.json");
        write_segments_json(&conversation, &json_path).unwrap();
        let records: Vec<StructuredRecord> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(records, structured_records(&conversation));

        let csv_path = dir.path().join("segments.csv");
        write_csv(&conversation, &csv_path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&csv_path).unwrap(),
            to_csv(&conversation).unwrap()
        );
    }

    #[test]
    fn test_wrap_text() {
        let text = "This is a test of the text wrapping function that should wrap at 20 chars";
        let wrapped = wrap_text(text, 20);
        for line in wrapped.lines() {
            assert!(line.len() <= 25);
        }
    }
}
