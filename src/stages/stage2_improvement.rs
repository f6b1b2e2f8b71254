use tracing::info;

use crate::models::{
    CallOutcome, Conversation, ImprovementResult, ResultWarning, Segment, SentimentDistribution,
    Speaker, SpeakerTrend,
};

/// Minimum segments needed before the half-vs-half trend means anything
const OVERALL_TREND_MIN_SEGMENTS: usize = 4;

/// Stage 2: reduce an annotated conversation to improvement metrics.
///
/// Pure and deterministic: no I/O, same input always gives the same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImprovementCalculator;

impl ImprovementCalculator {
    pub fn compute(&self, conversation: &Conversation) -> ImprovementResult {
        compute_improvement(conversation)
    }
}

/// Compute per-speaker improvement, success flag and distribution
pub fn compute_improvement(conversation: &Conversation) -> ImprovementResult {
    let customer_segments: Vec<&Segment> = conversation.by_speaker(Speaker::Customer).collect();
    let agent_segments: Vec<&Segment> = conversation.by_speaker(Speaker::Agent).collect();

    let (customer, customer_improvement) = speaker_trend(&customer_segments);
    let (agent, agent_improvement) = speaker_trend(&agent_segments);

    let mut sentiment_distribution = SentimentDistribution::default();
    for label in conversation.iter().filter_map(Segment::label) {
        sentiment_distribution.record(label);
    }

    let intensities: Vec<f64> = conversation
        .iter()
        .filter_map(Segment::intensity)
        .map(|i| i.get() as f64)
        .collect();
    let average_intensity = if intensities.is_empty() {
        0.0
    } else {
        round2(intensities.iter().sum::<f64>() / intensities.len() as f64)
    };

    let degraded_segments = conversation.degraded_count();

    let mut warnings = Vec::new();
    if customer.segments == 0 || agent.segments == 0 {
        warnings.push(ResultWarning::SingleSpeakerRole);
    }
    if customer.insufficient_data {
        warnings.push(ResultWarning::InsufficientData(Speaker::Customer));
    }
    if agent.insufficient_data {
        warnings.push(ResultWarning::InsufficientData(Speaker::Agent));
    }
    if degraded_segments > 0 {
        warnings.push(ResultWarning::DegradedSegments(degraded_segments));
    }

    let result = ImprovementResult {
        customer_improvement,
        agent_improvement,
        call_successful: customer_improvement > 0,
        sentiment_distribution,
        customer,
        agent,
        overall_improvement: overall_improvement(conversation.segments()),
        outcome: CallOutcome::from_improvement(customer_improvement),
        average_intensity,
        dominant_sentiment: sentiment_distribution.dominant(),
        total_segments: conversation.len(),
        degraded_segments,
        degraded: degraded_segments > 0,
        warnings,
    };

    info!(
        "Stage 2: customer {:+}, agent {:+}, successful={}, degraded segments={}",
        result.customer_improvement,
        result.agent_improvement,
        result.call_successful,
        result.degraded_segments
    );

    result
}

/// Last-minus-first signed score for one role's segments
fn speaker_trend(segments: &[&Segment]) -> (SpeakerTrend, i32) {
    let first = segments.first().map(|s| s.signed_score());
    let last = segments.last().map(|s| s.signed_score());

    let improvement = match (first, last) {
        (Some(first), Some(last)) if segments.len() >= 2 => last as i32 - first as i32,
        _ => 0,
    };

    let trend = SpeakerTrend {
        segments: segments.len(),
        first_score: first,
        last_score: last,
        insufficient_data: segments.len() < 2,
    };
    (trend, improvement)
}

/// Second-half mean signed score minus first-half mean, over every segment
fn overall_improvement(segments: &[Segment]) -> f64 {
    if segments.len() < OVERALL_TREND_MIN_SEGMENTS {
        return 0.0;
    }
    let midpoint = segments.len() / 2;
    let mean = |half: &[Segment]| {
        half.iter().map(|s| s.signed_score() as f64).sum::<f64>() / half.len() as f64
    };
    round2(mean(&segments[midpoint..]) - mean(&segments[..midpoint]))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Actionable advice derived from the customer trend
pub fn recommendations(result: &ImprovementResult) -> Vec<String> {
    let improvement = result.customer_improvement;
    let mut advice = Vec::new();

    if improvement > 1 {
        advice.push("Excellent customer experience: call resolved successfully".to_string());
    } else if improvement > 0 {
        advice.push("Customer sentiment improved during the call".to_string());
    } else if improvement < -1 {
        advice.push("Customer satisfaction declined: follow-up recommended".to_string());
    } else {
        advice.push("Customer sentiment remained stable".to_string());
    }

    if improvement < 0 {
        advice.push("Consider a proactive follow-up call".to_string());
    }
    if result.warnings.contains(&ResultWarning::SingleSpeakerRole) {
        advice.push("Check speaker labels: only one of Customer/Agent was recognized".to_string());
    }
    if result.degraded {
        advice.push(format!(
            "{} segment(s) were scored neutral after classification failed; re-run for a reliable score",
            result.degraded_segments
        ));
    }

    advice
}
