use std::collections::HashMap;

use tracing::debug;

use super::RoleHeuristicsConfig;
use crate::models::{Speaker, Transcript};

/// Assign a Customer/Agent role to every diarization label.
///
/// Each label collects votes from cue phrases in its utterances: agent
/// greetings on one side, customer complaints on the other. A label whose
/// votes lean one way takes that role. Otherwise the first label heard is
/// the agent (agents answer the call) and later labels are customers, unless
/// the agent role was already claimed by cues.
pub fn assign_speaker_roles(
    transcript: &Transcript,
    config: &RoleHeuristicsConfig,
) -> HashMap<String, Speaker> {
    let labels = transcript.speaker_labels();
    let mut votes: HashMap<&str, i32> = HashMap::new();

    for utterance in &transcript.utterances {
        let text = utterance.text.to_lowercase();
        let agent_hits = config
            .agent_cues
            .iter()
            .filter(|cue| text.contains(cue.as_str()))
            .count() as i32;
        let customer_hits = config
            .customer_cues
            .iter()
            .filter(|cue| text.contains(cue.as_str()))
            .count() as i32;
        *votes.entry(utterance.speaker_label.as_str()).or_insert(0) += agent_hits - customer_hits;
    }

    let mut roles = HashMap::new();
    let agent_claimed = labels.iter().any(|l| votes.get(l).copied().unwrap_or(0) > 0);

    for (position, label) in labels.iter().enumerate() {
        let vote = votes.get(label).copied().unwrap_or(0);
        let role = if vote > 0 {
            Speaker::Agent
        } else if vote < 0 {
            Speaker::Customer
        } else if position == 0 && !agent_claimed {
            Speaker::Agent
        } else {
            Speaker::Customer
        };
        debug!("Diarization label {} -> {} (cue vote {})", label, role, vote);
        roles.insert(label.to_string(), role);
    }

    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Utterance;

    fn utterance(label: &str, text: &str, start_ms: u64) -> Utterance {
        Utterance {
            speaker_label: label.to_string(),
            text: text.to_string(),
            start_ms,
            end_ms: start_ms + 1000,
            confidence: 0.9,
            words: vec![],
        }
    }

    fn transcript(utterances: Vec<Utterance>) -> Transcript {
        Transcript {
            utterances,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_speaker_is_agent_without_cues() {
        let t = transcript(vec![
            utterance("A", "hola", 0),
            utterance("B", "hola", 1000),
            utterance("A", "dígame", 2000),
        ]);

        let roles = assign_speaker_roles(&t, &RoleHeuristicsConfig::default());
        assert_eq!(roles["A"], Speaker::Agent);
        assert_eq!(roles["B"], Speaker::Customer);
    }

    #[test]
    fn test_cues_override_first_speaker() {
        let t = transcript(vec![
            utterance("A", "Tengo un problema con mi tarjeta", 0),
            utterance("B", "Buenos días, Banco Sabadell, ¿en qué puedo ayudarle?", 1000),
        ]);

        let roles = assign_speaker_roles(&t, &RoleHeuristicsConfig::default());
        assert_eq!(roles["A"], Speaker::Customer);
        assert_eq!(roles["B"], Speaker::Agent);
    }

    #[test]
    fn test_agent_cue_on_second_label_demotes_first() {
        let t = transcript(vec![
            utterance("A", "hola", 0),
            utterance("B", "buenas tardes, le atiende Marta", 1000),
        ]);

        let roles = assign_speaker_roles(&t, &RoleHeuristicsConfig::default());
        assert_eq!(roles["A"], Speaker::Customer);
        assert_eq!(roles["B"], Speaker::Agent);
    }
}
