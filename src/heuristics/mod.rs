pub mod speaker_roles;

pub use speaker_roles::*;

use serde::Deserialize;

/// Cue phrases used to map diarization labels to roles
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleHeuristicsConfig {
    /// Phrases an agent typically says (greetings, offers of help)
    pub agent_cues: Vec<String>,
    /// Phrases a customer typically says (complaints, requests)
    pub customer_cues: Vec<String>,
}

impl Default for RoleHeuristicsConfig {
    fn default() -> Self {
        Self {
            agent_cues: vec![
                "buenos días".to_string(),
                "buenas tardes".to_string(),
                "en qué puedo ayudarle".to_string(),
                "banco sabadell".to_string(),
                "le atiende".to_string(),
                "how can i help".to_string(),
                "thank you for calling".to_string(),
            ],
            customer_cues: vec![
                "tengo un problema".to_string(),
                "necesito ayuda".to_string(),
                "estoy molesto".to_string(),
                "no funciona".to_string(),
                "i have a problem".to_string(),
                "i need help".to_string(),
            ],
        }
    }
}
