use serde::{Deserialize, Serialize};

/// Software and upstream revisions applied to this node, persisted at
/// `<root>/meta.json` and rewritten in full on every successful provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub version: String,
    pub config_stream: String,
    pub volume_manager_stream: String,
    #[serde(default)]
    pub os_id: String,
    #[serde(default)]
    pub os_version: String,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            version: "0.0.0".to_string(),
            config_stream: "master".to_string(),
            volume_manager_stream: "master".to_string(),
            os_id: String::new(),
            os_version: String::new(),
        }
    }
}

impl Meta {
    /// Whether applying `config_stream` changes the primary upstream revision.
    pub fn config_stream_changed(&self, config_stream: &str) -> bool {
        self.config_stream != config_stream
    }
}
