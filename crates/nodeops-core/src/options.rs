use serde::{Deserialize, Serialize};

/// Feature flags for the node, persisted at `<root>/node_data/node_options.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeOptions {
    pub archive: bool,
    pub catchup: bool,
    pub historic_state: bool,
}

impl NodeOptions {
    pub const KEYS: [&'static str; 3] = ["archive", "catchup", "historic_state"];

    pub fn get(&self, key: &str) -> anyhow::Result<bool> {
        match key {
            "archive" => Ok(self.archive),
            "catchup" => Ok(self.catchup),
            "historic_state" => Ok(self.historic_state),
            other => anyhow::bail!("unknown node option: {other}"),
        }
    }

    pub fn set(&mut self, key: &str, value: bool) -> anyhow::Result<()> {
        match key {
            "archive" => self.archive = value,
            "catchup" => self.catchup = value,
            "historic_state" => self.historic_state = value,
            other => anyhow::bail!("unknown node option: {other}"),
        }
        Ok(())
    }
}
