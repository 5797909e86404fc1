//! SIM card descriptor
//!
//! A SIM outlives any modem it sits in. Modems only keep a weak reference,
//! so dropping the last `Arc<SimCard>` is the same as pulling the card.

use mm_protocol::AccessTechnologies;
use serde::{Deserialize, Serialize};

fn default_sim_path() -> String {
    mm_protocol::sim_path(0)
}

fn default_access_technology() -> AccessTechnologies {
    AccessTechnologies::GSM | AccessTechnologies::UMTS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCard {
    #[serde(default = "default_sim_path")]
    pub path: String,
    #[serde(default)]
    pub imsi: String,
    #[serde(default)]
    pub sim_identifier: String,
    /// MCC/MNC of the home network
    pub operator_identifier: String,
    pub operator_name: String,
    #[serde(default = "default_access_technology")]
    pub access_technology: AccessTechnologies,
}

impl SimCard {
    pub fn new(operator_identifier: impl Into<String>, operator_name: impl Into<String>) -> Self {
        let operator_identifier = operator_identifier.into();
        Self {
            path: default_sim_path(),
            imsi: format!("{operator_identifier}0123456789"),
            sim_identifier: "89010000000000000000".to_string(),
            operator_identifier,
            operator_name: operator_name.into(),
            access_technology: default_access_technology(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}
