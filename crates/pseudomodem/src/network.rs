//! Networks reported by a scan

use mm_protocol::{AccessTechnologies, NetworkAvailability};
use serde::{Deserialize, Serialize};

/// One network visible to the modem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// MCC/MNC operator code
    pub operator_code: String,
    pub operator_long: String,
    #[serde(default)]
    pub operator_short: String,
    #[serde(default)]
    pub status: NetworkAvailability,
    #[serde(default)]
    pub access_technology: AccessTechnologies,
}

impl Network {
    pub fn new(operator_code: impl Into<String>, operator_name: impl Into<String>) -> Self {
        let operator_long = operator_name.into();
        Self {
            operator_code: operator_code.into(),
            operator_short: operator_long.clone(),
            operator_long,
            status: NetworkAvailability::Available,
            access_technology: AccessTechnologies::GSM | AccessTechnologies::UMTS,
        }
    }

    pub fn with_access_technology(mut self, tech: AccessTechnologies) -> Self {
        self.access_technology = tech;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let net: Network =
            serde_json::from_str(r#"{"operator_code":"310410","operator_long":"Roam"}"#).unwrap();
        assert_eq!(net.operator_code, "310410");
        assert_eq!(net.status, NetworkAvailability::Available);
        assert!(net.operator_short.is_empty());
    }
}
