//! JSON modem configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mm_protocol::InterfaceMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fault::{FaultPlan, FaultRule};
use crate::gsm3gpp::Gsm3gpp;
use crate::network::Network;
use crate::sim::SimCard;
use crate::technology::{GenericModem, Technology};
use crate::timing::TimingConfig;
use crate::Modem;

/// Errors loading or applying a config
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid config JSON
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The config parsed but cannot be applied
    #[error("config rejected: {0}")]
    Invalid(String),
}

/// Which technology the modem is built with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyKind {
    #[default]
    Gsm3gpp,
    Generic,
}

fn default_home_network_visible() -> bool {
    true
}

fn default_modem_path() -> String {
    mm_protocol::modem_path(0)
}

fn default_device() -> String {
    "pseudomodem0".to_string()
}

/// Everything needed to build one modem
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModemConfig {
    #[serde(default = "default_modem_path")]
    pub path: String,
    /// Kernel device name reported in the `Device` property
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub technology: TechnologyKind,
    /// SIM to insert; the caller owns it once built
    #[serde(default)]
    pub sim: Option<SimCard>,
    /// Networks a scan reports ahead of the home network
    #[serde(default)]
    pub roaming_networks: Vec<Network>,
    #[serde(default = "default_home_network_visible")]
    pub home_network_visible: bool,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub faults: Vec<FaultRule>,
    /// Initial property values, by interface then property name
    #[serde(default)]
    pub properties: InterfaceMap,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            path: default_modem_path(),
            device: default_device(),
            technology: TechnologyKind::default(),
            sim: None,
            roaming_networks: Vec::new(),
            home_network_visible: true,
            timing: TimingConfig::default(),
            faults: Vec::new(),
            properties: InterfaceMap::new(),
        }
    }
}

impl ModemConfig {
    /// Load a config from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_error)
    }

    fn technology(&self) -> Arc<dyn Technology> {
        match self.technology {
            TechnologyKind::Gsm3gpp => Arc::new(
                Gsm3gpp::new()
                    .with_roaming_networks(self.roaming_networks.clone())
                    .with_home_network(self.home_network_visible),
            ),
            TechnologyKind::Generic => Arc::new(GenericModem),
        }
    }
}

impl Modem {
    /// Build a modem from `config`
    ///
    /// The SIM is not inserted: modems only hold SIMs weakly, so the caller
    /// keeps `config.sim` alive in an `Arc` and passes it to [`Modem::set_sim`].
    pub fn from_config(config: &ModemConfig) -> Result<Modem, ConfigError> {
        Modem::with_technology(config.technology())
            .with_path(config.path.clone())
            .with_device(&config.device)
            .with_timing(config.timing)
            .with_faults(FaultPlan::from_rules(&config.faults))
            .with_property_overrides(config.properties.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use mm_protocol::{interface, CoreError, ModemState, PropertyValue};

    use super::*;
    use crate::fault::Method;

    #[test]
    fn test_empty_object_is_default_config() {
        let config = ModemConfig::from_json("{}").unwrap();
        assert_eq!(config, ModemConfig::default());
    }

    #[test]
    fn test_from_config_applies_everything() {
        let json = r#"{
            "path": "/org/freedesktop/ModemManager1/Modem/3",
            "device": "ttyUSB3",
            "sim": {"operator_identifier": "310260", "operator_name": "Home"},
            "roaming_networks": [{"operator_code": "310410", "operator_long": "Roam"}],
            "timing": {"scan_ms": 250},
            "faults": [{"method": "scan", "behaviors": [{"behavior": "default"}]}],
            "properties": {"org.freedesktop.ModemManager1.Modem": {"Model": {"str": "PM-9"}}}
        }"#;
        let config = ModemConfig::from_json(json).unwrap();
        let modem = Modem::from_config(&config).unwrap();

        assert_eq!(modem.path(), "/org/freedesktop/ModemManager1/Modem/3");
        assert_eq!(modem.state(), ModemState::Disabled);
        assert_eq!(modem.timing().scan_ms, 250);
        assert_eq!(modem.timing().enable_ms, 0);
        assert_eq!(modem.faults().calls(Method::Scan), 0);
        assert_eq!(
            modem.get(interface::MODEM, "Device").unwrap(),
            PropertyValue::from("ttyUSB3")
        );
        assert_eq!(
            modem.get(interface::MODEM, "Model").unwrap(),
            PropertyValue::from("PM-9")
        );
        assert!(modem.sim().is_none());
        assert_eq!(config.sim.unwrap().operator_identifier, "310260");
    }

    #[test]
    fn test_generic_technology() {
        let config = ModemConfig::from_json(r#"{"technology": "generic"}"#).unwrap();
        let mut modem = Modem::from_config(&config).unwrap();
        let err = modem.unregister_with_network().unwrap_err();
        assert!(err.is(CoreError::Unsupported));
    }

    #[test]
    fn test_bad_override_is_invalid() {
        let json = r#"{
            "properties": {
                "org.freedesktop.ModemManager1.Modem": {"Model": {"u32": 1}}
            }
        }"#;
        let config = ModemConfig::from_json(json).unwrap();
        let err = Modem::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            ModemConfig::from_json("{").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
