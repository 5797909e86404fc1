//! Data bearers

use std::sync::atomic::{AtomicU32, Ordering};

use mm_protocol::{CoreError, ModemError, PropertyMap};

/// Keys a bearer may be created with
pub const ALLOWED_BEARER_PROPERTIES: &[&str] = &[
    "apn",
    "ip-type",
    "user",
    "password",
    "allow-roaming",
    "rm-protocol",
    "number",
];

static NEXT_BEARER_INDEX: AtomicU32 = AtomicU32::new(0);

/// Reject any key outside [`ALLOWED_BEARER_PROPERTIES`]
pub fn validate_bearer_properties(properties: &PropertyMap) -> Result<(), ModemError> {
    match properties
        .keys()
        .find(|key| !ALLOWED_BEARER_PROPERTIES.contains(&key.as_str()))
    {
        Some(key) => Err(ModemError::core(
            CoreError::InvalidArgs,
            format!("Invalid property \"{key}\", not creating bearer."),
        )),
        None => Ok(()),
    }
}

/// Keep only the bearer keys of a connect request
pub fn bearer_properties_from(properties: &PropertyMap) -> PropertyMap {
    properties
        .iter()
        .filter(|(key, _)| ALLOWED_BEARER_PROPERTIES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// A data session resource owned by a modem
#[derive(Debug, Clone, PartialEq)]
pub struct Bearer {
    path: String,
    properties: PropertyMap,
    connected: bool,
}

impl Bearer {
    /// Create a bearer with a fresh object path
    pub fn new(properties: PropertyMap) -> Result<Self, ModemError> {
        validate_bearer_properties(&properties)?;
        let index = NEXT_BEARER_INDEX.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            path: mm_protocol::bearer_path(index),
            properties,
            connected: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

#[cfg(test)]
mod tests {
    use mm_protocol::PropertyValue;

    use super::*;

    #[test]
    fn test_rejects_unknown_keys() {
        let props = PropertyMap::from([
            ("apn".to_string(), PropertyValue::from("internet")),
            ("pin".to_string(), PropertyValue::from("1234")),
        ]);
        let err = Bearer::new(props).unwrap_err();
        assert!(err.is(CoreError::InvalidArgs));
        assert!(err.message().contains("pin"));
    }

    #[test]
    fn test_paths_are_unique() {
        let a = Bearer::new(PropertyMap::new()).unwrap();
        let b = Bearer::new(PropertyMap::new()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with("/org/freedesktop/ModemManager1/Bearer/"));
        assert!(!a.is_connected());
    }

    #[test]
    fn test_connect_properties_are_filtered() {
        let props = PropertyMap::from([
            ("apn".to_string(), PropertyValue::from("internet")),
            ("operator-id".to_string(), PropertyValue::from("310260")),
        ]);
        let filtered = bearer_properties_from(&props);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("apn"));
    }
}
