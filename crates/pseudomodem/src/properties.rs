//! Property store for one modem object

use mm_protocol::{
    CoreError, InterfaceMap, ModemError, PropertyError, PropertyMap, PropertyValue,
};
use tracing::debug;

/// Interface-keyed property store
///
/// The set of interfaces and property names, and the type of each value, is
/// fixed when the store is built. Later writes may change values but never
/// add properties or change their types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyStore {
    interfaces: InterfaceMap,
}

impl PropertyStore {
    pub fn new(interfaces: InterfaceMap) -> Self {
        Self { interfaces }
    }

    pub fn get(&self, interface: &str, name: &str) -> Result<&PropertyValue, ModemError> {
        self.get_all(interface)?.get(name).ok_or_else(|| {
            ModemError::property(
                PropertyError::UnknownProperty,
                format!("Property \"{name}\" not found on interface \"{interface}\""),
            )
        })
    }

    pub fn get_all(&self, interface: &str) -> Result<&PropertyMap, ModemError> {
        self.interfaces.get(interface).ok_or_else(|| {
            ModemError::property(
                PropertyError::UnknownInterface,
                format!("Interface \"{interface}\" not found"),
            )
        })
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }

    pub fn interfaces(&self) -> &InterfaceMap {
        &self.interfaces
    }

    /// Replace a value, returning the previous one
    ///
    /// Fails if the property does not exist or `value` has a different type.
    pub fn set(
        &mut self,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<PropertyValue, ModemError> {
        let current = self.get(interface, name)?;
        if !current.same_type(&value) {
            return Err(ModemError::core(
                CoreError::InvalidArgs,
                format!(
                    "Property \"{name}\" expects {}, got {}",
                    current.type_name(),
                    value.type_name()
                ),
            ));
        }
        debug!("Set {interface}.{name} = {value:?}");
        let slot = self
            .interfaces
            .get_mut(interface)
            .and_then(|props| props.get_mut(name))
            .ok_or_else(|| ModemError::core(CoreError::Failed, "property vanished"))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Apply a batch of overrides, all-or-nothing
    pub fn apply(&mut self, overrides: &InterfaceMap) -> Result<(), ModemError> {
        let mut staged = self.clone();
        for (interface, props) in overrides {
            for (name, value) in props {
                staged.set(interface, name, value.clone())?;
            }
        }
        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PropertyStore {
        let mut modem = PropertyMap::new();
        modem.insert("State".into(), PropertyValue::I32(3));
        modem.insert("Model".into(), PropertyValue::from("PM-3000"));
        PropertyStore::new(InterfaceMap::from([("Modem".to_string(), modem)]))
    }

    #[test]
    fn test_unknown_interface_and_property() {
        let store = store();
        assert!(store
            .get("Nope", "State")
            .unwrap_err()
            .is(PropertyError::UnknownInterface));
        assert!(store
            .get("Modem", "Nope")
            .unwrap_err()
            .is(PropertyError::UnknownProperty));
    }

    #[test]
    fn test_set_keeps_schema() {
        let mut store = store();
        let old = store.set("Modem", "State", PropertyValue::I32(6)).unwrap();
        assert_eq!(old, PropertyValue::I32(3));
        assert_eq!(store.get("Modem", "State").unwrap(), &PropertyValue::I32(6));

        let err = store.set("Modem", "State", PropertyValue::U32(6)).unwrap_err();
        assert!(err.is(CoreError::InvalidArgs));
        assert_eq!(store.get("Modem", "State").unwrap(), &PropertyValue::I32(6));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut store = store();
        let overrides = InterfaceMap::from([(
            "Modem".to_string(),
            PropertyMap::from([
                ("Model".to_string(), PropertyValue::from("PM-4000")),
                ("Bogus".to_string(), PropertyValue::from("x")),
            ]),
        )]);
        assert!(store.apply(&overrides).is_err());
        assert_eq!(
            store.get("Modem", "Model").unwrap(),
            &PropertyValue::from("PM-3000")
        );
    }
}
