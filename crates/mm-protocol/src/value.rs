//! Property values carried on the control-plane surface

use std::collections::BTreeMap;

/// Properties of one interface, keyed by property name
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Properties of every interface on an object, keyed by interface name
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PropertyValue {
    Bool(bool),
    I32(i32),
    U32(u32),
    Str(String),
    StrList(Vec<String>),
    U32List(Vec<u32>),
    ObjectPath(String),
    /// Signal quality percentage and whether it was sampled recently
    SignalQuality(u32, bool),
    /// Remaining unlock attempts keyed by lock wire value
    LockRetries(BTreeMap<u32, u32>),
}

impl PropertyValue {
    /// Short name of the value's type, used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::I32(_) => "i32",
            PropertyValue::U32(_) => "u32",
            PropertyValue::Str(_) => "string",
            PropertyValue::StrList(_) => "string list",
            PropertyValue::U32List(_) => "u32 list",
            PropertyValue::ObjectPath(_) => "object path",
            PropertyValue::SignalQuality(..) => "signal quality",
            PropertyValue::LockRetries(_) => "lock retries",
        }
    }

    /// True if `other` may replace `self` without changing the schema
    pub fn same_type(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PropertyValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropertyValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// String content of a string or object path value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) | PropertyValue::ObjectPath(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32_list(&self) -> Option<&[u32]> {
        match self {
            PropertyValue::U32List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::StrList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::I32(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::U32(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::StrList(v)
    }
}

impl From<Vec<u32>> for PropertyValue {
    fn from(v: Vec<u32>) -> Self {
        PropertyValue::U32List(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_ignores_content() {
        assert!(PropertyValue::U32(1).same_type(&PropertyValue::U32(99)));
        assert!(!PropertyValue::U32(1).same_type(&PropertyValue::I32(1)));
        assert!(!PropertyValue::Str("/".into()).same_type(&PropertyValue::ObjectPath("/".into())));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(PropertyValue::I32(-1).as_i32(), Some(-1));
        assert_eq!(PropertyValue::I32(-1).as_u32(), None);
        assert_eq!(PropertyValue::ObjectPath("/".into()).as_str(), Some("/"));
        assert_eq!(PropertyValue::from(vec![1u32, 2]).as_u32_list(), Some(&[1u32, 2][..]));
        assert_eq!(PropertyValue::SignalQuality(80, true).type_name(), "signal quality");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_tagged_form() {
        let value = PropertyValue::U32(3);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"u32":3}"#);
        let parsed: PropertyValue = serde_json::from_str(r#"{"str_list":["a","b"]}"#).unwrap();
        assert_eq!(parsed, PropertyValue::StrList(vec!["a".into(), "b".into()]));
        let retries: PropertyValue = serde_json::from_str(r#"{"lock_retries":{"2":3}}"#).unwrap();
        assert_eq!(retries, PropertyValue::LockRetries(BTreeMap::from([(2, 3)])));
    }
}
