//! OSCQuery attribute names and access modes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{OscValue, widen_f32};

// Required attributes
pub const CONTENTS: &str = "CONTENTS";
pub const HOST_INFO: &str = "HOST_INFO";
pub const FULL_PATH: &str = "FULL_PATH";
pub const TYPE: &str = "TYPE";

// Optional attributes
pub const ACCESS: &str = "ACCESS";
pub const CLIPMODE: &str = "CLIPMODE";
pub const CRITICAL: &str = "CRITICAL";
pub const DESCRIPTION: &str = "DESCRIPTION";
pub const EXTENDED_TYPE: &str = "EXTENDED_TYPE";
pub const HTML: &str = "HTML";
pub const OVERLOADS: &str = "OVERLOADS";
pub const RANGE: &str = "RANGE";
pub const TAGS: &str = "TAGS";
pub const UNIT: &str = "UNIT";
pub const VALUE: &str = "VALUE";

/// Query marker that asks for the explorer page.
pub const EXPLORER: &str = "?explorer";

/// Access mode of a node, carried on the wire as an integer.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AccessValues {
    #[default]
    NoValue = 0,
    ReadOnly = 1,
    WriteOnly = 2,
    ReadWrite = 3,
}

impl From<AccessValues> for u8 {
    fn from(access: AccessValues) -> Self {
        access as u8
    }
}

impl TryFrom<u8> for AccessValues {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AccessValues::NoValue),
            1 => Ok(AccessValues::ReadOnly),
            2 => Ok(AccessValues::WriteOnly),
            3 => Ok(AccessValues::ReadWrite),
            _ => Err(format!("invalid ACCESS value {v}")),
        }
    }
}

impl fmt::Display for AccessValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            AccessValues::NoValue => "NoValue",
            AccessValues::ReadOnly => "ReadOnly",
            AccessValues::WriteOnly => "WriteOnly",
            AccessValues::ReadWrite => "ReadWrite",
        };
        write!(f, "{s}")
    }
}

/// Rust types with a fixed OSC type tag.
///
/// ```rust
/// use oscquery::OscTyped;
///
/// assert_eq!(i32::OSC_TYPE, "i");
/// assert_eq!(bool::OSC_TYPE, "T");
/// ```
pub trait OscTyped {
    const OSC_TYPE: &'static str;

    fn to_osc_value(&self) -> OscValue;
}

macro_rules! osc_typed {
    ($ty:ty, $tag:literal, |$v:ident| $conv:expr) => {
        impl OscTyped for $ty {
            const OSC_TYPE: &'static str = $tag;

            fn to_osc_value(&self) -> OscValue {
                let $v = self;
                $conv
            }
        }
    };
}

osc_typed!(i32, "i", |v| OscValue::Int(i64::from(*v)));
osc_typed!(u32, "u", |v| OscValue::Int(i64::from(*v)));
osc_typed!(i64, "h", |v| OscValue::Int(*v));
osc_typed!(f32, "f", |v| OscValue::Float(widen_f32(*v)));
osc_typed!(f64, "d", |v| OscValue::Float(*v));
osc_typed!(String, "s", |v| OscValue::String(v.clone()));
osc_typed!(char, "c", |v| OscValue::String(v.to_string()));
osc_typed!(Vec<u8>, "b", |v| OscValue::Blob(v.clone()));
osc_typed!(bool, "T", |v| OscValue::Bool(*v));

/// OSC type tag for `T`, the equivalent of looking up a runtime type.
pub fn osc_type_for<T: OscTyped>() -> &'static str {
    T::OSC_TYPE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_access_wire_format() -> shared::error::Result<()> {
        assert_eq!(serde_json::to_string(&AccessValues::ReadWrite)?, "3");
        assert_eq!(serde_json::from_str::<AccessValues>("2")?, AccessValues::WriteOnly);
        assert!(serde_json::from_str::<AccessValues>("4").is_err());
        assert_eq!(AccessValues::default().to_string(), "NoValue");
        Ok(())
    }

    #[test]
    fn test_osc_type_for() {
        assert_eq!(osc_type_for::<i32>(), "i");
        assert_eq!(osc_type_for::<u32>(), "u");
        assert_eq!(osc_type_for::<i64>(), "h");
        assert_eq!(osc_type_for::<f32>(), "f");
        assert_eq!(osc_type_for::<f64>(), "d");
        assert_eq!(osc_type_for::<String>(), "s");
        assert_eq!(osc_type_for::<char>(), "c");
        assert_eq!(osc_type_for::<Vec<u8>>(), "b");
        assert_eq!(osc_type_for::<bool>(), "T");

        assert_eq!('x'.to_osc_value(), OscValue::String("x".to_owned()));
        assert_eq!(2.5f32.to_osc_value(), OscValue::Float(2.5));
        assert_eq!(0.1f32.to_osc_value(), OscValue::Float(0.1));
    }
}
