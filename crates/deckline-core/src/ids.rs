use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Newtype over a host-assigned identifier string. These are never generated
/// locally; they arrive on the wire or come out of the plugin's manifest.
macro_rules! wire_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

wire_id!(PluginId);
wire_id!(EntityId);
wire_id!(InstanceId);
wire_id!(ShortId);

/// Locally-generated identifier for notifications shown on the host.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new() -> Self {
        Self(format!("notif_{}", Uuid::now_v7()))
    }

    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_ids_preserve_raw_value() {
        let id = EntityId::from_raw("com.example.plugin.action.play");
        assert_eq!(id.as_str(), "com.example.plugin.action.play");
        assert_eq!(id.to_string(), "com.example.plugin.action.play");
    }

    #[test]
    fn wire_id_equality_is_exact() {
        let a = PluginId::from_raw("com.example.Plugin");
        let b = PluginId::from_raw("com.example.plugin");
        assert_ne!(a, b);
    }

    #[test]
    fn wire_id_from_str_roundtrip() {
        let id: EntityId = "x.y.z".parse().unwrap();
        assert_eq!(id, EntityId::from_raw("x.y.z"));
    }

    #[test]
    fn wire_id_serde_is_transparent() {
        let id = ShortId::from_raw("s1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""s1""#);
        let parsed: ShortId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn notification_id_has_prefix() {
        let id = NotificationId::new();
        assert!(id.as_str().starts_with("notif_"), "got: {id}");
    }

    #[test]
    fn notification_ids_are_unique() {
        let a = NotificationId::new();
        let b = NotificationId::new();
        assert_ne!(a, b);
    }
}
