//! Entity categories an extension can apply to.

use super::ExtensionError;
use serde::{Deserialize, Serialize};

/// Stored string value for connection entities.
pub const EXTENSION_KIND_CONNECTION: &str = "connection";
/// Stored string value for channel entities.
pub const EXTENSION_KIND_CHANNEL: &str = "channel";

/// Category of extensible entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    Connection,
    Channel,
}

impl ExtensionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => EXTENSION_KIND_CONNECTION,
            Self::Channel => EXTENSION_KIND_CHANNEL,
        }
    }
}

/// Parses one kind from its stored string value.
pub fn parse_extension_kind(value: &str) -> Result<ExtensionKind, ExtensionError> {
    match value.trim() {
        EXTENSION_KIND_CONNECTION => Ok(ExtensionKind::Connection),
        EXTENSION_KIND_CHANNEL => Ok(ExtensionKind::Channel),
        other => Err(ExtensionError::UnknownKind(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_extension_kind, ExtensionKind};
    use crate::extension::ExtensionError;

    #[test]
    fn parses_stored_values() {
        for kind in [ExtensionKind::Connection, ExtensionKind::Channel] {
            assert_eq!(
                parse_extension_kind(kind.as_str()).expect("stored kind parses"),
                kind
            );
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = parse_extension_kind("server").expect_err("unknown kind must fail");
        assert_eq!(err, ExtensionError::UnknownKind("server".to_string()));
    }
}
