use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod config;
pub mod error;
pub mod logging;
pub mod transport;

pub use error::{Error, Result};

/// DHCP Unique Identifier. Opaque bytes identifying a client or server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Duid {
    pub bytes: Vec<u8>,
}

impl Duid {
    /// Colon separated lowercase hex, `00:02:00:01`
    pub fn to_colon_string(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Duid {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for Duid {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }
}

impl PartialEq<[u8]> for Duid {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl fmt::Display for Duid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_colon_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDuidError(String);

impl fmt::Display for ParseDuidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid DUID: {}", self.0)
    }
}

impl std::error::Error for ParseDuidError {}

impl FromStr for Duid {
    type Err = ParseDuidError;

    /// Accepts hex with or without `:` or `-` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .collect();
        if hex.is_empty() || hex.len() % 2 != 0 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseDuidError(s.to_owned()));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| ParseDuidError(s.to_owned()))?;
        Ok(Self { bytes })
    }
}

impl Serialize for Duid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_colon_string())
    }
}

impl<'de> Deserialize<'de> for Duid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
