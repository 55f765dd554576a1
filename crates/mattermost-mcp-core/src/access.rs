//! Access and transport modes.
//!
//! The access mode is fixed for the lifetime of a transport server and decides
//! which tools and argument fields are usable. Anything that can touch the
//! local filesystem or fetch arbitrary URLs is permitted under
//! [`AccessMode::Local`] only.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trust level of the caller reaching a transport server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Same machine, same user (stdio).
    Local,
    /// Reached over the network or embedded in a shared host.
    Remote,
}

impl AccessMode {
    /// All access modes, in declaration order.
    pub const ALL: [AccessMode; 2] = [AccessMode::Local, AccessMode::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Local => "local",
            AccessMode::Remote => "remote",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(AccessMode::Local),
            "remote" => Ok(AccessMode::Remote),
            other => Err(ConfigError::InvalidAccessMode(other.to_string())),
        }
    }
}

/// Transport selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Stdio => "stdio",
            TransportMode::Http => "http",
        }
    }

    /// The access mode a server started with this transport runs under.
    pub fn access_mode(&self) -> AccessMode {
        match self {
            TransportMode::Stdio => AccessMode::Local,
            TransportMode::Http => AccessMode::Remote,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "http" => Ok(TransportMode::Http),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }
}
