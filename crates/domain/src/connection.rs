use serde::{Deserialize, Serialize};

/// Lifecycle state of the single printer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// No transport open
    #[default]
    Disconnected,
    /// Transport being opened and verified
    Connecting,
    /// Verified and usable
    Connected,
    /// Transport being closed
    Disconnecting,
}

impl ConnectionState {
    /// Check if state allows a connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Connected)
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    /// Transition to disconnecting state
    pub fn to_disconnecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connected | Self::Connecting => Ok(Self::Disconnecting),
            _ => Err("Can only disconnect from Connected or Connecting state"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }
}

/// Port and baud rate of the current connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(rename = "portName")]
    pub port: String,
    pub baud_rate: u32,
}

impl ConnectionInfo {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }
}
