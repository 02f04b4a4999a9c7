use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::transport::Transport;
use domain::{PrinterError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Serial line configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port used for auto-connect; operations name their port explicitly
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String, // "None", "Even", "Odd"
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_parity() -> String {
    "None".to_string()
}
fn default_stop_bits() -> u8 {
    1
}
fn default_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SerialConfig {
    fn to_parity(&self) -> Result<tokio_serial::Parity> {
        match self.parity.as_str() {
            "None" => Ok(tokio_serial::Parity::None),
            "Even" => Ok(tokio_serial::Parity::Even),
            "Odd" => Ok(tokio_serial::Parity::Odd),
            _ => Err(PrinterError::invalid_argument(format!(
                "Invalid parity: {}",
                self.parity
            ))),
        }
    }

    fn to_stop_bits(&self) -> Result<tokio_serial::StopBits> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            _ => Err(PrinterError::invalid_argument(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            ))),
        }
    }

    fn to_data_bits(&self) -> Result<tokio_serial::DataBits> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            _ => Err(PrinterError::invalid_argument(format!(
                "Invalid data bits: {}",
                self.data_bits
            ))),
        }
    }
}

/// Normalize port name for Windows (e.g., COM7 -> \\.\COM7)
fn normalize_port_name(path: &str) -> String {
    if cfg!(target_os = "windows") && !path.to_uppercase().starts_with(r"\\.\") {
        format!(r"\\.\{}", path)
    } else {
        path.to_string()
    }
}

/// Serial transport backed by tokio-serial.
///
/// The stream sits behind an async mutex so reads and writes from different
/// tasks never overlap on the wire.
pub struct SerialTransport {
    config: SerialConfig,
    port: Mutex<Option<SerialStream>>,
    open: AtomicBool,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    fn mark_dead(&self, port: &mut Option<SerialStream>) {
        port.take();
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<()> {
        let mut port = self.port.lock().await;
        if port.is_some() {
            return Err(PrinterError::transport(format!(
                "Serial transport already open, refusing to open {}",
                path
            )));
        }

        let port_name = normalize_port_name(path);
        tracing::debug!(port = %port_name, baud_rate, "Opening serial port");

        let stream = tokio_serial::new(&port_name, baud_rate)
            .data_bits(self.config.to_data_bits()?)
            .parity(self.config.to_parity()?)
            .stop_bits(self.config.to_stop_bits()?)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                PrinterError::transport(format!(
                    "Failed to open serial port {}: {}. Ensure the port is not used by another application and that you have sufficient permissions.",
                    port_name, e
                ))
            })?;

        *port = Some(stream);
        self.open.store(true, Ordering::SeqCst);
        tracing::debug!(port = %port_name, "Serial port opened");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut port = self.port.lock().await;
        self.open.store(false, Ordering::SeqCst);
        if let Some(mut stream) = port.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(error = %e, "Error shutting down serial port");
                return Err(PrinterError::transport(format!("Close error: {}", e)));
            }
            tracing::debug!("Serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut port = self.port.lock().await;
        let stream = port.as_mut().ok_or(PrinterError::NotConnected)?;

        let result = match stream.write_all(data).await {
            Ok(()) => stream.flush().await.map_err(|e| format!("Flush error: {}", e)),
            Err(e) => Err(format!("Write error: {}", e)),
        };

        if let Err(msg) = result {
            self.mark_dead(&mut port);
            return Err(PrinterError::Transport(msg));
        }
        tracing::trace!(bytes = data.len(), "Serial write complete");
        Ok(())
    }

    async fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut port = self.port.lock().await;
        let stream = port.as_mut().ok_or(PrinterError::NotConnected)?;

        let outcome = tokio::time::timeout(timeout, stream.read(buf)).await;
        match outcome {
            Ok(Ok(n)) => Ok(n),
            // Driver-level timeout: nothing arrived, link still valid
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Ok(Err(e)) => {
                self.mark_dead(&mut port);
                Err(PrinterError::transport(format!("Read error: {}", e)))
            }
            Err(_) => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.port, None);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, "None");
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.timeout_ms, 1000);
    }

    #[test]
    fn test_serial_config_parity_conversion() {
        let config = SerialConfig {
            parity: "Even".to_string(),
            ..SerialConfig::default()
        };
        assert!(matches!(
            config.to_parity().unwrap(),
            tokio_serial::Parity::Even
        ));

        let config_bad = SerialConfig {
            parity: "Mark".to_string(),
            ..config
        };
        assert!(matches!(
            config_bad.to_parity(),
            Err(PrinterError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_serial_config_bits_conversion() {
        let config = SerialConfig {
            data_bits: 7,
            stop_bits: 2,
            ..SerialConfig::default()
        };
        assert!(matches!(
            config.to_data_bits().unwrap(),
            tokio_serial::DataBits::Seven
        ));
        assert!(matches!(
            config.to_stop_bits().unwrap(),
            tokio_serial::StopBits::Two
        ));
        assert!(
            SerialConfig {
                data_bits: 9,
                ..SerialConfig::default()
            }
            .to_data_bits()
            .is_err()
        );
    }

    #[test]
    fn test_transport_initially_closed() {
        let transport = SerialTransport::new(SerialConfig::default());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_close_without_open_is_ok() {
        let transport = SerialTransport::new(SerialConfig::default());
        assert!(transport.close().await.is_ok());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_write_when_closed_fails() {
        let transport = SerialTransport::new(SerialConfig::default());
        let err = transport.write(b"hello").await.unwrap_err();
        assert_eq!(err, PrinterError::NotConnected);
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let transport = SerialTransport::new(SerialConfig::default());
        let err = transport
            .open("/dev/this-port-does-not-exist", 9600)
            .await
            .unwrap_err();
        assert!(matches!(err, PrinterError::Transport(_)));
        assert!(!transport.is_open());
    }
}
