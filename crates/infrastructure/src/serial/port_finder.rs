use domain::transport::PortEnumerator;
use tokio_serial::SerialPortType;

/// Enumerates serial devices through the OS port listing
#[derive(Debug, Clone, Default)]
pub struct SerialPortFinder {
    usb_only: bool,
}

impl SerialPortFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only report USB-to-serial adapters
    pub fn usb_only(mut self) -> Self {
        self.usb_only = true;
        self
    }
}

impl PortEnumerator for SerialPortFinder {
    fn list_device_paths(&self) -> Vec<String> {
        let ports = match tokio_serial::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate serial ports");
                return Vec::new();
            }
        };

        let mut paths: Vec<String> = ports
            .into_iter()
            .filter(|p| !self.usb_only || matches!(p.port_type, SerialPortType::UsbPort(_)))
            .map(|p| p.port_name)
            .collect();
        paths.sort();
        paths.dedup();

        tracing::debug!(count = paths.len(), "Enumerated serial ports");
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_never_panics() {
        let paths = SerialPortFinder::new().list_device_paths();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_usb_only_is_subset() {
        let all = SerialPortFinder::new().list_device_paths();
        let usb = SerialPortFinder::new().usb_only().list_device_paths();
        assert!(usb.iter().all(|p| all.contains(p)));
    }
}
