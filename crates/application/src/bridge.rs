//! Named-call façade over the connection, dispatcher and monitor.
//!
//! Callers send a method name plus JSON arguments and get back a JSON value
//! or a typed [`PrinterError`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use domain::request::{BarcodeRequest, Bitmap, DEFAULT_LINE_FEED, QrCodeRequest, TextRequest};
use domain::transport::{ImageDecoder, PortEnumerator, PrinterEncoder, Transport};
use domain::{PrinterError, Result, StatusEvent};
use infrastructure::BridgeConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionManager, ConnectionOptions};
use crate::dispatch::CommandDispatcher;
use crate::monitor::StatusMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    pub connection: ConnectionOptions,
    pub monitor_interval: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            monitor_interval: Duration::from_millis(1000),
        }
    }
}

impl From<&BridgeConfig> for BridgeOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            connection: ConnectionOptions::from(config),
            monitor_interval: config.monitor_interval(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectArgs {
    port_name: Option<String>,
    baud_rate: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextArgs {
    text: Option<String>,
    alignment: Option<u8>,
    font_type: Option<u8>,
    text_size: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BarcodeArgs {
    data: Option<String>,
    barcode_type: Option<u8>,
    height: Option<u8>,
    width: Option<u8>,
    alignment: Option<u8>,
    hri_position: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrCodeArgs {
    data: Option<String>,
    module_size: Option<u8>,
    error_level: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageArgs {
    image_data: Option<Vec<u8>>,
    image_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LineFeedArgs {
    lines: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDataArgs {
    data: Option<Vec<u8>>,
}

#[derive(Debug, Default, Deserialize)]
struct EncodingArgs {
    encoding: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AsbArgs {
    enable: Option<bool>,
}

fn parse_args<T: DeserializeOwned + Default>(args: &Value) -> Result<T> {
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args.clone())
        .map_err(|e| PrinterError::invalid_argument(format!("Invalid arguments: {}", e)))
}

fn required<T>(value: Option<T>, message: &str) -> Result<T> {
    value.ok_or_else(|| PrinterError::invalid_argument(message))
}

/// The printer service: one connection, one dispatcher, one monitor
pub struct PrinterBridge {
    connection: ConnectionManager,
    dispatcher: CommandDispatcher,
    monitor: StatusMonitor,
    images: Arc<dyn ImageDecoder>,
}

impl PrinterBridge {
    pub fn new(
        transport: Arc<dyn Transport>,
        ports: Arc<dyn PortEnumerator>,
        encoder: Arc<dyn PrinterEncoder>,
        images: Arc<dyn ImageDecoder>,
        options: BridgeOptions,
    ) -> Self {
        let connection = ConnectionManager::new(transport, ports, options.connection);
        let dispatcher = CommandDispatcher::new(connection.clone(), encoder);
        let monitor = StatusMonitor::new(dispatcher.clone(), options.monitor_interval);
        Self {
            connection,
            dispatcher,
            monitor,
            images,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn monitor(&self) -> &StatusMonitor {
        &self.monitor
    }

    /// Attach the status event stream, replacing any previous listener
    pub fn subscribe_status(&self) -> mpsc::UnboundedReceiver<StatusEvent> {
        self.monitor.subscribe()
    }

    pub fn unsubscribe_status(&self) {
        self.monitor.unsubscribe();
    }

    /// Run one named call
    pub async fn handle(&self, method: &str, args: &Value) -> Result<Value> {
        debug!(method, "Handling call");
        match method {
            "getAvailablePorts" => Ok(json!(self.connection.list_ports())),
            "connect" => {
                let args: ConnectArgs = parse_args(args)?;
                let (Some(port), Some(baud_rate)) = (args.port_name, args.baud_rate) else {
                    return Err(PrinterError::invalid_argument(
                        "Port name and baud rate are required",
                    ));
                };
                self.connection.connect(port, baud_rate).await?;
                Ok(Value::Bool(true))
            }
            "disconnect" => {
                self.connection.disconnect().await?;
                Ok(Value::Null)
            }
            "isConnected" => Ok(Value::Bool(self.connection.is_connected())),
            "getConnectionInfo" => Ok(self.connection_info()),
            "setEncoding" => {
                let args: EncodingArgs = parse_args(args)?;
                let name = required(args.encoding, "Encoding is required")?;
                self.dispatcher.set_encoding(&name);
                Ok(Value::Null)
            }
            "printText" => {
                let args: TextArgs = parse_args(args)?;
                let mut request = TextRequest::new(required(args.text, "Text is required")?);
                request.alignment = args.alignment.unwrap_or(request.alignment);
                request.font_type = args.font_type.unwrap_or(request.font_type);
                request.text_size = args.text_size.unwrap_or(request.text_size);
                self.dispatcher.print_text(request).await?;
                Ok(Value::Null)
            }
            "printString" => {
                let args: TextArgs = parse_args(args)?;
                let text = required(args.text, "Text is required")?;
                self.dispatcher.print_string(text).await?;
                Ok(Value::Null)
            }
            "printBarcode" => {
                let args: BarcodeArgs = parse_args(args)?;
                let mut request =
                    BarcodeRequest::new(required(args.data, "Barcode data is required")?);
                request.barcode_type = args.barcode_type.unwrap_or(request.barcode_type);
                request.height = args.height.unwrap_or(request.height);
                request.width = args.width.unwrap_or(request.width);
                request.alignment = args.alignment.unwrap_or(request.alignment);
                request.hri_position = args.hri_position.unwrap_or(request.hri_position);
                self.dispatcher.print_barcode(request).await?;
                Ok(Value::Null)
            }
            "printQRCode" => {
                let args: QrCodeArgs = parse_args(args)?;
                let mut request =
                    QrCodeRequest::new(required(args.data, "QR code data is required")?);
                request.module_size = args.module_size.unwrap_or(request.module_size);
                request.error_level = args.error_level.unwrap_or(request.error_level);
                self.dispatcher.print_qr_code(request).await?;
                Ok(Value::Null)
            }
            "printImage" => {
                let args: ImageArgs = parse_args(args)?;
                let data = required(args.image_data, "Image data is required")?;
                self.ensure_connected()?;
                let decoder = self.images.clone();
                let bitmap = self.decode(move || decoder.decode(&data)).await?;
                self.dispatcher.print_bitmap(bitmap).await?;
                Ok(Value::Null)
            }
            "printImageFile" => {
                let args: ImageArgs = parse_args(args)?;
                let path = required(args.image_path, "Image path is required")?;
                self.ensure_connected()?;
                let decoder = self.images.clone();
                let bitmap = self.decode(move || decoder.decode_file(&path)).await?;
                self.dispatcher.print_bitmap(bitmap).await?;
                Ok(Value::Null)
            }
            "lineFeed" => {
                let args: LineFeedArgs = parse_args(args)?;
                self.dispatcher
                    .line_feed(args.lines.unwrap_or(DEFAULT_LINE_FEED))
                    .await?;
                Ok(Value::Null)
            }
            "cutPaper" => {
                self.dispatcher.cut_paper().await?;
                Ok(Value::Null)
            }
            "openCashDrawer" => {
                self.dispatcher.open_cash_drawer().await?;
                Ok(Value::Null)
            }
            "reset" => {
                self.dispatcher.reset().await?;
                Ok(Value::Null)
            }
            "checkPrinterStatus" => {
                let snapshot = self.dispatcher.check_status().await?;
                serde_json::to_value(snapshot)
                    .map_err(|e| PrinterError::transport(format!("Unencodable status: {}", e)))
            }
            "sendRawData" => {
                let args: RawDataArgs = parse_args(args)?;
                let data = required(args.data, "Data is required")?;
                self.dispatcher.send_raw(data).await?;
                Ok(Value::Null)
            }
            "enableASBMode" => {
                let args: AsbArgs = parse_args(args)?;
                if required(args.enable, "Enable flag is required")? {
                    self.monitor.start();
                } else {
                    self.monitor.stop();
                }
                Ok(Value::Null)
            }
            "printPDF" | "printAndroidFont" => Err(PrinterError::Unsupported(format!(
                "{} is not available in this bridge",
                method
            ))),
            other => Err(PrinterError::Unsupported(format!(
                "Unknown method: {}",
                other
            ))),
        }
    }

    /// Stop polling, then release the connection
    pub async fn shutdown(&self) {
        info!("Shutting down printer bridge");
        self.monitor.stop();
        self.monitor.unsubscribe();
        if let Err(e) = self.connection.disconnect().await {
            warn!(error = %e, "Error disconnecting during shutdown");
        }
    }

    fn connection_info(&self) -> Value {
        match self.connection.current_info() {
            Some(info) if self.connection.is_connected() => json!({
                "portName": info.port,
                "baudRate": info.baud_rate,
                "isConnected": true,
            }),
            _ => Value::Null,
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(PrinterError::NotConnected)
        }
    }

    async fn decode<F>(&self, job: F) -> Result<Bitmap>
    where
        F: FnOnce() -> Result<Bitmap> + Send + 'static,
    {
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| PrinterError::decode(format!("Image decoder stopped: {}", e)))?
    }
}
