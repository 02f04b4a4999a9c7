#![allow(dead_code)]

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use application::{BridgeOptions, ConnectionOptions, PrinterBridge};
use async_trait::async_trait;
use domain::request::PrintRequest;
use domain::transport::{MockPortEnumerator, PrinterEncoder, Transport};
use domain::{PrinterError, Result};
use infrastructure::{MockTransport, RasterDecoder};
use tokio::sync::Semaphore;

const CHUNK: usize = 4;

/// Encoder double: records every request and writes its payload in small
/// chunks, yielding between them so unsynchronised callers would interleave.
#[derive(Clone, Default)]
pub struct RecordingEncoder {
    requests: Arc<Mutex<Vec<PrintRequest>>>,
    status_code: Arc<AtomicU8>,
    status_error: Arc<Mutex<Option<String>>>,
    status_calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    encodings: Arc<Mutex<Vec<String>>>,
    print_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
    status_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl RecordingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PrintRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_status_code(&self, code: u8) {
        self.status_code.store(code, Ordering::SeqCst);
    }

    pub fn fail_status(&self, message: Option<&str>) {
        *self.status_error.lock().unwrap() = message.map(str::to_string);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn encodings(&self) -> Vec<String> {
        self.encodings.lock().unwrap().clone()
    }

    /// Park every print (after it is recorded) until `release_prints`
    pub fn hold_prints(&self) {
        *self.print_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_prints(&self, count: usize) {
        if let Some(gate) = self.print_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Park every status query (after it is counted) until `release_status`
    pub fn hold_status(&self) {
        *self.status_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_status(&self, count: usize) {
        if let Some(gate) = self.status_gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    async fn pass(gate: &Mutex<Option<Arc<Semaphore>>>) {
        let gate = gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    fn payload(request: &PrintRequest) -> Vec<u8> {
        match request {
            PrintRequest::RawBytes(bytes) => bytes.clone(),
            PrintRequest::RawString(text) => text.as_bytes().to_vec(),
            other => other.name().as_bytes().to_vec(),
        }
    }
}

#[async_trait]
impl PrinterEncoder for RecordingEncoder {
    async fn print(&self, transport: &dyn Transport, request: &PrintRequest) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Self::pass(&self.print_gate).await;

        let mut outcome = Ok(());
        for chunk in Self::payload(request).chunks(CHUNK) {
            if let Err(e) = transport.write(chunk).await {
                outcome = Err(e);
                break;
            }
            tokio::task::yield_now().await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn query_status(&self, _transport: &dyn Transport) -> Result<u8> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Self::pass(&self.status_gate).await;
        if let Some(message) = self.status_error.lock().unwrap().clone() {
            return Err(PrinterError::transport(message));
        }
        Ok(self.status_code.load(Ordering::SeqCst))
    }

    fn set_encoding(&self, name: &str) -> String {
        self.encodings.lock().unwrap().push(name.to_string());
        name.to_string()
    }
}

pub fn ports(paths: &[&str]) -> MockPortEnumerator {
    let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    let mut ports = MockPortEnumerator::new();
    ports
        .expect_list_device_paths()
        .returning(move || paths.clone());
    ports
}

pub fn bridge(mock: &MockTransport, encoder: &RecordingEncoder) -> PrinterBridge {
    PrinterBridge::new(
        Arc::new(mock.clone()),
        Arc::new(ports(&["/dev/ttyUSB0"])),
        Arc::new(encoder.clone()),
        Arc::new(RasterDecoder::default()),
        BridgeOptions {
            connection: ConnectionOptions::default(),
            monitor_interval: Duration::from_millis(1000),
        },
    )
}

/// A bridge already connected to "COM-A"
pub async fn connected_bridge() -> (MockTransport, RecordingEncoder, PrinterBridge) {
    let mock = MockTransport::new();
    let encoder = RecordingEncoder::new();
    let bridge = bridge(&mock, &encoder);
    bridge
        .connection()
        .connect("COM-A", 9600)
        .await
        .expect("connect to mock transport");
    (mock, encoder, bridge)
}
