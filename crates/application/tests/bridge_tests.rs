mod common;

use std::io::Cursor;
use std::sync::Arc;

use application::{BridgeOptions, PrinterBridge};
use domain::request::{BarcodeRequest, Bitmap, PrintRequest};
use domain::{ErrorKind, PrinterError};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use infrastructure::{EscPosEncoder, MockTransport, RasterDecoder};
use serde_json::{Value, json};

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([0])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_unknown_and_unavailable_methods_are_unsupported() {
    let bridge = common::bridge(&MockTransport::new(), &common::RecordingEncoder::new());

    for method in ["setPaperSize", "printPDF", "printAndroidFont"] {
        let err = bridge.handle(method, &Value::Null).await.unwrap_err();
        assert_eq!(err.kind().code(), "UNSUPPORTED", "{}", method);
    }
}

#[tokio::test]
async fn test_get_available_ports() {
    let bridge = PrinterBridge::new(
        Arc::new(MockTransport::new()),
        Arc::new(common::ports(&["/dev/ttyS0", "/dev/ttyUSB0"])),
        Arc::new(common::RecordingEncoder::new()),
        Arc::new(RasterDecoder::default()),
        BridgeOptions::default(),
    );

    let ports = bridge.handle("getAvailablePorts", &Value::Null).await.unwrap();
    assert_eq!(ports, json!(["/dev/ttyS0", "/dev/ttyUSB0"]));
}

#[tokio::test(start_paused = true)]
async fn test_connect_requires_port_and_baud() {
    let mock = MockTransport::new();
    let bridge = common::bridge(&mock, &common::RecordingEncoder::new());

    let err = bridge
        .handle("connect", &json!({"portName": "COM-A"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(mock.open_calls(), 0);

    let ok = bridge
        .handle("connect", &json!({"portName": "COM-A", "baudRate": 9600}))
        .await
        .unwrap();
    assert_eq!(ok, Value::Bool(true));
    assert_eq!(
        bridge.handle("isConnected", &Value::Null).await.unwrap(),
        Value::Bool(true)
    );
}

#[tokio::test(start_paused = true)]
async fn test_connection_info_tracks_state() {
    let (_mock, _encoder, bridge) = common::connected_bridge().await;

    let info = bridge.handle("getConnectionInfo", &Value::Null).await.unwrap();
    assert_eq!(
        info,
        json!({"portName": "COM-A", "baudRate": 9600, "isConnected": true})
    );

    bridge.handle("disconnect", &Value::Null).await.unwrap();
    let info = bridge.handle("getConnectionInfo", &Value::Null).await.unwrap();
    assert_eq!(info, Value::Null);
}

#[tokio::test(start_paused = true)]
async fn test_barcode_defaults_applied() {
    let (_mock, encoder, bridge) = common::connected_bridge().await;

    bridge
        .handle("printBarcode", &json!({"data": "12345"}))
        .await
        .unwrap();

    let expected = BarcodeRequest {
        data: "12345".into(),
        barcode_type: 1,
        height: 100,
        width: 2,
        alignment: 1,
        hri_position: 2,
    };
    assert_eq!(encoder.requests(), vec![PrintRequest::Barcode(expected)]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_required_fields() {
    let (_mock, encoder, bridge) = common::connected_bridge().await;

    let cases = [
        ("printText", json!({})),
        ("printBarcode", json!({"height": 50})),
        ("printQRCode", json!({"moduleSize": 4})),
        ("printImage", json!({})),
        ("printImageFile", json!({})),
        ("sendRawData", json!({})),
        ("enableASBMode", json!({})),
        ("setEncoding", json!({})),
        ("printText", json!({"text": "x", "alignment": "left"})),
    ];
    for (method, args) in cases {
        let err = bridge.handle(method, &args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{} {}", method, args);
    }
    assert!(encoder.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_line_feed_defaults_to_one() {
    let (_mock, encoder, bridge) = common::connected_bridge().await;

    bridge.handle("lineFeed", &Value::Null).await.unwrap();
    bridge.handle("lineFeed", &json!({"lines": 3})).await.unwrap();

    let counts: Vec<_> = encoder
        .requests()
        .into_iter()
        .map(|r| match r {
            PrintRequest::Control(domain::ControlCommand::LineFeed(n)) => n,
            other => panic!("unexpected request {:?}", other),
        })
        .collect();
    assert_eq!(counts, vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_print_image_decodes_to_bitmap() {
    let (_mock, encoder, bridge) = common::connected_bridge().await;

    bridge
        .handle("printImage", &json!({"imageData": png(16, 2)}))
        .await
        .unwrap();

    let expected = Bitmap::new(16, 2, vec![0xFF; 4]);
    assert_eq!(encoder.requests(), vec![PrintRequest::Bitmap(expected)]);
}

#[tokio::test(start_paused = true)]
async fn test_image_errors_are_decode_errors() {
    let (_mock, encoder, bridge) = common::connected_bridge().await;

    let err = bridge
        .handle("printImage", &json!({"imageData": [1, 2, 3]}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);

    let err = bridge
        .handle("printImageFile", &json!({"imagePath": "/no/such/receipt.png"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(err.reason().contains("not found"));
    assert!(encoder.requests().is_empty());
}

#[tokio::test]
async fn test_print_image_while_disconnected() {
    let bridge = common::bridge(&MockTransport::new(), &common::RecordingEncoder::new());
    let err = bridge
        .handle("printImage", &json!({"imageData": png(8, 8)}))
        .await
        .unwrap_err();
    assert_eq!(err, PrinterError::NotConnected);
}

#[tokio::test(start_paused = true)]
async fn test_enable_asb_mode_toggles_monitor() {
    let (_mock, _encoder, bridge) = common::connected_bridge().await;

    bridge
        .handle("enableASBMode", &json!({"enable": true}))
        .await
        .unwrap();
    assert!(bridge.monitor().is_running());

    bridge
        .handle("enableASBMode", &json!({"enable": false}))
        .await
        .unwrap();
    assert!(!bridge.monitor().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_monitor_then_disconnects() {
    let (mock, _encoder, bridge) = common::connected_bridge().await;
    bridge.monitor().start();

    bridge.shutdown().await;

    assert!(!bridge.monitor().is_running());
    assert!(!bridge.connection().is_connected());
    assert!(!domain::Transport::is_open(&mock));
}

#[tokio::test(start_paused = true)]
async fn test_simulated_printer_end_to_end() {
    let mock = MockTransport::simulated_printer();
    let bridge = PrinterBridge::new(
        Arc::new(mock.clone()),
        Arc::new(common::ports(&[])),
        Arc::new(EscPosEncoder::default()),
        Arc::new(RasterDecoder::default()),
        BridgeOptions::default(),
    );

    bridge
        .handle("connect", &json!({"portName": "SIM", "baudRate": 9600}))
        .await
        .unwrap();
    bridge
        .handle("sendRawData", &json!({"data": [0x1B, 0x40]}))
        .await
        .unwrap();
    assert_eq!(mock.written(), vec![0x1B, 0x40]);

    let status = bridge
        .handle("checkPrinterStatus", &Value::Null)
        .await
        .unwrap();
    assert_eq!(status["isNormal"], json!(true));
    assert_eq!(status["statusCode"], json!(0));
    assert_eq!(status["isPaperEmpty"], json!(false));
}

#[tokio::test]
async fn test_set_encoding_reaches_encoder() {
    let encoder = common::RecordingEncoder::new();
    let bridge = common::bridge(&MockTransport::new(), &encoder);

    // No connection needed
    let reply = bridge
        .handle("setEncoding", &json!({"encoding": "EUC-KR"}))
        .await
        .unwrap();
    assert_eq!(reply, Value::Null);
    assert_eq!(encoder.encodings(), vec!["EUC-KR".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_set_encoding_changes_printed_text() {
    let mock = MockTransport::simulated_printer();
    let bridge = PrinterBridge::new(
        Arc::new(mock.clone()),
        Arc::new(common::ports(&[])),
        Arc::new(EscPosEncoder::default()),
        Arc::new(RasterDecoder::default()),
        BridgeOptions::default(),
    );
    bridge
        .handle("connect", &json!({"portName": "SIM", "baudRate": 9600}))
        .await
        .unwrap();

    bridge
        .handle("setEncoding", &json!({"encoding": "EUC-KR"}))
        .await
        .unwrap();
    bridge
        .handle("printString", &json!({"text": "안녕"}))
        .await
        .unwrap();
    assert_eq!(mock.written(), vec![0xBE, 0xC8, 0xB3, 0xE7]);

    // Unknown names fall back to UTF-8
    mock.clear_written();
    bridge
        .handle("setEncoding", &json!({"encoding": "EBCDIC"}))
        .await
        .unwrap();
    bridge
        .handle("printString", &json!({"text": "안녕"}))
        .await
        .unwrap();
    assert_eq!(mock.written(), "안녕".as_bytes());
}
