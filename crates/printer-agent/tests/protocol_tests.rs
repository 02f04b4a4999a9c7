use std::sync::Arc;
use std::time::Duration;

use application::{BridgeOptions, PrinterBridge};
use infrastructure::{EscPosEncoder, MockTransport, RasterDecoder, SerialPortFinder};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};
use tokio_util::sync::CancellationToken;

fn simulated_bridge() -> Arc<PrinterBridge> {
    Arc::new(PrinterBridge::new(
        Arc::new(MockTransport::simulated_printer()),
        Arc::new(SerialPortFinder::new()),
        Arc::new(EscPosEncoder::default()),
        Arc::new(RasterDecoder::default()),
        BridgeOptions::default(),
    ))
}

async fn next_line<R: tokio::io::AsyncBufRead + Unpin>(lines: &mut tokio::io::Lines<R>) -> Value {
    let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("reply in time")
        .unwrap()
        .expect("a line");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_request_reply_round_trip() {
    let (mut client_in, agent_in) = duplex(4096);
    let (agent_out, client_out) = duplex(4096);
    let bridge = simulated_bridge();
    let server = tokio::spawn(printer_agent::serve(
        bridge.clone(),
        agent_in,
        agent_out,
        CancellationToken::new(),
    ));
    let mut lines = BufReader::new(client_out).lines();

    client_in
        .write_all(b"{\"id\":1,\"method\":\"isConnected\"}\n")
        .await
        .unwrap();
    assert_eq!(next_line(&mut lines).await, json!({"id": 1, "ok": false}));

    client_in
        .write_all(b"{\"id\":2,\"method\":\"cutPaper\"}\n")
        .await
        .unwrap();
    assert_eq!(
        next_line(&mut lines).await,
        json!({"id": 2, "error": {"code": "NOT_CONNECTED", "message": "Printer not connected"}})
    );

    client_in
        .write_all(b"{\"id\":3,\"method\":\"connect\",\"args\":{\"portName\":\"SIM\",\"baudRate\":9600}}\n")
        .await
        .unwrap();
    assert_eq!(next_line(&mut lines).await, json!({"id": 3, "ok": true}));

    client_in.write_all(b"not json\n").await.unwrap();
    let reply = next_line(&mut lines).await;
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], json!("INVALID_ARGS"));

    // EOF shuts the bridge down
    drop(client_in);
    server.await.unwrap().unwrap();
    assert!(!bridge.connection().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_status_events_are_streamed() {
    let (mut client_in, agent_in) = duplex(4096);
    let (agent_out, client_out) = duplex(4096);
    let bridge = simulated_bridge();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(printer_agent::serve(
        bridge.clone(),
        agent_in,
        agent_out,
        shutdown.clone(),
    ));
    let mut lines = BufReader::new(client_out).lines();

    client_in
        .write_all(b"{\"id\":\"c\",\"method\":\"connect\",\"args\":{\"portName\":\"SIM\",\"baudRate\":9600}}\n")
        .await
        .unwrap();
    assert_eq!(next_line(&mut lines).await, json!({"id": "c", "ok": true}));

    client_in
        .write_all(b"{\"id\":\"asb\",\"method\":\"enableASBMode\",\"args\":{\"enable\":true}}\n")
        .await
        .unwrap();

    let mut saw_reply = false;
    let mut event = None;
    while event.is_none() || !saw_reply {
        let message = next_line(&mut lines).await;
        if message.get("event").is_some() {
            event = Some(message);
        } else {
            assert_eq!(message, json!({"id": "asb", "ok": null}));
            saw_reply = true;
        }
    }
    let event = event.unwrap();
    assert_eq!(event["event"], json!("status"));
    assert_eq!(event["data"]["isNormal"], json!(true));

    shutdown.cancel();
    server.await.unwrap().unwrap();
    assert!(!bridge.monitor().is_running());
}
