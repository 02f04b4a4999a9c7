use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{BridgeOptions, PrinterBridge};
use domain::transport::{PrinterEncoder, Transport};
use infrastructure::{
    BridgeConfig, EscPosEncoder, MockTransport, RasterDecoder, SerialPortFinder, SerialTransport,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override the serial port to auto-connect to
    #[arg(long)]
    port: Option<String>,

    /// Override the baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Talk to an in-memory printer instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// Only list USB serial adapters
    #[arg(long)]
    usb_only: bool,
}

async fn run() -> Result<()> {
    dotenv().ok();

    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,printer_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("Printer agent starting (pid {})", std::process::id());

    let mut config = BridgeConfig::load(&args.config_dir)?;
    if let Some(port) = args.port {
        config.serial.port = Some(port);
        config.auto_connect = true;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    config.simulate |= args.simulate;
    info!(
        config_dir = %args.config_dir,
        port = ?config.serial.port,
        baud_rate = config.serial.baud_rate,
        simulate = config.simulate,
        "Configuration loaded"
    );

    let transport: Arc<dyn Transport> = if config.simulate {
        info!("Using simulated printer");
        Arc::new(MockTransport::simulated_printer())
    } else {
        Arc::new(SerialTransport::new(config.serial.clone()))
    };
    let ports = if args.usb_only {
        SerialPortFinder::new().usb_only()
    } else {
        SerialPortFinder::new()
    };

    let encoder = EscPosEncoder::default();
    encoder.set_encoding(&config.text_encoding);

    let bridge = Arc::new(PrinterBridge::new(
        transport,
        Arc::new(ports),
        Arc::new(encoder),
        Arc::new(RasterDecoder::new(config.image_max_width)),
        BridgeOptions::from(&config),
    ));

    if config.auto_connect {
        match config.serial.port.clone() {
            Some(port) => match bridge
                .connection()
                .connect(port, config.serial.baud_rate)
                .await
            {
                Ok(info) => info!(port = %info.port, "Auto-connected"),
                Err(e) => warn!(error = %e, "Auto-connect failed"),
            },
            None => warn!("auto_connect is set but no serial.port is configured"),
        }
    }
    if config.monitor.enable_on_start {
        bridge.monitor().start();
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                signal.cancel();
            }
            Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
        }
    });

    printer_agent::serve(bridge, tokio::io::stdin(), tokio::io::stdout(), shutdown).await?;

    info!("Printer agent stopped");
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let outcome = rt.block_on(run());
    // A pending stdin read would otherwise keep the runtime alive
    rt.shutdown_timeout(std::time::Duration::from_secs(1));

    if let Err(e) = outcome {
        eprintln!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}
