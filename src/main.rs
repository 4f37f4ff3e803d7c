use clap::Parser;
use firmata_host::board::{Board, BoardEvent, BoardOptions};
use firmata_host::config::{Config, ConfigError, ConfigLoader, LogFormat, LoggingConfig};
use firmata_host::driver;
use firmata_host::port::SyncSerialPort;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Connect to a Firmata board over a serial port and print what it reports.",
    long_about = "Opens the serial port, runs the Firmata handshake (version, firmware, capabilities, analog mapping) and prints every decoded event until Ctrl-C."
)]
struct Args {
    /// Configuration file. Defaults to the standard resolution order.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device path, e.g. /dev/ttyACM0 or COM3.
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long)]
    baud: Option<u32>,

    /// Go straight to ready after the firmware reply.
    #[arg(long)]
    skip_capabilities: bool,

    /// Sampling interval in milliseconds, sent once the firmware is known.
    #[arg(long, value_name = "MS")]
    sampling_interval: Option<u32>,

    /// Print events as JSON lines.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    apply_args(&mut config, &args);
    config.validate()?;
    init_tracing(&config.logging);

    let port_name = config.serial.port.clone().ok_or(ConfigError::NoSerialPort)?;
    let writer = SyncSerialPort::open(&port_name, &config.serial.port_configuration())?;
    let reader = writer.try_clone()?;
    info!(port = %port_name, baud = config.serial.baud_rate, "serial port open");

    let (mut board, mut events) = Board::new(writer, BoardOptions::from(&config.handshake));
    let (_reader, transport) = driver::spawn_reader(reader);

    let json = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, json);
        }
    });

    driver::run(&mut board, transport, shutdown_signal()).await;
    drop(board);
    printer.await?;
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(port) = &args.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if args.skip_capabilities {
        config.handshake.skip_capabilities = true;
    }
    if let Some(interval) = args.sampling_interval {
        config.handshake.sampling_interval = Some(interval);
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn print_event(event: &BoardEvent, json: bool) {
    if !json {
        println!("{event:?}");
        return;
    }
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(err) => error!(%err, "failed to serialize event"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, closing");
}
