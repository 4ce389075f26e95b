//! paperlink endpoint binary.
//!
//! # Usage
//!
//! ```bash
//! # Transmit spooled files as printed QR packets
//! paperlink send --spool data/app/out --artifacts data/transport/printing
//!
//! # Receive packets and append payloads to the incoming file
//! paperlink receive --incoming data/app/in/request.json
//! ```
//!
//! Type `q` followed by Enter to cancel a running endpoint.

use std::{io::BufRead, path::PathBuf, thread, time::Duration};

use clap::{Parser, Subcommand};
use paperlink_core::{
    CancelFlag, Receiver, ReceiverDriverConfig, Sender, SenderConfig, SenderDriverConfig,
    TransferOutcome, run_receiver, run_sender,
};
use paperlink_station::{
    CameraFrameSource, IncomingSpool, OutgoingSpool, QrPngEmitter, StationError, SystemEnv,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Reliable byte transfer over printed QR codes and a camera
#[derive(Parser, Debug)]
#[command(name = "paperlink")]
#[command(about = "Go-Back-N ARQ over an air-gapped visual channel")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transmit spooled files across the visual channel
    Send {
        /// Outgoing spool directory
        #[arg(long, default_value = "data/app/out")]
        spool: PathBuf,

        /// Filename pattern of spooled files
        #[arg(long, default_value = "request_*.json")]
        pattern: String,

        /// Directory receiving QR PNG artifacts for printing
        #[arg(long, default_value = "data/transport/printing")]
        artifacts: PathBuf,

        /// Address of the webcam multiplexer
        #[arg(long, default_value = "127.0.0.1:5000")]
        camera: String,

        /// Seconds without an ACK before the outstanding window is
        /// retransmitted
        #[arg(long, default_value_t = 6000)]
        timeout_secs: u64,

        /// Milliseconds to pause between sending and scanning for ACKs
        #[arg(long, default_value_t = 300)]
        recv_delay_ms: u64,
    },

    /// Receive packets and append delivered payloads to the incoming file
    Receive {
        /// File delivered payload bytes are appended to
        #[arg(long, default_value = "data/app/in/request.json")]
        incoming: PathBuf,

        /// Directory receiving QR PNG artifacts (ACKs) for printing
        #[arg(long, default_value = "data/transport/printing")]
        artifacts: PathBuf,

        /// Address of the webcam multiplexer
        #[arg(long, default_value = "127.0.0.1:5000")]
        camera: String,

        /// Milliseconds between camera polls
        #[arg(long, default_value_t = 30)]
        poll_delay_ms: u64,
    },
}

fn main() -> Result<(), StationError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let cancel = CancelFlag::new();
    spawn_quit_watcher(cancel.clone());

    match args.command {
        Command::Send { spool, pattern, artifacts, camera, timeout_secs, recv_delay_ms } => {
            tracing::info!(spool = %spool.display(), %camera, "paperlink sender starting");

            let mut chunks = OutgoingSpool::new(spool, &pattern)?;
            let mut emitter = QrPngEmitter::new(artifacts)?;
            let mut frames = CameraFrameSource::connect(&camera, cancel)?;
            let mut sender =
                Sender::new(SenderConfig { timeout: Duration::from_secs(timeout_secs) });

            let report = run_sender(
                &SystemEnv::new(),
                &mut sender,
                &mut chunks,
                &mut frames,
                &mut emitter,
                &SenderDriverConfig {
                    recv_delay: Duration::from_millis(recv_delay_ms),
                    ..SenderDriverConfig::default()
                },
            )?;

            match report.outcome {
                Some(TransferOutcome::Completed) => tracing::info!(
                    packets = report.packets_sent,
                    retransmissions = report.retransmissions,
                    "Transfer finished cleanly"
                ),
                _ => tracing::warn!(
                    packets = report.packets_sent,
                    "Transfer interrupted; the far side may be mid-window"
                ),
            }
        },

        Command::Receive { incoming, artifacts, camera, poll_delay_ms } => {
            tracing::info!(incoming = %incoming.display(), %camera, "paperlink receiver starting");

            let mut sink = IncomingSpool::open(incoming)?;
            let mut emitter = QrPngEmitter::new(artifacts)?;
            let mut frames = CameraFrameSource::connect(&camera, cancel)?;
            let mut receiver = Receiver::new();

            let report = run_receiver(
                &SystemEnv::new(),
                &mut receiver,
                &mut frames,
                &mut emitter,
                &mut sink,
                &ReceiverDriverConfig {
                    poll_delay: Duration::from_millis(poll_delay_ms),
                    ..ReceiverDriverConfig::default()
                },
            )?;

            tracing::info!(
                delivered = report.delivered,
                bytes = report.bytes_delivered,
                duplicates = report.duplicates,
                "Receiver stopped"
            );
        },
    }

    Ok(())
}

/// Raise the cancel flag when the user types `q`.
fn spawn_quit_watcher(cancel: CancelFlag) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    tracing::info!("Quit requested");
                    cancel.cancel();
                    break;
                },
                Ok(_) => {},
                Err(_) => break,
            }
        }
    });
}
