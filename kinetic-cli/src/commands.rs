//! CLI command implementations

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Subcommand};
use kinetic_core::readiness::{
    HttpTranscodeStatusClient, ReadinessController, ReadinessState, ReadinessStatus,
    TranscodeStatusClient,
};
use kinetic_core::{KineticConfig, KineticError, MediaReference, RuntimeMode};
use kinetic_sim::SimulatedTranscodeBackend;
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check transcode status once
    Status {
        #[command(flatten)]
        reference: ReferenceArgs,
        /// Print the raw status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow the readiness cycle until the video is playable or times out
    Watch {
        #[command(flatten)]
        reference: ReferenceArgs,
    },
    /// Serve the simulated transcode backend
    MockBackend {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
}

/// Media reference; explicit URL wins over path, path over id
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = true)]
pub struct ReferenceArgs {
    /// Explicit streaming URL
    #[arg(long)]
    url: Option<String>,
    /// Asset path relative to the backend media root
    #[arg(long)]
    path: Option<String>,
    /// Opaque asset identifier
    #[arg(long)]
    id: Option<String>,
}

impl From<ReferenceArgs> for MediaReference {
    fn from(args: ReferenceArgs) -> Self {
        MediaReference {
            url: args.url,
            path: args.path,
            id: args.id,
        }
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the command that ran; configuration problems surface
/// before any request is made.
pub async fn handle_command(command: Commands, mode: RuntimeMode) -> anyhow::Result<()> {
    match command {
        Commands::Status { reference, json } => {
            let config = KineticConfig::from_env(mode).map_err(KineticError::from)?;
            show_status(&config, reference.into(), json).await
        }
        Commands::Watch { reference } => {
            let config = KineticConfig::from_env(mode).map_err(KineticError::from)?;
            watch_readiness(&config, reference.into()).await
        }
        Commands::MockBackend { host, port } => run_mock_backend(&host, port).await,
    }
}

/// Issue a single transcode status request
///
/// # Errors
/// - `KineticError::EmptyReference` - No reference field populated
/// - `KineticError::ReadinessCheck` - Status request failed
pub async fn show_status(
    config: &KineticConfig,
    reference: MediaReference,
    json: bool,
) -> anyhow::Result<()> {
    let client = HttpTranscodeStatusClient::new(&config.api);
    let target = reference
        .resolve(client.endpoints())
        .ok_or(KineticError::EmptyReference)?;

    println!("Stream URL: {}", target.stream_url);
    let Some(asset) = target.asset_key else {
        println!("Status: ready (external stream, no transcode check)");
        return Ok(());
    };

    let status = client
        .check_status(&asset)
        .await
        .map_err(KineticError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let state = if status.is_ready() { "ready" } else { "transcoding" };
        println!("Status: {state}");
        println!("  needs_transcoding: {}", status.needs_transcoding);
        println!("  cache_exists: {}", status.cache_exists);
        println!("  transcoding_in_progress: {}", status.transcoding_in_progress);
    }
    Ok(())
}

/// Run the full readiness cycle, printing each transition
///
/// # Errors
/// - `KineticError::EmptyReference` - No reference field populated
/// - `KineticError::TranscodingTimeout` - Polling budget exhausted
pub async fn watch_readiness(config: &KineticConfig, reference: MediaReference) -> anyhow::Result<()> {
    let client: Arc<dyn TranscodeStatusClient> =
        Arc::new(HttpTranscodeStatusClient::new(&config.api));
    let mut controller = ReadinessController::new(
        client,
        kinetic_core::ApiEndpoints::new(&config.api.base_url),
        config.readiness.clone(),
    );

    let mut updates = controller.subscribe();
    let target = controller
        .set_reference(Some(&reference))
        .ok_or(KineticError::EmptyReference)?;
    println!("Stream URL: {}", target.stream_url);

    let mut last_printed = None;
    let settled = loop {
        let status = updates.borrow_and_update().clone();
        if last_printed.as_ref() != Some(&status) {
            print_status(&status);
            last_printed = Some(status.clone());
        }
        if status.state.is_settled() {
            break status;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break controller.status();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping readiness polling");
                controller.stop_polling();
                return Ok(());
            }
        }
    };

    match settled.state {
        ReadinessState::Ready => {
            println!("Ready to play: {}", target.stream_url);
            Ok(())
        }
        ReadinessState::Error => Err(KineticError::TranscodingTimeout {
            message: settled.message.unwrap_or_default(),
        }
        .into()),
        _ if controller.playback_allowed() => {
            println!(
                "Status check failed; attempting direct playback of {}",
                target.stream_url
            );
            Ok(())
        }
        _ => anyhow::bail!("status check failed and direct playback is disabled"),
    }
}

fn print_status(status: &ReadinessStatus) {
    match &status.message {
        Some(message) if status.attempts > 0 => {
            println!("[{}] {message} (poll {})", status.state, status.attempts)
        }
        Some(message) => println!("[{}] {message}", status.state),
        None => println!("[{}]", status.state),
    }
}

/// Serve the simulated backend with its demo library
///
/// # Errors
/// - Address cannot be parsed or bound
pub async fn run_mock_backend(host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;

    let backend = Arc::new(SimulatedTranscodeBackend::with_demo_library());
    println!("Mock backend on http://{addr}");
    for job in backend.jobs() {
        println!("  {} ({:?})", job.asset, job.profile);
    }

    kinetic_sim::server::serve(backend, addr).await?;
    Ok(())
}
