//! Parley server entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, loads configuration (file, then environment),
//! initializes the store and session gateway, boots the answer pipeline
//! in the background, and serves the WebSocket + REST surface until
//! shutdown.

mod http;
mod state;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley_core::pipeline::BoxAnswerPipeline;
use parley_infra::pipeline::GeminiPipeline;
use state::AppState;

/// Real-time conversational session server.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Suppress all output except errors.
    #[arg(long, global = true)]
    quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the session server (the default when no command is given).
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind (overrides config).
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info,parley=info",
        1 => "info,parley=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let (port, host) = match cli.command {
        Some(Commands::Serve { port, host }) => (port, host),
        None => (None, None),
    };

    let mut config = parley_infra::config::load_config().await;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(host) = host {
        config.host = host;
    }

    for option in parley_infra::config::missing_options(&config) {
        tracing::warn!("{option} is not configured");
    }

    let state = AppState::init(config).await?;

    boot_pipeline(&state);

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Parley listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    if state.config.pipeline.is_none() {
        println!(
            "  {}",
            console::style("Answer pipeline not configured -- serving fallback answers").yellow()
        );
    }
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let db_pool = state.db_pool.clone();
    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    println!("\n  Server stopped.");

    Ok(())
}

/// Start the answer pipeline connection in the background.
///
/// The server accepts connections immediately; until the pipeline is
/// installed (or if the probe fails) every exchange gets the fixed
/// fallback answer. A failed boot degrades, it never aborts the server.
fn boot_pipeline(state: &AppState) {
    let Some(pipeline_config) = state.config.pipeline.clone() else {
        return;
    };
    let adapter = state.pipeline.clone();

    tokio::spawn(async move {
        match GeminiPipeline::connect(&pipeline_config).await {
            Ok(pipeline) => {
                adapter.install(BoxAnswerPipeline::new(pipeline)).await;
            }
            Err(err) => {
                tracing::warn!("answer pipeline unavailable, serving fallback answers: {err}");
            }
        }
    });
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
