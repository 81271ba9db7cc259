use clap::Parser;
use tokio::net::TcpListener;

use chatroom_server::config::{generate_config_template, Cli, Config};
use chatroom_server::{routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::from_cli(&cli)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chatroom_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("Chatroom server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        max_messages = config.max_messages,
        identity_attempts = config.identity_attempts,
        sender_policy = ?config.sender_policy,
        heartbeat_interval_secs = config.heartbeat_interval_secs,
        heartbeat_timeout_secs = config.heartbeat_timeout_secs,
        "Chatroom configured"
    );

    // Registry and history are empty at startup and live only in memory.
    let app_state =
        state::AppState::new(config.chat_settings()).with_heartbeat(config.heartbeat());
    let app = routes::build_router(app_state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
