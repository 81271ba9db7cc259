use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::chat::history::DEFAULT_MAX_MESSAGES;
use crate::chat::identity::DEFAULT_MAX_ATTEMPTS;
use crate::chat::{ChatSettings, SenderPolicy};
use crate::ws::heartbeat::Heartbeat;

/// Chatroom server command line. Every setting is optional here so that
/// only flags actually given override the file and environment layers.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "chatroom-server", version, about = "Real-time chatroom server")]
pub struct Cli {
    /// Port to listen on (default: 5000, or $PORT)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address (default: 0.0.0.0)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./chatroom.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Number of history entries kept for replay (default: 100)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,

    /// Draws allowed when generating a unique id or name (default: 64)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_attempts: Option<usize>,

    /// Handling of client-claimed senders: "trust" or "enforce"
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_policy: Option<String>,

    /// Seconds between WebSocket pings (default: 30)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_secs: Option<u64>,

    /// Seconds a ping may go unanswered before the peer is dropped (default: 10)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_timeout_secs: Option<u64>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub max_messages: usize,
    pub identity_attempts: usize,
    pub sender_policy: SenderPolicy,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            max_messages: DEFAULT_MAX_MESSAGES,
            identity_attempts: DEFAULT_MAX_ATTEMPTS,
            sender_policy: SenderPolicy::Trust,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Layered precedence:
    /// built-in defaults < TOML file < $PORT < CHATROOM_* env < CLI flags
    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::raw().only(&["PORT"]))
            .merge(Env::prefixed("CHATROOM_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            max_messages: self.max_messages,
            identity_attempts: self.identity_attempts,
            sender_policy: self.sender_policy,
        }
    }

    /// Zero values are raised to one second.
    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            timeout: Duration::from_secs(self.heartbeat_timeout_secs.max(1)),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Chatroom Server Configuration
# Place this file at ./chatroom.toml or specify with --config <path>
# Settings can be overridden via environment variables (CHATROOM_PORT, etc.)
# or CLI flags (--port, etc.). $PORT is honoured for the listen port.

# Server port (default: 5000)
# port = 5000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging
# json_logs = false

# Number of broadcast events kept and replayed to joining clients (default: 100)
# Oldest entries are evicted first.
# max_messages = 100

# Random draws allowed when generating a unique user id or display name
# before registration gives up (default: 64)
# identity_attempts = 64

# Sender fields on chat messages:
#   "trust"   relay sender_id / sender_name exactly as the client sent them
#   "enforce" overwrite them with the identity registered for the connection
# sender_policy = "trust"

# Seconds between WebSocket pings (default: 30)
# heartbeat_interval_secs = 30

# Seconds a ping may go unanswered before the peer is dropped and announced
# as disconnected (default: 10)
# heartbeat_timeout_secs = 10
"#
    .to_string()
}
