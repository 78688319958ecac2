use clap::{Parser, Subcommand};
use libtether_core::{EventCategory, StartupMode, TransportMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tether", about = "Supervisor connectivity and health", version)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/tether/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the control-channel transport (auto, local, remote)
    #[arg(long, global = true)]
    pub transport: Option<TransportMode>,

    /// Override the supervisor host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect or launch the supervisor and wait until it answers
    Activate {
        /// Override the startup mode (off, prompt, auto)
        #[arg(long)]
        startup: Option<StartupMode>,

        /// Program to launch when the supervisor is not running
        #[arg(long)]
        launch_target: Option<PathBuf>,
    },

    /// Probe the supervisor and dashboard once
    Status,

    /// Send one control-channel request
    Request {
        #[command(subcommand)]
        cmd: RequestCommand,
    },

    /// Follow heartbeats, domain events and health changes until interrupted
    Watch {
        /// Skip the activation step
        #[arg(long)]
        no_activate: bool,

        /// Only print events of these categories
        #[arg(long = "category", value_parser = parse_category)]
        categories: Vec<EventCategory>,

        /// Do not print heartbeats
        #[arg(long)]
        no_beats: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum RequestCommand {
    /// Register this host with the supervisor
    Attach {
        /// Client ID (default: a fresh UUID)
        #[arg(long)]
        client_id: Option<String>,
    },

    /// Unregister a client
    Detach {
        /// Client ID returned by attach
        client_id: String,
    },

    /// List active MCP connections
    Connections,

    /// List pooled MCP instances
    Instances,

    /// Grow the instance pool
    ScaleUp {
        /// Number of instances to add
        #[arg(long)]
        count: Option<u32>,
    },

    /// Send a raw JSON request object (must carry a string `type`)
    Raw {
        /// Request JSON, e.g. '{"type":"ListMcpInstances"}'
        #[arg(id = "raw_json", value_name = "JSON")]
        json: String,
    },
}

fn parse_category(s: &str) -> Result<EventCategory, String> {
    EventCategory::ALL
        .iter()
        .copied()
        .find(|category| category.as_str() == s.replace('-', "_"))
        .ok_or_else(|| {
            let names: Vec<_> = EventCategory::ALL.iter().map(|c| c.as_str()).collect();
            format!("unknown category '{}' (expected one of: {})", s, names.join(", "))
        })
}
