//! Command line

use cat_gateway::PortKind;
use clap::{Parser, Subcommand};

/// FlexCAT translation gateway
#[derive(Debug, Parser)]
#[command(name = "flexcat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway until interrupted (the default).
    Run {
        /// Accept CAT commands and port operations on standard input.
        #[arg(long)]
        console: bool,
    },

    /// Execute CAT commands against the gateway and print the replies.
    Exec {
        /// Commands such as `FA;` or `ZZIF;`.
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Persisted port pair operations. Run while the service is stopped;
    /// a running service takes the same operations on its console.
    Ports {
        #[command(subcommand)]
        action: PortAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum PortAction {
    /// List persisted ports and whether their gateway end opens.
    List,

    /// Create a pair, open it and persist it.
    Create {
        /// master, dedicated, shared, ptt, so2r, otrsp or winkeyer.
        kind: PortKind,
        /// Client-side number; the first free pair when omitted.
        #[arg(long)]
        number: Option<u32>,
    },

    /// Remove a pair by either of its numbers and forget it.
    Delete { number: u32 },
}
