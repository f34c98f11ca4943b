use clap::{Parser, Subcommand};

/// Tenant access requests with Slack-based approval workflow
#[derive(Parser)]
#[command(name = "tenant-access-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (overrides TAG_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
