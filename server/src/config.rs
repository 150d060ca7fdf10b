//! Server configuration, parsed from the command line by the binary

use crate::error::ServerError;
use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about = "Two-player card game server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "256")]
    pub max_clients: usize,

    /// Seed for reproducible shuffles
    #[arg(short, long)]
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_clients: 256,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(address))
    }
}
