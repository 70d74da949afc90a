use std::net::{IpAddr, SocketAddr};

use clap::{Args, FromArgMatches, Parser, Subcommand};
use handin_core::caller::Role;
use handin_core::pagination::MAX_LIMIT;

#[derive(Debug, Parser)]
#[command(name = "handin-server", about = "Completed-task retrieval service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Subcommand to run; a bare invocation serves with env/default settings.
    pub fn into_command(self) -> Result<Command, clap::Error> {
        match self.command {
            Some(command) => Ok(command),
            None => {
                let matches = ServeConfig::augment_args(clap::Command::new("serve"))
                    .try_get_matches_from(["serve"])?;
                Ok(Command::Serve(ServeConfig::from_arg_matches(&matches)?))
            }
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeConfig),
    /// Generate a new API key for a user
    Keygen {
        /// User id the key authenticates as
        #[arg(long)]
        user_id: String,
        /// Role granted to the key
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
        /// Human-readable name for the key
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List all API keys (metadata only, no secrets)
    ListKeys,
    /// Revoke (delete) an API key by ID
    RevokeKey {
        /// The API key ID to revoke
        id: String,
    },
    /// Hit the health endpoint of a running server
    Ping(PingConfig),
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    /// Address to bind
    #[arg(long, env = "HANDIN_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "HANDIN_PORT", default_value = "5002")]
    pub port: u16,

    /// Largest `limit` a listing request may ask for
    #[arg(long, env = "HANDIN_MAX_PAGE_LIMIT", default_value_t = MAX_LIMIT,
          value_parser = clap::value_parser!(i64).range(1..))]
    pub max_page_limit: i64,
}

impl ServeConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Debug, Clone, Args)]
pub struct PingConfig {
    /// Base URL of the server
    #[arg(long, env = "HANDIN_URL", default_value = "http://localhost:5002")]
    pub url: String,

    /// Number of sequential requests
    #[arg(long, default_value = "2")]
    pub count: u32,
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_str(s).ok_or_else(|| format!("unknown role '{s}' (expected 'user' or 'admin')"))
}
