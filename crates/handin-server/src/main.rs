use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::net::TcpListener;

use handin_db::{Database, DbConfig};
use handin_server::auth;
use handin_server::config::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let command = Cli::parse().into_command()?;

    match command {
        Command::Keygen {
            user_id,
            role,
            name,
        } => {
            let db = open_db().await?;
            let raw_key = auth::generate_api_key();
            let hash = auth::sha256_hex(&raw_key);
            let api_key = db.insert_api_key(&name, &hash, &user_id, role).await?;
            eprintln!("Created API key (id: {})", api_key.id);
            eprintln!("  user: {user_id} ({role})");
            if !name.is_empty() {
                eprintln!("  name: {name}");
            }
            // Raw key on stdout so it can be captured
            println!("{raw_key}");
            eprintln!("\nSave this key. It cannot be retrieved again.");
        }
        Command::ListKeys => {
            let db = open_db().await?;
            let keys = db.list_api_keys().await?;
            if keys.is_empty() {
                eprintln!("No API keys found.");
            } else {
                println!(
                    "{:<38} {:<20} {:<16} {:<6} {:<28} LAST USED",
                    "ID", "NAME", "USER", "ROLE", "CREATED"
                );
                for key in keys {
                    println!(
                        "{:<38} {:<20} {:<16} {:<6} {:<28} {}",
                        key.id,
                        if key.name.is_empty() { "-" } else { &key.name },
                        key.user_id,
                        key.role.as_str(),
                        key.created_at,
                        key.last_used_at.as_deref().unwrap_or("never"),
                    );
                }
            }
        }
        Command::RevokeKey { id } => {
            let db = open_db().await?;
            db.delete_api_key(&id).await?;
            eprintln!("Revoked API key {id}");
        }
        Command::Serve(config) => {
            let db = open_db().await?;
            let addr = config.addr();
            let auth = auth::build_auth_config(db.clone()).await;

            let listener = TcpListener::bind(addr).await?;
            tracing::info!("handin-server listening on http://{addr}");

            handin_server::serve(listener, db, auth, config.max_page_limit).await?;
        }
        Command::Ping(config) => {
            let report = handin_server::ping::ping(&config.url, config.count).await;
            if config.count > 0 && !report.any_ok() {
                bail!("all {} health checks against {} failed", report.attempts, config.url);
            }
        }
    }

    Ok(())
}

async fn open_db() -> Result<Arc<dyn Database>> {
    Ok(handin_db::open_database(&DbConfig::from_env()).await?)
}
