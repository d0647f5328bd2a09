// ABOUTME: Server binary wiring configuration, database and routes together
// ABOUTME: Serves the HTTP API until interrupted
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Nova Server Binary
//!
//! Starts the knowledge chat API: loads configuration from the environment,
//! opens the database, builds the answer backend and serves the routes.

use anyhow::Result;
use clap::Parser;
use nova_server::{
    config::ServerConfig, database::Database, logging, resources::ServerResources, routes,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "nova-server")]
#[command(about = "Nova - Multi-tenant knowledge chat with streaming answers")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Nova Server");
    info!("{}", config.summary());

    let database = Database::new(&config.database_url).await?;
    info!("Database initialized: {}", config.database_url);

    let http_port = config.http_port;
    let resources = Arc::new(ServerResources::new(database, config)?);
    let router = routes::api_router(resources);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received");
}
