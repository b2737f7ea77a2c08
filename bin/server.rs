// Lançamentos - Web Server
// REST API over the entry store and the chart aggregation routine

use anyhow::{Context, Result};
use lancamentos::api::{router, AppState};
use lancamentos::{logging, setup_database, Config};
use rusqlite::Connection;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    let config = Config::from_env()?;

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&conn)?;
    info!(path = %config.db_path.display(), "database opened");

    let app = router(AppState::new(conn, config.default_range));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, range = %config.default_range, "server listening");

    axum::serve(listener, app)
        .await
        .context("Server stopped with an error")?;

    Ok(())
}
