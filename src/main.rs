use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tracing::{info, Instrument};

use fleet_common::{api, config, db, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load()?;
    logging::setup_logging(&cfg.logging)?;

    let span = logging::service_span(&cfg.service.name);
    async move {
        info!("Starting {} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

        let manager = Arc::new(db::SessionManager::new(cfg.database.clone()));
        api::serve(cfg, manager, Router::new()).await
    }
    .instrument(span)
    .await
}
