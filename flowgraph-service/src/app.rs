//! Application wiring
//!
//! Builds every component from a validated [`Config`].

use std::sync::Arc;

use anyhow::{Context, Result};
use flowgraph_client::{DigesterClient, HttpTransport, QueuerClient};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::AppState;
use crate::config::{Config, LeaseBackend};
use crate::convert::{CommandConverter, Converter, PassthroughConverter};
use crate::db;
use crate::repository::buckets::Buckets;
use crate::repository::{
    ArtifactStore, Lease, LeaseAwareStore, ObjectArtifactStore, ObjectLease, PgLease,
};
use crate::service::{GraphService, ProductionPipeline};

/// Builds the handler state. `shutdown` is handed to the production
/// pipeline so that digest polling stops with the process.
pub async fn build_state(config: &Config, shutdown: CancellationToken) -> Result<AppState> {
    let transport = Arc::new(
        HttpTransport::new(config.transport.clone()).context("Failed to build HTTP transport")?,
    );

    let buckets = Buckets::from_config(&config.storage, &config.transport)
        .context("Failed to configure object storage")?;

    let lease = build_lease(config, buckets.progress).await?;
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(ObjectArtifactStore::new(buckets.graphs));
    let guarded: Arc<dyn ArtifactStore> = Arc::new(LeaseAwareStore::new(
        Arc::clone(&artifacts),
        Arc::clone(&lease),
    ));

    let sink = Arc::new(QueuerClient::new(
        config.queuer_endpoint.clone(),
        Arc::clone(&transport),
    ));
    let digester = Arc::new(DigesterClient::new(
        config.digester_endpoint.clone(),
        config.poll.clone(),
        transport,
    ));

    let converter: Arc<dyn Converter> = match &config.converter_command {
        Some(command) => {
            info!("Converting digests with {}", command.join(" "));
            Arc::new(CommandConverter::new(command)?)
        }
        None => Arc::new(PassthroughConverter),
    };

    Ok(AppState {
        graphs: Arc::new(GraphService::new(guarded, Arc::clone(&lease), sink)),
        production: Arc::new(ProductionPipeline::new(
            digester, converter, artifacts, lease, shutdown,
        )),
    })
}

async fn build_lease(
    config: &Config,
    progress: Arc<dyn object_store::ObjectStore>,
) -> Result<Arc<dyn Lease>> {
    match config.lease.backend {
        LeaseBackend::Object => Ok(Arc::new(ObjectLease::new(progress, config.lease.max_age))),
        LeaseBackend::Postgres => {
            let database_url = config
                .lease
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres lease backend")?;

            info!("Connecting to lease database...");
            let pool = db::create_pool(database_url)
                .await
                .context("Failed to create database pool")?;
            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok(Arc::new(PgLease::new(pool, config.lease.max_age)))
        }
    }
}
