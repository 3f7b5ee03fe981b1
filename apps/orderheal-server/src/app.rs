//! Application wiring

use anyhow::{Context, Result};
use orderheal_core::AppConfig;
use orderheal_infra::{
    create_pool, run_migrations, HttpIncidentChannel, HttpOrderStatusClient, HttpStopListClient, IikoPosClient,
    LogStopListNotifier, NatsQueue, PgOrderRepository, PgStoreRepository, TelegramNotifier,
};
use orderheal_webhook::memory::{InMemoryOrderRepository, InMemoryQueue, InMemoryStoreRepository, MemorySeed};
use orderheal_webhook::{
    Dispatcher, ErrorCatalog, IncidentChannel, MessageQueue, OrderRepository, Ports,
    StopListNotifier, StoreRepository,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::Args;
use crate::server::Server;

pub struct App {
    config: AppConfig,
    dispatcher: Arc<Dispatcher>,
}

impl App {
    pub async fn build(args: Args) -> Result<Self> {
        let mut config = AppConfig::load_from(Some(args.config.as_path()))
            .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
        if let Some(port) = args.port {
            config.server.port = port;
        }

        let catalog = ErrorCatalog::load(&config.catalog.path)
            .with_context(|| format!("Failed to load error catalog from {}", config.catalog.path))?;
        info!(entries = catalog.len(), path = %config.catalog.path, "Error catalog loaded");

        let ports = if args.in_memory {
            warn!("Running with in-memory repositories and queues");
            in_memory_ports(&config, args.seed.as_deref())?
        } else {
            connect_ports(&config, args.migrate).await?
        };

        let dispatcher = Dispatcher::from_config(ports, Arc::new(catalog), &config)
            .context("Invalid stop-list configuration")?;

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub async fn run(self) -> Result<()> {
        Server::new(&self.config.server, self.dispatcher)?.run().await
    }
}

/// HTTP collaborators shared by both port sets
fn http_ports(
    config: &AppConfig,
    orders: Arc<dyn OrderRepository>,
    stores: Arc<dyn StoreRepository>,
    queue: Arc<dyn MessageQueue>,
) -> Result<Ports> {
    let timeout = config.status_api.timeout();

    let stop_list_notifier: Arc<dyn StopListNotifier> = if config.telegram.is_enabled() {
        Arc::new(TelegramNotifier::new(&config.telegram, timeout)?)
    } else {
        Arc::new(LogStopListNotifier)
    };

    let incident_channels = config
        .incidents
        .channels
        .iter()
        .map(|c| HttpIncidentChannel::new(c, timeout).map(|ch| Arc::new(ch) as Arc<dyn IncidentChannel>))
        .collect::<orderheal_webhook::Result<Vec<_>>>()?;

    Ok(Ports {
        orders,
        stores,
        pos: Arc::new(IikoPosClient::new(&config.pos)?),
        stop_list: Arc::new(HttpStopListClient::new(&config.stop_list.base_url, timeout)?),
        stop_list_notifier,
        queue,
        status_sink: Arc::new(HttpOrderStatusClient::new(&config.status_api.base_url, timeout)?),
        incident_channels,
    })
}

async fn connect_ports(config: &AppConfig, migrate: bool) -> Result<Ports> {
    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    if migrate {
        run_migrations(&pool).await.context("Database migration failed")?;
    }

    let queue = NatsQueue::connect(config.nats.clone().into())
        .await
        .context("Failed to connect to NATS")?;

    http_ports(
        config,
        Arc::new(PgOrderRepository::new(pool.clone())),
        Arc::new(PgStoreRepository::new(pool)),
        Arc::new(queue),
    )
}

fn in_memory_ports(config: &AppConfig, seed: Option<&Path>) -> Result<Ports> {
    let orders = Arc::new(InMemoryOrderRepository::default());
    let stores = Arc::new(InMemoryStoreRepository::default());

    if let Some(path) = seed {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let seed = MemorySeed::from_json(&content)
            .with_context(|| format!("Invalid seed file {}", path.display()))?;
        info!(stores = seed.stores.len(), orders = seed.orders.len(), "Seeding in-memory repositories");
        seed.apply(&orders, &stores);
    }

    http_ports(config, orders, stores, Arc::new(InMemoryQueue::default()))
}
