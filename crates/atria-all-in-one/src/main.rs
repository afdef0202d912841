mod config;
mod runner;
mod telemetry;

use atria_domain::{IdentityResolver, MeasurementRepository, RealtimePublisher};
use atria_ingest::{
    ingest_router, run_mqtt_ingress, IngestState, IngestionPipeline, MqttIngressConfig,
    PipelineConfig,
};
use atria_postgres::{PostgresClient, PostgresConfig, PostgresMeasurementRepository};
use atria_realtime::{realtime_router, HubConfig, HubPublisher, TelemetryHub};
use atria_registry::{CachingIdentityResolver, HttpRegistryClient, RegistryConfig, ResolverConfig};
use config::ServiceConfig;
use runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = telemetry::init_telemetry(&config.log_level) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        http_port = config.http_port,
        mqtt_broker = %format!("{}:{}", config.mqtt_broker_host, config.mqtt_broker_port),
        registry = %config.registry_base_url,
        "Starting atria-all-in-one service"
    );

    let measurements = match initialize_measurement_store(&config).await {
        Ok(repo) => repo,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let resolver = match initialize_resolver(&config) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("Failed to initialize registry client: {}", e);
            std::process::exit(1);
        }
    };

    let hub = Arc::new(TelemetryHub::new(HubConfig {
        channel_capacity: config.realtime_channel_capacity,
    }));
    let publisher: Arc<dyn RealtimePublisher> = Arc::new(HubPublisher::new(Arc::clone(&hub)));

    let pipeline = Arc::new(IngestionPipeline::new(
        resolver,
        Arc::clone(&measurements),
        publisher,
        PipelineConfig {
            broadcast_timeout: Duration::from_secs(config.broadcast_timeout_secs),
        },
    ));

    let router = ingest_router(IngestState {
        pipeline: Arc::clone(&pipeline),
        measurements,
    })
    .merge(realtime_router(hub))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive());

    let http_addr = format!("{}:{}", config.http_host, config.http_port);
    let mqtt_config = MqttIngressConfig {
        broker_host: config.mqtt_broker_host.clone(),
        broker_port: config.mqtt_broker_port,
        client_id: config.mqtt_client_id.clone(),
        retry_delay: Duration::from_secs(config.mqtt_retry_delay_secs),
    };

    let runner = Runner::new()
        .with_named_process("http_server", move |token| async move {
            let listener = tokio::net::TcpListener::bind(&http_addr).await?;
            info!(addr = %http_addr, "HTTP server listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await?;
            Ok(())
        })
        .with_named_process("mqtt_ingress", move |token| async move {
            run_mqtt_ingress(mqtt_config, pipeline, token).await;
            Ok(())
        });

    if let Err(e) = runner.run().await {
        error!("Service exiting with error: {:#}", e);
        std::process::exit(1);
    }

    info!("Service exiting normally");
}

async fn initialize_measurement_store(
    config: &ServiceConfig,
) -> anyhow::Result<Arc<dyn MeasurementRepository>> {
    let client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    })?;
    client.ping().await?;

    let repository = PostgresMeasurementRepository::new(client);
    repository.ensure_schema().await?;

    Ok(Arc::new(repository))
}

fn initialize_resolver(config: &ServiceConfig) -> anyhow::Result<Arc<dyn IdentityResolver>> {
    let registry = HttpRegistryClient::new(&RegistryConfig {
        base_url: config.registry_base_url.clone(),
        request_timeout: Duration::from_secs(config.registry_timeout_secs),
    })?;

    let cache_ttl = match config.resolver_cache_ttl_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Ok(Arc::new(CachingIdentityResolver::new(
        Arc::new(registry),
        ResolverConfig { cache_ttl },
    )))
}
