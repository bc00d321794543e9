use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use gcm_shared::GcmClient;
use relay_service::{
    config::Config,
    connection::{self, ConnectionHandler, ConnectionRegistry},
    handlers, logging, metrics,
    services::{DisabledGateway, DispatchRouter, GcmGateway, MobilePushGateway, PushService},
    store::{MemoryStore, PgStore, Store},
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("invalid configuration")?;
    logging::init_tracing(config.app.log_format);

    tracing::info!(env = %config.app.env, "Starting relay service");

    let store: Arc<dyn Store> = match &config.database {
        Some(db) => {
            let store = PgStore::connect(db)
                .await
                .context("failed to connect to database")?;
            tracing::info!("Successfully connected to database");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; items are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let gateway: Arc<dyn MobilePushGateway> = match &config.gcm.api_key {
        Some(api_key) => {
            let client = GcmClient::new(api_key.clone())
                .with_endpoint(config.gcm.endpoint.clone())
                .with_retry_count(config.gcm.retry_count);
            tracing::info!(endpoint = %config.gcm.endpoint, "GCM gateway enabled");
            Arc::new(GcmGateway::new(client))
        }
        None => {
            tracing::warn!("GCM_API_KEY not set, mobile wakes disabled");
            Arc::new(DisabledGateway)
        }
    };

    let registry = ConnectionRegistry::new();
    let router = Arc::new(DispatchRouter::new(
        registry.clone(),
        store.clone(),
        gateway,
    ));
    let push_service = Arc::new(PushService::new(store.clone(), router));

    let tcp_addr = config.tcp_addr();
    let listener = TcpListener::bind(&tcp_addr)
        .await
        .with_context(|| format!("failed to bind live listener on {}", tcp_addr))?;
    let connection_handler = Arc::new(ConnectionHandler::new(registry, store, config.keepalive()));

    tokio::spawn(async move {
        if let Err(e) = connection::serve(listener, connection_handler).await {
            tracing::error!("Live listener error: {}", e);
        }
    });

    let http_addr = config.http_addr();
    tracing::info!("Starting HTTP server on {}", http_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(push_service.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::register_routes)
    })
    .bind(&http_addr)
    .with_context(|| format!("failed to bind HTTP server on {}", http_addr))?
    .run()
    .await?;

    Ok(())
}
