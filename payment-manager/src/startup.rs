use crate::config::{PaymentManagerConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    CsvIngestService, EvidenceManager, EvidencePolicy, EvidenceStore, GridFsEvidenceStore,
    InMemoryEvidenceStore, InMemoryPaymentStore, MongoDb, MongoPaymentStore, PaymentQueryService,
    PaymentStore,
};
use axum::{
    extract::DefaultBodyLimit,
    http::header,
    middleware::from_fn,
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{http_trace_layer, request_id_middleware},
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: PaymentManagerConfig,
    pub payments: Arc<dyn PaymentStore>,
    pub query: PaymentQueryService,
    pub ingest: CsvIngestService,
    pub evidence: EvidenceManager,
}

impl AppState {
    pub fn new(
        config: PaymentManagerConfig,
        payments: Arc<dyn PaymentStore>,
        blobs: Arc<dyn EvidenceStore>,
    ) -> Self {
        let policy = EvidencePolicy {
            max_bytes: config.evidence.max_bytes,
            allowed_extensions: config.evidence.allowed_extensions.clone(),
        };

        Self {
            query: PaymentQueryService::new(payments.clone()),
            ingest: CsvIngestService::new(payments.clone()),
            evidence: EvidenceManager::new(payments.clone(), blobs, policy),
            payments,
            config,
        }
    }

    /// Wires the stores selected by `config.store`.
    pub async fn from_config(config: PaymentManagerConfig) -> Result<Self, AppError> {
        let (payments, blobs) = match config.store {
            StoreBackend::Mongo => {
                let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
                let store = MongoPaymentStore::new(db.database());
                store.init_indexes().await?;
                (
                    Arc::new(store) as Arc<dyn PaymentStore>,
                    Arc::new(GridFsEvidenceStore::new(db.database())) as Arc<dyn EvidenceStore>,
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory stores; data is lost on restart");
                (
                    Arc::new(InMemoryPaymentStore::new()) as Arc<dyn PaymentStore>,
                    Arc::new(InMemoryEvidenceStore::new()) as Arc<dyn EvidenceStore>,
                )
            }
        };

        Ok(Self::new(config, payments, blobs))
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/payments",
            get(handlers::list_payments).post(handlers::create_payment),
        )
        .route(
            "/payments/:payment_id",
            patch(handlers::update_payment).delete(handlers::delete_payment),
        )
        .route("/payments/:payment_id/evidence", post(handlers::upload_evidence))
        .route(
            "/payments/evidence/:file_id",
            get(handlers::download_evidence),
        )
        .route("/upload/payments", post(handlers::upload_payments))
        .layer(DefaultBodyLimit::max(state.config.max_request_bytes))
        .layer(from_fn(metrics_middleware))
        .layer(http_trace_layer())
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: PaymentManagerConfig) -> Result<Self, AppError> {
        let port = config.common.port;
        let state = AppState::from_config(config).await.map_err(|e| {
            tracing::error!("Failed to initialize stores: {}", e);
            e
        })?;
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
