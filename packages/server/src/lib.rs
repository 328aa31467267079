#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for disaster reports.
//!
//! Accepts multipart report submissions at `POST /api/reports` and answers
//! proximity queries at `GET /api/reports/near`. Images uploaded to the
//! local backend are served from `/uploads`.

pub mod config;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use config::{ServerConfig, StoreBackend, UploadBackend};
use disaster_reports_database::memory::MemoryReportStore;
use disaster_reports_database::postgis::PostgisReportStore;
use disaster_reports_database::{ReportStore, db, run_migrations};
use disaster_reports_ingest::{IngestionService, ProximityQueryService};
use disaster_reports_rate_limit::{RateLimiter, SlidingWindowLimiter};
use disaster_reports_upload::local::LocalImageStore;
use disaster_reports_upload::r2::R2ImageStore;
use disaster_reports_upload::{ImagePolicy, ImageStore, UploadError};

/// Path local uploads are served under.
pub const UPLOADS_PATH: &str = "/uploads";

/// Shared application state.
pub struct AppState {
    pub ingestion: IngestionService,
    pub proximity: ProximityQueryService,
    /// Image backend. `None` rejects image parts.
    pub images: Option<Arc<dyn ImageStore>>,
    pub image_policy: ImagePolicy,
    /// Key rate limits on forwarded client addresses instead of the peer.
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Wires the services over a shared store and limiter.
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn ReportStore>,
        limiter: Arc<dyn RateLimiter>,
        images: Option<Arc<dyn ImageStore>>,
    ) -> Self {
        Self {
            ingestion: IngestionService::new(Arc::clone(&store), limiter)
                .with_store_timeout(config.store_timeout),
            proximity: ProximityQueryService::new(store).with_store_timeout(config.store_timeout),
            images,
            image_policy: ImagePolicy::default(),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::QueryConfig::default().error_handler(handlers::query_error))
            .route("/health", web::get().to(handlers::health))
            .route("/report-types", web::get().to(handlers::report_types))
            .route("/reports", web::post().to(handlers::submit_report))
            .route("/reports/near", web::get().to(handlers::near_reports)),
    );
}

/// Starts the disaster reports API server.
///
/// Reads [`ServerConfig`] from the environment, opens the configured report
/// store (running migrations for `PostGIS`) and image backend, and starts
/// the Actix-Web HTTP server. The caller is responsible for providing the
/// async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the configuration is invalid, the database connection or
/// migrations fail, or the image backend cannot be initialized.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env().expect("Invalid server configuration");

    let store = open_store(&config).await;
    let images = open_image_store(&config).expect("Failed to initialize image store");
    let limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowLimiter::new(config.rate_limit));

    let state = web::Data::new(AppState::new(&config, store, limiter, images));

    let serve_uploads = config.upload_backend == UploadBackend::Local;
    let upload_dir = config.upload_dir.clone();

    log::info!(
        "Starting server on {}:{} (store: {}, uploads: {}, limit: {} per {}s)",
        config.bind_addr,
        config.port,
        config.store_backend,
        config.upload_backend,
        config.rate_limit.max_requests,
        config.rate_limit.window.as_secs()
    );

    HttpServer::new(move || {
        let cors = Cors::permissive();

        let app = App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure);

        if serve_uploads {
            app.service(Files::new(UPLOADS_PATH, &upload_dir))
        } else {
            app
        }
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

#[allow(clippy::future_not_send)]
async fn open_store(config: &ServerConfig) -> Arc<dyn ReportStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            log::warn!("Using in-memory report store; reports are lost on restart");
            Arc::new(MemoryReportStore::new())
        }
        StoreBackend::Postgis => {
            log::info!("Connecting to database...");
            let db_conn = db::connect_from_env(config.store_timeout)
                .await
                .expect("Failed to connect to database");

            log::info!("Running migrations...");
            run_migrations(db_conn.as_ref())
                .await
                .expect("Failed to run migrations");

            Arc::new(PostgisReportStore::new(Arc::from(db_conn)))
        }
    }
}

fn open_image_store(config: &ServerConfig) -> Result<Option<Arc<dyn ImageStore>>, UploadError> {
    Ok(match config.upload_backend {
        UploadBackend::Local => Some(Arc::new(LocalImageStore::new(
            &config.upload_dir,
            UPLOADS_PATH,
        )?)),
        UploadBackend::R2 => Some(Arc::new(R2ImageStore::from_env()?)),
        UploadBackend::Disabled => None,
    })
}
