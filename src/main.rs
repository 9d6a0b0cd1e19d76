use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod catalog;
mod config;
mod db;
mod dispatch;
mod error;
mod handlers;
mod ledger;
mod models;
mod reminders;
mod storage;

use catalog::PgCatalog;
use config::Config;
use dispatch::{InProcessDispatcher, NotificationPort};
use ledger::CompletionLedger;
use reminders::actions::ActionRegistry;
use reminders::engine::ReminderEngine;
use storage::{PgBlobStore, PgCounterStore};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub engine: Arc<ReminderEngine>,
    pub ledger: Arc<CompletionLedger>,
    pub dispatcher: Arc<dyn NotificationPort>,
    pub actions: Arc<ActionRegistry>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lockin_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Config::from_env();

    // Database
    let db = db::create_pool(&config).await;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    // Ports and core services
    let dispatcher: Arc<dyn NotificationPort> = InProcessDispatcher::new();
    let catalog = Arc::new(PgCatalog::new(db.clone()));
    let blob_store = Arc::new(PgBlobStore::new(db.clone()));
    let counter_store = Arc::new(PgCounterStore::new(db.clone()));

    let engine = Arc::new(ReminderEngine::new(
        dispatcher.clone(),
        blob_store,
        catalog.clone(),
    ));
    let ledger = Arc::new(CompletionLedger::new(
        counter_store,
        catalog,
        config.ledger_max_retries,
        Duration::from_millis(config.ledger_backoff_ms),
    ));
    let actions = Arc::new(ActionRegistry::with_defaults());

    let state = AppState {
        db,
        engine,
        ledger,
        dispatcher,
        actions,
    };

    // Build routes
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    let protected_routes = Router::new()
        // Reminder state & configuration
        .route(
            "/api/habits/:id/reminders",
            get(handlers::reminders::get_reminder_state),
        )
        .route(
            "/api/habits/:id/reminders",
            put(handlers::reminders::apply_reminder_config),
        )
        .route(
            "/api/habits/:id/reminders/completion",
            post(handlers::reminders::reminder_completion),
        )
        .route(
            "/api/habits/:id/reminders/ignored",
            post(handlers::reminders::reminder_ignored),
        )
        .route(
            "/api/habits/:id/reminders/nudge",
            post(handlers::reminders::reevaluate_nudge),
        )
        .route(
            "/api/habits/:id/reminders/actions",
            post(handlers::reminders::reminder_action),
        )
        // Global reminder settings
        .route(
            "/api/reminders/settings",
            get(handlers::reminders::get_global_settings),
        )
        .route(
            "/api/reminders/settings",
            put(handlers::reminders::update_global_settings),
        )
        // Scheduled-notification introspection
        .route(
            "/api/notifications/pending",
            get(handlers::reminders::pending_notifications),
        )
        // Completion ledger
        .route(
            "/api/completions",
            post(handlers::completions::record_completion),
        )
        .route("/api/me/counters", get(handlers::completions::get_counters))
        .layer(middleware::from_fn(auth::middleware::require_user));

    let allowed_origin = config
        .frontend_url
        .parse::<axum::http::HeaderValue>()
        .expect("FRONTEND_URL must be a valid origin");
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-user-id"),
        ]);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
