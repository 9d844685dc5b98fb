use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsFailureClass, limit::RequestBodyLimitLayer, trace::TraceLayer,
};
use tracing::Span;

pub mod blob;
pub mod domain;
pub mod file_reply;
mod handlers;
pub mod sqlite;

pub use handlers::AppState;

use crate::domain::Registry;
use crate::sqlite::{Mode, Sqlite};
use std::env;
use std::net::SocketAddr;
use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DB_FILE: &str = "cloudstore.db";
const CURRENT_DIR: &str = "./";
const UPLOADS_DIR: &str = "uploads";

pub async fn run() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration from environment
    let db_file = env::var("CLOUDSTORE_DATA_FILE").unwrap_or_else(|_| String::from(DB_FILE));
    let dir = env::var("CLOUDSTORE_DATA_DIR").unwrap_or_else(|_| String::from(CURRENT_DIR));
    let uploads = env::var("CLOUDSTORE_UPLOAD_DIR").unwrap_or_else(|_| String::from(UPLOADS_DIR));
    let port = env::var("CLOUDSTORE_PORT").unwrap_or_else(|_| String::from("5000"));

    // Start init
    let db = Path::new(&dir).join(&db_file);
    if !db.exists() {
        Sqlite::open(db.clone(), Mode::ReadWrite)
            .expect("Database file cannot be created")
            .new_database()
            .unwrap_or_default();
    }

    let socket: SocketAddr = format!("0.0.0.0:{port}").parse().expect("Invalid port");
    tracing::debug!("listening on {socket}");

    let state = AppState {
        db,
        uploads: Path::new(&dir).join(uploads),
        http: reqwest::Client::new(),
    };
    let app = create_routes(state);

    let listener = tokio::net::TcpListener::bind(socket)
        .await
        .expect("Cannot bind server socket");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/:owner/files",
            post(handlers::upload_many_from_form).get(handlers::list_files),
        )
        .route(
            "/api/:owner/files/:file_name",
            post(handlers::upload_file),
        )
        .route("/api/:owner/remote", post(handlers::register_remote))
        .route("/api/:owner/trash", get(handlers::list_trash))
        .route("/api/:owner/search", get(handlers::search_files))
        .route(
            "/api/:owner/file/:id",
            get(handlers::get_file_content).delete(handlers::soft_delete_file),
        )
        .route("/api/:owner/file/:id/meta", get(handlers::get_file_meta))
        .route("/api/:owner/file/:id/name", put(handlers::rename_file))
        .route(
            "/api/:owner/file/:id/favourite",
            post(handlers::toggle_favourite),
        )
        .route("/api/:owner/file/:id/restore", post(handlers::restore_file))
        .route(
            "/api/:owner/file/:id/purge",
            axum::routing::delete(handlers::purge_file),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        tracing::error!("Server error: {error}");
                    },
                ))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(
                    2 * 1024 * 1024 * 1024, /* 2GB */
                ))
                .into_inner(),
        )
        .with_state(Arc::new(state))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("signal received, starting graceful shutdown");
}
