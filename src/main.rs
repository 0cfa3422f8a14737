use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod backend;
mod batch;
mod blob_store;
mod cache;
mod circuit_breaker;
mod coalescer;
mod config;
mod error;
mod formatter;
mod handlers;
mod health;
mod index_store;
mod metrics;
mod middleware;
mod models;
mod routes;
mod search;
mod sources;
mod state;
mod transform;
mod utils;
mod validator;

use backend::{BucketConfig, ObjectStore};
use blob_store::BlobStore;
use config::{Args, ListenAddr};
use formatter::{CustomJsonFormatter, CustomPrettyFormatter};
use index_store::IndexStore;
use state::AppState;

fn init_tracing() {
    let use_json = std::env::var("LOG_JSON")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        let our_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });

        EnvFilter::new(format!("warn,icon_api={our_level}"))
    };

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(CustomJsonFormatter)
                    .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().event_format(CustomPrettyFormatter))
            .init();
    }
}

async fn build_store(
    bucket_config: Option<BucketConfig>,
    local_dir: Option<std::path::PathBuf>,
    label: &str,
) -> ObjectStore {
    if let Some(config) = bucket_config {
        tracing::info!(bucket = %config.bucket, endpoint = %config.endpoint, "{label} backed by object store");
        ObjectStore::new_s3(config)
            .await
            .unwrap_or_else(|e| panic!("failed to initialize {label} object store: {e}"))
    } else if let Some(dir) = local_dir {
        tracing::info!(dir = %dir.display(), "{label} backed by local directory");
        ObjectStore::new_local(dir)
    } else {
        panic!(
            "{label} requires either a bucket configuration or a local directory fallback"
        );
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    if args.listen.is_empty() {
        eprintln!("Error: At least one --listen address is required");
        std::process::exit(1);
    }

    let blob_backend = build_store(
        args.blob_store_config(),
        args.local_icons_dir.clone(),
        "blob store",
    )
    .await;
    let index_backend = build_store(
        args.index_store_config(),
        args.local_index_dir.clone(),
        "index store",
    )
    .await;

    let index_store = IndexStore::new(index_backend);
    let blob_store = BlobStore::new(blob_backend);

    let listen_addrs = args.listen.clone();
    let state = Arc::new(AppState::new(args, index_store, blob_store));

    let router = routes::build_router(Arc::clone(&state));

    let mut tasks = Vec::new();

    for listen_addr in listen_addrs {
        let router = router.clone();

        let task = tokio::spawn(async move {
            match listen_addr {
                ListenAddr::Tcp(addr) => {
                    let listener = tokio::net::TcpListener::bind(addr)
                        .await
                        .expect("failed to bind TCP listener");

                    let url = if addr.is_ipv6() {
                        format!("http://[{}]:{}", addr.ip(), addr.port())
                    } else {
                        format!("http://{}:{}", addr.ip(), addr.port())
                    };

                    tracing::info!(url, "listening on TCP");
                    axum::serve(
                        listener,
                        router.into_make_service_with_connect_info::<SocketAddr>(),
                    )
                    .await
                    .expect("server error on TCP listener");
                }
                ListenAddr::Unix(path) => {
                    let _ = std::fs::remove_file(&path);

                    let listener = tokio::net::UnixListener::bind(&path)
                        .expect("failed to bind Unix socket listener");

                    tracing::info!(socket = %path.display(), "listening on Unix socket");
                    axum::serve(listener, router)
                        .await
                        .expect("server error on Unix socket listener");
                }
            }
        });

        tasks.push(task);
    }

    for task in tasks {
        task.await.expect("listener task panicked");
    }
}
