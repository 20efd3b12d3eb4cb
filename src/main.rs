use clap::Parser;
use dotenvy::dotenv;
use nas_storage_core::config::StorageConfig;
use nas_storage_core::infrastructure::{database, storage};
use nas_storage_core::services::file_service::FileService;
use nas_storage_core::services::worker::BackgroundWorker;
use nas_storage_core::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Use relaxed development defaults instead of the environment
    #[arg(long, conflicts_with = "production")]
    dev: bool,

    /// Require production settings (JWT_SECRET, ALLOWED_ORIGINS) from the environment
    #[arg(long)]
    production: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nas_storage_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !matches!(args.mode.as_str(), "api" | "worker" | "all") {
        anyhow::bail!("unknown mode {:?}, expected api, worker or all", args.mode);
    }

    info!("🚀 Starting NAS storage core [Mode: {}]...", args.mode);

    let config = if args.dev {
        StorageConfig::development()
    } else if args.production {
        StorageConfig::production()?
    } else {
        StorageConfig::from_env()
    };
    config.validate()?;
    info!(
        "🛡️  Storage Config: Max Size={}MB, Chunk={}KB, Delete policy={:?}, Uploads/h={}",
        config.max_file_size / 1024 / 1024,
        config.default_chunk_size / 1024,
        config.delete_policy,
        config.uploads_per_hour
    );

    // 2. Common infrastructure
    let db = database::setup_database().await?;
    let storage_service = storage::setup_storage(&config).await?;
    let file_service = Arc::new(FileService::new(
        db.clone(),
        storage_service.clone(),
        config.clone(),
    ));

    // 3. Graceful shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Worker
    if args.mode == "worker" || args.mode == "all" {
        let worker = BackgroundWorker::new(
            file_service.clone(),
            storage_service.clone(),
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(worker.run()));
        info!("👷 Worker service initialized.");
    }

    // 5. API
    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            file_service: file_service.clone(),
            config: config.clone(),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for a signal, then stop every service
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down storage services...");
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Service task failed: {}", e);
        }
    }

    info!("👋 Storage core exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
