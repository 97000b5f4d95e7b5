//! Match lifecycle binary entrypoint wiring storage, the scheduler, and the HTTP layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use futures::future::BoxFuture;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use match_lifecycle::{
    config::{AppConfig, StoreBackend},
    dao::{
        match_store::{MatchStore, memory::MemoryMatchStore},
        storage::StorageError,
    },
    routes,
    services::{scheduler_service, storage_supervisor},
    state::{AppState, SharedState},
};

type ConnectFuture = BoxFuture<'static, Result<Arc<dyn MatchStore>, StorageError>>;
type Connector = Box<dyn FnMut() -> ConnectFuture + Send>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = StoreBackend::from_env();
    let connector = store_connector(backend, config.collection())?;
    info!(?backend, "selected match store backend");

    let app_state = AppState::new(config);
    tokio::spawn(storage_supervisor::run(app_state.clone(), connector));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(scheduler_service::run(app_state.clone(), shutdown_rx));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    // The receiver only goes away once the scheduler has already stopped.
    let _ = shutdown_tx.send(true);
    scheduler.await.context("joining scheduler task")?;

    Ok(())
}

/// Build the closure the storage supervisor calls to (re)connect `backend`.
fn store_connector(backend: StoreBackend, collection: &str) -> anyhow::Result<Connector> {
    let collection = collection.to_owned();

    match backend {
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongo => Ok(Box::new(move || -> ConnectFuture {
            use match_lifecycle::dao::match_store::mongodb::{MongoConfig, MongoMatchStore};

            let collection = collection.clone();
            Box::pin(async move {
                let config = MongoConfig::from_env(collection).await?;
                let store = MongoMatchStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
            })
        })),
        #[cfg(feature = "firestore-store")]
        StoreBackend::Firestore => Ok(Box::new(move || -> ConnectFuture {
            use match_lifecycle::dao::match_store::firestore::{
                FirestoreConfig, FirestoreMatchStore,
            };

            let collection = collection.clone();
            Box::pin(async move {
                let config = FirestoreConfig::from_env(collection)?;
                let store = FirestoreMatchStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
            })
        })),
        StoreBackend::Memory => {
            warn!("using the in-memory match store; data is lost on restart");
            let store = MemoryMatchStore::new();
            Ok(Box::new(move || -> ConnectFuture {
                let store = store.clone();
                Box::pin(async move {
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
                })
            }))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("store backend {other:?} is not compiled into this binary"),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
