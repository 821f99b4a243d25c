use std::{process, sync::Arc};

use cachet::{
    application::{blogs::BlogService, error::AppError},
    cache::{
        CacheConfig, CacheInvalidator, CachedQueryEngine, InvalidationCoordinator, KvStore,
        MemoryKvStore,
    },
    config,
    infra::{
        db::{DocumentStore, PgDocuments},
        error::InfraError,
        http::{self, HttpState},
        kv::RedisStore,
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let documents = init_documents(&settings).await?;
    let store = init_kv_store(&settings).await?;
    let state = build_http_state(documents, store, &settings);
    serve_http(&settings, state).await
}

async fn init_documents(settings: &config::Settings) -> Result<DocumentStore, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "cachet::startup",
            "database.url is not configured; documents are kept in memory"
        );
        return Ok(DocumentStore::memory());
    };

    let pool = PgDocuments::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PgDocuments::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(DocumentStore::Postgres(PgDocuments::new(pool)))
}

async fn init_kv_store(settings: &config::Settings) -> Result<Arc<dyn KvStore>, AppError> {
    let Some(redis_url) = settings.redis.url.as_ref() else {
        warn!(
            target = "cachet::startup",
            "redis.url is not configured; the query cache is process-local"
        );
        return Ok(Arc::new(MemoryKvStore::new()));
    };

    let store = RedisStore::connect(
        redis_url,
        &settings.redis.namespace,
        settings.redis.ttl_scope,
    )
    .await?;
    Ok(Arc::new(store))
}

fn build_http_state(
    documents: DocumentStore,
    store: Arc<dyn KvStore>,
    settings: &config::Settings,
) -> HttpState {
    let cache_config = CacheConfig::from(&settings.cache);
    info!(
        target = "cachet::startup",
        documents = documents.backend(),
        cache_enabled = cache_config.enabled,
        cache_ttl_seconds = cache_config.ttl.as_secs(),
        "query cache configured"
    );

    let engine = CachedQueryEngine::new(documents.clone(), store.clone(), cache_config);
    let invalidation = InvalidationCoordinator::new(CacheInvalidator::new(store.clone()));

    HttpState {
        blogs: Arc::new(BlogService::new(engine)),
        documents,
        store,
        invalidation,
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "cachet::startup", addr = %settings.server.addr, "listening");

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = signalled_rx => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(
        target = "cachet::shutdown",
        grace_seconds = grace.as_secs(),
        "draining connections"
    );
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "cachet::shutdown",
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "cachet::shutdown", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "cachet::shutdown", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "cachet::shutdown", "shutdown signal received");
}
