use std::{process, sync::Arc, time::Duration};

use sponsorship_api_types::EligibleItems;
use sponsorship_manager::{
    application::{
        error::AppError,
        manager::{ManagerDeps, SponsorshipManager},
        slot_content::RendererRegistry,
    },
    cache::{CacheBackend, Clock, EligibleCacheStore, MemoryEligibleStore, SystemClock},
    config,
    domain::error::DomainError,
    infra::{
        db::{PostgresEligibleStore, PostgresRepositories},
        error::InfraError,
        http::{self, ApiState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use tokio::task::JoinHandle;
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
        config::Command::Eligible(args) => run_eligible(settings, args).await,
        config::Command::CheckConfig => run_check_config(&settings),
    }
}

/// Adapters selected from settings, plus the handles the runtime needs.
struct Backends {
    deps: ManagerDeps,
    db: Option<Arc<PostgresRepositories>>,
    shared_cache: Option<Arc<PostgresEligibleStore>>,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let backends = init_backends(&settings).await?;
    let manager = Arc::new(build_manager(&settings, backends.deps));

    let purge_handle = backends
        .shared_cache
        .map(|store| spawn_cache_purge(store, settings.ad_slots.ttl));

    let state = ApiState::new(manager, backends.db);
    let result = serve_http(&settings, state).await;

    if let Some(handle) = purge_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_eligible(
    settings: config::Settings,
    args: config::EligibleArgs,
) -> Result<(), AppError> {
    let backends = init_backends(&settings).await?;
    let manager = build_manager(&settings, backends.deps);

    if !manager.ad_slots().catalog().is_active(&args.slot) {
        return Err(DomainError::unknown_slot(args.slot).into());
    }

    let ids = if args.nocache {
        manager.ad_slots().get_eligible_fresh(&args.slot, None).await
    } else {
        manager.ad_slots().get_eligible(&args.slot, None).await
    };

    let output = serde_json::to_string_pretty(&EligibleItems {
        slot: args.slot,
        ids,
    })
    .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{output}");
    Ok(())
}

fn run_check_config(settings: &config::Settings) -> Result<(), AppError> {
    let slots: Vec<&str> = settings.ad_slots.catalog.names().collect();
    info!(
        target = "sponsorship::config",
        addr = %settings.server.addr,
        database = settings.database.url.is_some(),
        cache_backend = ?settings.cache.backend,
        slots = ?slots,
        content_types = ?settings.sponsorship.enabled_content_types,
        "configuration is valid"
    );
    Ok(())
}

async fn init_backends(settings: &config::Settings) -> Result<Backends, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let Some(database_url) = settings.database.url.as_ref() else {
        if settings.cache.backend == CacheBackend::Postgres {
            return Err(InfraError::configuration(
                "the postgres cache backend requires database.url",
            )
            .into());
        }
        warn!(
            target = "sponsorship::bootstrap",
            "database url is not configured; using in-memory repositories"
        );
        let repos = Arc::new(MemoryRepositories::new());
        let cache: Arc<dyn EligibleCacheStore> =
            Arc::new(MemoryEligibleStore::new(&settings.cache, clock));
        return Ok(Backends {
            deps: ManagerDeps {
                content: repos.clone(),
                meta: repos.clone(),
                campaigns: repos.clone(),
                attachments: repos.clone(),
                terms: repos,
                cache,
            },
            db: None,
            shared_cache: None,
        });
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    let repos = Arc::new(PostgresRepositories::new(pool));

    let shared_cache = (settings.cache.backend == CacheBackend::Postgres).then(|| {
        Arc::new(PostgresEligibleStore::new(
            repos.as_ref().clone(),
            clock.clone(),
        ))
    });
    let cache: Arc<dyn EligibleCacheStore> = match &shared_cache {
        Some(store) => store.clone(),
        None => Arc::new(MemoryEligibleStore::new(&settings.cache, clock)),
    };

    info!(
        target = "sponsorship::bootstrap",
        cache_backend = ?settings.cache.backend,
        "connected to database"
    );

    Ok(Backends {
        deps: ManagerDeps {
            content: repos.clone(),
            meta: repos.clone(),
            campaigns: repos.clone(),
            attachments: repos.clone(),
            terms: repos.clone(),
            cache,
        },
        db: Some(repos),
        shared_cache,
    })
}

fn build_manager(settings: &config::Settings, deps: ManagerDeps) -> SponsorshipManager {
    SponsorshipManager::build(
        settings.manager_config(),
        deps,
        RendererRegistry::with_builtin(),
    )
}

/// Expired rows in the shared cache table are never read, only deleted here.
fn spawn_cache_purge(
    store: Arc<PostgresEligibleStore>,
    ttl: time::Duration,
) -> JoinHandle<()> {
    let period = Duration::try_from(ttl).unwrap_or(Duration::from_secs(15 * 60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(removed) => info!(
                    target = "sponsorship::cache",
                    removed,
                    "purged expired eligible lists"
                ),
                Err(err) => warn!(
                    target = "sponsorship::cache",
                    error = %err,
                    "failed to purge expired eligible lists"
                ),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "sponsorship::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM; connections still open after `grace`
/// are dropped by exiting the process.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
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
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(
        target = "sponsorship::bootstrap",
        grace_secs = grace.as_secs(),
        "shutdown signal received; draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "sponsorship::bootstrap",
            "graceful shutdown timed out; exiting"
        );
        process::exit(1);
    });
}
