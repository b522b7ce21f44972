//! Role Warden daemon
//!
//! Wires the Postgres store and the directory platform into the watchdog
//! and the expiry sweeper, then runs until Ctrl-C.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use role_warden::adapters::{
    CachingRolePlatform, DiscordConfig, DiscordRolePlatform, PostgresCooldownRepository,
    PostgresDepartureTracker, PostgresLastOrgStateRepository, PostgresMembershipRepository,
    PostgresOrgRepository, TracingAuditSink, WebhookAuditSink,
};
use role_warden::application::reconciliation::{
    CooldownEnforcer, DiagnosticThrottle, MembershipSynchronizer, StaleMembershipCleaner, Watchdog,
};
use role_warden::application::scheduler::ExpirySweeper;
use role_warden::application::RoleOperationExecutor;
use role_warden::config::{AppConfig, ConfigError};
use role_warden::ports::{
    AuditSink, CooldownRepository, DepartureTracker, LastOrgStateRepository, MembershipRepository,
    OrgRepository, RolePlatform,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info", false);
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level, config.features.json_logs);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "role warden failed to start");
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<AppConfig, ConfigError> {
    let config = AppConfig::load()?;
    config.validate()?;
    Ok(config)
}

fn init_tracing(fallback: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn Error>> {
    let policies = config.reconciliation.policies()?;

    // Store
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    tracing::info!("database pool ready");

    let orgs: Arc<dyn OrgRepository> = Arc::new(PostgresOrgRepository::new(pool.clone()));
    let memberships: Arc<dyn MembershipRepository> =
        Arc::new(PostgresMembershipRepository::new(pool.clone()));
    let cooldowns: Arc<dyn CooldownRepository> =
        Arc::new(PostgresCooldownRepository::new(pool.clone()));
    let last_org: Arc<dyn LastOrgStateRepository> =
        Arc::new(PostgresLastOrgStateRepository::new(pool.clone()));
    let departures: Arc<dyn DepartureTracker> =
        Arc::new(PostgresDepartureTracker::new(pool.clone()));

    // Platform and executor
    let discord = DiscordRolePlatform::new(
        DiscordConfig::new(
            config.platform.guild_id.clone(),
            config.platform.bot_token.clone(),
        )
        .with_base_url(config.platform.api_base_url.clone())
        .with_timeout(config.platform.request_timeout())
        .with_role_cache_ttl(config.platform.role_cache_ttl()),
    )?;
    let platform: Arc<dyn RolePlatform> = Arc::new(CachingRolePlatform::new(
        Arc::new(discord),
        config.platform.roster_cache_ttl(),
    ));
    let executor = RoleOperationExecutor::new(platform.clone(), config.executor_config());

    let audit: Arc<dyn AuditSink> = match &config.audit.webhook_url {
        Some(url) => Arc::new(WebhookAuditSink::new(url.clone(), config.audit.timeout())?),
        None => Arc::new(TracingAuditSink),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if config.features.enable_watchdog {
        let throttle = Arc::new(DiagnosticThrottle::new(
            config.reconciliation.diagnostic_window(),
        ));
        let synchronizer =
            MembershipSynchronizer::new(memberships.clone(), last_org.clone(), throttle);
        let enforcer = CooldownEnforcer::new(cooldowns.clone(), executor.clone(), policies.clone())
            .with_dedup_window(config.reconciliation.enforcer_dedup_window());

        let mut watchdog = Watchdog::new(
            platform.clone(),
            orgs.clone(),
            memberships.clone(),
            synchronizer,
            enforcer,
            audit.clone(),
            config
                .reconciliation
                .watchdog_config(config.features.enable_startup_accept),
        );
        if config.features.enable_stale_cleanup {
            watchdog = watchdog.with_stale_cleanup(StaleMembershipCleaner::new(
                memberships.clone(),
                last_org.clone(),
                departures.clone(),
                config.reconciliation.stale_retention(),
            ));
        }

        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { watchdog.run(rx).await }));
        tracing::info!("watchdog started");
    }

    if config.features.enable_expiry_sweeper {
        let sweeper = ExpirySweeper::new(
            cooldowns.clone(),
            executor.clone(),
            policies,
            audit.clone(),
            config.reconciliation.sweeper_config(),
        );
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { sweeper.run(rx).await }));
        tracing::info!("expiry sweeper started");
    }

    #[cfg(unix)]
    spawn_reload_handler(executor.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    // Receivers may already be gone if every service is disabled.
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "background task ended abnormally");
        }
    }
    pool.close().await;
    tracing::info!("role warden stopped");
    Ok(())
}

/// Re-reads the configuration on SIGHUP and applies the operation
/// concurrency to the live executor. Other settings need a restart.
#[cfg(unix)]
fn spawn_reload_handler(executor: RoleOperationExecutor) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGHUP handler");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            tracing::info!("received SIGHUP, reloading configuration");
            match load_config() {
                Ok(config) => {
                    executor.set_concurrency(config.reconciliation.concurrency());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reload failed, keeping current configuration");
                }
            }
        }
    });
}
