//! 运行时装配

use std::sync::Arc;

use bastion_config::AppConfig;
use bastion_errors::AppResult;
use sqlx::PgPool;
use tracing::{error, info};

use crate::application::{ReconciliationEngine, SyncContext};
use crate::domain::identity::IdentityScheme;
use crate::infrastructure::casbin::{CasbinPolicyStore, load_model};
use crate::infrastructure::persistence::{
    PostgresMandateRepository, PostgresPermissionRepository, PostgresPrincipalResolver,
    PostgresRuleRepository,
};

/// 基于 Postgres 构建对账引擎
pub async fn build_engine(config: &AppConfig, pool: &PgPool) -> AppResult<ReconciliationEngine> {
    let scheme = Arc::new(IdentityScheme::new(&config.rbac)?);

    let model = load_model(config.casbin.model_path.as_deref()).await?;
    let rules = Arc::new(PostgresRuleRepository::new(pool.clone()));
    let store = Arc::new(CasbinPolicyStore::with_repository(model, rules).await?);

    let context = SyncContext {
        store,
        scheme,
        directory: Arc::new(PostgresPrincipalResolver::directory(pool)),
        mandates: Arc::new(PostgresMandateRepository::new(pool.clone())),
        permissions: Arc::new(PostgresPermissionRepository::new(pool.clone())),
    };

    info!("Reconciliation engine ready");
    Ok(ReconciliationEngine::new(context))
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
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

    info!("Shutdown signal received");
}
