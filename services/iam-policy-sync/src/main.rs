//! IAM Policy Sync 服务入口
//!
//! `iam-policy-sync`          订阅实体变更事件并对账
//! `iam-policy-sync rebuild`  以关系库为准全量重建授权规则后退出

use std::sync::Arc;

use bastion_adapter_postgres::{PostgresConfig, check_connection, create_pool};
use bastion_adapter_redis::RedisSubscriber;
use bastion_config::AppConfig;
use bastion_telemetry::{init_for_env, init_metrics};
use iam_policy_sync::infrastructure::EntityChangeConsumer;
use iam_policy_sync::runtime::{build_engine, shutdown_signal};
use secrecy::ExposeSecret;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = AppConfig::load(&config_dir)?;
    init_for_env(config.is_production(), &config.telemetry.log_level);
    init_metrics(config.telemetry.metrics_addr)?;

    info!(app = %config.app_name, env = %config.app_env, "Starting policy sync service");

    let pool = create_pool(&PostgresConfig::from(&config.database)).await?;
    check_connection(&pool).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let engine = Arc::new(build_engine(&config, &pool).await?);

    if std::env::args().nth(1).as_deref() == Some("rebuild") {
        let report = engine.rebuilder().rebuild().await?;
        info!(?report, "Rebuild finished");
        return Ok(());
    }

    let mut subscriber = RedisSubscriber::new(config.redis.url.expose_secret())?;
    if let Some(prefix) = &config.redis.key_prefix {
        subscriber = subscriber.with_key_prefix(prefix.as_str());
    }
    let consumer = Arc::new(EntityChangeConsumer::new(engine));
    let channel = config.sync.event_channel.clone();

    tokio::select! {
        result = consumer.run(&subscriber, &channel) => result?,
        _ = shutdown_signal() => {},
    }

    info!("Policy sync service stopped");
    Ok(())
}
