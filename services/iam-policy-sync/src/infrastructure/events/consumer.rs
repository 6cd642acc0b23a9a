//! 实体变更事件消费者
//!
//! 从 Redis 频道读取 `EventEnvelope<EntityChange>`，逐条交给对账引擎。

use std::sync::Arc;

use bastion_adapter_redis::{PubSubMessage, RedisSubscriber};
use bastion_errors::AppResult;
use bastion_event_core::{EventEnvelope, EventHandler};
use tracing::{info, warn};

use crate::application::{ReconciliationEngine, SyncOutcome};
use crate::domain::events::EntityChange;

pub struct EntityChangeConsumer {
    engine: Arc<ReconciliationEngine>,
}

impl EntityChangeConsumer {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    /// 处理单条消息
    pub async fn dispatch(&self, message: &PubSubMessage) -> AppResult<SyncOutcome> {
        let envelope = EventEnvelope::<EntityChange>::from_json(&message.payload)?;
        let outcome = self.engine.handle(&envelope.data).await?;

        if outcome.is_clean() {
            info!(
                event_id = %envelope.id,
                event_type = %envelope.event_type,
                aggregate_id = %envelope.aggregate_id,
                changes = outcome.changes.total(),
                "Entity change reconciled"
            );
        } else {
            for warning in &outcome.warnings {
                warn!(
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    procedure = warning.procedure,
                    message = %warning.message,
                    "Entity change reconciled with warnings"
                );
            }
        }

        Ok(outcome)
    }

    /// 订阅频道直到连接关闭
    pub async fn run(self: Arc<Self>, subscriber: &RedisSubscriber, channel: &str) -> AppResult<()> {
        subscriber
            .subscribe(&[channel], |message| {
                let consumer = Arc::clone(&self);
                async move { consumer.dispatch(&message).await.map(|_| ()) }
            })
            .await
    }
}
