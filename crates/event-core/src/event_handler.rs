//! Event Handler 定义

use async_trait::async_trait;
use bastion_errors::AppResult;

use crate::DomainEvent;

/// Event Handler trait
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    /// 处理结果
    type Output: Send;

    async fn handle(&self, event: &E) -> AppResult<Self::Output>;
}
