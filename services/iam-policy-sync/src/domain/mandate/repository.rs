//! 授权仓储接口

use async_trait::async_trait;
use bastion_errors::AppResult;

use super::mandate::{Mandate, MandateTarget};
use crate::domain::permission::PermissionId;

/// 授权仓储接口
#[async_trait]
pub trait MandateRepository: Send + Sync {
    /// 根据目标查找
    async fn find_by_target(&self, target: &MandateTarget) -> AppResult<Option<Mandate>>;

    /// 查找包含某个权限的全部记录
    async fn find_by_permission(&self, permission_id: PermissionId) -> AppResult<Vec<Mandate>>;

    /// 列出全部记录
    async fn list_all(&self) -> AppResult<Vec<Mandate>>;

    /// 按目标插入或更新，返回带 ID 的记录
    async fn save(&self, mandate: &Mandate) -> AppResult<Mandate>;

    /// 删除目标的记录，返回是否存在
    async fn delete(&self, target: &MandateTarget) -> AppResult<bool>;
}
