//! 权限仓储接口

use async_trait::async_trait;
use bastion_errors::AppResult;

use super::permission::{Permission, PermissionId};

/// 权限仓储接口 (只读)
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// 根据 ID 查找权限
    async fn find_by_id(&self, id: PermissionId) -> AppResult<Option<Permission>>;

    /// 根据多个 ID 批量查找权限，不存在的 ID 被忽略
    async fn find_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>>;
}
