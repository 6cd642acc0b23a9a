//! 主体解析接口

use std::sync::Arc;

use async_trait::async_trait;
use bastion_errors::{AppError, AppResult};

use super::principal::{Principal, PrincipalId};
use crate::domain::identity::PrincipalKind;

/// 按 ID 读取某一类主体的当前快照
#[async_trait]
pub trait CodeResolver: Send + Sync {
    async fn resolve(&self, id: PrincipalId) -> AppResult<Option<Principal>>;
}

/// 主体类型到解析器的映射表
#[derive(Clone)]
pub struct PrincipalDirectory {
    users: Arc<dyn CodeResolver>,
    roles: Arc<dyn CodeResolver>,
    groups: Arc<dyn CodeResolver>,
    departments: Arc<dyn CodeResolver>,
}

impl PrincipalDirectory {
    pub fn new(
        users: Arc<dyn CodeResolver>,
        roles: Arc<dyn CodeResolver>,
        groups: Arc<dyn CodeResolver>,
        departments: Arc<dyn CodeResolver>,
    ) -> Self {
        Self {
            users,
            roles,
            groups,
            departments,
        }
    }

    pub fn resolver(&self, kind: PrincipalKind) -> &dyn CodeResolver {
        match kind {
            PrincipalKind::User => self.users.as_ref(),
            PrincipalKind::Role => self.roles.as_ref(),
            PrincipalKind::Group => self.groups.as_ref(),
            PrincipalKind::Department => self.departments.as_ref(),
        }
    }

    pub async fn find(&self, kind: PrincipalKind, id: PrincipalId) -> AppResult<Option<Principal>> {
        self.resolver(kind).resolve(id).await
    }

    /// 读取主体，不存在时返回 NotFound
    pub async fn get(&self, kind: PrincipalKind, id: PrincipalId) -> AppResult<Principal> {
        self.find(kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} {} not found", kind, id)))
    }
}
