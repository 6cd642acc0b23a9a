use std::collections::HashMap;

use async_trait::async_trait;
use bastion_errors::AppResult;
use parking_lot::RwLock;

use crate::domain::permission::{Permission, PermissionId, PermissionRepository};

#[derive(Default)]
pub struct InMemoryPermissionRepository {
    permissions: RwLock<HashMap<PermissionId, Permission>>,
}

impl InMemoryPermissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, permission: Permission) {
        self.permissions.write().insert(permission.id, permission);
    }

    pub fn remove(&self, id: PermissionId) -> Option<Permission> {
        self.permissions.write().remove(&id)
    }
}

#[async_trait]
impl PermissionRepository for InMemoryPermissionRepository {
    async fn find_by_id(&self, id: PermissionId) -> AppResult<Option<Permission>> {
        Ok(self.permissions.read().get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        let permissions = self.permissions.read();
        Ok(ids.iter().filter_map(|id| permissions.get(id).cloned()).collect())
    }
}
