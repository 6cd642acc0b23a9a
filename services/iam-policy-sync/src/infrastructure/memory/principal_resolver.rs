use std::collections::HashMap;

use async_trait::async_trait;
use bastion_errors::AppResult;
use parking_lot::RwLock;

use crate::domain::principal::{CodeResolver, Principal, PrincipalId};

/// 单一类型主体的内存解析器
#[derive(Default)]
pub struct InMemoryPrincipalResolver {
    principals: RwLock<HashMap<PrincipalId, Principal>>,
}

impl InMemoryPrincipalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, principal: Principal) {
        self.principals.write().insert(principal.id, principal);
    }

    pub fn remove(&self, id: PrincipalId) -> Option<Principal> {
        self.principals.write().remove(&id)
    }
}

#[async_trait]
impl CodeResolver for InMemoryPrincipalResolver {
    async fn resolve(&self, id: PrincipalId) -> AppResult<Option<Principal>> {
        Ok(self.principals.read().get(&id).cloned())
    }
}
