use std::collections::BTreeMap;

use async_trait::async_trait;
use bastion_errors::AppResult;
use parking_lot::Mutex;

use crate::domain::mandate::{Mandate, MandateId, MandateRepository, MandateTarget};
use crate::domain::permission::PermissionId;

#[derive(Default)]
struct State {
    next_id: i64,
    mandates: BTreeMap<MandateTarget, Mandate>,
}

#[derive(Default)]
pub struct InMemoryMandateRepository {
    state: Mutex<State>,
}

impl InMemoryMandateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().mandates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MandateRepository for InMemoryMandateRepository {
    async fn find_by_target(&self, target: &MandateTarget) -> AppResult<Option<Mandate>> {
        Ok(self.state.lock().mandates.get(target).cloned())
    }

    async fn find_by_permission(&self, permission_id: PermissionId) -> AppResult<Vec<Mandate>> {
        Ok(self
            .state
            .lock()
            .mandates
            .values()
            .filter(|m| m.contains(permission_id))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Mandate>> {
        Ok(self.state.lock().mandates.values().cloned().collect())
    }

    async fn save(&self, mandate: &Mandate) -> AppResult<Mandate> {
        let mut state = self.state.lock();
        let id = match state.mandates.get(&mandate.target).and_then(|m| m.id) {
            Some(id) => id,
            None => {
                state.next_id += 1;
                MandateId(state.next_id)
            }
        };

        let mut saved = mandate.clone();
        saved.id = Some(id);
        state.mandates.insert(mandate.target, saved.clone());
        Ok(saved)
    }

    async fn delete(&self, target: &MandateTarget) -> AppResult<bool> {
        Ok(self.state.lock().mandates.remove(target).is_some())
    }
}
