//! 级联删除

use std::sync::Arc;

use bastion_errors::AppResult;
use tracing::info;

use super::outcome::RuleChanges;
use crate::domain::policy::{GroupingField, PolicyField, PolicyStore};

pub struct CascadeSync {
    store: Arc<dyn PolicyStore>,
}

impl CascadeSync {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// 删除身份出现在主体、对象、成员、分组任一位置的全部规则
    pub async fn purge_identity(&self, identity: &str) -> AppResult<RuleChanges> {
        let mut removed = 0;

        for field in [PolicyField::Subject, PolicyField::Object] {
            for rule in self.store.filtered_policies(field, &[identity]).await? {
                if self.store.remove_policy(&rule).await? {
                    removed += 1;
                }
            }
        }

        for field in [GroupingField::Member, GroupingField::Group] {
            for rule in self.store.filtered_groupings(field, &[identity]).await? {
                if self.store.remove_grouping(&rule).await? {
                    removed += 1;
                }
            }
        }

        info!(identity = %identity, removed, "Principal rules purged");
        Ok(RuleChanges::removed(removed))
    }

    /// 删除对象为该权限的全部策略规则
    pub async fn purge_object(&self, object: &str) -> AppResult<RuleChanges> {
        let mut removed = 0;
        for rule in self
            .store
            .filtered_policies(PolicyField::Object, &[object])
            .await?
        {
            if self.store.remove_policy(&rule).await? {
                removed += 1;
            }
        }

        info!(object = %object, removed, "Permission rules purged");
        Ok(RuleChanges::removed(removed))
    }
}
