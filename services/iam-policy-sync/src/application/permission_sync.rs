//! 权限身份同步

use std::sync::Arc;

use bastion_errors::{AppError, AppResult};
use tracing::info;

use super::cascade_sync::CascadeSync;
use super::mandate_sync::MandateSync;
use super::outcome::RuleChanges;
use crate::domain::permission::{Permission, PermissionUpdate};
use crate::domain::policy::{PolicyField, PolicyStore};

pub struct PermissionIdentitySync {
    store: Arc<dyn PolicyStore>,
    mandates: Arc<MandateSync>,
    cascade: Arc<CascadeSync>,
}

impl PermissionIdentitySync {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        mandates: Arc<MandateSync>,
        cascade: Arc<CascadeSync>,
    ) -> Self {
        Self {
            store,
            mandates,
            cascade,
        }
    }

    /// 处理权限更新：分类移动 → 效果改写 → 对象改写
    pub async fn on_updated(&self, update: &PermissionUpdate) -> AppResult<RuleChanges> {
        if update.category_changed() {
            self.mandates
                .type_change(
                    &update.before.category,
                    &update.after.category,
                    update.after.id,
                )
                .await?;
        }

        let old_object = update.before.object();
        let mut changes = RuleChanges::default();

        if update.status_changed() {
            let from = update.before.status.effect();
            let to = update.after.status.effect();
            let rules = self
                .store
                .filtered_policies(PolicyField::Object, &[old_object.as_str(), from.as_str()])
                .await?;
            for rule in rules {
                let target = rule.with_effect(to);
                if self.store.has_policy(&target).await? {
                    self.store.remove_policy(&rule).await?;
                } else {
                    self.store.update_policy(&rule, &target).await?;
                }
                changes.rewritten += 1;
            }
        }

        if update.object_changed() {
            let new_object = update.after.object();
            let rules = self
                .store
                .filtered_policies(PolicyField::Object, &[old_object.as_str()])
                .await?;
            for rule in rules {
                let target = rule.with_object(new_object.as_str());
                if self.store.has_policy(&target).await? {
                    self.store.remove_policy(&rule).await?;
                    changes.removed += 1;
                } else {
                    self.store.update_policy(&rule, &target).await?;
                    changes.rewritten += 1;
                }
            }
        }

        info!(
            permission_id = %update.after.id,
            object = %old_object,
            rewritten = changes.rewritten,
            "Permission identity synced"
        );
        Ok(changes)
    }

    /// 删除对象为该权限的全部规则；调用前授权数据必须已清理
    pub async fn on_removed(&self, permission: &Permission) -> AppResult<RuleChanges> {
        let holders = self.mandates.holders_of(permission.id).await?;
        if holders > 0 {
            return Err(AppError::failed_precondition(format!(
                "Permission {} is still held by {} mandate(s)",
                permission.id, holders
            )));
        }
        self.cascade.purge_object(&permission.object()).await
    }
}
