//! 授权同步
//!
//! 授权记录变化时按对象字符串求差集，先删后加。
//!
//! 状态机：
//! - absent --(allot, resources≠∅)--> active
//! - active --(allot, resources≠∅)--> active，应用差集
//! - active --(allot, resources=∅ | permission_remove 清空)--> absent

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bastion_common::SetDiff;
use bastion_errors::{AppError, AppResult};
use tracing::{debug, info};

use super::outcome::RuleChanges;
use crate::domain::identity::IdentityScheme;
use crate::domain::mandate::{Allotment, Mandate, MandateRepository, MandateTarget, flatten};
use crate::domain::permission::{Permission, PermissionId, PermissionRepository};
use crate::domain::policy::{Effect, PolicyField, PolicyRule, PolicyStore};
use crate::domain::principal::{Principal, PrincipalDirectory};

pub struct MandateSync {
    mandates: Arc<dyn MandateRepository>,
    permissions: Arc<dyn PermissionRepository>,
    directory: Arc<PrincipalDirectory>,
    store: Arc<dyn PolicyStore>,
}

impl MandateSync {
    pub fn new(
        mandates: Arc<dyn MandateRepository>,
        permissions: Arc<dyn PermissionRepository>,
        directory: Arc<PrincipalDirectory>,
        store: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            mandates,
            permissions,
            directory,
            store,
        }
    }

    /// 写入授权并同步策略规则
    pub async fn allot(&self, allotment: &Allotment) -> AppResult<RuleChanges> {
        allotment.validate()?;

        let target = allotment.target;
        let principal = self.directory.get(target.kind, target.id).await?;
        // 引用的权限必须全部存在，否则不写任何数据
        let requested = flatten(&allotment.resources);
        let granted = self.load(&requested).await?;
        let found: BTreeSet<PermissionId> = granted.iter().map(|p| p.id).collect();
        let missing: Vec<String> = requested
            .difference(&found)
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::not_found(format!(
                "Permissions not found for {}: {}",
                target,
                missing.join(", ")
            )));
        }

        let existing = self.mandates.find_by_target(&target).await?;
        let before = existing
            .as_ref()
            .map(Mandate::permission_ids)
            .unwrap_or_default();

        if allotment.resources.is_empty() {
            if existing.is_some() {
                self.mandates.delete(&target).await?;
                info!(target = %target, "Mandate removed by empty allotment");
            }
        } else {
            let mut mandate = existing.unwrap_or_else(|| Mandate::new(target));
            mandate.replace_resources(&allotment.resources);
            self.mandates.save(&mandate).await?;
        }

        self.reconcile(&principal, &before, granted).await
    }

    /// 目标当前持有的权限
    pub async fn permissions_for(&self, target: &MandateTarget) -> AppResult<Vec<Permission>> {
        match self.mandates.find_by_target(target).await? {
            Some(mandate) => {
                let ids: Vec<PermissionId> = mandate.permission_ids().into_iter().collect();
                self.permissions.find_by_ids(&ids).await
            }
            None => Ok(Vec::new()),
        }
    }

    /// 删除目标的授权并撤销对应规则
    pub async fn remove_by_target(&self, target: &MandateTarget) -> AppResult<RuleChanges> {
        let principal = self.directory.get(target.kind, target.id).await?;
        let Some(existing) = self.mandates.find_by_target(target).await? else {
            return Ok(RuleChanges::default());
        };

        self.mandates.delete(target).await?;
        self.reconcile(&principal, &existing.permission_ids(), Vec::new())
            .await
    }

    /// 主体已删除时只删除授权记录，规则由级联删除负责
    pub async fn drop_for_target(&self, target: &MandateTarget) -> AppResult<bool> {
        let dropped = self.mandates.delete(target).await?;
        if dropped {
            debug!(target = %target, "Mandate dropped with its principal");
        }
        Ok(dropped)
    }

    /// 权限改分类后，在所有包含它的授权中移动资源桶；只改授权数据
    pub async fn type_change(
        &self,
        old_category: &str,
        new_category: &str,
        permission_id: PermissionId,
    ) -> AppResult<usize> {
        let mut moved = 0;
        for mut mandate in self.mandates.find_by_permission(permission_id).await? {
            if mandate.reclassify(permission_id, old_category, new_category) {
                self.mandates.save(&mandate).await?;
                moved += 1;
            }
        }

        debug!(
            permission_id = %permission_id,
            from = %old_category,
            to = %new_category,
            moved,
            "Mandates reclassified"
        );
        Ok(moved)
    }

    /// 仍包含该权限的授权数
    pub async fn holders_of(&self, permission_id: PermissionId) -> AppResult<usize> {
        Ok(self.mandates.find_by_permission(permission_id).await?.len())
    }

    /// 从所有授权中移除权限；清空的授权被删除。不写策略规则
    pub async fn permission_remove(&self, permission_id: PermissionId) -> AppResult<usize> {
        let mut drained = 0;
        for mut mandate in self.mandates.find_by_permission(permission_id).await? {
            if !mandate.strip_permission(permission_id) {
                continue;
            }
            if mandate.is_empty() {
                self.mandates.delete(&mandate.target).await?;
            } else {
                self.mandates.save(&mandate).await?;
            }
            drained += 1;
        }

        info!(permission_id = %permission_id, drained, "Permission drained from mandates");
        Ok(drained)
    }

    /// 以对象字符串求差集：先删除 before − after，再添加 after − before
    ///
    /// `after` 为已加载的目标权限
    async fn reconcile(
        &self,
        principal: &Principal,
        before: &BTreeSet<PermissionId>,
        after: Vec<Permission>,
    ) -> AppResult<RuleChanges> {
        let subject = IdentityScheme::mandate_subject(principal.kind, &principal.code);

        let before_objects: BTreeSet<String> = self
            .load(before)
            .await?
            .iter()
            .map(Permission::object)
            .collect();
        let after_permissions: BTreeMap<String, Permission> = after
            .into_iter()
            .map(|p| (p.object(), p))
            .collect();

        let diff = SetDiff::between(before_objects, after_permissions.keys().cloned());
        let mut changes = RuleChanges::default();

        for object in &diff.removed {
            // 对象的删除不区分效果
            for rule in self
                .store
                .filtered_policies(PolicyField::Subject, &[subject.as_str(), object.as_str()])
                .await?
            {
                if self.store.remove_policy(&rule).await? {
                    changes.removed += 1;
                }
            }
        }

        for object in &diff.added {
            let Some(permission) = after_permissions.get(object) else {
                continue;
            };
            let effect =
                Effect::from(principal.status.is_enabled() && permission.status.is_enabled());
            let rule = PolicyRule::new(subject.as_str(), object.as_str(), effect);
            if self.store.add_policy(&rule).await? {
                changes.added += 1;
            }
        }

        info!(
            subject = %subject,
            added = changes.added,
            removed = changes.removed,
            retained = diff.retained.len(),
            "Mandate synced"
        );
        Ok(changes)
    }

    async fn load(&self, ids: &BTreeSet<PermissionId>) -> AppResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<PermissionId> = ids.iter().copied().collect();
        self.permissions.find_by_ids(&ids).await
    }
}
