//! 主体身份同步
//!
//! 主体改名或启停后原地改写引用旧身份的规则，不新增也不删除规则。

use std::sync::Arc;

use bastion_errors::{AppError, AppResult};
use tracing::{debug, info, warn};

use super::outcome::RuleChanges;
use crate::domain::identity::{IdentityScheme, PrincipalKind};
use crate::domain::policy::{Effect, GroupingField, PolicyField, PolicyStore};
use crate::domain::principal::{Principal, PrincipalUpdate};

/// 内置管理员用户名
pub const ADMIN_USERNAME: &str = "admin";

pub struct PrincipalIdentitySync {
    store: Arc<dyn PolicyStore>,
    scheme: Arc<IdentityScheme>,
}

impl PrincipalIdentitySync {
    pub fn new(store: Arc<dyn PolicyStore>, scheme: Arc<IdentityScheme>) -> Self {
        Self { store, scheme }
    }

    /// 更新前校验：快照一致，内置管理员不可改名
    pub fn check_update(&self, update: &PrincipalUpdate) -> AppResult<()> {
        update.ensure_consistent()?;
        if self.is_admin_rename(update) {
            return Err(AppError::forbidden("The admin username cannot be changed"));
        }
        Ok(())
    }

    fn is_admin_rename(&self, update: &PrincipalUpdate) -> bool {
        update.kind() == PrincipalKind::User
            && update.before.code == ADMIN_USERNAME
            && update.code_changed()
    }

    /// 删除前校验：系统内置主体不可删除
    pub fn check_remove(&self, principal: &Principal) -> AppResult<()> {
        if principal.is_system {
            return Err(AppError::forbidden(format!(
                "{} {} is a system principal and cannot be removed",
                principal.kind, principal.code
            )));
        }
        Ok(())
    }

    /// 处理已提交的主体更新：先同步状态，再同步改名
    ///
    /// 否决只在 `check_update` 中进行；到达这里的改名已写入关系库，必须传播。
    pub async fn on_updated(&self, update: &PrincipalUpdate) -> AppResult<RuleChanges> {
        update.ensure_consistent()?;

        let kind = update.kind();
        if self.is_admin_rename(update) {
            warn!(
                from = %update.before.code,
                to = %update.after.code,
                "Admin username changed outside the update veto, propagating"
            );
        }
        let old_identity = self.scheme.principal(kind, &update.before.code);
        let mut changes = RuleChanges::default();

        if update.status_changed() {
            changes += self
                .sync_status(
                    &old_identity,
                    update.before.status.effect(),
                    update.after.status.effect(),
                )
                .await?;
        }

        if update.code_changed() {
            let new_identity = self.scheme.principal(kind, &update.after.code);
            changes += self.sync_code(kind, &old_identity, &new_identity).await?;
        }

        Ok(changes)
    }

    /// 只改写当前持有旧效果的规则
    async fn sync_status(&self, identity: &str, from: Effect, to: Effect) -> AppResult<RuleChanges> {
        if from == to {
            return Ok(RuleChanges::default());
        }

        let rules = self
            .store
            .filtered_policies(PolicyField::Subject, &[identity])
            .await?;

        let mut rewritten = 0;
        for rule in rules.into_iter().filter(|r| r.effect == from) {
            let target = rule.with_effect(to);
            if self.store.has_policy(&target).await? {
                self.store.remove_policy(&rule).await?;
            } else {
                self.store.update_policy(&rule, &target).await?;
            }
            rewritten += 1;
        }

        info!(identity = %identity, from = %from, to = %to, rewritten, "Principal status synced");
        Ok(RuleChanges::rewritten(rewritten))
    }

    async fn sync_code(
        &self,
        kind: PrincipalKind,
        old_identity: &str,
        new_identity: &str,
    ) -> AppResult<RuleChanges> {
        let mut changes = RuleChanges::default();

        let rules = self
            .store
            .filtered_policies(PolicyField::Subject, &[old_identity])
            .await?;
        for rule in rules {
            let target = rule.with_subject(new_identity);
            if self.store.has_policy(&target).await? {
                self.store.remove_policy(&rule).await?;
                changes.removed += 1;
            } else {
                self.store.update_policy(&rule, &target).await?;
                changes.rewritten += 1;
            }
        }

        let field = if kind.is_member_side() {
            GroupingField::Member
        } else {
            GroupingField::Group
        };
        let groupings = self.store.filtered_groupings(field, &[old_identity]).await?;
        for grouping in groupings {
            let target = match field {
                GroupingField::Member => grouping.with_member(new_identity),
                GroupingField::Group => grouping.with_group(new_identity),
            };
            if self.store.has_grouping(&target).await? {
                self.store.remove_grouping(&grouping).await?;
                changes.removed += 1;
            } else {
                self.store.update_grouping(&grouping, &target).await?;
                changes.rewritten += 1;
            }
        }

        debug!(from = %old_identity, to = %new_identity, ?changes, "Principal renamed");
        Ok(changes)
    }
}
