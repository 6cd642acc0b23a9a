//! 成员关系同步

use std::sync::Arc;

use bastion_common::SetDiff;
use bastion_errors::{AppError, AppResult};
use tracing::info;

use super::outcome::RuleChanges;
use crate::domain::identity::{IdentityScheme, PrincipalKind};
use crate::domain::policy::{GroupingRule, PolicyStore};

pub struct MembershipSync {
    store: Arc<dyn PolicyStore>,
    scheme: Arc<IdentityScheme>,
}

impl MembershipSync {
    pub fn new(store: Arc<dyn PolicyStore>, scheme: Arc<IdentityScheme>) -> Self {
        Self { store, scheme }
    }

    fn ensure_group_kind(kind: PrincipalKind) -> AppResult<()> {
        if kind == PrincipalKind::User {
            return Err(AppError::validation("A user cannot be used as a membership group"));
        }
        Ok(())
    }

    /// 整体替换用户在某类分组中的成员关系
    pub async fn set_membership(
        &self,
        kind: PrincipalKind,
        username: &str,
        before: &[String],
        after: &[String],
    ) -> AppResult<RuleChanges> {
        Self::ensure_group_kind(kind)?;

        let member = self.scheme.principal(PrincipalKind::User, username);
        let diff = SetDiff::between(before.iter().cloned(), after.iter().cloned());
        let mut changes = RuleChanges::default();

        for code in &diff.removed {
            let rule = GroupingRule::new(member.as_str(), self.scheme.principal(kind, code));
            if self.store.remove_grouping(&rule).await? {
                changes.removed += 1;
            }
        }

        // 全部 after 都写入，已存在的规则不会重复
        for code in diff.retained.iter().chain(diff.added.iter()) {
            let rule = GroupingRule::new(member.as_str(), self.scheme.principal(kind, code));
            if self.store.add_grouping(&rule).await? {
                changes.added += 1;
            }
        }

        info!(
            member = %member,
            kind = %kind,
            added = changes.added,
            removed = changes.removed,
            "Membership synced"
        );
        Ok(changes)
    }

    /// 撤销单个成员关系
    pub async fn revoke_membership(
        &self,
        kind: PrincipalKind,
        username: &str,
        code: &str,
    ) -> AppResult<RuleChanges> {
        Self::ensure_group_kind(kind)?;

        let rule = GroupingRule::new(
            self.scheme.principal(PrincipalKind::User, username),
            self.scheme.principal(kind, code),
        );
        let removed = usize::from(self.store.remove_grouping(&rule).await?);
        info!(rule = %rule, removed, "Membership revoked");
        Ok(RuleChanges::removed(removed))
    }
}
