//! 全量重建
//!
//! 以关系库为准重新生成所有授权规则，用于修复策略存储漂移。分组规则不受影响。

use std::collections::BTreeSet;

use bastion_errors::AppResult;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use super::engine::SyncContext;
use crate::domain::identity::IdentityScheme;
use crate::domain::permission::PermissionId;
use crate::domain::policy::{Effect, PolicyField, PolicyRule};

/// 重建报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub mandates: usize,
    pub added: usize,
    pub removed: usize,
    /// 目标主体已不存在的授权
    pub orphaned: usize,
}

pub struct PolicyRebuilder {
    context: SyncContext,
}

impl PolicyRebuilder {
    pub fn new(context: SyncContext) -> Self {
        Self { context }
    }

    /// 期望的全部授权规则
    async fn desired_rules(&self, report: &mut RebuildReport) -> AppResult<BTreeSet<PolicyRule>> {
        let mut desired = BTreeSet::new();

        for mandate in self.context.mandates.list_all().await? {
            report.mandates += 1;

            let target = mandate.target;
            let Some(principal) = self.context.directory.find(target.kind, target.id).await? else {
                warn!(target = %target, "Mandate target no longer exists, skipped");
                report.orphaned += 1;
                continue;
            };

            let subject = IdentityScheme::mandate_subject(principal.kind, &principal.code);
            let ids: Vec<PermissionId> = mandate.permission_ids().into_iter().collect();
            for permission in self.context.permissions.find_by_ids(&ids).await? {
                let effect =
                    Effect::from(principal.status.is_enabled() && permission.status.is_enabled());
                desired.insert(PolicyRule::new(subject.as_str(), permission.object(), effect));
            }
        }

        Ok(desired)
    }

    pub async fn rebuild(&self) -> AppResult<RebuildReport> {
        let mut report = RebuildReport::default();
        let desired = self.desired_rules(&mut report).await?;

        // 主体为授权主体的现有规则
        let existing: BTreeSet<PolicyRule> = self
            .context
            .store
            .filtered_policies(PolicyField::Subject, &[])
            .await?
            .into_iter()
            .filter(|rule| self.context.scheme.parse(&rule.subject).is_some())
            .collect();

        for stale in existing.difference(&desired) {
            if self.context.store.remove_policy(stale).await? {
                report.removed += 1;
            }
        }
        for missing in desired.difference(&existing) {
            if self.context.store.add_policy(missing).await? {
                report.added += 1;
            }
        }

        counter!("policy_sync_rules_changed_total", "procedure" => "rebuild")
            .increment((report.added + report.removed) as u64);
        info!(
            mandates = report.mandates,
            added = report.added,
            removed = report.removed,
            orphaned = report.orphaned,
            "Policy rebuilt"
        );
        Ok(report)
    }
}
