//! 对账引擎
//!
//! 实体变更的唯一入口。每次对账内部严格按顺序执行，失败的步骤不重试。
//! 写入前即可判定的错误原样返回；实体提交后的策略存储失败转为警告。

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bastion_errors::AppResult;
use bastion_event_core::EventHandler;
use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use super::cascade_sync::CascadeSync;
use super::mandate_sync::MandateSync;
use super::membership_sync::MembershipSync;
use super::menus::MenuQuery;
use super::outcome::{RuleChanges, SyncOutcome};
use super::permission_sync::PermissionIdentitySync;
use super::principal_sync::PrincipalIdentitySync;
use super::rebuild::PolicyRebuilder;
use crate::domain::events::EntityChange;
use crate::domain::identity::{IdentityScheme, PrincipalKind};
use crate::domain::mandate::{Allotment, MandateRepository, MandateTarget};
use crate::domain::permission::{Permission, PermissionRepository, PermissionUpdate};
use crate::domain::policy::PolicyStore;
use crate::domain::principal::{Principal, PrincipalDirectory, PrincipalUpdate};

/// 引擎依赖
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn PolicyStore>,
    pub scheme: Arc<IdentityScheme>,
    pub directory: Arc<PrincipalDirectory>,
    pub mandates: Arc<dyn MandateRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
}

pub struct ReconciliationEngine {
    context: SyncContext,
    principals: PrincipalIdentitySync,
    permissions: PermissionIdentitySync,
    mandates: Arc<MandateSync>,
    memberships: MembershipSync,
    cascade: Arc<CascadeSync>,
}

impl ReconciliationEngine {
    pub fn new(context: SyncContext) -> Self {
        let cascade = Arc::new(CascadeSync::new(context.store.clone()));
        let mandates = Arc::new(MandateSync::new(
            context.mandates.clone(),
            context.permissions.clone(),
            context.directory.clone(),
            context.store.clone(),
        ));

        Self {
            principals: PrincipalIdentitySync::new(context.store.clone(), context.scheme.clone()),
            permissions: PermissionIdentitySync::new(
                context.store.clone(),
                mandates.clone(),
                cascade.clone(),
            ),
            memberships: MembershipSync::new(context.store.clone(), context.scheme.clone()),
            mandates,
            cascade,
            context,
        }
    }

    pub fn rebuilder(&self) -> PolicyRebuilder {
        PolicyRebuilder::new(self.context.clone())
    }

    pub fn menus(&self) -> MenuQuery {
        MenuQuery::new(self.context.store.clone(), self.context.scheme.clone())
    }

    /// 执行一次对账并记录指标
    async fn settle<F>(&self, procedure: &'static str, run: F) -> AppResult<SyncOutcome>
    where
        F: Future<Output = AppResult<RuleChanges>>,
    {
        let start = Instant::now();
        let result = run.await;
        histogram!("policy_sync_duration_ms", "procedure" => procedure)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(changes) => {
                counter!("policy_sync_runs_total", "procedure" => procedure, "result" => "ok")
                    .increment(1);
                counter!("policy_sync_rules_changed_total", "procedure" => procedure)
                    .increment(changes.total() as u64);
                debug!(procedure, ?changes, "Reconciliation applied");
                Ok(SyncOutcome::applied(procedure, changes))
            }
            Err(e) if e.is_desync_risk() => {
                counter!("policy_sync_runs_total", "procedure" => procedure, "result" => "warning")
                    .increment(1);
                counter!("policy_sync_warnings_total", "procedure" => procedure).increment(1);
                warn!(procedure, error = %e, "Policy store out of sync, relational state kept");
                Ok(SyncOutcome::warned(procedure, e.to_string()))
            }
            Err(e) => {
                counter!("policy_sync_runs_total", "procedure" => procedure, "result" => e.kind())
                    .increment(1);
                error!(procedure, error = %e, "Reconciliation rejected");
                Err(e)
            }
        }
    }

    // ---- 主体 ----

    /// 更新前的否决检查
    pub fn before_update_principal(&self, update: &PrincipalUpdate) -> AppResult<()> {
        self.principals.check_update(update)
    }

    /// 删除前的否决检查
    pub fn before_remove_principal(&self, principal: &Principal) -> AppResult<()> {
        self.principals.check_remove(principal)
    }

    pub async fn principal_updated(&self, update: &PrincipalUpdate) -> AppResult<SyncOutcome> {
        self.settle("principal_identity", self.principals.on_updated(update))
            .await
    }

    /// 主体删除：先删除授权记录，再级联删除规则
    pub async fn principal_removed(&self, principal: &Principal) -> AppResult<SyncOutcome> {
        self.settle("cascade", async {
            let target = MandateTarget {
                kind: principal.kind,
                id: principal.id,
            };
            self.mandates.drop_for_target(&target).await?;

            let identity = self.context.scheme.principal(principal.kind, &principal.code);
            self.cascade.purge_identity(&identity).await
        })
        .await
    }

    // ---- 权限 ----

    pub async fn permission_updated(&self, update: &PermissionUpdate) -> AppResult<SyncOutcome> {
        self.settle("permission_identity", self.permissions.on_updated(update))
            .await
    }

    /// 权限删除的唯一入口：先清理授权数据，再删除规则
    pub async fn remove_permission(&self, permission: &Permission) -> AppResult<SyncOutcome> {
        self.settle("permission_remove", async {
            self.mandates.permission_remove(permission.id).await?;
            self.permissions.on_removed(permission).await
        })
        .await
    }

    // ---- 授权 ----

    pub async fn allot(&self, allotment: &Allotment) -> AppResult<SyncOutcome> {
        self.settle("mandate", self.mandates.allot(allotment)).await
    }

    pub async fn remove_by_target(&self, target: &MandateTarget) -> AppResult<SyncOutcome> {
        self.settle("mandate", self.mandates.remove_by_target(target))
            .await
    }

    pub async fn permissions_for(&self, target: &MandateTarget) -> AppResult<Vec<Permission>> {
        self.mandates.permissions_for(target).await
    }

    // ---- 成员关系 ----

    pub async fn set_membership(
        &self,
        kind: PrincipalKind,
        username: &str,
        before: &[String],
        after: &[String],
    ) -> AppResult<SyncOutcome> {
        self.settle(
            "membership",
            self.memberships.set_membership(kind, username, before, after),
        )
        .await
    }

    pub async fn revoke_membership(
        &self,
        kind: PrincipalKind,
        username: &str,
        code: &str,
    ) -> AppResult<SyncOutcome> {
        self.settle(
            "membership",
            self.memberships.revoke_membership(kind, username, code),
        )
        .await
    }
}

#[async_trait]
impl EventHandler<EntityChange> for ReconciliationEngine {
    type Output = SyncOutcome;

    async fn handle(&self, event: &EntityChange) -> AppResult<SyncOutcome> {
        match event {
            // 新建实体不产生规则
            EntityChange::PrincipalInserted(_) => {
                Ok(SyncOutcome::applied("principal_insert", RuleChanges::default()))
            }
            EntityChange::PermissionInserted(_) => {
                Ok(SyncOutcome::applied("permission_insert", RuleChanges::default()))
            }
            EntityChange::PrincipalUpdated(update) => self.principal_updated(update).await,
            EntityChange::PrincipalRemoved(principal) => self.principal_removed(principal).await,
            EntityChange::PermissionUpdated(update) => self.permission_updated(update).await,
            EntityChange::PermissionRemoved(permission) => {
                self.remove_permission(permission).await
            }
            EntityChange::MembershipReplaced(change) => {
                self.set_membership(change.kind, &change.username, &change.before, &change.after)
                    .await
            }
            EntityChange::MembershipRevoked(revocation) => {
                self.revoke_membership(revocation.kind, &revocation.username, &revocation.code)
                    .await
            }
            EntityChange::MandateAllotted(allotment) => self.allot(allotment).await,
            EntityChange::MandateRemoved(target) => self.remove_by_target(target).await,
        }
    }
}
