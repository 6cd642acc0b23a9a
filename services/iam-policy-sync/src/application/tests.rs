//! 对账流程测试：内存仓储 + 真实的内存 Casbin 存储

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bastion_adapter_redis::PubSubMessage;
use bastion_errors::{AppError, AppResult};
use bastion_event_core::{EventEnvelope, EventHandler, EventMetadata};

use super::*;
use crate::domain::events::EntityChange;
use crate::domain::identity::{IdentityScheme, PrincipalKind};
use crate::domain::mandate::{
    Allotment, Mandate, MandateRepository, MandateTarget, ResourceBucket,
};
use crate::domain::permission::{Permission, PermissionId, PermissionUpdate};
use crate::domain::policy::{
    Effect, GroupingField, GroupingRule, PolicyField, PolicyRule, PolicyStore,
};
use crate::domain::principal::{Principal, PrincipalDirectory, PrincipalUpdate, Status};
use crate::infrastructure::EntityChangeConsumer;
use crate::infrastructure::casbin::CasbinPolicyStore;
use crate::infrastructure::memory::{
    InMemoryMandateRepository, InMemoryPermissionRepository, InMemoryPrincipalResolver,
};

// ---- 测试夹具 ----

fn allow(subject: &str, object: &str) -> PolicyRule {
    PolicyRule::new(subject, object, Effect::Allow)
}

fn deny(subject: &str, object: &str) -> PolicyRule {
    PolicyRule::new(subject, object, Effect::Deny)
}

fn codes(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// 10: 1:ACTION:edit, 11: 1:ACTION:delete, 12: 2:MENU:show, 13: 3:MENU:show
fn catalog() -> Vec<Permission> {
    vec![
        Permission::new(10, 1, "ACTION", "edit"),
        Permission::new(11, 1, "ACTION", "delete"),
        Permission::new(12, 2, "MENU", "show"),
        Permission::new(13, 3, "MENU", "show"),
    ]
}

struct Fixture {
    engine: Arc<ReconciliationEngine>,
    context: SyncContext,
    store: Arc<dyn PolicyStore>,
    mandates: Arc<InMemoryMandateRepository>,
    permissions: Arc<InMemoryPermissionRepository>,
    users: Arc<InMemoryPrincipalResolver>,
    roles: Arc<InMemoryPrincipalResolver>,
    departments: Arc<InMemoryPrincipalResolver>,
}

impl Fixture {
    async fn new() -> Self {
        let store = CasbinPolicyStore::in_memory().await.unwrap();
        Self::with_store(Arc::new(store))
    }

    fn with_store(store: Arc<dyn PolicyStore>) -> Self {
        let users = Arc::new(InMemoryPrincipalResolver::new());
        let roles = Arc::new(InMemoryPrincipalResolver::new());
        let groups = Arc::new(InMemoryPrincipalResolver::new());
        let departments = Arc::new(InMemoryPrincipalResolver::new());
        let directory = Arc::new(PrincipalDirectory::new(
            users.clone(),
            roles.clone(),
            groups,
            departments.clone(),
        ));

        let mandates = Arc::new(InMemoryMandateRepository::new());
        let permissions = Arc::new(InMemoryPermissionRepository::new());
        for permission in catalog() {
            permissions.upsert(permission);
        }

        let context = SyncContext {
            store: store.clone(),
            scheme: Arc::new(IdentityScheme::default()),
            directory,
            mandates: mandates.clone(),
            permissions: permissions.clone(),
        };

        Self {
            engine: Arc::new(ReconciliationEngine::new(context.clone())),
            context,
            store,
            mandates,
            permissions,
            users,
            roles,
            departments,
        }
    }

    fn role(&self, id: i64, code: &str) -> Principal {
        let principal = Principal::new(PrincipalKind::Role, id, code);
        self.roles.upsert(principal.clone());
        principal
    }

    fn user(&self, id: i64, username: &str) -> Principal {
        let principal = Principal::new(PrincipalKind::User, id, username);
        self.users.upsert(principal.clone());
        principal
    }

    fn department(&self, id: i64, code: &str, status: Status) -> Principal {
        let principal = Principal::new(PrincipalKind::Department, id, code).with_status(status);
        self.departments.upsert(principal.clone());
        principal
    }

    fn permission(&self, id: i64) -> Permission {
        catalog()
            .into_iter()
            .find(|p| p.id == PermissionId(id))
            .unwrap()
    }

    async fn allot(&self, principal: &Principal, resources: Vec<ResourceBucket>) -> SyncOutcome {
        let target = MandateTarget {
            kind: principal.kind,
            id: principal.id,
        };
        self.engine
            .allot(&Allotment::new(target, resources))
            .await
            .unwrap()
    }

    async fn mandate_of(&self, principal: &Principal) -> Option<Mandate> {
        self.mandates
            .find_by_target(&MandateTarget {
                kind: principal.kind,
                id: principal.id,
            })
            .await
            .unwrap()
    }

    async fn policies_of(&self, subject: &str) -> Vec<PolicyRule> {
        let mut rules = self
            .store
            .filtered_policies(PolicyField::Subject, &[subject])
            .await
            .unwrap();
        rules.sort();
        rules
    }

    async fn all_policies(&self) -> Vec<PolicyRule> {
        let mut rules = self
            .store
            .filtered_policies(PolicyField::Subject, &[])
            .await
            .unwrap();
        rules.sort();
        rules
    }

    async fn all_groupings(&self) -> Vec<GroupingRule> {
        let mut rules = self
            .store
            .filtered_groupings(GroupingField::Member, &[])
            .await
            .unwrap();
        rules.sort();
        rules
    }

    async fn allowed(&self, subject: &str, object: &str) -> bool {
        self.store.enforce(subject, object, "allow").await.unwrap()
    }
}

/// 记录调用次数，可配置为所有写入都失败
struct RecordingStore {
    inner: Arc<dyn PolicyStore>,
    calls: AtomicUsize,
    fail_writes: bool,
}

impl RecordingStore {
    async fn new(fail_writes: bool) -> Self {
        Self {
            inner: Arc::new(CasbinPolicyStore::in_memory().await.unwrap()),
            calls: AtomicUsize::new(0),
            fail_writes,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn read(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(AppError::desync_risk("policy store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for RecordingStore {
    async fn add_policy(&self, rule: &PolicyRule) -> AppResult<bool> {
        self.write()?;
        self.inner.add_policy(rule).await
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> AppResult<bool> {
        self.write()?;
        self.inner.remove_policy(rule).await
    }

    async fn update_policy(&self, old: &PolicyRule, new: &PolicyRule) -> AppResult<bool> {
        self.write()?;
        self.inner.update_policy(old, new).await
    }

    async fn has_policy(&self, rule: &PolicyRule) -> AppResult<bool> {
        self.read();
        self.inner.has_policy(rule).await
    }

    async fn filtered_policies(
        &self,
        field: PolicyField,
        values: &[&str],
    ) -> AppResult<Vec<PolicyRule>> {
        self.read();
        self.inner.filtered_policies(field, values).await
    }

    async fn add_grouping(&self, rule: &GroupingRule) -> AppResult<bool> {
        self.write()?;
        self.inner.add_grouping(rule).await
    }

    async fn remove_grouping(&self, rule: &GroupingRule) -> AppResult<bool> {
        self.write()?;
        self.inner.remove_grouping(rule).await
    }

    async fn update_grouping(&self, old: &GroupingRule, new: &GroupingRule) -> AppResult<bool> {
        self.write()?;
        self.inner.update_grouping(old, new).await
    }

    async fn has_grouping(&self, rule: &GroupingRule) -> AppResult<bool> {
        self.read();
        self.inner.has_grouping(rule).await
    }

    async fn filtered_groupings(
        &self,
        field: GroupingField,
        values: &[&str],
    ) -> AppResult<Vec<GroupingRule>> {
        self.read();
        self.inner.filtered_groupings(field, values).await
    }

    async fn enforce(&self, subject: &str, object: &str, action: &str) -> AppResult<bool> {
        self.read();
        self.inner.enforce(subject, object, action).await
    }
}

// ---- 授权同步 ----

#[tokio::test]
async fn test_allot_applies_minimal_diff() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");

    let first = fx
        .allot(&role, vec![ResourceBucket::new("ACTION", [10, 11])])
        .await;
    assert_eq!(first.changes.added, 2);

    let second = fx
        .allot(
            &role,
            vec![
                ResourceBucket::new("ACTION", [11]),
                ResourceBucket::new("MENU", [12]),
            ],
        )
        .await;

    assert!(second.is_clean());
    assert_eq!(second.changes.removed, 1);
    assert_eq!(second.changes.added, 1);
    assert_eq!(
        fx.policies_of("role_r1").await,
        vec![
            allow("role_r1", "1:ACTION:delete"),
            allow("role_r1", "2:MENU:show"),
        ]
    );

    let mandate = fx.mandate_of(&role).await.unwrap();
    assert_eq!(
        mandate.resources(),
        vec![
            ResourceBucket::new("ACTION", [11]),
            ResourceBucket::new("MENU", [12]),
        ]
    );
}

#[tokio::test]
async fn test_allot_replay_is_idempotent() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    let resources = vec![
        ResourceBucket::new("ACTION", [10]),
        ResourceBucket::new("MENU", [12]),
    ];

    fx.allot(&role, resources.clone()).await;
    let before = fx.all_policies().await;

    let replay = fx.allot(&role, resources).await;
    assert!(replay.changes.is_empty());
    assert_eq!(fx.all_policies().await, before);
    assert_eq!(fx.mandates.len(), 1);
}

#[tokio::test]
async fn test_allot_empty_resources_removes_mandate() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.allot(&role, vec![ResourceBucket::new("ACTION", [10, 11])])
        .await;

    let outcome = fx.allot(&role, vec![]).await;
    assert_eq!(outcome.changes.removed, 2);
    assert!(fx.mandate_of(&role).await.is_none());
    assert!(fx.policies_of("role_r1").await.is_empty());
}

#[tokio::test]
async fn test_allot_to_disabled_principal_adds_deny() {
    let fx = Fixture::new().await;
    let department = fx.department(7, "d1", Status::Disabled);

    fx.allot(&department, vec![ResourceBucket::new("MENU", [12])])
        .await;
    assert_eq!(
        fx.policies_of("department_d1").await,
        vec![deny("department_d1", "2:MENU:show")]
    );
}

#[tokio::test]
async fn test_allot_unknown_principal_touches_nothing() {
    let store = Arc::new(RecordingStore::new(false).await);
    let fx = Fixture::with_store(store.clone());

    let allotment = Allotment::new(
        MandateTarget::new(PrincipalKind::Role, 404),
        vec![ResourceBucket::new("ACTION", [10])],
    );
    let err = fx.engine.allot(&allotment).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(store.calls(), 0);
    assert!(fx.mandates.is_empty());
}

#[tokio::test]
async fn test_allot_unknown_permission_touches_nothing() {
    let store = Arc::new(RecordingStore::new(false).await);
    let fx = Fixture::with_store(store.clone());
    let role = fx.role(5, "r1");

    let allotment = Allotment::new(
        MandateTarget::new(PrincipalKind::Role, 5),
        vec![ResourceBucket::new("ACTION", [10, 999])],
    );
    let err = fx.engine.allot(&allotment).await.unwrap_err();

    match err {
        AppError::NotFound(message) => assert!(message.contains("999")),
        other => panic!("unexpected error: {}", other),
    }
    assert!(fx.mandate_of(&role).await.is_none());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_allot_rejects_mismatched_permission_ids() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");

    let allotment = Allotment::new(
        MandateTarget::new(PrincipalKind::Role, 5),
        vec![ResourceBucket::new("ACTION", [10])],
    )
    .with_permission_ids([10, 11]);
    let err = fx.engine.allot(&allotment).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(fx.mandate_of(&role).await.is_none());
}

#[tokio::test]
async fn test_store_failure_after_commit_is_a_warning() {
    let store = Arc::new(RecordingStore::new(true).await);
    let fx = Fixture::with_store(store);
    let role = fx.role(5, "r1");

    let outcome = fx
        .allot(&role, vec![ResourceBucket::new("ACTION", [10])])
        .await;

    assert!(!outcome.is_clean());
    assert_eq!(outcome.warnings[0].procedure, "mandate");
    // 关系库状态为准，不回滚
    assert!(fx.mandate_of(&role).await.is_some());
}

#[tokio::test]
async fn test_permissions_for_and_remove_by_target() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    let target = MandateTarget::new(PrincipalKind::Role, 5);
    fx.allot(
        &role,
        vec![
            ResourceBucket::new("ACTION", [11]),
            ResourceBucket::new("MENU", [12]),
        ],
    )
    .await;

    let held: Vec<PermissionId> = fx
        .engine
        .permissions_for(&target)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(held, vec![PermissionId(11), PermissionId(12)]);

    let outcome = fx.engine.remove_by_target(&target).await.unwrap();
    assert_eq!(outcome.changes.removed, 2);
    assert!(fx.mandate_of(&role).await.is_none());
    assert!(fx.policies_of("role_r1").await.is_empty());
    assert!(fx.engine.permissions_for(&target).await.unwrap().is_empty());
}

// ---- 主体身份同步 ----

#[tokio::test]
async fn test_role_rename_propagates_without_duplicates() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.user(1, "alice");
    fx.allot(
        &role,
        vec![
            ResourceBucket::new("ACTION", [10]),
            ResourceBucket::new("MENU", [12]),
        ],
    )
    .await;
    fx.engine
        .set_membership(PrincipalKind::Role, "alice", &[], &codes(&["r1"]))
        .await
        .unwrap();
    // 上一次重放已改写过的一条
    fx.store
        .add_policy(&allow("role_r2", "2:MENU:show"))
        .await
        .unwrap();

    let renamed = Principal::new(PrincipalKind::Role, 5, "r2");
    let update = PrincipalUpdate::detect(role, renamed);
    let outcome = fx.engine.principal_updated(&update).await.unwrap();
    assert!(outcome.is_clean());

    assert!(fx.policies_of("role_r1").await.is_empty());
    assert_eq!(
        fx.policies_of("role_r2").await,
        vec![
            allow("role_r2", "1:ACTION:edit"),
            allow("role_r2", "2:MENU:show"),
        ]
    );
    assert_eq!(
        fx.all_groupings().await,
        vec![GroupingRule::new("user_alice", "role_r2")]
    );
    assert!(fx.allowed("user_alice", "2:MENU:show").await);

    let replay = fx.engine.principal_updated(&update).await.unwrap();
    assert!(replay.changes.is_empty());
}

#[tokio::test]
async fn test_user_rename_rewrites_member_side() {
    let fx = Fixture::new().await;
    let user = fx.user(1, "alice");
    fx.role(5, "r1");
    fx.engine
        .set_membership(PrincipalKind::Role, "alice", &[], &codes(&["r1"]))
        .await
        .unwrap();
    fx.allot(&user, vec![ResourceBucket::new("ACTION", [10])])
        .await;

    let update = PrincipalUpdate::detect(user, Principal::new(PrincipalKind::User, 1, "alicia"));
    fx.engine.principal_updated(&update).await.unwrap();

    assert_eq!(
        fx.all_groupings().await,
        vec![GroupingRule::new("user_alicia", "role_r1")]
    );
    assert_eq!(
        fx.policies_of("user_alicia").await,
        vec![allow("user_alicia", "1:ACTION:edit")]
    );
    assert!(fx.policies_of("user_alice").await.is_empty());
}

#[tokio::test]
async fn test_admin_rename_is_vetoed_before_commit() {
    let store = Arc::new(RecordingStore::new(false).await);
    let fx = Fixture::with_store(store.clone());
    let admin = fx.user(1, "admin");

    let update = PrincipalUpdate::detect(admin, Principal::new(PrincipalKind::User, 1, "root"));
    assert!(matches!(
        fx.engine.before_update_principal(&update),
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_committed_admin_rename_still_propagates() {
    let fx = Fixture::new().await;
    let admin = fx.user(1, "admin");
    fx.allot(&admin, vec![ResourceBucket::new("ACTION", [10])])
        .await;

    // 关系库中已是 root
    let renamed = Principal::new(PrincipalKind::User, 1, "root");
    fx.users.upsert(renamed.clone());
    let outcome = fx
        .engine
        .handle(&EntityChange::PrincipalUpdated(PrincipalUpdate::detect(
            admin, renamed,
        )))
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert!(fx.policies_of("user_admin").await.is_empty());
    assert_eq!(
        fx.policies_of("user_root").await,
        vec![allow("user_root", "1:ACTION:edit")]
    );
}

#[tokio::test]
async fn test_status_toggle_flips_only_allow_rows() {
    let fx = Fixture::new().await;
    let department = fx.department(7, "d1", Status::Enabled);
    fx.permissions
        .upsert(fx.permission(11).with_status(Status::Disabled));
    fx.allot(&department, vec![ResourceBucket::new("ACTION", [10, 11])])
        .await;
    assert_eq!(
        fx.policies_of("department_d1").await,
        vec![
            deny("department_d1", "1:ACTION:delete"),
            allow("department_d1", "1:ACTION:edit"),
        ]
    );

    let disabled = department.clone().with_status(Status::Disabled);
    let update = PrincipalUpdate::detect(department, disabled);
    let outcome = fx.engine.principal_updated(&update).await.unwrap();

    assert_eq!(outcome.changes.rewritten, 1);
    assert_eq!(
        fx.policies_of("department_d1").await,
        vec![
            deny("department_d1", "1:ACTION:delete"),
            deny("department_d1", "1:ACTION:edit"),
        ]
    );
}

// ---- 级联删除 ----

#[tokio::test]
async fn test_role_removal_cascades() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.user(1, "alice");
    fx.allot(&role, vec![ResourceBucket::new("MENU", [12])]).await;
    fx.engine
        .set_membership(PrincipalKind::Role, "alice", &[], &codes(&["r1"]))
        .await
        .unwrap();
    assert!(fx.allowed("user_alice", "2:MENU:show").await);

    assert!(fx.engine.before_remove_principal(&role).is_ok());
    fx.roles.remove(role.id);
    let outcome = fx.engine.principal_removed(&role).await.unwrap();

    assert_eq!(outcome.changes.removed, 2);
    assert!(fx.all_policies().await.is_empty());
    assert!(fx.all_groupings().await.is_empty());
    assert!(fx.mandate_of(&role).await.is_none());
    assert!(!fx.allowed("user_alice", "2:MENU:show").await);
}

#[tokio::test]
async fn test_system_principal_cannot_be_removed() {
    let fx = Fixture::new().await;
    let admin = fx.user(1, "admin").system();

    assert!(matches!(
        fx.engine.before_remove_principal(&admin),
        Err(AppError::Forbidden(_))
    ));
}

// ---- 权限同步 ----

#[tokio::test]
async fn test_type_change_moves_buckets_only() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.allot(&role, vec![ResourceBucket::new("ACTION", [10, 11])])
        .await;
    let rules = fx.all_policies().await;

    let sync = MandateSync::new(
        fx.context.mandates.clone(),
        fx.context.permissions.clone(),
        fx.context.directory.clone(),
        fx.context.store.clone(),
    );
    let moved = sync
        .type_change("ACTION", "BUTTON", PermissionId(10))
        .await
        .unwrap();

    assert_eq!(moved, 1);
    assert_eq!(
        fx.mandate_of(&role).await.unwrap().resources(),
        vec![
            ResourceBucket::new("ACTION", [11]),
            ResourceBucket::new("BUTTON", [10]),
        ]
    );
    assert_eq!(fx.all_policies().await, rules);
}

#[tokio::test]
async fn test_permission_type_change_rewrites_object() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.allot(&role, vec![ResourceBucket::new("ACTION", [10])])
        .await;

    let before = fx.permission(10);
    let mut after = before.clone();
    after.category = "BUTTON".to_string();
    fx.permissions.upsert(after.clone());

    let outcome = fx
        .engine
        .permission_updated(&PermissionUpdate::detect(before, after))
        .await
        .unwrap();

    assert_eq!(outcome.changes.rewritten, 1);
    assert_eq!(
        fx.policies_of("role_r1").await,
        vec![allow("role_r1", "1:BUTTON:edit")]
    );
    assert_eq!(
        fx.mandate_of(&role).await.unwrap().resources(),
        vec![ResourceBucket::new("BUTTON", [10])]
    );
}

#[tokio::test]
async fn test_permission_status_and_menu_move() {
    let fx = Fixture::new().await;
    let r1 = fx.role(5, "r1");
    let r2 = fx.role(6, "r2");
    fx.allot(&r1, vec![ResourceBucket::new("MENU", [12])]).await;
    fx.allot(&r2, vec![ResourceBucket::new("MENU", [12])]).await;

    let before = fx.permission(12);
    let mut after = before.clone().with_status(Status::Disabled);
    after.menu_id = 4;
    fx.engine
        .permission_updated(&PermissionUpdate::detect(before, after))
        .await
        .unwrap();

    assert_eq!(
        fx.all_policies().await,
        vec![deny("role_r1", "4:MENU:show"), deny("role_r2", "4:MENU:show")]
    );
}

#[tokio::test]
async fn test_rule_purge_requires_drained_mandates() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.allot(&role, vec![ResourceBucket::new("ACTION", [10])]).await;

    let mandates = Arc::new(MandateSync::new(
        fx.context.mandates.clone(),
        fx.context.permissions.clone(),
        fx.context.directory.clone(),
        fx.context.store.clone(),
    ));
    let sync = PermissionIdentitySync::new(
        fx.context.store.clone(),
        mandates,
        Arc::new(CascadeSync::new(fx.context.store.clone())),
    );

    let err = sync.on_removed(&fx.permission(10)).await.unwrap_err();
    assert!(matches!(err, AppError::FailedPrecondition(_)));
    assert_eq!(
        fx.policies_of("role_r1").await,
        vec![allow("role_r1", "1:ACTION:edit")]
    );
}

#[tokio::test]
async fn test_permission_removal_drains_mandates_first() {
    let fx = Fixture::new().await;
    let r1 = fx.role(5, "r1");
    let r2 = fx.role(6, "r2");
    fx.allot(&r1, vec![ResourceBucket::new("ACTION", [10])]).await;
    fx.allot(&r2, vec![ResourceBucket::new("ACTION", [10, 11])])
        .await;

    let removed = fx.permissions.remove(PermissionId(10)).unwrap();
    let outcome = fx.engine.remove_permission(&removed).await.unwrap();

    assert_eq!(outcome.changes.removed, 2);
    assert!(fx.mandate_of(&r1).await.is_none());
    assert_eq!(
        fx.mandate_of(&r2).await.unwrap().resources(),
        vec![ResourceBucket::new("ACTION", [11])]
    );
    assert_eq!(
        fx.all_policies().await,
        vec![allow("role_r2", "1:ACTION:delete")]
    );
}

// ---- 成员关系 ----

#[tokio::test]
async fn test_membership_replace_and_revoke() {
    let fx = Fixture::new().await;

    let outcome = fx
        .engine
        .set_membership(PrincipalKind::Role, "alice", &[], &codes(&["r1", "r2"]))
        .await
        .unwrap();
    assert_eq!(outcome.changes.added, 2);

    let outcome = fx
        .engine
        .set_membership(
            PrincipalKind::Role,
            "alice",
            &codes(&["r1", "r2"]),
            &codes(&["r2", "r3"]),
        )
        .await
        .unwrap();
    assert_eq!(outcome.changes.removed, 1);
    assert_eq!(outcome.changes.added, 1);
    assert_eq!(
        fx.all_groupings().await,
        vec![
            GroupingRule::new("user_alice", "role_r2"),
            GroupingRule::new("user_alice", "role_r3"),
        ]
    );

    fx.engine
        .revoke_membership(PrincipalKind::Role, "alice", "r2")
        .await
        .unwrap();
    assert_eq!(
        fx.all_groupings().await,
        vec![GroupingRule::new("user_alice", "role_r3")]
    );
}

#[tokio::test]
async fn test_membership_rejects_user_group() {
    let fx = Fixture::new().await;
    let err = fx
        .engine
        .set_membership(PrincipalKind::User, "alice", &[], &codes(&["bob"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

// ---- 菜单与重建 ----

#[tokio::test]
async fn test_menus_respect_inherited_deny() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    let department = fx.department(7, "d1", Status::Disabled);
    fx.allot(&role, vec![ResourceBucket::new("MENU", [12, 13])])
        .await;
    fx.allot(&department, vec![ResourceBucket::new("MENU", [13])])
        .await;
    fx.engine
        .set_membership(PrincipalKind::Role, "alice", &[], &codes(&["r1"]))
        .await
        .unwrap();
    fx.engine
        .set_membership(PrincipalKind::Department, "alice", &[], &codes(&["d1"]))
        .await
        .unwrap();

    let menus = fx.engine.menus();
    assert_eq!(menus.menus_for("alice").await.unwrap(), vec![2]);
    assert!(menus.menus_for("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rebuild_restores_mandate_rules() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");
    fx.user(1, "alice");
    fx.allot(
        &role,
        vec![
            ResourceBucket::new("ACTION", [10]),
            ResourceBucket::new("MENU", [12]),
        ],
    )
    .await;
    fx.engine
        .set_membership(PrincipalKind::Role, "alice", &[], &codes(&["r1"]))
        .await
        .unwrap();

    // 漂移：多一条、少一条、权限状态变化未同步
    fx.store.add_policy(&allow("role_r1", "9:MENU:show")).await.unwrap();
    fx.store
        .remove_policy(&allow("role_r1", "1:ACTION:edit"))
        .await
        .unwrap();
    fx.permissions
        .upsert(fx.permission(12).with_status(Status::Disabled));
    fx.store.add_policy(&allow("anonymous", "0:MENU:show")).await.unwrap();

    // 目标已不存在的授权
    let mut orphan = Mandate::new(MandateTarget::new(PrincipalKind::Role, 99));
    orphan.replace_resources(&[ResourceBucket::new("ACTION", [11])]);
    fx.mandates.save(&orphan).await.unwrap();

    let report = fx.engine.rebuilder().rebuild().await.unwrap();

    assert_eq!(report.mandates, 2);
    assert_eq!(report.orphaned, 1);
    assert_eq!(report.removed, 2);
    assert_eq!(report.added, 2);
    assert_eq!(
        fx.policies_of("role_r1").await,
        vec![
            allow("role_r1", "1:ACTION:edit"),
            deny("role_r1", "2:MENU:show"),
        ]
    );
    assert_eq!(
        fx.policies_of("anonymous").await,
        vec![allow("anonymous", "0:MENU:show")]
    );
    assert_eq!(
        fx.all_groupings().await,
        vec![GroupingRule::new("user_alice", "role_r1")]
    );
}

// ---- 事件入口 ----

#[tokio::test]
async fn test_event_handler_dispatch() {
    let fx = Fixture::new().await;
    let role = fx.role(5, "r1");

    let inserted = fx
        .engine
        .handle(&EntityChange::PrincipalInserted(role.clone()))
        .await
        .unwrap();
    assert!(inserted.changes.is_empty());
    assert!(fx.all_policies().await.is_empty());

    let allotted = fx
        .engine
        .handle(&EntityChange::MandateAllotted(Allotment::new(
            MandateTarget::new(PrincipalKind::Role, 5),
            vec![ResourceBucket::new("MENU", [12])],
        )))
        .await
        .unwrap();
    assert_eq!(allotted.changes.added, 1);

    fx.roles.remove(role.id);
    fx.engine
        .handle(&EntityChange::PrincipalRemoved(role))
        .await
        .unwrap();
    assert!(fx.all_policies().await.is_empty());
}

#[tokio::test]
async fn test_consumer_parses_envelopes() {
    let fx = Fixture::new().await;
    fx.role(5, "r1");
    let consumer = EntityChangeConsumer::new(fx.engine.clone());

    let change = EntityChange::MandateAllotted(Allotment::new(
        MandateTarget::new(PrincipalKind::Role, 5),
        vec![ResourceBucket::new("ACTION", [10])],
    ));
    let payload = EventEnvelope::new(change, EventMetadata::default())
        .to_json()
        .unwrap();

    let outcome = consumer
        .dispatch(&PubSubMessage::new("rbac.entity.changes", payload))
        .await
        .unwrap();
    assert_eq!(outcome.changes.added, 1);
    assert!(fx.allowed("role_r1", "1:ACTION:edit").await);

    let err = consumer
        .dispatch(&PubSubMessage::new("rbac.entity.changes", "{not json"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
