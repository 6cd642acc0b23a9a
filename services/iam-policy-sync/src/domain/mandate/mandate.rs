//! 授权记录
//!
//! 一个主体 (targetType, targetId) 至多一条记录。授权以 (分类, 权限 ID) 集合保存，
//! `permission_ids` 与 `resources` 两种视图都由它推导。

use std::collections::BTreeSet;
use std::fmt;

use bastion_common::AuditInfo;
use bastion_errors::{AppError, AppResult};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::domain::identity::PrincipalKind;
use crate::domain::permission::PermissionId;
use crate::domain::principal::PrincipalId;

/// 授权记录 ID
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct MandateId(pub i64);

/// 授权目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MandateTarget {
    #[serde(rename = "target_type")]
    pub kind: PrincipalKind,
    #[serde(rename = "target_id")]
    pub id: PrincipalId,
}

impl MandateTarget {
    pub fn new(kind: PrincipalKind, id: i64) -> Self {
        Self {
            kind,
            id: PrincipalId(id),
        }
    }
}

impl fmt::Display for MandateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// 单条授权
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grant {
    pub category: String,
    pub permission_id: PermissionId,
}

impl Grant {
    pub fn new(category: impl Into<String>, permission_id: PermissionId) -> Self {
        Self {
            category: category.into(),
            permission_id,
        }
    }
}

/// 按分类分组的资源桶
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBucket {
    #[serde(rename = "type")]
    pub category: String,
    pub actions: Vec<PermissionId>,
}

impl ResourceBucket {
    pub fn new(category: impl Into<String>, actions: impl IntoIterator<Item = i64>) -> Self {
        Self {
            category: category.into(),
            actions: actions.into_iter().map(PermissionId).collect(),
        }
    }
}

/// 资源桶展开后的权限 ID 集合
pub fn flatten(resources: &[ResourceBucket]) -> BTreeSet<PermissionId> {
    resources
        .iter()
        .flat_map(|bucket| bucket.actions.iter().copied())
        .collect()
}

/// 授权请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allotment {
    #[serde(flatten)]
    pub target: MandateTarget,
    /// 调用方给出的权限 ID 列表，必须与 resources 展开结果一致
    #[serde(default)]
    pub permission_ids: Option<Vec<PermissionId>>,
    #[serde(default)]
    pub resources: Vec<ResourceBucket>,
}

impl Allotment {
    pub fn new(target: MandateTarget, resources: Vec<ResourceBucket>) -> Self {
        Self {
            target,
            permission_ids: None,
            resources,
        }
    }

    pub fn with_permission_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.permission_ids = Some(ids.into_iter().map(PermissionId).collect());
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        let Some(declared) = &self.permission_ids else {
            return Ok(());
        };
        let declared: BTreeSet<PermissionId> = declared.iter().copied().collect();
        let derived = flatten(&self.resources);
        if declared != derived {
            return Err(AppError::validation(format!(
                "permission_ids {:?} do not match resources {:?} for {}",
                declared, derived, self.target
            )));
        }
        Ok(())
    }
}

/// 授权记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mandate {
    pub id: Option<MandateId>,
    pub target: MandateTarget,
    grants: BTreeSet<Grant>,
    pub audit_info: AuditInfo,
}

impl Mandate {
    pub fn new(target: MandateTarget) -> Self {
        Self {
            id: None,
            target,
            grants: BTreeSet::new(),
            audit_info: AuditInfo::default(),
        }
    }

    /// 从存储恢复
    pub fn restore(
        id: MandateId,
        target: MandateTarget,
        resources: &[ResourceBucket],
        audit_info: AuditInfo,
    ) -> Self {
        let mut mandate = Self::new(target);
        mandate.id = Some(id);
        mandate.grants = Self::grants_of(resources);
        mandate.audit_info = audit_info;
        mandate
    }

    fn grants_of(resources: &[ResourceBucket]) -> BTreeSet<Grant> {
        resources
            .iter()
            .flat_map(|bucket| {
                bucket
                    .actions
                    .iter()
                    .map(move |id| Grant::new(bucket.category.clone(), *id))
            })
            .collect()
    }

    pub fn grants(&self) -> &BTreeSet<Grant> {
        &self.grants
    }

    /// 整体替换资源
    pub fn replace_resources(&mut self, resources: &[ResourceBucket]) {
        self.grants = Self::grants_of(resources);
        self.audit_info.touch();
    }

    pub fn permission_ids(&self) -> BTreeSet<PermissionId> {
        self.grants.iter().map(|g| g.permission_id).collect()
    }

    /// 按分类分组的资源视图 (分类按字典序，空桶不出现)
    pub fn resources(&self) -> Vec<ResourceBucket> {
        let mut buckets: Vec<ResourceBucket> = Vec::new();
        for grant in &self.grants {
            match buckets.last_mut() {
                Some(bucket) if bucket.category == grant.category => {
                    bucket.actions.push(grant.permission_id)
                }
                _ => buckets.push(ResourceBucket {
                    category: grant.category.clone(),
                    actions: vec![grant.permission_id],
                }),
            }
        }
        buckets
    }

    pub fn contains(&self, permission_id: PermissionId) -> bool {
        self.grants.iter().any(|g| g.permission_id == permission_id)
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// 把权限从旧分类移动到新分类；记录不含该权限时返回 false
    pub fn reclassify(&mut self, permission_id: PermissionId, from: &str, to: &str) -> bool {
        if !self.contains(permission_id) {
            return false;
        }
        self.grants.remove(&Grant::new(from, permission_id));
        self.grants.insert(Grant::new(to, permission_id));
        self.audit_info.touch();
        true
    }

    /// 移除某个权限的全部授权
    pub fn strip_permission(&mut self, permission_id: PermissionId) -> bool {
        let before = self.grants.len();
        self.grants.retain(|g| g.permission_id != permission_id);
        let stripped = self.grants.len() != before;
        if stripped {
            self.audit_info.touch();
        }
        stripped
    }
}
