//! 实体变更事件
//!
//! 实体写入提交后发布，由对账引擎消费。

use bastion_event_core::DomainEvent;
use serde::{Deserialize, Serialize};

use super::identity::PrincipalKind;
use super::mandate::{Allotment, MandateTarget};
use super::permission::{Permission, PermissionUpdate};
use super::principal::{Principal, PrincipalUpdate};

/// 用户在某类分组 (角色 / 用户组 / 部门) 中的成员关系整体替换
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipChange {
    pub kind: PrincipalKind,
    pub username: String,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

/// 撤销单个成员关系
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRevocation {
    pub kind: PrincipalKind,
    pub username: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "change", content = "payload", rename_all = "snake_case")]
pub enum EntityChange {
    PrincipalInserted(Principal),
    PrincipalUpdated(PrincipalUpdate),
    PrincipalRemoved(Principal),
    PermissionInserted(Permission),
    PermissionUpdated(PermissionUpdate),
    PermissionRemoved(Permission),
    MembershipReplaced(MembershipChange),
    MembershipRevoked(MembershipRevocation),
    MandateAllotted(Allotment),
    MandateRemoved(MandateTarget),
}

impl DomainEvent for EntityChange {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PrincipalInserted(_) => "PrincipalInserted",
            Self::PrincipalUpdated(_) => "PrincipalUpdated",
            Self::PrincipalRemoved(_) => "PrincipalRemoved",
            Self::PermissionInserted(_) => "PermissionInserted",
            Self::PermissionUpdated(_) => "PermissionUpdated",
            Self::PermissionRemoved(_) => "PermissionRemoved",
            Self::MembershipReplaced(_) => "MembershipReplaced",
            Self::MembershipRevoked(_) => "MembershipRevoked",
            Self::MandateAllotted(_) => "MandateAllotted",
            Self::MandateRemoved(_) => "MandateRemoved",
        }
    }

    fn aggregate_type(&self) -> &'static str {
        match self {
            Self::PrincipalInserted(p) | Self::PrincipalRemoved(p) => p.kind.as_str(),
            Self::PrincipalUpdated(u) => u.after.kind.as_str(),
            Self::PermissionInserted(_)
            | Self::PermissionUpdated(_)
            | Self::PermissionRemoved(_) => "permission",
            Self::MembershipReplaced(_) | Self::MembershipRevoked(_) => "membership",
            Self::MandateAllotted(_) | Self::MandateRemoved(_) => "mandate",
        }
    }

    fn aggregate_id(&self) -> String {
        match self {
            Self::PrincipalInserted(p) | Self::PrincipalRemoved(p) => p.id.to_string(),
            Self::PrincipalUpdated(u) => u.after.id.to_string(),
            Self::PermissionInserted(p) | Self::PermissionRemoved(p) => p.id.to_string(),
            Self::PermissionUpdated(u) => u.after.id.to_string(),
            Self::MembershipReplaced(m) => m.username.clone(),
            Self::MembershipRevoked(m) => m.username.clone(),
            Self::MandateAllotted(a) => a.target.to_string(),
            Self::MandateRemoved(t) => t.to_string(),
        }
    }
}
