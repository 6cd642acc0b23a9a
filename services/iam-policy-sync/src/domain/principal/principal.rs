//! 主体实体

use std::collections::BTreeSet;

use bastion_errors::{AppError, AppResult};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::domain::identity::PrincipalKind;
use crate::domain::policy::Effect;

/// 主体 ID (永久不变，不出现在策略规则中)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

/// 启用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum Status {
    Enabled,
    Disabled,
}

impl Status {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// 状态对应的规则效果
    pub fn effect(&self) -> Effect {
        Effect::from(self.is_enabled())
    }
}

impl From<bool> for Status {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

impl From<Status> for bool {
    fn from(status: Status) -> Self {
        status.is_enabled()
    }
}

/// 主体快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: PrincipalId,
    /// 外部身份；用户的 code 即用户名
    pub code: String,
    pub status: Status,
    #[serde(default)]
    pub is_system: bool,
}

impl Principal {
    pub fn new(kind: PrincipalKind, id: i64, code: impl Into<String>) -> Self {
        Self {
            kind,
            id: PrincipalId(id),
            code: code.into(),
            status: Status::Enabled,
            is_system: false,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// 更新事件中可能变化的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalField {
    Code,
    Status,
}

/// 主体更新 (before, after, changedFields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalUpdate {
    pub before: Principal,
    pub after: Principal,
    pub changed: BTreeSet<PrincipalField>,
}

impl PrincipalUpdate {
    pub fn new(
        before: Principal,
        after: Principal,
        changed: impl IntoIterator<Item = PrincipalField>,
    ) -> Self {
        Self {
            before,
            after,
            changed: changed.into_iter().collect(),
        }
    }

    /// 比较前后快照得出变化字段
    pub fn detect(before: Principal, after: Principal) -> Self {
        let mut changed = BTreeSet::new();
        if before.code != after.code {
            changed.insert(PrincipalField::Code);
        }
        if before.status != after.status {
            changed.insert(PrincipalField::Status);
        }
        Self {
            before,
            after,
            changed,
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        self.after.kind
    }

    pub fn code_changed(&self) -> bool {
        self.changed.contains(&PrincipalField::Code) && self.before.code != self.after.code
    }

    pub fn status_changed(&self) -> bool {
        self.changed.contains(&PrincipalField::Status) && self.before.status != self.after.status
    }

    /// 前后快照必须是同一主体
    pub fn ensure_consistent(&self) -> AppResult<()> {
        if self.before.kind != self.after.kind || self.before.id != self.after.id {
            return Err(AppError::validation(format!(
                "Update snapshots refer to different principals: {}#{} vs {}#{}",
                self.before.kind, self.before.id, self.after.kind, self.after.id
            )));
        }
        Ok(())
    }
}
