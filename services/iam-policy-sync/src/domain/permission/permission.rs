//! 权限实体

use std::collections::BTreeSet;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::domain::identity::permission_object;
use crate::domain::principal::Status;

/// 权限 ID
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct PermissionId(pub i64);

/// 权限快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub menu_id: i64,
    /// 权限分类，例如 MENU / ACTION
    #[serde(rename = "type")]
    pub category: String,
    pub code: String,
    pub status: Status,
}

impl Permission {
    pub fn new(id: i64, menu_id: i64, category: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: PermissionId(id),
            menu_id,
            category: category.into(),
            code: code.into(),
            status: Status::Enabled,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// 策略对象标识
    pub fn object(&self) -> String {
        permission_object(self.menu_id, &self.category, &self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionField {
    MenuId,
    #[serde(rename = "type")]
    Category,
    Code,
    Status,
}

/// 权限更新 (before, after, changedFields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionUpdate {
    pub before: Permission,
    pub after: Permission,
    pub changed: BTreeSet<PermissionField>,
}

impl PermissionUpdate {
    pub fn new(
        before: Permission,
        after: Permission,
        changed: impl IntoIterator<Item = PermissionField>,
    ) -> Self {
        Self {
            before,
            after,
            changed: changed.into_iter().collect(),
        }
    }

    pub fn detect(before: Permission, after: Permission) -> Self {
        let mut changed = BTreeSet::new();
        if before.menu_id != after.menu_id {
            changed.insert(PermissionField::MenuId);
        }
        if before.category != after.category {
            changed.insert(PermissionField::Category);
        }
        if before.code != after.code {
            changed.insert(PermissionField::Code);
        }
        if before.status != after.status {
            changed.insert(PermissionField::Status);
        }
        Self {
            before,
            after,
            changed,
        }
    }

    fn touched(&self, field: PermissionField) -> bool {
        self.changed.contains(&field)
    }

    pub fn category_changed(&self) -> bool {
        self.touched(PermissionField::Category) && self.before.category != self.after.category
    }

    pub fn status_changed(&self) -> bool {
        self.touched(PermissionField::Status) && self.before.status != self.after.status
    }

    /// 分类、编码或菜单任一变化都会改变对象标识
    pub fn object_changed(&self) -> bool {
        let listed = self.touched(PermissionField::Category)
            || self.touched(PermissionField::Code)
            || self.touched(PermissionField::MenuId);
        listed && self.before.object() != self.after.object()
    }
}
