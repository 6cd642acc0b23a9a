//! 对账结果

use std::ops::AddAssign;

use serde::Serialize;

/// 一次对账写入的规则数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleChanges {
    pub added: usize,
    pub removed: usize,
    pub rewritten: usize,
}

impl RuleChanges {
    pub fn added(count: usize) -> Self {
        Self {
            added: count,
            ..Self::default()
        }
    }

    pub fn removed(count: usize) -> Self {
        Self {
            removed: count,
            ..Self::default()
        }
    }

    pub fn rewritten(count: usize) -> Self {
        Self {
            rewritten: count,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.rewritten
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for RuleChanges {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.removed += rhs.removed;
        self.rewritten += rhs.rewritten;
    }
}

/// 实体已提交但策略存储未能同步
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncWarning {
    pub procedure: &'static str,
    pub message: String,
}

/// 对账结果：已应用的变更以及非致命警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub procedure: &'static str,
    pub changes: RuleChanges,
    pub warnings: Vec<SyncWarning>,
}

impl SyncOutcome {
    pub fn applied(procedure: &'static str, changes: RuleChanges) -> Self {
        Self {
            procedure,
            changes,
            warnings: Vec::new(),
        }
    }

    pub fn warned(procedure: &'static str, message: impl Into<String>) -> Self {
        Self {
            procedure,
            changes: RuleChanges::default(),
            warnings: vec![SyncWarning {
                procedure,
                message: message.into(),
            }],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
