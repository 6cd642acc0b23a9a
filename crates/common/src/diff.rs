//! 集合差异计算
//!
//! 对账逻辑统一基于完整的 before/after 快照计算差异，结果按元素排序，重放结果一致。

use std::collections::BTreeSet;

/// 两个集合之间的差异
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    /// 仅存在于 before 中的元素
    pub removed: Vec<T>,
    /// 仅存在于 after 中的元素
    pub added: Vec<T>,
    /// 两侧都存在的元素
    pub retained: Vec<T>,
}

impl<T: Ord + Clone> SetDiff<T> {
    /// 计算 before -> after 的差异 (重复元素按一个计算)
    pub fn between<B, A>(before: B, after: A) -> Self
    where
        B: IntoIterator<Item = T>,
        A: IntoIterator<Item = T>,
    {
        let before: BTreeSet<T> = before.into_iter().collect();
        let after: BTreeSet<T> = after.into_iter().collect();

        Self {
            removed: before.difference(&after).cloned().collect(),
            added: after.difference(&before).cloned().collect(),
            retained: before.intersection(&after).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between() {
        let diff = SetDiff::between(vec![10, 11], vec![11, 12]);
        assert_eq!(diff.removed, vec![10]);
        assert_eq!(diff.added, vec![12]);
        assert_eq!(diff.retained, vec![11]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_duplicates_and_identity() {
        let diff = SetDiff::between(vec!["a", "a", "b"], vec!["b", "a"]);
        assert!(diff.is_empty());
        assert_eq!(diff.retained, vec!["a", "b"]);
    }

    #[test]
    fn test_from_empty() {
        let diff: SetDiff<u64> = SetDiff::between(Vec::new(), vec![3, 1]);
        assert_eq!(diff.added, vec![1, 3]);
        assert!(diff.removed.is_empty());
    }
}
