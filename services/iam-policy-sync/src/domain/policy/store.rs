//! 策略存储接口
//!
//! 两类规则：策略规则 "p" (subject, object, effect) 与分组规则 "g" (member, group)。
//! 单条规则操作，没有多行事务。

use async_trait::async_trait;
use bastion_errors::AppResult;

use super::rule::{GroupingField, GroupingRule, PolicyField, PolicyRule};

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// 添加策略规则，已存在时返回 false
    async fn add_policy(&self, rule: &PolicyRule) -> AppResult<bool>;

    /// 删除策略规则，不存在时返回 false
    async fn remove_policy(&self, rule: &PolicyRule) -> AppResult<bool>;

    /// 原地改写策略规则
    async fn update_policy(&self, old: &PolicyRule, new: &PolicyRule) -> AppResult<bool>;

    async fn has_policy(&self, rule: &PolicyRule) -> AppResult<bool>;

    /// 从 `field` 开始逐位匹配 `values`，空字符串为通配
    async fn filtered_policies(
        &self,
        field: PolicyField,
        values: &[&str],
    ) -> AppResult<Vec<PolicyRule>>;

    async fn add_grouping(&self, rule: &GroupingRule) -> AppResult<bool>;

    async fn remove_grouping(&self, rule: &GroupingRule) -> AppResult<bool>;

    async fn update_grouping(&self, old: &GroupingRule, new: &GroupingRule) -> AppResult<bool>;

    async fn has_grouping(&self, rule: &GroupingRule) -> AppResult<bool>;

    async fn filtered_groupings(
        &self,
        field: GroupingField,
        values: &[&str],
    ) -> AppResult<Vec<GroupingRule>>;

    /// 判定 subject 能否以 action 访问 object
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> AppResult<bool>;
}
