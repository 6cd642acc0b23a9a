//! 基于 Casbin 的策略存储
//!
//! 规则保存在内存 Enforcer 中；配置了规则仓储时先写仓储再写内存，启动时从仓储加载。
//! 所有写入失败都视为 DesyncRisk。

use std::sync::Arc;

use async_trait::async_trait;
use bastion_errors::{AppError, AppResult};
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::model::load_model;
use crate::domain::policy::{GroupingField, GroupingRule, PolicyField, PolicyRule, PolicyStore};

/// 规则持久化接口 (casbin_rule 表)
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn load(&self) -> AppResult<(Vec<PolicyRule>, Vec<GroupingRule>)>;

    async fn insert_policy(&self, rule: &PolicyRule) -> AppResult<()>;

    async fn delete_policy(&self, rule: &PolicyRule) -> AppResult<()>;

    async fn insert_grouping(&self, rule: &GroupingRule) -> AppResult<()>;

    async fn delete_grouping(&self, rule: &GroupingRule) -> AppResult<()>;
}

fn desync(e: casbin::Error) -> AppError {
    AppError::desync_risk(format!("casbin: {}", e))
}

fn persist_failed(e: AppError) -> AppError {
    AppError::desync_risk(format!("rule table: {}", e))
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub struct CasbinPolicyStore {
    enforcer: RwLock<Enforcer>,
    rules: Option<Arc<dyn RuleRepository>>,
}

impl CasbinPolicyStore {
    /// 创建纯内存存储
    pub async fn new(model: DefaultModel) -> AppResult<Self> {
        let enforcer = Enforcer::new(model, MemoryAdapter::default())
            .await
            .map_err(|e| AppError::internal(format!("Failed to build enforcer: {}", e)))?;

        Ok(Self {
            enforcer: RwLock::new(enforcer),
            rules: None,
        })
    }

    /// 使用内置模型的纯内存存储
    pub async fn in_memory() -> AppResult<Self> {
        Self::new(load_model(None).await?).await
    }

    /// 创建存储并从规则仓储加载已有规则
    pub async fn with_repository(
        model: DefaultModel,
        rules: Arc<dyn RuleRepository>,
    ) -> AppResult<Self> {
        let store = Self::new(model).await?;
        let (policies, groupings) = rules.load().await?;

        {
            let mut enforcer = store.enforcer.write().await;
            for rule in &policies {
                enforcer
                    .add_policy(rule.to_values())
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to load {}: {}", rule, e)))?;
            }
            for rule in &groupings {
                enforcer
                    .add_grouping_policy(rule.to_values())
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to load {}: {}", rule, e)))?;
            }
        }

        info!(
            policies = policies.len(),
            groupings = groupings.len(),
            "Policy rules loaded"
        );

        Ok(Self {
            enforcer: store.enforcer,
            rules: Some(rules),
        })
    }
}

#[async_trait]
impl PolicyStore for CasbinPolicyStore {
    async fn add_policy(&self, rule: &PolicyRule) -> AppResult<bool> {
        let mut enforcer = self.enforcer.write().await;
        if enforcer.has_policy(rule.to_values()) {
            return Ok(false);
        }
        if let Some(rules) = &self.rules {
            rules.insert_policy(rule).await.map_err(persist_failed)?;
        }
        let added = enforcer.add_policy(rule.to_values()).await.map_err(desync)?;
        debug!(rule = %rule, "Policy added");
        Ok(added)
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> AppResult<bool> {
        let mut enforcer = self.enforcer.write().await;
        if !enforcer.has_policy(rule.to_values()) {
            return Ok(false);
        }
        if let Some(rules) = &self.rules {
            rules.delete_policy(rule).await.map_err(persist_failed)?;
        }
        let removed = enforcer
            .remove_policy(rule.to_values())
            .await
            .map_err(desync)?;
        debug!(rule = %rule, "Policy removed");
        Ok(removed)
    }

    async fn update_policy(&self, old: &PolicyRule, new: &PolicyRule) -> AppResult<bool> {
        if old == new {
            return self.has_policy(old).await;
        }

        let mut enforcer = self.enforcer.write().await;
        if !enforcer.has_policy(old.to_values()) {
            return Ok(false);
        }
        let new_exists = enforcer.has_policy(new.to_values());

        if let Some(rules) = &self.rules {
            rules.delete_policy(old).await.map_err(persist_failed)?;
            if !new_exists {
                rules.insert_policy(new).await.map_err(persist_failed)?;
            }
        }

        enforcer.remove_policy(old.to_values()).await.map_err(desync)?;
        if !new_exists {
            enforcer.add_policy(new.to_values()).await.map_err(desync)?;
        }
        debug!(old = %old, new = %new, "Policy updated");
        Ok(true)
    }

    async fn has_policy(&self, rule: &PolicyRule) -> AppResult<bool> {
        Ok(self.enforcer.read().await.has_policy(rule.to_values()))
    }

    async fn filtered_policies(
        &self,
        field: PolicyField,
        values: &[&str],
    ) -> AppResult<Vec<PolicyRule>> {
        let enforcer = self.enforcer.read().await;
        let rows = if values.is_empty() {
            enforcer.get_policy()
        } else {
            enforcer.get_filtered_policy(field.index(), owned(values))
        };
        rows.iter().map(|row| PolicyRule::from_values(row)).collect()
    }

    async fn add_grouping(&self, rule: &GroupingRule) -> AppResult<bool> {
        let mut enforcer = self.enforcer.write().await;
        if enforcer.has_grouping_policy(rule.to_values()) {
            return Ok(false);
        }
        if let Some(rules) = &self.rules {
            rules.insert_grouping(rule).await.map_err(persist_failed)?;
        }
        let added = enforcer
            .add_grouping_policy(rule.to_values())
            .await
            .map_err(desync)?;
        debug!(rule = %rule, "Grouping added");
        Ok(added)
    }

    async fn remove_grouping(&self, rule: &GroupingRule) -> AppResult<bool> {
        let mut enforcer = self.enforcer.write().await;
        if !enforcer.has_grouping_policy(rule.to_values()) {
            return Ok(false);
        }
        if let Some(rules) = &self.rules {
            rules.delete_grouping(rule).await.map_err(persist_failed)?;
        }
        let removed = enforcer
            .remove_grouping_policy(rule.to_values())
            .await
            .map_err(desync)?;
        debug!(rule = %rule, "Grouping removed");
        Ok(removed)
    }

    async fn update_grouping(&self, old: &GroupingRule, new: &GroupingRule) -> AppResult<bool> {
        if old == new {
            return self.has_grouping(old).await;
        }

        let mut enforcer = self.enforcer.write().await;
        if !enforcer.has_grouping_policy(old.to_values()) {
            return Ok(false);
        }
        let new_exists = enforcer.has_grouping_policy(new.to_values());

        if let Some(rules) = &self.rules {
            rules.delete_grouping(old).await.map_err(persist_failed)?;
            if !new_exists {
                rules.insert_grouping(new).await.map_err(persist_failed)?;
            }
        }

        enforcer
            .remove_grouping_policy(old.to_values())
            .await
            .map_err(desync)?;
        if !new_exists {
            enforcer
                .add_grouping_policy(new.to_values())
                .await
                .map_err(desync)?;
        }
        debug!(old = %old, new = %new, "Grouping updated");
        Ok(true)
    }

    async fn has_grouping(&self, rule: &GroupingRule) -> AppResult<bool> {
        Ok(self
            .enforcer
            .read()
            .await
            .has_grouping_policy(rule.to_values()))
    }

    async fn filtered_groupings(
        &self,
        field: GroupingField,
        values: &[&str],
    ) -> AppResult<Vec<GroupingRule>> {
        let enforcer = self.enforcer.read().await;
        let rows = if values.is_empty() {
            enforcer.get_grouping_policy()
        } else {
            enforcer.get_filtered_grouping_policy(field.index(), owned(values))
        };
        rows.iter().map(|row| GroupingRule::from_values(row)).collect()
    }

    async fn enforce(&self, subject: &str, object: &str, action: &str) -> AppResult<bool> {
        self.enforcer
            .read()
            .await
            .enforce((subject, object, action))
            .map_err(desync)
    }
}
