//! PostgreSQL 策略规则表 (casbin_rule)
//!
//! ptype = 'p' 时 v0/v1/v2 为 subject/object/effect；ptype = 'g' 时 v0/v1 为 member/group，v2 为空。

use async_trait::async_trait;
use bastion_errors::AppResult;
use sqlx::PgPool;
use tracing::warn;

use super::error_mapper::map_sqlx_error;
use crate::domain::policy::{GroupingRule, PolicyRule};
use crate::infrastructure::casbin::RuleRepository;

const POLICY: &str = "p";
const GROUPING: &str = "g";

pub struct PostgresRuleRepository {
    pool: PgPool,
}

impl PostgresRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, ptype: &str, v0: &str, v1: &str, v2: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO casbin_rule (ptype, v0, v1, v2) VALUES ($1, $2, $3, $4)")
            .bind(ptype)
            .bind(v0)
            .bind(v1)
            .bind(v2)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete(&self, ptype: &str, v0: &str, v1: &str, v2: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM casbin_rule WHERE ptype = $1 AND v0 = $2 AND v1 = $3 AND v2 = $4")
            .bind(ptype)
            .bind(v0)
            .bind(v1)
            .bind(v2)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn load(&self) -> AppResult<(Vec<PolicyRule>, Vec<GroupingRule>)> {
        let rows = sqlx::query_as::<_, CasbinRuleRow>(
            "SELECT id, ptype, v0, v1, v2 FROM casbin_rule ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut policies = Vec::new();
        let mut groupings = Vec::new();
        for row in rows {
            match row.ptype.as_str() {
                POLICY => match row.v2.parse() {
                    Ok(effect) => policies.push(PolicyRule::new(row.v0, row.v1, effect)),
                    Err(e) => warn!(id = row.id, error = %e, "Skipping malformed policy rule"),
                },
                GROUPING => groupings.push(GroupingRule::new(row.v0, row.v1)),
                other => warn!(id = row.id, ptype = %other, "Skipping unknown rule type"),
            }
        }

        Ok((policies, groupings))
    }

    async fn insert_policy(&self, rule: &PolicyRule) -> AppResult<()> {
        self.insert(POLICY, &rule.subject, &rule.object, rule.effect.as_str())
            .await
    }

    async fn delete_policy(&self, rule: &PolicyRule) -> AppResult<()> {
        self.delete(POLICY, &rule.subject, &rule.object, rule.effect.as_str())
            .await
    }

    async fn insert_grouping(&self, rule: &GroupingRule) -> AppResult<()> {
        self.insert(GROUPING, &rule.member, &rule.group, "").await
    }

    async fn delete_grouping(&self, rule: &GroupingRule) -> AppResult<()> {
        self.delete(GROUPING, &rule.member, &rule.group, "").await
    }
}

#[derive(sqlx::FromRow)]
struct CasbinRuleRow {
    id: i64,
    ptype: String,
    v0: String,
    v1: String,
    v2: String,
}
