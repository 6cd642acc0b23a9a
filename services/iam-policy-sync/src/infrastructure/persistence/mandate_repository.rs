//! PostgreSQL 授权仓储实现
//!
//! resources 列为权威数据，permission_ids 列随之写入以支持按权限查询。

use async_trait::async_trait;
use bastion_common::AuditInfo;
use bastion_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use super::db_metrics::QueryTimer;
use super::error_mapper::map_sqlx_error;
use crate::domain::identity::PrincipalKind;
use crate::domain::mandate::{Mandate, MandateId, MandateRepository, MandateTarget, ResourceBucket};
use crate::domain::permission::PermissionId;
use crate::domain::principal::PrincipalId;

const SELECT_MANDATE: &str = r#"
    SELECT id, target_type, target_id, resources, created_time, updated_time
    FROM mandates
"#;

pub struct PostgresMandateRepository {
    pool: PgPool,
}

impl PostgresMandateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MandateRepository for PostgresMandateRepository {
    async fn find_by_target(&self, target: &MandateTarget) -> AppResult<Option<Mandate>> {
        let timer = QueryTimer::new("mandates", "find_by_target");
        let row = sqlx::query_as::<_, MandateRow>(&format!(
            "{} WHERE target_type = $1 AND target_id = $2",
            SELECT_MANDATE
        ))
        .bind(target.kind.as_str())
        .bind(target.id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        timer.finish();

        row.map(MandateRow::into_mandate).transpose()
    }

    async fn find_by_permission(&self, permission_id: PermissionId) -> AppResult<Vec<Mandate>> {
        let timer = QueryTimer::new("mandates", "find_by_permission");
        let rows = sqlx::query_as::<_, MandateRow>(&format!(
            "{} WHERE $1 = ANY(permission_ids) ORDER BY id",
            SELECT_MANDATE
        ))
        .bind(permission_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        timer.finish();

        rows.into_iter().map(MandateRow::into_mandate).collect()
    }

    async fn list_all(&self) -> AppResult<Vec<Mandate>> {
        let rows = sqlx::query_as::<_, MandateRow>(&format!("{} ORDER BY id", SELECT_MANDATE))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(MandateRow::into_mandate).collect()
    }

    async fn save(&self, mandate: &Mandate) -> AppResult<Mandate> {
        let timer = QueryTimer::new("mandates", "save");
        let permission_ids: Vec<i64> = mandate.permission_ids().iter().map(|id| id.0).collect();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO mandates (target_type, target_id, permission_ids, resources, created_time, updated_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (target_type, target_id)
            DO UPDATE SET permission_ids = EXCLUDED.permission_ids,
                          resources = EXCLUDED.resources,
                          updated_time = EXCLUDED.updated_time
            RETURNING id
            "#,
        )
        .bind(mandate.target.kind.as_str())
        .bind(mandate.target.id.0)
        .bind(&permission_ids)
        .bind(Json(mandate.resources()))
        .bind(mandate.audit_info.created_at)
        .bind(mandate.audit_info.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        timer.finish();

        let mut saved = mandate.clone();
        saved.id = Some(MandateId(id));
        Ok(saved)
    }

    async fn delete(&self, target: &MandateTarget) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM mandates WHERE target_type = $1 AND target_id = $2")
            .bind(target.kind.as_str())
            .bind(target.id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct MandateRow {
    id: i64,
    target_type: String,
    target_id: i64,
    resources: Json<Vec<ResourceBucket>>,
    created_time: DateTime<Utc>,
    updated_time: DateTime<Utc>,
}

impl MandateRow {
    fn into_mandate(self) -> AppResult<Mandate> {
        let kind: PrincipalKind = self.target_type.parse().map_err(|_| {
            AppError::database(format!(
                "mandate {} has invalid target_type {}",
                self.id, self.target_type
            ))
        })?;

        Ok(Mandate::restore(
            MandateId(self.id),
            MandateTarget {
                kind,
                id: PrincipalId(self.target_id),
            },
            &self.resources.0,
            AuditInfo::restore(self.created_time, self.updated_time),
        ))
    }
}
