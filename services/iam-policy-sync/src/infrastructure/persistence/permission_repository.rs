//! PostgreSQL 权限仓储实现

use async_trait::async_trait;
use bastion_errors::AppResult;
use sqlx::PgPool;

use super::db_metrics::QueryTimer;
use super::error_mapper::map_sqlx_error;
use crate::domain::permission::{Permission, PermissionId, PermissionRepository};

pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn find_by_id(&self, id: PermissionId) -> AppResult<Option<Permission>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, menu_id, type, code, status FROM permissions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn find_by_ids(&self, ids: &[PermissionId]) -> AppResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let timer = QueryTimer::new("permissions", "find_by_ids");
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, menu_id, type, code, status FROM permissions WHERE id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        timer.finish();

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    id: i64,
    menu_id: i64,
    #[sqlx(rename = "type")]
    category: String,
    code: String,
    status: bool,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId(row.id),
            menu_id: row.menu_id,
            category: row.category,
            code: row.code,
            status: row.status.into(),
        }
    }
}
