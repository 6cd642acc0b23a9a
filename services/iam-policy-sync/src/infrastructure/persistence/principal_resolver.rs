//! PostgreSQL 主体解析器

use std::sync::Arc;

use async_trait::async_trait;
use bastion_errors::AppResult;
use sqlx::PgPool;

use super::error_mapper::map_sqlx_error;
use crate::domain::identity::PrincipalKind;
use crate::domain::principal::{CodeResolver, Principal, PrincipalDirectory, PrincipalId};

/// 每类主体对应的表与编码列
fn source(kind: PrincipalKind) -> (&'static str, &'static str) {
    match kind {
        PrincipalKind::User => ("users", "username"),
        PrincipalKind::Role => ("roles", "code"),
        PrincipalKind::Group => ("user_groups", "code"),
        PrincipalKind::Department => ("departments", "code"),
    }
}

pub struct PostgresPrincipalResolver {
    pool: PgPool,
    kind: PrincipalKind,
    query: String,
}

impl PostgresPrincipalResolver {
    pub fn new(pool: PgPool, kind: PrincipalKind) -> Self {
        let (table, code_column) = source(kind);
        let query = format!(
            "SELECT id, {} AS code, status, is_system FROM {} WHERE id = $1",
            code_column, table
        );
        Self { pool, kind, query }
    }

    /// 四类主体的解析表
    pub fn directory(pool: &PgPool) -> PrincipalDirectory {
        let resolver =
            |kind| -> Arc<dyn CodeResolver> { Arc::new(Self::new(pool.clone(), kind)) };
        PrincipalDirectory::new(
            resolver(PrincipalKind::User),
            resolver(PrincipalKind::Role),
            resolver(PrincipalKind::Group),
            resolver(PrincipalKind::Department),
        )
    }
}

#[async_trait]
impl CodeResolver for PostgresPrincipalResolver {
    async fn resolve(&self, id: PrincipalId) -> AppResult<Option<Principal>> {
        let row = sqlx::query_as::<_, PrincipalRow>(&self.query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|r| Principal {
            kind: self.kind,
            id: PrincipalId(r.id),
            code: r.code,
            status: r.status.into(),
            is_system: r.is_system,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: i64,
    code: String,
    status: bool,
    is_system: bool,
}
