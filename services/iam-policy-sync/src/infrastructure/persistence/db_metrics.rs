//! 查询计时

use std::time::Instant;

use metrics::{counter, histogram};

/// 慢查询阈值
const SLOW_QUERY_MS: u128 = 100;

/// 查询计时守卫
pub struct QueryTimer {
    start: Instant,
    table: &'static str,
    operation: &'static str,
}

impl QueryTimer {
    pub fn new(table: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            table,
            operation,
        }
    }

    pub fn finish(self) {
        let duration_ms = self.start.elapsed().as_millis();
        histogram!(
            "db_query_duration_ms",
            "table" => self.table,
            "operation" => self.operation
        )
        .record(duration_ms as f64);
        counter!("db_queries_total", "table" => self.table, "operation" => self.operation)
            .increment(1);

        if duration_ms > SLOW_QUERY_MS {
            tracing::warn!(
                table = self.table,
                operation = self.operation,
                duration_ms = %duration_ms,
                "Slow query detected"
            );
        }
    }
}
