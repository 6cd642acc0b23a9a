//! Casbin 模型

use bastion_errors::{AppError, AppResult};
use casbin::DefaultModel;

/// 内置模型：拒绝优先，动作固定为 allow
pub const MODEL_CONF: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, eft

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow)) && !some(where (p.eft == deny))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == "allow"
"#;

/// 加载模型，未指定路径时使用内置模型
pub async fn load_model(path: Option<&str>) -> AppResult<DefaultModel> {
    match path {
        Some(path) => DefaultModel::from_file(path)
            .await
            .map_err(|e| AppError::internal(format!("Failed to load casbin model {}: {}", path, e))),
        None => DefaultModel::from_str(MODEL_CONF)
            .await
            .map_err(|e| AppError::internal(format!("Invalid casbin model: {}", e))),
    }
}
