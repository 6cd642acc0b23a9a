//! 策略存储中的身份标识
//!
//! 主体身份: `{prefix(kind)}{separator}{code}`
//! 授权主体: `{kind}_{code}`
//! 权限对象: `{menuId}:{type}:{code}`

use std::fmt;
use std::str::FromStr;

use bastion_config::RbacConfig;
use bastion_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 主体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Role,
    Group,
    Department,
}

impl PrincipalKind {
    pub const ALL: [PrincipalKind; 4] = [Self::User, Self::Role, Self::Group, Self::Department];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
            Self::Group => "group",
            Self::Department => "department",
        }
    }

    /// 改名时需要重写的分组规则位置：用户是成员，其余是分组
    pub fn is_member_side(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            "group" => Ok(Self::Group),
            "department" => Ok(Self::Department),
            other => Err(AppError::validation(format!(
                "Unknown principal kind: {}",
                other
            ))),
        }
    }
}

/// 授权主体固定使用的分隔符
pub const MANDATE_SEPARATOR: &str = "_";

/// 身份命名规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityScheme {
    user_prefix: String,
    role_prefix: String,
    group_prefix: String,
    department_prefix: String,
    separator: String,
}

impl IdentityScheme {
    /// 从配置创建，校验主体身份与授权主体格式一致
    pub fn new(config: &RbacConfig) -> AppResult<Self> {
        let scheme = Self {
            user_prefix: config.user_prefix.clone(),
            role_prefix: config.role_prefix.clone(),
            group_prefix: config.group_prefix.clone(),
            department_prefix: config.department_prefix.clone(),
            separator: config.separator.clone(),
        };
        scheme.validate()?;
        Ok(scheme)
    }

    fn validate(&self) -> AppResult<()> {
        if self.separator.is_empty() {
            return Err(AppError::validation("rbac.separator must not be empty"));
        }

        for kind in PrincipalKind::ALL {
            let prefix = self.prefix(kind);
            if prefix.is_empty() {
                return Err(AppError::validation(format!(
                    "rbac prefix for {} must not be empty",
                    kind
                )));
            }
            // 授权写入的主体必须能被改名与级联删除找到
            let probe = "code";
            if self.principal(kind, probe) != Self::mandate_subject(kind, probe) {
                return Err(AppError::validation(format!(
                    "rbac identity for {} ({}{}code) does not match mandate subject ({})",
                    kind,
                    prefix,
                    self.separator,
                    Self::mandate_subject(kind, probe)
                )));
            }
        }

        Ok(())
    }

    pub fn prefix(&self, kind: PrincipalKind) -> &str {
        match kind {
            PrincipalKind::User => &self.user_prefix,
            PrincipalKind::Role => &self.role_prefix,
            PrincipalKind::Group => &self.group_prefix,
            PrincipalKind::Department => &self.department_prefix,
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// 主体在策略存储中的身份
    pub fn principal(&self, kind: PrincipalKind, code: &str) -> String {
        format!("{}{}{}", self.prefix(kind), self.separator, code)
    }

    /// 授权记录写入的主体
    pub fn mandate_subject(kind: PrincipalKind, code: &str) -> String {
        format!("{}{}{}", kind.as_str(), MANDATE_SEPARATOR, code)
    }

    /// 解析主体身份，非主体身份返回 None
    pub fn parse<'a>(&self, identity: &'a str) -> Option<(PrincipalKind, &'a str)> {
        PrincipalKind::ALL.into_iter().find_map(|kind| {
            identity
                .strip_prefix(self.prefix(kind))
                .and_then(|rest| rest.strip_prefix(self.separator.as_str()))
                .filter(|code| !code.is_empty())
                .map(|code| (kind, code))
        })
    }
}

impl Default for IdentityScheme {
    fn default() -> Self {
        let config = RbacConfig::default();
        Self {
            user_prefix: config.user_prefix,
            role_prefix: config.role_prefix,
            group_prefix: config.group_prefix,
            department_prefix: config.department_prefix,
            separator: config.separator,
        }
    }
}

/// 权限对象标识
pub fn permission_object(menu_id: i64, category: &str, code: &str) -> String {
    format!("{}:{}:{}", menu_id, category, code)
}

/// 已解析的权限对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef<'a> {
    pub menu_id: i64,
    pub category: &'a str,
    pub code: &'a str,
}

impl<'a> ObjectRef<'a> {
    pub fn parse(object: &'a str) -> Option<Self> {
        let mut parts = object.splitn(3, ':');
        let menu_id = parts.next()?.parse().ok()?;
        let category = parts.next()?;
        let code = parts.next()?;
        Some(Self {
            menu_id,
            category,
            code,
        })
    }
}
