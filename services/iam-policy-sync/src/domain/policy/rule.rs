//! 策略规则与分组规则

use std::fmt;
use std::str::FromStr;

use bastion_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 规则效果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl From<bool> for Effect {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Allow } else { Self::Deny }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(AppError::validation(format!("Unknown effect: {}", other))),
        }
    }
}

/// 策略规则字段位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyField {
    Subject = 0,
    Object = 1,
    Effect = 2,
}

impl PolicyField {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 分组规则字段位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingField {
    Member = 0,
    Group = 1,
}

impl GroupingField {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 策略规则 "p"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub effect: Effect,
}

impl PolicyRule {
    pub fn new(subject: impl Into<String>, object: impl Into<String>, effect: Effect) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            effect,
        }
    }

    pub fn with_subject(&self, subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..self.clone()
        }
    }

    pub fn with_object(&self, object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            ..self.clone()
        }
    }

    pub fn with_effect(&self, effect: Effect) -> Self {
        Self {
            effect,
            ..self.clone()
        }
    }

    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.subject.clone(),
            self.object.clone(),
            self.effect.as_str().to_string(),
        ]
    }

    pub fn from_values(values: &[String]) -> AppResult<Self> {
        match values {
            [subject, object, effect, ..] => Ok(Self::new(
                subject.as_str(),
                object.as_str(),
                effect.parse()?,
            )),
            _ => Err(AppError::validation(format!(
                "Policy rule needs 3 fields, got {:?}",
                values
            ))),
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p, {}, {}, {}", self.subject, self.object, self.effect)
    }
}

/// 分组规则 "g"：member 继承 group 的全部规则
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingRule {
    pub member: String,
    pub group: String,
}

impl GroupingRule {
    pub fn new(member: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            group: group.into(),
        }
    }

    pub fn with_member(&self, member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            group: self.group.clone(),
        }
    }

    pub fn with_group(&self, group: impl Into<String>) -> Self {
        Self {
            member: self.member.clone(),
            group: group.into(),
        }
    }

    pub fn to_values(&self) -> Vec<String> {
        vec![self.member.clone(), self.group.clone()]
    }

    pub fn from_values(values: &[String]) -> AppResult<Self> {
        match values {
            [member, group, ..] => Ok(Self::new(member.as_str(), group.as_str())),
            _ => Err(AppError::validation(format!(
                "Grouping rule needs 2 fields, got {:?}",
                values
            ))),
        }
    }
}

impl fmt::Display for GroupingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g, {}, {}", self.member, self.group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_from_status() {
        assert_eq!(Effect::from(true), Effect::Allow);
        assert_eq!(Effect::from(false), Effect::Deny);
        assert_eq!("deny".parse::<Effect>().unwrap(), Effect::Deny);
        assert!("maybe".parse::<Effect>().is_err());
    }

    #[test]
    fn test_policy_rule_values() {
        let rule = PolicyRule::new("role_r1", "1:MENU:show", Effect::Allow);
        assert_eq!(rule.to_values(), vec!["role_r1", "1:MENU:show", "allow"]);

        let values = vec!["role_r1".to_string(), "1:MENU:show".to_string()];
        assert!(PolicyRule::from_values(&values).is_err());
    }

    #[test]
    fn test_rewrites_keep_other_fields() {
        let rule = PolicyRule::new("role_r1", "1:MENU:show", Effect::Allow);
        let renamed = rule.with_subject("role_r2");
        assert_eq!(renamed.object, rule.object);
        assert_eq!(renamed.effect, Effect::Allow);

        let grouping = GroupingRule::new("user_alice", "role_r1");
        assert_eq!(grouping.with_group("role_r2").member, "user_alice");
        assert_eq!(grouping.to_string(), "g, user_alice, role_r1");
    }

    #[test]
    fn test_field_index() {
        assert_eq!(PolicyField::Object.index(), 1);
        assert_eq!(GroupingField::Group.index(), 1);
    }
}
