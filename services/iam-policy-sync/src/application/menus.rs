//! 菜单可见性查询

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use bastion_errors::AppResult;

use crate::domain::identity::{IdentityScheme, ObjectRef, PrincipalKind};
use crate::domain::policy::{GroupingField, PolicyField, PolicyStore};

/// 菜单权限的分类与编码
pub const MENU_CATEGORY: &str = "MENU";
pub const MENU_SHOW: &str = "show";

pub struct MenuQuery {
    store: Arc<dyn PolicyStore>,
    scheme: Arc<IdentityScheme>,
}

impl MenuQuery {
    pub fn new(store: Arc<dyn PolicyStore>, scheme: Arc<IdentityScheme>) -> Self {
        Self { store, scheme }
    }

    /// 用户自身及其所有上级分组 (传递闭包)
    async fn subjects_of(&self, user: &str) -> AppResult<BTreeSet<String>> {
        let mut seen = BTreeSet::from([user.to_string()]);
        let mut queue = VecDeque::from([user.to_string()]);

        while let Some(member) = queue.pop_front() {
            for rule in self
                .store
                .filtered_groupings(GroupingField::Member, &[member.as_str()])
                .await?
            {
                if seen.insert(rule.group.clone()) {
                    queue.push_back(rule.group);
                }
            }
        }

        Ok(seen)
    }

    /// 用户可见的菜单 ID
    pub async fn menus_for(&self, username: &str) -> AppResult<Vec<i64>> {
        let user = self.scheme.principal(PrincipalKind::User, username);
        let mut candidates = BTreeSet::new();

        for subject in self.subjects_of(&user).await? {
            for rule in self
                .store
                .filtered_policies(PolicyField::Subject, &[subject.as_str()])
                .await?
            {
                if let Some(object) = ObjectRef::parse(&rule.object) {
                    if object.category == MENU_CATEGORY && object.code == MENU_SHOW {
                        candidates.insert((object.menu_id, rule.object.clone()));
                    }
                }
            }
        }

        let mut menus = BTreeSet::new();
        for (menu_id, object) in candidates {
            if self.store.enforce(&user, &object, "allow").await? {
                menus.insert(menu_id);
            }
        }

        Ok(menus.into_iter().collect())
    }
}
