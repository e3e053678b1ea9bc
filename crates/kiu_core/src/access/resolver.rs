//! Ancestor-chain access resolution.
//!
//! # Invariants
//! - A category is readable iff it exists, the user holds an explicit
//!   `true` grant on it, and the same holds for every ancestor.
//! - The walk is iterative and stops after `MAX_CATEGORY_DEPTH` steps; a
//!   chain that is still open at that point resolves to `false`. Only the
//!   starting id of such a walk is memoized, so intact ancestors keep their
//!   own answers.
//! - Every grant read of one decision comes from one snapshot, so a
//!   concurrent matrix replace is observed entirely or not at all.
//! - Denial is a `false` answer, never an error.

use crate::model::category::{CategoryId, MAX_CATEGORY_DEPTH};
use crate::model::user::UserId;
use crate::repo::access_repo::AccessStore;
use crate::repo::category_repo::CategoryTree;
use crate::repo::RepoResult;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// Decides category readability from the tree and the grant table.
pub struct AccessResolver<'a, T: CategoryTree + ?Sized, S: AccessStore + ?Sized> {
    tree: &'a T,
    store: &'a S,
}

impl<'a, T: CategoryTree + ?Sized, S: AccessStore + ?Sized> AccessResolver<'a, T, S> {
    pub fn new(tree: &'a T, store: &'a S) -> Self {
        Self { tree, store }
    }

    /// Single decision for one `(user, category)` pair.
    pub fn can_access(&self, user_id: UserId, category_id: CategoryId) -> RepoResult<bool> {
        self.view(user_id)?.can_access(category_id)
    }

    /// Loads one grant snapshot for `user_id`.
    ///
    /// Use the returned view for bulk filtering: decisions are memoized per
    /// category and never re-read the grant table.
    pub fn view(&self, user_id: UserId) -> RepoResult<UserAccessView<'a, T>> {
        let granted = self.store.granted_category_ids(user_id)?;
        Ok(UserAccessView::new(self.tree, user_id, granted))
    }

    pub fn tree(&self) -> &'a T {
        self.tree
    }
}

/// One user's grants frozen at load time, with memoized decisions.
pub struct UserAccessView<'a, T: CategoryTree + ?Sized> {
    tree: &'a T,
    user_id: UserId,
    granted: BTreeSet<CategoryId>,
    decided: RefCell<HashMap<CategoryId, bool>>,
}

impl<'a, T: CategoryTree + ?Sized> UserAccessView<'a, T> {
    fn new(tree: &'a T, user_id: UserId, granted: BTreeSet<CategoryId>) -> Self {
        Self {
            tree,
            user_id,
            granted,
            decided: RefCell::new(HashMap::new()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Explicit grant on this exact category, ignoring ancestors.
    pub fn has_grant(&self, category_id: CategoryId) -> bool {
        self.granted.contains(&category_id)
    }

    /// Ancestor-chain decision for `category_id`.
    pub fn can_access(&self, category_id: CategoryId) -> RepoResult<bool> {
        if let Some(known) = self.decided.borrow().get(&category_id) {
            return Ok(*known);
        }

        let mut walked = Vec::new();
        let mut cursor = Some(category_id);
        let mut steps = 0u8;
        let mut corrupt = false;
        let decision = loop {
            let Some(current) = cursor else {
                break true;
            };
            if let Some(known) = self.decided.borrow().get(&current) {
                break *known;
            }
            if steps >= MAX_CATEGORY_DEPTH {
                warn!(
                    "event=access_resolve module=access status=corrupt_hierarchy category_id={category_id}"
                );
                corrupt = true;
                break false;
            }
            steps += 1;
            walked.push(current);

            let Some(category) = self.tree.get(current)? else {
                debug!(
                    "event=access_resolve module=access status=missing_category user_id={} category_id={current}",
                    self.user_id
                );
                break false;
            };
            if !self.granted.contains(&current) {
                debug!(
                    "event=access_resolve module=access status=denied user_id={} category_id={category_id} denied_at={current}",
                    self.user_id
                );
                break false;
            }
            cursor = category.parent_id;
        };

        let mut decided = self.decided.borrow_mut();
        if corrupt {
            decided.insert(category_id, false);
        } else {
            for id in walked {
                decided.insert(id, decision);
            }
        }
        Ok(decision)
    }
}
