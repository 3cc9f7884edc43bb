// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and group hierarchy nodes.
//!
//! A [`Group`] is either a role or a plain group ([`GroupKind`]); the two
//! kinds never mix along a parent edge. Parent links are fixed at
//! construction as [`Arc`] references, which keeps every parent chain acyclic
//! and makes the ancestor walk used for rights resolution terminate without a
//! visited set.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{AuthzError, AuthzResult};
use crate::types::{GroupId, GroupKind, UserId};

/// A role or plain group, with an optional same-kind parent and a membership set.
#[derive(Debug)]
pub struct Group {
	id: GroupId,
	kind: GroupKind,
	key: String,
	name: String,
	parent: Option<Arc<Group>>,
	members: RwLock<HashSet<UserId>>,
	created_at: DateTime<Utc>,
}

impl Group {
	/// Creates a group of the given kind.
	///
	/// Fails if the key is not a valid group key, or if a parent is supplied
	/// whose kind differs from `kind`.
	pub fn new(
		kind: GroupKind,
		key: impl Into<String>,
		name: impl Into<String>,
		parent: Option<Arc<Group>>,
	) -> AuthzResult<Self> {
		let key = key.into();
		if !Self::validate_key(&key) {
			return Err(AuthzError::InvalidKey(key));
		}
		if let Some(parent) = &parent {
			if parent.kind != kind {
				return Err(AuthzError::KindMismatch {
					expected: kind,
					actual: parent.kind,
				});
			}
		}
		Ok(Self {
			id: GroupId::generate(),
			kind,
			key,
			name: name.into(),
			parent,
			members: RwLock::new(HashSet::new()),
			created_at: Utc::now(),
		})
	}

	/// Validates the group key format.
	///
	/// Valid keys:
	/// - Lowercase alphanumeric with underscores
	/// - Start with a letter
	/// - 3-100 characters
	pub fn validate_key(key: &str) -> bool {
		if key.len() < 3 || key.len() > 100 {
			return false;
		}

		let mut chars = key.chars();

		// First character must be lowercase letter
		match chars.next() {
			Some(c) if c.is_ascii_lowercase() => {}
			_ => return false,
		}

		chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
	}

	pub fn id(&self) -> GroupId {
		self.id
	}

	pub fn kind(&self) -> GroupKind {
		self.kind
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	/// Returns true if this node is a role.
	pub fn is_role(&self) -> bool {
		self.kind == GroupKind::Role
	}

	/// Returns true if this node is a plain group.
	pub fn is_group(&self) -> bool {
		self.kind == GroupKind::Group
	}

	/// The parent node, if any. Always of the same kind as this node.
	pub fn parent(&self) -> Option<&Group> {
		self.parent.as_deref()
	}

	/// Iterates over ancestors from the parent upwards, excluding this node.
	pub fn ancestors(&self) -> impl Iterator<Item = &Group> {
		std::iter::successors(self.parent(), |group| group.parent())
	}

	/// Returns true if `id` appears anywhere in the ancestor chain.
	pub fn has_ancestor(&self, id: GroupId) -> bool {
		self.ancestors().any(|group| group.id == id)
	}

	// =========================================================================
	// Membership
	// =========================================================================

	/// Adds a member. Returns false if the user was already a member.
	pub fn add_member(&self, user: UserId) -> bool {
		self.members.write().insert(user)
	}

	/// Removes a member. Returns false if the user was not a member.
	pub fn remove_member(&self, user: UserId) -> bool {
		self.members.write().remove(&user)
	}

	/// Returns true if the user is a direct member of this node.
	///
	/// Membership is not inherited along the parent chain; only rights
	/// resolution walks ancestors.
	pub fn is_member(&self, user: UserId) -> bool {
		self.members.read().contains(&user)
	}

	pub fn member_count(&self) -> usize {
		self.members.read().len()
	}

	/// Snapshot of the current members.
	pub fn members(&self) -> Vec<UserId> {
		self.members.read().iter().copied().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn role(key: &str, parent: Option<Arc<Group>>) -> Arc<Group> {
		Arc::new(Group::new(GroupKind::Role, key, key.to_uppercase(), parent).unwrap())
	}

	fn group(key: &str, parent: Option<Arc<Group>>) -> Arc<Group> {
		Arc::new(Group::new(GroupKind::Group, key, key.to_uppercase(), parent).unwrap())
	}

	mod construction {
		use super::*;

		#[test]
		fn new_assigns_unique_ids() {
			let a = group("first_group", None);
			let b = group("second_group", None);
			assert_ne!(a.id(), b.id());
		}

		#[test]
		fn new_rejects_invalid_key() {
			let err = Group::new(GroupKind::Group, "No Spaces", "Bad", None).unwrap_err();
			assert_eq!(err, AuthzError::InvalidKey("No Spaces".to_string()));
		}

		#[test]
		fn parent_of_same_kind_is_accepted() {
			let parent = role("user", None);
			let child = Group::new(GroupKind::Role, "manager", "Manager", Some(parent.clone()));
			assert!(child.is_ok());
			assert_eq!(child.unwrap().parent().unwrap().id(), parent.id());
		}

		#[test]
		fn parent_of_other_kind_is_rejected() {
			let parent = group("staff", None);
			let err = Group::new(GroupKind::Role, "manager", "Manager", Some(parent)).unwrap_err();
			assert_eq!(
				err,
				AuthzError::KindMismatch {
					expected: GroupKind::Role,
					actual: GroupKind::Group,
				}
			);
		}

		#[test]
		fn kind_predicates() {
			assert!(role("user", None).is_role());
			assert!(group("staff", None).is_group());
		}
	}

	mod hierarchy {
		use super::*;

		#[test]
		fn ancestors_walk_parent_chain_in_order() {
			let root = group("root", None);
			let mid = group("mid", Some(root.clone()));
			let leaf = group("leaf", Some(mid.clone()));

			let ids: Vec<GroupId> = leaf.ancestors().map(Group::id).collect();
			assert_eq!(ids, vec![mid.id(), root.id()]);
		}

		#[test]
		fn ancestors_of_root_is_empty() {
			let root = group("root", None);
			assert_eq!(root.ancestors().count(), 0);
		}

		#[test]
		fn has_ancestor_excludes_self() {
			let root = group("root", None);
			let leaf = group("leaf", Some(root.clone()));

			assert!(leaf.has_ancestor(root.id()));
			assert!(!leaf.has_ancestor(leaf.id()));
			assert!(!root.has_ancestor(leaf.id()));
		}
	}

	mod membership {
		use super::*;

		#[test]
		fn add_and_remove_members() {
			let staff = group("staff", None);
			let user = UserId::generate();

			assert!(staff.add_member(user));
			assert!(staff.is_member(user));
			assert_eq!(staff.member_count(), 1);

			assert!(staff.remove_member(user));
			assert!(!staff.is_member(user));
			assert_eq!(staff.member_count(), 0);
		}

		#[test]
		fn add_is_idempotent() {
			let staff = group("staff", None);
			let user = UserId::generate();

			assert!(staff.add_member(user));
			assert!(!staff.add_member(user));
			assert_eq!(staff.member_count(), 1);
		}

		#[test]
		fn membership_is_not_inherited() {
			let root = group("root", None);
			let leaf = group("leaf", Some(root.clone()));
			let user = UserId::generate();

			root.add_member(user);
			assert!(root.is_member(user));
			assert!(!leaf.is_member(user));
		}

		#[test]
		fn members_returns_snapshot() {
			let staff = group("staff", None);
			let user = UserId::generate();
			staff.add_member(user);

			assert_eq!(staff.members(), vec![user]);
		}
	}

	proptest! {
		#[test]
		fn valid_keys_pass(key in "[a-z][a-z0-9_]{2,99}") {
			prop_assert!(Group::validate_key(&key));
		}

		#[test]
		fn uppercase_start_fails(key in "[A-Z][a-z0-9_]{2,20}") {
			prop_assert!(!Group::validate_key(&key));
		}

		#[test]
		fn numeric_start_fails(key in "[0-9][a-z0-9_]{2,20}") {
			prop_assert!(!Group::validate_key(&key));
		}

		#[test]
		fn too_short_keys_fail(key in "[a-z][a-z0-9_]{0,1}") {
			prop_assert!(!Group::validate_key(&key));
		}

		#[test]
		fn dashes_fail(key in "[a-z][a-z0-9-]{2,20}") {
			if key.contains('-') {
				prop_assert!(!Group::validate_key(&key));
			}
		}
	}
}
