// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory container of canonical group records.
//!
//! The registry exclusively owns the canonical [`Group`] records and indexes
//! them by id and by (kind, key). Cloning the registry yields another handle
//! to the same container. Membership queries ([`GroupRegistry::roles_of`],
//! [`GroupRegistry::groups_of`], [`GroupRegistry::subject_attrs`]) are how a
//! live user is turned into the membership lists that rights resolution
//! consumes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AuthzError, AuthzResult};
use crate::group::Group;
use crate::subject::SubjectAttrs;
use crate::types::{GroupId, GroupKind, UserId};

/// Handle to a shared group container.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
	inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
	state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
	by_id: HashMap<GroupId, Arc<Group>>,
	by_key: HashMap<(GroupKind, String), GroupId>,
}

impl GroupRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a group and registers it in one step.
	///
	/// The parent, when given, is looked up in this registry; the whole
	/// operation is atomic with respect to concurrent registrations.
	pub fn create(
		&self,
		kind: GroupKind,
		key: impl Into<String>,
		name: impl Into<String>,
		parent: Option<GroupId>,
	) -> AuthzResult<Arc<Group>> {
		let key = key.into();
		let name = name.into();

		let mut state = self.inner.state.write();
		let parent = match parent {
			Some(id) => {
				let parent = state
					.by_id
					.get(&id)
					.ok_or(AuthzError::ParentNotFound(id))?;
				Some(Arc::clone(parent))
			}
			None => None,
		};
		let group = Group::new(kind, key, name, parent)?;
		Self::insert(&mut state, group)
	}

	/// Registers an externally constructed group.
	///
	/// Fails if a group with the same key already exists for its kind.
	pub fn register(&self, group: Group) -> AuthzResult<Arc<Group>> {
		let mut state = self.inner.state.write();
		Self::insert(&mut state, group)
	}

	fn insert(state: &mut RegistryState, group: Group) -> AuthzResult<Arc<Group>> {
		let index = (group.kind(), group.key().to_string());
		if state.by_key.contains_key(&index) {
			return Err(AuthzError::DuplicateKey {
				kind: group.kind(),
				key: group.key().to_string(),
			});
		}

		let group = Arc::new(group);
		state.by_key.insert(index, group.id());
		state.by_id.insert(group.id(), Arc::clone(&group));
		Ok(group)
	}

	/// Removes a group from both indexes, returning the removed record.
	pub fn remove(&self, id: GroupId) -> AuthzResult<Arc<Group>> {
		let mut state = self.inner.state.write();
		let Some(group) = state.by_id.remove(&id) else {
			return Err(AuthzError::GroupNotFound(id));
		};
		state.by_key.remove(&(group.kind(), group.key().to_string()));
		Ok(group)
	}

	pub fn get(&self, id: GroupId) -> Option<Arc<Group>> {
		self.inner.state.read().by_id.get(&id).cloned()
	}

	pub fn get_by_key(&self, kind: GroupKind, key: &str) -> Option<Arc<Group>> {
		let state = self.inner.state.read();
		let id = state.by_key.get(&(kind, key.to_string()))?;
		state.by_id.get(id).cloned()
	}

	pub fn len(&self) -> usize {
		self.inner.state.read().by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.state.read().by_id.is_empty()
	}

	// =========================================================================
	// Membership queries
	// =========================================================================

	/// Every role the user is a direct member of.
	pub fn roles_of(&self, user: UserId) -> Vec<Arc<Group>> {
		self.of_kind(GroupKind::Role, user)
	}

	/// Every plain group the user is a direct member of.
	pub fn groups_of(&self, user: UserId) -> Vec<Arc<Group>> {
		self.of_kind(GroupKind::Group, user)
	}

	fn of_kind(&self, kind: GroupKind, user: UserId) -> Vec<Arc<Group>> {
		self.inner
			.state
			.read()
			.by_id
			.values()
			.filter(|group| group.kind() == kind && group.is_member(user))
			.cloned()
			.collect()
	}

	/// Assembles the user's full membership attributes in one pass.
	pub fn subject_attrs(&self, user: UserId) -> SubjectAttrs {
		let state = self.inner.state.read();
		let mut attrs = SubjectAttrs::new(user);
		for group in state.by_id.values() {
			if !group.is_member(user) {
				continue;
			}
			match group.kind() {
				GroupKind::Role => attrs.roles.push(Arc::clone(group)),
				GroupKind::Group => attrs.groups.push(Arc::clone(group)),
			}
		}
		attrs
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_and_get_roundtrip() {
		let registry = GroupRegistry::new();
		let staff = registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.unwrap();

		assert_eq!(registry.len(), 1);
		assert_eq!(registry.get(staff.id()).unwrap().key(), "staff");
		assert_eq!(
			registry
				.get_by_key(GroupKind::Group, "staff")
				.unwrap()
				.id(),
			staff.id()
		);
	}

	#[test]
	fn duplicate_key_within_kind_is_rejected() {
		let registry = GroupRegistry::new();
		registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.unwrap();

		let err = registry
			.create(GroupKind::Group, "staff", "Other Staff", None)
			.unwrap_err();
		assert_eq!(
			err,
			AuthzError::DuplicateKey {
				kind: GroupKind::Group,
				key: "staff".to_string(),
			}
		);
	}

	#[test]
	fn same_key_across_kinds_is_allowed() {
		let registry = GroupRegistry::new();
		registry
			.create(GroupKind::Group, "admins", "Admins", None)
			.unwrap();
		let as_role = registry.create(GroupKind::Role, "admins", "Admins", None);

		assert!(as_role.is_ok());
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn create_links_registered_parent() {
		let registry = GroupRegistry::new();
		let user = registry
			.create(GroupKind::Role, "user", "User", None)
			.unwrap();
		let manager = registry
			.create(GroupKind::Role, "manager", "Manager", Some(user.id()))
			.unwrap();

		assert_eq!(manager.parent().unwrap().id(), user.id());
	}

	#[test]
	fn create_with_unknown_parent_fails() {
		let registry = GroupRegistry::new();
		let missing = GroupId::generate();
		let err = registry
			.create(GroupKind::Role, "manager", "Manager", Some(missing))
			.unwrap_err();
		assert_eq!(err, AuthzError::ParentNotFound(missing));
	}

	#[test]
	fn register_accepts_external_group() {
		let registry = GroupRegistry::new();
		let group = Group::new(GroupKind::Group, "external", "External", None).unwrap();
		let id = group.id();

		let registered = registry.register(group).unwrap();
		assert_eq!(registered.id(), id);
		assert_eq!(registry.get(id).unwrap().id(), id);
	}

	#[test]
	fn remove_drops_both_indexes() {
		let registry = GroupRegistry::new();
		let staff = registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.unwrap();

		let removed = registry.remove(staff.id()).unwrap();
		assert_eq!(removed.id(), staff.id());
		assert!(registry.get(staff.id()).is_none());
		assert!(registry.get_by_key(GroupKind::Group, "staff").is_none());
		assert!(registry.is_empty());

		// The key is free again after removal
		assert!(registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.is_ok());
	}

	#[test]
	fn remove_unknown_group_fails() {
		let registry = GroupRegistry::new();
		let missing = GroupId::generate();
		assert_eq!(
			registry.remove(missing).unwrap_err(),
			AuthzError::GroupNotFound(missing)
		);
	}

	#[test]
	fn membership_queries_filter_by_kind() {
		let registry = GroupRegistry::new();
		let manager = registry
			.create(GroupKind::Role, "manager", "Manager", None)
			.unwrap();
		let staff = registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.unwrap();
		let user = UserId::generate();

		manager.add_member(user);
		staff.add_member(user);

		let roles = registry.roles_of(user);
		assert_eq!(roles.len(), 1);
		assert_eq!(roles[0].id(), manager.id());

		let groups = registry.groups_of(user);
		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].id(), staff.id());

		let stranger = UserId::generate();
		assert!(registry.roles_of(stranger).is_empty());
		assert!(registry.groups_of(stranger).is_empty());
	}

	#[test]
	fn subject_attrs_assembles_both_kinds() {
		let registry = GroupRegistry::new();
		let manager = registry
			.create(GroupKind::Role, "manager", "Manager", None)
			.unwrap();
		let staff = registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.unwrap();
		let user = UserId::generate();

		manager.add_member(user);
		staff.add_member(user);

		let attrs = registry.subject_attrs(user);
		assert_eq!(attrs.user_id, user);
		assert!(attrs.holds_role(manager.id()));
		assert!(attrs.in_group(staff.id()));
	}

	#[test]
	fn clones_share_the_container() {
		let registry = GroupRegistry::new();
		let handle = registry.clone();

		registry
			.create(GroupKind::Group, "staff", "Staff", None)
			.unwrap();
		assert_eq!(handle.len(), 1);
	}
}
