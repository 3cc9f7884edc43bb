// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The subject capability consumed from embedding applications.

use std::sync::Arc;

use crate::group::Group;
use crate::types::{GroupId, UserId};

/// Anything that can hold rights or act as assignor: a stable user identity
/// plus enumerable role and group memberships.
///
/// Policy evaluation is pure over this data; memberships are enumerated
/// before any lock is taken, never looked up mid-decision.
pub trait Subject {
	/// The stable unique identifier of the acting user.
	fn user_id(&self) -> UserId;

	/// Every role the subject holds. All returned nodes are of role kind.
	fn roles(&self) -> Vec<Arc<Group>>;

	/// Every group the subject belongs to. All returned nodes are of group kind.
	fn groups(&self) -> Vec<Arc<Group>>;
}

impl<S: Subject + ?Sized> Subject for &S {
	fn user_id(&self) -> UserId {
		(**self).user_id()
	}

	fn roles(&self) -> Vec<Arc<Group>> {
		(**self).roles()
	}

	fn groups(&self) -> Vec<Arc<Group>> {
		(**self).groups()
	}
}

/// Pre-loaded subject attributes.
///
/// The concrete [`Subject`] carrier used when memberships are assembled up
/// front, either by hand or via `GroupRegistry::subject_attrs`.
#[derive(Debug, Clone)]
pub struct SubjectAttrs {
	pub user_id: UserId,
	pub roles: Vec<Arc<Group>>,
	pub groups: Vec<Arc<Group>>,
}

impl SubjectAttrs {
	/// Creates a subject with no memberships.
	pub fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			roles: Vec::new(),
			groups: Vec::new(),
		}
	}

	/// Builder: add a role membership.
	pub fn with_role(mut self, role: Arc<Group>) -> Self {
		self.roles.push(role);
		self
	}

	/// Builder: add a group membership.
	pub fn with_group(mut self, group: Arc<Group>) -> Self {
		self.groups.push(group);
		self
	}

	/// Returns true if the subject holds the given role directly.
	pub fn holds_role(&self, id: GroupId) -> bool {
		self.roles.iter().any(|role| role.id() == id)
	}

	/// Returns true if the subject belongs to the given group directly.
	pub fn in_group(&self, id: GroupId) -> bool {
		self.groups.iter().any(|group| group.id() == id)
	}
}

impl Subject for SubjectAttrs {
	fn user_id(&self) -> UserId {
		self.user_id
	}

	fn roles(&self) -> Vec<Arc<Group>> {
		self.roles.clone()
	}

	fn groups(&self) -> Vec<Arc<Group>> {
		self.groups.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::GroupKind;

	fn role(key: &str) -> Arc<Group> {
		Arc::new(Group::new(GroupKind::Role, key, key.to_uppercase(), None).unwrap())
	}

	fn group(key: &str) -> Arc<Group> {
		Arc::new(Group::new(GroupKind::Group, key, key.to_uppercase(), None).unwrap())
	}

	#[test]
	fn new_has_no_memberships() {
		let subject = SubjectAttrs::new(UserId::generate());
		assert!(subject.roles.is_empty());
		assert!(subject.groups.is_empty());
	}

	#[test]
	fn builders_accumulate_memberships() {
		let manager = role("manager");
		let staff = group("staff");
		let subject = SubjectAttrs::new(UserId::generate())
			.with_role(manager.clone())
			.with_group(staff.clone());

		assert!(subject.holds_role(manager.id()));
		assert!(subject.in_group(staff.id()));
		assert!(!subject.holds_role(staff.id()));
	}

	#[test]
	fn trait_enumeration_matches_fields() {
		let manager = role("manager");
		let subject = SubjectAttrs::new(UserId::generate()).with_role(manager.clone());

		let roles = Subject::roles(&subject);
		assert_eq!(roles.len(), 1);
		assert_eq!(roles[0].id(), manager.id());
		assert!(Subject::groups(&subject).is_empty());
	}

	#[test]
	fn reference_is_also_a_subject() {
		fn user_of(subject: &impl Subject) -> UserId {
			subject.user_id()
		}

		let subject = SubjectAttrs::new(UserId::generate());
		assert_eq!(user_of(&&subject), subject.user_id);
	}
}
