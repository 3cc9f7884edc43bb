// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The rights roster: explicit grants for everyone, roles, groups, and users.
//!
//! A [`RightsRoster`] is a cheap handle; cloning it shares the underlying
//! tables rather than copying them. An inheritance chain of policies observes
//! one roster precisely because every policy in the chain holds a clone of
//! the same handle.
//!
//! Absence of a key means "no explicit grant", which is not the same thing as
//! an explicit [`AccessRight::NO_ACCESS`] entry: resolution may still fall
//! back to an ancestor group, and the everyone baseline still applies.
//!
//! Mutation goes exclusively through `AccessPolicy`'s privilege-checked
//! writers; every successful mutation appends a [`RosterChange`] that
//! external persistence drains via [`RightsRoster::take_changes`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::change::{RosterChange, RosterSubject};
use crate::group::Group;
use crate::right::AccessRight;
use crate::subject::Subject;
use crate::types::{GroupId, GroupKind, UserId};

/// Handle to a shared set of grant tables.
#[derive(Debug, Clone, Default)]
pub struct RightsRoster {
	inner: Arc<RosterInner>,
}

#[derive(Debug, Default)]
struct RosterInner {
	state: RwLock<RosterState>,
}

#[derive(Debug, Default)]
pub(crate) struct RosterState {
	tables: RosterTables,
	changelog: Vec<RosterChange>,
}

/// The four grant tables, separated from the change log so backups can deep
/// copy them as one value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RosterTables {
	everyone: AccessRight,
	roles: HashMap<GroupId, AccessRight>,
	groups: HashMap<GroupId, AccessRight>,
	users: HashMap<UserId, AccessRight>,
}

impl Default for RosterTables {
	fn default() -> Self {
		Self {
			everyone: AccessRight::NO_ACCESS,
			roles: HashMap::new(),
			groups: HashMap::new(),
			users: HashMap::new(),
		}
	}
}

impl RosterTables {
	/// Nearest-ancestor resolution for a role or group.
	///
	/// Looks the node up in the table matching its kind and walks towards the
	/// root until an explicit entry is found. A missing node resolves to
	/// [`AccessRight::NO_ACCESS`].
	fn resolve(&self, group: Option<&Group>) -> AccessRight {
		let Some(mut current) = group else {
			return AccessRight::NO_ACCESS;
		};

		// The kind is invariant across the walk: parents share their child's kind.
		let table = match current.kind() {
			GroupKind::Role => &self.roles,
			GroupKind::Group => &self.groups,
		};

		loop {
			if let Some(rights) = table.get(&current.id()) {
				return *rights;
			}
			match current.parent() {
				Some(parent) => current = parent,
				None => return AccessRight::NO_ACCESS,
			}
		}
	}

	/// OR of everyone, every resolved role, every resolved group, and the
	/// subject's own explicit entry.
	fn summarize_for(
		&self,
		user: UserId,
		roles: &[Arc<Group>],
		groups: &[Arc<Group>],
	) -> AccessRight {
		let mut rights = self.everyone;
		for role in roles {
			rights |= self.resolve(Some(role.as_ref()));
		}
		for group in groups {
			rights |= self.resolve(Some(group.as_ref()));
		}
		if let Some(explicit) = self.users.get(&user) {
			rights |= *explicit;
		}
		rights
	}
}

impl RosterState {
	pub(crate) fn summarize_for(
		&self,
		user: UserId,
		roles: &[Arc<Group>],
		groups: &[Arc<Group>],
	) -> AccessRight {
		self.tables.summarize_for(user, roles, groups)
	}

	/// Writes an entry and records the mutation.
	pub(crate) fn set(&mut self, subject: RosterSubject, rights: AccessRight) {
		let previous = match subject {
			RosterSubject::Everyone => {
				// The baseline always exists; an assignment is always an update.
				self.tables.everyone = rights;
				self.changelog.push(RosterChange::updated(subject, rights));
				return;
			}
			RosterSubject::Role(id) => self.tables.roles.insert(id, rights),
			RosterSubject::Group(id) => self.tables.groups.insert(id, rights),
			RosterSubject::User(id) => self.tables.users.insert(id, rights),
		};
		let change = match previous {
			None => RosterChange::created(subject, rights),
			Some(_) => RosterChange::updated(subject, rights),
		};
		self.changelog.push(change);
	}

	/// Removes an entry outright, recording the deletion. Removing an absent
	/// entry is a no-op and records nothing.
	pub(crate) fn unset(&mut self, subject: RosterSubject) -> bool {
		let removed = match subject {
			// The baseline is never removed, only overwritten.
			RosterSubject::Everyone => false,
			RosterSubject::Role(id) => self.tables.roles.remove(&id).is_some(),
			RosterSubject::Group(id) => self.tables.groups.remove(&id).is_some(),
			RosterSubject::User(id) => self.tables.users.remove(&id).is_some(),
		};
		if removed {
			self.changelog.push(RosterChange::deleted(subject));
		}
		removed
	}
}

impl RightsRoster {
	/// Creates an empty roster.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true if both handles share the same tables.
	pub fn ptr_eq(&self, other: &RightsRoster) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Aggregates every grant applicable to the subject.
	///
	/// Memberships are enumerated before the read lock is taken; the lock
	/// covers only the table scan.
	pub fn summarize(&self, subject: &impl Subject) -> AccessRight {
		let roles = subject.roles();
		let groups = subject.groups();
		self.inner
			.state
			.read()
			.summarize_for(subject.user_id(), &roles, &groups)
	}

	/// Nearest-ancestor resolution for a role or group; `None` resolves to
	/// [`AccessRight::NO_ACCESS`] without error.
	pub fn resolve_group_rights(&self, group: Option<&Group>) -> AccessRight {
		self.inner.state.read().tables.resolve(group)
	}

	/// The unconditional baseline grant.
	pub fn everyone(&self) -> AccessRight {
		self.inner.state.read().tables.everyone
	}

	/// The explicit role-table entry, if one exists.
	pub fn role_rights(&self, id: GroupId) -> Option<AccessRight> {
		self.inner.state.read().tables.roles.get(&id).copied()
	}

	/// The explicit group-table entry, if one exists.
	pub fn group_rights(&self, id: GroupId) -> Option<AccessRight> {
		self.inner.state.read().tables.groups.get(&id).copied()
	}

	/// The explicit user-table entry, if one exists.
	pub fn user_rights(&self, id: UserId) -> Option<AccessRight> {
		self.inner.state.read().tables.users.get(&id).copied()
	}

	/// Snapshot of the pending change records, oldest first.
	pub fn changes(&self) -> Vec<RosterChange> {
		self.inner.state.read().changelog.clone()
	}

	/// Drains the pending change records, leaving the log empty.
	pub fn take_changes(&self) -> Vec<RosterChange> {
		std::mem::take(&mut self.inner.state.write().changelog)
	}

	/// Runs `f` under the exclusive lock, covering a full check-then-write
	/// sequence in one critical section.
	pub(crate) fn update<T>(&self, f: impl FnOnce(&mut RosterState) -> T) -> T {
		f(&mut self.inner.state.write())
	}

	/// Deep copy of the four tables, for backups.
	pub(crate) fn tables_snapshot(&self) -> RosterTables {
		self.inner.state.read().tables.clone()
	}

	/// Overwrites the tables from a snapshot and clears the change log.
	pub(crate) fn restore(&self, tables: RosterTables) {
		let mut state = self.inner.state.write();
		state.tables = tables;
		state.changelog.clear();
	}
}
