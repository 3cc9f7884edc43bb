// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access policies: ownership, parent linkage, and privilege-checked grants.
//!
//! An [`AccessPolicy`] answers "which operations may this subject perform on
//! the thing I protect?". The owner always holds [`AccessRight::FULL_ACCESS`];
//! every other subject is resolved through the policy's [`RightsRoster`] and,
//! depending on the policy's mode, its parent:
//!
//! - **standalone**: the policy's own roster is the whole answer;
//! - **inherited**: the policy has no grants of its own; it reads and writes
//!   the roster of its nearest non-inherited ancestor, and access checks
//!   delegate to the parent wholesale;
//! - **extended**: the policy owns a roster and additionally ORs in the
//!   parent roster's resolved grants as a baseline.
//!
//! Inherited and extended are mutually exclusive. Rights only accumulate;
//! there is no deny entry, only the absence of a grant.
//!
//! Every mutation is privilege checked: an assignor can never hand out a
//! right it does not itself hold under this policy. Assigning or revoking
//! per-user entries additionally requires [`AccessRight::MANAGE_RIGHTS`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::change::RosterSubject;
use crate::error::{AuthzError, AuthzResult};
use crate::group::Group;
use crate::right::AccessRight;
use crate::roster::{RightsRoster, RosterState, RosterTables};
use crate::subject::Subject;
use crate::types::{GroupId, GroupKind, ObjectId, PolicyId, UserId};

// =============================================================================
// Designators
// =============================================================================

/// The protected object a policy stands in front of.
///
/// A policy is designated either by an [`ObjectRef`] or by a standalone key;
/// a kind without an id is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
	pub kind: String,
	pub id: ObjectId,
}

impl ObjectRef {
	pub fn new(kind: impl Into<String>, id: ObjectId) -> Self {
		Self {
			kind: kind.into(),
			id,
		}
	}
}

impl fmt::Display for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.kind, self.id)
	}
}

// =============================================================================
// Roster Source
// =============================================================================

/// Where a policy's roster comes from.
///
/// The tag makes roster sharing explicit: an inherited policy does not hold a
/// copy of an ancestor's tables, it holds the very same [`RightsRoster`]
/// handle, and records which ancestor owns it. Inherited sources are
/// flattened at link time, so `ancestor` always names a non-inherited policy.
#[derive(Debug, Clone)]
pub enum RosterSource {
	/// The policy owns its roster outright.
	Owned(RightsRoster),
	/// The policy reads and writes the owning ancestor's roster.
	Inherited {
		ancestor: PolicyId,
		roster: RightsRoster,
	},
}

impl RosterSource {
	/// The roster handle, whoever owns it.
	pub fn roster(&self) -> &RightsRoster {
		match self {
			Self::Owned(roster) => roster,
			Self::Inherited { roster, .. } => roster,
		}
	}

	/// The owning ancestor, when the roster is not this policy's own.
	pub fn ancestor(&self) -> Option<PolicyId> {
		match self {
			Self::Owned(_) => None,
			Self::Inherited { ancestor, .. } => Some(*ancestor),
		}
	}
}

// =============================================================================
// Assignees
// =============================================================================

/// The target of a rights revocation, dispatched by pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignee {
	User(UserId),
	Role(GroupId),
	Group(GroupId),
}

impl From<UserId> for Assignee {
	fn from(id: UserId) -> Self {
		Self::User(id)
	}
}

impl From<&Group> for Assignee {
	fn from(group: &Group) -> Self {
		match group.kind() {
			GroupKind::Role => Self::Role(group.id()),
			GroupKind::Group => Self::Group(group.id()),
		}
	}
}

impl From<Assignee> for RosterSubject {
	fn from(assignee: Assignee) -> Self {
		match assignee {
			Assignee::User(id) => RosterSubject::User(id),
			Assignee::Role(id) => RosterSubject::Role(id),
			Assignee::Group(id) => RosterSubject::Group(id),
		}
	}
}

// =============================================================================
// Construction Parameters
// =============================================================================

/// Builder-style parameters for [`AccessPolicy::new`].
#[derive(Debug, Clone)]
pub struct PolicyParams {
	owner: UserId,
	key: Option<String>,
	object: Option<ObjectRef>,
	parent: Option<AccessPolicy>,
	inherited: bool,
	extended: bool,
}

impl PolicyParams {
	pub fn new(owner: UserId) -> Self {
		Self {
			owner,
			key: None,
			object: None,
			parent: None,
			inherited: false,
			extended: false,
		}
	}

	/// Designates the policy by a standalone key.
	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}

	/// Designates the policy by the object it protects.
	pub fn with_object(mut self, object: ObjectRef) -> Self {
		self.object = Some(object);
		self
	}

	pub fn with_parent(mut self, parent: AccessPolicy) -> Self {
		self.parent = Some(parent);
		self
	}

	/// Marks the policy as inherited: no roster of its own, everything
	/// delegates to the parent.
	pub fn inheriting(mut self) -> Self {
		self.inherited = true;
		self
	}

	/// Marks the policy as extended: its own roster plus the parent roster's
	/// grants as a baseline.
	pub fn extending(mut self) -> Self {
		self.extended = true;
		self
	}
}

// =============================================================================
// Access Policy
// =============================================================================

/// Handle to a shared policy; clones observe the same state.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
	inner: Arc<PolicyInner>,
}

#[derive(Debug)]
struct PolicyInner {
	id: PolicyId,
	created_at: DateTime<Utc>,
	state: RwLock<PolicyState>,
}

#[derive(Debug)]
struct PolicyState {
	key: Option<String>,
	object: Option<ObjectRef>,
	owner: UserId,
	parent: Option<AccessPolicy>,
	is_inherited: bool,
	is_extended: bool,
	source: RosterSource,
	backup: Option<Box<PolicyBackup>>,
}

/// Full value snapshot of a policy, including a deep copy of the roster
/// tables. At most one is pending at a time.
#[derive(Debug)]
struct PolicyBackup {
	id: PolicyId,
	key: Option<String>,
	object: Option<ObjectRef>,
	owner: UserId,
	parent: Option<AccessPolicy>,
	is_inherited: bool,
	is_extended: bool,
	source: RosterSource,
	tables: RosterTables,
}

/// Snapshot of the fields an access decision needs, taken under the policy
/// read lock and used after it is released. Recursion into a parent never
/// happens with the local lock held.
struct PolicyFacts {
	owner: UserId,
	is_inherited: bool,
	is_extended: bool,
	parent: Option<AccessPolicy>,
	roster: RightsRoster,
}

impl AccessPolicy {
	/// Creates a policy after validating the parameters.
	///
	/// An inherited policy is linked to the roster of its nearest
	/// non-inherited ancestor at construction; the chain is flattened once
	/// here rather than walked on every read.
	pub fn new(params: PolicyParams) -> AuthzResult<Self> {
		validate_fields(
			params.key.as_deref(),
			params.object.as_ref(),
			params.parent.is_some(),
			params.inherited,
			params.extended,
		)?;

		let source = match (&params.parent, params.inherited) {
			(Some(parent), true) => {
				let (ancestor, roster) = parent.owning_roster();
				RosterSource::Inherited { ancestor, roster }
			}
			_ => RosterSource::Owned(RightsRoster::new()),
		};

		Ok(Self {
			inner: Arc::new(PolicyInner {
				id: PolicyId::generate(),
				created_at: Utc::now(),
				state: RwLock::new(PolicyState {
					key: params.key,
					object: params.object,
					owner: params.owner,
					parent: params.parent,
					is_inherited: params.inherited,
					is_extended: params.extended,
					source,
					backup: None,
				}),
			}),
		})
	}

	pub fn id(&self) -> PolicyId {
		self.inner.id
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.inner.created_at
	}

	pub fn owner(&self) -> UserId {
		self.inner.state.read().owner
	}

	pub fn key(&self) -> Option<String> {
		self.inner.state.read().key.clone()
	}

	pub fn object(&self) -> Option<ObjectRef> {
		self.inner.state.read().object.clone()
	}

	pub fn parent(&self) -> Option<AccessPolicy> {
		self.inner.state.read().parent.clone()
	}

	pub fn is_inherited(&self) -> bool {
		self.inner.state.read().is_inherited
	}

	pub fn is_extended(&self) -> bool {
		self.inner.state.read().is_extended
	}

	/// The roster this policy reads and writes. For an inherited policy this
	/// is the owning ancestor's roster, not a copy of it.
	pub fn rights_roster(&self) -> RightsRoster {
		self.inner.state.read().source.roster().clone()
	}

	/// The roster together with its ownership tag.
	pub fn roster_source(&self) -> RosterSource {
		self.inner.state.read().source.clone()
	}

	pub fn has_backup(&self) -> bool {
		self.inner.state.read().backup.is_some()
	}

	/// Re-checks the structural invariants of the current state.
	pub fn validate(&self) -> AuthzResult<()> {
		let state = self.inner.state.read();
		validate_fields(
			state.key.as_deref(),
			state.object.as_ref(),
			state.parent.is_some(),
			state.is_inherited,
			state.is_extended,
		)?;
		if state.is_inherited != matches!(state.source, RosterSource::Inherited { .. }) {
			return Err(AuthzError::RosterModeMismatch);
		}
		Ok(())
	}

	// ------------------------------------------------------------------
	// Access decisions
	// ------------------------------------------------------------------

	/// The subject's effective rights under this policy.
	///
	/// The owner gets [`AccessRight::FULL_ACCESS`] unconditionally. An
	/// inherited policy delegates wholesale to its parent. Everyone else is
	/// the roster summary, ORed with the parent roster's summary when the
	/// policy is extended. Extension reads one hop of roster only, so a
	/// parent's owner override never leaks through it.
	#[instrument(
	    level = "debug",
	    skip(self, subject),
	    fields(policy_id = %self.id(), user_id = %subject.user_id())
	)]
	pub fn user_access(&self, subject: &impl Subject) -> AccessRight {
		let facts = self.facts();
		if subject.user_id() == facts.owner {
			return AccessRight::FULL_ACCESS;
		}
		if facts.is_inherited {
			if let Some(parent) = &facts.parent {
				return parent.user_access(subject);
			}
		}
		let mut rights = facts.roster.summarize(subject);
		if facts.is_extended {
			if let Some(parent) = &facts.parent {
				rights |= parent.rights_roster().summarize(subject);
			}
		}
		rights
	}

	/// Returns true if the subject holds every right in `wanted`.
	#[instrument(
	    level = "debug",
	    skip(self, subject),
	    fields(policy_id = %self.id(), user_id = %subject.user_id(), wanted = %wanted)
	)]
	pub fn has_rights(&self, subject: &impl Subject, wanted: AccessRight) -> bool {
		self.user_access(subject).permits(wanted)
	}

	/// Returns true if the role or group itself holds every right in
	/// `wanted`, independent of any particular user.
	#[instrument(
	    level = "debug",
	    skip(self, group),
	    fields(policy_id = %self.id(), group_id = %group.id(), wanted = %wanted)
	)]
	pub fn has_group_rights(&self, group: &Group, wanted: AccessRight) -> bool {
		self.group_access(group).permits(wanted)
	}

	/// Resolved rights of a role or group under this policy's composition
	/// rules. There is no owner override on this path.
	pub fn group_access(&self, group: &Group) -> AccessRight {
		let facts = self.facts();
		if facts.is_inherited {
			if let Some(parent) = &facts.parent {
				return parent.group_access(group);
			}
		}
		let mut rights = facts.roster.resolve_group_rights(Some(group));
		if facts.is_extended {
			if let Some(parent) = &facts.parent {
				rights |= parent.rights_roster().resolve_group_rights(Some(group));
			}
		}
		rights
	}

	fn facts(&self) -> PolicyFacts {
		let state = self.inner.state.read();
		PolicyFacts {
			owner: state.owner,
			is_inherited: state.is_inherited,
			is_extended: state.is_extended,
			parent: state.parent.clone(),
			roster: state.source.roster().clone(),
		}
	}

	// ------------------------------------------------------------------
	// Privilege-checked writers
	// ------------------------------------------------------------------

	/// Sets the unconditional baseline grant for everyone.
	#[instrument(
	    level = "debug",
	    skip(self, assignor),
	    fields(policy_id = %self.id(), assignor = %assignor.user_id(), rights = %rights)
	)]
	pub fn set_public_rights(
		&self,
		assignor: &impl Subject,
		rights: AccessRight,
	) -> AuthzResult<()> {
		self.with_authorized_roster(assignor, false, rights, |state| {
			state.set(RosterSubject::Everyone, rights)
		})
	}

	/// Sets the explicit entry for a role.
	#[instrument(
	    level = "debug",
	    skip(self, assignor, role),
	    fields(policy_id = %self.id(), assignor = %assignor.user_id(), role_id = %role.id(), rights = %rights)
	)]
	pub fn set_role_rights(
		&self,
		assignor: &impl Subject,
		role: &Group,
		rights: AccessRight,
	) -> AuthzResult<()> {
		expect_kind(role, GroupKind::Role)?;
		self.with_authorized_roster(assignor, false, rights, |state| {
			state.set(RosterSubject::Role(role.id()), rights)
		})
	}

	/// Sets the explicit entry for a group.
	#[instrument(
	    level = "debug",
	    skip(self, assignor, group),
	    fields(policy_id = %self.id(), assignor = %assignor.user_id(), group_id = %group.id(), rights = %rights)
	)]
	pub fn set_group_rights(
		&self,
		assignor: &impl Subject,
		group: &Group,
		rights: AccessRight,
	) -> AuthzResult<()> {
		expect_kind(group, GroupKind::Group)?;
		self.with_authorized_roster(assignor, false, rights, |state| {
			state.set(RosterSubject::Group(group.id()), rights)
		})
	}

	/// Sets a specific user's explicit entry.
	///
	/// Per-user overrides are a delegation of authority, so the assignor must
	/// hold [`AccessRight::MANAGE_RIGHTS`] on top of the rights being
	/// granted.
	#[instrument(
	    level = "debug",
	    skip(self, assignor),
	    fields(policy_id = %self.id(), assignor = %assignor.user_id(), assignee = %assignee, rights = %rights)
	)]
	pub fn set_user_rights(
		&self,
		assignor: &impl Subject,
		assignee: UserId,
		rights: AccessRight,
	) -> AuthzResult<()> {
		self.with_authorized_roster(assignor, true, rights, |state| {
			state.set(RosterSubject::User(assignee), rights)
		})
	}

	/// Removes the assignee's exclusive entry, leaving it subject to whatever
	/// everyone/role/group grants still apply.
	///
	/// Removal is not the same as an explicit zero entry: after an unset the
	/// table has no entry at all. Requires [`AccessRight::MANAGE_RIGHTS`].
	/// Returns whether an entry existed; unsetting an absent entry records
	/// no change.
	#[instrument(
	    level = "debug",
	    skip(self, assignor, assignee),
	    fields(policy_id = %self.id(), assignor = %assignor.user_id())
	)]
	pub fn unset_rights(
		&self,
		assignor: &impl Subject,
		assignee: impl Into<Assignee>,
	) -> AuthzResult<bool> {
		let assignee = assignee.into();
		self.with_authorized_roster(assignor, true, AccessRight::NO_ACCESS, |state| {
			state.unset(assignee.into())
		})
	}

	/// Runs a roster mutation after enforcing the no-escalation rule.
	///
	/// For standalone and extended policies the assignor's own-roster summary
	/// is computed inside the same write section that applies the mutation,
	/// so check and write are atomic with respect to the roster being
	/// changed. An inherited policy's combined value comes from the parent
	/// chain and cannot be summarized under the shared roster's own write
	/// lock, so it is computed up front.
	fn with_authorized_roster<T>(
		&self,
		assignor: &impl Subject,
		needs_manage: bool,
		granting: AccessRight,
		apply: impl FnOnce(&mut RosterState) -> T,
	) -> AuthzResult<T> {
		let facts = self.facts();
		let assignor_id = assignor.user_id();

		// Ownership always wins; the owner needs no grant of its own.
		if assignor_id == facts.owner {
			return Ok(facts.roster.update(apply));
		}

		if facts.is_inherited {
			if let Some(parent) = &facts.parent {
				let allowed = parent.user_access(assignor);
				authorize(assignor_id, allowed, needs_manage, granting)?;
				return Ok(facts.roster.update(apply));
			}
		}

		let baseline = match (&facts.parent, facts.is_extended) {
			(Some(parent), true) => parent.rights_roster().summarize(assignor),
			_ => AccessRight::NO_ACCESS,
		};
		let roles = assignor.roles();
		let groups = assignor.groups();
		facts.roster.update(|state| {
			let allowed = baseline | state.summarize_for(assignor_id, &roles, &groups);
			authorize(assignor_id, allowed, needs_manage, granting)?;
			Ok(apply(state))
		})
	}

	// ------------------------------------------------------------------
	// Backup / restore
	// ------------------------------------------------------------------

	/// Snapshots the full policy value, deep-copying the roster tables.
	///
	/// At most one snapshot may be pending; committing or restoring clears
	/// the slot.
	pub fn create_backup(&self) -> AuthzResult<()> {
		let mut state = self.inner.state.write();
		if state.backup.is_some() {
			return Err(AuthzError::BackupExists);
		}
		let tables = state.source.roster().tables_snapshot();
		state.backup = Some(Box::new(PolicyBackup {
			id: self.inner.id,
			key: state.key.clone(),
			object: state.object.clone(),
			owner: state.owner,
			parent: state.parent.clone(),
			is_inherited: state.is_inherited,
			is_extended: state.is_extended,
			source: state.source.clone(),
			tables,
		}));
		Ok(())
	}

	/// Rolls the policy back to the pending snapshot.
	///
	/// The snapshot is validated and matched against the live policy id
	/// before anything is touched; a failed restore leaves the snapshot in
	/// place. On success every field is overwritten, the roster tables are
	/// restored through the snapshot's own roster handle (preserving chain
	/// identity for inherited policies), the roster change log is cleared,
	/// and the snapshot slot is emptied.
	pub fn restore_backup(&self) -> AuthzResult<()> {
		let mut state = self.inner.state.write();
		let Some(backup) = state.backup.take() else {
			return Err(AuthzError::NoBackup);
		};
		if let Err(error) = validate_backup(&backup) {
			state.backup = Some(backup);
			return Err(error);
		}
		if backup.id != self.inner.id {
			let found = backup.id;
			state.backup = Some(backup);
			return Err(AuthzError::BackupMismatch {
				backup: found,
				live: self.inner.id,
			});
		}

		let PolicyBackup {
			id: _,
			key,
			object,
			owner,
			parent,
			is_inherited,
			is_extended,
			source,
			tables,
		} = *backup;
		source.roster().restore(tables);
		state.key = key;
		state.object = object;
		state.owner = owner;
		state.parent = parent;
		state.is_inherited = is_inherited;
		state.is_extended = is_extended;
		state.source = source;
		Ok(())
	}

	/// Drops the pending snapshot, committing the edits made since it was
	/// taken.
	pub fn discard_backup(&self) -> AuthzResult<()> {
		let mut state = self.inner.state.write();
		if state.backup.take().is_none() {
			return Err(AuthzError::NoBackup);
		}
		Ok(())
	}

	// ------------------------------------------------------------------
	// Reparenting
	// ------------------------------------------------------------------

	/// Links the policy to a new parent, or detaches it.
	///
	/// Rejects self-parenting and any candidate whose ancestor chain already
	/// contains this policy. Detaching is refused while an inheritance mode
	/// is active. For an inherited policy the roster source is re-pointed at
	/// the new parent's owning roster.
	pub fn set_parent(&self, parent: Option<AccessPolicy>) -> AuthzResult<()> {
		// Chain facts are gathered before the local lock; the ancestor walk
		// takes each policy's own lock one at a time.
		let new_source = match &parent {
			Some(candidate) => {
				if candidate.id() == self.id() || candidate.has_ancestor(self.id()) {
					return Err(AuthzError::ParentCycle);
				}
				Some(candidate.owning_roster())
			}
			None => None,
		};

		let mut state = self.inner.state.write();
		if parent.is_none() && (state.is_inherited || state.is_extended) {
			return Err(AuthzError::InheritanceWithoutParent);
		}
		if state.is_inherited {
			if let Some((ancestor, roster)) = new_source {
				state.source = RosterSource::Inherited { ancestor, roster };
			}
		}
		state.parent = parent;
		Ok(())
	}

	/// Returns true if `id` appears anywhere in the parent chain.
	pub fn has_ancestor(&self, id: PolicyId) -> bool {
		let mut current = self.parent();
		while let Some(policy) = current {
			if policy.id() == id {
				return true;
			}
			current = policy.parent();
		}
		false
	}

	/// The policy that owns the roster this one reads, with the roster
	/// handle. Inherited sources are flattened at link time, so a single hop
	/// reaches the owner.
	fn owning_roster(&self) -> (PolicyId, RightsRoster) {
		let state = self.inner.state.read();
		match &state.source {
			RosterSource::Owned(roster) => (self.inner.id, roster.clone()),
			RosterSource::Inherited { ancestor, roster } => (*ancestor, roster.clone()),
		}
	}
}

/// Structural invariants shared by construction, validation, and restore.
fn validate_fields(
	key: Option<&str>,
	object: Option<&ObjectRef>,
	has_parent: bool,
	is_inherited: bool,
	is_extended: bool,
) -> AuthzResult<()> {
	if key.is_none() && object.is_none() {
		return Err(AuthzError::MissingDesignator);
	}
	if let Some(key) = key {
		if !Group::validate_key(key) {
			return Err(AuthzError::InvalidKey(key.to_string()));
		}
	}
	if let Some(object) = object {
		if object.kind.is_empty() {
			return Err(AuthzError::EmptyObjectKind);
		}
	}
	if is_inherited && is_extended {
		return Err(AuthzError::ConflictingInheritance);
	}
	if (is_inherited || is_extended) && !has_parent {
		return Err(AuthzError::InheritanceWithoutParent);
	}
	Ok(())
}

fn validate_backup(backup: &PolicyBackup) -> AuthzResult<()> {
	validate_fields(
		backup.key.as_deref(),
		backup.object.as_ref(),
		backup.parent.is_some(),
		backup.is_inherited,
		backup.is_extended,
	)?;
	if backup.is_inherited != matches!(backup.source, RosterSource::Inherited { .. }) {
		return Err(AuthzError::RosterModeMismatch);
	}
	Ok(())
}

fn expect_kind(group: &Group, expected: GroupKind) -> AuthzResult<()> {
	if group.kind() == expected {
		return Ok(());
	}
	Err(AuthzError::KindMismatch {
		expected,
		actual: group.kind(),
	})
}

/// The no-escalation gate: the assignor must already hold everything being
/// granted, and `MANAGE_RIGHTS` where the operation demands it.
fn authorize(
	assignor: UserId,
	allowed: AccessRight,
	needs_manage: bool,
	granting: AccessRight,
) -> AuthzResult<()> {
	if needs_manage && !allowed.permits(AccessRight::MANAGE_RIGHTS) {
		return Err(AuthzError::ManageRightsRequired { assignor });
	}
	if !allowed.permits(granting) {
		return Err(AuthzError::ExcessRights {
			assignor,
			missing: granting - allowed,
		});
	}
	Ok(())
}
