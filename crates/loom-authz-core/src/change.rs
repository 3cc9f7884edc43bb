// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Change records for roster mutations.
//!
//! Every successful roster mutation appends one [`RosterChange`]; external
//! persistence drains the log via `RightsRoster::take_changes` and writes the
//! deltas. The records are the only artifact this engine produces for
//! durability.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::right::AccessRight;
use crate::types::{GroupId, UserId};

/// What a roster mutation did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
	/// A new entry was written.
	Created,
	/// An existing entry (or the everyone baseline) was overwritten.
	Updated,
	/// An entry was removed outright.
	Deleted,
}

impl fmt::Display for ChangeAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChangeAction::Created => write!(f, "created"),
			ChangeAction::Updated => write!(f, "updated"),
			ChangeAction::Deleted => write!(f, "deleted"),
		}
	}
}

/// The roster entry a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RosterSubject {
	/// The unconditional baseline grant.
	Everyone,
	/// A role-table entry.
	Role(GroupId),
	/// A group-table entry.
	Group(GroupId),
	/// A user-table entry.
	User(UserId),
}

impl fmt::Display for RosterSubject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RosterSubject::Everyone => write!(f, "everyone"),
			RosterSubject::Role(id) => write!(f, "role:{id}"),
			RosterSubject::Group(id) => write!(f, "group:{id}"),
			RosterSubject::User(id) => write!(f, "user:{id}"),
		}
	}
}

/// One roster mutation, in the order it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterChange {
	pub action: ChangeAction,
	pub subject: RosterSubject,
	/// The rights now in effect for the subject; [`AccessRight::NO_ACCESS`]
	/// for deletions.
	pub rights: AccessRight,
}

impl RosterChange {
	pub fn created(subject: RosterSubject, rights: AccessRight) -> Self {
		Self {
			action: ChangeAction::Created,
			subject,
			rights,
		}
	}

	pub fn updated(subject: RosterSubject, rights: AccessRight) -> Self {
		Self {
			action: ChangeAction::Updated,
			subject,
			rights,
		}
	}

	pub fn deleted(subject: RosterSubject) -> Self {
		Self {
			action: ChangeAction::Deleted,
			subject,
			rights: AccessRight::NO_ACCESS,
		}
	}
}
