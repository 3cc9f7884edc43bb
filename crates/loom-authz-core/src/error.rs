// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the authorization engine.
//!
//! Every fallible operation returns [`AuthzResult`]. The engine never logs or
//! recovers internally; each failure is returned to the caller carrying the
//! precondition that failed, and no mutation is partially applied on error.

use thiserror::Error;

use crate::right::AccessRight;
use crate::types::{GroupId, GroupKind, PolicyId, UserId};

pub type AuthzResult<T> = Result<T, AuthzError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
	// Structural invariant violations
	#[error("policy has no designator (key or object)")]
	MissingDesignator,

	#[error("invalid key '{0}'")]
	InvalidKey(String),

	#[error("object kind must not be empty")]
	EmptyObjectKind,

	#[error("policy cannot be both inherited and extended")]
	ConflictingInheritance,

	#[error("inheritance requires a parent policy")]
	InheritanceWithoutParent,

	#[error("roster ownership does not match the inherited flag")]
	RosterModeMismatch,

	// Privilege violations
	#[error("assignor {assignor} does not hold the rights being granted (missing {missing})")]
	ExcessRights {
		assignor: UserId,
		missing: AccessRight,
	},

	#[error("assignor {assignor} does not hold manage_rights")]
	ManageRightsRequired { assignor: UserId },

	// Kind mismatches
	#[error("expected a group of kind {expected}, got {actual}")]
	KindMismatch {
		expected: GroupKind,
		actual: GroupKind,
	},

	// Not found
	#[error("group {0} is not registered")]
	GroupNotFound(GroupId),

	#[error("parent group {0} is not registered")]
	ParentNotFound(GroupId),

	#[error("no backup to restore")]
	NoBackup,

	// Conflicts
	#[error("a {kind} with key '{key}' already exists")]
	DuplicateKey { kind: GroupKind, key: String },

	#[error("a backup is already pending")]
	BackupExists,

	#[error("backup belongs to policy {backup}, not {live}")]
	BackupMismatch { backup: PolicyId, live: PolicyId },

	#[error("parent chain would form a cycle")]
	ParentCycle,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn excess_rights_names_missing_bits() {
		let err = AuthzError::ExcessRights {
			assignor: UserId::generate(),
			missing: AccessRight::DELETE,
		};
		assert!(err.to_string().contains("missing DELETE"));
	}

	#[test]
	fn kind_mismatch_names_both_kinds() {
		let err = AuthzError::KindMismatch {
			expected: GroupKind::Role,
			actual: GroupKind::Group,
		};
		assert_eq!(err.to_string(), "expected a group of kind role, got group");
	}

	#[test]
	fn duplicate_key_names_kind_and_key() {
		let err = AuthzError::DuplicateKey {
			kind: GroupKind::Group,
			key: "staff".to_string(),
		};
		assert_eq!(err.to_string(), "a group with key 'staff' already exists");
	}
}
