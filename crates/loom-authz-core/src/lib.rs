// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embeddable authorization engine for Loom.
//!
//! This crate decides, for any (subject, protected object) pair, which
//! operations the subject may perform. It has no I/O of its own: services
//! embed it, look up policies however they store them, and persist the
//! change records it emits.
//!
//! # Overview
//!
//! The authorization model supports:
//! - Named single-bit access rights with a forward-compatible full-access
//!   sentinel
//! - Role and group hierarchies with nearest-ancestor rights fallback
//! - Per-policy rights rosters covering everyone, roles, groups, and
//!   individual users
//! - Inherited policies that share an ancestor's roster by identity, and
//!   extended policies that OR a parent's grants into their own
//! - Privilege-checked mutations that rule out escalation
//! - Backup/restore envelopes and append-only change tracking
//!
//! # Example
//!
//! ```
//! use loom_authz_core::{AccessPolicy, AccessRight, PolicyParams, SubjectAttrs, UserId};
//!
//! # fn main() -> loom_authz_core::AuthzResult<()> {
//! // The owner implicitly holds full access
//! let owner = UserId::generate();
//! let policy = AccessPolicy::new(PolicyParams::new(owner).with_key("billing_reports"))?;
//!
//! // Grants go through the privilege-checked writers
//! policy.set_public_rights(&SubjectAttrs::new(owner), AccessRight::VIEW)?;
//!
//! let visitor = SubjectAttrs::new(UserId::generate());
//! assert!(policy.has_rights(&visitor, AccessRight::VIEW));
//! assert!(!policy.has_rights(&visitor, AccessRight::DELETE));
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod error;
pub mod group;
pub mod policy;
pub mod registry;
pub mod right;
pub mod roster;
pub mod subject;
pub mod types;

pub use change::{ChangeAction, RosterChange, RosterSubject};
pub use error::{AuthzError, AuthzResult};
pub use group::Group;
pub use policy::{AccessPolicy, Assignee, ObjectRef, PolicyParams, RosterSource};
pub use registry::GroupRegistry;
pub use right::AccessRight;
pub use roster::RightsRoster;
pub use subject::{Subject, SubjectAttrs};
pub use types::{GroupId, GroupKind, ObjectId, PolicyId, UserId};

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	// Property-based tests for end-to-end grant resolution
	proptest! {
		#[test]
		fn public_grants_reach_any_subject(bits: u64) {
			let rights = AccessRight::from_bits_retain(bits);
			let owner = UserId::generate();
			let policy = AccessPolicy::new(PolicyParams::new(owner).with_key("shared_docs"))
				.unwrap();

			policy
				.set_public_rights(&SubjectAttrs::new(owner), rights)
				.unwrap();

			let visitor = SubjectAttrs::new(UserId::generate());
			prop_assert_eq!(policy.user_access(&visitor), rights);
		}

		#[test]
		fn role_grants_reach_registered_members(bits: u64) {
			let rights = AccessRight::from_bits_retain(bits);
			let registry = GroupRegistry::new();
			let manager = registry
				.create(GroupKind::Role, "manager", "Manager", None)
				.unwrap();
			let member = UserId::generate();
			manager.add_member(member);

			let owner = UserId::generate();
			let policy = AccessPolicy::new(PolicyParams::new(owner).with_key("shared_docs"))
				.unwrap();
			policy
				.set_role_rights(&SubjectAttrs::new(owner), &manager, rights)
				.unwrap();

			prop_assert_eq!(policy.user_access(&registry.subject_attrs(member)), rights);

			let outsider = registry.subject_attrs(UserId::generate());
			prop_assert_eq!(policy.user_access(&outsider), AccessRight::NO_ACCESS);
		}
	}

	// Property-based tests for the no-escalation rule
	proptest! {
		#[test]
		fn public_grant_succeeds_iff_the_assignor_holds_it(held: u64, granting: u64) {
			let held = AccessRight::from_bits_retain(held);
			let granting = AccessRight::from_bits_retain(granting);

			let owner = UserId::generate();
			let policy = AccessPolicy::new(PolicyParams::new(owner).with_key("shared_docs"))
				.unwrap();
			let assignor = UserId::generate();
			policy
				.set_user_rights(&SubjectAttrs::new(owner), assignor, held)
				.unwrap();

			let result = policy.set_public_rights(&SubjectAttrs::new(assignor), granting);
			prop_assert_eq!(result.is_ok(), held.permits(granting));
		}
	}

	// Property-based tests for backup round-trips
	proptest! {
		#[test]
		fn restore_returns_to_the_snapshotted_grants(before: u64, after: u64) {
			let before = AccessRight::from_bits_retain(before);
			let after = AccessRight::from_bits_retain(after);

			let owner = UserId::generate();
			let policy = AccessPolicy::new(PolicyParams::new(owner).with_key("shared_docs"))
				.unwrap();
			let assignor = SubjectAttrs::new(owner);

			policy.set_public_rights(&assignor, before).unwrap();
			policy.create_backup().unwrap();
			policy.set_public_rights(&assignor, after).unwrap();

			policy.restore_backup().unwrap();
			prop_assert_eq!(policy.rights_roster().everyone(), before);
			prop_assert!(policy.rights_roster().changes().is_empty());
		}
	}
}
