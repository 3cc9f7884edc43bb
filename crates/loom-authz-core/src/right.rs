// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access-right bitmask.
//!
//! Rights are single bits combined with bitwise OR. There is no deny bit:
//! rights only accumulate, and "no access" is simply the absence of every
//! grant. [`AccessRight::FULL_ACCESS`] is the complement of zero rather than
//! the union of the named bits, so rights added in later releases are already
//! covered by previously stored full-access grants.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
	/// Operations a subject may be granted on a protected object.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
	pub struct AccessRight: u64 {
		/// See the object and read its contents.
		const VIEW          = 1 << 0;
		/// Create child objects.
		const CREATE        = 1 << 1;
		/// Modify the object.
		const CHANGE        = 1 << 2;
		/// Delete the object.
		const DELETE        = 1 << 3;
		/// Duplicate the object.
		const COPY          = 1 << 4;
		/// Relocate the object.
		const MOVE          = 1 << 5;
		/// Grant or revoke rights held by specific users.
		const MANAGE_RIGHTS = 1 << 6;
	}
}

impl AccessRight {
	/// No rights at all.
	pub const NO_ACCESS: Self = Self::empty();

	/// Every right, present and future (all bits set, not just the named ones).
	pub const FULL_ACCESS: Self = Self::from_bits_retain(!0);

	/// Returns true if every right in `wanted` is present in `self`.
	///
	/// # Example
	///
	/// ```
	/// use loom_authz_core::AccessRight;
	///
	/// let held = AccessRight::VIEW | AccessRight::CHANGE;
	/// assert!(held.permits(AccessRight::VIEW));
	/// assert!(!held.permits(AccessRight::VIEW | AccessRight::DELETE));
	/// ```
	#[must_use]
	pub fn permits(self, wanted: Self) -> bool {
		self.contains(wanted)
	}

	/// Returns a human-readable list of the named rights present.
	#[must_use]
	pub fn names(self) -> Vec<&'static str> {
		let mut names = Vec::new();
		if self.contains(Self::VIEW) {
			names.push("VIEW");
		}
		if self.contains(Self::CREATE) {
			names.push("CREATE");
		}
		if self.contains(Self::CHANGE) {
			names.push("CHANGE");
		}
		if self.contains(Self::DELETE) {
			names.push("DELETE");
		}
		if self.contains(Self::COPY) {
			names.push("COPY");
		}
		if self.contains(Self::MOVE) {
			names.push("MOVE");
		}
		if self.contains(Self::MANAGE_RIGHTS) {
			names.push("MANAGE_RIGHTS");
		}
		names
	}
}

impl fmt::Display for AccessRight {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names = self.names();
		if names.is_empty() {
			write!(f, "(none)")
		} else {
			write!(f, "{}", names.join(" | "))
		}
	}
}
