// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for the authorization engine.
//!
//! This module defines the foundational types used throughout the engine:
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs for different entity types
//!   ([`UserId`], [`GroupId`], [`PolicyId`], [`ObjectId`]) preventing accidental mixing
//! - **Group kinds**: The two disjoint hierarchy kinds ([`GroupKind`])
//!
//! All ID types implement transparent serde serialization (as UUID strings) and
//! provide conversion to/from [`uuid::Uuid`]. UUIDs are the single identifier
//! scheme for subjects, groups, policies, and protected objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(GroupId, "Unique identifier for a role or group.");
define_id_type!(PolicyId, "Unique identifier for an access policy.");
define_id_type!(ObjectId, "Unique identifier for a protected object.");

// =============================================================================
// Group Kinds
// =============================================================================

/// The two disjoint kinds of hierarchy nodes.
///
/// A parent edge never crosses kinds: a role's parent is a role, a group's
/// parent is a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
	/// A role held by users (e.g. "manager"), resolved against the role table.
	Role,
	/// A plain membership group, resolved against the group table.
	Group,
}

impl GroupKind {
	/// Returns all available group kinds.
	pub fn all() -> &'static [GroupKind] {
		&[GroupKind::Role, GroupKind::Group]
	}
}

impl fmt::Display for GroupKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GroupKind::Role => write!(f, "role"),
			GroupKind::Group => write!(f, "group"),
		}
	}
}
