// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Core identifier and descriptor types for stores and materials.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a store.
///
/// Assigned once at construction from a process-wide counter. Ordering is
/// only used to pick a lock acquisition order during transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct StoreId(pub u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable descriptor of a kind of material.
///
/// Two material types are the same key when every field matches. The
/// default capacity is used whenever a store has no ledger for the type yet.
///
/// # Example
///
/// ```
/// use warehouse_rs::MaterialType;
///
/// let iron = MaterialType::new("Iron", "A metal material", "iron_icon", 1000).unwrap();
/// assert_eq!(iron.name(), "Iron");
/// assert_eq!(iron.default_capacity(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MaterialType {
    name: String,
    description: String,
    icon: String,
    default_capacity: i64,
}

impl MaterialType {
    /// Creates a material type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NegativeQuantity`] if `default_capacity` is negative.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
        default_capacity: i64,
    ) -> Result<Self, StoreError> {
        if default_capacity < 0 {
            return Err(StoreError::NegativeQuantity);
        }
        Ok(Self {
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
            default_capacity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn default_capacity(&self) -> i64 {
        self.default_capacity
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
