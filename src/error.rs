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

//! Error types for ledger, store and transfer operations.

use thiserror::Error;

/// Failures raised by material operations.
///
/// Every variant is a validation outcome: the operation that returned it
/// left all ledgers it touched unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A quantity or capacity argument was below zero
    #[error("quantity must not be negative")]
    NegativeQuantity,

    /// The ledger has less free space than requested
    #[error("not enough space for material: {0}")]
    InsufficientCapacity(String),

    /// The ledger holds less than requested
    #[error("insufficient quantity of material: {0}")]
    InsufficientQuantity(String),

    /// Capacity may only grow
    #[error("new capacity {requested} must be greater than current capacity {current}")]
    CapacityMustIncrease { current: i64, requested: i64 },

    /// The store has no ledger for the material
    #[error("material not found: {0}")]
    MaterialNotFound(String),

    /// Source and destination resolve to the same ledger
    #[error("cannot transfer material {0} within the same store")]
    SelfTransfer(String),
}
