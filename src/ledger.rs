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

//! Bounded per-material counters.
//!
//! A [`MaterialLedger`] tracks how much of one material a store holds and how
//! much it may hold. Each ledger owns its own lock; it is the unit of mutual
//! exclusion for every mutation in the crate.
//!
//! # Example
//!
//! ```
//! use warehouse_rs::{MaterialLedger, MaterialType};
//!
//! let iron = MaterialType::new("Iron", "A metal material", "iron_icon", 1000).unwrap();
//! let ledger = MaterialLedger::new(iron);
//! assert_eq!(ledger.put(250).unwrap(), 250);
//! assert_eq!(ledger.available_space(), 750);
//! ```

use crate::{MaterialType, StoreError};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

/// Ledger state guarded by the ledger lock.
///
/// Failed calls return before touching any field, so `0 <= quantity <= capacity`
/// holds after every call.
#[derive(Debug)]
pub(crate) struct LedgerData {
    material: MaterialType,
    capacity: i64,
    quantity: i64,
}

impl LedgerData {
    fn new(material: MaterialType, capacity: i64) -> Self {
        Self {
            material,
            capacity,
            quantity: 0,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.quantity >= 0,
            "Invariant violated: quantity went negative: {}",
            self.quantity
        );
        debug_assert!(
            self.quantity <= self.capacity,
            "Invariant violated: quantity {} exceeds capacity {}",
            self.quantity,
            self.capacity
        );
    }

    pub(crate) fn quantity(&self) -> i64 {
        self.quantity
    }

    pub(crate) fn available_space(&self) -> i64 {
        self.capacity - self.quantity
    }

    pub(crate) fn can_put(&self, quantity: i64) -> Result<bool, StoreError> {
        if quantity < 0 {
            return Err(StoreError::NegativeQuantity);
        }
        Ok(self.available_space() >= quantity)
    }

    pub(crate) fn can_take(&self, quantity: i64) -> Result<bool, StoreError> {
        if quantity < 0 {
            return Err(StoreError::NegativeQuantity);
        }
        Ok(self.quantity >= quantity)
    }

    /// Adds to the quantity, returning the new quantity.
    pub(crate) fn put(&mut self, quantity: i64) -> Result<i64, StoreError> {
        if !self.can_put(quantity)? {
            return Err(StoreError::InsufficientCapacity(self.material.name().to_owned()));
        }
        self.quantity += quantity;
        self.assert_invariants();
        Ok(self.quantity)
    }

    /// Removes from the quantity, returning the new quantity.
    pub(crate) fn take(&mut self, quantity: i64) -> Result<i64, StoreError> {
        if !self.can_take(quantity)? {
            return Err(StoreError::InsufficientQuantity(self.material.name().to_owned()));
        }
        self.quantity -= quantity;
        self.assert_invariants();
        Ok(self.quantity)
    }

    fn increase_capacity(&mut self, new_capacity: i64) -> Result<i64, StoreError> {
        if new_capacity <= self.capacity {
            return Err(StoreError::CapacityMustIncrease {
                current: self.capacity,
                requested: new_capacity,
            });
        }
        self.capacity = new_capacity;
        self.assert_invariants();
        Ok(self.capacity)
    }

    fn empty(&mut self) {
        self.quantity = 0;
    }

    fn snapshot(&self) -> MaterialSnapshot {
        MaterialSnapshot {
            material: self.material.clone(),
            capacity: self.capacity,
            quantity: self.quantity,
        }
    }
}

/// Point-in-time copy of a ledger.
///
/// Detached from the live ledger: later mutations of either side are not
/// visible to the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialSnapshot {
    pub material: MaterialType,
    pub capacity: i64,
    pub quantity: i64,
}

impl MaterialSnapshot {
    /// Returns `capacity - quantity`.
    pub fn available_space(&self) -> i64 {
        self.capacity - self.quantity
    }
}

/// Bounded counter for one material inside one store.
#[derive(Debug)]
pub struct MaterialLedger {
    inner: Mutex<LedgerData>,
}

impl MaterialLedger {
    /// Creates an empty ledger sized to the material's default capacity.
    pub fn new(material: MaterialType) -> Self {
        let capacity = material.default_capacity();
        Self {
            inner: Mutex::new(LedgerData::new(material, capacity)),
        }
    }

    /// Creates an empty ledger with an explicit capacity.
    ///
    /// # Errors
    ///
    /// [`StoreError::NegativeQuantity`] if `capacity < 0`.
    pub fn with_capacity(material: MaterialType, capacity: i64) -> Result<Self, StoreError> {
        if capacity < 0 {
            return Err(StoreError::NegativeQuantity);
        }
        Ok(Self {
            inner: Mutex::new(LedgerData::new(material, capacity)),
        })
    }

    pub fn material(&self) -> MaterialType {
        self.inner.lock().material.clone()
    }

    pub fn quantity(&self) -> i64 {
        self.inner.lock().quantity
    }

    pub fn capacity(&self) -> i64 {
        self.inner.lock().capacity
    }

    /// Returns `capacity - quantity`, read under a single lock acquisition.
    pub fn available_space(&self) -> i64 {
        self.inner.lock().available_space()
    }

    /// Returns whether `quantity` more units fit.
    ///
    /// # Errors
    ///
    /// [`StoreError::NegativeQuantity`] if `quantity < 0`.
    pub fn can_put(&self, quantity: i64) -> Result<bool, StoreError> {
        self.inner.lock().can_put(quantity)
    }

    /// Returns whether at least `quantity` units are held.
    ///
    /// # Errors
    ///
    /// [`StoreError::NegativeQuantity`] if `quantity < 0`.
    pub fn can_take(&self, quantity: i64) -> Result<bool, StoreError> {
        self.inner.lock().can_take(quantity)
    }

    /// Adds `quantity` units and returns the new quantity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NegativeQuantity`] if `quantity < 0`.
    /// - [`StoreError::InsufficientCapacity`] if the units do not fit.
    pub fn put(&self, quantity: i64) -> Result<i64, StoreError> {
        self.inner.lock().put(quantity)
    }

    /// Removes `quantity` units and returns the new quantity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NegativeQuantity`] if `quantity < 0`.
    /// - [`StoreError::InsufficientQuantity`] if fewer units are held.
    pub fn take(&self, quantity: i64) -> Result<i64, StoreError> {
        self.inner.lock().take(quantity)
    }

    /// Raises the capacity and returns it.
    ///
    /// # Errors
    ///
    /// [`StoreError::CapacityMustIncrease`] unless `new_capacity` exceeds the
    /// current capacity.
    pub fn increase_capacity(&self, new_capacity: i64) -> Result<i64, StoreError> {
        self.inner.lock().increase_capacity(new_capacity)
    }

    /// Zeroes the quantity. Capacity is kept.
    pub fn empty(&self) {
        self.inner.lock().empty();
    }

    pub fn snapshot(&self) -> MaterialSnapshot {
        self.inner.lock().snapshot()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, LedgerData> {
        self.inner.lock()
    }
}
