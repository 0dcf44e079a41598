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

//! Named storage units.
//!
//! A [`Store`] maps each [`MaterialType`] it has ever been asked to hold to a
//! [`MaterialLedger`]. Ledgers are created lazily on first use with the
//! material's default capacity.
//!
//! # Thread Safety
//!
//! Ledgers live in a [`DashMap`] so first-touch creation is atomic: concurrent
//! callers always end up sharing one ledger per material. The map entry is
//! released before a ledger lock is taken, so no thread ever blocks on a
//! ledger while holding a shard of the map.

use crate::ledger::{MaterialLedger, MaterialSnapshot};
use crate::observer::{ObserverRegistry, StoreObserver};
use crate::{MaterialType, StoreError, StoreId, TransferCoordinator};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Next id handed out by [`Store::new`]. Starts at 0, bumped once per store.
static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

/// A storage unit holding bounded quantities of several materials.
///
/// # Example
///
/// ```
/// use warehouse_rs::{MaterialType, Store};
///
/// let iron = MaterialType::new("Iron", "A metal material", "iron_icon", 1000).unwrap();
/// let a = Store::new();
/// let b = Store::new();
///
/// a.add_material(&iron, 500).unwrap();
/// assert_eq!(a.put_to(&b, &iron, 200).unwrap(), 200);
/// assert_eq!(a.quantity(&iron), 300);
/// assert_eq!(b.quantity(&iron), 200);
/// ```
#[derive(Debug)]
pub struct Store {
    id: StoreId,
    ledgers: DashMap<MaterialType, Arc<MaterialLedger>>,
    observers: ObserverRegistry,
}

impl Store {
    /// Creates an empty store with a fresh id.
    pub fn new() -> Self {
        Store {
            id: StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed)),
            ledgers: DashMap::new(),
            observers: ObserverRegistry::new(),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Returns the held quantity, or 0 if the material was never stored.
    pub fn quantity(&self, material: &MaterialType) -> i64 {
        self.ledger(material).map_or(0, |ledger| ledger.quantity())
    }

    /// Returns free space, or the material's default capacity if no ledger exists.
    pub fn available_space(&self, material: &MaterialType) -> i64 {
        self.ledger(material)
            .map_or(material.default_capacity(), |ledger| ledger.available_space())
    }

    /// Returns a copy of the ledger for `material`, if any.
    pub fn material(&self, material: &MaterialType) -> Option<MaterialSnapshot> {
        self.ledger(material).map(|ledger| ledger.snapshot())
    }

    /// Returns copies of every ledger in the store.
    pub fn materials(&self) -> Vec<MaterialSnapshot> {
        self.ledger_handles()
            .iter()
            .map(|ledger| ledger.snapshot())
            .collect()
    }

    /// Adds `quantity` units, creating the ledger if needed.
    ///
    /// Observers receive `on_added(material, quantity)` after the ledger lock
    /// is released.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NegativeQuantity`] if `quantity < 0`.
    /// - [`StoreError::InsufficientCapacity`] if the units do not fit.
    pub fn add_material(&self, material: &MaterialType, quantity: i64) -> Result<i64, StoreError> {
        // Reject before creating so a failed first add leaves no ledger behind.
        if !self.can_put(material, quantity)? {
            return Err(StoreError::InsufficientCapacity(material.name().to_owned()));
        }
        let ledger = self.ledger_or_create(material);
        let new_quantity = ledger.lock().put(quantity)?;
        trace!(store = %self.id, %material, quantity, new_quantity, "material added");
        self.observers.notify_added(material, quantity);
        Ok(new_quantity)
    }

    /// Removes `quantity` units.
    ///
    /// # Errors
    ///
    /// - [`StoreError::MaterialNotFound`] if the store has no ledger for `material`.
    /// - [`StoreError::NegativeQuantity`] if `quantity < 0`.
    /// - [`StoreError::InsufficientQuantity`] if fewer units are held.
    pub fn remove_material(
        &self,
        material: &MaterialType,
        quantity: i64,
    ) -> Result<i64, StoreError> {
        let ledger = self.existing_ledger(material)?;
        let new_quantity = ledger.lock().take(quantity)?;
        trace!(store = %self.id, %material, quantity, new_quantity, "material removed");
        self.observers.notify_removed(material, quantity);
        Ok(new_quantity)
    }

    /// Returns whether `quantity` more units would fit.
    ///
    /// # Errors
    ///
    /// [`StoreError::NegativeQuantity`] if `quantity < 0`.
    pub fn can_put(&self, material: &MaterialType, quantity: i64) -> Result<bool, StoreError> {
        match self.ledger(material) {
            Some(ledger) => ledger.can_put(quantity),
            None if quantity < 0 => Err(StoreError::NegativeQuantity),
            None => Ok(material.default_capacity() >= quantity),
        }
    }

    /// Returns whether at least `quantity` units are held.
    ///
    /// # Errors
    ///
    /// [`StoreError::NegativeQuantity`] if `quantity < 0`.
    pub fn can_take(&self, material: &MaterialType, quantity: i64) -> Result<bool, StoreError> {
        match self.ledger(material) {
            Some(ledger) => ledger.can_take(quantity),
            None if quantity < 0 => Err(StoreError::NegativeQuantity),
            None => Ok(false),
        }
    }

    /// Zeroes every ledger. Capacities are kept and observers are not notified.
    pub fn empty_all_materials(&self) {
        for ledger in self.ledger_handles() {
            ledger.empty();
        }
    }

    /// Discards every ledger, so default capacities apply again.
    pub fn empty_store(&self) {
        self.ledgers.clear();
        debug!(store = %self.id, "store emptied");
    }

    /// Zeroes one ledger.
    ///
    /// # Errors
    ///
    /// [`StoreError::MaterialNotFound`] if the store has no ledger for `material`.
    pub fn empty_material(&self, material: &MaterialType) -> Result<(), StoreError> {
        self.existing_ledger(material)?.empty();
        Ok(())
    }

    /// Raises the capacity for `material` and returns it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::MaterialNotFound`] if the store has no ledger for `material`.
    /// - [`StoreError::CapacityMustIncrease`] unless `new_capacity` is larger.
    pub fn increase_capacity(
        &self,
        material: &MaterialType,
        new_capacity: i64,
    ) -> Result<i64, StoreError> {
        self.existing_ledger(material)?.increase_capacity(new_capacity)
    }

    /// Moves up to `quantity` units from this store to `destination`.
    ///
    /// See [`TransferCoordinator::transfer`].
    pub fn put_to(
        &self,
        destination: &Store,
        material: &MaterialType,
        quantity: i64,
    ) -> Result<i64, StoreError> {
        TransferCoordinator::transfer(self, destination, material, quantity)
    }

    /// Moves everything currently held of `material` to `destination`.
    ///
    /// The quantity is read before the transfer starts; concurrent changes in
    /// between may shrink what is actually moved.
    pub fn put_all_to(&self, destination: &Store, material: &MaterialType) -> Result<i64, StoreError> {
        TransferCoordinator::transfer(self, destination, material, self.quantity(material))
    }

    /// Moves up to `quantity` units from `source` into this store.
    pub fn take_from(
        &self,
        source: &Store,
        material: &MaterialType,
        quantity: i64,
    ) -> Result<i64, StoreError> {
        TransferCoordinator::transfer(source, self, material, quantity)
    }

    /// Moves everything `source` currently holds of `material` into this store.
    pub fn take_all_from(&self, source: &Store, material: &MaterialType) -> Result<i64, StoreError> {
        TransferCoordinator::transfer(source, self, material, source.quantity(material))
    }

    /// Registers an observer. Returns `false` if it was already registered.
    pub fn register_observer(&self, observer: Arc<dyn StoreObserver>) -> bool {
        self.observers.register(observer)
    }

    /// Unregisters an observer. Returns `false` if it was not registered.
    pub fn unregister_observer(&self, observer: &Arc<dyn StoreObserver>) -> bool {
        self.observers.unregister(observer)
    }

    pub(crate) fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub(crate) fn ledger(&self, material: &MaterialType) -> Option<Arc<MaterialLedger>> {
        self.ledgers.get(material).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn existing_ledger(
        &self,
        material: &MaterialType,
    ) -> Result<Arc<MaterialLedger>, StoreError> {
        self.ledger(material)
            .ok_or_else(|| StoreError::MaterialNotFound(material.name().to_owned()))
    }

    /// Returns the ledger for `material`, creating an empty one if absent.
    ///
    /// Creation happens under the map entry lock, so racing callers get the
    /// same instance.
    pub(crate) fn ledger_or_create(&self, material: &MaterialType) -> Arc<MaterialLedger> {
        if let Some(ledger) = self.ledger(material) {
            return ledger;
        }
        let ledger = self
            .ledgers
            .entry(material.clone())
            .or_insert_with(|| {
                debug!(store = %self.id, %material, capacity = material.default_capacity(), "ledger created");
                Arc::new(MaterialLedger::new(material.clone()))
            });
        Arc::clone(ledger.value())
    }

    fn ledger_handles(&self) -> Vec<Arc<MaterialLedger>> {
        self.ledgers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iron() -> MaterialType {
        MaterialType::new("Iron", "A metal material", "iron_icon", 1000).unwrap()
    }

    #[test]
    fn ids_increase_per_store() {
        let first = Store::new();
        let second = Store::new();
        assert!(second.id() > first.id());
    }

    #[test]
    fn ledger_or_create_returns_same_instance() {
        let store = Store::new();
        let a = store.ledger_or_create(&iron());
        let b = store.ledger_or_create(&iron());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.ledgers.len(), 1);
    }

    #[test]
    fn failed_first_add_creates_no_ledger() {
        let store = Store::new();
        let result = store.add_material(&iron(), 1001);
        assert_eq!(result, Err(StoreError::InsufficientCapacity("Iron".into())));
        assert_eq!(store.add_material(&iron(), -1), Err(StoreError::NegativeQuantity));
        assert!(store.material(&iron()).is_none());
    }

    #[test]
    fn empty_store_drops_ledgers() {
        let store = Store::new();
        store.add_material(&iron(), 10).unwrap();
        store.increase_capacity(&iron(), 5000).unwrap();
        store.empty_store();
        assert!(store.ledger(&iron()).is_none());
        assert_eq!(store.available_space(&iron()), 1000);
    }
}
