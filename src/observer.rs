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

//! Change notification for stores.
//!
//! Consumers implement [`StoreObserver`] and register a handle with a store.
//! Every successful add or remove on that store, including the ones performed
//! by a transfer, is reported synchronously on the calling thread.

use crate::MaterialType;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;

/// Receives quantity change notifications from a store.
pub trait StoreObserver: Send + Sync {
    /// `quantity` units of `material` were added.
    fn on_added(&self, material: &MaterialType, quantity: i64);

    /// `quantity` units of `material` were removed.
    fn on_removed(&self, material: &MaterialType, quantity: i64);
}

/// A set of observer handles.
///
/// Handles are compared by identity (the `Arc` allocation), so registering
/// the same handle twice is a no-op. Notification order is unspecified.
pub(crate) struct ObserverRegistry {
    observers: DashMap<usize, Arc<dyn StoreObserver>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            observers: DashMap::new(),
        }
    }

    fn key(observer: &Arc<dyn StoreObserver>) -> usize {
        Arc::as_ptr(observer) as *const () as usize
    }

    /// Adds a handle. Returns `false` if it was already registered.
    pub(crate) fn register(&self, observer: Arc<dyn StoreObserver>) -> bool {
        match self.observers.entry(Self::key(&observer)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(observer);
                true
            }
        }
    }

    /// Removes a handle. Returns `false` if it was not registered.
    pub(crate) fn unregister(&self, observer: &Arc<dyn StoreObserver>) -> bool {
        self.observers.remove(&Self::key(observer)).is_some()
    }

    pub(crate) fn notify_added(&self, material: &MaterialType, quantity: i64) {
        for observer in self.handles() {
            observer.on_added(material, quantity);
        }
    }

    pub(crate) fn notify_removed(&self, material: &MaterialType, quantity: i64) {
        for observer in self.handles() {
            observer.on_removed(material, quantity);
        }
    }

    // Callbacks run outside the map's shard locks so an observer may
    // (un)register handles on the same store.
    fn handles(&self) -> Vec<Arc<dyn StoreObserver>> {
        self.observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}
