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

//! Moving material between stores.
//!
//! A transfer touches two ledgers, one per store. Both locks are held while
//! the source is checked and both quantities change, so no other thread ever
//! sees material that has left the source but not yet reached the
//! destination.
//!
//! # Lock Ordering
//!
//! Every transfer locks the ledger of the store with the larger [`StoreId`]
//! first, whichever direction the material flows. Two transfers that need
//! the same pair of ledgers therefore always request them in the same order,
//! which rules out circular waits.
//!
//! [`StoreId`]: crate::StoreId

use crate::ledger::{LedgerData, MaterialLedger};
use crate::{MaterialType, Store, StoreError};
use parking_lot::MutexGuard;
use tracing::debug;

/// Both ledger guards of a transfer, held in canonical order.
///
/// Fields drop in declaration order, so `second` is released before `first`.
struct OrderedGuards<'a> {
    second: MutexGuard<'a, LedgerData>,
    first: MutexGuard<'a, LedgerData>,
    source_first: bool,
}

impl<'a> OrderedGuards<'a> {
    fn acquire(
        source: &Store,
        source_ledger: &'a MaterialLedger,
        destination: &Store,
        destination_ledger: &'a MaterialLedger,
    ) -> Self {
        if source.id() > destination.id() {
            let first = source_ledger.lock();
            let second = destination_ledger.lock();
            OrderedGuards {
                second,
                first,
                source_first: true,
            }
        } else {
            let first = destination_ledger.lock();
            let second = source_ledger.lock();
            OrderedGuards {
                second,
                first,
                source_first: false,
            }
        }
    }

    fn split(&mut self) -> (&mut LedgerData, &mut LedgerData) {
        if self.source_first {
            (&mut *self.first, &mut *self.second)
        } else {
            (&mut *self.second, &mut *self.first)
        }
    }
}

/// Stateless two-store transfer protocol.
pub struct TransferCoordinator;

impl TransferCoordinator {
    /// Moves up to `quantity` units of `material` from `source` to `destination`
    /// and returns how many units moved.
    ///
    /// If the destination has less free space than requested, only what fits
    /// is moved; that is not an error. A destination ledger is created with
    /// the material's default capacity if it does not exist yet. A request of
    /// zero returns immediately without locking or notifying anyone.
    ///
    /// Source observers receive `on_removed` and destination observers
    /// `on_added` with the moved amount, after both locks are released.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NegativeQuantity`] if `quantity < 0`.
    /// - [`StoreError::MaterialNotFound`] if `source` never held `material`.
    /// - [`StoreError::SelfTransfer`] if `source` and `destination` are the same store.
    /// - [`StoreError::InsufficientQuantity`] if `source` holds less than `quantity`.
    ///
    /// Nothing is mutated when an error is returned, except that a source
    /// drained by another thread between the early check and the locked
    /// check may leave an empty destination ledger behind.
    pub fn transfer(
        source: &Store,
        destination: &Store,
        material: &MaterialType,
        quantity: i64,
    ) -> Result<i64, StoreError> {
        if quantity < 0 {
            return Err(StoreError::NegativeQuantity);
        }
        if quantity == 0 {
            return Ok(0);
        }

        let source_ledger = source.existing_ledger(material)?;
        if source.id() == destination.id() {
            debug!(store = %source.id(), %material, quantity, "self transfer rejected");
            return Err(StoreError::SelfTransfer(material.name().to_owned()));
        }
        // Fail before creating the destination ledger; re-checked under both locks.
        if !source_ledger.can_take(quantity)? {
            debug!(source = %source.id(), %material, quantity, "transfer rejected");
            return Err(StoreError::InsufficientQuantity(material.name().to_owned()));
        }
        let destination_ledger = destination.ledger_or_create(material);

        let moved = {
            let mut guards =
                OrderedGuards::acquire(source, &source_ledger, destination, &destination_ledger);
            let (from, to) = guards.split();

            if !from.can_take(quantity)? {
                debug!(
                    source = %source.id(),
                    destination = %destination.id(),
                    %material,
                    quantity,
                    held = from.quantity(),
                    "transfer rejected"
                );
                return Err(StoreError::InsufficientQuantity(material.name().to_owned()));
            }

            let moved = quantity.min(to.available_space());
            from.take(moved)?;
            to.put(moved)?;
            moved
        };

        debug!(
            source = %source.id(),
            destination = %destination.id(),
            %material,
            requested = quantity,
            moved,
            "transfer completed"
        );
        source.observers().notify_removed(material, moved);
        destination.observers().notify_added(material, moved);
        Ok(moved)
    }
}
