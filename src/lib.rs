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

//! # Warehouse
//!
//! This library tracks bounded quantities of materials held in stores and
//! moves material between stores under concurrent access.
//!
//! ## Core Components
//!
//! - [`Store`]: A storage unit with one ledger per material and an observer set
//! - [`MaterialLedger`]: Bounded `(capacity, quantity)` counter with its own lock
//! - [`TransferCoordinator`]: Deadlock-free two-ledger transfer protocol
//! - [`StoreObserver`]: Callback capability notified on every add and remove
//! - [`StoreError`]: Error types for every failing operation
//!
//! ## Example
//!
//! ```
//! use warehouse_rs::{MaterialType, Store, TransferCoordinator};
//!
//! let iron = MaterialType::new("Iron", "A metal material", "iron_icon", 1000).unwrap();
//! let copper = MaterialType::new("Copper", "Another metal material", "copper_icon", 1000).unwrap();
//!
//! let a = Store::new();
//! let b = Store::new();
//! a.add_material(&iron, 500).unwrap();
//! a.add_material(&copper, 700).unwrap();
//!
//! assert_eq!(TransferCoordinator::transfer(&a, &b, &iron, 200).unwrap(), 200);
//! assert_eq!(TransferCoordinator::transfer(&a, &b, &copper, 300).unwrap(), 300);
//! assert_eq!(a.quantity(&iron), 300);
//! assert_eq!(b.quantity(&copper), 300);
//! ```
//!
//! ## Thread Safety
//!
//! Operations on one ledger are serialized by that ledger's lock; different
//! ledgers proceed in parallel. Transfers take two ledger locks in an order
//! derived from store ids, so any number of threads may transfer between any
//! stores without deadlocking.

mod base;
pub mod error;
pub mod ledger;
pub mod observer;
mod store;
mod transfer;

pub use base::{MaterialType, StoreId};
pub use error::StoreError;
pub use ledger::{MaterialLedger, MaterialSnapshot};
pub use observer::StoreObserver;
pub use store::Store;
pub use transfer::TransferCoordinator;
