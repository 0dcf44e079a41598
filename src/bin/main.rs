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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use warehouse_rs::{MaterialType, Store, StoreError, StoreObserver};

/// Warehouse - Apply material operations to a set of stores
///
/// Reads material types and an operation list from CSV files, applies the
/// operations and writes the final state of every store to stdout.
#[derive(Parser, Debug)]
#[command(name = "warehouse-rs")]
#[command(about = "Applies material operations from CSV to in-memory stores", long_about = None)]
struct Args {
    /// Path to CSV file with material types
    ///
    /// Expected format: name,description,icon,default_capacity
    #[arg(short, long, value_name = "FILE")]
    materials: PathBuf,

    /// Path to CSV file with operations
    ///
    /// Expected format: op,store,material,quantity,target
    /// Example: cargo run -- --materials materials.csv ops.csv > stores.csv
    #[arg(value_name = "FILE")]
    operations: PathBuf,

    /// Number of worker threads applying operations
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Log every transfer and ledger creation
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let catalog = match open(&args.materials).and_then(|file| Ok(load_catalog(file)?)) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Error loading materials '{}': {}", args.materials.display(), e);
            process::exit(1);
        }
    };

    let mut stores = Stores::new();
    let operations = match open(&args.operations)
        .and_then(|file| Ok(read_operations(file, &catalog, &mut stores)?))
    {
        Ok(operations) => operations,
        Err(e) => {
            error!("Error reading operations '{}': {}", args.operations.display(), e);
            process::exit(1);
        }
    };

    if apply_operations(operations, args.workers).is_err() {
        error!("A worker thread panicked");
        process::exit(1);
    }

    if let Err(e) = write_stores(&stores, std::io::stdout()) {
        error!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open(path: &Path) -> Result<BufReader<File>, Box<dyn std::error::Error>> {
    Ok(BufReader::new(File::open(path)?))
}

/// Material types indexed by name.
type Catalog = HashMap<String, MaterialType>;

/// Stores indexed by the label used in the operations file.
type Stores = BTreeMap<u32, Arc<Store>>;

/// Raw CSV record of the materials file.
#[derive(Debug, Deserialize)]
struct MaterialRecord {
    name: String,
    description: String,
    icon: String,
    default_capacity: i64,
}

/// Loads material types. Invalid rows are logged and skipped.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the header is unreadable.
fn load_catalog<R: Read>(reader: R) -> Result<Catalog, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let mut catalog = Catalog::new();
    for result in rdr.deserialize::<MaterialRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed material row: {}", e);
                continue;
            }
        };
        match MaterialType::new(
            record.name.clone(),
            record.description,
            record.icon,
            record.default_capacity,
        ) {
            Ok(material) => {
                catalog.insert(record.name, material);
            }
            Err(e) => warn!("Skipping material {}: {}", record.name, e),
        }
    }
    Ok(catalog)
}

/// Logs every notification of the store it is registered with.
struct LoggingObserver {
    store: u32,
}

impl StoreObserver for LoggingObserver {
    fn on_added(&self, material: &MaterialType, quantity: i64) {
        info!(store = self.store, %material, quantity, "material added");
    }

    fn on_removed(&self, material: &MaterialType, quantity: i64) {
        info!(store = self.store, %material, quantity, "material removed");
    }
}

/// A parsed operation bound to its stores.
#[derive(Debug)]
enum Operation {
    Add {
        store: Arc<Store>,
        material: MaterialType,
        quantity: i64,
    },
    Remove {
        store: Arc<Store>,
        material: MaterialType,
        quantity: i64,
    },
    Transfer {
        source: Arc<Store>,
        destination: Arc<Store>,
        material: MaterialType,
        quantity: i64,
    },
    TransferAll {
        source: Arc<Store>,
        destination: Arc<Store>,
        material: MaterialType,
    },
    EmptyMaterial {
        store: Arc<Store>,
        material: MaterialType,
    },
    EmptyAll {
        store: Arc<Store>,
    },
    EmptyStore {
        store: Arc<Store>,
    },
    IncreaseCapacity {
        store: Arc<Store>,
        material: MaterialType,
        capacity: i64,
    },
}

impl Operation {
    /// Runs the operation, returning the resulting quantity, moved amount or
    /// capacity depending on the kind.
    fn apply(&self) -> Result<i64, StoreError> {
        match self {
            Self::Add {
                store,
                material,
                quantity,
            } => store.add_material(material, *quantity),
            Self::Remove {
                store,
                material,
                quantity,
            } => store.remove_material(material, *quantity),
            Self::Transfer {
                source,
                destination,
                material,
                quantity,
            } => source.put_to(destination, material, *quantity),
            Self::TransferAll {
                source,
                destination,
                material,
            } => source.put_all_to(destination, material),
            Self::EmptyMaterial { store, material } => store.empty_material(material).map(|_| 0),
            Self::EmptyAll { store } => {
                store.empty_all_materials();
                Ok(0)
            }
            Self::EmptyStore { store } => {
                store.empty_store();
                Ok(0)
            }
            Self::IncreaseCapacity {
                store,
                material,
                capacity,
            } => store.increase_capacity(material, *capacity),
        }
    }
}

/// Raw CSV record matching the operations format.
///
/// Fields: `op, store, material, quantity, target`
#[derive(Debug, Deserialize)]
struct OperationRecord {
    op: String,
    store: u32,
    #[serde(default)]
    material: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    quantity: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    target: Option<u32>,
}

impl OperationRecord {
    /// Converts the record to an [`Operation`], creating its stores on first sight.
    ///
    /// Returns `None` for unknown kinds, unknown materials or missing fields;
    /// no store is created for such rows.
    fn into_operation(self, catalog: &Catalog, stores: &mut Stores) -> Option<Operation> {
        let material = || {
            let found = catalog.get(&self.material).cloned();
            if found.is_none() {
                warn!("Unknown material '{}'", self.material);
            }
            found
        };

        let operation = match self.op.to_lowercase().as_str() {
            "add" => Operation::Add {
                material: material()?,
                quantity: self.quantity?,
                store: store_for(stores, self.store),
            },
            "remove" => Operation::Remove {
                material: material()?,
                quantity: self.quantity?,
                store: store_for(stores, self.store),
            },
            "transfer" => {
                let (material, quantity, target) = (material()?, self.quantity?, self.target?);
                Operation::Transfer {
                    source: store_for(stores, self.store),
                    destination: store_for(stores, target),
                    material,
                    quantity,
                }
            }
            "transfer_all" => {
                let (material, target) = (material()?, self.target?);
                Operation::TransferAll {
                    source: store_for(stores, self.store),
                    destination: store_for(stores, target),
                    material,
                }
            }
            "empty_material" => Operation::EmptyMaterial {
                material: material()?,
                store: store_for(stores, self.store),
            },
            "empty_all" => Operation::EmptyAll {
                store: store_for(stores, self.store),
            },
            "empty_store" => Operation::EmptyStore {
                store: store_for(stores, self.store),
            },
            "increase_capacity" => Operation::IncreaseCapacity {
                material: material()?,
                capacity: self.quantity?,
                store: store_for(stores, self.store),
            },
            _ => return None,
        };
        Some(operation)
    }
}

/// Returns the store for `label`, creating it with a logging observer if new.
fn store_for(stores: &mut Stores, label: u32) -> Arc<Store> {
    Arc::clone(stores.entry(label).or_insert_with(|| {
        let store = Store::new();
        store.register_observer(Arc::new(LoggingObserver { store: label }));
        info!(label, id = %store.id(), "store created");
        Arc::new(store)
    }))
}

/// Parses operations from a CSV reader.
///
/// Malformed rows and invalid operations are logged and skipped. Every store
/// label referenced by a valid row gets a store in `stores`, created in file
/// order; labels already present are reused.
///
/// # CSV Format
///
/// Expected columns: `op, store, material, quantity, target`
/// - `op`: add, remove, transfer, transfer_all, empty_material, empty_all,
///   empty_store or increase_capacity
/// - `store`: Store label (source store for transfers)
/// - `material`: Material name from the catalog (blank for empty_all/empty_store)
/// - `quantity`: Units, or the new capacity for increase_capacity
/// - `target`: Destination store label for transfers
///
/// # Example
///
/// ```csv
/// op,store,material,quantity,target
/// add,0,Iron,500,
/// transfer,0,Iron,200,1
/// empty_all,1,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
fn read_operations<R: Read>(
    reader: R,
    catalog: &Catalog,
    stores: &mut Stores,
) -> Result<Vec<Operation>, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " add "
        .flexible(true) // Allow trailing optional columns to be missing
        .has_headers(true)
        .from_reader(reader);

    let mut operations = Vec::new();
    for (row, result) in rdr.deserialize::<OperationRecord>().enumerate() {
        match result {
            Ok(record) => match record.into_operation(catalog, stores) {
                Some(operation) => operations.push(operation),
                None => warn!("Skipping invalid operation at row {}", row + 1),
            },
            Err(e) => warn!("Skipping malformed row: {}", e),
        }
    }
    Ok(operations)
}

/// Applies operations on a pool of `workers` threads.
///
/// Operations are handed out in file order through a shared channel; with a
/// single worker they run strictly sequentially. Failing operations are
/// logged and do not stop processing.
///
/// # Errors
///
/// Returns `Err` if a worker thread panicked.
fn apply_operations(operations: Vec<Operation>, workers: usize) -> std::thread::Result<()> {
    let (sender, receiver) = crossbeam::channel::unbounded::<Operation>();
    for operation in operations {
        if sender.send(operation).is_err() {
            break;
        }
    }
    drop(sender);

    crossbeam::thread::scope(|scope| {
        for worker in 0..workers.max(1) {
            let receiver = receiver.clone();
            scope.spawn(move |_| {
                for operation in receiver.iter() {
                    if let Err(e) = operation.apply() {
                        warn!(worker, "Skipping {:?}: {}", operation, e);
                    }
                }
            });
        }
    })
}

/// Output row of the store state dump.
#[derive(Debug, Serialize)]
struct StateRow<'a> {
    store: u32,
    material: &'a str,
    quantity: i64,
    capacity: i64,
}

/// Writes every ledger of every store as CSV.
///
/// # CSV Format
///
/// Columns: `store, material, quantity, capacity`, ordered by store label
/// then material name.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_stores<W: Write>(stores: &Stores, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for (label, store) in stores {
        let mut materials = store.materials();
        materials.sort_by(|a, b| a.material.name().cmp(b.material.name()));
        for snapshot in &materials {
            wtr.serialize(StateRow {
                store: *label,
                material: snapshot.material.name(),
                quantity: snapshot.quantity,
                capacity: snapshot.capacity,
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}
