//! Table Catalog
//!
//! Schema metadata: table name → (id, column families, state).
//!
//! ## Locking
//! ```text
//!   tables: RwLock<name → Arc<Mutex<Option<TableDescriptor>>>>
//!                               │
//!                               └─ per-table lock, held for the whole
//!                                  operation on that table
//!   persisted: Mutex<CatalogFile>  ── taken after a table lock, only
//!                                     while writing catalog.json
//! ```
//! Operations on different tables only meet at the persist lock, which is
//! never held while waiting on anything else. The map lock is never held
//! while waiting on a table lock.
//!
//! Every change is written to disk before it becomes visible in memory. If
//! the write fails the in-memory state is left untouched.

mod persist;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::cell::validate_family_name;
use crate::error::{Result, StoreError};

use persist::CatalogFile;

// =============================================================================
// Table descriptors
// =============================================================================

/// Lifecycle state of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableState {
    Enabled,
    Disabled,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableState::Enabled => write!(f, "enabled"),
            TableState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Schema and state of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Store-wide id, never reused after a drop
    pub id: u64,
    pub name: String,
    pub families: BTreeSet<String>,
    pub state: TableState,
}

impl TableDescriptor {
    pub fn has_family(&self, family: &str) -> bool {
        self.families.contains(family)
    }

    pub fn is_enabled(&self) -> bool {
        self.state == TableState::Enabled
    }

    /// Family names in ascending order
    pub fn family_names(&self) -> Vec<String> {
        self.families.iter().cloned().collect()
    }
}

/// Table names: non-empty, ASCII letters, digits, `_`, `-` and `.`, not
/// starting with `.`
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if name.is_empty() || name.starts_with('.') || !valid_chars {
        return Err(StoreError::InvalidArgument(format!(
            "invalid table name {:?}",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

type TableSlot = Arc<Mutex<Option<TableDescriptor>>>;

/// Durable registry of tables
pub struct Catalog {
    path: PathBuf,

    /// Name → slot. A slot holding `None` is a table being created that
    /// has not been persisted yet, or one that was just dropped.
    tables: RwLock<BTreeMap<String, TableSlot>>,

    /// Last state written to disk
    persisted: Mutex<CatalogFile>,
}

impl Catalog {
    /// Load the catalog at `path`, creating an empty one if absent
    pub fn open(path: &Path) -> Result<Self> {
        let file = CatalogFile::load(path)?;
        if !path.exists() {
            file.store(path)?;
        }

        let tables = file
            .tables
            .values()
            .map(|desc| (desc.name.clone(), Arc::new(Mutex::new(Some(desc.clone())))))
            .collect();

        tracing::debug!(
            "Catalog loaded from {}: {} table(s)",
            path.display(),
            file.tables.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            tables: RwLock::new(tables),
            persisted: Mutex::new(file),
        })
    }

    /// Register a new, enabled table
    ///
    /// Of two concurrent creates with the same name exactly one succeeds;
    /// the other gets `TableAlreadyExists`.
    pub fn create_table<I, S>(&self, name: &str, families: I) -> Result<TableDescriptor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_table_name(name)?;
        let families: BTreeSet<String> = families.into_iter().map(Into::into).collect();
        if families.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "table '{}' needs at least one column family",
                name
            )));
        }
        for family in &families {
            validate_family_name(family)?;
        }

        // Claim the name with a locked, empty slot
        let slot: TableSlot = Arc::new(Mutex::new(None));
        let mut guard = slot.lock();
        {
            let mut tables = self.tables.write();
            if tables.contains_key(name) {
                return Err(StoreError::TableAlreadyExists(name.to_string()));
            }
            tables.insert(name.to_string(), Arc::clone(&slot));
        }

        let persisted = self.persist(|file| {
            let desc = TableDescriptor {
                id: file.next_table_id,
                name: name.to_string(),
                families: families.clone(),
                state: TableState::Enabled,
            };
            file.next_table_id += 1;
            file.tables.insert(name.to_string(), desc.clone());
            desc
        });

        match persisted {
            Ok(desc) => {
                *guard = Some(desc.clone());
                tracing::info!(
                    "Created table '{}' (id {}) with families {:?}",
                    name,
                    desc.id,
                    desc.families
                );
                Ok(desc)
            }
            Err(e) => {
                self.release_slot(name, &slot);
                Err(e)
            }
        }
    }

    /// Current descriptor of `name`
    pub fn describe(&self, name: &str) -> Result<TableDescriptor> {
        let slot = self.slot(name)?;
        let guard = slot.lock();
        guard
            .clone()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    /// Names of all tables, ascending
    pub fn list(&self) -> Vec<String> {
        self.descriptors().into_iter().map(|d| d.name).collect()
    }

    /// Descriptors of all tables, ordered by name
    pub fn descriptors(&self) -> Vec<TableDescriptor> {
        let slots: Vec<TableSlot> = self.tables.read().values().cloned().collect();
        slots.iter().filter_map(|slot| slot.lock().clone()).collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.describe(name).is_ok()
    }

    pub fn enable(&self, name: &str) -> Result<()> {
        self.transition(name, TableState::Enabled)
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        self.transition(name, TableState::Disabled)
    }

    /// Remove a disabled table; returns its last descriptor
    pub fn drop_table(&self, name: &str) -> Result<TableDescriptor> {
        let slot = self.slot(name)?;
        let mut guard = slot.lock();
        let desc = guard
            .clone()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;
        if desc.is_enabled() {
            return Err(StoreError::TableEnabled(name.to_string()));
        }

        self.persist(|file| {
            file.tables.remove(name);
        })?;
        *guard = None;
        self.release_slot(name, &slot);

        tracing::info!("Dropped table '{}' (id {})", name, desc.id);
        Ok(desc)
    }

    /// Add a column family to a disabled table
    pub fn add_family(&self, name: &str, family: &str) -> Result<TableDescriptor> {
        validate_family_name(family)?;
        self.update(name, |desc| {
            if desc.is_enabled() {
                return Err(StoreError::TableEnabled(name.to_string()));
            }
            if !desc.families.insert(family.to_string()) {
                return Err(StoreError::FamilyAlreadyExists {
                    table: name.to_string(),
                    family: family.to_string(),
                });
            }
            Ok(())
        })
    }

    /// Remove a column family from a disabled table
    ///
    /// A table always keeps at least one family.
    pub fn remove_family(&self, name: &str, family: &str) -> Result<TableDescriptor> {
        self.update(name, |desc| {
            if desc.is_enabled() {
                return Err(StoreError::TableEnabled(name.to_string()));
            }
            if !desc.has_family(family) {
                return Err(StoreError::InvalidFamily {
                    table: name.to_string(),
                    family: family.to_string(),
                });
            }
            if desc.families.len() == 1 {
                return Err(StoreError::InvalidArgument(format!(
                    "cannot remove '{}', the last family of table '{}'",
                    family, name
                )));
            }
            desc.families.remove(family);
            Ok(())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn transition(&self, name: &str, target: TableState) -> Result<()> {
        self.update(name, |desc| {
            if desc.state == target {
                return Err(StoreError::InvalidStateTransition {
                    table: name.to_string(),
                    state: target,
                });
            }
            desc.state = target;
            Ok(())
        })?;
        tracing::info!("Table '{}' is now {}", name, target);
        Ok(())
    }

    /// Apply `change` to a copy of the descriptor, persist it, then publish
    fn update<F>(&self, name: &str, change: F) -> Result<TableDescriptor>
    where
        F: FnOnce(&mut TableDescriptor) -> Result<()>,
    {
        let slot = self.slot(name)?;
        let mut guard = slot.lock();
        let mut desc = guard
            .clone()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;

        change(&mut desc)?;

        self.persist(|file| {
            file.tables.insert(name.to_string(), desc.clone());
        })?;
        *guard = Some(desc.clone());
        Ok(desc)
    }

    /// Run `change` on a copy of the catalog file and write it out; the
    /// copy replaces the persisted state only if the write succeeds
    fn persist<F, R>(&self, change: F) -> Result<R>
    where
        F: FnOnce(&mut CatalogFile) -> R,
    {
        let mut persisted = self.persisted.lock();
        let mut next = persisted.clone();
        let result = change(&mut next);
        next.store(&self.path)?;
        *persisted = next;
        Ok(result)
    }

    fn slot(&self, name: &str) -> Result<TableSlot> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    /// Remove `name` from the map if it still points at `slot`
    fn release_slot(&self, name: &str, slot: &TableSlot) {
        let mut tables = self.tables.write();
        if tables.get(name).map_or(false, |s| Arc::ptr_eq(s, slot)) {
            tables.remove(name);
        }
    }
}
