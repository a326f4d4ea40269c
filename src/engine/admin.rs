//! Admin Interface
//!
//! Schema and lifecycle operations. Catalog changes go through here so the
//! engine can attach the runtime side: creating the table's storage,
//! draining mutations on disable, deleting segments on drop.

use crate::catalog::TableDescriptor;
use crate::error::Result;

use super::EngineInner;

/// Handle returned by [`Engine::admin`](super::Engine::admin)
pub struct Admin<'a> {
    inner: &'a EngineInner,
}

impl<'a> Admin<'a> {
    pub(super) fn new(inner: &'a EngineInner) -> Self {
        Self { inner }
    }

    /// Names of all tables, ascending
    pub fn list_tables(&self) -> Vec<String> {
        self.inner.catalog().list()
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.inner.catalog().exists(name)
    }

    /// Create an enabled table with the given families
    ///
    /// Fails with `TableAlreadyExists` if the name is taken, or
    /// `InvalidArgument` for an empty family set or invalid names.
    pub fn create_table(&self, name: &str, families: &[&str]) -> Result<TableDescriptor> {
        self.inner.create_table(name, families)
    }

    pub fn describe_table(&self, name: &str) -> Result<TableDescriptor> {
        self.inner.catalog().describe(name)
    }

    pub fn enable_table(&self, name: &str) -> Result<()> {
        self.inner.catalog().enable(name)
    }

    /// Disable a table
    ///
    /// Waits for mutations already admitted to finish; none are admitted
    /// once this has started.
    pub fn disable_table(&self, name: &str) -> Result<()> {
        self.inner.disable_table(name)
    }

    pub fn is_table_enabled(&self, name: &str) -> Result<bool> {
        Ok(self.inner.catalog().describe(name)?.is_enabled())
    }

    /// Drop a disabled table and delete its data
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.inner.drop_table(name)
    }

    /// Add a family; the table must be disabled
    pub fn add_family(&self, name: &str, family: &str) -> Result<TableDescriptor> {
        self.inner.catalog().add_family(name, family)
    }

    /// Remove a family; the table must be disabled
    ///
    /// Existing cells of the family are masked, so adding the family back
    /// later starts it empty.
    pub fn remove_family(&self, name: &str, family: &str) -> Result<()> {
        self.inner.remove_family(name, family)
    }
}
