//! Per-run compilation cache

use crate::catalog::{CatalogError, TypeCatalog, TypeDescriptor};
use crate::compiler::CompileOutcome;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Memoized catalog lookups and compile results for one generation run
///
/// Created by the caller and passed by reference to each component, so
/// two runs never share state.
#[derive(Debug, Default)]
pub struct CompileCache {
    descriptors: FxHashMap<String, Option<Arc<TypeDescriptor>>>,
    outcomes: FxHashMap<String, CompileOutcome>,
}

impl CompileCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe `name` through `catalog`, remembering the answer
    ///
    /// Errors are not cached.
    pub fn describe(
        &mut self,
        catalog: &dyn TypeCatalog,
        name: &str,
    ) -> Result<Option<Arc<TypeDescriptor>>, CatalogError> {
        if let Some(known) = self.descriptors.get(name) {
            return Ok(known.clone());
        }
        let described = catalog.describe(name)?;
        self.descriptors.insert(name.to_owned(), described.clone());
        Ok(described)
    }

    /// Previously stored compile outcome for `name`
    pub fn outcome(&self, name: &str) -> Option<&CompileOutcome> {
        self.outcomes.get(name)
    }

    pub(crate) fn store_outcome(&mut self, name: &str, outcome: CompileOutcome) {
        self.outcomes.insert(name.to_owned(), outcome);
    }

    /// Number of memoized descriptor lookups
    pub fn described_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Number of memoized compile outcomes
    pub fn compiled_count(&self) -> usize {
        self.outcomes.len()
    }
}
