//! Registry unit
//!
//! One unit over all generated types. Its `for_name` routine is a lookup
//! switch from type name to a link index; `links[i]` names the type's code
//! unit and `i` is also the type's position in the embedded metadata blob.

use likeness_format::names::{PROVIDER_SERVICE, REGISTRY_UNIT};
use likeness_format::{
    CodeUnit, LookupTable, MetadataBlob, Routine, RoutineBody, RoutineKind, UnitKind,
};
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Errors building the registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two units serve the same type
    #[error("Type {0} is generated twice")]
    DuplicateType(String),

    /// A unit is not a type unit
    #[error("Unit {0} is not a type unit")]
    NotATypeUnit(String),
}

/// Build the registry over `units` and embed `metadata`
///
/// `units[i]` must correspond to entry `i` of the blob; each unit's
/// `entry_index` is set accordingly.
pub fn build_registry(
    units: &mut [CodeUnit],
    metadata: MetadataBlob,
) -> Result<CodeUnit, RegistryError> {
    let mut seen = FxHashSet::default();
    for unit in units.iter() {
        if unit.kind != UnitKind::Type {
            return Err(RegistryError::NotATypeUnit(unit.name.clone()));
        }
        if !seen.insert(unit.target.as_str()) {
            return Err(RegistryError::DuplicateType(unit.target.clone()));
        }
    }

    let table = LookupTable::build(
        units
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit.target.as_str(), i as u32)),
    );

    let mut registry = CodeUnit::new(REGISTRY_UNIT, PROVIDER_SERVICE, UnitKind::Registry);
    registry.links = units.iter().map(|unit| unit.name.clone()).collect();
    registry.routines.push(Routine {
        kind: RoutineKind::ForName,
        body: RoutineBody::LookupSwitch(table),
    });
    registry.metadata = Some(metadata.into_bytes());

    for (i, unit) in units.iter_mut().enumerate() {
        unit.entry_index = Some(i as u32);
    }
    log::debug!("Registry covers {} types", registry.links.len());
    Ok(registry)
}
