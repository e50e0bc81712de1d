//! Inclusion closure engine
//!
//! Expands seed types along the directive edges they carry until no new
//! `(type, directive)` pair appears. The engine never fails: names the
//! catalog cannot resolve become inert members (or are dropped by the
//! interface-only collector) and catalog errors are logged.

use crate::cache::CompileCache;
use crate::catalog::{TypeCatalog, TypeDescriptor, Visibility};
use crate::seeds::Seed;
use likeness_format::names;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Rule that pulls related types into the closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum InclusionDirective {
    /// Immediate subclasses and implementors
    DirectSubtypes,
    /// Immediate superclass and interfaces
    DirectSupertypes,
    /// Every subtype, transitively
    AllSubtypes,
    /// Every supertype, transitively
    AllSupertypes,
    /// Types named in public signatures
    PublicSurface,
    /// Public signature types and all their supertypes
    PublicSurfaceSupertypes,
    /// Public signature types and all their subtypes
    PublicSurfaceSubtypes,
}

impl InclusionDirective {
    /// Every directive
    pub const ALL: [InclusionDirective; 7] = [
        InclusionDirective::DirectSubtypes,
        InclusionDirective::DirectSupertypes,
        InclusionDirective::AllSubtypes,
        InclusionDirective::AllSupertypes,
        InclusionDirective::PublicSurface,
        InclusionDirective::PublicSurfaceSupertypes,
        InclusionDirective::PublicSurfaceSubtypes,
    ];

    /// Name used in marker `including` values
    pub fn marker_name(self) -> &'static str {
        match self {
            InclusionDirective::DirectSubtypes => "DIRECT_SUBTYPES",
            InclusionDirective::DirectSupertypes => "DIRECT_SUPERTYPES",
            InclusionDirective::AllSubtypes => "ALL_SUBTYPES",
            InclusionDirective::AllSupertypes => "ALL_SUPERTYPES",
            InclusionDirective::PublicSurface => "PUBLIC_SURFACE",
            InclusionDirective::PublicSurfaceSupertypes => "PUBLIC_SURFACE_SUPERTYPES",
            InclusionDirective::PublicSurfaceSubtypes => "PUBLIC_SURFACE_SUBTYPES",
        }
    }
}

impl fmt::Display for InclusionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker_name())
    }
}

/// A directive name that matches nothing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown inclusion directive: {0}")]
pub struct UnknownDirective(pub String);

impl FromStr for InclusionDirective {
    type Err = UnknownDirective;

    /// Accepts `ALL_SUBTYPES`, `AllSubtypes`, `all_subtypes`, qualified
    /// forms such as `likeness.Includes.ALL_SUBTYPES`, and the older
    /// `PUBLIC_API*` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let last = s.rsplit('.').next().unwrap_or(s);
        let key: String = last
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let directive = match key.as_str() {
            "directsubtypes" => InclusionDirective::DirectSubtypes,
            "directsupertypes" => InclusionDirective::DirectSupertypes,
            "allsubtypes" => InclusionDirective::AllSubtypes,
            "allsupertypes" => InclusionDirective::AllSupertypes,
            "publicsurface" | "publicapi" => InclusionDirective::PublicSurface,
            "publicsurfacesupertypes" | "publicapisupertypes" => {
                InclusionDirective::PublicSurfaceSupertypes
            }
            "publicsurfacesubtypes" | "publicapisubtypes" => {
                InclusionDirective::PublicSurfaceSubtypes
            }
            _ => return Err(UnknownDirective(s.to_owned())),
        };
        Ok(directive)
    }
}

impl TryFrom<String> for InclusionDirective {
    type Error = UnknownDirective;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which types a collector admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    /// Classes and interfaces
    Reflective,
    /// Interfaces only; supertype edges follow interfaces only
    Proxy,
}

/// Types requiring generated support, with the directives that pulled them in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosureSet {
    members: BTreeMap<String, BTreeSet<InclusionDirective>>,
}

impl ClosureSet {
    /// Whether `name` is a member
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Directives that caused `name` to be included (empty for plain seeds)
    pub fn directives(&self, name: &str) -> Option<&BTreeSet<InclusionDirective>> {
        self.members.get(name)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Whether every member of `other` is also a member here
    pub fn includes_all(&self, other: &ClosureSet) -> bool {
        other.names().all(|name| self.contains(name))
    }

    fn add_member(&mut self, name: &str) {
        self.members.entry(name.to_owned()).or_default();
    }

    fn record(&mut self, name: &str, directive: InclusionDirective) {
        self.members
            .entry(name.to_owned())
            .or_default()
            .insert(directive);
    }
}

/// Computes closures for one collector kind
pub struct ClosureEngine<'a> {
    catalog: &'a dyn TypeCatalog,
    kind: CollectorKind,
}

impl<'a> ClosureEngine<'a> {
    /// Engine over `catalog`
    pub fn new(catalog: &'a dyn TypeCatalog, kind: CollectorKind) -> Self {
        Self { catalog, kind }
    }

    /// Expand `seeds` to a fixpoint
    pub fn compute<'s>(
        &self,
        seeds: impl IntoIterator<Item = &'s Seed>,
        cache: &mut CompileCache,
    ) -> ClosureSet {
        let mut set = ClosureSet::default();
        let mut queue: VecDeque<(String, InclusionDirective)> = VecDeque::new();
        let mut visited: FxHashSet<(String, InclusionDirective)> = FxHashSet::default();

        for seed in seeds {
            let Some(name) = normalize(&seed.type_name) else {
                continue;
            };
            if !self.admits_seed(name, cache) {
                continue;
            }
            set.add_member(name);
            for &directive in &seed.directives {
                if visited.insert((name.to_owned(), directive)) {
                    queue.push_back((name.to_owned(), directive));
                }
            }
        }

        while let Some((name, directive)) = queue.pop_front() {
            let (neighbours, follow_up) = match directive {
                InclusionDirective::DirectSubtypes => (self.subtypes(&name), None),
                InclusionDirective::DirectSupertypes => (self.supertypes(&name, cache), None),
                InclusionDirective::AllSubtypes => {
                    (self.subtypes(&name), Some(InclusionDirective::AllSubtypes))
                }
                InclusionDirective::AllSupertypes => (
                    self.supertypes(&name, cache),
                    Some(InclusionDirective::AllSupertypes),
                ),
                InclusionDirective::PublicSurface => (self.surface(&name, cache), None),
                InclusionDirective::PublicSurfaceSupertypes => (
                    self.surface(&name, cache),
                    Some(InclusionDirective::AllSupertypes),
                ),
                InclusionDirective::PublicSurfaceSubtypes => (
                    self.surface(&name, cache),
                    Some(InclusionDirective::AllSubtypes),
                ),
            };

            for neighbour in neighbours {
                self.include(&neighbour, directive, &mut set, cache);
                if let Some(next) = follow_up {
                    if visited.insert((neighbour.clone(), next)) {
                        queue.push_back((neighbour, next));
                    }
                }
            }
        }

        log::debug!(
            "{:?} closure: {} types from {} pairs",
            self.kind,
            set.len(),
            visited.len()
        );
        set
    }

    fn resolve(&self, name: &str, cache: &mut CompileCache) -> Option<Arc<TypeDescriptor>> {
        match cache.describe(self.catalog, name) {
            Ok(Some(desc)) => Some(desc),
            Ok(None) => {
                log::debug!("Type {name} is not in the catalog");
                None
            }
            Err(e) => {
                log::warn!("Failed to describe {name}: {e}");
                None
            }
        }
    }

    fn admits_seed(&self, name: &str, cache: &mut CompileCache) -> bool {
        match self.kind {
            CollectorKind::Reflective => true,
            CollectorKind::Proxy => match self.resolve(name, cache) {
                Some(desc) if !desc.is_interface() => {
                    log::warn!("{name} is marked as a proxy target but is not an interface");
                    false
                }
                // Unresolved seeds may still resolve against a class library later.
                _ => true,
            },
        }
    }

    fn include(
        &self,
        name: &str,
        directive: InclusionDirective,
        set: &mut ClosureSet,
        cache: &mut CompileCache,
    ) {
        match self.kind {
            CollectorKind::Reflective => set.record(name, directive),
            CollectorKind::Proxy => {
                if self
                    .resolve(name, cache)
                    .is_some_and(|desc| desc.is_interface())
                {
                    set.record(name, directive);
                }
            }
        }
    }

    fn supertypes(&self, name: &str, cache: &mut CompileCache) -> Vec<String> {
        let Some(desc) = self.resolve(name, cache) else {
            return Vec::new();
        };
        let edges: Vec<&str> = match self.kind {
            CollectorKind::Reflective => desc.supertypes().collect(),
            CollectorKind::Proxy => desc.interfaces.iter().map(String::as_str).collect(),
        };
        edges.into_iter().filter_map(normalize).map(str::to_owned).collect()
    }

    fn subtypes(&self, name: &str) -> Vec<String> {
        match self.catalog.direct_subtypes(name) {
            Ok(subtypes) => subtypes
                .iter()
                .filter_map(|s| normalize(s))
                .map(str::to_owned)
                .collect(),
            Err(e) => {
                log::warn!("Failed to list subtypes of {name}: {e}");
                Vec::new()
            }
        }
    }

    fn surface(&self, name: &str, cache: &mut CompileCache) -> Vec<String> {
        let Some(desc) = self.resolve(name, cache) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for ctor in desc.constructors.iter().filter(|c| c.visibility == Visibility::Public) {
            for param in &ctor.parameters {
                param.shape.collect_named(&mut found);
            }
            for thrown in &ctor.throws {
                thrown.collect_named(&mut found);
            }
        }
        for method in desc.methods.iter().filter(|m| m.visibility == Visibility::Public) {
            for param in &method.parameters {
                param.shape.collect_named(&mut found);
            }
            method.returns.collect_named(&mut found);
            for thrown in &method.throws {
                thrown.collect_named(&mut found);
            }
        }
        for field in desc.fields.iter().filter(|f| f.visibility == Visibility::Public) {
            field.shape.collect_named(&mut found);
        }

        let mut seen = FxHashSet::default();
        found
            .into_iter()
            .filter_map(|n| normalize(&n).map(str::to_owned))
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }
}

/// Strip array dimensions; primitives and blank names have no element type
fn normalize(name: &str) -> Option<&str> {
    let (element, _) = names::strip_array(name.trim());
    if element.is_empty() || names::is_primitive(element) {
        None
    } else {
        Some(element)
    }
}

/// Whether a closure member gets generated code
///
/// Blank names, primitives, array names and types outside any package are
/// excluded.
pub fn should_generate(name: &str) -> bool {
    !name.trim().is_empty()
        && !names::is_primitive(name)
        && !names::is_array(name)
        && name.contains('.')
}
