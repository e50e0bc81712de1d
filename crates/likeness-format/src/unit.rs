//! Code unit format
//!
//! A code unit is the compiled artifact for one generated type (or for the
//! registry). It carries its own string pool, a member table that dispatch
//! instructions index into, and the dispatch routines themselves.

use crate::encoder::{DecodeError, UnitReader, UnitWriter};
use crate::names::{name_hash, shard_key};
use crate::opcode::Op;
use crate::pool::StringPool;
use thiserror::Error;

/// Magic number for code units: "LKCU"
pub const MAGIC: [u8; 4] = *b"LKCU";

/// Current code unit version
pub const VERSION: u32 = 1;

const HEADER_LEN: usize = 16;
const NO_ENTRY: u32 = u32::MAX;

/// Code unit encoding/decoding errors
#[derive(Debug, Error)]
pub enum UnitError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected LKCU, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header
        expected: u32,
        /// Checksum of the payload read
        actual: u32,
    },
}

/// Unit flags
pub mod flags {
    /// Unit embeds a metadata blob
    pub const HAS_METADATA: u32 = 1 << 0;
    /// Unit is the registry
    pub const REGISTRY: u32 = 1 << 1;
}

/// What a unit was generated for
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Dispatch for one type
    Type = 0,
    /// Name-keyed registry over all generated types
    Registry = 1,
}

/// Kind of member referenced by a dispatch instruction
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Constructor
    Constructor = 0,
    /// Method
    Method = 1,
    /// Field
    Field = 2,
}

impl MemberKind {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MemberKind::Constructor),
            1 => Some(MemberKind::Method),
            2 => Some(MemberKind::Field),
            _ => None,
        }
    }
}

/// A resolved member reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Member kind
    pub kind: MemberKind,
    /// Declaring type
    pub owner: String,
    /// Member name (`<init>` for constructors)
    pub name: String,
    /// Erased parameter types
    pub params: Vec<String>,
    /// Erased result type (`void` for constructors, field type for fields)
    pub result: String,
    /// Static member
    pub is_static: bool,
}

impl MemberRef {
    /// Name used for constructor references
    pub const CONSTRUCTOR_NAME: &'static str = "<init>";

    fn encode(&self, pool: &mut StringPool, writer: &mut UnitWriter) {
        writer.emit_u8(self.kind as u8);
        writer.emit_u32(pool.intern(&self.owner));
        writer.emit_u32(pool.intern(&self.name));
        writer.emit_len(self.params.len());
        for param in &self.params {
            writer.emit_u32(pool.intern(param));
        }
        writer.emit_u32(pool.intern(&self.result));
        writer.emit_bool(self.is_static);
    }

    fn decode(pool: &StringPool, reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let tag = reader.read_u8()?;
        let kind = MemberKind::from_u8(tag).ok_or(DecodeError::InvalidTag {
            what: "member kind",
            tag,
            offset,
        })?;
        let owner = pool.resolve(reader.read_u32()?)?.to_owned();
        let name = pool.resolve(reader.read_u32()?)?.to_owned();
        let count = reader.read_len()?;
        let mut params = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            params.push(pool.resolve(reader.read_u32()?)?.to_owned());
        }
        let result = pool.resolve(reader.read_u32()?)?.to_owned();
        let is_static = reader.read_bool()?;
        Ok(Self {
            kind,
            owner,
            name,
            params,
            result,
            is_static,
        })
    }
}

/// Dispatch routine identity
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineKind {
    /// Constructor dispatch
    Construct = 0,
    /// Method dispatch
    Invoke = 1,
    /// Field reads
    GetField = 2,
    /// Field writes
    SetField = 3,
    /// Proxy method forwarding
    Proxy = 4,
    /// Enum constants accessor
    EnumConstants = 5,
    /// Singleton accessor
    ObjectInstance = 6,
    /// Registry lookup by type name
    ForName = 7,
}

impl RoutineKind {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RoutineKind::Construct),
            1 => Some(RoutineKind::Invoke),
            2 => Some(RoutineKind::GetField),
            3 => Some(RoutineKind::SetField),
            4 => Some(RoutineKind::Proxy),
            5 => Some(RoutineKind::EnumConstants),
            6 => Some(RoutineKind::ObjectInstance),
            7 => Some(RoutineKind::ForName),
            _ => None,
        }
    }

    /// Human-readable routine name
    pub fn name(self) -> &'static str {
        match self {
            RoutineKind::Construct => "construct",
            RoutineKind::Invoke => "invoke",
            RoutineKind::GetField => "get_field",
            RoutineKind::SetField => "set_field",
            RoutineKind::Proxy => "proxy",
            RoutineKind::EnumConstants => "enum_constants",
            RoutineKind::ObjectInstance => "object_instance",
            RoutineKind::ForName => "for_name",
        }
    }
}

/// A dispatch routine
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    /// Which routine this is
    pub kind: RoutineKind,
    /// Routine body
    pub body: RoutineBody,
}

/// Body of a dispatch routine
#[derive(Debug, Clone, PartialEq)]
pub enum RoutineBody {
    /// Switch on a dense index; out-of-range indices fail with `failure`
    TableSwitch {
        /// One straight-line case per index
        cases: Vec<Vec<Op>>,
        /// Message of the default case
        failure: String,
    },
    /// Switch on a name hash
    LookupSwitch(LookupTable),
}

/// Name-keyed lookup: first-character shards, hash buckets, exact match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    /// Shards sorted by key
    pub shards: Vec<Shard>,
}

/// Names sharing a first UTF-16 code unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Shared first code unit
    pub key: u16,
    /// Buckets sorted by hash
    pub buckets: Vec<Bucket>,
}

/// Names sharing a hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Shared [`name_hash`]
    pub hash: i32,
    /// `(name, target)` pairs sorted by name
    pub entries: Vec<(String, u32)>,
}

impl LookupTable {
    /// Build a table over `(name, target)` pairs
    ///
    /// The result does not depend on the order of `entries`. A name listed
    /// twice keeps its first target.
    pub fn build<'a>(entries: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut table = LookupTable::default();
        for (name, target) in entries {
            table.insert(name, target);
        }
        table
    }

    fn insert(&mut self, name: &str, target: u32) {
        let Some(key) = shard_key(name) else {
            return;
        };
        let hash = name_hash(name);

        let shard_at = match self.shards.binary_search_by_key(&key, |s| s.key) {
            Ok(at) => at,
            Err(at) => {
                self.shards.insert(at, Shard { key, buckets: Vec::new() });
                at
            }
        };
        let buckets = &mut self.shards[shard_at].buckets;
        let bucket_at = match buckets.binary_search_by_key(&hash, |b| b.hash) {
            Ok(at) => at,
            Err(at) => {
                buckets.insert(at, Bucket { hash, entries: Vec::new() });
                at
            }
        };
        let entries = &mut buckets[bucket_at].entries;
        if let Err(at) = entries.binary_search_by(|(n, _)| n.as_str().cmp(name)) {
            entries.insert(at, (name.to_owned(), target));
        }
    }

    /// Find the target registered for `name`
    pub fn lookup(&self, name: &str) -> Option<u32> {
        let key = shard_key(name)?;
        let shard = self
            .shards
            .binary_search_by_key(&key, |s| s.key)
            .ok()
            .map(|at| &self.shards[at])?;
        let hash = name_hash(name);
        let bucket = shard
            .buckets
            .binary_search_by_key(&hash, |b| b.hash)
            .ok()
            .map(|at| &shard.buckets[at])?;
        bucket
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, target)| target)
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .flat_map(|s| &s.buckets)
            .map(|b| b.entries.len())
            .sum()
    }

    /// Whether no names are registered
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    fn encode(&self, pool: &mut StringPool, writer: &mut UnitWriter) {
        writer.emit_len(self.shards.len());
        for shard in &self.shards {
            writer.emit_u16(shard.key);
            writer.emit_len(shard.buckets.len());
            for bucket in &shard.buckets {
                writer.emit_i32(bucket.hash);
                writer.emit_len(bucket.entries.len());
                for (name, target) in &bucket.entries {
                    writer.emit_u32(pool.intern(name));
                    writer.emit_u32(*target);
                }
            }
        }
    }

    fn decode(pool: &StringPool, reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let shard_count = reader.read_len()?;
        let mut shards = Vec::with_capacity(shard_count.min(reader.remaining()));
        for _ in 0..shard_count {
            let key = reader.read_u16()?;
            let bucket_count = reader.read_len()?;
            let mut buckets = Vec::with_capacity(bucket_count.min(reader.remaining()));
            for _ in 0..bucket_count {
                let hash = reader.read_i32()?;
                let entry_count = reader.read_len()?;
                let mut entries = Vec::with_capacity(entry_count.min(reader.remaining()));
                for _ in 0..entry_count {
                    let name = pool.resolve(reader.read_u32()?)?.to_owned();
                    entries.push((name, reader.read_u32()?));
                }
                buckets.push(Bucket { hash, entries });
            }
            shards.push(Shard { key, buckets });
        }
        Ok(Self { shards })
    }
}

impl Routine {
    /// Number of table-switch cases (zero for lookup switches)
    pub fn case_count(&self) -> usize {
        match &self.body {
            RoutineBody::TableSwitch { cases, .. } => cases.len(),
            RoutineBody::LookupSwitch(_) => 0,
        }
    }

    /// Case for `index`, if in range
    pub fn case(&self, index: usize) -> Option<&[Op]> {
        match &self.body {
            RoutineBody::TableSwitch { cases, .. } => cases.get(index).map(Vec::as_slice),
            RoutineBody::LookupSwitch(_) => None,
        }
    }

    fn encode(&self, pool: &mut StringPool, writer: &mut UnitWriter) {
        writer.emit_u8(self.kind as u8);
        match &self.body {
            RoutineBody::TableSwitch { cases, failure } => {
                writer.emit_u8(0);
                writer.emit_u32(pool.intern(failure));
                writer.emit_len(cases.len());
                for case in cases {
                    let mut code = UnitWriter::new();
                    for op in case {
                        op.encode(&mut code);
                    }
                    writer.emit_block(code.buffer());
                }
            }
            RoutineBody::LookupSwitch(table) => {
                writer.emit_u8(1);
                table.encode(pool, writer);
            }
        }
    }

    fn decode(pool: &StringPool, reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let tag = reader.read_u8()?;
        let kind = RoutineKind::from_u8(tag).ok_or(DecodeError::InvalidTag {
            what: "routine kind",
            tag,
            offset,
        })?;
        let offset = reader.position();
        let body = match reader.read_u8()? {
            0 => {
                let failure = pool.resolve(reader.read_u32()?)?.to_owned();
                let count = reader.read_len()?;
                let mut cases = Vec::with_capacity(count.min(reader.remaining()));
                for _ in 0..count {
                    let code = reader.read_block()?;
                    let mut code_reader = UnitReader::new(&code);
                    let mut ops = Vec::new();
                    while code_reader.has_more() {
                        ops.push(Op::decode(&mut code_reader)?);
                    }
                    cases.push(ops);
                }
                RoutineBody::TableSwitch { cases, failure }
            }
            1 => RoutineBody::LookupSwitch(LookupTable::decode(pool, reader)?),
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "routine body",
                    tag,
                    offset,
                })
            }
        };
        Ok(Self { kind, body })
    }
}

/// A compiled code unit
#[derive(Debug, Clone, PartialEq)]
pub struct CodeUnit {
    /// Generated unit name
    pub name: String,
    /// Type this unit serves (the provider service for the registry)
    pub target: String,
    /// Unit kind
    pub kind: UnitKind,
    /// Strings referenced by instruction operands
    pub strings: StringPool,
    /// Members referenced by instruction operands
    pub members: Vec<MemberRef>,
    /// Dispatch routines
    pub routines: Vec<Routine>,
    /// Unit names indexed by registry lookup results
    pub links: Vec<String>,
    /// Position of this type's entry in the metadata blob
    pub entry_index: Option<u32>,
    /// Metadata blob (registry only)
    pub metadata: Option<Vec<u8>>,
}

impl CodeUnit {
    /// Create an empty unit
    pub fn new(name: impl Into<String>, target: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            strings: StringPool::new(),
            members: Vec::new(),
            routines: Vec::new(),
            links: Vec::new(),
            entry_index: None,
            metadata: None,
        }
    }

    /// Routine of the given kind
    pub fn routine(&self, kind: RoutineKind) -> Option<&Routine> {
        self.routines.iter().find(|r| r.kind == kind)
    }

    /// Header flags derived from the unit's contents
    pub fn flags(&self) -> u32 {
        let mut bits = 0;
        if self.metadata.is_some() {
            bits |= flags::HAS_METADATA;
        }
        if self.kind == UnitKind::Registry {
            bits |= flags::REGISTRY;
        }
        bits
    }

    /// Encode the unit to binary format (.lku)
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
    /// - String pool
    /// - Name, target, entry index
    /// - Member table
    /// - Routines
    /// - Links
    /// - Metadata blob (if flags indicate)
    ///
    /// Operand strings are already in the pool; strings used by the member
    /// table and lookup switches are interned into a copy before the pool
    /// is written, so operand indices stay valid.
    pub fn encode(&self) -> Vec<u8> {
        let mut pool = self.strings.clone();
        let mut body = UnitWriter::new();

        body.emit_u32(pool.intern(&self.name));
        body.emit_u32(pool.intern(&self.target));
        body.emit_u32(self.entry_index.unwrap_or(NO_ENTRY));

        body.emit_len(self.members.len());
        for member in &self.members {
            member.encode(&mut pool, &mut body);
        }

        body.emit_len(self.routines.len());
        for routine in &self.routines {
            routine.encode(&mut pool, &mut body);
        }

        body.emit_len(self.links.len());
        for link in &self.links {
            body.emit_u32(pool.intern(link));
        }

        if let Some(metadata) = &self.metadata {
            body.emit_block(metadata);
        }

        let mut writer = UnitWriter::with_capacity(HEADER_LEN + body.offset());
        writer.emit_raw(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_u32(self.flags());
        let checksum_offset = writer.offset();
        writer.emit_u32(0); // Placeholder for checksum

        pool.encode(&mut writer);
        writer.emit_raw(body.buffer());

        let checksum = crc32fast::hash(&writer.buffer()[HEADER_LEN..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode a unit from binary format
    pub fn decode(data: &[u8]) -> Result<Self, UnitError> {
        let mut reader = UnitReader::new(data);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&reader.read_bytes(4)?);
        if magic != MAGIC {
            return Err(UnitError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(UnitError::UnsupportedVersion(version));
        }

        let unit_flags = reader.read_u32()?;
        let expected = reader.read_u32()?;
        let actual = crc32fast::hash(reader.rest());
        if expected != actual {
            return Err(UnitError::ChecksumMismatch { expected, actual });
        }

        let strings = StringPool::decode(&mut reader)?;
        let name = strings.resolve(reader.read_u32()?)?.to_owned();
        let target = strings.resolve(reader.read_u32()?)?.to_owned();
        let entry_index = match reader.read_u32()? {
            NO_ENTRY => None,
            index => Some(index),
        };

        let member_count = reader.read_len()?;
        let mut members = Vec::with_capacity(member_count.min(reader.remaining()));
        for _ in 0..member_count {
            members.push(MemberRef::decode(&strings, &mut reader)?);
        }

        let routine_count = reader.read_len()?;
        let mut routines = Vec::with_capacity(routine_count.min(reader.remaining()));
        for _ in 0..routine_count {
            routines.push(Routine::decode(&strings, &mut reader)?);
        }

        let link_count = reader.read_len()?;
        let mut links = Vec::with_capacity(link_count.min(reader.remaining()));
        for _ in 0..link_count {
            links.push(strings.resolve(reader.read_u32()?)?.to_owned());
        }

        let metadata = if unit_flags & flags::HAS_METADATA != 0 {
            Some(reader.read_block()?)
        } else {
            None
        };

        let kind = if unit_flags & flags::REGISTRY != 0 {
            UnitKind::Registry
        } else {
            UnitKind::Type
        };

        Ok(Self {
            name,
            target,
            kind,
            strings,
            members,
            routines,
            links,
            entry_index,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::InvokeKind;

    fn sample_unit() -> CodeUnit {
        let mut unit = CodeUnit::new("a.B$Likeness", "a.B", UnitKind::Type);
        let string = unit.strings.intern("java.lang.String");
        unit.members.push(MemberRef {
            kind: MemberKind::Method,
            owner: "a.B".to_string(),
            name: "greet".to_string(),
            params: vec!["java.lang.String".to_string()],
            result: "java.lang.String".to_string(),
            is_static: false,
        });
        unit.routines.push(Routine {
            kind: RoutineKind::Invoke,
            body: RoutineBody::TableSwitch {
                cases: vec![vec![
                    Op::CheckArity(1),
                    Op::LoadReceiver,
                    Op::LoadArg(0),
                    Op::CheckCast(string),
                    Op::Invoke(InvokeKind::Virtual, 0),
                    Op::Return,
                ]],
                failure: "Invalid method index for a.B".to_string(),
            },
        });
        unit.entry_index = Some(3);
        unit
    }

    #[test]
    fn test_unit_encode_decode() {
        let unit = sample_unit();
        let decoded = CodeUnit::decode(&unit.encode()).unwrap();

        assert_eq!(decoded.name, unit.name);
        assert_eq!(decoded.members, unit.members);
        assert_eq!(decoded.routines, unit.routines);
        assert_eq!(decoded.entry_index, Some(3));
        assert_eq!(decoded.metadata, None);
        assert_eq!(decoded.kind, UnitKind::Type);
        // Operand indices still resolve after the pool grew on encode
        let op = decoded.routine(RoutineKind::Invoke).unwrap().case(0).unwrap()[3];
        assert_eq!(decoded.strings.get(op.string_ref().unwrap()), Some("java.lang.String"));
    }

    #[test]
    fn test_unit_rejects_bad_magic() {
        let mut bytes = sample_unit().encode();
        bytes[0] = b'X';
        assert!(matches!(CodeUnit::decode(&bytes), Err(UnitError::InvalidMagic(_))));
    }

    #[test]
    fn test_unit_detects_corruption() {
        let mut bytes = sample_unit().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            CodeUnit::decode(&bytes),
            Err(UnitError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_lookup_table_exact_match() {
        let table = LookupTable::build([("a.B", 0), ("a.C", 1)]);
        assert_eq!(table.lookup("a.B"), Some(0));
        assert_eq!(table.lookup("a.C"), Some(1));
        assert_eq!(table.lookup("a.B2"), None);
        assert_eq!(table.lookup(""), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lookup_table_hash_collision() {
        // "Aa" and "BB" share a hash but not a first character
        let table = LookupTable::build([("Aa", 0), ("BB", 1), ("AaBB", 2), ("BBAa", 3)]);
        assert_eq!(table.lookup("Aa"), Some(0));
        assert_eq!(table.lookup("BB"), Some(1));
        assert_eq!(table.lookup("AaBB"), Some(2));
        assert_eq!(table.lookup("BBAa"), Some(3));
        assert_eq!(table.lookup("AaAa"), None);
    }

    #[test]
    fn test_lookup_table_order_independent() {
        let forward = LookupTable::build([("a.B", 0), ("a.C", 1), ("z.Q", 2)]);
        let backward = LookupTable::build([("z.Q", 2), ("a.C", 1), ("a.B", 0)]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_registry_unit_roundtrip() {
        let mut unit = CodeUnit::new(
            crate::names::REGISTRY_UNIT,
            crate::names::PROVIDER_SERVICE,
            UnitKind::Registry,
        );
        unit.links = vec!["a.B$Likeness".to_string()];
        unit.routines.push(Routine {
            kind: RoutineKind::ForName,
            body: RoutineBody::LookupSwitch(LookupTable::build([("a.B", 0)])),
        });
        unit.metadata = Some(vec![1, 2, 3]);

        let decoded = CodeUnit::decode(&unit.encode()).unwrap();
        assert_eq!(decoded.kind, UnitKind::Registry);
        assert_eq!(decoded.metadata, Some(vec![1, 2, 3]));
        assert_eq!(decoded.links, unit.links);
        assert_eq!(decoded.routines, unit.routines);
    }
}
