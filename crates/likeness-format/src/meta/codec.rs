//! Metadata blob encoding
//!
//! Format:
//! - Header: magic "LKMD" (4 bytes) + version (u32) + index width (u8) + checksum (u32)
//! - String pool
//! - Entry count (u32) followed by the entries
//!
//! Every string in an entry is a pool index written at the header's index
//! width. Optional strings are written as `index + 1`, with 0 for absent.

use super::{
    AnnotationEntry, AnnotationValue, ClassEntry, ClassFlags, ConstructorEntry, ConstructorFlags,
    FieldEntry, FieldFlags, MethodEntry, MethodFlags,
};
use crate::encoder::{DecodeError, UnitReader, UnitWriter};
use crate::pool::StringPool;
use crate::width::IndexWidth;
use std::collections::BTreeMap;
use thiserror::Error;

/// Magic number for metadata blobs: "LKMD"
pub const METADATA_MAGIC: [u8; 4] = *b"LKMD";

/// Current metadata blob version
pub const METADATA_VERSION: u32 = 1;

const HEADER_LEN: usize = 13;

mod tag {
    pub const NULL: u8 = 0;
    pub const STRING: u8 = 1;
    pub const BOOLEAN: u8 = 2;
    pub const INT: u8 = 3;
    pub const LONG: u8 = 4;
    pub const FLOAT: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CHAR: u8 = 7;
    pub const CLASS: u8 = 8;
    pub const ENUM: u8 = 9;
    pub const LIST: u8 = 10;
}

/// Metadata decoding errors
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected LKMD, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported metadata version: {0} (current: {METADATA_VERSION})")]
    UnsupportedVersion(u32),

    /// Unknown index width byte
    #[error("Invalid index width {0}")]
    InvalidIndexWidth(u8),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header
        expected: u32,
        /// Checksum of the payload read
        actual: u32,
    },
}

/// Serialized metadata for a whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlob(Vec<u8>);

impl MetadataBlob {
    /// Wrap encoded bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Serialize entries into one blob with a shared string pool
pub fn serialize(entries: &[ClassEntry]) -> MetadataBlob {
    // First pass only fills the pool so the index width is known up front.
    let mut collector = BlobWriter::new(StringPool::new(), IndexWidth::U32);
    collector.entries(entries);

    let pool = collector.pool;
    let width = IndexWidth::for_upper_bound(pool.len() as u32);
    let mut writer = BlobWriter::new(pool, width);
    writer.entries(entries);

    let mut out = UnitWriter::with_capacity(HEADER_LEN + writer.out.offset());
    out.emit_raw(&METADATA_MAGIC);
    out.emit_u32(METADATA_VERSION);
    out.emit_u8(width.to_u8());
    let checksum_offset = out.offset();
    out.emit_u32(0); // Placeholder for checksum
    writer.pool.encode(&mut out);
    out.emit_raw(writer.out.buffer());

    let checksum = crc32fast::hash(&out.buffer()[HEADER_LEN..]);
    out.patch_u32(checksum_offset, checksum);
    MetadataBlob(out.into_bytes())
}

/// Decode a blob written by [`serialize`]
pub fn deserialize(bytes: &[u8]) -> Result<Vec<ClassEntry>, MetadataError> {
    let mut reader = UnitReader::new(bytes);

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&reader.read_bytes(4)?);
    if magic != METADATA_MAGIC {
        return Err(MetadataError::InvalidMagic(magic));
    }
    let version = reader.read_u32()?;
    if version != METADATA_VERSION {
        return Err(MetadataError::UnsupportedVersion(version));
    }
    let width_byte = reader.read_u8()?;
    let width = IndexWidth::from_u8(width_byte).ok_or(MetadataError::InvalidIndexWidth(width_byte))?;
    let expected = reader.read_u32()?;
    let actual = crc32fast::hash(reader.rest());
    if expected != actual {
        return Err(MetadataError::ChecksumMismatch { expected, actual });
    }

    let pool = StringPool::decode(&mut reader)?;
    let mut blob = BlobReader {
        pool,
        width,
        reader,
    };
    Ok(blob.entries()?)
}

struct BlobWriter {
    pool: StringPool,
    width: IndexWidth,
    out: UnitWriter,
}

impl BlobWriter {
    fn new(pool: StringPool, width: IndexWidth) -> Self {
        Self {
            pool,
            width,
            out: UnitWriter::new(),
        }
    }

    fn string(&mut self, s: &str) {
        let index = self.pool.intern(s);
        self.width.write(&mut self.out, index);
    }

    fn opt_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                let index = self.pool.intern(s);
                self.width.write(&mut self.out, index + 1);
            }
            None => self.width.write(&mut self.out, 0),
        }
    }

    fn strings(&mut self, list: &[String]) {
        self.out.emit_len(list.len());
        for s in list {
            self.string(s);
        }
    }

    fn entries(&mut self, entries: &[ClassEntry]) {
        self.out.emit_len(entries.len());
        for entry in entries {
            self.class(entry);
        }
    }

    fn class(&mut self, entry: &ClassEntry) {
        let mut flags = entry.flags - ClassFlags::HAS_SUPERCLASS;
        if entry.superclass.is_some() {
            flags |= ClassFlags::HAS_SUPERCLASS;
        }

        self.string(&entry.name);
        self.string(&entry.simple_name);
        self.opt_string(entry.qualified_name.as_deref());
        self.out.emit_u16(flags.bits() as u16);
        if let Some(superclass) = &entry.superclass {
            self.string(superclass);
        }
        self.strings(&entry.interfaces);
        self.annotations(&entry.annotations);

        self.out.emit_len(entry.constructors.len());
        for ctor in &entry.constructors {
            self.string(&ctor.declaring_class);
            self.strings(&ctor.parameter_types);
            self.out.emit_u8(ctor.flags.bits() as u8);
            self.annotations(&ctor.annotations);
            self.parameter_annotations(&ctor.parameter_annotations);
        }

        self.methods(&entry.methods);

        self.out.emit_len(entry.fields.len());
        for field in &entry.fields {
            self.string(&field.name);
            self.string(&field.type_name);
            self.string(&field.declaring_class);
            self.out.emit_u8(field.flags.bits() as u8);
            self.annotations(&field.annotations);
        }

        self.methods(&entry.proxy_methods);
        self.strings(&entry.enum_constants);
    }

    fn methods(&mut self, methods: &[MethodEntry]) {
        self.out.emit_len(methods.len());
        for method in methods {
            self.string(&method.name);
            self.strings(&method.parameter_types);
            self.string(&method.return_type);
            self.string(&method.declaring_class);
            self.out.emit_u8(method.flags.bits() as u8);
            self.annotations(&method.annotations);
            self.parameter_annotations(&method.parameter_annotations);
        }
    }

    fn parameter_annotations(&mut self, lists: &[Vec<AnnotationEntry>]) {
        self.out.emit_len(lists.len());
        for list in lists {
            self.annotations(list);
        }
    }

    fn annotations(&mut self, annotations: &[AnnotationEntry]) {
        self.out.emit_len(annotations.len());
        for annotation in annotations {
            self.string(&annotation.class_name);
            self.string(&annotation.simple_name);
            self.opt_string(annotation.qualified_name.as_deref());
            self.out.emit_len(annotation.properties.len());
            for (name, value) in &annotation.properties {
                self.string(name);
                self.value(value);
            }
        }
    }

    fn value(&mut self, value: &AnnotationValue) {
        match value {
            AnnotationValue::Null => self.out.emit_u8(tag::NULL),
            AnnotationValue::Str(s) => {
                self.out.emit_u8(tag::STRING);
                self.string(s);
            }
            AnnotationValue::Bool(b) => {
                self.out.emit_u8(tag::BOOLEAN);
                self.out.emit_bool(*b);
            }
            AnnotationValue::Int(i) => {
                self.out.emit_u8(tag::INT);
                self.out.emit_i32(*i);
            }
            AnnotationValue::Long(l) => {
                self.out.emit_u8(tag::LONG);
                self.out.emit_i64(*l);
            }
            AnnotationValue::Float(f) => {
                self.out.emit_u8(tag::FLOAT);
                self.out.emit_f32(*f);
            }
            AnnotationValue::Double(d) => {
                self.out.emit_u8(tag::DOUBLE);
                self.out.emit_f64(*d);
            }
            AnnotationValue::Char(c) => {
                self.out.emit_u8(tag::CHAR);
                self.out.emit_u16(*c);
            }
            AnnotationValue::Class(name) => {
                self.out.emit_u8(tag::CLASS);
                self.string(name);
            }
            AnnotationValue::Enum {
                type_name,
                constant,
            } => {
                self.out.emit_u8(tag::ENUM);
                self.string(type_name);
                self.string(constant);
            }
            AnnotationValue::List(values) => {
                self.out.emit_u8(tag::LIST);
                self.out.emit_len(values.len());
                for value in values {
                    self.value(value);
                }
            }
        }
    }
}

struct BlobReader<'a> {
    pool: StringPool,
    width: IndexWidth,
    reader: UnitReader<'a>,
}

impl BlobReader<'_> {
    fn string(&mut self) -> Result<String, DecodeError> {
        let index = self.width.read(&mut self.reader)?;
        Ok(self.pool.resolve(index)?.to_owned())
    }

    fn opt_string(&mut self) -> Result<Option<String>, DecodeError> {
        match self.width.read(&mut self.reader)? {
            0 => Ok(None),
            index => Ok(Some(self.pool.resolve(index - 1)?.to_owned())),
        }
    }

    fn len(&mut self) -> Result<usize, DecodeError> {
        let len = self.reader.read_len()?;
        // Every element takes at least one byte
        if len > self.reader.remaining() {
            return Err(DecodeError::UnexpectedEnd(self.reader.position()));
        }
        Ok(len)
    }

    fn strings(&mut self) -> Result<Vec<String>, DecodeError> {
        let len = self.len()?;
        (0..len).map(|_| self.string()).collect()
    }

    fn entries(&mut self) -> Result<Vec<ClassEntry>, DecodeError> {
        let len = self.len()?;
        (0..len).map(|_| self.class()).collect()
    }

    fn class(&mut self) -> Result<ClassEntry, DecodeError> {
        let name = self.string()?;
        let simple_name = self.string()?;
        let qualified_name = self.opt_string()?;
        let flags = ClassFlags::from_bits_truncate(u32::from(self.reader.read_u16()?));
        let superclass = if flags.contains(ClassFlags::HAS_SUPERCLASS) {
            Some(self.string()?)
        } else {
            None
        };
        let interfaces = self.strings()?;
        let annotations = self.annotations()?;

        let ctor_count = self.len()?;
        let mut constructors = Vec::with_capacity(ctor_count);
        for _ in 0..ctor_count {
            constructors.push(ConstructorEntry {
                declaring_class: self.string()?,
                parameter_types: self.strings()?,
                flags: ConstructorFlags::from_bits_truncate(u32::from(self.reader.read_u8()?)),
                annotations: self.annotations()?,
                parameter_annotations: self.parameter_annotations()?,
            });
        }

        let methods = self.methods()?;

        let field_count = self.len()?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(FieldEntry {
                name: self.string()?,
                type_name: self.string()?,
                declaring_class: self.string()?,
                flags: FieldFlags::from_bits_truncate(u32::from(self.reader.read_u8()?)),
                annotations: self.annotations()?,
            });
        }

        let proxy_methods = self.methods()?;
        let enum_constants = self.strings()?;

        Ok(ClassEntry {
            name,
            simple_name,
            qualified_name,
            flags,
            superclass,
            interfaces,
            annotations,
            constructors,
            methods,
            fields,
            proxy_methods,
            enum_constants,
        })
    }

    fn methods(&mut self) -> Result<Vec<MethodEntry>, DecodeError> {
        let len = self.len()?;
        let mut methods = Vec::with_capacity(len);
        for _ in 0..len {
            methods.push(MethodEntry {
                name: self.string()?,
                parameter_types: self.strings()?,
                return_type: self.string()?,
                declaring_class: self.string()?,
                flags: MethodFlags::from_bits_truncate(u32::from(self.reader.read_u8()?)),
                annotations: self.annotations()?,
                parameter_annotations: self.parameter_annotations()?,
            });
        }
        Ok(methods)
    }

    fn parameter_annotations(&mut self) -> Result<Vec<Vec<AnnotationEntry>>, DecodeError> {
        let len = self.len()?;
        (0..len).map(|_| self.annotations()).collect()
    }

    fn annotations(&mut self) -> Result<Vec<AnnotationEntry>, DecodeError> {
        let len = self.len()?;
        let mut annotations = Vec::with_capacity(len);
        for _ in 0..len {
            let class_name = self.string()?;
            let simple_name = self.string()?;
            let qualified_name = self.opt_string()?;
            let property_count = self.len()?;
            let mut properties = BTreeMap::new();
            for _ in 0..property_count {
                let name = self.string()?;
                properties.insert(name, self.value()?);
            }
            annotations.push(AnnotationEntry {
                class_name,
                simple_name,
                qualified_name,
                properties,
            });
        }
        Ok(annotations)
    }

    fn value(&mut self) -> Result<AnnotationValue, DecodeError> {
        let offset = self.reader.position();
        let value = match self.reader.read_u8()? {
            tag::NULL => AnnotationValue::Null,
            tag::STRING => AnnotationValue::Str(self.string()?),
            tag::BOOLEAN => AnnotationValue::Bool(self.reader.read_bool()?),
            tag::INT => AnnotationValue::Int(self.reader.read_i32()?),
            tag::LONG => AnnotationValue::Long(self.reader.read_i64()?),
            tag::FLOAT => AnnotationValue::Float(self.reader.read_f32()?),
            tag::DOUBLE => AnnotationValue::Double(self.reader.read_f64()?),
            tag::CHAR => AnnotationValue::Char(self.reader.read_u16()?),
            tag::CLASS => AnnotationValue::Class(self.string()?),
            tag::ENUM => AnnotationValue::Enum {
                type_name: self.string()?,
                constant: self.string()?,
            },
            tag::LIST => {
                let len = self.len()?;
                AnnotationValue::List((0..len).map(|_| self.value()).collect::<Result<_, _>>()?)
            }
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "annotation value",
                    tag,
                    offset,
                })
            }
        };
        Ok(value)
    }
}
