//! Interned string pool shared by code units and metadata blobs

use crate::encoder::{DecodeError, UnitReader, UnitWriter};
use rustc_hash::FxHashMap;

/// Interned strings, each stored once and referenced by index
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    strings: Vec<String>,
    indices: FxHashMap<String, u32>,
}

impl StringPool {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string and return its index; repeated strings share an index
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.indices.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.indices.insert(s.to_owned(), index);
        index
    }

    /// Index of an already interned string
    pub fn index_of(&self, s: &str) -> Option<u32> {
        self.indices.get(s).copied()
    }

    /// Get a string by index
    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    /// Get a string by index, failing with a decode error when out of range
    pub fn resolve(&self, index: u32) -> Result<&str, DecodeError> {
        self.get(index).ok_or(DecodeError::InvalidStringIndex {
            index,
            len: self.strings.len(),
        })
    }

    /// Number of pooled strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// All strings in index order
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Encode the pool
    ///
    /// Format:
    /// - String count (u32)
    /// - For each string: length (u32) + UTF-8 bytes
    pub fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_len(self.strings.len());
        for s in &self.strings {
            writer.emit_string(s);
        }
    }

    /// Decode a pool written by [`StringPool::encode`]
    pub fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_len()?;
        let mut pool = StringPool::new();
        pool.strings.reserve(count.min(reader.remaining()));
        for _ in 0..count {
            let s = reader.read_string()?;
            // Duplicates only come from hand-built input; first index wins.
            let index = pool.strings.len() as u32;
            pool.indices.entry(s.clone()).or_insert(index);
            pool.strings.push(s);
        }
        Ok(pool)
    }
}

impl PartialEq for StringPool {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = StringPool::new();
        let a = pool.intern("java.lang.String");
        let b = pool.intern("int");
        let c = pool.intern("java.lang.String");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(b), Some("int"));
        assert_eq!(pool.index_of("int"), Some(b));
    }

    #[test]
    fn test_resolve_out_of_range() {
        let pool = StringPool::new();
        assert_eq!(
            pool.resolve(3),
            Err(DecodeError::InvalidStringIndex { index: 3, len: 0 })
        );
    }

    #[test]
    fn test_pool_encode_decode() {
        let mut pool = StringPool::new();
        pool.intern("a.B");
        pool.intern("");
        pool.intern("ünïcode");

        let mut writer = UnitWriter::new();
        pool.encode(&mut writer);
        let decoded = StringPool::decode(&mut UnitReader::new(writer.buffer())).unwrap();

        assert_eq!(decoded, pool);
        assert_eq!(decoded.index_of("ünïcode"), Some(2));
    }
}
