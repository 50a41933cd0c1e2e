//! Tuple representation, serialization and hashing.
//!
//! A tuple is a sequence of opaque string fields joined by [`DELIMITER`].
//! On a page it is stored as those bytes followed by a single NUL.

use crate::chvec::ChoiceVector;
use linhash_common::bits::{Bits, bit_is_set, set_bit};
use linhash_common::page::MAX_TUPLE_LEN;
use linhash_common::{LinHashError, Result};
use std::hash::Hasher;
use twox_hash::XxHash32;

/// Field separator within a serialized tuple.
pub const DELIMITER: char = ',';

/// Seed for the attribute hash. Changing it invalidates every stored relation.
const HASH_SEED: u32 = 0;

/// Hashes a byte string to 32 bits.
pub fn hash_bytes(bytes: &[u8]) -> Bits {
    let mut hasher = XxHash32::with_seed(HASH_SEED);
    hasher.write(bytes);
    hasher.finish() as Bits
}

/// A tuple (row) stored in a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    /// Serialized form, fields joined by the delimiter.
    data: String,
}

impl Tuple {
    /// Parses one input line into a tuple with exactly `attribute_count` fields.
    ///
    /// A trailing line terminator is removed; field contents are kept verbatim.
    pub fn parse(line: &str, attribute_count: usize) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        Self::validate(line)?;

        let actual = line.split(DELIMITER).count();
        if actual != attribute_count {
            return Err(LinHashError::MalformedTuple {
                expected: attribute_count,
                actual,
            });
        }

        Ok(Self {
            data: line.to_string(),
        })
    }

    /// Reconstructs a tuple from its stored bytes (without the terminator).
    pub fn from_stored(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().map(|s| Self {
            data: s.to_string(),
        })
    }

    fn validate(data: &str) -> Result<()> {
        if data.len() > MAX_TUPLE_LEN {
            return Err(LinHashError::InvalidTuple(format!(
                "{} bytes exceeds the {} byte limit",
                data.len(),
                MAX_TUPLE_LEN
            )));
        }
        if data.contains('\0') {
            return Err(LinHashError::InvalidTuple(
                "tuple contains a NUL byte".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the serialized tuple.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Returns the serialized tuple bytes (without the terminator).
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Returns the number of bytes this tuple occupies on a page.
    pub fn size_on_disk(&self) -> usize {
        self.data.len() + 1
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.data.split(DELIMITER).count()
    }

    /// Splits the tuple into its field values.
    pub fn fields(&self) -> Vec<&str> {
        self.data.split(DELIMITER).collect()
    }

    /// Computes the combined hash (signature) of this tuple.
    ///
    /// Every field is hashed on its own; bit `i` of the result is bit
    /// `cv[i].bit` of the hash of attribute `cv[i].attr`.
    pub fn combined_hash(&self, cv: &ChoiceVector) -> Bits {
        let attr_hashes: Vec<Bits> = self
            .data
            .split(DELIMITER)
            .map(|field| hash_bytes(field.as_bytes()))
            .collect();

        let mut combined: Bits = 0;
        for (i, item) in cv.iter().enumerate() {
            let attr_hash = attr_hashes.get(item.attr as usize).copied().unwrap_or(0);
            if bit_is_set(attr_hash, item.bit as u32) {
                combined = set_bit(combined, i as u32);
            }
        }
        combined
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let tuple = Tuple::parse("1,alice,sydney\n", 3).unwrap();
        assert_eq!(tuple.as_str(), "1,alice,sydney");
        assert_eq!(tuple.field_count(), 3);
        assert_eq!(tuple.fields(), vec!["1", "alice", "sydney"]);
        assert_eq!(tuple.size_on_disk(), 15);
    }

    #[test]
    fn test_parse_keeps_field_contents() {
        let tuple = Tuple::parse(" a , b ", 2).unwrap();
        assert_eq!(tuple.fields(), vec![" a ", " b "]);
    }

    #[test]
    fn test_parse_wrong_arity() {
        let err = Tuple::parse("1,2", 3).unwrap_err();
        assert!(matches!(
            err,
            LinHashError::MalformedTuple {
                expected: 3,
                actual: 2
            }
        ));

        let err = Tuple::parse("1,2,3,4", 3).unwrap_err();
        assert!(matches!(err, LinHashError::MalformedTuple { actual: 4, .. }));
    }

    #[test]
    fn test_parse_empty_fields() {
        let tuple = Tuple::parse(",,", 3).unwrap();
        assert_eq!(tuple.fields(), vec!["", "", ""]);
        assert_eq!(Tuple::parse("", 1).unwrap().field_count(), 1);
    }

    #[test]
    fn test_parse_rejects_nul_and_long() {
        assert!(matches!(
            Tuple::parse("a\0b", 1),
            Err(LinHashError::InvalidTuple(_))
        ));

        let long = "x".repeat(MAX_TUPLE_LEN + 1);
        assert!(matches!(
            Tuple::parse(&long, 1),
            Err(LinHashError::InvalidTuple(_))
        ));
        assert!(Tuple::parse(&"x".repeat(MAX_TUPLE_LEN), 1).is_ok());
    }

    #[test]
    fn test_stored_roundtrip() {
        let tuple = Tuple::parse("42,,hello world,%?", 4).unwrap();
        let stored = Tuple::from_stored(tuple.as_bytes()).unwrap();
        assert_eq!(stored, tuple);
        assert_eq!(stored.fields(), vec!["42", "", "hello world", "%?"]);
    }

    #[test]
    fn test_from_stored_invalid_utf8() {
        assert!(Tuple::from_stored(&[0xFF, 0xFE]).is_none());
    }

    #[test]
    fn test_hash_bytes_deterministic() {
        assert_eq!(hash_bytes(b"alice"), hash_bytes(b"alice"));
        assert_ne!(hash_bytes(b"alice"), hash_bytes(b"bob"));
    }

    #[test]
    fn test_combined_hash_single_attribute_identity() {
        // cv[i] = (0, i) copies the attribute hash verbatim.
        let descriptor: Vec<String> = (0..32).map(|i| format!("0,{}", i)).collect();
        let cv = ChoiceVector::parse(&descriptor.join(":"), 1).unwrap();
        let tuple = Tuple::parse("alice", 1).unwrap();
        assert_eq!(tuple.combined_hash(&cv), hash_bytes(b"alice"));
    }

    #[test]
    fn test_combined_hash_picks_bits() {
        // Every position takes bit 0 of attribute 1.
        let descriptor = vec!["1,0"; 32].join(":");
        let cv = ChoiceVector::parse(&descriptor, 2).unwrap();
        let tuple = Tuple::parse("x,y", 2).unwrap();

        let expected = if hash_bytes(b"y") & 1 == 1 { u32::MAX } else { 0 };
        assert_eq!(tuple.combined_hash(&cv), expected);
    }

    #[test]
    fn test_combined_hash_ignores_unselected_attributes() {
        // Only attribute 0 contributes bits.
        let cv = ChoiceVector::parse(&vec!["0,3"; 32].join(":"), 2).unwrap();
        let a = Tuple::parse("same,one", 2).unwrap();
        let b = Tuple::parse("same,two", 2).unwrap();
        assert_eq!(a.combined_hash(&cv), b.combined_hash(&cv));
    }
}
