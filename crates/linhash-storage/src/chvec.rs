//! Choice vectors.
//!
//! A choice vector maps every bit position of the combined hash to the
//! attribute, and the bit of that attribute's hash, it is taken from.
//! Descriptor syntax is `att,bit:att,bit:...` with exactly [`CHVEC_LEN`] items.

use linhash_common::bits::MAX_BITS;
use linhash_common::{LinHashError, Result};

/// Number of entries in a choice vector.
pub const CHVEC_LEN: usize = MAX_BITS as usize;

/// One choice vector entry: combined bit `i` comes from `attr`'s hash bit `bit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChoiceItem {
    /// Attribute index (0-based).
    pub attr: u8,
    /// Bit index within the attribute hash.
    pub bit: u8,
}

/// Fixed mapping from combined-hash bit positions to attribute hash bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceVector {
    items: [ChoiceItem; CHVEC_LEN],
}

impl ChoiceVector {
    /// Serialized size in bytes.
    pub const SIZE: usize = CHVEC_LEN * 2;

    /// Parses a descriptor for a relation with `attribute_count` attributes.
    pub fn parse(descriptor: &str, attribute_count: usize) -> Result<Self> {
        let tokens: Vec<&str> = descriptor.trim().split(':').collect();
        if tokens.len() != CHVEC_LEN {
            return Err(LinHashError::MalformedDescriptor(format!(
                "expected {} items, got {}",
                CHVEC_LEN,
                tokens.len()
            )));
        }

        let mut items = [ChoiceItem::default(); CHVEC_LEN];
        for (i, token) in tokens.iter().enumerate() {
            items[i] = Self::parse_item(token, attribute_count)
                .map_err(|reason| {
                    LinHashError::MalformedDescriptor(format!("item {} {:?}: {}", i, token, reason))
                })?;
        }

        Ok(Self { items })
    }

    fn parse_item(token: &str, attribute_count: usize) -> std::result::Result<ChoiceItem, String> {
        let (attr, bit) = token
            .split_once(',')
            .ok_or_else(|| "expected attribute,bit".to_string())?;
        let attr: usize = attr
            .trim()
            .parse()
            .map_err(|_| "attribute is not a number".to_string())?;
        let bit: u32 = bit
            .trim()
            .parse()
            .map_err(|_| "bit is not a number".to_string())?;

        if attr >= attribute_count {
            return Err(format!(
                "attribute {} out of range (relation has {})",
                attr, attribute_count
            ));
        }
        if bit >= MAX_BITS {
            return Err(format!("bit {} out of range", bit));
        }
        // attribute_count is bounded well below u8::MAX by the catalog.
        let attr = u8::try_from(attr).map_err(|_| format!("attribute {} out of range", attr))?;

        Ok(ChoiceItem {
            attr,
            bit: bit as u8,
        })
    }

    /// Builds the default vector that cycles through the attributes,
    /// taking successive hash bits on each pass.
    pub fn round_robin(attribute_count: usize) -> Self {
        let n = attribute_count.max(1);
        let mut items = [ChoiceItem::default(); CHVEC_LEN];
        for (i, item) in items.iter_mut().enumerate() {
            *item = ChoiceItem {
                attr: (i % n) as u8,
                bit: (i / n) as u8,
            };
        }
        Self { items }
    }

    /// Returns the entry for combined-hash bit `i`.
    pub fn get(&self, i: usize) -> Option<ChoiceItem> {
        self.items.get(i).copied()
    }

    /// Iterates over the entries in bit order.
    pub fn iter(&self) -> impl Iterator<Item = &ChoiceItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        CHVEC_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serializes the vector as (attr, bit) byte pairs.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        for (i, item) in self.items.iter().enumerate() {
            buf[2 * i] = item.attr;
            buf[2 * i + 1] = item.bit;
        }
        buf
    }

    /// Deserializes and validates a vector for `attribute_count` attributes.
    pub fn from_bytes(buf: &[u8], attribute_count: usize) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(LinHashError::StorageCorrupted(
                "choice vector truncated".to_string(),
            ));
        }
        let mut items = [ChoiceItem::default(); CHVEC_LEN];
        for (i, item) in items.iter_mut().enumerate() {
            let attr = buf[2 * i];
            let bit = buf[2 * i + 1];
            if attr as usize >= attribute_count || bit as u32 >= MAX_BITS {
                return Err(LinHashError::StorageCorrupted(format!(
                    "choice vector item {} is ({},{})",
                    i, attr, bit
                )));
            }
            *item = ChoiceItem { attr, bit };
        }
        Ok(Self { items })
    }
}

impl std::fmt::Display for ChoiceVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{},{}", item.attr, item.bit)?;
        }
        Ok(())
    }
}
