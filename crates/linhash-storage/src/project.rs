//! Output projection of selected tuples.

use crate::tuple::{DELIMITER, Tuple};
use linhash_common::{LinHashError, Result};

/// Projection keeping every attribute.
pub const PROJECT_ALL: &str = "*";

/// Attribute list applied to tuples before they are printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep the tuple as stored.
    All,
    /// Keep the listed attributes (0-based), in this order.
    Attributes(Vec<usize>),
}

impl Projection {
    /// Parses `*` or a comma-separated list of 1-based attribute numbers.
    ///
    /// Entries may repeat and appear in any order, but the list may not be
    /// longer than the relation's attribute count.
    pub fn parse(text: &str, attribute_count: usize) -> Result<Self> {
        let text = text.trim();
        if text == PROJECT_ALL {
            return Ok(Projection::All);
        }

        let entries: Vec<&str> = text.split(DELIMITER).collect();
        if entries.len() > attribute_count {
            return Err(LinHashError::InvalidProjection(format!(
                "{} entries for a relation with {} attributes",
                entries.len(),
                attribute_count
            )));
        }

        let mut attributes = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.trim();
            let number: usize = entry.parse().map_err(|_| {
                LinHashError::InvalidProjection(format!("{:?} is not a number", entry))
            })?;
            if number == 0 || number > attribute_count {
                return Err(LinHashError::InvalidProjection(format!(
                    "attribute {} out of range 1..={}",
                    number, attribute_count
                )));
            }
            attributes.push(number - 1);
        }

        Ok(Projection::Attributes(attributes))
    }

    /// Renders the projected fields of `tuple`.
    pub fn project(&self, tuple: &Tuple) -> String {
        match self {
            Projection::All => tuple.as_str().to_string(),
            Projection::Attributes(attributes) => {
                let fields = tuple.fields();
                attributes
                    .iter()
                    .map(|&attr| fields.get(attr).copied().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(DELIMITER.to_string().as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple() -> Tuple {
        Tuple::parse("1,alice,sydney", 3).unwrap()
    }

    #[test]
    fn test_parse_all() {
        assert_eq!(Projection::parse("*", 3).unwrap(), Projection::All);
        assert_eq!(Projection::parse(" * ", 1).unwrap(), Projection::All);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            Projection::parse("3,1", 3).unwrap(),
            Projection::Attributes(vec![2, 0])
        );
        assert_eq!(
            Projection::parse("2, 2", 3).unwrap(),
            Projection::Attributes(vec![1, 1])
        );
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["0", "4", "a", "", "1,,2", "1,2,3,1"] {
            let result = Projection::parse(text, 3);
            assert!(
                matches!(result, Err(LinHashError::InvalidProjection(_))),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_project() {
        let t = tuple();
        assert_eq!(Projection::All.project(&t), "1,alice,sydney");
        assert_eq!(Projection::parse("3,1", 3).unwrap().project(&t), "sydney,1");
        assert_eq!(Projection::parse("2,2", 3).unwrap().project(&t), "alice,alice");
    }

    #[test]
    fn test_project_leaves_tuple_untouched() {
        let t = tuple();
        let projection = Projection::parse("2", 3).unwrap();
        assert_eq!(projection.project(&t), "alice");
        assert_eq!(t.as_str(), "1,alice,sydney");
        assert_eq!(projection.project(&t), "alice");
    }
}
