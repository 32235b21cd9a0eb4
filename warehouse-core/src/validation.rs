//! Header validation: declared keys against the live table.

use crate::models::{HeaderSet, KeySet};

/// Difference between the declared and observed columns of a table.
///
/// Both lists are sorted; together they are exactly the symmetric difference
/// of the two column sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderMismatch {
    /// Declared but absent from the live table
    pub missing: Vec<String>,
    /// Present on the live table but not declared
    pub unexpected: Vec<String>,
}

/// Order-independent comparison of observed headers with declared keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Succeeds when `observed` equals `primary_keys ∪ data_keys` as a set.
    ///
    /// # Errors
    /// Returns the sorted diff when any column is missing or unexpected.
    ///
    /// # Example
    /// ```rust
    /// use warehouse_core::{HeaderSet, KeySet, SchemaValidator};
    ///
    /// let keys = KeySet::new(["id"], ["value", "ts"]);
    /// let observed: HeaderSet = ["id", "value"].into_iter().map(String::from).collect();
    ///
    /// let mismatch = SchemaValidator.validate(&observed, &keys).unwrap_err();
    /// assert_eq!(mismatch.missing, vec!["ts".to_string()]);
    /// assert!(mismatch.unexpected.is_empty());
    /// ```
    pub fn validate(&self, observed: &HeaderSet, expected: &KeySet) -> Result<(), HeaderMismatch> {
        let expected = expected.expected_headers();

        // BTreeSet differences iterate in sorted order
        let missing: Vec<String> = expected.difference(observed).cloned().collect();
        let unexpected: Vec<String> = observed.difference(&expected).cloned().collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(HeaderMismatch {
                missing,
                unexpected,
            })
        }
    }
}
