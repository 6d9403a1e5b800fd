//! Row codec (C1): deterministic serialization of a row / PK tuple to bytes.
//!
//! The canonical text form of each column is supplied by the caller — this
//! crate never talks to a database. `pgsum-postgres` is responsible for
//! producing that text the same way for bootstrap, the trigger capture, and
//! the streaming fingerprint (all three cast columns with `::text`), which
//! is what makes the three paths comparable at all.

/// NULL sentinel substituted for a missing column value (§4.1).
pub const NULL_SENTINEL: &str = "\u{2205}";
/// Unit-separator byte sequence appended after every column (§4.1), U+241F.
pub const COLUMN_SEPARATOR: &str = "\u{241F}";

/// Encode a row (or a primary-key projection) to its canonical byte string.
///
/// `columns` must already be in the declared order the caller wants encoded
/// (all non-dropped columns for `row_bytes`, just the PK projection for
/// `pk_bytes`). `None` represents SQL NULL. The separator trails every
/// column, including the last, matching the worked example in §8.
pub fn encode_columns(columns: &[Option<&str>]) -> Vec<u8> {
    let mut buf = String::new();
    for col in columns {
        match col {
            Some(text) => buf.push_str(text),
            None => buf.push_str(NULL_SENTINEL),
        }
        buf.push_str(COLUMN_SEPARATOR);
    }
    buf.into_bytes()
}

/// Build `pk_bytes` from the primary-key column values, in PK-declared order.
pub fn pk_bytes(pk_values: &[Option<&str>]) -> Vec<u8> {
    encode_columns(pk_values)
}

/// Build `row_bytes` from every non-dropped column's values, in attribute order.
pub fn row_bytes(all_values: &[Option<&str>]) -> Vec<u8> {
    encode_columns(all_values)
}

/// Like [`row_bytes`], but rejects a value count that doesn't match the
/// watched table's pinned `column_order` length. Used wherever a row is
/// reconstructed from something other than a live catalog query (e.g. a
/// captured `change_queue` event), where schema drift since bootstrap
/// could otherwise silently produce a wrong digest.
pub fn row_bytes_checked(all_values: &[Option<&str>], expected_len: usize) -> crate::error::Result<Vec<u8>> {
    if all_values.len() != expected_len {
        return Err(crate::error::Error::ColumnCountMismatch {
            expected: expected_len,
            actual: all_values.len(),
        });
    }
    Ok(encode_columns(all_values))
}
