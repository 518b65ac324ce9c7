//! Database query functions organized by table.

pub mod build_runs;
pub mod graph_nodes;
pub mod seeders;

use rusqlite::types::Type;
use rusqlite::Row;
use wot_types::Pubkey;

/// Read a hex pubkey column, rejecting malformed values.
pub(crate) fn pubkey_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Pubkey> {
    let raw: String = row.get(idx)?;
    Pubkey::parse(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read an optional non-negative integer column as `u64`.
pub(crate) fn opt_u64_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|v| v as u64))
}
