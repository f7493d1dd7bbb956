//! Validation of persisted session records.
//!
//! A record that fails any check is discarded and the session starts a
//! fresh game instead, so every failure here is a [`RejectReason`] for the
//! log rather than an error for the player.

use serde_json::Value;

use crate::error::RejectReason;
use crate::grid::{Grid, GridSize};

/// A session record that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    pub grid: Grid,
    pub score: u64,
}

/// Parse and validate the session record `raw`.
///
/// A missing or falsy `size` means "the configured size", and a numeric
/// string is accepted as a size, matching what older builds wrote.
pub fn parse_saved_session(raw: &str, configured: GridSize) -> Result<SavedSession, RejectReason> {
    let value: Value = serde_json::from_str(raw).map_err(|_| RejectReason::Malformed)?;
    let obj = value.as_object().ok_or(RejectReason::NotAnObject)?;

    let declared = declared_size(obj.get("size"), configured)?;
    let size = usize::try_from(declared)
        .ok()
        .and_then(GridSize::new)
        .ok_or(RejectReason::SizeOutOfRange(declared))?;

    let grid = parse_grid(obj.get("grid"), size)?;
    let score = obj
        .get("score")
        .and_then(Value::as_u64)
        .ok_or(RejectReason::BadScore)?;

    Ok(SavedSession { grid, score })
}

fn declared_size(value: Option<&Value>, configured: GridSize) -> Result<i64, RejectReason> {
    let configured = configured.get() as i64;
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(configured),
        Some(Value::String(s)) if s.is_empty() => Ok(configured),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| RejectReason::SizeNotInteger),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(configured),
            Some(n) => Ok(n),
            None => Err(RejectReason::SizeNotInteger),
        },
        Some(_) => Err(RejectReason::SizeNotInteger),
    }
}

fn parse_grid(value: Option<&Value>, size: GridSize) -> Result<Grid, RejectReason> {
    let n = size.get();
    let rows = value
        .and_then(Value::as_array)
        .ok_or(RejectReason::GridNotArray)?;
    if rows.len() != n {
        return Err(RejectReason::RowCount {
            expected: n,
            found: rows.len(),
        });
    }

    let mut out = Vec::with_capacity(n);
    for (r, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or(RejectReason::ColumnCount {
            row: r,
            expected: n,
            found: 0,
        })?;
        if cells.len() != n {
            return Err(RejectReason::ColumnCount {
                row: r,
                expected: n,
                found: cells.len(),
            });
        }
        let parsed = cells
            .iter()
            .enumerate()
            .map(|(c, cell)| {
                cell.as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or(RejectReason::BadCell { row: r, col: c })
            })
            .collect::<Result<Vec<u32>, _>>()?;
        out.push(parsed);
    }

    Grid::from_rows(out).ok_or(RejectReason::GridNotArray)
}
