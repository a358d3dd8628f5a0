//! Drivers shipped with the crate.

use super::{Driver, ValuesCache};
use crate::error::DriverError;
use crate::mapper::{CellViews, InPlaceOutcome, RebuildBatch, RebuildOutput};
use serde_json::{Map, Value};

/// Look up a built-in driver by name.
pub fn builtin(name: &str) -> Option<Box<dyn Driver>> {
    match name {
        "passthrough" => Some(Box::new(PassThroughDriver)),
        "identity" => Some(Box::new(IdentityDriver)),
        "bytea-hex" => Some(Box::new(ByteaHexDriver)),
        "envelope" => Some(Box::new(EnvelopeDriver)),
        _ => None,
    }
}

/// Forwards everything to the adaptee and never maps a result.
///
/// Stands in for the driver when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughDriver;

impl Driver for PassThroughDriver {
    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Writes every value back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDriver;

impl Driver for IdentityDriver {
    fn name(&self) -> &str {
        "identity"
    }

    fn map_result_in_place(
        &mut self,
        _cache: &mut ValuesCache,
        cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        for cell in cells.iter_mut() {
            if let Some(value) = cell.bytes().map(<[u8]>::to_vec) {
                cell.write(&value)?;
            }
        }
        Ok(InPlaceOutcome::Mapped)
    }

    fn map_result_rebuild(
        &mut self,
        _cache: &mut ValuesCache,
        batch: &RebuildBatch<'_>,
    ) -> Result<RebuildOutput, DriverError> {
        Ok(RebuildOutput::new(
            batch.columns().iter().map(|c| c.to_string()).collect(),
            batch
                .values()
                .iter()
                .map(|v| v.map(<[u8]>::to_vec))
                .collect(),
        ))
    }
}

/// Decodes hex-format bytea text (`\x68656c6c6f`) into raw bytes in place.
///
/// Decoded output is always half the hex length, so it fits the original
/// cell. Values that are not hex bytea are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteaHexDriver;

impl Driver for ByteaHexDriver {
    fn name(&self) -> &str {
        "bytea-hex"
    }

    fn map_result_in_place(
        &mut self,
        cache: &mut ValuesCache,
        cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        for cell in cells.iter_mut() {
            let Some(source) = cell.bytes() else {
                continue;
            };
            let cached = cache.get(source).map(<[u8]>::to_vec);
            let decoded = match cached {
                Some(hit) => hit,
                None => match decode_bytea_hex(source)? {
                    Some(decoded) => {
                        cache.insert(source.to_vec(), decoded.clone());
                        decoded
                    }
                    None => continue,
                },
            };
            cell.write(&decoded)?;
        }
        Ok(InPlaceOutcome::Mapped)
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// `Ok(None)` when `text` is not hex bytea.
fn decode_bytea_hex(text: &[u8]) -> Result<Option<Vec<u8>>, DriverError> {
    let Some(hex) = text.strip_prefix(b"\\x") else {
        return Ok(None);
    };
    if hex.len() % 2 != 0 {
        return Ok(None);
    }

    let mut out = Vec::new();
    out.try_reserve_exact(hex.len() / 2)
        .map_err(|e| DriverError::Allocation(e.to_string()))?;
    for pair in hex.chunks_exact(2) {
        let (Some(hi), Some(lo)) = (nibble(pair[0]), nibble(pair[1])) else {
            return Ok(None);
        };
        out.push((hi << 4) | lo);
    }
    Ok(Some(out))
}

/// Expands JSON envelope columns into one column per key.
///
/// A column is an envelope when it has at least one non-null cell and
/// every non-null cell is a JSON object. Its replacement columns are the
/// union of object keys, in first-seen order. Missing keys and null
/// envelopes become NULL; string members map to their raw text, other
/// members to their JSON text. Non-envelope columns pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeDriver;

enum ColumnPlan {
    Keep,
    Expand {
        keys: Vec<String>,
        objects: Vec<Option<Map<String, Value>>>,
    },
}

impl Driver for EnvelopeDriver {
    fn name(&self) -> &str {
        "envelope"
    }

    fn map_result_rebuild(
        &mut self,
        _cache: &mut ValuesCache,
        batch: &RebuildBatch<'_>,
    ) -> Result<RebuildOutput, DriverError> {
        let plans: Vec<ColumnPlan> = (0..batch.column_count())
            .map(|col| plan_column(batch, col))
            .collect();

        if plans.iter().all(|p| matches!(p, ColumnPlan::Keep)) {
            return Ok(RebuildOutput::empty());
        }

        let mut columns = Vec::new();
        for (col, plan) in plans.iter().enumerate() {
            match plan {
                ColumnPlan::Keep => columns.push(batch.columns()[col].to_string()),
                ColumnPlan::Expand { keys, .. } => columns.extend(keys.iter().cloned()),
            }
        }

        let mut values = Vec::with_capacity(batch.rows() * columns.len());
        for row in 0..batch.rows() {
            for (col, plan) in plans.iter().enumerate() {
                match plan {
                    ColumnPlan::Keep => values.push(batch.value(row, col).map(<[u8]>::to_vec)),
                    ColumnPlan::Expand { keys, objects } => {
                        let object = objects[row].as_ref();
                        values.extend(
                            keys.iter()
                                .map(|key| object.and_then(|o| o.get(key)).and_then(render)),
                        );
                    }
                }
            }
        }

        Ok(RebuildOutput::new(columns, values))
    }
}

fn plan_column(batch: &RebuildBatch<'_>, col: usize) -> ColumnPlan {
    let mut keys: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(batch.rows());

    for row in 0..batch.rows() {
        let Some(bytes) = batch.value(row, col) else {
            objects.push(None);
            continue;
        };
        let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(bytes) else {
            return ColumnPlan::Keep;
        };
        for key in object.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        objects.push(Some(object));
    }

    if keys.is_empty() {
        ColumnPlan::Keep
    } else {
        ColumnPlan::Expand { keys, objects }
    }
}

fn render(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.as_bytes().to_vec()),
        other => Some(other.to_string().into_bytes()),
    }
}
