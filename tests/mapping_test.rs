mod common;

use common::{Recording, bytes, client, connect, count, events};
use pqext::driver::{ByteaHexDriver, EnvelopeDriver, IdentityDriver, PassThroughDriver};
use pqext::prelude::*;
use pretty_assertions::assert_eq;

/// Rebuild driver that splits a `"first last"` column into two columns.
struct SplitName;

impl Driver for SplitName {
    fn map_result_rebuild(
        &mut self,
        _cache: &mut ValuesCache,
        batch: &RebuildBatch<'_>,
    ) -> Result<RebuildOutput, DriverError> {
        let mut values = Vec::new();
        for row in 0..batch.rows() {
            match batch.value(row, 0) {
                Some(full) => {
                    let text = String::from_utf8_lossy(full).into_owned();
                    let (first, last) = text.split_once(' ').unwrap_or((text.as_str(), ""));
                    values.push(Some(first.as_bytes().to_vec()));
                    values.push(Some(last.as_bytes().to_vec()));
                }
                None => values.extend([None, None]),
            }
        }
        Ok(RebuildOutput::new(
            vec!["first_name".into(), "last_name".into()],
            values,
        ))
    }
}

/// Upper-cases every value in place.
struct Upper;

impl Driver for Upper {
    fn map_result_in_place(
        &mut self,
        _cache: &mut ValuesCache,
        cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        for cell in cells.iter_mut() {
            if let Some(upper) = cell.bytes().map(<[u8]>::to_ascii_uppercase) {
                cell.write(&upper)
                    .map_err(|e| DriverError::Mapping(e.to_string()))?;
            }
        }
        Ok(InPlaceOutcome::Mapped)
    }
}

/// Keeps the first byte of every non-null value.
struct FirstByte;

impl Driver for FirstByte {
    fn map_result_in_place(
        &mut self,
        _cache: &mut ValuesCache,
        cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        for cell in cells.iter_mut() {
            if !cell.is_null() && !cell.is_empty() {
                cell.truncate(1)
                    .map_err(|e| DriverError::Mapping(e.to_string()))?;
            }
        }
        Ok(InPlaceOutcome::Mapped)
    }
}

/// Upper-cases cells until it gives up partway through the batch.
struct GivesUp {
    error: bool,
}

impl Driver for GivesUp {
    fn map_result_in_place(
        &mut self,
        _cache: &mut ValuesCache,
        cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        for cell in cells.iter_mut() {
            if cell.bytes() == Some(&b"stop"[..]) {
                if self.error {
                    return Err(DriverError::Mapping("unknown key id".into()));
                }
                return Ok(InPlaceOutcome::Unmapped);
            }
            if let Some(upper) = cell.bytes().map(<[u8]>::to_ascii_uppercase) {
                cell.write(&upper)?;
            }
        }
        Ok(InPlaceOutcome::Mapped)
    }
}

struct OutOfMemory;

impl Driver for OutOfMemory {
    fn map_result_in_place(
        &mut self,
        _cache: &mut ValuesCache,
        _cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        Err(DriverError::Allocation("scratch buffer".into()))
    }
}

/// Returns one value too few for its declared columns.
struct ShortRebuild;

impl Driver for ShortRebuild {
    fn map_result_rebuild(
        &mut self,
        _cache: &mut ValuesCache,
        batch: &RebuildBatch<'_>,
    ) -> Result<RebuildOutput, DriverError> {
        let values = vec![bytes("x"); batch.rows() * 2 - 1];
        Ok(RebuildOutput::new(vec!["a".into(), "b".into()], values))
    }
}

#[test]
fn test_in_place_identity_keeps_values_and_nulls() {
    let ev = events();
    let mut conn = connect(
        client(&["secret"], vec![vec![bytes("abc")], vec![None]]),
        Recording::new(IdentityDriver, &ev),
        MappingStrategy::InPlace,
    );

    let results = conn.query("SELECT secret FROM t").unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];

    assert_eq!(result.value(0, 0), Some(&b"abc"[..]));
    assert_eq!(result.length(0, 0), 3);
    assert!(result.is_null(1, 0));
    assert_eq!(result.length(1, 0), 0);

    assert_eq!(count(&ev, "map_in_place"), 1);
    assert_eq!(count(&ev, "clear"), 1);
}

#[test]
fn test_rebuild_expands_one_column_into_two() {
    let rows = vec![
        vec![bytes("Ada Lovelace")],
        vec![None],
        vec![bytes("Alan Turing")],
    ];
    let mut conn = connect(client(&["name"], rows), SplitName, MappingStrategy::Rebuild);

    conn.send_query("SELECT name FROM people").unwrap();
    let result = conn.get_result().unwrap();

    assert_eq!(result.status(), ExecStatus::TuplesOk);
    assert_eq!(result.row_count(), 3);
    assert_eq!(result.column_count(), 2);
    assert_eq!(result.column_name(0), Some("first_name"));
    assert_eq!(result.column_index("last_name"), Some(1));

    assert_eq!(
        result.cells(),
        &[
            bytes("Ada"),
            bytes("Lovelace"),
            None,
            None,
            bytes("Alan"),
            bytes("Turing"),
        ]
    );
    assert!(result.is_null(1, 1));
    assert_eq!(result.length(2, 1), 6);

    assert!(conn.get_result().is_none());
    assert_eq!(conn.query_state(), Some(QueryState::Idle));
}

#[test]
fn test_rebuild_without_columns_returns_original() {
    let ev = events();
    let rows = vec![vec![bytes("1"), bytes("plain")], vec![bytes("2"), None]];
    let expected = ResultSet::from_rows(&["id", "note"], rows.clone()).unwrap();

    let mut conn = connect(
        client(&["id", "note"], rows),
        Recording::new(PassThroughDriver, &ev),
        MappingStrategy::Rebuild,
    );
    let results = conn.query("SELECT id, note FROM t").unwrap();

    assert_eq!(results, vec![expected]);
    assert_eq!(count(&ev, "map_rebuild"), 1);
    assert_eq!(count(&ev, "clear"), 1);
}

#[test]
fn test_in_place_write_applies_new_bytes() {
    let mut conn = connect(
        client(&["a", "b"], vec![vec![bytes("abc"), None], vec![bytes(""), bytes("xy")]]),
        Upper,
        MappingStrategy::InPlace,
    );
    let result = conn.query("SELECT a, b FROM t").unwrap().remove(0);

    assert_eq!(result.value(0, 0), Some(&b"ABC"[..]));
    assert!(result.is_null(0, 1));
    assert_eq!(result.value(1, 0), Some(&b""[..]));
    assert!(!result.is_null(1, 0));
    assert_eq!(result.value(1, 1), Some(&b"XY"[..]));
}

#[test]
fn test_in_place_lengths_only_shrink() {
    let rows = vec![vec![bytes("hello"), bytes("")], vec![None, bytes("world")]];
    let original = ResultSet::from_rows(&["a", "b"], rows.clone()).unwrap();

    let mut conn = connect(client(&["a", "b"], rows), FirstByte, MappingStrategy::InPlace);
    let mapped = conn.query("SELECT a, b FROM t").unwrap().remove(0);

    for row in 0..original.row_count() {
        for col in 0..original.column_count() {
            assert!(mapped.length(row, col) <= original.length(row, col));
            assert_eq!(mapped.is_null(row, col), original.is_null(row, col));
        }
    }
    assert_eq!(mapped.value(0, 0), Some(&b"h"[..]));
    assert_eq!(mapped.value(1, 1), Some(&b"w"[..]));
}

#[test]
fn test_allocation_failure_yields_fatal_error() {
    let ev = events();
    let mut conn = connect(
        client(&["secret"], vec![vec![bytes("abc")]]),
        Recording::new(OutOfMemory, &ev),
        MappingStrategy::InPlace,
    );

    let results = conn.query("SELECT secret FROM t").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), ExecStatus::FatalError);
    assert!(
        results[0]
            .error_message()
            .unwrap()
            .contains("Unable to allocate memory")
    );
    assert!(ev.borrow().iter().any(|e| e.starts_with("error: ")));

    // The connection is still usable and the cache was still cleared.
    assert_eq!(count(&ev, "clear"), 1);
    assert_eq!(conn.query_state(), Some(QueryState::Idle));
    conn.send_query("SELECT 1").unwrap();
    assert_eq!(conn.query_state(), Some(QueryState::QuerySent));
}

#[test]
fn test_mismatched_rebuild_keeps_original() {
    let ev = events();
    let rows = vec![vec![bytes("1")], vec![bytes("2")]];
    let expected = ResultSet::from_rows(&["id"], rows.clone()).unwrap();

    let mut conn = connect(
        client(&["id"], rows),
        Recording::new(ShortRebuild, &ev),
        MappingStrategy::Rebuild,
    );
    let results = conn.query("SELECT id FROM t").unwrap();

    assert_eq!(results, vec![expected]);
    let errors: Vec<String> = ev
        .borrow()
        .iter()
        .filter(|e| e.starts_with("error: "))
        .cloned()
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("3 values for 2 rows x 2 columns"));
}

#[test]
fn test_command_results_skip_the_driver() {
    let ev = events();
    let mut conn = connect(
        pqext::replay::ReplayClient::new("app", vec![ResultSet::command_ok()]),
        Recording::new(IdentityDriver, &ev),
        MappingStrategy::Rebuild,
    );

    let results = conn.query("UPDATE t SET a = 1").unwrap();
    assert_eq!(results, vec![ResultSet::command_ok()]);
    assert_eq!(count(&ev, "map_rebuild"), 0);
    assert_eq!(count(&ev, "clear"), 1);
}

#[test]
fn test_bytea_hex_decodes_in_place() {
    let rows = vec![
        vec![bytes("1"), bytes("\\x68656c6c6f")],
        vec![bytes("2"), None],
        vec![bytes("3"), bytes("\\x68656c6c6f")],
    ];
    let mut conn = connect(client(&["id", "payload"], rows), ByteaHexDriver, MappingStrategy::InPlace);

    let result = conn.query("SELECT id, payload FROM blobs").unwrap().remove(0);
    assert_eq!(result.value(0, 0), Some(&b"1"[..]));
    assert_eq!(result.value(0, 1), Some(&b"hello"[..]));
    assert!(result.is_null(1, 1));
    assert_eq!(result.value(2, 1), Some(&b"hello"[..]));

    // Drained: the per-query cache is empty again.
    let cache = conn.driver_handle().unwrap().cache();
    assert!(cache.is_empty());
    assert_eq!(cache.generation(), 1);
}

#[test]
fn test_envelope_expands_json_columns() {
    let rows = vec![
        vec![bytes("1"), bytes(r#"{"email":"ada@example.com","age":36}"#)],
        vec![bytes("2"), None],
        vec![bytes("3"), bytes(r#"{"email":"alan@example.com"}"#)],
    ];
    let mut conn = connect(client(&["id", "profile"], rows), EnvelopeDriver, MappingStrategy::Rebuild);

    let result = conn.query("SELECT id, profile FROM users").unwrap().remove(0);
    let names: Vec<&str> = result.schema().names().collect();
    assert_eq!(names, vec!["id", "email", "age"]);

    let first = result.row(0).unwrap();
    assert_eq!(first.get_string_by_name("email"), Some("ada@example.com".into()));
    assert_eq!(first.get_i64(2), Some(36));

    assert!(result.row(1).unwrap().is_null_by_name("email"));
    assert!(result.is_null(2, 2));
}

#[test]
fn test_partial_in_place_mapping_is_discarded() {
    for error in [true, false] {
        let ev = events();
        let rows = vec![vec![bytes("cipher")], vec![bytes("text")], vec![bytes("stop")]];
        let expected = ResultSet::from_rows(&["v"], rows.clone()).unwrap();

        let mut conn = connect(
            client(&["v"], rows),
            Recording::new(GivesUp { error }, &ev),
            MappingStrategy::InPlace,
        );
        let results = conn.query("SELECT v FROM t").unwrap();

        assert_eq!(results, vec![expected]);
        assert_eq!(ev.borrow().iter().any(|e| e.starts_with("error: ")), error);
    }
}
