mod common;

use common::{Field, ScriptedConnection, padded_point_blob};
use mssql_featureset::odbc::HandleType;
use mssql_featureset::{
    AttributeType, GeometryError, LayerDescriptor, MssqlError, MssqlFeatureset,
};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

// A length no other allocation in these tests uses.
const BLOB_LEN: usize = 7919;

thread_local! {
    static LIVE_BLOB_BUFFERS: Cell<isize> = const { Cell::new(0) };
}

struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() && layout.size() == BLOB_LEN {
            let _ = LIVE_BLOB_BUFFERS.try_with(|live| live.set(live.get() + 1));
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == BLOB_LEN {
            let _ = LIVE_BLOB_BUFFERS.try_with(|live| live.set(live.get() - 1));
        }
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn live_blob_buffers() -> isize {
    LIVE_BLOB_BUFFERS.with(Cell::get)
}

fn descriptor() -> LayerDescriptor {
    LayerDescriptor::new("utf-8")
        .with_attribute("shape", AttributeType::Geometry)
        .with_attribute("count", AttributeType::Integer)
}

fn bad_version_blob() -> Vec<u8> {
    let mut blob = padded_point_blob(1.0, 2.0, BLOB_LEN);
    blob[4] = 9;
    blob
}

/// Reads the single scripted row and checks no blob-sized buffer outlives the call.
fn read_one(row: Vec<Field>) -> mssql_featureset::Result<usize> {
    let conn = ScriptedConnection::new(vec![row]);
    let mut features = MssqlFeatureset::new(&conn, "SELECT shape, count FROM t", &descriptor())?;

    let before = live_blob_buffers();
    let result = features.next_feature();
    assert_eq!(live_blob_buffers(), before, "geometry buffer leaked");

    result.map(|feature| feature.map_or(0, |f| f.geometries().len()))
}

#[test]
fn buffer_released_after_successful_row() -> mssql_featureset::Result<()> {
    let parts = read_one(vec![
        Field::Binary(padded_point_blob(1.0, 2.0, BLOB_LEN)),
        Field::Int(3),
    ])?;
    assert_eq!(parts, 1);
    Ok(())
}

#[test]
fn buffer_released_after_decode_failure() {
    let err = read_one(vec![Field::Binary(bad_version_blob()), Field::Int(3)])
        .expect_err("bad version");
    assert!(matches!(
        err,
        MssqlError::Geometry {
            source: GeometryError::UnsupportedVersion(9),
            ..
        }
    ));
}

#[test]
fn buffer_released_after_transfer_failure() {
    let err = read_one(vec![Field::BinaryTransferFails(BLOB_LEN), Field::Int(3)])
        .expect_err("transfer failure");
    assert!(matches!(
        err,
        MssqlError::Odbc {
            operation: "could not get geometry data into buffer",
            handle: HandleType::Stmt,
            ..
        }
    ));
}

#[test]
fn buffer_released_when_a_later_column_fails() {
    let err = read_one(vec![
        Field::Binary(padded_point_blob(1.0, 2.0, BLOB_LEN)),
        Field::Fail("22003"),
    ])
    .expect_err("integer read fails");
    match err {
        MssqlError::Odbc {
            operation,
            diagnostics,
            ..
        } => {
            assert_eq!(operation, "could not get int data");
            assert_eq!(diagnostics[0].state, "22003");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn construction_failures_release_the_statement() {
    let conn = ScriptedConnection {
        fail_exec: true,
        ..Default::default()
    };
    let err = MssqlFeatureset::new(&conn, "SELEC", &descriptor())
        .err()
        .expect("exec fails");
    assert!(matches!(
        err,
        MssqlError::Odbc {
            operation: "could not execute statement",
            handle: HandleType::Stmt,
            ..
        }
    ));
    assert_eq!(conn.allocated.get(), 1);
    assert_eq!(conn.freed.get(), 1);

    let conn = ScriptedConnection {
        fail_alloc: true,
        ..Default::default()
    };
    let err = MssqlFeatureset::new(&conn, "SELECT 1", &descriptor())
        .err()
        .expect("alloc fails");
    assert!(matches!(
        err,
        MssqlError::Odbc {
            operation: "could not allocate statement",
            handle: HandleType::Dbc,
            ..
        }
    ));
    assert_eq!(conn.allocated.get(), 0);
    assert_eq!(conn.freed.get(), 0);
}

#[test]
fn unsupported_encoding_allocates_nothing() {
    let conn = ScriptedConnection::default();
    let descriptor = LayerDescriptor::new("ebcdic").with_attribute("n", AttributeType::Integer);
    let err = MssqlFeatureset::new(&conn, "SELECT 1", &descriptor)
        .err()
        .expect("unknown encoding");
    assert!(matches!(err, MssqlError::UnsupportedEncoding(label) if label == "ebcdic"));
    assert_eq!(conn.allocated.get(), 0);
}

#[test]
fn statement_freed_once_on_close_and_drop() -> mssql_featureset::Result<()> {
    let conn = ScriptedConnection::new(vec![vec![
        Field::Binary(padded_point_blob(1.0, 2.0, 22)),
        Field::Int(1),
    ]]);
    {
        let mut features = MssqlFeatureset::new(&conn, "SELECT shape, count FROM t", &descriptor())?;
        features.close();
        features.close();
        assert!(matches!(
            features.next_feature(),
            Err(MssqlError::StatementClosed)
        ));
        assert!(features.next().is_none());
    }
    assert_eq!(conn.allocated.get(), 1);
    assert_eq!(conn.freed.get(), 1);

    {
        let mut features = MssqlFeatureset::new(&conn, "SELECT shape, count FROM t", &descriptor())?;
        let feature = features.next_feature()?.expect("one row");
        assert_eq!(feature.geometries().len(), 1);
        assert_eq!(feature.property::<i64>("count")?, Some(1));
    }
    assert_eq!(conn.allocated.get(), 2);
    assert_eq!(conn.freed.get(), 2);
    Ok(())
}

#[test]
fn failure_on_row_k_keeps_earlier_identities() -> mssql_featureset::Result<()> {
    let row = || vec![Field::Binary(padded_point_blob(0.0, 0.0, 22)), Field::Int(7)];
    let conn = ScriptedConnection {
        rows: vec![row(), row(), row(), row()],
        fail_fetch_at: Some(2),
        ..Default::default()
    };
    let mut features = MssqlFeatureset::new(&conn, "SELECT shape, count FROM t", &descriptor())?;

    assert_eq!(features.next_feature()?.map(|f| f.id()), Some(1));
    assert_eq!(features.next_feature()?.map(|f| f.id()), Some(2));
    let err = features.next_feature().err().expect("fetch fails on row 3");
    assert!(matches!(
        err,
        MssqlError::Odbc {
            operation: "could not fetch result",
            ..
        }
    ));
    assert!(features.next_feature()?.is_none());
    assert!(features.next().is_none());
    Ok(())
}

#[test]
fn row_after_a_failed_row_gets_the_next_identity() -> mssql_featureset::Result<()> {
    let conn = ScriptedConnection::new(vec![
        vec![Field::Binary(padded_point_blob(1.0, 1.0, 22)), Field::Int(1)],
        vec![Field::Binary(bad_version_blob()), Field::Int(2)],
        vec![Field::Binary(padded_point_blob(3.0, 3.0, 22)), Field::Fail("22003")],
        vec![Field::Binary(padded_point_blob(4.0, 4.0, 22)), Field::Int(4)],
    ]);
    let mut features = MssqlFeatureset::new(&conn, "SELECT shape, count FROM t", &descriptor())?;

    let mut outcomes = Vec::new();
    for result in features.by_ref() {
        outcomes.push(result.map(|feature| (feature.id(), feature.property::<i64>("count"))));
    }
    assert_eq!(outcomes.len(), 4);
    assert!(matches!(outcomes[0], Ok((1, Ok(Some(1))))));
    assert!(matches!(outcomes[1], Err(MssqlError::Geometry { .. })));
    assert!(matches!(outcomes[2], Err(MssqlError::Odbc { .. })));
    assert!(matches!(outcomes[3], Ok((2, Ok(Some(4))))));
    assert!(features.next_feature()?.is_none());
    Ok(())
}

#[test]
fn null_geometry_is_unreadable() -> mssql_featureset::Result<()> {
    let conn = ScriptedConnection::new(vec![
        vec![Field::Null, Field::Int(1)],
        vec![Field::Binary(padded_point_blob(2.0, 2.0, 22)), Field::Int(2)],
    ]);
    let mut features = MssqlFeatureset::new(&conn, "SELECT shape, count FROM t", &descriptor())?;

    let err = features.next_feature().err().expect("null geometry");
    assert!(matches!(
        err,
        MssqlError::Odbc {
            operation: "could not get geometry data - failed to get buffer length",
            handle: HandleType::Stmt,
            ..
        }
    ));
    assert_eq!(features.next_feature()?.map(|f| f.id()), Some(1));
    Ok(())
}
