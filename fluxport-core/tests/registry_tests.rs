//! Registry integration tests: manifest error messages, last-write-wins and
//! concurrent access.

use std::sync::Arc;
use std::thread;

use assert_fs::prelude::*;
use fluxport_core::{
    registry::{self, UnitManifest},
    BizType, ConfigRegistry, ExportUnit, ParamShape, RegistryError,
};
use predicates::prelude::predicate;
use rstest::rstest;

fn unit(biz: &str, op: &str) -> ExportUnit {
    ExportUnit::new(biz, "order_service", op, ParamShape::from("OrderParams"))
}

// ---------------------------------------------------------------------------
// 1. Manifest loading
// ---------------------------------------------------------------------------

#[test]
fn manifest_entries_register_in_file_order() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("units.yaml");
    file.write_str(
        "units:\n\
         \x20 - biz_type: ORDER_EXPORT\n\
         \x20   target: order_service\n\
         \x20   operation: query_orders\n\
         \x20   param_shape: OrderParams\n\
         \x20   authorizer: order_managers\n\
         \x20 - biz_type: ORDER_EXPORT\n\
         \x20   target: order_service\n\
         \x20   operation: query_orders_v2\n\
         \x20   param_shape: OrderParams\n",
    )
    .expect("write");

    let registry = ConfigRegistry::from_manifest_at(file.path()).expect("load");
    let unit = registry.get(&BizType::from("ORDER_EXPORT")).expect("registered");
    assert_eq!(unit.operation, "query_orders_v2", "later entry must win");
    assert_eq!(unit.custom_authorizer(), None);
}

#[rstest]
#[case::not_a_mapping("- just a list\n")]
#[case::unit_missing_fields("units:\n  - biz_type: A\n")]
#[case::broken_yaml(": : corrupt : yaml : !!!\n  - broken: [unclosed")]
fn malformed_manifest_reports_path(#[case] contents: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("units.yaml");
    file.write_str(contents).expect("write");

    let err = registry::load_manifest_at(file.path()).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("units.yaml"));
}

#[test]
fn blank_biz_type_is_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("units.yaml");
    file.write_str(
        "units:\n  - biz_type: \"  \"\n    target: t\n    operation: o\n    param_shape: json\n",
    )
    .expect("write");

    let err = registry::load_manifest_at(file.path()).unwrap_err();
    assert!(matches!(err, RegistryError::BlankBizType { .. }), "got: {err}");
}

#[test]
fn saved_manifest_is_readable_yaml() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("nested").child("units.yaml");
    let manifest = UnitManifest {
        units: vec![unit("REPORT_EXPORT", "query_reports")],
    };
    registry::save_manifest_at(file.path(), &manifest).expect("save");

    file.assert(predicate::str::contains("biz_type: REPORT_EXPORT"));
    file.assert(predicate::str::contains("param_shape: OrderParams"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

// ---------------------------------------------------------------------------
// 2. Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_register_and_lookup_never_sees_partial_units() {
    let registry = Arc::new(ConfigRegistry::new());
    let mut handles = Vec::new();

    for writer in 0..4 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for round in 0..200 {
                let op = format!("op_{writer}_{round}");
                registry.register(
                    ExportUnit::new("SHARED", "svc", op.clone(), ParamShape::from("json"))
                        .with_authorizer(op),
                );
            }
        }));
    }
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                if let Some(unit) = registry.get(&BizType::from("SHARED")) {
                    assert_eq!(unit.authorizer.as_deref(), Some(unit.operation.as_str()));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("thread");
    }

    assert_eq!(registry.len(), 1);
}
