//! The checked-in migrations must describe the current entity schema.

use std::path::PathBuf;

use hatch_migrate::{diff, MigrationSet};
use hatch_server::entity_schema;

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../migrations")
}

#[test]
fn migrations_are_up_to_date() {
    let set = MigrationSet::load(migrations_dir()).unwrap();
    let head = set.graph().head().unwrap().map(str::to_owned);
    assert!(head.is_some(), "no migrations checked in");

    let snapshot = set.snapshot(head.as_deref()).unwrap();
    let pending = diff(&snapshot, &entity_schema());
    assert!(
        pending.is_empty(),
        "entity schema changed without a migration, run `hatch db migrate -m <message>`: {pending:?}"
    );
}
