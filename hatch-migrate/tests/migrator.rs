//! Migration manager behaviour against the in-memory backend.

use std::fs;
use std::path::Path;

use hatch_migrate::manifest::MANIFEST_FILE;
use hatch_migrate::{
    ColumnDef, ColumnType, Manifest, MemoryMigrationBackend, MigrationBackend, MigrationError,
    MigrationSet, Migrator, Schema, TableDef, BASE, HEAD,
};
use proptest::prelude::*;

/// Schema with tables `t0..t{n-1}`.
fn models(n: usize) -> Schema {
    Schema::new(
        (0..n)
            .map(|i| {
                TableDef::new(format!("t{i}"))
                    .with_column(ColumnDef::new("id", ColumnType::BigSerial).primary_key())
                    .with_column(ColumnDef::new("label", ColumnType::Text).nullable())
            })
            .collect(),
    )
}

/// Directory with a linear chain of `n` generated revisions, oldest first.
fn chain(dir: &Path, n: usize) -> Vec<String> {
    let mut set = MigrationSet::load(dir).unwrap();
    (1..=n)
        .map(|i| set.generate(&format!("add table t{}", i - 1), &models(i)).unwrap().id)
        .collect()
}

fn migrator(dir: &Path) -> Migrator<MemoryMigrationBackend> {
    Migrator::new(MigrationSet::load(dir).unwrap(), MemoryMigrationBackend::new())
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn generate_writes_scripts_snapshot_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = MigrationSet::load(dir.path()).unwrap();

    let entry = set.generate("create users", &models(1)).unwrap();
    assert!(entry.parents.is_empty());
    assert!(entry.upgrade.ends_with("_create_users.up.sql"));

    let up = fs::read_to_string(dir.path().join(&entry.upgrade)).unwrap();
    let down = fs::read_to_string(dir.path().join(&entry.downgrade)).unwrap();
    assert!(up.contains("CREATE TABLE \"t0\""));
    assert!(down.contains("DROP TABLE \"t0\""));
    assert_eq!(Schema::read(&dir.path().join(&entry.snapshot)).unwrap(), models(1));

    let manifest = Manifest::load(dir.path()).unwrap();
    assert_eq!(manifest.revisions, vec![entry.clone()]);

    let next = set.generate("add t1", &models(2)).unwrap();
    assert_eq!(next.parents, vec![entry.id]);
}

#[test]
fn generate_on_up_to_date_head_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    chain(dir.path(), 2);
    let before = file_count(dir.path());
    let manifest = fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();

    let mut set = MigrationSet::load(dir.path()).unwrap();
    let err = set.generate("nothing", &models(2)).unwrap_err();

    assert!(matches!(err, MigrationError::EmptyDiff));
    assert_eq!(file_count(dir.path()), before);
    assert_eq!(fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap(), manifest);
}

#[tokio::test]
async fn upgrade_twice_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let ids = chain(dir.path(), 3);
    let migrator = migrator(dir.path());

    let first = migrator.upgrade(HEAD).await.unwrap();
    assert_eq!(first.applied, ids);
    let executed = migrator.backend().state().executed.len();

    let second = migrator.upgrade(HEAD).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(migrator.current().await.unwrap().as_deref(), Some(ids[2].as_str()));
    assert_eq!(migrator.backend().state().executed.len(), executed);
}

#[tokio::test]
async fn stamp_changes_only_the_recorded_revision() {
    let dir = tempfile::tempdir().unwrap();
    let ids = chain(dir.path(), 2);
    let migrator = migrator(dir.path());

    migrator.upgrade(&ids[0]).await.unwrap();
    let shape = migrator.backend().shape();

    let stamped = migrator.stamp(HEAD).await.unwrap();
    assert_eq!(stamped.as_deref(), Some(ids[1].as_str()));
    assert_eq!(migrator.current().await.unwrap(), stamped);
    assert_eq!(migrator.backend().shape(), shape);

    migrator.stamp(BASE).await.unwrap();
    assert_eq!(migrator.current().await.unwrap(), None);
    assert_eq!(migrator.backend().shape(), shape);
}

#[tokio::test]
async fn failed_upgrade_leaves_everything_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let ids = chain(dir.path(), 3);
    let migrator = migrator(dir.path());

    migrator.upgrade(&ids[0]).await.unwrap();
    let before = migrator.backend().state();

    migrator.backend().fail_on(Some(ids[2].as_str()));
    let err = migrator.upgrade(HEAD).await.unwrap_err();
    assert!(matches!(err, MigrationError::StepFailed { revision, .. } if revision == ids[2]));
    assert_eq!(migrator.backend().state(), before);

    migrator.backend().fail_on(None);
    migrator.upgrade(HEAD).await.unwrap();
    assert_eq!(migrator.current().await.unwrap().as_deref(), Some(ids[2].as_str()));
}

#[tokio::test]
async fn rollback_and_prefix_targets() {
    let dir = tempfile::tempdir().unwrap();
    let ids = chain(dir.path(), 3);
    let migrator = migrator(dir.path());
    migrator.upgrade(HEAD).await.unwrap();

    let outcome = migrator.rollback(2).await.unwrap();
    assert_eq!(outcome.applied, vec![ids[2].clone(), ids[1].clone()]);
    assert_eq!(migrator.current().await.unwrap().as_deref(), Some(ids[0].as_str()));

    let err = migrator.rollback(5).await.unwrap_err();
    assert!(matches!(err, MigrationError::RollbackTooFar { steps: 5, available: 1 }));

    migrator.upgrade(&ids[1][..8]).await.unwrap();
    assert_eq!(migrator.current().await.unwrap().as_deref(), Some(ids[1].as_str()));

    let err = migrator.upgrade(&ids[0]).await.unwrap_err();
    assert!(matches!(err, MigrationError::Unreachable { .. }));
}

#[tokio::test]
async fn reset_rebuilds_from_base() {
    let dir = tempfile::tempdir().unwrap();
    let ids = chain(dir.path(), 2);
    let migrator = migrator(dir.path());
    migrator.upgrade(HEAD).await.unwrap();

    let (down, up) = migrator.reset().await.unwrap();
    assert_eq!(down.applied, vec![ids[1].clone(), ids[0].clone()]);
    assert_eq!(up.applied, ids);
    assert_eq!(migrator.backend().shape().len(), 2);
}

#[tokio::test]
async fn unknown_recorded_revision_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    chain(dir.path(), 1);
    let migrator = migrator(dir.path());
    migrator.backend().stamp(Some("deadbeef0000")).await.unwrap();

    let err = migrator.upgrade(HEAD).await.unwrap_err();
    assert!(matches!(err, MigrationError::UnrecordedRevision(id) if id == "deadbeef0000"));
}

#[tokio::test]
async fn branches_require_a_merge() {
    let dir = tempfile::tempdir().unwrap();
    let ids = chain(dir.path(), 3);

    // Re-parent the third revision onto the first to create two heads.
    let mut manifest = Manifest::load(dir.path()).unwrap();
    manifest.revisions[2].parents = vec![ids[0].clone()];
    manifest.save(dir.path()).unwrap();

    let migrator = migrator(dir.path());
    assert!(matches!(
        migrator.upgrade(HEAD).await,
        Err(MigrationError::MultipleHeads(heads)) if heads == [ids[1].clone(), ids[2].clone()]
    ));
    assert!(matches!(migrator.stamp(HEAD).await, Err(MigrationError::MultipleHeads(_))));

    let mut set = MigrationSet::load(dir.path()).unwrap();
    assert!(matches!(
        set.generate("more", &models(4)),
        Err(MigrationError::MultipleHeads(_))
    ));
    assert_eq!(set.history(None).len(), 3);

    let merge = set.merge("merge heads").unwrap();
    assert_eq!(merge.parents, vec![ids[1].clone(), ids[2].clone()]);
    assert!(matches!(set.merge("again"), Err(MigrationError::NothingToMerge { heads: 1 })));

    let history = set.history(None);
    assert_eq!(history[0].id, merge.id);
    assert!(history[0].is_head && history[0].is_merge);

    let migrator = Migrator::new(set, MemoryMigrationBackend::new());
    let outcome = migrator.upgrade(HEAD).await.unwrap();
    assert_eq!(outcome.applied.len(), 4);
    assert_eq!(outcome.applied.last(), Some(&merge.id));

    // Merge scripts are comments only.
    assert_eq!(migrator.backend().state().executed.len(), 3);

    let err = migrator.rollback(1).await.unwrap_err();
    assert!(matches!(err, MigrationError::AmbiguousStep { revision } if revision == merge.id));

    let outcome = migrator.downgrade(&ids[1]).await.unwrap();
    assert_eq!(outcome.applied, vec![merge.id.clone(), ids[2].clone()]);
}

#[test]
fn merge_snapshot_honours_removals_on_either_branch() {
    let dir = tempfile::tempdir().unwrap();
    let root = chain(dir.path(), 1).remove(0);

    // Branch B drops t0.label; branch A (generated with B hidden) adds t1.
    let without_label = Schema::new(vec![TableDef::new("t0")
        .with_column(ColumnDef::new("id", ColumnType::BigSerial).primary_key())]);
    let mut set = MigrationSet::load(dir.path()).unwrap();
    set.generate("drop label", &without_label).unwrap();

    let mut manifest = Manifest::load(dir.path()).unwrap();
    let dropped = manifest.revisions.pop().unwrap();
    manifest.save(dir.path()).unwrap();
    let added = MigrationSet::load(dir.path())
        .unwrap()
        .generate("add t1", &models(2))
        .unwrap();
    let mut manifest = Manifest::load(dir.path()).unwrap();
    manifest.revisions.push(dropped.clone());
    manifest.save(dir.path()).unwrap();
    assert_eq!(added.parents, vec![root.clone()]);
    assert_eq!(dropped.parents, vec![root]);

    let mut set = MigrationSet::load(dir.path()).unwrap();
    let merge = set.merge("merge branches").unwrap();
    let merged = set.snapshot(Some(merge.id.as_str())).unwrap();

    let t0 = merged.table("t0").unwrap();
    assert!(t0.column("id").is_some());
    assert!(t0.column("label").is_none());
    assert!(merged.table("t1").is_some());

    let mut expected = models(2);
    expected.tables[0].columns.retain(|c| c.name != "label");
    assert!(matches!(
        set.generate("after merge", &expected),
        Err(MigrationError::EmptyDiff)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Upgrading to head, rolling back any number of steps and upgrading
    /// again reproduces the same shape; downgrading to base empties it.
    #[test]
    fn upgrade_downgrade_round_trip(n in 1usize..6, k in 0usize..6) {
        let k = k.min(n);
        let dir = tempfile::tempdir().unwrap();
        let ids = chain(dir.path(), n);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        runtime.block_on(async {
            let migrator = migrator(dir.path());
            migrator.upgrade(HEAD).await.unwrap();
            let full = migrator.backend().shape();
            prop_assert_eq!(full.len(), n);

            migrator.rollback(n - k).await.unwrap();
            prop_assert_eq!(migrator.backend().shape().len(), k);
            let expected = if k == 0 { None } else { Some(ids[k - 1].clone()) };
            prop_assert_eq!(migrator.current().await.unwrap(), expected);

            migrator.upgrade(HEAD).await.unwrap();
            prop_assert_eq!(migrator.backend().shape(), full);

            migrator.downgrade(BASE).await.unwrap();
            prop_assert!(migrator.backend().shape().is_empty());
            prop_assert_eq!(migrator.current().await.unwrap(), None);
            Ok(())
        })?;
    }
}
