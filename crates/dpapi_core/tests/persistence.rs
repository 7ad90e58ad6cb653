use dpapi_core::db::open_db;
use dpapi_core::repo::{ProvenanceRepository, RepoError, SqliteProvenanceRepository};
use dpapi_core::{
    CreateNodeOptions, EdgeValue, FreezePolicy, Kernel, KernelConfig, KernelError, NodeOrigin,
    NodeVersion, VersionSelector, XRefOptions,
};
use std::path::Path;

fn kernel_at(path: &Path) -> Kernel {
    Kernel::new(KernelConfig {
        db_path: Some(path.to_path_buf()),
        ..KernelConfig::default()
    })
    .unwrap()
}

fn edge_rows(path: &Path) -> i64 {
    let conn = open_db(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM ancestry_edges;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn synced_node_revives_in_fresh_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");

    let (parent_id, child_id) = {
        let kernel = kernel_at(&db);
        let parent = kernel.create_node(CreateNodeOptions::default()).unwrap();
        let child = kernel
            .create_node(CreateNodeOptions::adjacent_to(parent))
            .unwrap();
        kernel
            .add_xref(child, "parent", parent, XRefOptions::default())
            .unwrap();
        kernel.add_str(child, "NAME", "line\none").unwrap();
        kernel.freeze(child).unwrap();
        kernel.add_str(child, "NAME", "second").unwrap();

        kernel.sync(parent).unwrap();
        kernel.sync(child).unwrap();
        (
            kernel.node_info(parent).unwrap().node,
            kernel.node_info(child).unwrap().node,
        )
    };

    let kernel = kernel_at(&db);
    let revived = kernel.revive(child_id, VersionSelector::Latest).unwrap();
    let info = kernel.node_info(revived).unwrap();
    assert_eq!(info.node, child_id);
    assert_eq!(info.adjacent, Some(parent_id));
    assert_eq!(info.origin, NodeOrigin::Phony);
    assert_eq!(info.version, 1);
    assert!(!info.frozen);

    let frozen = kernel.edges_for_key_at(revived, "parent", 0).unwrap().to_vec();
    assert_eq!(frozen.len(), 1);
    assert_eq!(frozen[0].value, EdgeValue::reference(parent_id, 0));
    assert_eq!(
        kernel.edges_for_key_at(revived, "NAME", 0).unwrap().to_vec()[0].value,
        EdgeValue::literal("line\none")
    );
    assert_eq!(kernel.edges_for_key(revived, "NAME").unwrap().len(), 1);

    // The revived version 0 stays frozen; writes keep landing on version 1.
    let appended = kernel.add_str(revived, "NAME", "third").unwrap();
    assert_eq!(appended.version, 1);
}

#[test]
fn resync_does_not_duplicate_edges_and_picks_up_new_ones() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let kernel = kernel_at(&db);
    let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
    kernel.add_str(node, "k", "a").unwrap();
    kernel.add_str(node, "k", "b").unwrap();

    kernel.sync(node).unwrap();
    kernel.sync(node).unwrap();
    assert_eq!(edge_rows(&db), 2);

    kernel.freeze(node).unwrap();
    kernel.add_str(node, "k", "c").unwrap();
    kernel.sync(node).unwrap();
    assert_eq!(edge_rows(&db), 3);

    let conn = open_db(&db).unwrap();
    let frozen: i64 = conn
        .query_row(
            "SELECT frozen FROM pnode_versions WHERE version = 0;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(frozen, 1);
}

#[test]
fn revive_rejects_versions_the_node_never_reached() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let node_id = {
        let kernel = kernel_at(&db);
        let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
        kernel.sync(node).unwrap();
        kernel.node_info(node).unwrap().node
    };

    let kernel = kernel_at(&db);
    let err = kernel
        .revive(node_id, VersionSelector::Exact(4))
        .unwrap_err();
    assert!(matches!(err, KernelError::InvalidVersion { requested: 4, .. }));
    assert_eq!(err.code(), -5);
    assert!(kernel.revive(node_id, VersionSelector::Exact(0)).is_ok());
}

#[test]
fn revive_of_unsynced_node_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = kernel_at(&dir.path().join("provenance.db"));
    let err = kernel
        .revive(uuid::Uuid::new_v4(), VersionSelector::Latest)
        .unwrap_err();
    assert!(matches!(err, KernelError::NodeNotFound(_)));
    assert_eq!(err.code(), -2);
}

#[test]
fn file_nodes_keep_their_path_through_storage() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let data = dir.path().join("data.txt");
    std::fs::write(&data, b"payload").unwrap();

    let node_id = {
        let kernel = kernel_at(&db);
        let handle = kernel.open_file(&data, false).unwrap();
        kernel.add_str(handle, "TYPE", "FILE").unwrap();
        kernel.sync(handle).unwrap();
        kernel.node_info(handle).unwrap().node
    };

    let conn = open_db(&db).unwrap();
    let repo = SqliteProvenanceRepository::new(&conn);
    assert_eq!(repo.list_node_ids().unwrap(), vec![node_id]);
    let stored = repo.load_node(node_id).unwrap().unwrap();
    assert_eq!(
        stored.node.origin,
        NodeOrigin::File {
            path: std::fs::canonicalize(&data).unwrap()
        }
    );
    assert_eq!(stored.logs.len(), 1);
    assert_eq!(stored.logs[0].1.len(), 1);
}

#[test]
fn load_node_rejects_corrupted_edge_logs() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let node_id = {
        let kernel = kernel_at(&db);
        let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
        kernel.add_str(node, "k", "a").unwrap();
        kernel.add_str(node, "k", "b").unwrap();
        kernel.sync(node).unwrap();
        kernel.node_info(node).unwrap().node
    };

    let conn = open_db(&db).unwrap();
    conn.execute("DELETE FROM ancestry_edges WHERE seq = 0;", [])
        .unwrap();

    let err = SqliteProvenanceRepository::new(&conn)
        .load_node(node_id)
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn unopenable_database_fails_kernel_init() {
    let dir = tempfile::tempdir().unwrap();
    let err = Kernel::new(KernelConfig {
        db_path: Some(dir.path().join("missing").join("nested").join("p.db")),
        ..KernelConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, KernelError::InitFailure(_)));
    assert_eq!(err.code(), -1);
}

#[test]
fn list_referrers_finds_synced_references_by_target() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let kernel = kernel_at(&db);
    let parent = kernel.create_node(CreateNodeOptions::default()).unwrap();
    let first = kernel.create_node(CreateNodeOptions::default()).unwrap();
    let second = kernel.create_node(CreateNodeOptions::default()).unwrap();
    kernel.add_str(first, "NAME", "first").unwrap();
    kernel
        .add_xref(first, "INPUT", parent, XRefOptions::default())
        .unwrap();
    kernel
        .add_xref(second, "INPUT", parent, XRefOptions::default())
        .unwrap();
    kernel.sync(first).unwrap();
    kernel.sync(second).unwrap();
    let parent_version = NodeVersion::new(kernel.node_info(parent).unwrap().node, 0);

    let conn = open_db(&db).unwrap();
    let repo = SqliteProvenanceRepository::new(&conn);
    let stored = repo.list_referrers(parent_version).unwrap();
    let mut expected = kernel.referrers(parent).unwrap();
    expected.sort_by_key(|edge| edge.source.node);
    assert_eq!(stored, expected);
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|edge| edge.target() == Some(parent_version)));

    let unrelated = NodeVersion::new(kernel.node_info(first).unwrap().node, 0);
    assert!(repo.list_referrers(unrelated).unwrap().is_empty());
}

#[test]
fn revived_nodes_rejoin_the_ancestry_index() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let (parent_id, child_id) = {
        let kernel = kernel_at(&db);
        let parent = kernel.create_node(CreateNodeOptions::default()).unwrap();
        let child = kernel.create_node(CreateNodeOptions::default()).unwrap();
        kernel
            .add_xref(child, "INPUT", parent, XRefOptions::default())
            .unwrap();
        kernel.sync(parent).unwrap();
        kernel.sync(child).unwrap();
        (
            kernel.node_info(parent).unwrap().node,
            kernel.node_info(child).unwrap().node,
        )
    };

    let kernel = kernel_at(&db);
    let parent = kernel.revive(parent_id, VersionSelector::Latest).unwrap();
    assert!(kernel.referrers(parent).unwrap().is_empty());

    let child = kernel.revive(child_id, VersionSelector::Latest).unwrap();
    let referrers = kernel.referrers(parent).unwrap();
    assert_eq!(referrers.len(), 1);
    assert_eq!(referrers[0].source, NodeVersion::new(child_id, 0));
    assert_eq!(
        kernel.ancestors(child).unwrap(),
        vec![NodeVersion::new(parent_id, 0)]
    );
}

#[test]
fn revive_exact_pins_reads_to_the_synced_version() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let node_id = {
        let kernel = kernel_at(&db);
        let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
        kernel.add_str(node, "NAME", "v0").unwrap();
        kernel.freeze(node).unwrap();
        kernel.add_str(node, "NAME", "v1").unwrap();
        kernel.sync(node).unwrap();
        kernel.node_info(node).unwrap().node
    };

    let kernel = kernel_at(&db);
    let pinned = kernel.revive(node_id, VersionSelector::Exact(0)).unwrap();
    let info = kernel.node_info(pinned).unwrap();
    assert_eq!(info.version, 0);
    assert!(info.frozen);
    assert!(info.pinned);
    let names = kernel
        .edges_for_key(pinned, "NAME")
        .unwrap()
        .iter()
        .map(|edge| edge.value.clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec![EdgeValue::literal("v0")]);
    assert_eq!(kernel.current_version(pinned).unwrap(), 1);
}

#[test]
fn reject_policy_refuses_appends_through_a_stale_pin() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("provenance.db");
    let node_id = {
        let kernel = kernel_at(&db);
        let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
        kernel.add_str(node, "NAME", "v0").unwrap();
        kernel.freeze(node).unwrap();
        kernel.add_str(node, "NAME", "v1").unwrap();
        kernel.sync(node).unwrap();
        kernel.node_info(node).unwrap().node
    };

    let kernel = Kernel::new(KernelConfig {
        db_path: Some(db),
        freeze_policy: FreezePolicy::Reject,
        ..KernelConfig::default()
    })
    .unwrap();
    let pinned = kernel.revive(node_id, VersionSelector::Exact(0)).unwrap();
    let err = kernel.add_str(pinned, "NAME", "late").unwrap_err();
    assert!(matches!(err, KernelError::SourceFrozen(v) if v == NodeVersion::new(node_id, 0)));
    assert_eq!(err.code(), -4);

    let latest = kernel.revive(node_id, VersionSelector::Latest).unwrap();
    assert_eq!(kernel.add_str(latest, "NAME", "v1b").unwrap().version, 1);
    assert_eq!(kernel.edges_for_key(pinned, "NAME").unwrap().len(), 1);
    assert_eq!(kernel.edges_for_key(latest, "NAME").unwrap().len(), 2);
}
