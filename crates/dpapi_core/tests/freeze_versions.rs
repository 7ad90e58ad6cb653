use dpapi_core::{
    CreateNodeOptions, EdgeValue, FreezePolicy, Kernel, KernelConfig, KernelError, XRefOptions,
};

fn kernel_with(policy: FreezePolicy) -> Kernel {
    Kernel::new(KernelConfig {
        freeze_policy: policy,
        ..KernelConfig::default()
    })
    .unwrap()
}

#[test]
fn double_freeze_is_equivalent_to_single_freeze() {
    for policy in [FreezePolicy::NewVersion, FreezePolicy::Reject] {
        let once = kernel_with(policy);
        let twice = kernel_with(policy);
        let a = once.create_node(CreateNodeOptions::default()).unwrap();
        let b = twice.create_node(CreateNodeOptions::default()).unwrap();
        once.add_str(a, "k", "v").unwrap();
        twice.add_str(b, "k", "v").unwrap();

        assert_eq!(once.freeze(a).unwrap(), 0);
        assert_eq!(twice.freeze(b).unwrap(), 0);
        assert_eq!(twice.freeze(b).unwrap(), 0);

        let info_once = once.node_info(a).unwrap();
        let info_twice = twice.node_info(b).unwrap();
        assert_eq!(info_once.version, info_twice.version);
        assert_eq!(info_once.frozen, info_twice.frozen);
        assert_eq!(once.edges(a).unwrap().len(), twice.edges(b).unwrap().len());
    }
}

#[test]
fn reject_policy_refuses_appends_after_freeze() {
    let kernel = kernel_with(FreezePolicy::Reject);
    let parent = kernel.create_node(CreateNodeOptions::default()).unwrap();
    let child = kernel
        .create_node(CreateNodeOptions::adjacent_to(parent))
        .unwrap();
    kernel
        .add_xref(child, "parent", parent, XRefOptions::default())
        .unwrap();
    kernel.freeze(child).unwrap();

    let err = kernel
        .add_xref(child, "parent", parent, XRefOptions::default())
        .unwrap_err();
    assert!(matches!(err, KernelError::SourceFrozen(v) if v.version == 0));
    assert_eq!(err.code(), -4);

    let err = kernel.add_str(child, "NAME", "late").unwrap_err();
    assert!(matches!(err, KernelError::SourceFrozen(_)));

    assert_eq!(kernel.current_version(child).unwrap(), 0);
    assert_eq!(kernel.edges(child).unwrap().len(), 1);
}

#[test]
fn new_version_policy_redirects_appends_and_keeps_frozen_log_intact() {
    let kernel = kernel_with(FreezePolicy::NewVersion);
    let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
    kernel.add_str(node, "NAME", "first").unwrap();
    kernel.freeze(node).unwrap();

    let frozen_before = kernel.edges_for_key_at(node, "NAME", 0).unwrap().to_vec();

    let appended = kernel.add_str(node, "NAME", "second").unwrap();
    assert_eq!(appended.version, 1);
    kernel.add_str(node, "NAME", "third").unwrap();

    assert_eq!(
        kernel.edges_for_key_at(node, "NAME", 0).unwrap().to_vec(),
        frozen_before
    );
    let current = kernel
        .edges_for_key(node, "NAME")
        .unwrap()
        .iter()
        .map(|edge| edge.value.clone())
        .collect::<Vec<_>>();
    assert_eq!(
        current,
        vec![EdgeValue::literal("second"), EdgeValue::literal("third")]
    );

    let info = kernel.node_info(node).unwrap();
    assert_eq!(info.version, 1);
    assert!(!info.frozen);
}

#[test]
fn freeze_without_writes_does_not_open_versions() {
    let kernel = kernel_with(FreezePolicy::NewVersion);
    let node = kernel.create_node(CreateNodeOptions::default()).unwrap();

    kernel.freeze(node).unwrap();
    kernel.freeze(node).unwrap();
    kernel.freeze(node).unwrap();

    let info = kernel.node_info(node).unwrap();
    assert_eq!(info.version, 0);
    assert!(info.frozen);
}

#[test]
fn each_freeze_closes_only_the_current_version() {
    let kernel = kernel_with(FreezePolicy::NewVersion);
    let node = kernel.create_node(CreateNodeOptions::default()).unwrap();

    for round in 0..3u32 {
        kernel.add_str(node, "round", &round.to_string()).unwrap();
        assert_eq!(kernel.freeze(node).unwrap(), round);
    }

    assert_eq!(kernel.current_version(node).unwrap(), 2);
    for version in 0..3u32 {
        let edges = kernel.edges_for_key_at(node, "round", version).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges.iter().next().unwrap().value,
            EdgeValue::literal(version.to_string())
        );
    }
    assert!(matches!(
        kernel.edges_for_key_at(node, "round", 3),
        Err(KernelError::InvalidVersion { .. })
    ));
}

#[test]
fn frozen_targets_are_still_referenceable() {
    let kernel = kernel_with(FreezePolicy::Reject);
    let source = kernel.create_node(CreateNodeOptions::default()).unwrap();
    let target = kernel.create_node(CreateNodeOptions::default()).unwrap();
    kernel.freeze(target).unwrap();

    kernel
        .add_xref(source, "INPUT", target, XRefOptions::default())
        .unwrap();
    assert_eq!(kernel.edges_for_key(source, "INPUT").unwrap().len(), 1);
}
