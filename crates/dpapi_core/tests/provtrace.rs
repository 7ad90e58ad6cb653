use dpapi_core::{CreateNodeOptions, FreezePolicy, Kernel, KernelConfig, XRefOptions};
use std::thread;

fn traced_kernel() -> Kernel {
    Kernel::new(KernelConfig {
        trace: true,
        ..KernelConfig::default()
    })
    .unwrap()
}

#[test]
fn trace_is_disabled_by_default() {
    let kernel = Kernel::new(KernelConfig::default()).unwrap();
    kernel.create_node(CreateNodeOptions::default()).unwrap();
    assert!(kernel.trace_text().is_none());
}

#[test]
fn reference_scenario_renders_provtrace() {
    let kernel = traced_kernel();
    let h0 = kernel.create_node(CreateNodeOptions::default()).unwrap();
    let h1 = kernel
        .create_node(CreateNodeOptions::adjacent_to(h0))
        .unwrap();
    kernel
        .add_xref(h1, "parent", h0, XRefOptions::default())
        .unwrap();
    kernel.add_str(h1, "NAME", "say \"hi\"\n").unwrap();
    kernel.freeze(h1).unwrap();
    kernel.freeze(h1).unwrap();

    let expected = "\
format provtrace v3
create myself
phony fd0 myself
phony fd1 fd0
add fd1 parent -> fd0 0
add fd1 NAME :: \"say \\\"hi\\\"\\n\"
freeze fd1
";
    assert_eq!(kernel.trace_text().unwrap(), expected);
}

#[test]
fn failed_operations_are_not_traced() {
    let kernel = traced_kernel();
    let node = kernel.create_node(CreateNodeOptions::default()).unwrap();
    assert!(kernel.add_str(node, "bad key", "v").is_err());
    assert!(kernel
        .add_xref(node, "k", dpapi_core::Handle::from_raw(42), XRefOptions::default())
        .is_err());

    let text = kernel.trace_text().unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn trace_order_matches_versions_under_racing_freeze() {
    for _ in 0..25 {
        let kernel = Kernel::new(KernelConfig {
            trace: true,
            freeze_policy: FreezePolicy::NewVersion,
            ..KernelConfig::default()
        })
        .unwrap();
        let node = kernel.create_node(CreateNodeOptions::default()).unwrap();

        thread::scope(|scope| {
            for worker in 0..4 {
                let kernel = &kernel;
                scope.spawn(move || {
                    for i in 0..50 {
                        kernel.add_str(node, "k", &format!("{worker}:{i}")).unwrap();
                    }
                });
            }
            scope.spawn(|| {
                thread::yield_now();
                kernel.freeze(node).unwrap();
            });
        });

        let text = kernel.trace_text().unwrap();
        let freeze_line = format!("freeze {node}");
        let add_prefix = format!("add {node} k ");
        let traced_before_freeze = text
            .lines()
            .take_while(|line| *line != freeze_line)
            .filter(|line| line.starts_with(&add_prefix))
            .count();
        assert!(text.lines().any(|line| line == freeze_line));
        assert_eq!(
            traced_before_freeze,
            kernel.edges_for_key_at(node, "k", 0).unwrap().len()
        );
        assert_eq!(text.lines().filter(|line| line.starts_with(&add_prefix)).count(), 200);
    }
}
