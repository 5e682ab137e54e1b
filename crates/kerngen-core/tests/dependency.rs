use kerngen_core::{
    dependency_between, AccessMode, Argument, Bounds, CodeBlock, Dependency, DependencyTools,
    EngineConfig, KernelCall, Loop, LoopType, NodeId, NodeKind, Schedule, Severity,
};

fn add_call(schedule: &mut Schedule, parent: NodeId, name: &str, args: Vec<Argument>) -> NodeId {
    let id = schedule
        .create(NodeKind::KernelCall(KernelCall::new(name, args)))
        .expect("create call");
    schedule.push_child(parent, id).expect("attach call");
    id
}

fn add_loop(schedule: &mut Schedule, parent: NodeId, loop_type: LoopType, var: &str) -> NodeId {
    let id = schedule
        .create(NodeKind::Loop(Loop::new(
            loop_type,
            var,
            Bounds::new("1", "n", "1"),
        )))
        .expect("create loop");
    schedule.push_child(parent, id).expect("attach loop");
    id
}

fn pair(first: Vec<Argument>, second: Vec<Argument>) -> (Schedule, NodeId, NodeId) {
    let mut schedule = Schedule::new("pair");
    let root = schedule.root();
    let a = add_call(&mut schedule, root, "ka", first);
    let b = add_call(&mut schedule, root, "kb", second);
    (schedule, a, b)
}

#[test]
fn write_then_read_of_same_field_conflicts() {
    let (schedule, a, b) = pair(
        vec![Argument::field("f", AccessMode::Write, "w3")],
        vec![Argument::field("f", AccessMode::Read, "w3")],
    );
    assert_eq!(
        dependency_between(&schedule, a, b),
        Dependency::Conflict {
            names: vec!["f".to_string()]
        }
    );
}

#[test]
fn read_read_never_conflicts() {
    let (schedule, a, b) = pair(
        vec![Argument::field("f", AccessMode::Read, "w3")],
        vec![Argument::field("f", AccessMode::Read, "w3")],
    );
    assert!(dependency_between(&schedule, a, b).is_independent());
}

#[test]
fn writes_to_different_fields_do_not_conflict() {
    let (schedule, a, b) = pair(
        vec![Argument::field("f", AccessMode::Write, "w3")],
        vec![Argument::field("g", AccessMode::Write, "w3")],
    );
    assert!(dependency_between(&schedule, a, b).is_independent());
}

#[test]
fn matching_reductions_do_not_conflict() {
    let (schedule, a, b) = pair(
        vec![Argument::scalar("total", AccessMode::ReduceSum)],
        vec![Argument::scalar("total", AccessMode::ReduceSum)],
    );
    assert!(dependency_between(&schedule, a, b).is_independent());

    let (schedule, a, b) = pair(
        vec![Argument::scalar("total", AccessMode::ReduceSum)],
        vec![Argument::scalar("total", AccessMode::Read)],
    );
    assert!(!dependency_between(&schedule, a, b).is_independent());
}

#[test]
fn code_block_is_unanalyzable() {
    let mut schedule = Schedule::new("opaque");
    let root = schedule.root();
    let a = add_call(
        &mut schedule,
        root,
        "ka",
        vec![Argument::field("f", AccessMode::Read, "")],
    );
    let block = schedule
        .create(NodeKind::CodeBlock(CodeBlock {
            fragment: "call mpi_barrier()".to_string(),
        }))
        .expect("create block");
    schedule.push_child(root, block).expect("attach block");

    assert_eq!(
        dependency_between(&schedule, a, block),
        Dependency::Unanalyzable { node: block }
    );
}

#[test]
fn conflicts_are_found_through_loop_bodies() {
    let mut schedule = Schedule::new("nested");
    let root = schedule.root();
    let first = add_loop(&mut schedule, root, LoopType::Outer, "j");
    add_call(
        &mut schedule,
        first,
        "ka",
        vec![Argument::field("f", AccessMode::ReadWrite, "w3")],
    );
    let second = add_loop(&mut schedule, root, LoopType::Outer, "j");
    add_call(
        &mut schedule,
        second,
        "kb",
        vec![Argument::field("f", AccessMode::Read, "w3")],
    );
    assert!(matches!(
        dependency_between(&schedule, first, second),
        Dependency::Conflict { .. }
    ));
}

#[test]
fn loop_with_independent_iterations_is_parallelisable() {
    let mut schedule = Schedule::new("par");
    let root = schedule.root();
    let lp = add_loop(&mut schedule, root, LoopType::Outer, "j");
    add_call(
        &mut schedule,
        lp,
        "ka",
        vec![
            Argument::field("f", AccessMode::Write, "w3"),
            Argument::field("g", AccessMode::Read, "w3"),
            Argument::scalar("total", AccessMode::ReduceSum),
        ],
    );
    add_call(
        &mut schedule,
        lp,
        "kb",
        vec![Argument::field("g", AccessMode::Read, "w3")],
    );

    let tools = DependencyTools::new(&EngineConfig::default());
    let analysis = tools.can_loop_be_parallelised(&schedule, lp);
    assert!(analysis.parallelisable, "{}", analysis.summary());
    assert!(analysis.messages.is_empty());
}

#[test]
fn field_written_and_read_by_different_calls_blocks_parallelisation() {
    let mut schedule = Schedule::new("carried");
    let root = schedule.root();
    let lp = add_loop(&mut schedule, root, LoopType::Outer, "j");
    add_call(
        &mut schedule,
        lp,
        "ka",
        vec![Argument::field("f", AccessMode::Write, "w3")],
    );
    add_call(
        &mut schedule,
        lp,
        "kb",
        vec![Argument::field("f", AccessMode::Read, "w3")],
    );

    let tools = DependencyTools::new(&EngineConfig::default());
    let analysis = tools.can_loop_be_parallelised(&schedule, lp);
    assert!(!analysis.parallelisable);
    assert!(!analysis.unanalyzable);
    assert_eq!(analysis.messages.len(), 1);
    assert_eq!(analysis.messages[0].severity, Severity::Warning);
    assert!(analysis.messages[0].text.contains("'f'"));
}

#[test]
fn scalar_read_before_write_blocks_parallelisation() {
    let mut schedule = Schedule::new("scalar");
    let root = schedule.root();
    let lp = add_loop(&mut schedule, root, LoopType::Outer, "j");
    add_call(
        &mut schedule,
        lp,
        "ka",
        vec![Argument::scalar("acc", AccessMode::ReadWrite)],
    );

    let tools = DependencyTools::new(&EngineConfig::default());
    let analysis = tools.can_loop_be_parallelised(&schedule, lp);
    assert!(!analysis.parallelisable);
    assert!(analysis.summary().contains("acc"));
}

#[test]
fn config_restricts_loop_types_and_nesting() {
    let mut schedule = Schedule::new("config");
    let root = schedule.root();
    let lp = add_loop(&mut schedule, root, LoopType::Colour, "cell");
    add_call(
        &mut schedule,
        lp,
        "ka",
        vec![Argument::field("f", AccessMode::Write, "w3")],
    );

    let typed = DependencyTools::new(&EngineConfig {
        loop_types_to_parallelise: vec![LoopType::Outer],
        ..EngineConfig::default()
    });
    let analysis = typed.can_loop_be_parallelised(&schedule, lp);
    assert!(!analysis.parallelisable);
    assert_eq!(analysis.messages[0].severity, Severity::Info);
    assert!(analysis.messages[0].text.contains("colour"));

    let nested_only = DependencyTools::new(&EngineConfig {
        only_nested_loops: true,
        ..EngineConfig::default()
    });
    assert!(
        !nested_only
            .can_loop_be_parallelised(&schedule, lp)
            .parallelisable
    );
}
