use kerngen_core::{
    build_schedules, format_path, AccessMode, Argument, Bounds, IrEvent, LoopType, NodeId,
    NodeTag, Schedule,
};

fn nested_schedule() -> Schedule {
    let events = vec![
        IrEvent::BeginSchedule {
            name: "nav".to_string(),
        },
        IrEvent::AddLoop {
            loop_type: LoopType::Outer,
            variable: "j".to_string(),
            bounds: Bounds::new("1", "n", "1"),
        },
        IrEvent::AddLoop {
            loop_type: LoopType::Inner,
            variable: "i".to_string(),
            bounds: Bounds::new("1", "m", "1"),
        },
        IrEvent::AddKernelCall {
            name: "k1".to_string(),
            arguments: vec![
                Argument::field("f", AccessMode::Write, "w3"),
                Argument::field("g", AccessMode::Read, "w3"),
            ],
            local_vars: Vec::new(),
        },
        IrEvent::EndScope,
        IrEvent::EndScope,
        IrEvent::AddKernelCall {
            name: "k2".to_string(),
            arguments: vec![Argument::field("g", AccessMode::Read, "w3")],
            local_vars: Vec::new(),
        },
        IrEvent::EndScope,
    ];
    build_schedules(events)
        .expect("build")
        .pop()
        .expect("one schedule")
}

#[test]
fn walk_is_restartable() {
    let schedule = nested_schedule();
    let first: Vec<NodeId> = schedule.walk(None).collect();
    let second: Vec<NodeId> = schedule.walk(None).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);

    let calls: Vec<NodeId> = schedule.walk(Some(NodeTag::KernelCall)).collect();
    assert_eq!(calls, schedule.walk(Some(NodeTag::KernelCall)).collect::<Vec<_>>());
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], schedule[1]);
}

#[test]
fn walk_is_pre_order() {
    let schedule = nested_schedule();
    let outer = schedule[0];
    let inner = schedule.children(outer)[0];
    let k1 = schedule.children(inner)[0];
    let k2 = schedule[1];
    let order: Vec<NodeId> = schedule.walk(None).collect();
    assert_eq!(order, vec![schedule.root(), outer, inner, k1, k2]);

    let under_outer: Vec<NodeId> = schedule.descendants(outer, None).collect();
    assert_eq!(under_outer, vec![inner, k1]);
}

#[test]
fn paths_resolve_both_ways() {
    let schedule = nested_schedule();
    let k1 = schedule
        .walk(Some(NodeTag::KernelCall))
        .next()
        .expect("first call");

    assert_eq!(schedule.path_of(k1), Some(vec![0, 0, 0]));
    assert_eq!(schedule.resolve("0.0.0"), Some(k1));
    assert_eq!(schedule.node_at_path(&[0, 0, 0]), Some(k1));
    assert_eq!(schedule.resolve(""), Some(schedule.root()));
    assert_eq!(schedule.resolve("1"), Some(schedule[1]));
    assert_eq!(schedule.resolve("2"), None);
    assert_eq!(schedule.resolve("0.x"), None);
    assert_eq!(format_path(&[0, 2, 1]), "0.2.1");
}

#[test]
fn ancestors_and_siblings() {
    let schedule = nested_schedule();
    let outer = schedule[0];
    let inner = schedule.children(outer)[0];
    let k1 = schedule.children(inner)[0];
    let k2 = schedule[1];

    assert_eq!(schedule.ancestor(k1, NodeTag::Loop), Some(inner));
    assert_eq!(schedule.ancestor(k1, NodeTag::Schedule), Some(schedule.root()));
    assert_eq!(schedule.ancestor(k1, NodeTag::Directive), None);
    assert_eq!(
        schedule.ancestors(k1).collect::<Vec<_>>(),
        vec![inner, outer, schedule.root()]
    );
    assert_eq!(schedule.next_sibling(outer), Some(k2));
    assert_eq!(schedule.previous_sibling(k2), Some(outer));
    assert_eq!(schedule.previous_sibling(outer), None);
    assert_eq!(schedule.loop_depth(outer), 2);
    assert_eq!(schedule.loop_depth(k2), 0);
}

#[test]
fn view_renders_indented_tree() {
    let schedule = nested_schedule();
    let expected = "\
Schedule[invoke='nav']
    Loop[type='outer', variable='j', start='1', stop='n', step='1']
        Loop[type='inner', variable='i', start='1', stop='m', step='1']
            KernelCall[name='k1', args=[f:write, g:read]]
    KernelCall[name='k2', args=[g:read]]
";
    assert_eq!(schedule.view().to_string(), expected);
    assert_eq!(
        kerngen_core::render(&schedule, schedule[1]),
        "KernelCall[name='k2', args=[g:read]]\n"
    );
}

#[test]
fn multi_line_code_block_stays_on_one_view_line() {
    let events = vec![
        IrEvent::BeginSchedule {
            name: "io".to_string(),
        },
        IrEvent::AddCodeBlock {
            fragment: "if (rank == 0) then\r\n  print *, total\nend if\n".to_string(),
        },
        IrEvent::AddKernelCall {
            name: "k1".to_string(),
            arguments: vec![Argument::field("f", AccessMode::Read, "w3")],
            local_vars: Vec::new(),
        },
        IrEvent::EndScope,
    ];
    let schedule = build_schedules(events)
        .expect("build")
        .pop()
        .expect("one schedule");
    let view = schedule.view().to_string();

    assert_eq!(view.lines().count(), schedule.walk(None).count());
    assert_eq!(
        view.lines().nth(1),
        Some("    CodeBlock[fragment='if (rank == 0) then\\n  print *, total\\nend if']")
    );
}

#[test]
fn snapshot_exposes_kind_tags_and_paths() {
    let schedule = nested_schedule();
    let snapshot = schedule.snapshot();
    assert_eq!(snapshot.count(), 5);
    assert_eq!(snapshot, nested_schedule().snapshot());

    let json = serde_json::to_value(&snapshot).expect("serialize");
    assert_eq!(json["node"], "schedule");
    assert_eq!(json["invoke"], "nav");
    let outer = &json["children"][0];
    assert_eq!(outer["node"], "loop");
    assert_eq!(outer["loop_type"], "outer");
    assert_eq!(outer["bounds"]["stop"], "n");
    let k1 = &outer["children"][0]["children"][0];
    assert_eq!(k1["path"], "0.0.0");
    assert_eq!(k1["node"], "kernel_call");
    assert_eq!(k1["arguments"][0]["access"], "write");
}
