use kerngen_core::{
    build_invokes, build_schedules, AccessMode, Argument, Bounds, Error, InvokeBuild, IrEvent,
    LoopType, NodeKind, NodeTag, ScheduleBuilder,
};

fn begin(name: &str) -> IrEvent {
    IrEvent::BeginSchedule {
        name: name.to_string(),
    }
}

fn open_loop(loop_type: LoopType, variable: &str) -> IrEvent {
    IrEvent::AddLoop {
        loop_type,
        variable: variable.to_string(),
        bounds: Bounds::new("1", "n", "1"),
    }
}

fn call(name: &str, arguments: Vec<Argument>) -> IrEvent {
    IrEvent::AddKernelCall {
        name: name.to_string(),
        arguments,
        local_vars: Vec::new(),
    }
}

fn expect_malformed(events: Vec<IrEvent>, needle: &str) {
    match build_schedules(events) {
        Err(Error::MalformedInput { message }) => {
            assert!(message.contains(needle), "unexpected message: {message}")
        }
        other => panic!("expected malformed input, got {other:?}"),
    }
}

#[test]
fn builds_one_schedule_per_invoke() {
    let events = vec![
        begin("invoke_a"),
        open_loop(LoopType::Outer, "j"),
        call("k1", vec![Argument::field("f", AccessMode::Write, "w3")]),
        IrEvent::EndScope,
        IrEvent::EndScope,
        begin("invoke_b"),
        call("k2", vec![Argument::field("g", AccessMode::Read, "w3")]),
        IrEvent::AddCodeBlock {
            fragment: "print *, g".to_string(),
        },
        IrEvent::EndScope,
    ];
    let schedules = build_schedules(events).expect("build");

    assert_eq!(schedules.len(), 2);
    assert_eq!(schedules[0].invoke(), "invoke_a");
    assert_eq!(schedules[0].children(schedules[0].root()).len(), 1);
    assert_eq!(schedules[1].invoke(), "invoke_b");
    let tags: Vec<NodeTag> = schedules[1]
        .walk(None)
        .filter_map(|id| schedules[1].kind(id).map(NodeKind::tag))
        .collect();
    assert_eq!(
        tags,
        vec![NodeTag::Schedule, NodeTag::KernelCall, NodeTag::CodeBlock]
    );
    for schedule in &schedules {
        schedule.verify().expect("invariants");
    }
}

#[test]
fn reductions_are_tagged_on_the_outermost_loop() {
    let events = vec![
        begin("sum"),
        open_loop(LoopType::Outer, "j"),
        open_loop(LoopType::Inner, "i"),
        call(
            "sum_kernel",
            vec![
                Argument::field("f", AccessMode::Read, "w0"),
                Argument::scalar("total", AccessMode::ReduceSum),
            ],
        ),
        IrEvent::EndScope,
        IrEvent::EndScope,
        IrEvent::EndScope,
    ];
    let schedules = build_schedules(events).expect("build");
    let schedule = &schedules[0];
    let loops: Vec<_> = schedule
        .walk(Some(NodeTag::Loop))
        .filter_map(|id| schedule.kind(id).and_then(NodeKind::as_loop).cloned())
        .collect();

    assert_eq!(loops.len(), 2);
    assert_eq!(
        loops[0].reductions.iter().cloned().collect::<Vec<_>>(),
        vec!["total".to_string()]
    );
    assert!(loops[1].reductions.is_empty());
}

#[test]
fn events_deserialize_from_tagged_json() {
    let text = r#"[
        {"event": "begin_schedule", "name": "invoke_0"},
        {"event": "add_loop", "loop_type": "dofs", "variable": "df",
         "bounds": {"start": "1", "stop": "undf"}},
        {"event": "add_kernel_call", "name": "setval_c",
         "arguments": [{"name": "f", "category": "field", "access": "write"}],
         "local_vars": ["tmp"]},
        {"event": "end_scope"},
        {"event": "end_scope"}
    ]"#;
    let events: Vec<IrEvent> = serde_json::from_str(text).expect("parse events");
    let schedules = build_schedules(events).expect("build");
    let schedule = &schedules[0];
    let lp = schedule
        .kind(schedule[0])
        .and_then(NodeKind::as_loop)
        .expect("loop");
    assert_eq!(lp.bounds.step, "1");
    assert_eq!(lp.loop_type, LoopType::Dofs);
    let call = schedule
        .kind(schedule.children(schedule[0])[0])
        .and_then(NodeKind::as_kernel_call)
        .expect("kernel call");
    assert_eq!(call.name(), "setval_c");
    assert_eq!(call.local_vars(), ["tmp".to_string()]);
}

#[test]
fn empty_loop_body_is_malformed() {
    expect_malformed(
        vec![
            begin("s"),
            open_loop(LoopType::Outer, "j"),
            IrEvent::EndScope,
            IrEvent::EndScope,
        ],
        "empty body",
    );
}

#[test]
fn statement_outside_schedule_is_malformed() {
    expect_malformed(
        vec![call("k", vec![Argument::field("f", AccessMode::Read, "")])],
        "outside of a schedule",
    );
}

#[test]
fn unterminated_schedule_is_malformed() {
    expect_malformed(
        vec![
            begin("s"),
            call("k", vec![Argument::field("f", AccessMode::Read, "")]),
        ],
        "not terminated",
    );
}

#[test]
fn duplicate_and_nested_schedules_are_malformed() {
    expect_malformed(
        vec![begin("s"), IrEvent::EndScope, begin("s"), IrEvent::EndScope],
        "duplicate schedule name",
    );
    expect_malformed(vec![begin("a"), begin("b")], "still open");
    expect_malformed(vec![IrEvent::EndScope], "without an open schedule");
    expect_malformed(vec![begin(" ")], "name is empty");
}

#[test]
fn builder_accepts_events_one_at_a_time() {
    let mut builder = ScheduleBuilder::new();
    builder.apply(begin("s")).expect("begin");
    builder
        .apply(call("k", vec![Argument::scalar("a", AccessMode::Read)]))
        .expect("call");
    builder.apply(IrEvent::EndScope).expect("end");
    let schedules = builder.finish().expect("finish");
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].node_count(), 2);
}

fn outcome(builds: &[InvokeBuild]) -> Vec<(Option<&str>, bool)> {
    builds
        .iter()
        .map(|build| (build.invoke.as_deref(), build.result.is_ok()))
        .collect()
}

#[test]
fn malformed_invoke_does_not_lose_its_neighbours() {
    let body = || call("k", vec![Argument::field("f", AccessMode::Write, "w3")]);
    let events = vec![
        begin("good"),
        open_loop(LoopType::Outer, "j"),
        body(),
        IrEvent::EndScope,
        IrEvent::EndScope,
        begin("bad"),
        open_loop(LoopType::Outer, "j"),
        open_loop(LoopType::Inner, "i"),
        IrEvent::EndScope,
        body(),
        IrEvent::EndScope,
        IrEvent::EndScope,
        begin("after"),
        body(),
        IrEvent::EndScope,
    ];
    let builds = build_invokes(events.clone());
    assert_eq!(
        outcome(&builds),
        vec![(Some("good"), true), (Some("bad"), false), (Some("after"), true)]
    );
    match &builds[1].result {
        Err(Error::MalformedInput { message }) => {
            assert!(message.contains("event 9"), "unexpected message: {message}");
            assert!(message.contains("empty body"));
        }
        other => panic!("expected malformed input, got {other:?}"),
    }
    let after = builds[2].result.as_ref().expect("after");
    after.verify().expect("invariants");
    assert_eq!(after.children(after.root()).len(), 1);

    // The strict entry point still fails as a whole.
    expect_malformed(events, "empty body");
}

#[test]
fn failed_invoke_skips_to_its_own_end_scope() {
    let events = vec![
        begin("bad"),
        open_loop(LoopType::Outer, " "),
        call("k", vec![Argument::field("f", AccessMode::Read, "w3")]),
        IrEvent::EndScope,
        IrEvent::EndScope,
        begin("dup"),
        call("k", vec![Argument::field("f", AccessMode::Read, "w3")]),
        IrEvent::EndScope,
        begin("dup"),
        call("k", vec![Argument::field("g", AccessMode::Read, "w3")]),
        IrEvent::EndScope,
        IrEvent::EndScope,
        begin("open"),
        call("k", vec![Argument::field("f", AccessMode::Read, "w3")]),
        begin("last"),
        call("k", vec![Argument::field("f", AccessMode::Read, "w3")]),
        IrEvent::EndScope,
    ];
    let builds = build_invokes(events);
    assert_eq!(
        outcome(&builds),
        vec![
            (Some("bad"), false),
            (Some("dup"), true),
            (Some("dup"), false),
            (None, false),
            (Some("open"), false),
            (Some("last"), true),
        ]
    );
}

#[test]
fn unterminated_last_invoke_is_reported() {
    let builds = build_invokes(vec![
        begin("tail"),
        call("k", vec![Argument::field("f", AccessMode::Read, "w3")]),
    ]);
    assert_eq!(outcome(&builds), vec![(Some("tail"), false)]);
}
