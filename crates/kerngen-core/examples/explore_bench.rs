use kerngen_core::{
    build_schedules, explore_candidates, AccessMode, Argument, Bounds, Candidate, EngineConfig,
    IrEvent, LoopType, Schedule, TransformOptions, TransformationCatalog,
};
use std::error::Error;
use std::time::Instant;

#[derive(Clone, Copy)]
struct WideSchedule {
    loops: usize,
    calls_per_loop: usize,
}

impl WideSchedule {
    fn events(&self) -> Vec<IrEvent> {
        let mut events = vec![IrEvent::BeginSchedule {
            name: "invoke_bench".to_string(),
        }];
        for l in 0..self.loops {
            events.push(IrEvent::AddLoop {
                loop_type: LoopType::Outer,
                variable: "cell".to_string(),
                bounds: Bounds::new("1", "ncells", "1"),
            });
            for c in 0..self.calls_per_loop {
                events.push(IrEvent::AddKernelCall {
                    name: format!("kernel_{l}_{c}"),
                    arguments: vec![
                        Argument::field(format!("f_{l}_{c}"), AccessMode::Write, "w3"),
                        Argument::field("coords", AccessMode::Read, "w0"),
                    ],
                    local_vars: vec!["tmp".to_string()],
                });
            }
            events.push(IrEvent::EndScope);
        }
        events.push(IrEvent::EndScope);
        events
    }

    fn candidates(&self, schedule: &Schedule) -> Vec<Candidate> {
        let options = TransformOptions::default();
        let mut out = Vec::with_capacity(self.loops * 3);
        for i in 0..self.loops {
            out.push(Candidate {
                label: format!("parallelize_{i}"),
                transformation: "parallelize".to_string(),
                targets: vec![schedule[i]],
                options: options.clone(),
            });
            out.push(Candidate {
                label: format!("tile_{i}"),
                transformation: "tile".to_string(),
                targets: vec![schedule[i]],
                options: options.clone(),
            });
            if i + 1 < self.loops {
                out.push(Candidate {
                    label: format!("fuse_{i}"),
                    transformation: "fuse".to_string(),
                    targets: vec![schedule[i], schedule[i + 1]],
                    options: options.clone(),
                });
            }
        }
        out
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let shape = WideSchedule {
        loops: 256,
        calls_per_loop: 8,
    };
    let schedule = build_schedules(shape.events())?
        .pop()
        .ok_or("no schedule built")?;
    let catalog = TransformationCatalog::with_defaults(&EngineConfig::default());
    let candidates = shape.candidates(&schedule);

    for workers in [1, 4] {
        let started = Instant::now();
        let report = explore_candidates(&schedule, &catalog, &candidates, workers)?;
        println!("workers={workers}");
        println!("candidates={}", report.outcomes.len());
        println!("applied={}", report.applied);
        println!("distinct={}", report.distinct);
        println!("elapsed_ms={}", started.elapsed().as_millis());
    }

    Ok(())
}
