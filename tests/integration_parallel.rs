//! Independent traces share one engine across threads.

mod common;

use std::thread;

use pv_bess_sim::config::ScenarioConfig;

#[test]
fn concurrent_runs_match_sequential_runs() {
    let engine = common::preset_engine("baseline");
    let seeds = [1u64, 2, 3, 4];
    let inputs: Vec<_> = seeds.iter().map(|s| common::synthetic_inputs(24 * 60, *s)).collect();

    let sequential: Vec<_> = inputs
        .iter()
        .map(|i| engine.run(i).expect("sequential run"))
        .collect();

    let engine = &engine;
    let parallel: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|i| scope.spawn(move || engine.run(i).expect("parallel run")))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread completes"))
            .collect()
    });

    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(a.results(), b.results());
    }
}

#[test]
fn presets_run_side_by_side_on_shared_input() {
    let inputs = common::synthetic_inputs(24 * 30, 42);
    let traces: Vec<_> = thread::scope(|scope| {
        ScenarioConfig::PRESETS
            .iter()
            .map(|name| {
                let inputs = &inputs;
                scope.spawn(move || {
                    let engine = common::preset_engine(name);
                    let trace = engine.run(inputs).expect("run");
                    common::assert_trace_invariants(&trace, engine.battery().power_rating_kw());
                    trace
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().expect("thread completes"))
            .collect()
    });
    assert_eq!(traces.len(), ScenarioConfig::PRESETS.len());
    assert_ne!(traces[0].results(), traces[1].results());
}
