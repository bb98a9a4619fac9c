//! Runs  scenario 3: fixed-indegree connections between two 10x10
//! grid layers under a circular mask, checked for bit-identical structure
//! across a fixed seed and across different thread-pool sizes.

use esk_builder::{fixed_indegree_parallel, Connection, Constant, SynapseSpec};
use esk_spatial::{BallMask, GridLayer};
use esk_types::{NodeId, Position2, SynapseModelId};

const SIDE: usize = 10;
const INDEGREE: usize = 25;
const SEED: u64 = 20260728;

fn build_layers() -> (GridLayer<2>, GridLayer<2>) {
    let source = GridLayer::new(
        Position2::new([0.0, 0.0]),
        [SIDE, SIDE],
        [1.0, 1.0],
        [false, false],
        NodeId::new(1),
    );
    let target = GridLayer::new(
        Position2::new([0.0, 0.0]),
        [SIDE, SIDE],
        [1.0, 1.0],
        [false, false],
        NodeId::new(1 + (SIDE * SIDE) as u64),
    );
    (source, target)
}

fn specs() -> Vec<SynapseSpec<2>> {
    vec![SynapseSpec {
        syn_id: SynapseModelId::new(1),
        weight: Box::new(Constant(1.0)),
        delay: Box::new(Constant(1.0)),
        receptor: None,
    }]
}

fn connect(n_threads: usize) -> anyhow::Result<Vec<Connection>> {
    let (source, target) = build_layers();
    let sources: Vec<_> = source.iter().collect();
    let targets: Vec<_> = target.iter().collect();
    let mask = BallMask::new(Position2::new([0.0, 0.0]), 0.3 * SIDE as f64)?;
    let extent = *source.extent();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()?;
    let conns = pool.install(|| {
        fixed_indegree_parallel(
            &sources, &targets, &mask, &extent, INDEGREE, true, false, &specs(), 1.0, SEED,
        )
    })?;
    Ok(conns)
}

fn sorted_keys(conns: &[Connection]) -> Vec<(u64, u64)> {
    let mut keys: Vec<_> = conns.iter().map(|c| (c.source.raw(), c.target.raw())).collect();
    keys.sort_unstable();
    keys
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let one_thread = connect(1)?;
    let two_threads = connect(2)?;

    let mut every_target_has_n = true;
    for target_id in (1 + (SIDE * SIDE) as u64)..(1 + 2 * (SIDE * SIDE) as u64) {
        let n = one_thread
            .iter()
            .filter(|c| c.target.raw() == target_id)
            .map(|c| c.source)
            .collect::<std::collections::HashSet<_>>()
            .len();
        if n != INDEGREE {
            every_target_has_n = false;
            log::warn!("target {target_id} has {n} distinct sources, expected {INDEGREE}");
        }
    }

    let identical_across_thread_counts = sorted_keys(&one_thread) == sorted_keys(&two_threads);

    println!("every target has exactly {INDEGREE} distinct sources: {every_target_has_n}");
    println!("structure identical with 1 vs 2 threads: {identical_across_thread_counts}");

    if every_target_has_n && identical_across_thread_counts {
        println!("scenario 3: PASS");
    } else {
        println!("scenario 3: FAIL");
    }

    Ok(())
}
