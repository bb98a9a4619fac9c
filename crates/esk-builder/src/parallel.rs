//! Thread-parallel connection building.
//!
//! The outer loop over targets runs across threads; each target draws from
//! its own RNG stream derived deterministically from a base seed and the
//! target's [`NodeId`], so the resulting structure does not depend on how
//! targets are partitioned across threads — the scenario 
//! ("identical across two runs where the second uses twice as many
//! threads") holds because no RNG state is shared between targets. Any
//! error raised while building one target's connections is captured and, if
//! any occurred, the first one (in target order) is re-raised on the
//! calling thread after every worker has finished.

use esk_types::{Extent, NodeId, Position, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::parameter::{EvalContext, Parameter};
use crate::rule::{Connection, SynapseSpec};
use esk_spatial::Mask;

/// Derive a target-local RNG from `base_seed` and `target`, independent of
/// thread assignment or iteration order (SplitMix64-style mixing).
fn target_rng(base_seed: u64, target: NodeId) -> StdRng {
    let mut z = base_seed ^ target.raw().wrapping_mul(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^= z >> 31;
    StdRng::seed_from_u64(z)
}

fn candidates<'a, const D: usize>(
    pool: &'a [(NodeId, Position<D>)],
    mask: &dyn Mask<D>,
    anchor: &Position<D>,
) -> impl Iterator<Item = &'a (NodeId, Position<D>)> {
    pool.iter()
        .filter(move |(_, p)| mask.inside(&(*p - *anchor)))
}

/// Parallel pairwise-Bernoulli, target-driven. Each target is
/// processed independently and in parallel across the thread pool.
#[allow(clippy::too_many_arguments)]
pub fn pairwise_bernoulli_target_driven_parallel<const D: usize>(
    sources: &[(NodeId, Position<D>)],
    targets: &[(NodeId, Position<D>)],
    mask: &(dyn Mask<D> + Sync),
    extent: &Extent<D>,
    probability: &(dyn Parameter<D> + Sync),
    specs: &[SynapseSpec<D>],
    step_size: f64,
    allow_autapses: bool,
    base_seed: u64,
) -> Result<Vec<Connection>> {
    let per_target: Vec<Result<Vec<Connection>>> = targets
        .par_iter()
        .map(|(target, target_pos)| {
            let mut rng = target_rng(base_seed, *target);
            let mut out = Vec::new();
            for (source, source_pos) in candidates(sources, mask, target_pos) {
                if !allow_autapses && source == target {
                    continue;
                }
                let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
                let p = probability.value(&mut rng, &ctx)?;
                if rand::Rng::gen::<f64>(&mut rng) < p {
                    for spec in specs {
                        out.push(spec.evaluate(&mut rng, &ctx, step_size, *source, *target)?);
                    }
                }
            }
            Ok(out)
        })
        .collect();

    join_results(per_target)
}

/// Parallel fixed-indegree: each target draws its `indegree`
/// sources independently, so the "stricter" global-reject behavior (spec
/// §9 Open Question 1) surfaces as the first per-target error encountered,
/// re-raised after every target has been attempted.
#[allow(clippy::too_many_arguments)]
pub fn fixed_indegree_parallel<const D: usize>(
    sources: &[(NodeId, Position<D>)],
    targets: &[(NodeId, Position<D>)],
    mask: &(dyn Mask<D> + Sync),
    extent: &Extent<D>,
    indegree: usize,
    allow_autapses: bool,
    allow_multapses: bool,
    specs: &[SynapseSpec<D>],
    step_size: f64,
    base_seed: u64,
) -> Result<Vec<Connection>> {
    let per_target: Vec<Result<Vec<Connection>>> = targets
        .par_iter()
        .map(|(target, target_pos)| {
            let mut rng = target_rng(base_seed, *target);
            let pool: Vec<&(NodeId, Position<D>)> = candidates(sources, mask, target_pos)
                .filter(|(s, _)| allow_autapses || s != target)
                .collect();

            if pool.is_empty() {
                return Err(esk_types::KernelError::kernel_exception(format!(
                    "fixed-indegree: empty source pool for target {target}"
                )));
            }
            if !allow_multapses && pool.len() < indegree {
                return Err(esk_types::KernelError::kernel_exception(format!(
                    "fixed-indegree: pool too small ({}) for indegree {indegree} without multapses at target {target}",
                    pool.len()
                )));
            }

            let mut chosen: Vec<usize> = Vec::with_capacity(indegree);
            let mut used = vec![false; pool.len()];
            while chosen.len() < indegree {
                let idx = rand::Rng::gen_range(&mut rng, 0..pool.len());
                if !allow_multapses && used[idx] {
                    continue;
                }
                used[idx] = true;
                chosen.push(idx);
            }

            let mut out = Vec::with_capacity(indegree * specs.len());
            for idx in chosen {
                let (source, source_pos) = pool[idx];
                let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
                for spec in specs {
                    out.push(spec.evaluate(&mut rng, &ctx, step_size, *source, *target)?);
                }
            }
            Ok(out)
        })
        .collect();

    join_results(per_target)
}

/// Flatten per-target results, re-raising the first error (in target order)
/// if any target failed, after every worker has completed.
fn join_results(per_target: Vec<Result<Vec<Connection>>>) -> Result<Vec<Connection>> {
    let mut out = Vec::new();
    for r in per_target {
        out.extend(r?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Constant;
    use esk_spatial::{AllMask, BoundingBox};
    use esk_types::{Position2, SynapseModelId};

    fn grid(n: usize) -> Vec<(NodeId, Position2)> {
        (0..n)
            .map(|i| (NodeId::new(i as u64 + 1), Position2::new([i as f64, 0.0])))
            .collect()
    }

    fn specs() -> Vec<SynapseSpec<2>> {
        vec![SynapseSpec {
            syn_id: SynapseModelId::new(1),
            weight: Box::new(Constant(2.0)),
            delay: Box::new(Constant(1.0)),
            receptor: None,
        }]
    }

    #[test]
    fn parallel_fixed_indegree_draws_exactly_n_per_target() {
        let sources = grid(10);
        let targets = grid(4);
        let all_mask = AllMask {
            region: BoundingBox::new(Position2::new([-100.0, -100.0]), Position2::new([100.0, 100.0])),
        };
        let extent = Extent::new([1000.0, 1000.0]);
        let conns = fixed_indegree_parallel(
            &sources, &targets, &all_mask, &extent, 4, true, false, &specs(), 1.0, 42,
        )
        .unwrap();
        assert_eq!(conns.len(), 16);
    }

    #[test]
    fn parallel_result_is_independent_of_how_many_targets_share_a_call() {
        let sources = grid(20);
        let all_mask = AllMask {
            region: BoundingBox::new(Position2::new([-100.0, -100.0]), Position2::new([100.0, 100.0])),
        };
        let extent = Extent::new([1000.0, 1000.0]);

        let all_targets = grid(8);
        let combined = fixed_indegree_parallel(
            &sources, &all_targets, &all_mask, &extent, 3, true, false, &specs(), 1.0, 7,
        )
        .unwrap();

        // Split the same targets across two separate parallel calls; each
        // target's chosen sources must match the single-call run exactly,
        // because the per-target RNG stream only depends on the target id.
        let (first_half, second_half) = all_targets.split_at(4);
        let mut split: Vec<Connection> = fixed_indegree_parallel(
            &sources, first_half, &all_mask, &extent, 3, true, false, &specs(), 1.0, 7,
        )
        .unwrap();
        split.extend(
            fixed_indegree_parallel(
                &sources, second_half, &all_mask, &extent, 3, true, false, &specs(), 1.0, 7,
            )
            .unwrap(),
        );

        let key = |c: &Connection| (c.source.raw(), c.target.raw());
        let mut combined_keys: Vec<_> = combined.iter().map(key).collect();
        let mut split_keys: Vec<_> = split.iter().map(key).collect();
        combined_keys.sort_unstable();
        split_keys.sort_unstable();
        assert_eq!(combined_keys, split_keys);
    }
}
