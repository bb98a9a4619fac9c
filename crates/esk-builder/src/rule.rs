//! Spatial connection rules between a source and a target layer (spec
//! §4.10, component C10).

use esk_types::{Delay, Extent, KernelError, NodeId, Position, ReceptorType, Result, SynapseModelId};
use esk_spatial::Mask;
use rand::Rng;

use crate::alias::AliasTable;
use crate::parameter::{EvalContext, Parameter};

/// One materialized connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    /// Presynaptic node.
    pub source: NodeId,
    /// Postsynaptic node.
    pub target: NodeId,
    /// Evaluated weight.
    pub weight: f64,
    /// Evaluated delay, rounded to whole steps.
    pub delay: Delay,
    /// Evaluated receptor port.
    pub receptor: ReceptorType,
    /// Synapse model this connection was built under.
    pub syn_id: SynapseModelId,
}

/// Weight/delay/receptor parameter set for one synapse model, evaluated at
/// each selected pair in that order.
pub struct SynapseSpec<const D: usize> {
    /// Synapse model identity recorded on produced connections.
    pub syn_id: SynapseModelId,
    /// Weight parameter.
    pub weight: Box<dyn Parameter<D>>,
    /// Delay parameter, in the same time units as the simulation step; the
    /// caller rounds to whole steps via `step_size`.
    pub delay: Box<dyn Parameter<D>>,
    /// Receptor parameter; `None` selects the model default.
    pub receptor: Option<Box<dyn Parameter<D>>>,
}

impl<const D: usize> SynapseSpec<D> {
    pub(crate) fn evaluate(
        &self,
        rng: &mut dyn rand::RngCore,
        ctx: &EvalContext<D>,
        step_size: f64,
        source: NodeId,
        target: NodeId,
    ) -> Result<Connection> {
        let weight = self.weight.value(rng, ctx)?;
        let delay_value = self.delay.value(rng, ctx)?;
        let steps = (delay_value / step_size).round().max(1.0) as u32;
        let receptor = match &self.receptor {
            Some(p) => ReceptorType::new(p.value(rng, ctx)?.round() as usize),
            None => ReceptorType::DEFAULT,
        };
        Ok(Connection {
            source,
            target,
            weight,
            delay: Delay::new(steps),
            receptor,
            syn_id: self.syn_id,
        })
    }
}

/// Refuse spatial connection rules against device-like targets, i.e.
/// collections without proxies on other ranks. Call before the first connection is made.
pub fn reject_device_targets(target_has_remote_proxies: bool) -> Result<()> {
    if target_has_remote_proxies {
        Ok(())
    } else {
        Err(KernelError::illegal_connection(
            "spatial connection rules are refused against device-like targets",
        ))
    }
}

/// Candidate presynaptic nodes, gathered once per target via the mask
/// anchored at the target's position.
fn candidates<'a, const D: usize>(
    pool: &'a [(NodeId, Position<D>)],
    mask: &dyn Mask<D>,
    anchor: &Position<D>,
) -> impl Iterator<Item = &'a (NodeId, Position<D>)> {
    pool.iter()
        .filter(move |(_, p)| mask.inside(&(*p - *anchor)))
}

/// Pairwise-Bernoulli, target-driven: for each local target, enumerate
/// masked source candidates and instantiate each with probability
/// `probability(source, target)`.
#[allow(clippy::too_many_arguments)]
pub fn pairwise_bernoulli_target_driven<const D: usize>(
    sources: &[(NodeId, Position<D>)],
    targets: &[(NodeId, Position<D>)],
    mask: &dyn Mask<D>,
    extent: &Extent<D>,
    probability: &dyn Parameter<D>,
    specs: &[SynapseSpec<D>],
    step_size: f64,
    allow_autapses: bool,
    rng: &mut dyn rand::RngCore,
) -> Result<Vec<Connection>> {
    let mut out = Vec::new();
    for (target, target_pos) in targets {
        for (source, source_pos) in candidates(sources, mask, target_pos) {
            if !allow_autapses && source == target {
                continue;
            }
            let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
            let p = probability.value(rng, &ctx)?;
            if rng.gen::<f64>() < p {
                for spec in specs {
                    out.push(spec.evaluate(rng, &ctx, step_size, *source, *target)?);
                }
            }
        }
    }
    Ok(out)
}

/// Pairwise-Bernoulli, source-driven: symmetric to the target-driven rule,
/// iterating sources and anchoring the mask at each source.
#[allow(clippy::too_many_arguments)]
pub fn pairwise_bernoulli_source_driven<const D: usize>(
    sources: &[(NodeId, Position<D>)],
    targets: &[(NodeId, Position<D>)],
    mask: &dyn Mask<D>,
    extent: &Extent<D>,
    probability: &dyn Parameter<D>,
    specs: &[SynapseSpec<D>],
    step_size: f64,
    allow_autapses: bool,
    rng: &mut dyn rand::RngCore,
) -> Result<Vec<Connection>> {
    let mut out = Vec::new();
    for (source, source_pos) in sources {
        for (target, target_pos) in candidates(targets, mask, source_pos) {
            if !allow_autapses && source == target {
                continue;
            }
            let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
            let p = probability.value(rng, &ctx)?;
            if rng.gen::<f64>() < p {
                for spec in specs {
                    out.push(spec.evaluate(rng, &ctx, step_size, *source, *target)?);
                }
            }
        }
    }
    Ok(out)
}

/// Draw exactly `indegree` sources for each local target from its masked
/// pool, optionally weighted by `kernel` via a one-time alias-method
/// sampler.
#[allow(clippy::too_many_arguments)]
pub fn fixed_indegree<const D: usize>(
    sources: &[(NodeId, Position<D>)],
    targets: &[(NodeId, Position<D>)],
    mask: &dyn Mask<D>,
    extent: &Extent<D>,
    kernel: Option<&dyn Parameter<D>>,
    indegree: usize,
    allow_autapses: bool,
    allow_multapses: bool,
    specs: &[SynapseSpec<D>],
    step_size: f64,
    rng: &mut dyn rand::RngCore,
) -> Result<Vec<Connection>> {
    let mut out = Vec::new();
    for (target, target_pos) in targets {
        let pool: Vec<&(NodeId, Position<D>)> = candidates(sources, mask, target_pos)
            .filter(|(s, _)| allow_autapses || s != target)
            .collect();

        if pool.is_empty() {
            return Err(KernelError::kernel_exception(format!(
                "fixed-indegree: empty source pool for target {target}"
            )));
        }
        if !allow_multapses && pool.len() < indegree {
            return Err(KernelError::kernel_exception(format!(
                "fixed-indegree: pool too small ({}) for indegree {indegree} without multapses at target {target}",
                pool.len()
            )));
        }

        let alias = match kernel {
            Some(k) => {
                let mut weights = Vec::with_capacity(pool.len());
                for (source, source_pos) in &pool {
                    let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
                    weights.push(k.value(rng, &ctx)?);
                    let _ = source;
                }
                Some(AliasTable::new(&weights)?)
            }
            None => None,
        };

        let mut chosen: Vec<usize> = Vec::with_capacity(indegree);
        let mut used = vec![false; pool.len()];
        while chosen.len() < indegree {
            let idx = match &alias {
                Some(table) => table.sample(rng),
                None => rng.gen_range(0..pool.len()),
            };
            if !allow_multapses && used[idx] {
                continue;
            }
            used[idx] = true;
            chosen.push(idx);
        }

        for idx in chosen {
            let (source, source_pos) = pool[idx];
            let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
            for spec in specs {
                out.push(spec.evaluate(rng, &ctx, step_size, *source, *target)?);
            }
        }
    }
    Ok(out)
}

/// Draw exactly `outdegree` targets for each global source, consuming a
/// rank-synchronized RNG before checking locality, so every rank consumes
/// the same draws in the same order regardless of which targets it
/// actually owns.
#[allow(clippy::too_many_arguments)]
pub fn fixed_outdegree<const D: usize>(
    sources: &[(NodeId, Position<D>)],
    targets: &[(NodeId, Position<D>)],
    mask: &dyn Mask<D>,
    extent: &Extent<D>,
    outdegree: usize,
    allow_autapses: bool,
    allow_multapses: bool,
    specs: &[SynapseSpec<D>],
    step_size: f64,
    owns_target: &dyn Fn(NodeId) -> bool,
    global_rng: &mut dyn rand::RngCore,
) -> Result<Vec<Connection>> {
    let mut out = Vec::new();
    for (source, source_pos) in sources {
        let pool: Vec<&(NodeId, Position<D>)> = candidates(targets, mask, source_pos)
            .filter(|(t, _)| allow_autapses || t != source)
            .collect();

        if pool.is_empty() {
            return Err(KernelError::kernel_exception(format!(
                "fixed-outdegree: empty target pool for source {source}"
            )));
        }
        if !allow_multapses && pool.len() < outdegree {
            return Err(KernelError::kernel_exception(format!(
                "fixed-outdegree: pool too small ({}) for outdegree {outdegree} without multapses at source {source}",
                pool.len()
            )));
        }

        let mut chosen: Vec<usize> = Vec::with_capacity(outdegree);
        let mut used = vec![false; pool.len()];
        while chosen.len() < outdegree {
            // Drawn unconditionally so every rank's RNG stream advances
            // identically, regardless of local ownership.
            let idx = global_rng.gen_range(0..pool.len());
            if !allow_multapses && used[idx] {
                continue;
            }
            used[idx] = true;
            chosen.push(idx);
        }

        for idx in chosen {
            let (target, target_pos) = pool[idx];
            if !owns_target(*target) {
                continue;
            }
            let ctx = EvalContext::for_pair(source_pos, target_pos, extent);
            for spec in specs {
                out.push(spec.evaluate(global_rng, &ctx, step_size, *source, *target)?);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Constant;
    use esk_spatial::{AllMask, BoundingBox};
    use esk_types::Position2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

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
    fn reject_device_targets_raises_illegal_connection() {
        assert!(reject_device_targets(false).is_err());
        assert!(reject_device_targets(true).is_ok());
    }

    #[test]
    fn bernoulli_probability_one_connects_every_masked_pair() {
        let sources = grid(3);
        let targets = grid(3);
        let all_mask = AllMask {
            region: BoundingBox::new(Position2::new([-100.0, -100.0]), Position2::new([100.0, 100.0])),
        };
        let extent = Extent::new([1000.0, 1000.0]);
        let prob = Constant(1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let conns = pairwise_bernoulli_target_driven(
            &sources, &targets, &all_mask, &extent, &prob, &specs(), 1.0, true, &mut rng,
        )
        .unwrap();
        assert_eq!(conns.len(), 9);
    }

    #[test]
    fn fixed_indegree_draws_exactly_n_sources_per_target() {
        let sources = grid(10);
        let targets = grid(2);
        let all_mask = AllMask {
            region: BoundingBox::new(Position2::new([-100.0, -100.0]), Position2::new([100.0, 100.0])),
        };
        let extent = Extent::new([1000.0, 1000.0]);
        let mut rng = StdRng::seed_from_u64(3);
        let conns = fixed_indegree(
            &sources, &targets, &all_mask, &extent, None, 4, true, false, &specs(), 1.0, &mut rng,
        )
        .unwrap();
        assert_eq!(conns.len(), 8);
    }

    #[test]
    fn fixed_indegree_fails_when_pool_too_small_without_multapses() {
        let sources = grid(2);
        let targets = grid(1);
        let all_mask = AllMask {
            region: BoundingBox::new(Position2::new([-100.0, -100.0]), Position2::new([100.0, 100.0])),
        };
        let extent = Extent::new([1000.0, 1000.0]);
        let mut rng = StdRng::seed_from_u64(3);
        let result = fixed_indegree(
            &sources, &targets, &all_mask, &extent, None, 5, true, false, &specs(), 1.0, &mut rng,
        );
        assert!(result.is_err());
    }

    #[test]
    fn fixed_outdegree_consumes_rng_even_for_unowned_targets() {
        let sources = grid(1);
        let targets = grid(10);
        let all_mask = AllMask {
            region: BoundingBox::new(Position2::new([-100.0, -100.0]), Position2::new([100.0, 100.0])),
        };
        let extent = Extent::new([1000.0, 1000.0]);

        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        let owns_none = |_n: NodeId| false;
        let owns_all = |_n: NodeId| true;

        let conns_none = fixed_outdegree(
            &sources, &targets, &all_mask, &extent, 3, true, false, &specs(), 1.0, &owns_none, &mut rng_a,
        )
        .unwrap();
        let conns_all = fixed_outdegree(
            &sources, &targets, &all_mask, &extent, 3, true, false, &specs(), 1.0, &owns_all, &mut rng_b,
        )
        .unwrap();
        assert_eq!(conns_none.len(), 0);
        assert_eq!(conns_all.len(), 3);
    }
}
