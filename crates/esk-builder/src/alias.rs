//! Vose's alias method: O(1) sampling from a fixed discrete distribution,
//! built once per target for weighted fixed-indegree connection rules.

use esk_types::{KernelError, Result};
use rand::Rng;

/// A one-time sampler over `n` weighted outcomes, built in `O(n)` and
/// sampled in `O(1)`.
#[derive(Debug, Clone)]
pub struct AliasTable {
    prob: Vec<f64>,
    alias: Vec<usize>,
}

impl AliasTable {
    /// Build a table from non-negative `weights`. At least one weight must
    /// be strictly positive.
    pub fn new(weights: &[f64]) -> Result<Self> {
        let n = weights.len();
        if n == 0 {
            return Err(KernelError::kernel_exception("alias table: empty weight list"));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) || weights.iter().any(|w| *w < 0.0) {
            return Err(KernelError::bad_property(
                "weights",
                "must be non-negative with a positive sum",
            ));
        }

        let mut prob = vec![0.0; n];
        let mut alias = vec![0usize; n];
        let mut scaled: Vec<f64> = weights.iter().map(|w| w * n as f64 / total).collect();

        let mut small: Vec<usize> = Vec::new();
        let mut large: Vec<usize> = Vec::new();
        for (i, p) in scaled.iter().enumerate() {
            if *p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while let (Some(s), Some(l)) = (small.pop(), large.pop()) {
            prob[s] = scaled[s];
            alias[s] = l;
            scaled[l] = scaled[l] + scaled[s] - 1.0;
            if scaled[l] < 1.0 {
                small.push(l);
            } else {
                large.push(l);
            }
        }
        for i in large {
            prob[i] = 1.0;
        }
        for i in small {
            prob[i] = 1.0;
        }

        Ok(Self { prob, alias })
    }

    /// Number of outcomes.
    pub fn len(&self) -> usize {
        self.prob.len()
    }

    /// True if the table has no outcomes (never constructed via [`Self::new`]).
    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }

    /// Draw one outcome index in `[0, len())`.
    pub fn sample(&self, rng: &mut impl Rng) -> usize {
        let i = rng.gen_range(0..self.prob.len());
        if rng.gen::<f64>() < self.prob[i] {
            i
        } else {
            self.alias[i]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_empty_or_all_zero_weights() {
        assert!(AliasTable::new(&[]).is_err());
        assert!(AliasTable::new(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn rejects_negative_weights() {
        assert!(AliasTable::new(&[1.0, -0.5]).is_err());
    }

    #[test]
    fn samples_converge_to_weight_proportions() {
        let table = AliasTable::new(&[1.0, 3.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u32; 2];
        for _ in 0..20_000 {
            counts[table.sample(&mut rng)] += 1;
        }
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!((ratio - 3.0).abs() < 0.3, "ratio was {ratio}");
    }

    #[test]
    fn uniform_weights_sample_every_index() {
        let table = AliasTable::new(&[1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = [false; 4];
        for _ in 0..500 {
            seen[table.sample(&mut rng)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
