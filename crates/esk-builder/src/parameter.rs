//! Per-connection parameter evaluation tree:
//! weight, delay, and receptor values are small expression trees evaluated
//! once per candidate connection, with optional access to the pair's
//! spatial context.

use esk_types::{Extent, KernelError, Position, Result};
use rand::Rng;
use rand_distr::Distribution;

/// Everything a parameter node may need beyond the RNG: the node's own
/// position (for per-node evaluation) and, during connection building, the
/// source/target positions and the shared extent used for periodic
/// distance.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a, const D: usize> {
    /// Position of the node being evaluated for (initializer use).
    pub node_pos: Option<&'a Position<D>>,
    /// Presynaptic position (connection-building use).
    pub source_pos: Option<&'a Position<D>>,
    /// Postsynaptic position (connection-building use).
    pub target_pos: Option<&'a Position<D>>,
    /// Extent used to resolve periodic distance; required by `Distance`
    /// and `ExpDist`/`Gaussian` nodes parameterized on distance.
    pub extent: Option<&'a Extent<D>>,
}

impl<'a, const D: usize> EvalContext<'a, D> {
    /// A context carrying only a node position, for non-spatial evaluation.
    pub fn for_node(node_pos: &'a Position<D>) -> Self {
        Self {
            node_pos: Some(node_pos),
            source_pos: None,
            target_pos: None,
            extent: None,
        }
    }

    /// A context carrying source/target positions, for connection building.
    pub fn for_pair(
        source_pos: &'a Position<D>,
        target_pos: &'a Position<D>,
        extent: &'a Extent<D>,
    ) -> Self {
        Self {
            node_pos: None,
            source_pos: Some(source_pos),
            target_pos: Some(target_pos),
            extent: Some(extent),
        }
    }
}

/// An expression yielding a scalar given an RNG and an [`EvalContext`].
pub trait Parameter<const D: usize>: std::fmt::Debug + Send + Sync {
    /// Evaluate this node.
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64>;
}

fn missing(what: &str) -> KernelError {
    KernelError::kernel_exception(format!("{what} not available in this evaluation context"))
}

/// A fixed scalar.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl<const D: usize> Parameter<D> for Constant {
    fn value(&self, _rng: &mut dyn rand::RngCore, _ctx: &EvalContext<D>) -> Result<f64> {
        Ok(self.0)
    }
}

macro_rules! binary_node {
    ($name:ident, $op:tt) => {
        /// A binary arithmetic/comparison node.
        #[derive(Debug)]
        pub struct $name<const D: usize> {
            /// Left operand.
            pub a: Box<dyn Parameter<D>>,
            /// Right operand.
            pub b: Box<dyn Parameter<D>>,
        }

        impl<const D: usize> Parameter<D> for $name<D> {
            fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
                let a = self.a.value(rng, ctx)?;
                let b = self.b.value(rng, ctx)?;
                Ok(binary_apply!($op, a, b))
            }
        }
    };
}

macro_rules! binary_apply {
    (+, $a:expr, $b:expr) => {
        $a + $b
    };
    (-, $a:expr, $b:expr) => {
        $a - $b
    };
    (*, $a:expr, $b:expr) => {
        $a * $b
    };
    (/, $a:expr, $b:expr) => {
        $a / $b
    };
}

binary_node!(Add, +);
binary_node!(Sub, -);
binary_node!(Mul, *);
binary_node!(Div, /);

/// Comparison operators yielding `1.0`/`0.0`.
#[derive(Debug, Clone, Copy)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
}

/// A comparison node.
#[derive(Debug)]
pub struct Compare<const D: usize> {
    /// Comparison operator.
    pub op: CompareOp,
    /// Left operand.
    pub a: Box<dyn Parameter<D>>,
    /// Right operand.
    pub b: Box<dyn Parameter<D>>,
}

impl<const D: usize> Parameter<D> for Compare<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        let a = self.a.value(rng, ctx)?;
        let b = self.b.value(rng, ctx)?;
        let truth = match self.op {
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
            CompareOp::Eq => a == b,
        };
        Ok(if truth { 1.0 } else { 0.0 })
    }
}

/// Elementary unary functions.
#[derive(Debug, Clone, Copy)]
pub enum ElementaryOp {
    /// `exp(x)`
    Exp,
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
}

/// An elementary-function node.
#[derive(Debug)]
pub struct Elementary<const D: usize> {
    /// Which function to apply.
    pub op: ElementaryOp,
    /// The operand.
    pub x: Box<dyn Parameter<D>>,
}

impl<const D: usize> Parameter<D> for Elementary<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        let x = self.x.value(rng, ctx)?;
        Ok(match self.op {
            ElementaryOp::Exp => x.exp(),
            ElementaryOp::Sin => x.sin(),
            ElementaryOp::Cos => x.cos(),
        })
    }
}

/// `base ^ exponent`.
#[derive(Debug)]
pub struct Pow<const D: usize> {
    /// Base.
    pub base: Box<dyn Parameter<D>>,
    /// Exponent.
    pub exponent: Box<dyn Parameter<D>>,
}

impl<const D: usize> Parameter<D> for Pow<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        let base = self.base.value(rng, ctx)?;
        let exponent = self.exponent.value(rng, ctx)?;
        Ok(base.powf(exponent))
    }
}

/// Ternary conditional: `condition != 0 ? if_true : if_false`.
#[derive(Debug)]
pub struct Conditional<const D: usize> {
    /// Selector, tested against zero.
    pub condition: Box<dyn Parameter<D>>,
    /// Evaluated when `condition != 0`.
    pub if_true: Box<dyn Parameter<D>>,
    /// Evaluated otherwise.
    pub if_false: Box<dyn Parameter<D>>,
}

impl<const D: usize> Parameter<D> for Conditional<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        let c = self.condition.value(rng, ctx)?;
        if c != 0.0 {
            self.if_true.value(rng, ctx)
        } else {
            self.if_false.value(rng, ctx)
        }
    }
}

/// `min(a, b)`.
#[derive(Debug)]
pub struct Min<const D: usize>(pub Box<dyn Parameter<D>>, pub Box<dyn Parameter<D>>);

impl<const D: usize> Parameter<D> for Min<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        Ok(self.0.value(rng, ctx)?.min(self.1.value(rng, ctx)?))
    }
}

/// `max(a, b)`.
#[derive(Debug)]
pub struct Max<const D: usize>(pub Box<dyn Parameter<D>>, pub Box<dyn Parameter<D>>);

impl<const D: usize> Parameter<D> for Max<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        Ok(self.0.value(rng, ctx)?.max(self.1.value(rng, ctx)?))
    }
}

/// Clip `x` into `[lo, hi]`.
#[derive(Debug)]
pub struct Clip<const D: usize> {
    /// Operand.
    pub x: Box<dyn Parameter<D>>,
    /// Lower bound.
    pub lo: f64,
    /// Upper bound.
    pub hi: f64,
}

impl<const D: usize> Parameter<D> for Clip<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        Ok(self.x.value(rng, ctx)?.clamp(self.lo, self.hi))
    }
}

/// Resample `inner` up to `max_attempts` times until its value falls within
/// `[lo, hi]`; exceeding the budget raises `KernelException`.
#[derive(Debug)]
pub struct Redraw<const D: usize> {
    /// The parameter to resample.
    pub inner: Box<dyn Parameter<D>>,
    /// Lower bound, inclusive.
    pub lo: f64,
    /// Upper bound, inclusive.
    pub hi: f64,
    /// Maximum number of draws before giving up.
    pub max_attempts: u32,
}

impl<const D: usize> Parameter<D> for Redraw<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        for _ in 0..self.max_attempts {
            let v = self.inner.value(rng, ctx)?;
            if v >= self.lo && v <= self.hi {
                return Ok(v);
            }
        }
        Err(KernelError::kernel_exception(format!(
            "redraw exceeded {} attempts without landing in [{}, {}]",
            self.max_attempts, self.lo, self.hi
        )))
    }
}

/// A random draw from one of the standard distributions.
#[derive(Debug, Clone, Copy)]
pub enum RandomDistribution<const D: usize> {
    /// Uniform over `[lo, hi)`.
    Uniform {
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },
    /// Normal with mean `mu`, standard deviation `sigma`.
    Normal {
        /// Mean.
        mu: f64,
        /// Standard deviation, must be `> 0`.
        sigma: f64,
    },
    /// Log-normal: `exp(Normal(mu, sigma))`.
    LogNormal {
        /// Mean of the underlying normal.
        mu: f64,
        /// Standard deviation of the underlying normal, must be `> 0`.
        sigma: f64,
    },
    /// Exponential with rate derived from scale `beta`, must be `> 0`.
    Exponential {
        /// Scale parameter.
        beta: f64,
    },
    /// Gamma with shape `kappa` and scale `theta`, both `> 0`.
    Gamma {
        /// Shape parameter.
        kappa: f64,
        /// Scale parameter.
        theta: f64,
    },
}

impl<const D: usize> RandomDistribution<D> {
    /// Validate construction-time invariants.
    pub fn validate(&self) -> Result<()> {
        match *self {
            RandomDistribution::Uniform { lo, hi } if lo >= hi => {
                Err(KernelError::bad_property("uniform", "lo must be < hi"))
            }
            RandomDistribution::Normal { sigma, .. } if sigma <= 0.0 => {
                Err(KernelError::bad_property("sigma", "must be > 0"))
            }
            RandomDistribution::LogNormal { sigma, .. } if sigma <= 0.0 => {
                Err(KernelError::bad_property("sigma", "must be > 0"))
            }
            RandomDistribution::Exponential { beta } if beta <= 0.0 => {
                Err(KernelError::bad_property("beta", "must be > 0"))
            }
            RandomDistribution::Gamma { kappa, theta } if kappa <= 0.0 || theta <= 0.0 => {
                Err(KernelError::bad_property("kappa/theta", "must both be > 0"))
            }
            _ => Ok(()),
        }
    }
}

impl<const D: usize> Parameter<D> for RandomDistribution<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, _ctx: &EvalContext<D>) -> Result<f64> {
        Ok(match *self {
            RandomDistribution::Uniform { lo, hi } => rng.gen_range(lo..hi),
            RandomDistribution::Normal { mu, sigma } => {
                rand_distr::Normal::new(mu, sigma)
                    .map_err(|e| KernelError::bad_property("sigma", e.to_string()))?
                    .sample(rng)
            }
            RandomDistribution::LogNormal { mu, sigma } => {
                rand_distr::LogNormal::new(mu, sigma)
                    .map_err(|e| KernelError::bad_property("sigma", e.to_string()))?
                    .sample(rng)
            }
            RandomDistribution::Exponential { beta } => {
                rand_distr::Exp::new(1.0 / beta)
                    .map_err(|e| KernelError::bad_property("beta", e.to_string()))?
                    .sample(rng)
            }
            RandomDistribution::Gamma { kappa, theta } => {
                rand_distr::Gamma::new(kappa, theta)
                    .map_err(|e| KernelError::bad_property("kappa/theta", e.to_string()))?
                    .sample(rng)
            }
        })
    }
}

/// The `dim`-th coordinate of the node's own position (initializer use).
#[derive(Debug)]
pub struct NodePos {
    /// Axis index (0-based).
    pub dim: usize,
}

impl<const D: usize> Parameter<D> for NodePos {
    fn value(&self, _rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        ctx.node_pos
            .map(|p| p.coord(self.dim))
            .ok_or_else(|| missing("node position"))
    }
}

/// Which side of a connection pair a spatial node reads from.
#[derive(Debug, Clone, Copy)]
pub enum PairSide {
    /// The presynaptic node.
    Source,
    /// The postsynaptic node.
    Target,
}

/// The `dim`-th coordinate of the source or target position, available
/// only during connection building.
#[derive(Debug)]
pub struct PairPos {
    /// Which side to read.
    pub side: PairSide,
    /// Axis index (0-based).
    pub dim: usize,
}

impl<const D: usize> Parameter<D> for PairPos {
    fn value(&self, _rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        let p = match self.side {
            PairSide::Source => ctx.source_pos,
            PairSide::Target => ctx.target_pos,
        };
        p.map(|p| p.coord(self.dim))
            .ok_or_else(|| missing("source/target position"))
    }
}

/// Euclidean distance between source and target, honoring periodicity.
/// `dim == 0` means "all axes"; `dim > 0` selects `axis = dim - 1` (spec
/// §4.11).
#[derive(Debug)]
pub struct Distance {
    /// Axis selector.
    pub dim: usize,
}

impl<const D: usize> Parameter<D> for Distance {
    fn value(&self, _rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        let source = ctx.source_pos.ok_or_else(|| missing("source position"))?;
        let target = ctx.target_pos.ok_or_else(|| missing("target position"))?;
        let extent = ctx.extent.ok_or_else(|| missing("layer extent"))?;
        Ok(extent.axis_distance(source, target, self.dim))
    }
}

/// `exp(-x/beta)`.
#[derive(Debug)]
pub struct ExpDist<const D: usize> {
    /// Operand, typically a [`Distance`] node.
    pub x: Box<dyn Parameter<D>>,
    /// Decay scale, must be `> 0`.
    pub beta: f64,
}

impl<const D: usize> Parameter<D> for ExpDist<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        if self.beta <= 0.0 {
            return Err(KernelError::bad_property("beta", "must be > 0"));
        }
        let x = self.x.value(rng, ctx)?;
        Ok((-x / self.beta).exp())
    }
}

/// `exp(-(x - mu)^2 / (2 sigma^2))`.
#[derive(Debug)]
pub struct Gaussian<const D: usize> {
    /// Operand.
    pub x: Box<dyn Parameter<D>>,
    /// Mean.
    pub mu: f64,
    /// Standard deviation, must be `> 0`.
    pub sigma: f64,
}

impl<const D: usize> Parameter<D> for Gaussian<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        if self.sigma <= 0.0 {
            return Err(KernelError::bad_property("sigma", "must be > 0"));
        }
        let x = self.x.value(rng, ctx)?;
        Ok((-(x - self.mu).powi(2) / (2.0 * self.sigma * self.sigma)).exp())
    }
}

/// Bivariate Gaussian of the `(x, y)` displacement with correlation `rho`,
/// evaluated directly from the source/target pair rather than a single
/// scalar operand.
#[derive(Debug)]
pub struct Gaussian2d {
    /// Std dev along axis 0, must be `> 0`.
    pub sigma_x: f64,
    /// Std dev along axis 1, must be `> 0`.
    pub sigma_y: f64,
    /// Correlation, must satisfy `|rho| < 1`.
    pub rho: f64,
}

impl<const D: usize> Parameter<D> for Gaussian2d {
    fn value(&self, _rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        if self.sigma_x <= 0.0 || self.sigma_y <= 0.0 {
            return Err(KernelError::bad_property("sigma", "must be > 0"));
        }
        if !(-1.0..1.0).contains(&self.rho) {
            return Err(KernelError::bad_property("rho", "must satisfy |rho| < 1"));
        }
        let source = ctx.source_pos.ok_or_else(|| missing("source position"))?;
        let target = ctx.target_pos.ok_or_else(|| missing("target position"))?;
        let extent = ctx.extent.ok_or_else(|| missing("layer extent"))?;
        let d = extent.displacement(source, target);
        let x = d.coord(0);
        let y = d.coord(1);
        let q = (x / self.sigma_x).powi(2) - 2.0 * self.rho * x * y / (self.sigma_x * self.sigma_y)
            + (y / self.sigma_y).powi(2);
        Ok((-q / (2.0 * (1.0 - self.rho * self.rho))).exp())
    }
}

/// Gamma density shape evaluated at `x`: `x^(kappa-1) * exp(-x/theta)`
/// (unnormalized, matching the other distance-kernel nodes which are used
/// as connection-probability weights rather than true densities).
#[derive(Debug)]
pub struct GammaDist<const D: usize> {
    /// Operand.
    pub x: Box<dyn Parameter<D>>,
    /// Shape, must be `> 0`.
    pub kappa: f64,
    /// Scale, must be `> 0`.
    pub theta: f64,
}

impl<const D: usize> Parameter<D> for GammaDist<D> {
    fn value(&self, rng: &mut dyn rand::RngCore, ctx: &EvalContext<D>) -> Result<f64> {
        if self.kappa <= 0.0 || self.theta <= 0.0 {
            return Err(KernelError::bad_property("kappa/theta", "must both be > 0"));
        }
        let x = self.x.value(rng, ctx)?;
        if x <= 0.0 {
            return Ok(0.0);
        }
        Ok(x.powf(self.kappa - 1.0) * (-x / self.theta).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esk_types::Position2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn arithmetic_nodes_compose() {
        let expr: Add<2> = Add {
            a: Box::new(Constant(2.0)),
            b: Box::new(Mul {
                a: Box::new(Constant(3.0)),
                b: Box::new(Constant(4.0)),
            }),
        };
        let ctx = EvalContext::<2> {
            node_pos: None,
            source_pos: None,
            target_pos: None,
            extent: None,
        };
        let mut r = rng();
        assert_eq!(expr.value(&mut r, &ctx).unwrap(), 14.0);
    }

    #[test]
    fn redraw_gives_up_after_max_attempts() {
        let redraw: Redraw<2> = Redraw {
            inner: Box::new(Constant(5.0)),
            lo: 0.0,
            hi: 1.0,
            max_attempts: 3,
        };
        let ctx = EvalContext::<2> {
            node_pos: None,
            source_pos: None,
            target_pos: None,
            extent: None,
        };
        let mut r = rng();
        assert!(redraw.value(&mut r, &ctx).is_err());
    }

    #[test]
    fn distance_node_uses_periodic_extent() {
        let extent = Extent::new([1.0, 1.0]).all_periodic();
        let source = Position2::new([0.1, 0.1]);
        let target = Position2::new([0.9, 0.9]);
        let ctx = EvalContext::for_pair(&source, &target, &extent);
        let node: Distance = Distance { dim: 0 };
        let mut r = rng();
        let d = Parameter::<2>::value(&node, &mut r, &ctx).unwrap();
        assert!((d - 0.08f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn exp_dist_rejects_nonpositive_beta() {
        let node: ExpDist<2> = ExpDist {
            x: Box::new(Constant(1.0)),
            beta: 0.0,
        };
        let ctx = EvalContext::<2> {
            node_pos: None,
            source_pos: None,
            target_pos: None,
            extent: None,
        };
        let mut r = rng();
        assert!(node.value(&mut r, &ctx).is_err());
    }

    #[test]
    fn distribution_validation_catches_bad_parameters() {
        assert!(RandomDistribution::<2>::Normal { mu: 0.0, sigma: -1.0 }
            .validate()
            .is_err());
        assert!(RandomDistribution::<2>::Gamma { kappa: 1.0, theta: 1.0 }
            .validate()
            .is_ok());
    }

    #[test]
    fn uniform_distribution_stays_in_range() {
        let dist: RandomDistribution<2> = RandomDistribution::Uniform { lo: 2.0, hi: 3.0 };
        let ctx = EvalContext::<2> {
            node_pos: None,
            source_pos: None,
            target_pos: None,
            extent: None,
        };
        let mut r = rng();
        for _ in 0..100 {
            let v = dist.value(&mut r, &ctx).unwrap();
            assert!((2.0..3.0).contains(&v));
        }
    }
}
