//! Per-variable weight specifications.
//!
//! A [`Weights`] value describes the (unnormalized) weight of each value of a categorical
//! variable. It is either parametric, a density or a probability mass function, or a literal
//! list. [`Weights::weights_for`] evaluates any of them over a support of given size:
//! - a density is evaluated at the grid points `k / support` for `k` in `0..support`,
//! - a mass function is evaluated at the integers `k` in `0..support`,
//! - a literal list is used as is and must have exactly `support` elements.
//!
//! No normalization happens here.

use std::sync::Arc;

use ndarray::Array1;

use crate::{NumericError, Result, UsageError};

/// Continuous distribution, queried through its density function.
pub trait Density: Send + Sync {
    fn density(&self, x: f64) -> f64;
}

/// Discrete distribution, queried through its probability mass function.
pub trait Mass: Send + Sync {
    fn mass(&self, k: usize) -> f64;
}

impl<F> Density for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn density(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Wrapper turning a function of the value index into a [`Mass`].
pub struct MassFn<F>(pub F);

impl<F> Mass for MassFn<F>
where
    F: Fn(usize) -> f64 + Send + Sync,
{
    fn mass(&self, k: usize) -> f64 {
        (self.0)(k)
    }
}

#[derive(Clone)]
pub enum Weights {
    Density(Arc<dyn Density>),
    Mass(Arc<dyn Mass>),
    Literal(Vec<f64>),
}

impl Weights {
    pub fn density(d: impl Density + 'static) -> Self {
        Self::Density(Arc::new(d))
    }
    pub fn mass(m: impl Mass + 'static) -> Self {
        Self::Mass(Arc::new(m))
    }
    pub fn literal(weights: impl Into<Vec<f64>>) -> Self {
        Self::Literal(weights.into())
    }

    /// Weights of the `support` values of `node`.
    pub fn weights_for(&self, node: &str, support: usize) -> Result<Array1<f64>> {
        let weights = match self {
            Self::Density(d) => {
                Array1::from_shape_fn(support, |k| d.density(k as f64 / support as f64))
            }
            Self::Mass(m) => Array1::from_shape_fn(support, |k| m.mass(k)),
            Self::Literal(w) => {
                if w.len() != support {
                    return Err(UsageError::WeightLength {
                        node: node.to_owned(),
                        got: w.len(),
                        expected: support,
                    }
                    .into());
                }
                Array1::from_vec(w.clone())
            }
        };
        if let Some((index, value)) = weights.iter().enumerate().find(|(_, w)| !w.is_finite()) {
            return Err(NumericError::NonFinite {
                node: node.to_owned(),
                index,
                value: *value,
            }
            .into());
        }
        Ok(weights)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Density(_) => "density",
            Self::Mass(_) => "mass",
            Self::Literal(_) => "literal",
        }
    }
}

impl std::fmt::Debug for Weights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(w) => f.debug_tuple("Literal").field(w).finish(),
            Self::Density(_) => f.write_str("Density(..)"),
            Self::Mass(_) => f.write_str("Mass(..)"),
        }
    }
}

impl From<Vec<f64>> for Weights {
    fn from(w: Vec<f64>) -> Self {
        Self::Literal(w)
    }
}

impl From<&[f64]> for Weights {
    fn from(w: &[f64]) -> Self {
        Self::Literal(w.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Weights {
    fn from(w: [f64; N]) -> Self {
        Self::Literal(w.to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Normal {
    pub mean: f64,
    pub std: f64,
}

impl Normal {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }
}

impl Density for Normal {
    fn density(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.std;
        (-0.5 * z * z).exp() / (self.std * (2.0 * std::f64::consts::PI).sqrt())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    pub rate: f64,
}

impl Exponential {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl Density for Exponential {
    fn density(&self, x: f64) -> f64 {
        if x < 0.0 {
            0.0
        } else {
            self.rate * (-self.rate * x).exp()
        }
    }
}

/// Uniform density on `[low, high]`.
#[derive(Debug, Clone, Copy)]
pub struct Uniform {
    pub low: f64,
    pub high: f64,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl Density for Uniform {
    fn density(&self, x: f64) -> f64 {
        if x < self.low || x > self.high {
            0.0
        } else {
            1.0 / (self.high - self.low)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bernoulli {
    pub p: f64,
}

impl Bernoulli {
    pub fn new(p: f64) -> Self {
        Self { p }
    }
}

impl Mass for Bernoulli {
    fn mass(&self, k: usize) -> f64 {
        match k {
            0 => 1.0 - self.p,
            1 => self.p,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Binomial {
    pub n: usize,
    pub p: f64,
}

impl Binomial {
    pub fn new(n: usize, p: f64) -> Self {
        Self { n, p }
    }
}

impl Mass for Binomial {
    fn mass(&self, k: usize) -> f64 {
        if k > self.n {
            return 0.0;
        }
        // C(n, k) as a running product keeps intermediate values small.
        let choose = (1..=k).fold(1.0, |acc, i| acc * (self.n - k + i) as f64 / i as f64);
        choose * self.p.powi(k as i32) * (1.0 - self.p).powi((self.n - k) as i32)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Poisson {
    pub lambda: f64,
}

impl Poisson {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl Mass for Poisson {
    fn mass(&self, k: usize) -> f64 {
        (1..=k).fold((-self.lambda).exp(), |acc, i| acc * self.lambda / i as f64)
    }
}

/// Number of failures before the first success.
#[derive(Debug, Clone, Copy)]
pub struct Geometric {
    pub p: f64,
}

impl Geometric {
    pub fn new(p: f64) -> Self {
        Self { p }
    }
}

impl Mass for Geometric {
    fn mass(&self, k: usize) -> f64 {
        (1.0 - self.p).powi(k as i32) * self.p
    }
}
