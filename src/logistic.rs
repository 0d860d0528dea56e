//! Logistic and mixture-of-logistics distributions.
//!
//! The logistic CDF is `sigmoid((x - mean) / scale)`. For a mixture the
//! component CDFs are weighted by the softmax of the mixture logits.
//!
//! `cdf` is built only from floating-point operations that are monotone in
//! their inputs (`exp`, add, multiply by a non-negative constant, divide into a
//! constant), so it never decreases as `x` grows, even by one ulp. The
//! quantizer relies on this. Extreme standardized values saturate to exactly 0
//! or 1: `exp` overflowing to infinity is absorbed rather than propagated, and
//! a scale so wide its inverse underflows reads as a flat 0.5.
//! `log_cdf` gives the same quantity in the log domain for callers that need
//! tail precision.
//!
//! Very sharp components can be widened with `with_log_scale_floor`, and a
//! global sharpening or widening applied with `with_log_scale_offset`.

use crate::error::{Error, Result};

/// Logistic sigmoid `1 / (1 + e^-z)`.
///
/// For very negative `z` the exponential overflows to infinity and the
/// result is exactly 0.
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// `ln(1 + e^z)`.
#[inline]
pub fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// `ln(sigmoid(z))`.
#[inline]
pub fn log_sigmoid(z: f64) -> f64 {
    -softplus(-z)
}

/// `ln(sum(e^v))`, `-inf` for an empty or all `-inf` input.
fn log_sum_exp(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    if max == f64::INFINITY {
        return max;
    }
    max + values.map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// `(x - mean) / exp(log_scale)` with `x == mean` pinned to zero even when
/// the inverse scale overflows, and an underflowed inverse scale pinned to
/// zero even when `x - mean` overflows.
#[inline]
fn standardize(x: f64, mean: f64, log_scale: f64) -> f64 {
    let d = x - mean;
    let inv_scale = (-log_scale).exp();
    if d == 0.0 || inv_scale == 0.0 {
        0.0
    } else {
        d * inv_scale
    }
}

fn check_log_scale_bound(value: f64, what: &str) -> Result<()> {
    if value.is_nan() || value == f64::INFINITY {
        return Err(Error::distribution(format!("invalid log scale {what} {value}")));
    }
    Ok(())
}

/// A continuous distribution with a cumulative distribution function.
pub trait ContinuousCdf {
    /// `P(X <= x)`, always within `[0, 1]`.
    fn cdf(&self, x: f64) -> f64;
}

impl<T: ContinuousCdf + ?Sized> ContinuousCdf for &T {
    fn cdf(&self, x: f64) -> f64 {
        (**self).cdf(x)
    }
}

/// A single logistic distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Logistic {
    mean: f64,
    log_scale: f64,
}

impl Logistic {
    /// Create a logistic with location `mean` and scale `exp(log_scale)`.
    ///
    /// # Errors
    /// Returns `Error::InvalidDistribution` for non-finite parameters.
    pub fn new(mean: f64, log_scale: f64) -> Result<Self> {
        if !mean.is_finite() || !log_scale.is_finite() {
            return Err(Error::distribution(format!(
                "non-finite logistic parameters: mean {mean}, log_scale {log_scale}"
            )));
        }
        Ok(Self { mean, log_scale })
    }

    /// Location.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Natural log of the scale.
    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    /// Add `offset` to the log scale, widening (positive) or sharpening
    /// (negative) the distribution.
    ///
    /// # Errors
    /// Returns `Error::InvalidDistribution` if the shifted log scale is not finite.
    pub fn with_log_scale_offset(self, offset: f64) -> Result<Self> {
        Self::new(self.mean, self.log_scale + offset)
    }

    /// Raise the log scale to at least `floor`. `f64::NEG_INFINITY` leaves it
    /// unchanged.
    ///
    /// # Errors
    /// Returns `Error::InvalidDistribution` if `floor` is NaN or `+inf`.
    pub fn with_log_scale_floor(self, floor: f64) -> Result<Self> {
        check_log_scale_bound(floor, "floor")?;
        Ok(Self {
            log_scale: self.log_scale.max(floor),
            ..self
        })
    }

    /// `ln P(X <= x)`.
    pub fn log_cdf(&self, x: f64) -> f64 {
        log_sigmoid(standardize(x, self.mean, self.log_scale))
    }
}

impl ContinuousCdf for Logistic {
    fn cdf(&self, x: f64) -> f64 {
        sigmoid(standardize(x, self.mean, self.log_scale))
    }
}

/// A K-component mixture of logistics over explicit parameter arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct MixtureLogistic {
    means: Vec<f64>,
    log_scales: Vec<f64>,
    /// Log mixture weights, already normalized.
    log_weights: Vec<f64>,
    weights: Vec<f64>,
}

impl MixtureLogistic {
    /// Create a mixture from per-component means, log scales and unnormalized
    /// mixture logits.
    ///
    /// # Errors
    /// Returns `Error::InvalidDistribution` if the arrays are empty, differ in
    /// length, or hold non-finite values.
    pub fn new(means: Vec<f64>, log_scales: Vec<f64>, logits: Vec<f64>) -> Result<Self> {
        if means.is_empty() {
            return Err(Error::distribution("mixture has no components"));
        }
        if means.len() != log_scales.len() || means.len() != logits.len() {
            return Err(Error::distribution(format!(
                "mixture arrays differ in length: {} means, {} log scales, {} logits",
                means.len(),
                log_scales.len(),
                logits.len()
            )));
        }
        if let Some(v) = means
            .iter()
            .chain(&log_scales)
            .chain(&logits)
            .find(|v| !v.is_finite())
        {
            return Err(Error::distribution(format!(
                "non-finite mixture parameter {v}"
            )));
        }

        let norm = log_sum_exp(logits.iter().copied());
        let log_weights: Vec<f64> = logits.iter().map(|l| l - norm).collect();
        let weights = log_weights.iter().map(|w| w.exp()).collect();
        Ok(Self {
            means,
            log_scales,
            log_weights,
            weights,
        })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.means.len()
    }

    /// Always false; a mixture holds at least one component.
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Per-component log scales.
    pub fn log_scales(&self) -> &[f64] {
        &self.log_scales
    }

    /// Add `offset` to every component's log scale.
    ///
    /// # Errors
    /// Returns `Error::InvalidDistribution` if a shifted log scale is not finite.
    pub fn with_log_scale_offset(mut self, offset: f64) -> Result<Self> {
        for s in &mut self.log_scales {
            *s += offset;
            if !s.is_finite() {
                return Err(Error::distribution(format!(
                    "log scale offset {offset} gives non-finite log scale {s}"
                )));
            }
        }
        Ok(self)
    }

    /// Raise every component's log scale to at least `floor`, so no
    /// component collapses onto a single point.
    ///
    /// # Errors
    /// Returns `Error::InvalidDistribution` if `floor` is NaN or `+inf`.
    pub fn with_log_scale_floor(mut self, floor: f64) -> Result<Self> {
        check_log_scale_bound(floor, "floor")?;
        for s in &mut self.log_scales {
            *s = s.max(floor);
        }
        Ok(self)
    }

    /// Softmax of the mixture logits.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `ln P(X <= x)`.
    pub fn log_cdf(&self, x: f64) -> f64 {
        let terms = self
            .means
            .iter()
            .zip(&self.log_scales)
            .zip(&self.log_weights)
            .map(move |((&m, &s), &w)| w + log_sigmoid(standardize(x, m, s)));
        log_sum_exp(terms)
    }
}

impl ContinuousCdf for MixtureLogistic {
    fn cdf(&self, x: f64) -> f64 {
        let p: f64 = self
            .means
            .iter()
            .zip(&self.log_scales)
            .zip(&self.weights)
            .map(|((&m, &s), &w)| w * sigmoid(standardize(x, m, s)))
            .sum();
        p.clamp(0.0, 1.0)
    }
}

impl From<Logistic> for MixtureLogistic {
    fn from(l: Logistic) -> Self {
        Self {
            means: vec![l.mean],
            log_scales: vec![l.log_scale],
            log_weights: vec![0.0],
            weights: vec![1.0],
        }
    }
}
