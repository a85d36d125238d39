// This file defines the numeric types and the interaction law shared by the binned and direct solvers.

use nalgebra::{RealField, SVector, SimdComplexField};
use num_traits::{NumCast, One, ToPrimitive, Zero};

use crate::error::ConfigError;

pub trait Float: RealField + Copy + NumCast + ToPrimitive + Send + Sync + 'static {}

impl<T> Float for T where T: RealField + Copy + NumCast + ToPrimitive + Send + Sync + 'static {}

/// Converts an `f64` constant into `F`.
#[inline]
pub fn real<F: Float>(value: f64) -> F {
    nalgebra::convert(value)
}

/// Lossy conversion back to `f64` for logging and error reporting.
#[inline]
pub fn to_f64<F: Float>(value: F) -> f64 {
    ToPrimitive::to_f64(&value).unwrap_or(f64::NAN)
}

pub trait Particle<F: Float, const D: usize> {
    fn position(&self) -> &SVector<F, D>;
    fn get_mass(&self) -> F;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointParticle<F: Float, const D: usize> {
    pub position: SVector<F, D>,
    pub mass: F,
}

impl<F: Float, const D: usize> PointParticle<F, D> {
    pub fn new(position: SVector<F, D>, mass: F) -> Self {
        Self { position, mass }
    }

    pub fn from_particle<P: Particle<F, D>>(particle: &P) -> Self {
        Self::new(*particle.position(), particle.get_mass())
    }
}

impl<F: Float, const D: usize> Particle<F, D> for PointParticle<F, D> {
    fn position(&self) -> &SVector<F, D> {
        &self.position
    }

    fn get_mass(&self) -> F {
        self.mass
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSettings<F: Float> {
    /// Gravitational constant, applied once to the summed acceleration.
    pub g: F,
    /// Added to the squared separation before the inverse cube is taken.
    pub softening: F,
}

impl<F: Float> Default for SimulationSettings<F> {
    fn default() -> Self {
        Self {
            g: F::one(),
            softening: real(1e-10),
        }
    }
}

impl<F: Float> SimulationSettings<F> {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.g.is_finite() {
            return Err(ConfigError::InvalidGravity(to_f64(self.g)));
        }
        if !(self.softening > F::zero()) || !self.softening.is_finite() {
            return Err(ConfigError::InvalidSoftening(to_f64(self.softening)));
        }
        Ok(())
    }
}

/// Acceleration induced at `target` by a point of weight `mass` at `source`.
///
/// With `r = source - target` this is `r * mass / (|r|^2 + softening)^(3/2)`.
/// The inverse cube is taken as `1 / sqrt(d^6)` so that single precision
/// results follow the same rounding path everywhere. A zero weight
/// contributes nothing, whatever its position.
#[inline]
pub fn softened_interaction<F: Float, const D: usize>(
    target: &SVector<F, D>,
    source: &SVector<F, D>,
    mass: F,
    softening: F,
) -> SVector<F, D> {
    if mass == F::zero() {
        return SVector::<F, D>::zeros();
    }
    let r = source - target;
    let dist_sqr = r.norm_squared() + softening;
    let dist_sixth = dist_sqr * dist_sqr * dist_sqr;
    let inv_dist_cube = F::one() / SimdComplexField::simd_sqrt(dist_sixth);
    r * (mass * inv_dist_cube)
}

/// Multiplies every acceleration by `g`, skipping the pass when `g` is one.
pub fn scale_accelerations<F: Float, const D: usize>(accelerations: &mut [SVector<F, D>], g: F) {
    if g.is_one() {
        return;
    }
    for acceleration in accelerations.iter_mut() {
        *acceleration *= g;
    }
}
