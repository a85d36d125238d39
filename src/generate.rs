//! Seeded body sources.

use nalgebra::SVector;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{error::ConfigError, shared::PointParticle};

pub const DEFAULT_SEED: u64 = 42;

/// `count` unit-mass bodies uniformly distributed in `[0, space)^D`.
///
/// The same seed always yields the same bodies in the same order.
pub fn uniform_cube<const D: usize>(
    count: usize,
    space: f32,
    seed: u64,
) -> Result<Vec<PointParticle<f32, D>>, ConfigError> {
    if !(space > 0.0) || !space.is_finite() {
        return Err(ConfigError::InvalidSpace(space as f64));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..count)
        .map(|_| {
            let position = SVector::<f32, D>::from_fn(|_, _| rng.random_range(0.0..space));
            PointParticle::new(position, 1.0)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_and_in_range() {
        let a = uniform_cube::<3>(1000, 1000.0, DEFAULT_SEED).unwrap();
        let b = uniform_cube::<3>(1000, 1000.0, DEFAULT_SEED).unwrap();
        let c = uniform_cube::<3>(1000, 1000.0, 7).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|p| p.mass == 1.0));
        assert!(
            a.iter()
                .all(|p| p.position.iter().all(|&x| (0.0..1000.0).contains(&x)))
        );
    }

    #[test]
    fn rejects_empty_domain() {
        assert!(matches!(
            uniform_cube::<3>(10, 0.0, DEFAULT_SEED),
            Err(ConfigError::InvalidSpace(_))
        ));
        assert!(uniform_cube::<2>(10, f32::NAN, DEFAULT_SEED).is_err());
    }
}
