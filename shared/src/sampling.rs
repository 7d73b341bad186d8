//! Distribution helpers.

use rand::Rng;

/// One draw from the standard normal distribution (Box-Muller transform).
///
/// Consumes exactly two uniform draws, so the number of generator steps per
/// sample is fixed.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // random::<f64>() is in [0, 1); shift u1 into (0, 1] so ln() stays finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// One draw from `N(mean, std_dev^2)`.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    mean + std_dev * standard_normal(rng)
}
