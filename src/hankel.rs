//! Zeroth order discrete Hankel transforms between radial brightness profiles and
//! deprojected visibility profiles

use rayon::prelude::*;
use scilib::math::bessel;
use std::f64::consts::PI;

use crate::units::ARCSEC;

/// Bessel function of the first kind of order zero
fn j0(x: f64) -> f64 {
    bessel::j_n(0, x.abs())
}

/// Trapezoidal quadrature weights of a non-uniform abscissa
fn trapezoid_weights(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    (0..n)
        .map(|k| {
            let left = if k > 0 { x[k] - x[k - 1] } else { 0. };
            let right = if k + 1 < n { x[k + 1] - x[k] } else { 0. };
            0.5 * (left + right)
        })
        .collect()
}

/// Visibility amplitudes [Jy] at baselines `q` [wavelength] of the brightness profile
/// `intensity` [Jy/sr] sampled at radii `r` [arcsec]
///
/// V(q) = 2π ∫ I(r) J0(2π q r) r dr
pub fn transform(r: &[f64], intensity: &[f64], q: &[f64]) -> Vec<f64> {
    let r_rad: Vec<f64> = r.iter().map(|r| r * ARCSEC).collect();
    let dr = trapezoid_weights(&r_rad);
    q.par_iter()
        .map(|&q| {
            2. * PI
                * r_rad
                    .iter()
                    .zip(intensity)
                    .zip(&dr)
                    .map(|((&r, &i), &dr)| i * j0(2. * PI * q * r) * r * dr)
                    .sum::<f64>()
        })
        .collect()
}

/// Brightness profile [Jy/sr] at radii `r` [arcsec] of the visibility profile `vis` [Jy]
/// sampled at baselines `q` [wavelength]
///
/// I(r) = 2π ∫ V(q) J0(2π q r) q dq
pub fn inverse(q: &[f64], vis: &[f64], r: &[f64]) -> Vec<f64> {
    let dq = trapezoid_weights(q);
    r.par_iter()
        .map(|&r| {
            let r = r * ARCSEC;
            2. * PI
                * q.iter()
                    .zip(vis)
                    .zip(&dq)
                    .map(|((&q, &v), &dq)| v * j0(2. * PI * q * r) * q * dq)
                    .sum::<f64>()
        })
        .collect()
}
