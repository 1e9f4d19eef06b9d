//! Disk geometry and deprojection

use nalgebra::{Rotation2, Vector2};
use rustfft::num_complex::Complex64;
use serde::Serialize;
use std::f64::consts::PI;

use crate::units::ARCSEC;

/// Disk viewing geometry
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    /// inclination [deg]
    pub inc: f64,
    /// position angle of the major axis, east of north [deg]
    pub pa: f64,
    /// phase center RA offset [arcsec]
    pub dra: f64,
    /// phase center Dec offset [arcsec]
    pub ddec: f64,
}
impl Geometry {
    pub fn new(inc: f64, pa: f64, dra: f64, ddec: f64) -> Self {
        Self { inc, pa, dra, ddec }
    }
    /// Returns the sky to disk plane transformation
    pub fn deprojection(&self) -> Deprojection {
        Deprojection {
            rotation: Rotation2::new(self.pa.to_radians()),
            cos_inc: self.inc.to_radians().cos(),
            pa: self.pa,
            offset: Vector2::new(self.dra, self.ddec),
        }
    }
    /// Deprojects the visibilities
    ///
    /// The phase center is shifted to the disk center, the baselines are rotated by the
    /// position angle and the minor axis baseline component is stretched by `cos(inc)`.
    /// `u` and `v` are in wavelength.
    pub fn deproject_vis(
        &self,
        u: &[f64],
        v: &[f64],
        vis: &[Complex64],
    ) -> (Vec<f64>, Vec<f64>, Vec<Complex64>) {
        let rotation = Rotation2::new(self.pa.to_radians());
        let cos_inc = self.inc.to_radians().cos();
        let (dra, ddec) = (self.dra * ARCSEC, self.ddec * ARCSEC);
        let mut up = Vec::with_capacity(u.len());
        let mut vp = Vec::with_capacity(u.len());
        let vis_p = u
            .iter()
            .zip(v)
            .zip(vis)
            .map(|((&u, &v), &vis)| {
                let phase = 2. * PI * (u * dra + v * ddec);
                let shifted = vis * Complex64::from_polar(1., phase);
                let uv = rotation * Vector2::new(u, v);
                up.push(uv[0] * cos_inc);
                vp.push(uv[1]);
                shifted / cos_inc
            })
            .collect();
        (up, vp, vis_p)
    }
}

/// Sky to disk plane coordinates transformation
#[derive(Debug, Clone, Copy)]
pub struct Deprojection {
    rotation: Rotation2<f64>,
    cos_inc: f64,
    pa: f64,
    offset: Vector2<f64>,
}
impl Deprojection {
    /// Returns the disk plane radius [arcsec] and azimuth of a sky offset `(x, y)` [arcsec]
    ///
    /// The azimuth is expressed as a sky position angle [deg] in `[0, 360)`: points on
    /// the major axis at `PA` have azimuth `PA`, points on the opposite ansa `PA + 180`.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let rotated = self.rotation * (Vector2::new(x, y) - self.offset);
        let (minor, major) = (rotated[0] / self.cos_inc, rotated[1]);
        let r = major.hypot(minor);
        let azimuth = wrap_degrees(self.pa + minor.atan2(major).to_degrees());
        (r, azimuth)
    }
}

/// Wraps an angle [deg] into `[0, 360)`
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.);
    if wrapped >= 360. {
        0.
    } else {
        wrapped
    }
}

/// Critical azimuth [rad] away from the major axis at which the radial resolution of an
/// inclined disk is degraded by a factor `f`
pub fn find_phic(inc: f64, f: f64) -> f64 {
    let tan_inc = inc.tan().abs();
    if tan_inc == 0. {
        return PI / 2.;
    }
    let sin_phic = (f * f - 1.).max(0.).sqrt() / tan_inc;
    if sin_phic >= 1. {
        PI / 2.
    } else {
        sin_phic.asin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_axis_keeps_position_angle() {
        let geom = Geometry::new(60., 30., 0., 0.);
        let deproj = geom.deprojection();
        let (s, c) = 30f64.to_radians().sin_cos();
        let (r, az) = deproj.apply(s, c);
        assert!((r - 1.).abs() < 1e-12);
        assert!((az - 30.).abs() < 1e-9);
        let (r, az) = deproj.apply(-s, -c);
        assert!((r - 1.).abs() < 1e-12);
        assert!((az - 210.).abs() < 1e-9);
    }

    #[test]
    fn minor_axis_is_stretched() {
        let geom = Geometry::new(60., 0., 0., 0.);
        let (r, az) = geom.deprojection().apply(0.5, 0.);
        assert!((r - 1.).abs() < 1e-12);
        assert!((az - 90.).abs() < 1e-9);
    }

    #[test]
    fn offset_center() {
        let geom = Geometry::new(0., 0., 0.2, -0.1);
        let (r, _) = geom.deprojection().apply(0.2, -0.1);
        assert!(r.abs() < 1e-15);
    }

    #[test]
    fn phic() {
        assert!((find_phic(0., 1.5) - PI / 2.).abs() < 1e-15);
        assert!((find_phic(89f64.to_radians(), 1.5) - (1.25f64.sqrt() / 89f64.to_radians().tan()).asin()).abs() < 1e-12);
        assert!((find_phic(10f64.to_radians(), 1.5) - PI / 2.).abs() < 1e-15);
    }

    #[test]
    fn face_on_vis_deprojection_keeps_baselines() {
        let geom = Geometry::default();
        let (up, vp, vis) = geom.deproject_vis(&[1e5], &[2e5], &[Complex64::new(1., 0.5)]);
        assert!((up[0].hypot(vp[0]) - 1e5f64.hypot(2e5)).abs() < 1e-6);
        assert!((vis[0] - Complex64::new(1., 0.5)).norm() < 1e-15);
    }
}
