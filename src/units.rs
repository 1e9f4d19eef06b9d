//! Brightness unit conversions

use std::f64::consts::PI;

/// One arcsecond in radian
pub const ARCSEC: f64 = PI / 180. / 3600.;
/// Number of square arcseconds in one steradian
pub const ARCSEC2_PER_STERAD: f64 = 1. / (ARCSEC * ARCSEC);

/// Conversion between surface brightness units
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// Jy/arcsec^2 to Jy/sr
    Arcsec2ToSterad,
    /// Jy/sr to Jy/arcsec^2
    SteradToArcsec2,
}
impl Conversion {
    pub fn factor(&self) -> f64 {
        match self {
            Conversion::Arcsec2ToSterad => ARCSEC2_PER_STERAD,
            Conversion::SteradToArcsec2 => 1. / ARCSEC2_PER_STERAD,
        }
    }
}

/// Converts a brightness sequence
pub fn jy_convert(values: &[f64], conversion: Conversion) -> Vec<f64> {
    let factor = conversion.factor();
    values.iter().map(|x| x * factor).collect()
}

/// Solid angle [sr] of a Gaussian beam with FWHMs `bmaj` and `bmin` [arcsec]
pub fn beam_solid_angle(bmaj: f64, bmin: f64) -> f64 {
    PI * bmaj * bmin * ARCSEC * ARCSEC / (4. * 2f64.ln())
}

/// Area [arcsec^2] of a Gaussian beam with FWHMs `bmaj` and `bmin` [arcsec]
pub fn beam_area_arcsec2(bmaj: f64, bmin: f64) -> f64 {
    PI * bmaj * bmin / (4. * 2f64.ln())
}

/// Solid angle [sr] of a square pixel of side `pixel_scale` [arcsec]
pub fn pixel_solid_angle(pixel_scale: f64) -> f64 {
    (pixel_scale * ARCSEC).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_invert() {
        let x = [1.5e-3, 2e-2];
        let y = jy_convert(&jy_convert(&x, Conversion::Arcsec2ToSterad), Conversion::SteradToArcsec2);
        x.iter()
            .zip(y)
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-15));
        assert!((ARCSEC2_PER_STERAD - 4.25452e10).abs() / 4.25452e10 < 1e-5);
    }

    #[test]
    fn beam_area() {
        let omega = beam_solid_angle(1., 1.);
        assert!((omega * ARCSEC2_PER_STERAD - beam_area_arcsec2(1., 1.)).abs() < 1e-12);
        assert!((beam_area_arcsec2(1., 1.) - 1.1330900354567985).abs() < 1e-12);
    }
}
