//! Radial brightness profiles from images
//!
//! Pixels are deprojected onto the disk plane, binned into annuli and averaged within
//! azimuthal wedges. East and west profiles are extracted from mirrored wedges around
//! the major axis ansae and averaged.

use rayon::prelude::*;

use crate::{
    fits::Beam,
    geometry::{find_phic, wrap_degrees, Geometry},
    image::Image,
    interp::{interp, Edge, InterpError},
    units::{beam_area_arcsec2, beam_solid_angle, pixel_solid_angle, ARCSEC2_PER_STERAD},
};

/// Resolution degradation factor defining the east and west wedges
pub const PHIC_FACTOR: f64 = 1.5;
/// Tolerance [deg] on the span of a full circle of azimuths
const AZIMUTH_TOL: f64 = 1e-9;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProfileError {
    #[error("image shape {0:?} and primary beam shape {1:?} differ")]
    ShapeMismatch((usize, usize), (usize, usize)),
    #[error("at least 2 azimuths are required, found {0}")]
    Azimuths(usize),
    #[error("azimuths must be increasing and span at most 360 degree")]
    AzimuthRange,
    #[error("the number of radial bins must be positive")]
    RadialBins,
    #[error("east and west profiles have different radial bins")]
    EastWest,
}
type Result<T> = std::result::Result<T, ProfileError>;

/// Brightness unit of an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageUnits {
    /// CLEAN images
    JyPerBeam(Beam),
    /// CLEAN model images
    JyPerPixel,
    /// residual images already divided by the pixel area
    JyPerArcsec2,
}
impl ImageUnits {
    /// Conversion factor to Jy/sr
    fn to_jy_per_sr(&self, pixel_scale: f64) -> f64 {
        match self {
            ImageUnits::JyPerBeam(beam) => 1. / beam_solid_angle(beam.bmaj, beam.bmin),
            ImageUnits::JyPerPixel => 1. / pixel_solid_angle(pixel_scale),
            ImageUnits::JyPerArcsec2 => ARCSEC2_PER_STERAD,
        }
    }
}

/// Radial profile extraction options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileOptions {
    /// outer radius [arcsec]
    pub rmax: f64,
    /// number of annuli
    pub nr: usize,
    /// pixel size [arcsec]
    pub pixel_scale: f64,
    /// image noise in the image units
    pub image_rms: f64,
    pub units: ImageUnits,
}

/// Brightness [Jy/sr] versus radius [arcsec], with uncertainties when the image has a beam
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RadialProfile {
    pub r: Vec<f64>,
    pub intensity: Vec<f64>,
    pub uncertainty: Option<Vec<f64>>,
}
impl RadialProfile {
    pub fn len(&self) -> usize {
        self.r.len()
    }
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
}

/// Profile on the full set of annuli, empty annuli are NaN
#[derive(Debug, Clone)]
struct Annuli {
    r: Vec<f64>,
    intensity: Vec<f64>,
    uncertainty: Option<Vec<f64>>,
}
impl Annuli {
    fn into_profile(self) -> RadialProfile {
        let keep: Vec<bool> = self.intensity.iter().map(|x| !x.is_nan()).collect();
        let filter = |values: Vec<f64>| -> Vec<f64> {
            values
                .into_iter()
                .zip(&keep)
                .filter_map(|(x, &k)| k.then_some(x))
                .collect()
        };
        RadialProfile {
            r: filter(self.r),
            intensity: filter(self.intensity),
            uncertainty: self.uncertainty.map(filter),
        }
    }
}

/// Pixel contribution to the annulus `annulus` and the sub-wedge `wedge`
#[derive(Debug, Clone, Copy)]
struct Sample {
    annulus: usize,
    wedge: usize,
    weight: f64,
    value: f64,
    noise: f64,
}

/// Offsets [deg] of the azimuths from the first one
fn wedge_edges(phis: &[f64]) -> Result<Vec<f64>> {
    if phis.len() < 2 {
        return Err(ProfileError::Azimuths(phis.len()));
    }
    let mut edges: Vec<f64> = phis.iter().map(|phi| phi - phis[0]).collect();
    if edges.windows(2).any(|w| w[1] <= w[0]) || edges[edges.len() - 1] > 360. + AZIMUTH_TOL {
        return Err(ProfileError::AzimuthRange);
    }
    // full circles built by `linspace` can overshoot by a rounding error
    if let Some(last) = edges.last_mut() {
        *last = last.min(360.);
    }
    Ok(edges)
}

fn annuli(
    image: &Image,
    geom: &Geometry,
    phis: &[f64],
    opts: &ProfileOptions,
    pb_image: Option<&Image>,
) -> Result<Annuli> {
    if opts.nr == 0 {
        return Err(ProfileError::RadialBins);
    }
    if let Some(pb) = pb_image {
        if pb.shape() != image.shape() {
            return Err(ProfileError::ShapeMismatch(image.shape(), pb.shape()));
        }
    }
    let edges = wedge_edges(phis)?;
    let span = edges[edges.len() - 1];
    let n_wedges = edges.len() - 1;
    let dr = opts.rmax / opts.nr as f64;
    let deprojection = geom.deprojection();

    let samples: Vec<Option<Sample>> = (0..image.ny())
        .into_par_iter()
        .flat_map_iter(|i| {
            let deprojection = &deprojection;
            let edges = &edges;
            (0..image.nx()).map(move |j| {
                let value = image.get(i, j);
                let pb = pb_image.map_or(1., |pb| pb.get(i, j));
                if value.is_nan() || pb.is_nan() || pb <= 0. {
                    return None;
                }
                let (r, azimuth) = deprojection.apply(
                    image.x_offset(j, opts.pixel_scale),
                    image.y_offset(i, opts.pixel_scale),
                );
                if r >= opts.rmax {
                    return None;
                }
                let offset = wrap_degrees(azimuth - phis[0]);
                let in_wedge = if span >= 360. {
                    true
                } else {
                    offset <= span
                };
                if !in_wedge {
                    return None;
                }
                let wedge = edges
                    .partition_point(|&e| e <= offset)
                    .saturating_sub(1)
                    .min(n_wedges - 1);
                Some(Sample {
                    annulus: (r / dr) as usize,
                    wedge,
                    weight: pb * pb,
                    value,
                    noise: opts.image_rms / pb,
                })
            })
        })
        .collect();

    // [annulus][wedge] weighted sums
    let mut sum_w = vec![vec![0f64; n_wedges]; opts.nr];
    let mut sum_wi = vec![vec![0f64; n_wedges]; opts.nr];
    let mut counts = vec![0usize; opts.nr];
    let mut noise2 = vec![0f64; opts.nr];
    for s in samples.into_iter().flatten() {
        if s.annulus >= opts.nr {
            continue;
        }
        sum_w[s.annulus][s.wedge] += s.weight;
        sum_wi[s.annulus][s.wedge] += s.weight * s.value;
        counts[s.annulus] += 1;
        noise2[s.annulus] += s.noise * s.noise;
    }

    let to_jy_sr = opts.units.to_jy_per_sr(opts.pixel_scale);
    let r: Vec<f64> = (0..opts.nr).map(|k| (k as f64 + 0.5) * dr).collect();
    let intensity: Vec<f64> = sum_w
        .iter()
        .zip(&sum_wi)
        .map(|(w, wi)| {
            let means: Vec<f64> = w
                .iter()
                .zip(wi)
                .filter(|(&w, _)| w > 0.)
                .map(|(w, wi)| wi / w)
                .collect();
            if means.is_empty() {
                f64::NAN
            } else {
                to_jy_sr * means.iter().sum::<f64>() / means.len() as f64
            }
        })
        .collect();
    let uncertainty = match opts.units {
        ImageUnits::JyPerBeam(beam) => {
            let pixels_per_beam =
                beam_area_arcsec2(beam.bmaj, beam.bmin) / opts.pixel_scale.powi(2);
            Some(
                counts
                    .iter()
                    .zip(&noise2)
                    .map(|(&n, &noise2)| {
                        if n == 0 {
                            return f64::NAN;
                        }
                        let n_beams = (n as f64 / pixels_per_beam).max(1.);
                        to_jy_sr * (noise2 / n as f64).sqrt() / n_beams.sqrt()
                    })
                    .collect(),
            )
        }
        _ => None,
    };
    Ok(Annuli {
        r,
        intensity,
        uncertainty,
    })
}

/// Azimuthally averaged brightness profile of `image` within the wedge spanned by `phis`
///
/// `phis` are increasing sky position angles [deg]; consecutive azimuths bound the
/// sub-wedges which are averaged with equal weights. A primary beam image weights the
/// pixels by `pb^2` and scales the noise by `1/pb`. Empty annuli are dropped.
pub fn radial_profile_from_image(
    image: &Image,
    geom: &Geometry,
    phis: &[f64],
    opts: &ProfileOptions,
    pb_image: Option<&Image>,
) -> Result<RadialProfile> {
    annuli(image, geom, phis, opts, pb_image).map(Annuli::into_profile)
}

/// Critical azimuth [deg] of the east and west wedges for the disk inclination
pub fn critical_azimuth(geom: &Geometry) -> f64 {
    find_phic(geom.inc.to_radians(), PHIC_FACTOR).to_degrees()
}

/// `n` evenly spaced values from `start` to `stop` included
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|k| start + k as f64 * step).collect()
        }
    }
}

/// East and west wedges `PA ± phic` and `PA + 180 ± phic` [deg]
pub fn east_west_azimuths(geom: &Geometry, phic: f64, nphi: usize) -> (Vec<f64>, Vec<f64>) {
    let east = linspace(geom.pa - phic, geom.pa + phic, nphi);
    let west = east.iter().map(|phi| phi + 180.).collect();
    (east, west)
}

/// Full circle of azimuths centered on the position angle
pub fn full_azimuths(geom: &Geometry, nphi: usize) -> Vec<f64> {
    linspace(geom.pa - 180., geom.pa + 180., nphi)
}

/// Average of the east and west profiles
///
/// Intensities are averaged and uncertainties combined as `hypot(σE, σW) / 2`.
pub fn east_west_profile(
    image: &Image,
    geom: &Geometry,
    nphi: usize,
    opts: &ProfileOptions,
    pb_image: Option<&Image>,
) -> Result<RadialProfile> {
    let phic = critical_azimuth(geom);
    log::info!("  critical azimuth {:.2} deg", phic);
    let (east, west) = east_west_azimuths(geom, phic, nphi);
    let east = annuli(image, geom, &east, opts, pb_image)?;
    let west = annuli(image, geom, &west, opts, pb_image)?;
    if east.r.len() != west.r.len() {
        return Err(ProfileError::EastWest);
    }
    let intensity = east
        .intensity
        .iter()
        .zip(&west.intensity)
        .map(|(e, w)| 0.5 * (e + w))
        .collect();
    let uncertainty = match (east.uncertainty, west.uncertainty) {
        (Some(e), Some(w)) => Some(
            e.iter()
                .zip(&w)
                .map(|(e, w)| e.hypot(*w) * 0.5)
                .collect(),
        ),
        _ => None,
    };
    Ok(Annuli {
        r: west.r,
        intensity,
        uncertainty,
    }
    .into_profile())
}

/// Sky image of the axisymmetric brightness profile `(r, intensity)` seen with the disk
/// geometry, on a `npix × npix` grid of `pixel_scale` [arcsec] pixels
///
/// Pixels beyond the largest profile radius are set to 0.
pub fn sweep_profile(
    r: &[f64],
    intensity: &[f64],
    geom: &Geometry,
    npix: usize,
    pixel_scale: f64,
) -> std::result::Result<Image, InterpError> {
    let (Some(&r_min), Some(&r_max)) = (r.first(), r.last()) else {
        return Err(InterpError::Empty);
    };
    let deprojection = geom.deprojection();
    let grid = Image::from_fn(npix, npix, |_, _| 0.);
    let radii: Vec<f64> = grid
        .indexed_iter()
        .map(|(i, j, _)| {
            deprojection
                .apply(grid.x_offset(j, pixel_scale), grid.y_offset(i, pixel_scale))
                .0
        })
        .collect();
    let clamped: Vec<f64> = radii.iter().map(|&r| r.clamp(r_min, r_max)).collect();
    let values = interp(&clamped, r, intensity, Edge::Strict)?;
    let data = values
        .into_iter()
        .zip(&radii)
        .map(|(v, &r)| if r > r_max { 0. } else { v })
        .collect();
    Image::new(npix, npix, data).ok_or(InterpError::Empty)
}
