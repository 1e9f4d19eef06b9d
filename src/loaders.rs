//! CLEAN, rave and frank products
//!
//! Profiles are extracted from the CLEAN images and unpacked from the rave fits, then
//! saved as text tables next to their inputs. The best-fit profiles of the three methods
//! are loaded back with their visibility counterparts on the frank baseline grid.

use std::path::Path;

use crate::{
    config::{float_repr, Model},
    error::{Error, Result},
    fits::FitsImage,
    hankel,
    image::Image,
    profile::{BrightnessProfile, Method, ProfileFit, Uncertainty, VisibilityProfile},
    radial::{
        east_west_profile, full_azimuths, radial_profile_from_image, ImageUnits, ProfileOptions,
        RadialProfile,
    },
    table::{NpyArray, Table},
    units::{jy_convert, Conversion},
    uvtable::UvTable,
};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extracts the radial profiles of the CLEAN image and of the CLEAN model
///
/// The image profile is the average of the east and west profiles, the model profile is
/// averaged over all azimuths. Both are saved in the CLEAN directory.
pub fn extract_clean_profile(model: &Model) -> Result<(RadialProfile, RadialProfile)> {
    let clean_fits = model.clean_fits("pbcor");
    let pb_fits = model.clean_fits("pb");
    let model_fits = model.clean_fits("model");

    let clean = FitsImage::open(&clean_fits)?;
    let beam = clean
        .beam()?
        .ok_or_else(|| Error::MissingBeam(clean_fits.clone()))?;
    let pb = FitsImage::open(&pb_fits)?;
    let clean_model = FitsImage::open(&model_fits)?;

    log::info!(
        "  extracting profiles from {:?} and {:?}",
        clean_fits,
        model_fits
    );
    let opts = ProfileOptions {
        rmax: model.clean.rmax,
        nr: model.clean.nr,
        pixel_scale: model.clean.pixel_scale,
        image_rms: model.clean.image_rms,
        units: ImageUnits::JyPerBeam(beam),
    };
    let image_profile = east_west_profile(
        &clean.image,
        &model.geometry,
        model.clean.nphi,
        &opts,
        Some(&pb.image),
    )?;
    let model_profile = radial_profile_from_image(
        &clean_model.image,
        &model.geometry,
        &full_azimuths(&model.geometry, model.clean.nphi),
        &ProfileOptions {
            units: ImageUnits::JyPerPixel,
            ..opts
        },
        None,
    )?;

    log::info!("  saving CLEAN image and model profiles");
    Table::new(
        format!(
            "Extracted from {}\nr [arcsec]\tI [Jy/sr]\tI_err [Jy/sr]",
            file_name(&clean_fits)
        ),
        vec![
            image_profile.r.clone(),
            image_profile.intensity.clone(),
            image_profile.uncertainty.clone().unwrap_or_default(),
        ],
    )?
    .write(model.profile_path("clean"))?;
    Table::new(
        format!(
            "Extracted from {}\nr [arcsec]\tI [Jy/sr]",
            file_name(&model_fits)
        ),
        vec![model_profile.r.clone(), model_profile.intensity.clone()],
    )?
    .write(model.profile_path("clean_model"))?;

    Ok((image_profile, model_profile))
}

/// Unpacks the rave fit, converts it to Jy/sr and saves it in the rave directory
///
/// The fit is a `4 × N` array of the radii [arcsec], the lower bounds, the brightness
/// and the upper bounds [Jy/arcsec²].
pub fn process_rave_fit(model: &Model) -> Result<BrightnessProfile> {
    let fit_path = model.rave_fit_path();
    log::info!("  processing rave fit {:?}", fit_path);
    let fit = NpyArray::load(&fit_path)?;
    let (r, lower, intensity, upper) = match fit.rows().as_slice() {
        [r, lower, intensity, upper] if fit.shape.len() == 2 => (*r, *lower, *intensity, *upper),
        _ => return Err(Error::RaveShape(fit.shape.clone(), fit_path)),
    };
    let err_lo: Vec<f64> = intensity.iter().zip(lower).map(|(i, l)| i - l).collect();
    let err_hi: Vec<f64> = upper.iter().zip(intensity).map(|(u, i)| u - i).collect();
    let profile = BrightnessProfile {
        r: r.to_vec(),
        intensity: jy_convert(intensity, Conversion::Arcsec2ToSterad),
        uncertainty: Uncertainty::Asymmetric {
            lower: jy_convert(&err_lo, Conversion::Arcsec2ToSterad),
            upper: jy_convert(&err_hi, Conversion::Arcsec2ToSterad),
        },
    };

    log::info!("  saving rave profile");
    Table::new(
        format!(
            "Extracted from {}\nr [arcsec]\tI [Jy/sr]\tI_err (lower bound) [Jy/sr]\tI_err (upper bound) [Jy/sr]",
            file_name(&fit_path)
        ),
        vec![
            profile.r.clone(),
            profile.intensity.clone(),
            profile.uncertainty.lower().to_vec(),
            profile.uncertainty.upper().to_vec(),
        ],
    )?
    .write(model.profile_path("rave"))?;
    Ok(profile)
}

/// rave 2D residual image [Jy/arcsec²]
pub fn load_rave_residual_image(model: &Model) -> Result<Image> {
    let path = model.rave_residual_path();
    log::info!("Loading {:?}...", path);
    let array = NpyArray::load(&path)?;
    let [ny, nx] = array.shape[..] else {
        return Err(Error::RaveShape(array.shape.clone(), path));
    };
    let scale = model.rave.pixel_scale.powi(2);
    Image::new(nx, ny, array.data.into_iter().map(|x| x / scale).collect())
        .ok_or(Error::RaveShape(vec![ny, nx], path))
}

/// Observed visibilities
pub fn load_visibilities(model: &Model) -> Result<UvTable> {
    Ok(UvTable::load_npz(model.visibilities_path())?)
}

/// Residual visibilities of the frank best-fit at the observed baselines
pub fn load_frank_residuals(model: &Model) -> Result<UvTable> {
    Ok(UvTable::load_npz(model.frank_product("frank_uv_resid.npz"))?)
}

/// frank best-fit brightness and visibility profiles
pub fn load_frank_fit(model: &Model) -> Result<ProfileFit> {
    let brightness = BrightnessProfile::read(model.frank_product("frank_profile_fit.txt"))?;
    let vis_path = model.frank_product("frank_vis_fit.txt");
    let mut columns = Table::read(&vis_path)?.take_columns(2)?.into_iter();
    let (Some(grid), Some(vis)) = (columns.next(), columns.next()) else {
        return Err(Error::FrankGrid(vis_path));
    };
    Ok(ProfileFit {
        method: Method::Frank,
        brightness,
        visibility: VisibilityProfile { grid, vis },
    })
}

/// Best-fit profiles of the CLEAN, rave and frank fits
#[derive(Debug, Clone)]
pub struct BestFit {
    pub clean: ProfileFit,
    pub rave: Option<ProfileFit>,
    pub frank: ProfileFit,
}
impl BestFit {
    /// Fits in the plotting order clean, rave, frank
    pub fn fits(&self) -> Vec<&ProfileFit> {
        let mut fits = vec![&self.clean];
        fits.extend(self.rave.as_ref());
        fits.push(&self.frank);
        fits
    }
}

/// Loads the CLEAN and rave profiles for the robust weighting of `model` and the frank
/// best-fit profile
///
/// The CLEAN and rave visibilities are the Hankel transforms of their brightness profiles
/// on the frank baseline grid.
pub fn load_bestfit_profiles(model: &Model, include_rave: bool) -> Result<BestFit> {
    log::info!(
        "  loading best-fit profiles of {} (robust={})",
        model.disk,
        float_repr(model.clean.robust)
    );
    let frank = load_frank_fit(model)?;
    let grid = &frank.visibility.grid;
    let on_grid = |method: Method, brightness: BrightnessProfile| ProfileFit {
        method,
        visibility: VisibilityProfile {
            grid: grid.clone(),
            vis: hankel::transform(&brightness.r, &brightness.intensity, grid),
        },
        brightness,
    };
    let clean = on_grid(
        Method::Clean,
        BrightnessProfile::read(model.profile_path("clean"))?,
    );
    let rave = if include_rave {
        Some(on_grid(
            Method::Rave,
            BrightnessProfile::read(model.profile_path("rave"))?,
        ))
    } else {
        None
    };
    Ok(BestFit { clean, rave, frank })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    #[test]
    fn clean_profiles() {
        let source = MockSource::builder().build();
        let model = source.model();
        let (image, clean_model) = extract_clean_profile(&model).unwrap();
        assert!(!image.is_empty());
        assert!(image.uncertainty.as_ref().unwrap().iter().all(|s| *s > 0.));
        assert!(image.r.iter().all(|&r| r < model.clean.rmax));
        assert_eq!(clean_model.len(), model.clean.nr);

        let table = Table::read(model.profile_path("clean")).unwrap();
        assert_eq!(table.ncols(), 3);
        assert_eq!(table.nrows(), image.len());
        assert!(table.header[0].starts_with("Extracted from mock"));
        assert!(table.header[0].ends_with(".pbcor.fits"));
        // ring peaks near the ring radius
        let peak = image
            .r
            .iter()
            .zip(&image.intensity)
            .fold((0., f64::NEG_INFINITY), |acc, (&r, &i)| {
                if i > acc.1 {
                    (r, i)
                } else {
                    acc
                }
            })
            .0;
        assert!((peak - source.ring_radius).abs() < 0.2, "peak at {peak}");
    }

    #[test]
    fn rave_profile() {
        let source = MockSource::builder().build();
        let model = source.model();
        let profile = process_rave_fit(&model).unwrap();
        assert_eq!(profile.len(), source.rave_points);
        assert!(profile.uncertainty.lower().iter().all(|s| *s > 0.));
        assert!(profile.uncertainty.upper().iter().all(|s| *s > 0.));
        let read = BrightnessProfile::read(model.profile_path("rave")).unwrap();
        assert_eq!(read, profile);
    }

    #[test]
    fn bestfit_profiles() {
        let source = MockSource::builder().build();
        let model = source.model();
        extract_clean_profile(&model).unwrap();
        process_rave_fit(&model).unwrap();
        let bestfit = load_bestfit_profiles(&model, true).unwrap();
        assert_eq!(bestfit.fits().len(), 3);
        let n = bestfit.frank.visibility.grid.len();
        assert_eq!(bestfit.clean.visibility.vis.len(), n);
        assert_eq!(bestfit.rave.as_ref().unwrap().visibility.grid.len(), n);
        assert_eq!(load_bestfit_profiles(&model, false).unwrap().fits().len(), 2);
    }

    #[test]
    fn rave_residual_image() {
        let source = MockSource::builder().build();
        let image = load_rave_residual_image(&source.model()).unwrap();
        assert_eq!(image.shape(), (source.rave_npix, source.rave_npix));
    }

    #[test]
    fn missing_clean_images() {
        let source = MockSource::builder().build();
        let model = source.model().with_robust(-1.0);
        assert!(matches!(
            extract_clean_profile(&model),
            Err(Error::Fits(_))
        ));
    }
}
