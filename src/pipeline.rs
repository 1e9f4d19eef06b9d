//! Per-source pipeline and bulk runs
//!
//! A run extracts the CLEAN profiles, processes the rave fit and draws the comparison
//! figures of a source, each step being switched on or off in the general parameters.

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressIterator};

use crate::{
    config::{float_repr, Model, ParameterFiles, SourceCatalog},
    error::{Error, Result},
    fits::FitsImage,
    hankel,
    image::Image,
    imaging::DirtyImager,
    interp::{interp, Edge},
    loaders::{
        extract_clean_profile, load_bestfit_profiles, load_frank_residuals,
        load_rave_residual_image, load_visibilities, process_rave_fit, BestFit,
    },
    plot::{
        image_comparison_figure, profile_comparison_figure, ImageComparison, ImagePanel,
        PanelKind, ProfileComparison,
    },
    profile::Method,
    radial::{full_azimuths, radial_profile_from_image, sweep_profile, ImageUnits, ProfileOptions},
    units::{beam_area_arcsec2, Conversion},
    uvtable::Deprojected,
};

/// Data of the profile comparison figure
///
/// Observed visibilities are binned at each of the plot bin widths, the model
/// residuals are computed at the widest binning.
pub fn profile_comparison_data(
    model: &Model,
    bestfit: &BestFit,
    observed: &Deprojected,
) -> Result<ProfileComparison> {
    let binned = model
        .plot
        .bin_widths
        .iter()
        .map(|&width| Ok((width, observed.bin(width)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut vis_residuals = vec![];
    if let Some((_, widest)) = binned.last() {
        let observed_re = widest.real();
        for fit in bestfit.fits() {
            let predicted = match fit.method {
                Method::Frank => interp(
                    &widest.uv,
                    &fit.visibility.grid,
                    &fit.visibility.vis,
                    Edge::Clamp,
                )?,
                _ => hankel::transform(&fit.brightness.r, &fit.brightness.intensity, &widest.uv),
            };
            let resid = observed_re
                .iter()
                .zip(&predicted)
                .map(|(o, p)| o - p)
                .collect();
            vis_residuals.push((fit.method, widest.uv.clone(), resid));
        }
    }

    let mut residual_brightness = vec![];
    if let Some(rave) = &bestfit.rave {
        let image = load_rave_residual_image(model)?;
        let profile = radial_profile_from_image(
            &image,
            &model.geometry,
            &full_azimuths(&model.geometry, model.clean.nphi),
            &ProfileOptions {
                rmax: rave.brightness.r_max(),
                nr: rave.brightness.len(),
                pixel_scale: model.rave.pixel_scale,
                image_rms: 0.,
                units: ImageUnits::JyPerArcsec2,
            },
            None,
        )?;
        residual_brightness.push((Method::Rave, profile.r, profile.intensity));
    }
    if let Some(&width) = model.plot.bin_widths.last() {
        let residuals = load_frank_residuals(model)?
            .deproject(&model.geometry)
            .bin(width)?;
        let r = &bestfit.frank.brightness.r;
        residual_brightness.push((
            Method::Frank,
            r.clone(),
            hankel::inverse(&residuals.uv, &residuals.real(), r),
        ));
    }

    Ok(ProfileComparison {
        fits: bestfit.fits().into_iter().cloned().collect(),
        residual_brightness,
        binned,
        vis_residuals,
        max_baseline: observed.baselines.iter().cloned().fold(0f64, f64::max),
    })
}

/// Pseudo-image [Jy/arcsec²] of a brightness profile [Jy/sr]
fn pseudo_image(
    model: &Model,
    r: &[f64],
    intensity: &[f64],
    npix: usize,
    pixel_scale: f64,
) -> Result<Image> {
    Ok(sweep_profile(r, intensity, &model.geometry, npix, pixel_scale)?
        .map(|x| x * Conversion::SteradToArcsec2.factor()))
}

/// Data of the image comparison figure, all images in Jy/arcsec² but the frank residual
/// dirty image in Jy/beam
pub fn image_comparison_data(model: &Model, bestfit: &BestFit) -> Result<ImageComparison> {
    let clean_fits = model.clean_fits("pbcor");
    let clean = FitsImage::open(&clean_fits)?;
    let beam = clean
        .beam()?
        .ok_or_else(|| Error::MissingBeam(clean_fits.clone()))?;
    log::info!("  clean beam: bmaj {} x bmin {} arcsec", beam.bmaj, beam.bmin);
    let beam_area = beam_area_arcsec2(beam.bmaj, beam.bmin);
    let clean_image = clean.image.map(|x| x / beam_area);
    let pixel_area = model.clean.pixel_scale.powi(2);
    let clean_model = FitsImage::open(model.clean_fits("model"))?
        .image
        .map(|x| x / pixel_area);

    let (npix, pixel_scale) = (model.clean.npix, model.clean.pixel_scale);
    let frank = &bestfit.frank.brightness;
    let frank_image = pseudo_image(model, &frank.r, &frank.intensity, npix, pixel_scale)?;
    log::info!(
        "  imaging frank residual visibilities (robust={})",
        float_repr(model.clean.bestfit_robust)
    );
    let frank_residuals = DirtyImager::new(npix, pixel_scale)?.dirty_image(
        &load_frank_residuals(model)?,
        model.clean.bestfit_robust,
    )?;
    let mut brightness_max = frank_image.max();

    let mut panels = vec![
        ImagePanel {
            title: "clean".into(),
            image: clean_image,
            pixel_scale,
            kind: PanelKind::Brightness,
        },
        ImagePanel {
            title: "clean model".into(),
            image: clean_model,
            pixel_scale,
            kind: PanelKind::Model,
        },
        ImagePanel {
            title: "frank".into(),
            image: frank_image,
            pixel_scale,
            kind: PanelKind::Brightness,
        },
        ImagePanel {
            title: "frank resid.".into(),
            image: frank_residuals,
            pixel_scale,
            kind: PanelKind::Residual,
        },
    ];
    if let Some(rave) = &bestfit.rave {
        let residuals = load_rave_residual_image(model)?;
        let rave_image = pseudo_image(
            model,
            &rave.brightness.r,
            &rave.brightness.intensity,
            residuals.nx(),
            model.rave.pixel_scale,
        )?;
        brightness_max = brightness_max.max(rave_image.max());
        panels.push(ImagePanel {
            title: "rave".into(),
            image: rave_image,
            pixel_scale: model.rave.pixel_scale,
            kind: PanelKind::Brightness,
        });
        panels.push(ImagePanel {
            title: "clean - rave".into(),
            image: residuals,
            pixel_scale: model.rave.pixel_scale,
            kind: PanelKind::Residual,
        });
    }

    Ok(ImageComparison {
        half_width: panels[0].image.half_extent(pixel_scale),
        panels,
        brightness_max,
    })
}

/// Draws the profile and image comparison figures
pub fn compare_models(model: &Model) -> Result<(PathBuf, PathBuf)> {
    let bestfit = load_bestfit_profiles(model, model.base.include_rave)?;
    let observed = load_visibilities(model)?.deproject(&model.geometry);
    let profiles = profile_comparison_figure(
        model,
        &profile_comparison_data(model, &bestfit, &observed)?,
    )?;
    let images = image_comparison_figure(model, &image_comparison_data(model, &bestfit)?)?;
    Ok((profiles, images))
}

/// Runs the pipeline steps enabled in the general parameters
pub fn run(model: &Model) -> Result<()> {
    log::info!("{}", model);
    if model.base.extract_clean_profile {
        extract_clean_profile(model)?;
    }
    if model.base.include_rave && model.base.process_rave_fit {
        process_rave_fit(model)?;
    }
    if model.base.compare_models_fig {
        compare_models(model)?;
    }
    Ok(())
}

/// Runs the pipeline for every source of the source parameters file with the source
/// best-fit robust weighting
///
/// Sources are processed in file order and the first failure aborts the run.
pub fn bulk_run(files: &ParameterFiles) -> Result<Vec<String>> {
    let catalog = SourceCatalog::load(&files.source)?;
    let disks: Vec<String> = catalog.names().map(String::from).collect();
    log::info!("Bulk run over {} sources", disks.len());
    let pb = ProgressBar::new(disks.len() as u64);
    for disk in disks.iter().progress_with(pb) {
        let model = Model::setup(files, disk)?;
        run(&model.with_robust(model.clean.bestfit_robust))?;
    }
    Ok(disks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    #[test]
    fn comparison_data() {
        let source = MockSource::builder().build();
        let model = source.model().with_robust(0.5);
        extract_clean_profile(&model).unwrap();
        process_rave_fit(&model).unwrap();
        let bestfit = load_bestfit_profiles(&model, true).unwrap();
        let observed = load_visibilities(&model).unwrap().deproject(&model.geometry);
        let data = profile_comparison_data(&model, &bestfit, &observed).unwrap();
        assert_eq!(data.fits.len(), 3);
        assert_eq!(data.binned.len(), model.plot.bin_widths.len());
        assert_eq!(data.vis_residuals.len(), 3);
        assert_eq!(data.residual_brightness.len(), 2);
        assert!(data.max_baseline > 0.);
        let (method, r, intensity) = &data.residual_brightness[1];
        assert_eq!(*method, Method::Frank);
        assert_eq!(r.len(), intensity.len());

        let images = image_comparison_data(&model, &bestfit).unwrap();
        assert_eq!(images.panels.len(), 6);
        assert!(images.brightness_max > 0.);
        assert_eq!(images.panels[3].image.shape(), (model.clean.npix, model.clean.npix));
    }

    #[test]
    fn single_source_run() {
        let source = MockSource::builder().build();
        let model = source.model().with_robust(0.5);
        run(&model).unwrap();
        assert!(model.profile_path("clean").is_file());
        assert!(model.profile_path("clean_model").is_file());
        assert!(model.profile_path("rave").is_file());
        assert!(model.figure_path("profile_compare").is_file());
        assert!(model.figure_path("image_compare").is_file());
    }

    #[test]
    fn run_without_rave() {
        let source = MockSource::builder().build();
        source.edit_general(|general| general["base"]["include_rave"] = false.into());
        let model = source.model();
        run(&model).unwrap();
        assert!(!model.profile_path("rave").exists());
        assert!(model.figure_path("image_compare").is_file());
    }

    #[test]
    fn bulk() {
        let source = MockSource::builder().sources(2).build();
        let disks = bulk_run(&source.files).unwrap();
        assert_eq!(disks, source.disks);
        for disk in &disks {
            let model = Model::setup(&source.files, disk).unwrap();
            let model = model.with_robust(model.clean.bestfit_robust);
            assert!(model.figure_path("profile_compare").is_file());
        }
    }

    #[test]
    fn bulk_fails_fast() {
        let source = MockSource::builder().sources(2).build();
        std::fs::remove_dir_all(source.root.join("disks").join(&source.disks[0])).unwrap();
        assert!(bulk_run(&source.files).is_err());
        let second = Model::setup(&source.files, &source.disks[1]).unwrap();
        let second = second.with_robust(second.clean.bestfit_robust);
        assert!(!second.figure_path("profile_compare").exists());
    }
}
