//! Per-source comparison figures of the CLEAN, rave and frank fits

use std::path::PathBuf;

use plotters::prelude::*;

use super::{
    band, chart, draw, finite_range, legend, mesh, padded, rgb, titled, zero_line, Chart,
    FigureError, Heatmap, Norm, Result,
};
use crate::{
    config::{float_repr, Model},
    image::Image,
    profile::{Method, ProfileFit},
    units::{jy_convert, Conversion},
    uvtable::BinnedVis,
};

/// Jy/sr to mJy/arcsec²
fn mjy_arcsec2(values: &[f64]) -> Vec<f64> {
    jy_convert(values, Conversion::SteradToArcsec2)
        .into_iter()
        .map(|x| x * 1e3)
        .collect()
}

/// Data of the profile comparison figure
#[derive(Debug, Clone)]
pub struct ProfileComparison {
    /// best-fit profiles in the order clean, rave, frank
    pub fits: Vec<ProfileFit>,
    /// residual brightness profiles `(method, r [arcsec], I [Jy/sr])`
    pub residual_brightness: Vec<(Method, Vec<f64>, Vec<f64>)>,
    /// observed visibilities binned at each bin width [wavelength]
    pub binned: Vec<(f64, BinnedVis)>,
    /// binned visibility residuals `(method, baseline [wavelength], Re(V) residual [Jy])`
    pub vis_residuals: Vec<(Method, Vec<f64>, Vec<f64>)>,
    /// longest deprojected baseline [wavelength]
    pub max_baseline: f64,
}

/// Root mean square of the values
pub fn rmse(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    (values.iter().map(|x| x * x).sum::<f64>() / values.len() as f64).sqrt()
}

/// Draws the points with the marker of the method
fn markers<'a, 'b: 'a>(
    chart: &mut Chart<'a, 'b>,
    method: Method,
    points: Vec<(f64, f64)>,
    label: String,
) -> Result<()> {
    let color = rgb(method.color());
    match method {
        Method::Clean => chart
            .draw_series(points.into_iter().map(|p| Circle::new(p, 2, color.filled())))
            .map_err(draw)?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 10, y), 2, color.filled())),
        Method::Rave => chart
            .draw_series(points.into_iter().map(|p| Cross::new(p, 3, color)))
            .map_err(draw)?
            .label(label)
            .legend(move |(x, y)| Cross::new((x + 10, y), 3, color)),
        Method::Frank => chart
            .draw_series(points.into_iter().map(|p| TriangleMarker::new(p, 3, color)))
            .map_err(draw)?
            .label(label)
            .legend(move |(x, y)| TriangleMarker::new((x + 10, y), 3, color)),
    };
    Ok(())
}

/// Compares the brightness profiles, residual brightness, binned visibilities and
/// visibility residuals of the fits, saved to `<save_dir>/profile_compare_robust<r>.png`
pub fn profile_comparison_figure(model: &Model, data: &ProfileComparison) -> Result<PathBuf> {
    log::info!("  making profile comparison figure");
    let path = model.figure_path("profile_compare");
    if data.fits.is_empty() {
        return Err(FigureError::Empty(path.display().to_string()));
    }
    {
        let root = BitMapBackend::new(&path, (1200, 760)).into_drawing_area();
        root.fill(&WHITE).map_err(draw)?;
        let root = titled(
            &root,
            &format!(
                "{} -- robust = {} for clean and rave",
                model.disk,
                float_repr(model.clean.robust)
            ),
        )?;
        let (w, h) = root.dim_in_pixel();
        let (left, right) = root.split_horizontally(w / 2);
        let (ax0, ax3) = left.split_vertically(3 * h / 4);
        let (ax1, ax2) = right.split_vertically(3 * h / 4);

        // brightness profiles
        let r_max = data
            .fits
            .iter()
            .map(|fit| fit.brightness.r_max())
            .fold(0f64, f64::max);
        let profiles: Vec<(Method, Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> = data
            .fits
            .iter()
            .map(|fit| {
                let (lower, upper) = fit.brightness.bounds();
                (
                    fit.method,
                    fit.brightness.r.clone(),
                    mjy_arcsec2(&fit.brightness.intensity),
                    mjy_arcsec2(&lower),
                    mjy_arcsec2(&upper),
                )
            })
            .collect();
        let y = finite_range(
            profiles
                .iter()
                .flat_map(|(_, _, i, lo, hi)| i.iter().chain(lo).chain(hi)),
        )
        .unwrap_or((0., 1.));
        let mut chart0 = chart(&ax0, 0f64..r_max, padded(y, 0.05), (60, 20))?;
        mesh(&mut chart0, "", "I [mJy/arcsec²]")?;
        for (method, r, intensity, lower, upper) in &profiles {
            let color = rgb(method.color());
            band(&mut chart0, r, lower, upper, color)?;
            chart0
                .draw_series(LineSeries::new(
                    r.iter().zip(intensity).map(|(&r, &i)| (r, i)),
                    &color,
                ))
                .map_err(draw)?
                .label(method.to_string())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        zero_line(&mut chart0, CYAN)?;
        legend(&mut chart0, SeriesLabelPosition::UpperRight)?;

        // residual brightness
        let residuals: Vec<(Method, &Vec<f64>, Vec<f64>)> = data
            .residual_brightness
            .iter()
            .map(|(method, r, i)| (*method, r, mjy_arcsec2(i)))
            .collect();
        let y_max = finite_range(residuals.iter().flat_map(|(_, _, i)| i.iter()))
            .map_or(1., |(lo, hi)| lo.abs().max(hi.abs()) * 1.1);
        let y_max = if y_max > 0. { y_max } else { 1. };
        let mut chart3 = chart(&ax3, 0f64..r_max, -y_max..y_max, (60, 40))?;
        mesh(&mut chart3, "r [arcsec]", "Resid. I [mJy/arcsec²]")?;
        for (method, r, intensity) in &residuals {
            let color = rgb(method.color());
            chart3
                .draw_series(LineSeries::new(
                    r.iter()
                        .zip(intensity)
                        .filter(|(_, i)| i.is_finite())
                        .map(|(&r, &i)| (r, i)),
                    &color,
                ))
                .map_err(draw)?;
        }
        zero_line(&mut chart3, CYAN)?;

        // binned observed visibilities and model visibilities
        let q_max = (data.max_baseline * 1.05 / 1e6).max(1e-3);
        let vis_mjy: Vec<f64> = data
            .binned
            .iter()
            .flat_map(|(_, binned)| binned.vis.iter().map(|v| v.re * 1e3))
            .chain(
                data.fits
                    .iter()
                    .flat_map(|fit| fit.visibility.vis.iter().map(|v| v * 1e3)),
            )
            .collect();
        let y = finite_range(&vis_mjy).unwrap_or((0., 1.));
        let mut chart1 = chart(&ax1, 0f64..q_max, padded(y, 0.05), (60, 20))?;
        mesh(&mut chart1, "", "Re(V) [mJy]")?;
        let bin_colors = [BLACK, RGBColor(0xa4, 0xa4, 0xa4)];
        for (k, (width, binned)) in data.binned.iter().enumerate() {
            let color = bin_colors[k % bin_colors.len()];
            chart1
                .draw_series(
                    binned
                        .uv
                        .iter()
                        .zip(&binned.vis)
                        .map(|(&q, v)| Cross::new((q / 1e6, v.re * 1e3), 3, color)),
                )
                .map_err(draw)?
                .label(format!("Obs., {:.0} kλ bins", width / 1e3))
                .legend(move |(x, y)| Cross::new((x + 10, y), 3, color));
        }
        for fit in &data.fits {
            let color = rgb(fit.method.color());
            chart1
                .draw_series(LineSeries::new(
                    fit.visibility
                        .grid
                        .iter()
                        .zip(&fit.visibility.vis)
                        .filter(|(&q, _)| q / 1e6 <= q_max)
                        .map(|(&q, &v)| (q / 1e6, v * 1e3)),
                    &color,
                ))
                .map_err(draw)?
                .label(fit.method.to_string())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        zero_line(&mut chart1, CYAN)?;
        legend(&mut chart1, SeriesLabelPosition::UpperRight)?;

        // visibility residuals
        let y_max = data
            .vis_residuals
            .iter()
            .map(|(_, _, resid)| {
                let mean = resid.iter().sum::<f64>() / resid.len().max(1) as f64;
                (mean + rmse(resid)) * 1e3
            })
            .fold(0f64, f64::max);
        let y_max = if y_max > 0. { y_max } else { 1. };
        let mut chart2 = chart(&ax2, 0f64..q_max, -y_max..y_max, (60, 40))?;
        mesh(&mut chart2, "Baseline [Mλ]", "Resid. [mJy]")?;
        for (method, q, resid) in &data.vis_residuals {
            let points = q
                .iter()
                .zip(resid)
                .map(|(&q, &r)| (q / 1e6, r * 1e3))
                .filter(|(_, r)| r.abs() <= y_max)
                .collect();
            markers(
                &mut chart2,
                *method,
                points,
                format!("{} RMSE {:.3} mJy", method, rmse(resid) * 1e3),
            )?;
        }
        zero_line(&mut chart2, CYAN)?;
        legend(&mut chart2, SeriesLabelPosition::UpperRight)?;

        root.present().map_err(draw)?;
    }
    log::info!("    saved to {:?}", path);
    Ok(path)
}

/// Kind of image panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    /// brightness with a colormap shared by all brightness panels
    Brightness,
    /// CLEAN model with an asinh stretch
    Model,
    /// residuals with a symmetric colormap
    Residual,
}

/// An image of the image comparison figure
#[derive(Debug, Clone)]
pub struct ImagePanel {
    pub title: String,
    pub image: Image,
    /// [arcsec]
    pub pixel_scale: f64,
    pub kind: PanelKind,
}

/// Data of the image comparison figure, panels are laid out column wise 2 per column
#[derive(Debug, Clone)]
pub struct ImageComparison {
    pub panels: Vec<ImagePanel>,
    /// upper bound of the brightness colormap
    pub brightness_max: f64,
    /// half width of the displayed field [arcsec]
    pub half_width: f64,
}

/// Compares the CLEAN images, the frank and rave pseudo-images and the residual images,
/// saved to `<save_dir>/image_compare_robust<r>.png`
pub fn image_comparison_figure(model: &Model, data: &ImageComparison) -> Result<PathBuf> {
    log::info!("  making image comparison figure");
    let path = model.figure_path("image_compare");
    if data.panels.is_empty() {
        return Err(FigureError::Empty(path.display().to_string()));
    }
    let ncols = data.panels.len().div_ceil(2);
    {
        let root = BitMapBackend::new(&path, (400 * ncols as u32, 820)).into_drawing_area();
        root.fill(&WHITE).map_err(draw)?;
        let root = titled(
            &root,
            &format!(
                "{} -- robust = {} for clean",
                model.disk,
                float_repr(model.clean.robust)
            ),
        )?;
        let areas = root.split_evenly((2, ncols));
        for (k, panel) in data.panels.iter().enumerate() {
            // column major
            let area = &areas[(k % 2) * ncols + k / 2];
            let image = panel.image.map(|x| x * 1e3);
            let (norm, colormap) = match panel.kind {
                PanelKind::Brightness => (
                    Norm::Linear {
                        vmin: 0.,
                        vmax: data.brightness_max * 1e3,
                    },
                    colorous::INFERNO,
                ),
                PanelKind::Model => (Norm::asinh(&image), colorous::REDS),
                PanelKind::Residual => (Norm::symmetric(&image), colorous::RED_BLUE),
            };
            Heatmap {
                image: &image,
                pixel_scale: panel.pixel_scale,
                norm,
                colormap,
                title: panel.title.clone(),
            }
            .draw(area, data.half_width)?;
        }
        root.present().map_err(draw)?;
    }
    log::info!("    saved to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_mean_square() {
        assert_eq!(rmse(&[]), 0.);
        assert_eq!(rmse(&[3., -4.]), (12.5f64).sqrt());
    }

    #[test]
    fn empty_figures() {
        let source = crate::mock::MockSource::builder().build();
        let model = source.model();
        let data = ProfileComparison {
            fits: vec![],
            residual_brightness: vec![],
            binned: vec![],
            vis_residuals: vec![],
            max_baseline: 1e6,
        };
        assert!(matches!(
            profile_comparison_figure(&model, &data),
            Err(FigureError::Empty(_))
        ));
    }
}
