//! Survey summary figure

use std::path::Path;

use plotters::prelude::*;

use super::{
    annotate, band, chart, draw, finite_range, legend, mesh, padded, rgb, zero_line,
    FigureError, Result,
};
use crate::profile::Method;

/// A brightness profile of a survey panel
#[derive(Debug, Clone)]
pub struct SurveyCurve {
    pub method: Method,
    /// [Jy/sr]
    pub intensity: Vec<f64>,
    /// 1σ uncertainty below the profile [Jy/sr]
    pub lower: Vec<f64>,
    /// 1σ uncertainty above the profile [Jy/sr]
    pub upper: Vec<f64>,
}

/// The profiles of one source
#[derive(Debug, Clone)]
pub struct SurveyPanel {
    pub disk: String,
    /// stellar flux [μJy]
    pub fstar_ujy: f64,
    /// [au]
    pub r_au: Vec<f64>,
    pub curves: Vec<SurveyCurve>,
}

/// Number of `(rows, columns)` of the panel grid
pub fn grid_size(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let ncols = (n as f64).sqrt().ceil() as usize;
    (n.div_ceil(ncols), ncols)
}

/// Draws the brightness profiles of all sources, one panel per source
///
/// Profiles are displayed in units of 10⁶ Jy/sr, with their 1σ bands if `bands` is set.
/// Only the first `max_panels` sources are drawn.
pub fn survey_figure<P: AsRef<Path>>(
    path: P,
    panels: &[SurveyPanel],
    bands: bool,
    max_panels: usize,
) -> Result<()> {
    let path = path.as_ref();
    if panels.is_empty() || max_panels == 0 {
        return Err(FigureError::Empty(path.display().to_string()));
    }
    let panels = if panels.len() > max_panels {
        log::warn!(
            "{} sources but at most {} panels, the survey figure is truncated",
            panels.len(),
            max_panels
        );
        &panels[..max_panels]
    } else {
        panels
    };
    let (nrows, ncols) = grid_size(panels.len());
    log::info!("  making survey summary figure ({}x{} panels)", nrows, ncols);

    let root = BitMapBackend::new(path, (300 * ncols as u32, 300 * nrows as u32))
        .into_drawing_area();
    root.fill(&WHITE).map_err(draw)?;
    let areas = root.split_evenly((nrows, ncols));
    for (k, (panel, area)) in panels.iter().zip(&areas).enumerate() {
        let scaled: Vec<(Method, Vec<f64>, Vec<f64>, Vec<f64>)> = panel
            .curves
            .iter()
            .map(|curve| {
                let intensity: Vec<f64> = curve.intensity.iter().map(|x| x / 1e6).collect();
                let lower = intensity
                    .iter()
                    .zip(&curve.lower)
                    .map(|(i, s)| i - s / 1e6)
                    .collect();
                let upper = intensity
                    .iter()
                    .zip(&curve.upper)
                    .map(|(i, s)| i + s / 1e6)
                    .collect();
                (curve.method, intensity, lower, upper)
            })
            .collect();
        let y = finite_range(scaled.iter().flat_map(|(_, i, lo, hi)| {
            let (lo, hi): (&[f64], &[f64]) = if bands { (lo, hi) } else { (&[], &[]) };
            i.iter().chain(lo).chain(hi)
        }))
        .unwrap_or((0., 1.));
        let x = finite_range(&panel.r_au).unwrap_or((0., 1.));
        let mut chart = chart(area, 0f64..x.1.max(f64::MIN_POSITIVE), padded(y, 0.05), (45, 30))?;
        let last = k + 1 == panels.len();
        if last {
            mesh(&mut chart, "r [au]", "I [10⁶ Jy/sr]")?;
        } else {
            mesh(&mut chart, "", "")?;
        }
        for (method, intensity, lower, upper) in &scaled {
            let color = rgb(method.color());
            if bands {
                band(&mut chart, &panel.r_au, lower, upper, color)?;
            }
            chart
                .draw_series(LineSeries::new(
                    panel
                        .r_au
                        .iter()
                        .zip(intensity)
                        .filter(|(_, i)| i.is_finite())
                        .map(|(&r, &i)| (r, i)),
                    &color,
                ))
                .map_err(draw)?
                .label(method.to_string())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        zero_line(&mut chart, BLACK)?;
        annotate(
            area,
            &[
                panel.disk.clone(),
                format!("Fstar {:.0} uJy", panel.fstar_ujy),
            ],
        )?;
        if last {
            legend(&mut chart, SeriesLabelPosition::MiddleRight)?;
        }
    }
    root.present().map_err(draw)?;
    log::info!("    saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn panel(disk: &str) -> SurveyPanel {
        let r_au: Vec<f64> = (0..50).map(|i| i as f64 * 2.).collect();
        let intensity: Vec<f64> = r_au
            .iter()
            .map(|r| 1e6 * (-(r - 50f64).powi(2) / 200.).exp())
            .collect();
        SurveyPanel {
            disk: disk.to_string(),
            fstar_ujy: 12.,
            curves: Method::iter()
                .map(|method| SurveyCurve {
                    method,
                    intensity: intensity.clone(),
                    lower: vec![1e4; r_au.len()],
                    upper: vec![2e4; r_au.len()],
                })
                .collect(),
            r_au,
        }
    }

    #[test]
    fn grid() {
        assert_eq!(grid_size(1), (1, 1));
        assert_eq!(grid_size(3), (2, 2));
        assert_eq!(grid_size(5), (2, 3));
        assert_eq!(grid_size(20), (4, 5));
    }

    #[test]
    fn truncated_figure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.png");
        let panels: Vec<SurveyPanel> = (0..5).map(|k| panel(&format!("disk{k}"))).collect();
        survey_figure(&path, &panels, true, 4).unwrap();
        assert!(path.is_file());
        assert!(matches!(
            survey_figure(&path, &[], false, 4),
            Err(FigureError::Empty(_))
        ));
    }
}
