//! Figures
//!
//! Figures are drawn with plotters into PNG files. Text (titles, axis labels and legends)
//! is only drawn when a system font is available.

use std::{fmt::Display, ops::Range, sync::OnceLock};

use itertools::{
    Itertools,
    MinMaxResult::{MinMax, NoElements, OneElement},
};
use plotters::{coord::types::RangedCoordf64, prelude::*};

use crate::image::Image;

mod comparison;
mod survey;
pub use comparison::{
    image_comparison_figure, profile_comparison_figure, rmse, ImageComparison, ImagePanel,
    PanelKind, ProfileComparison,
};
pub use survey::{grid_size, survey_figure, SurveyCurve, SurveyPanel};

#[derive(Debug, thiserror::Error)]
pub enum FigureError {
    #[error("failed to draw figure: {0}")]
    Draw(String),
    #[error("nothing to plot in {0}")]
    Empty(String),
}
pub type Result<T> = std::result::Result<T, FigureError>;

pub(crate) fn draw<E: Display>(e: E) -> FigureError {
    FigureError::Draw(e.to_string())
}

pub(crate) type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
pub(crate) type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

/// Checks once whether text can be rendered
pub(crate) fn has_fonts() -> bool {
    static FONTS: OnceLock<bool> = OnceLock::new();
    *FONTS.get_or_init(|| {
        let available = ("sans-serif", 12).into_font().layout_box("0").is_ok();
        if !available {
            log::warn!("no font available, figures are drawn without text");
        }
        available
    })
}

pub(crate) fn rgb(color: colorous::Color) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

/// Adds a title on top of `area` and returns the area below it
pub(crate) fn titled<'a>(area: &Area<'a>, title: &str) -> Result<Area<'a>> {
    if has_fonts() {
        area.titled(title, ("sans-serif", 16)).map_err(draw)
    } else {
        Ok(area.clone())
    }
}

/// Writes text lines near the top of the area
pub(crate) fn annotate(area: &Area<'_>, lines: &[String]) -> Result<()> {
    if !has_fonts() {
        return Ok(());
    }
    let (w, _) = area.dim_in_pixel();
    for (k, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.clone(),
            ((w as f64 * 0.55) as i32, 20 + 14 * k as i32),
            ("sans-serif", 12).into_font(),
        ))
        .map_err(draw)?;
    }
    Ok(())
}

/// Builds a linear chart on `area`
pub(crate) fn chart<'a, 'b: 'a>(
    area: &'a Area<'b>,
    x: Range<f64>,
    y: Range<f64>,
    label_area: (u32, u32),
) -> Result<Chart<'a, 'b>> {
    let (left, bottom) = if has_fonts() { label_area } else { (5, 5) };
    ChartBuilder::on(area)
        .set_label_area_size(LabelAreaPosition::Left, left)
        .set_label_area_size(LabelAreaPosition::Bottom, bottom)
        .margin(8)
        .build_cartesian_2d(x, y)
        .map_err(draw)
}

/// Draws the mesh with the axis descriptions
pub(crate) fn mesh<'a, 'b: 'a>(
    chart: &mut Chart<'a, 'b>,
    x_desc: &str,
    y_desc: &str,
) -> Result<()> {
    if !has_fonts() {
        return Ok(());
    }
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(draw)
}

pub(crate) fn legend<'a, 'b: 'a>(
    chart: &mut Chart<'a, 'b>,
    position: SeriesLabelPosition,
) -> Result<()> {
    if !has_fonts() {
        return Ok(());
    }
    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .position(position)
        .draw()
        .map_err(draw)
}

/// Horizontal line at `y = 0`
pub(crate) fn zero_line<'a, 'b: 'a>(chart: &mut Chart<'a, 'b>, color: RGBColor) -> Result<()> {
    let x = chart.x_range();
    chart
        .draw_series(LineSeries::new([(x.start, 0.), (x.end, 0.)], &color.mix(0.6)))
        .map_err(draw)?;
    Ok(())
}

/// Filled band between `lower` and `upper`
pub(crate) fn band<'a, 'b: 'a>(
    chart: &mut Chart<'a, 'b>,
    x: &[f64],
    lower: &[f64],
    upper: &[f64],
    color: RGBColor,
) -> Result<()> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(upper)
        .map(|(&x, &y)| (x, y))
        .chain(x.iter().zip(lower).rev().map(|(&x, &y)| (x, y)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.len() < 3 {
        return Ok(());
    }
    chart
        .draw_series(std::iter::once(Polygon::new(points, color.mix(0.4).filled())))
        .map_err(draw)?;
    Ok(())
}

/// `(min, max)` of the finite values, `None` if there is none
pub(crate) fn finite_range<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> Option<(f64, f64)> {
    match values
        .into_iter()
        .filter(|x| x.is_finite())
        .minmax_by(|a, b| a.total_cmp(b))
    {
        MinMax(lo, hi) => Some((*lo, *hi)),
        OneElement(x) => Some((*x, *x)),
        NoElements => None,
    }
}

/// Pads a range so that it is never empty
pub(crate) fn padded((lo, hi): (f64, f64), pad: f64) -> Range<f64> {
    let span = hi - lo;
    if span > 0. {
        lo - pad * span..hi + pad * span
    } else {
        let delta = if lo != 0. { lo.abs() * 0.1 } else { 1. };
        lo - delta..hi + delta
    }
}

/// Maps image values to `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Norm {
    Linear { vmin: f64, vmax: f64 },
    /// inverse hyperbolic sine stretch, emphasizes the faint emission
    Asinh { vmin: f64, vmax: f64 },
}
impl Norm {
    /// Linear norm symmetric around 0
    pub fn symmetric(image: &Image) -> Self {
        let vmax = image.max_abs();
        Norm::Linear {
            vmin: -vmax,
            vmax,
        }
    }
    pub fn asinh(image: &Image) -> Self {
        Norm::Asinh {
            vmin: image.min(),
            vmax: image.max(),
        }
    }
    pub fn apply(&self, x: f64) -> f64 {
        let t = match *self {
            Norm::Linear { vmin, vmax } => {
                if vmax > vmin {
                    (x - vmin) / (vmax - vmin)
                } else {
                    0.5
                }
            }
            Norm::Asinh { vmin, vmax } => {
                let scale = 0.02 * (vmax - vmin);
                if scale > 0. {
                    ((x - vmin) / scale).asinh() / ((vmax - vmin) / scale).asinh()
                } else {
                    0.5
                }
            }
        };
        t.clamp(0., 1.)
    }
    pub fn range(&self) -> (f64, f64) {
        match *self {
            Norm::Linear { vmin, vmax } | Norm::Asinh { vmin, vmax } => (vmin, vmax),
        }
    }
}

/// An image panel
pub(crate) struct Heatmap<'a> {
    pub image: &'a Image,
    /// [arcsec]
    pub pixel_scale: f64,
    pub norm: Norm,
    pub colormap: colorous::Gradient,
    pub title: String,
}
impl<'a> Heatmap<'a> {
    /// Draws the image within `±half_width` [arcsec] of the center, east to the left
    pub fn draw(&self, area: &Area<'_>, half_width: f64) -> Result<()> {
        let (lo, hi) = self.norm.range();
        let area = titled(
            area,
            &format!("{} [{:.3}, {:.3}]", self.title, lo, hi),
        )?;
        let mut chart = chart(
            &area,
            -half_width..half_width,
            -half_width..half_width,
            (35, 30),
        )?;
        if has_fonts() {
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|x| format!("{:.1}", -x))
                .y_label_formatter(&|y| format!("{:.1}", y))
                .draw()
                .map_err(draw)?;
        }
        let half = 0.5 * self.pixel_scale;
        let pixels = self.image.indexed_iter().filter_map(|(i, j, value)| {
            // plotted abscissa is minus the RA offset
            let x = -self.image.x_offset(j, self.pixel_scale);
            let y = self.image.y_offset(i, self.pixel_scale);
            if x.abs() > half_width || y.abs() > half_width || value.is_nan() {
                return None;
            }
            let color = rgb(self.colormap.eval_continuous(self.norm.apply(value)));
            Some(Rectangle::new(
                [(x - half, y - half), (x + half, y + half)],
                color.filled(),
            ))
        });
        chart.draw_series(pixels).map_err(draw)?;
        Ok(())
    }
}
