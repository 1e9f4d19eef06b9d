//! Brightness and visibility profiles of the CLEAN, rave and frank fits

use std::path::Path;

use strum_macros::{Display, EnumIter};

use crate::{
    interp::{interp, Edge, InterpError},
    table::{Table, TableError},
};

/// Profile fitting method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Method {
    #[strum(serialize = "clean")]
    Clean,
    #[strum(serialize = "rave")]
    Rave,
    #[strum(serialize = "frank")]
    Frank,
}
impl Method {
    /// Plot color, matplotlib C1, C3 and C2
    pub fn color(&self) -> colorous::Color {
        match self {
            Method::Clean => colorous::CATEGORY10[1],
            Method::Rave => colorous::CATEGORY10[3],
            Method::Frank => colorous::CATEGORY10[2],
        }
    }
}

/// 1σ brightness uncertainty
#[derive(Debug, Clone, PartialEq)]
pub enum Uncertainty {
    Symmetric(Vec<f64>),
    Asymmetric { lower: Vec<f64>, upper: Vec<f64> },
}
impl Uncertainty {
    pub fn lower(&self) -> &[f64] {
        match self {
            Uncertainty::Symmetric(sigma) => sigma,
            Uncertainty::Asymmetric { lower, .. } => lower,
        }
    }
    pub fn upper(&self) -> &[f64] {
        match self {
            Uncertainty::Symmetric(sigma) => sigma,
            Uncertainty::Asymmetric { upper, .. } => upper,
        }
    }
    pub fn len(&self) -> usize {
        self.lower().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn interp_onto(&self, r_new: &[f64], r: &[f64], edge: Edge) -> Result<Self, InterpError> {
        Ok(match self {
            Uncertainty::Symmetric(sigma) => Uncertainty::Symmetric(interp(r_new, r, sigma, edge)?),
            Uncertainty::Asymmetric { lower, upper } => Uncertainty::Asymmetric {
                lower: interp(r_new, r, lower, edge)?,
                upper: interp(r_new, r, upper, edge)?,
            },
        })
    }
}

/// Brightness [Jy/sr] versus radius [arcsec]
#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessProfile {
    pub r: Vec<f64>,
    pub intensity: Vec<f64>,
    pub uncertainty: Uncertainty,
}
impl BrightnessProfile {
    /// Reads a `r I σ` or `r I σ_lower σ_upper` profile table
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let table = Table::read(path)?;
        let mut columns = table.columns().to_vec().into_iter();
        match (
            columns.next(),
            columns.next(),
            columns.next(),
            columns.next(),
        ) {
            (Some(r), Some(intensity), Some(lower), Some(upper)) => Ok(Self {
                r,
                intensity,
                uncertainty: Uncertainty::Asymmetric { lower, upper },
            }),
            (Some(r), Some(intensity), Some(sigma), None) => Ok(Self {
                r,
                intensity,
                uncertainty: Uncertainty::Symmetric(sigma),
            }),
            _ => Err(TableError::Columns(3, table.ncols())),
        }
    }
    pub fn len(&self) -> usize {
        self.r.len()
    }
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
    /// Resamples the profile at the radii `r_new`
    pub fn interp_onto(&self, r_new: &[f64], edge: Edge) -> Result<Self, InterpError> {
        Ok(Self {
            r: r_new.to_vec(),
            intensity: interp(r_new, &self.r, &self.intensity, edge)?,
            uncertainty: self.uncertainty.interp_onto(r_new, &self.r, edge)?,
        })
    }
    /// Lower and upper 1σ bounds
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let lower = self
            .intensity
            .iter()
            .zip(self.uncertainty.lower())
            .map(|(i, s)| i - s)
            .collect();
        let upper = self
            .intensity
            .iter()
            .zip(self.uncertainty.upper())
            .map(|(i, s)| i + s)
            .collect();
        (lower, upper)
    }
    /// Largest radius of the profile
    pub fn r_max(&self) -> f64 {
        self.r.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Real part of the deprojected visibilities [Jy] versus baseline [wavelength]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisibilityProfile {
    pub grid: Vec<f64>,
    pub vis: Vec<f64>,
}

/// Brightness and visibility profiles of a fitting method
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileFit {
    pub method: Method,
    pub brightness: BrightnessProfile,
    pub visibility: VisibilityProfile,
}
