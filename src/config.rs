//! Pipeline parameters
//!
//! The general parameters are shared by all sources, the source parameters hold the
//! per-source CLEAN, rave and frank settings and the physical parameters table holds
//! the stellar distance, luminosity and mass. They are merged with the MCMC geometry fit
//! of a source into a [Model].

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::geometry::Geometry;

/// Bundled default general parameters
pub const DEFAULT_GENERAL_PARAMETERS: &str = include_str!("../default_gen_pars.json");
/// MCMC geometry fit results file name in the source directory
pub const MCMC_RESULTS: &str = "MCMC_results.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {1:?}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("failed to parse {1:?}")]
    Json(#[source] serde_json::Error, PathBuf),
    #[error("invalid parameters for source {1}")]
    Source(#[source] serde_json::Error, String),
    #[error("failed to parse the bundled default parameters")]
    Default(#[source] serde_json::Error),
    #[error("failed to parse {1:?}")]
    Csv(#[source] csv::Error, PathBuf),
    #[error("source {0} not found in {1:?}")]
    UnknownSource(String, PathBuf),
    #[error("parameter ['frank']['set_fstar'] is '{0}', it should be one of 'MCMC', 'SED', 'custom'")]
    FstarPolicy(String),
    #[error("parameter ['frank']['{0}'] missing from the source parameters")]
    MissingSourceKey(String),
    #[error("posterior {0:?} missing from {1:?}")]
    MissingPosterior(String, PathBuf),
}
type Result<T> = std::result::Result<T, ConfigError>;

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    log::debug!("reading {:?}", path);
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read(e, path.into()))?;
    serde_json::from_str(&contents).map_err(|e| ConfigError::Json(e, path.into()))
}

/// Stellar flux selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum FstarPolicy {
    #[strum(serialize = "custom")]
    Custom,
    #[strum(serialize = "SED")]
    Sed,
    #[strum(serialize = "MCMC")]
    Mcmc,
}
impl FstarPolicy {
    pub fn parse(value: &str) -> Result<Self> {
        Self::from_str(value).map_err(|_| ConfigError::FstarPolicy(value.to_string()))
    }
}

/// frank brightness prior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
pub enum FrankMethod {
    #[default]
    Normal,
    LogNormal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasePars {
    #[serde(default)]
    pub save_dir: String,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default = "yes")]
    pub extract_clean_profile: bool,
    #[serde(default = "yes")]
    pub process_rave_fit: bool,
    #[serde(default = "yes")]
    pub compare_models_fig: bool,
    #[serde(default = "yes")]
    pub include_rave: bool,
}
fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralClean {
    pub robust: f64,
    pub rmax: f64,
    #[serde(rename = "Nr")]
    pub nr: usize,
    #[serde(rename = "Nphi")]
    pub nphi: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralFrank {
    pub set_fstar: String,
    #[serde(default)]
    pub method: FrankMethod,
    pub max_iter: usize,
    #[serde(default)]
    pub scale_heights: Option<Value>,
    #[serde(rename = "Rmax")]
    pub rmax: f64,
    #[serde(rename = "N")]
    pub n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotPars {
    /// visibility bin widths [wavelength]
    pub bin_widths: Vec<f64>,
    #[serde(default = "max_survey_panels")]
    pub max_survey_panels: usize,
}
fn max_survey_panels() -> usize {
    20
}

/// Parameters shared by all sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralPars {
    pub base: BasePars,
    pub clean: GeneralClean,
    pub frank: GeneralFrank,
    pub plot: PlotPars,
}
impl GeneralPars {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }
}

/// Bundled default general parameters
pub fn load_default_parameters() -> Result<GeneralPars> {
    serde_json::from_str(DEFAULT_GENERAL_PARAMETERS).map_err(ConfigError::Default)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceBase {
    #[serde(rename = "SMG_sub")]
    pub smg_sub: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceClean {
    pub npix: usize,
    /// [arcsec]
    pub pixel_scale: f64,
    /// [Jy/beam]
    pub image_rms: f64,
    pub bestfit_robust: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RavePars {
    /// [arcsec]
    pub pixel_scale: f64,
    /// number of fitted rave harmonics of the robust 2 fit
    #[serde(rename = "N", default = "rave_n")]
    pub n: usize,
}
fn rave_n() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrankBestfit {
    pub alpha: f64,
    pub wsmooth: f64,
    pub method: FrankMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceFrank {
    pub bestfit: FrankBestfit,
    /// [µJy]
    #[serde(default)]
    pub custom_fstar: Option<f64>,
    /// [µJy]
    #[serde(rename = "SED_fstar", default)]
    pub sed_fstar: Option<f64>,
}

/// Parameters of a single source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePars {
    pub base: SourceBase,
    pub clean: SourceClean,
    pub rave: RavePars,
    pub frank: SourceFrank,
}

/// Source parameters in file order
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    path: PathBuf,
    sources: Vec<(String, SourcePars)>,
}
impl SourceCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let map: serde_json::Map<String, Value> = read_json(path)?;
        let sources = map
            .into_iter()
            .map(|(disk, value)| {
                serde_json::from_value(value)
                    .map(|pars| (disk.clone(), pars))
                    .map_err(|e| ConfigError::Source(e, disk))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            path: path.to_path_buf(),
            sources,
        })
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(name, _)| name.as_str())
    }
    pub fn get(&self, disk: &str) -> Result<&SourcePars> {
        self.sources
            .iter()
            .find_map(|(name, pars)| (name == disk).then_some(pars))
            .ok_or_else(|| ConfigError::UnknownSource(disk.to_string(), self.path.clone()))
    }
    pub fn len(&self) -> usize {
        self.sources.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Physical parameters table row
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PhysicalParameters {
    pub name: String,
    /// distance [pc]
    #[serde(rename = "dpc")]
    pub dist: f64,
    /// stellar luminosity [Lsun]
    #[serde(rename = "Lstar")]
    pub lstar: f64,
    /// stellar mass [Msun]
    #[serde(rename = "Mstar")]
    pub mstar: f64,
}
impl PhysicalParameters {
    /// Reads the row of `disk` from the physical parameters table
    pub fn load<P: AsRef<Path>>(path: P, disk: &str) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("reading {:?}", path);
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read(e, path.into()))?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(contents.as_bytes());
        for result in rdr.deserialize() {
            let row: PhysicalParameters = result.map_err(|e| ConfigError::Csv(e, path.into()))?;
            if row.name == disk {
                return Ok(row);
            }
        }
        Err(ConfigError::UnknownSource(disk.to_string(), path.into()))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Posterior {
    median: f64,
}

/// MCMC geometry fit posterior medians
#[derive(Debug, Clone, Default)]
pub struct McmcResults(BTreeMap<String, f64>);
impl McmcResults {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let map: BTreeMap<String, Value> = read_json(path)?;
        Ok(Self(
            map.into_iter()
                .filter_map(|(key, value)| {
                    serde_json::from_value::<Posterior>(value)
                        .ok()
                        .map(|p| (key, p.median))
                })
                .collect(),
        ))
    }
    pub fn median(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }
    /// Disk geometry from the `i`, `PA`, `deltaRA-12m.obs1` and `deltaDec-12m.obs1` posteriors
    pub fn geometry(&self, path: &Path) -> Result<Geometry> {
        let get = |key: &str| {
            self.median(key)
                .ok_or_else(|| ConfigError::MissingPosterior(key.to_string(), path.into()))
        };
        Ok(Geometry::new(
            get("i")?,
            get("PA")?,
            get("deltaRA-12m.obs1")?,
            get("deltaDec-12m.obs1")?,
        ))
    }
}
impl FromIterator<(String, f64)> for McmcResults {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stellar flux [Jy] to subtract from the visibilities as a point source
///
/// The custom and SED fluxes are given in µJy, the MCMC flux in mJy. A missing MCMC
/// flux is replaced by 0.
pub fn select_fstar(
    policy: FstarPolicy,
    source: &SourceFrank,
    mcmc: &McmcResults,
) -> Result<f64> {
    match policy {
        FstarPolicy::Custom => source
            .custom_fstar
            .map(|fstar| fstar / 1e6)
            .ok_or_else(|| ConfigError::MissingSourceKey("custom_fstar".into())),
        FstarPolicy::Sed => source
            .sed_fstar
            .map(|fstar| fstar / 1e6)
            .ok_or_else(|| ConfigError::MissingSourceKey("SED_fstar".into())),
        FstarPolicy::Mcmc => Ok(mcmc.median("fstar").map_or_else(
            || {
                log::info!("  no stellar flux in MCMC file --> setting fstar = 0");
                0.
            },
            |fstar| fstar / 1e3,
        )),
    }
}

/// Paths to the general, per-source and physical parameters files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterFiles {
    pub general: PathBuf,
    pub source: PathBuf,
    pub physical: PathBuf,
}
impl ParameterFiles {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>, R: Into<PathBuf>>(
        general: P,
        source: Q,
        physical: R,
    ) -> Self {
        Self {
            general: general.into(),
            source: source.into(),
            physical: physical.into(),
        }
    }
    /// Directory of the general parameters file
    pub fn general_dir(&self) -> PathBuf {
        self.general
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// CLEAN imaging and profile extraction settings
#[derive(Debug, Clone, PartialEq)]
pub struct CleanModel {
    /// robust weighting of the CLEAN image in use
    pub robust: f64,
    /// outer radius of the extracted profiles [arcsec]
    pub rmax: f64,
    pub nr: usize,
    pub nphi: usize,
    pub npix: usize,
    /// [arcsec]
    pub pixel_scale: f64,
    /// [Jy/beam]
    pub image_rms: f64,
    pub bestfit_robust: f64,
}

/// frank fit settings
#[derive(Debug, Clone, PartialEq)]
pub struct FrankModel {
    pub set_fstar: FstarPolicy,
    /// stellar flux [Jy]
    pub fstar: f64,
    pub method: FrankMethod,
    pub max_iter: usize,
    pub scale_heights: Option<Value>,
    /// [arcsec]
    pub rmax: f64,
    pub n: usize,
    pub bestfit: FrankBestfit,
}

/// Pipeline configuration of one source
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub disk: String,
    pub save_dir: PathBuf,
    pub clean_dir: PathBuf,
    pub rave_dir: PathBuf,
    pub frank_dir: PathBuf,
    /// survey level products directory
    pub output_dir: PathBuf,
    /// `SMGsub.` if a submillimeter galaxy was subtracted from the visibilities
    pub smg_sub: String,
    pub base: BasePars,
    pub clean: CleanModel,
    pub rave: RavePars,
    pub frank: FrankModel,
    pub plot: PlotPars,
    pub physical: PhysicalParameters,
    pub geometry: Geometry,
}
impl Model {
    /// Assembles the configuration of `disk` from the parameter files
    pub fn setup(files: &ParameterFiles, disk: &str) -> Result<Self> {
        log::info!("Running radial profile pipeline for {}", disk);
        let general = GeneralPars::load(&files.general)?;
        let catalog = SourceCatalog::load(&files.source)?;
        let physical = PhysicalParameters::load(&files.physical, disk)?;
        Self::assemble(files, general, catalog.get(disk)?, physical, disk)
    }
    /// Assembles the configuration of `disk` from already loaded parameters
    pub fn assemble(
        files: &ParameterFiles,
        general: GeneralPars,
        source: &SourcePars,
        physical: PhysicalParameters,
        disk: &str,
    ) -> Result<Self> {
        let save_dir = if general.base.save_dir.is_empty() {
            let save_dir = files.general_dir().join("disks").join(disk);
            log::info!(
                "Setting load/save paths as {:?}/<clean, rave, frank>. Visibility tables should be in frank path.",
                save_dir
            );
            save_dir
        } else {
            let save_dir = PathBuf::from(&general.base.save_dir);
            log::info!(
                "Assuming load/save paths are {:?}/<clean, rave, frank>. Visibility tables should be in frank path.",
                save_dir
            );
            save_dir
        };
        let output_dir = if general.base.output_dir.is_empty() {
            files.general_dir()
        } else {
            PathBuf::from(&general.base.output_dir)
        };

        let mcmc_path = save_dir.join(MCMC_RESULTS);
        let mcmc = McmcResults::load(&mcmc_path)?;
        let geometry = mcmc.geometry(&mcmc_path)?;
        log::info!("  source geometry from MCMC {:?}", geometry);

        let set_fstar = FstarPolicy::parse(&general.frank.set_fstar)?;
        let fstar = select_fstar(set_fstar, &source.frank, &mcmc)?;

        let (method, max_iter) = if general.frank.scale_heights.is_some() {
            log::info!(
                "'scale_heights' is not None in your parameter file -- enforcing 'method=Normal' with 'max_iter=2000'"
            );
            (FrankMethod::Normal, 2000)
        } else {
            (general.frank.method, general.frank.max_iter)
        };

        Ok(Self {
            disk: disk.to_string(),
            clean_dir: save_dir.join("clean"),
            rave_dir: save_dir.join("rave"),
            frank_dir: save_dir.join("frank"),
            save_dir,
            output_dir,
            smg_sub: if source.base.smg_sub {
                "SMGsub.".to_string()
            } else {
                String::new()
            },
            clean: CleanModel {
                robust: general.clean.robust,
                rmax: general.clean.rmax,
                nr: general.clean.nr,
                nphi: general.clean.nphi,
                npix: source.clean.npix,
                pixel_scale: source.clean.pixel_scale,
                image_rms: source.clean.image_rms,
                bestfit_robust: source.clean.bestfit_robust,
            },
            rave: source.rave.clone(),
            frank: FrankModel {
                set_fstar,
                fstar,
                method,
                max_iter,
                scale_heights: general.frank.scale_heights,
                rmax: general.frank.rmax,
                n: general.frank.n,
                bestfit: source.frank.bestfit.clone(),
            },
            base: general.base,
            plot: general.plot,
            physical,
            geometry,
        })
    }
    /// Returns a copy of the model using the CLEAN robust weighting `robust`
    pub fn with_robust(&self, robust: f64) -> Self {
        let mut model = self.clone();
        model.clean.robust = robust;
        model
    }
    /// CLEAN images path without the `.<kind>.fits` suffix
    pub fn clean_base_path(&self) -> PathBuf {
        self.clean_dir.join(format!(
            "{}.combined.{}corrected.briggs.{}.{}.{}",
            self.disk,
            self.smg_sub,
            float_repr(self.clean.robust),
            self.clean.npix,
            float_repr(self.clean.pixel_scale)
        ))
    }
    /// CLEAN image of kind `pbcor`, `pb` or `model`
    pub fn clean_fits(&self, kind: &str) -> PathBuf {
        let mut path = self.clean_base_path().into_os_string();
        path.push(format!(".{}.fits", kind));
        path.into()
    }
    /// rave fit index and number of harmonics for the robust weighting in use
    fn rave_variant(&self) -> (u8, usize) {
        if self.clean.robust == 0.5 {
            (1, 5)
        } else {
            (2, self.rave.n)
        }
    }
    pub fn rave_fit_path(&self) -> PathBuf {
        let (variant, n) = self.rave_variant();
        self.rave_dir.join(format!(
            "{}-{}_inc=90_N={}_radial_{}0arcsec.npy",
            self.disk,
            variant,
            n,
            float_repr(self.rave.pixel_scale)
        ))
    }
    pub fn rave_residual_path(&self) -> PathBuf {
        let (variant, n) = self.rave_variant();
        self.rave_dir.join(format!(
            "{}-{}_inc=90_N={}_2Dresiduals.npy",
            self.disk, variant, n
        ))
    }
    /// frank best-fit products prefix
    pub fn frank_prefix(&self) -> PathBuf {
        let bestfit = &self.frank.bestfit;
        self.frank_dir.join(format!(
            "{}_alpha{}_wsmooth{}_{}",
            self.disk,
            float_repr(bestfit.alpha),
            float_repr(bestfit.wsmooth),
            bestfit.method
        ))
    }
    /// frank best-fit product `<prefix>_<suffix>`
    pub fn frank_product(&self, suffix: &str) -> PathBuf {
        let mut path = self.frank_prefix().into_os_string();
        path.push(format!("_{}", suffix));
        path.into()
    }
    /// Observed visibilities table
    pub fn visibilities_path(&self) -> PathBuf {
        self.frank_dir.join(format!(
            "{}.combined.{}corrected.npz",
            self.disk, self.smg_sub
        ))
    }
    /// Radial profile table path of `method` ("clean", "clean_model" or "rave")
    pub fn profile_path(&self, method: &str) -> PathBuf {
        let dir = if method == "rave" {
            &self.rave_dir
        } else {
            &self.clean_dir
        };
        dir.join(format!(
            "{}_profile_robust{}.txt",
            method,
            float_repr(self.clean.robust)
        ))
    }
    /// Figure path `<save_dir>/<kind>_robust<robust>.png`
    pub fn figure_path(&self, kind: &str) -> PathBuf {
        self.save_dir.join(format!(
            "{}_robust{}.png",
            kind,
            float_repr(self.clean.robust)
        ))
    }
}

/// Formats a float the way Python `repr` does, `2.0` not `2` and `1e-05` not `0.00001`
pub fn float_repr(x: f64) -> String {
    if !x.is_finite() {
        return format!("{}", x);
    }
    if x.fract() == 0. && x.abs() < 1e16 {
        return format!("{:.1}", x);
    }
    if x != 0. && (x.abs() < 1e-4 || x.abs() >= 1e16) {
        let s = format!("{:e}", x);
        if let Some((mantissa, exponent)) = s.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
            }
        }
        return s;
    }
    format!("{}", x)
}

/// Display of a [Model] summary
impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (d = {} pc)", self.disk, self.physical.dist)?;
        writeln!(
            f,
            " geometry: inc={:.3} PA={:.3} dRA={:.4} dDec={:.4}",
            self.geometry.inc, self.geometry.pa, self.geometry.dra, self.geometry.ddec
        )?;
        writeln!(
            f,
            " CLEAN: robust={} npix={} pixel={}\"",
            float_repr(self.clean.robust),
            self.clean.npix,
            float_repr(self.clean.pixel_scale)
        )?;
        write!(
            f,
            " frank: {} fstar={:.3e} Jy ({})",
            self.frank.method, self.frank.fstar, self.frank.set_fstar
        )
    }
}
