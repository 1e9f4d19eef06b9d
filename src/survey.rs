//! Survey summary
//!
//! The best-fit CLEAN, rave and frank profiles of every source are resampled onto the
//! frank radii, saved in one table per source and drawn in a single summary figure.

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressIterator};

use crate::{
    config::{float_repr, Model, ParameterFiles, SourceCatalog},
    error::Result,
    interp::Edge,
    loaders::load_bestfit_profiles,
    plot::{survey_figure, SurveyCurve, SurveyPanel},
    profile::{BrightnessProfile, Method},
    table::Table,
};

/// Survey summary file name
pub const SURVEY_FIGURE: &str = "survey_profile_summary.png";

/// Survey summary outputs
#[derive(Debug, Clone)]
pub struct SurveyOptions {
    /// save one profile table per source
    pub profiles_txt: bool,
    /// draw the summary figure
    pub profiles_fig: bool,
    /// CLEAN robust weighting of the CLEAN and rave profiles
    pub robust: f64,
    pub include_rave: bool,
    /// draw the 1σ uncertainty bands
    pub uncertainty_bands: bool,
}
impl Default for SurveyOptions {
    fn default() -> Self {
        Self {
            profiles_txt: true,
            profiles_fig: true,
            robust: 2.0,
            include_rave: true,
            uncertainty_bands: false,
        }
    }
}

/// Files written by [survey_summary]
#[derive(Debug, Clone, Default)]
pub struct SurveySummary {
    pub tables: Vec<PathBuf>,
    pub figure: Option<PathBuf>,
}

/// Best-fit profiles of a source resampled onto the frank radii
#[derive(Debug, Clone)]
pub struct AlignedProfiles {
    /// distance [pc]
    pub dist: f64,
    pub clean: BrightnessProfile,
    pub rave: Option<BrightnessProfile>,
    pub frank: BrightnessProfile,
}
impl AlignedProfiles {
    pub fn load(model: &Model, include_rave: bool) -> Result<Self> {
        let bestfit = load_bestfit_profiles(model, include_rave)?;
        let r = &bestfit.frank.brightness.r;
        Ok(Self {
            dist: model.physical.dist,
            clean: bestfit.clean.brightness.interp_onto(r, Edge::Clamp)?,
            rave: bestfit
                .rave
                .as_ref()
                .map(|rave| rave.brightness.interp_onto(r, Edge::Clamp))
                .transpose()?,
            frank: bestfit.frank.brightness,
        })
    }
    /// Radii [au]
    pub fn r_au(&self) -> Vec<f64> {
        self.frank.r.iter().map(|r| r * self.dist).collect()
    }
    /// Profiles table, r in au and brightnesses in Jy/sr
    pub fn table(&self) -> Result<Table> {
        let mut header = format!(
            "dist={} [pc].\nAll brightnesses in [Jy/steradian].\nUncertainties not comparable across models. ",
            float_repr(self.dist)
        );
        let mut columns = vec![
            self.r_au(),
            self.clean.intensity.clone(),
            self.clean.uncertainty.lower().to_vec(),
            self.frank.intensity.clone(),
            self.frank.uncertainty.lower().to_vec(),
        ];
        match &self.rave {
            Some(rave) => {
                header.push_str("Rave uncertainties have unique lower and upper bounds.\nColumns: r [au]\tI_clean\tsigma_clean\tI_frank\tsigma_frank\tI_rave\tsigma_lower_rave\tsigma_upper_rave");
                columns.extend([
                    rave.intensity.clone(),
                    rave.uncertainty.lower().to_vec(),
                    rave.uncertainty.upper().to_vec(),
                ]);
            }
            None => header.push_str("\nColumns: r [au]\tI_clean\tsigma_clean\tI_frank\tsigma_frank"),
        }
        Ok(Table::new(header, columns)?)
    }
    /// Survey figure panel
    pub fn panel(&self, disk: &str, fstar: f64) -> SurveyPanel {
        let curve = |method, profile: &BrightnessProfile| SurveyCurve {
            method,
            intensity: profile.intensity.clone(),
            lower: profile.uncertainty.lower().to_vec(),
            upper: profile.uncertainty.upper().to_vec(),
        };
        let mut curves = vec![curve(Method::Clean, &self.clean)];
        if let Some(rave) = &self.rave {
            curves.push(curve(Method::Rave, rave));
        }
        curves.push(curve(Method::Frank, &self.frank));
        SurveyPanel {
            disk: disk.to_string(),
            fstar_ujy: fstar * 1e6,
            r_au: self.r_au(),
            curves,
        }
    }
}

/// Summarizes the profiles of all the sources of the source parameters file
///
/// Tables are written to `<save_dir>/<disk>_radial_profiles.txt` and the figure to
/// `<output_dir>/survey_profile_summary.png`.
pub fn survey_summary(files: &ParameterFiles, opts: &SurveyOptions) -> Result<SurveySummary> {
    let catalog = SourceCatalog::load(&files.source)?;
    let disks: Vec<String> = catalog.names().map(String::from).collect();
    log::info!("Survey summary of {} sources", disks.len());

    let mut summary = SurveySummary::default();
    let mut panels = vec![];
    let mut figure_path = None;
    let mut max_panels = 0;
    let pb = ProgressBar::new(disks.len() as u64);
    for disk in disks.iter().progress_with(pb) {
        let model = Model::setup(files, disk)?.with_robust(opts.robust);
        let profiles = AlignedProfiles::load(&model, opts.include_rave)?;
        if opts.profiles_txt {
            let path = model.save_dir.join(format!("{}_radial_profiles.txt", disk));
            log::info!("  Survey summary: saving radial profiles to {:?}", path);
            profiles.table()?.write(&path)?;
            summary.tables.push(path);
        }
        if opts.profiles_fig {
            panels.push(profiles.panel(disk, model.frank.fstar));
            figure_path.get_or_insert_with(|| model.output_dir.join(SURVEY_FIGURE));
            max_panels = model.plot.max_survey_panels;
        }
    }

    if let Some(path) = figure_path {
        survey_figure(&path, &panels, opts.uncertainty_bands, max_panels)?;
        summary.figure = Some(path);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loaders::{extract_clean_profile, process_rave_fit},
        mock::MockSource,
    };

    fn prepare(source: &MockSource, robust: f64) {
        for disk in &source.disks {
            let model = Model::setup(&source.files, disk).unwrap().with_robust(robust);
            extract_clean_profile(&model).unwrap();
            process_rave_fit(&model).unwrap();
        }
    }

    #[test]
    fn deterministic_tables() {
        let source = MockSource::builder().build();
        prepare(&source, 2.0);
        let opts = SurveyOptions {
            profiles_fig: false,
            ..Default::default()
        };
        let first = survey_summary(&source.files, &opts).unwrap();
        assert!(first.figure.is_none());
        let bytes = std::fs::read(&first.tables[0]).unwrap();
        let second = survey_summary(&source.files, &opts).unwrap();
        assert_eq!(first.tables, second.tables);
        assert_eq!(bytes, std::fs::read(&second.tables[0]).unwrap());

        let table = Table::read(&first.tables[0]).unwrap();
        assert_eq!(table.ncols(), 8);
        assert!(table.header[0].starts_with("dist="));
        let model = Model::setup(&source.files, &source.disk).unwrap();
        let profiles = AlignedProfiles::load(&model, true).unwrap();
        table
            .column(0)
            .unwrap()
            .iter()
            .zip(&profiles.frank.r)
            .for_each(|(r_au, r)| assert!((r_au - r * source.dist).abs() <= 1e-12 * r_au.abs()));
    }

    #[test]
    fn one_figure_n_tables() {
        let source = MockSource::builder().sources(3).build();
        prepare(&source, 2.0);
        let summary = survey_summary(&source.files, &SurveyOptions::default()).unwrap();
        assert_eq!(summary.tables.len(), 3);
        let figure = summary.figure.unwrap();
        assert!(figure.is_file());
        assert_eq!(figure, source.root.join(SURVEY_FIGURE));
        let figures = std::fs::read_dir(&source.root)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "png"))
            .count();
        assert_eq!(figures, 1);
    }

    #[test]
    fn more_sources_than_panels() {
        let source = MockSource::builder().sources(3).build();
        source.edit_general(|general| general["plot"]["max_survey_panels"] = 2.into());
        prepare(&source, 2.0);
        let summary = survey_summary(&source.files, &SurveyOptions::default()).unwrap();
        assert_eq!(summary.tables.len(), 3);
        assert!(summary.tables.iter().all(|table| table.is_file()));
        // 2 panels on a 1 x 2 grid of 300 pixel panels
        let png = std::fs::read(summary.figure.unwrap()).unwrap();
        let size = |k: usize| u32::from_be_bytes([png[k], png[k + 1], png[k + 2], png[k + 3]]);
        assert_eq!((size(16), size(20)), (600, 300));
    }

    #[test]
    fn survey_without_rave() {
        let source = MockSource::builder().build();
        let model = Model::setup(&source.files, &source.disk).unwrap();
        extract_clean_profile(&model).unwrap();
        let opts = SurveyOptions {
            include_rave: false,
            profiles_fig: false,
            ..Default::default()
        };
        let summary = survey_summary(&source.files, &opts).unwrap();
        let table = Table::read(&summary.tables[0]).unwrap();
        assert_eq!(table.ncols(), 5);
        let profiles = AlignedProfiles::load(&model, false).unwrap();
        assert_eq!(table.column(1).unwrap().len(), profiles.frank.len());
    }
}
