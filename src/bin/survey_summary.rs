use disk_profiles::{survey_summary, ParameterFiles, SurveyOptions};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "survey-summary",
    about = "Radial profiles of all the survey sources"
)]
struct Opt {
    /// Parameter file (.json) with generic pars
    #[structopt(short, long, default_value = "./pars_gen.json")]
    base_parameter_filename: PathBuf,
    /// Parameter file (.json) with source-specific pars
    #[structopt(short, long, default_value = "./pars_source.json")]
    source_parameter_filename: PathBuf,
    /// Physical parameters table (.csv)
    #[structopt(short, long, default_value = "./summary_disc_parameters.csv")]
    physical_parameter_filename: PathBuf,
    /// Robust weighting of the CLEAN and rave profiles
    #[structopt(short, long, default_value = "2.0")]
    robust: f64,
    /// Leaves out the rave profiles
    #[structopt(long)]
    no_rave: bool,
    /// Skips the per source profile tables
    #[structopt(long)]
    no_txt: bool,
    /// Skips the summary figure
    #[structopt(long)]
    no_fig: bool,
    /// Draws the 1σ uncertainty bands
    #[structopt(short, long)]
    uncertainties: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let files = ParameterFiles::new(
        opt.base_parameter_filename,
        opt.source_parameter_filename,
        opt.physical_parameter_filename,
    );
    let summary = survey_summary(
        &files,
        &SurveyOptions {
            profiles_txt: !opt.no_txt,
            profiles_fig: !opt.no_fig,
            robust: opt.robust,
            include_rave: !opt.no_rave,
            uncertainty_bands: opt.uncertainties,
        },
    )?;
    if let Some(figure) = summary.figure {
        log::info!("Survey summary figure saved to {:?}", figure);
    }
    Ok(())
}
