use disk_profiles::{run, Model, ParameterFiles};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "disk-profiles",
    about = "Radial profile pipeline of a single disk"
)]
struct Opt {
    /// Disk name
    #[structopt(short, long)]
    disk: String,
    /// Parameter file (.json) with generic pars
    #[structopt(short, long, default_value = "./default_gen_pars.json")]
    base_parameter_filename: PathBuf,
    /// Parameter file (.json) with source-specific pars
    #[structopt(short, long, default_value = "./default_source_pars.json")]
    source_parameter_filename: PathBuf,
    /// Physical parameters table (.csv)
    #[structopt(short, long, default_value = "./summary_disc_parameters.csv")]
    physical_parameter_filename: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let files = ParameterFiles::new(
        opt.base_parameter_filename,
        opt.source_parameter_filename,
        opt.physical_parameter_filename,
    );
    let model = Model::setup(&files, &opt.disk)?;
    run(&model)?;
    Ok(())
}
