use disk_profiles::{bulk_run, ParameterFiles};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "bulk-run",
    about = "Radial profile pipeline of all the disks of the source parameter file"
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
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let files = ParameterFiles::new(
        opt.base_parameter_filename,
        opt.source_parameter_filename,
        opt.physical_parameter_filename,
    );
    let disks = bulk_run(&files)?;
    log::info!("Processed {} sources", disks.len());
    Ok(())
}
