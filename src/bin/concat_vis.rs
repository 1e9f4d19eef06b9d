use disk_profiles::concatenate_vis;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "concat-vis",
    about = "Concatenates visibility tables into a single .npz table"
)]
struct Opt {
    /// Visibility tables with the u, v, Re(V), Im(V) and weights columns
    #[structopt(required = true)]
    tables: Vec<PathBuf>,
    /// Concatenated table (.npz)
    #[structopt(short, long)]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let table = concatenate_vis(&opt.tables, &opt.output)?;
    println!(
        "{} visibilities from {} tables saved to {:?}",
        table.nrows(),
        opt.tables.len(),
        opt.output
    );
    Ok(())
}
