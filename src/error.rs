use std::path::PathBuf;

use crate::{
    config::ConfigError, fits::FitsError, imaging::ImagingError, interp::InterpError,
    plot::FigureError, radial::ProfileError, table::TableError, uvtable::UvTableError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `config` module")]
    Config(#[from] ConfigError),
    #[error("Error in the `fits` module")]
    Fits(#[from] FitsError),
    #[error("Error in the `table` module")]
    Table(#[from] TableError),
    #[error("Error in the `radial` module")]
    Profile(#[from] ProfileError),
    #[error("Error in the `interp` module")]
    Interp(#[from] InterpError),
    #[error("Error in the `uvtable` module")]
    UvTable(#[from] UvTableError),
    #[error("Error in the `imaging` module")]
    Imaging(#[from] ImagingError),
    #[error("Error in the `plot` module")]
    Figure(#[from] FigureError),
    #[error("no beam (BMAJ, BMIN) in the header of {0:?}")]
    MissingBeam(PathBuf),
    #[error("unexpected array shape {0:?} in {1:?}")]
    RaveShape(Vec<usize>, PathBuf),
    #[error("expected baselines and Re(V) columns in {0:?}")]
    FrankGrid(PathBuf),
}
pub type Result<T> = std::result::Result<T, Error>;
