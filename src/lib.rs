//! Radial brightness profiles of debris disks
//!
//! The CLEAN image profiles, the rave fits and the frank fits of interferometric
//! observations are brought to common units and radii, compared in the image and in the
//! visibility domains and summarized over a survey of sources.

pub mod config;
pub mod error;
pub mod fits;
pub mod geometry;
pub mod hankel;
pub mod image;
pub mod imaging;
pub mod interp;
pub mod loaders;
pub mod pipeline;
pub mod plot;
pub mod profile;
pub mod radial;
pub mod survey;
pub mod table;
pub mod units;
pub mod uvtable;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{Model, ParameterFiles};
pub use error::{Error, Result};
pub use pipeline::{bulk_run, run};
pub use survey::{survey_summary, SurveyOptions};
pub use uvtable::concatenate_vis;
