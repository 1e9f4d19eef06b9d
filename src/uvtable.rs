//! Visibility tables
//!
//! A visibility table holds the `u`, `v` baselines [wavelength], the complex visibilities
//! `V` [Jy] and their `weights` [1/Jy²]. Tables are stored as `.npz` archives of 4 arrays.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use npyz::{npz::NpzArchive, WriterBuilder};
use rustfft::num_complex::Complex64;
use zip::{write::FileOptions, ZipWriter};

use crate::{
    geometry::Geometry,
    table::{Table, TableError},
};

#[derive(Debug, thiserror::Error)]
pub enum UvTableError {
    #[error("failed to read {1:?}")]
    Read(#[source] io::Error, PathBuf),
    #[error("failed to write {1:?}")]
    Write(#[source] io::Error, PathBuf),
    #[error("failed to write archive {1:?}")]
    Zip(#[source] zip::result::ZipError, PathBuf),
    #[error("array {0:?} is missing from {1:?}")]
    MissingArray(String, PathBuf),
    #[error("visibility arrays have different lengths")]
    Length,
    #[error("expected at least 5 columns (u v Re(V) Im(V) weights), found {0}")]
    Columns(usize),
    #[error("no visibility table to concatenate")]
    NoTable,
    #[error("bin width must be positive, found {0}")]
    BinWidth(f64),
    #[error(transparent)]
    Table(#[from] TableError),
}
type Result<T> = std::result::Result<T, UvTableError>;

/// Visibilities at the projected baselines
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UvTable {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub vis: Vec<Complex64>,
    pub weights: Vec<f64>,
}
impl UvTable {
    pub fn new(u: Vec<f64>, v: Vec<f64>, vis: Vec<Complex64>, weights: Vec<f64>) -> Result<Self> {
        let n = u.len();
        if v.len() != n || vis.len() != n || weights.len() != n {
            return Err(UvTableError::Length);
        }
        Ok(Self { u, v, vis, weights })
    }
    /// Builds the table from the columns `u v Re(V) Im(V) weights`, extra columns are ignored
    pub fn from_table(table: Table) -> Result<Self> {
        let ncols = table.ncols();
        let mut columns = table
            .take_columns(5)
            .map_err(|_| UvTableError::Columns(ncols))?
            .into_iter();
        let mut next = || columns.next().ok_or(UvTableError::Columns(ncols));
        let (u, v, re, im, weights) = (next()?, next()?, next()?, next()?, next()?);
        let vis = re
            .into_iter()
            .zip(im)
            .map(|(re, im)| Complex64::new(re, im))
            .collect();
        Self::new(u, v, vis, weights)
    }
    /// Loads an `.npz` visibility table
    pub fn load_npz<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading {:?}...", path);
        let read_err = |e: io::Error| UvTableError::Read(e, path.to_path_buf());
        let mut npz = NpzArchive::open(path).map_err(read_err)?;
        let mut real = |name: &str| -> Result<Vec<f64>> {
            npz.by_name(name)
                .map_err(read_err)?
                .ok_or_else(|| UvTableError::MissingArray(name.to_string(), path.to_path_buf()))?
                .into_vec::<f64>()
                .map_err(read_err)
        };
        let u = real("u")?;
        let v = real("v")?;
        let weights = real("weights")?;
        let vis = npz
            .by_name("V")
            .map_err(read_err)?
            .ok_or_else(|| UvTableError::MissingArray("V".to_string(), path.to_path_buf()))?
            .into_vec::<Complex64>()
            .map_err(read_err)?;
        Self::new(u, v, vis, weights)
    }
    /// Saves the table as an `.npz` archive with the arrays `u`, `v`, `V` and `weights`
    pub fn save_npz<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_err = |e: io::Error| UvTableError::Write(e, path.to_path_buf());
        let zip_err = |e: zip::result::ZipError| UvTableError::Zip(e, path.to_path_buf());
        let file = File::create(path).map_err(write_err)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        for (name, data) in [("u", &self.u[..]), ("v", &self.v[..])] {
            zip.start_file(format!("{}.npy", name), FileOptions::default())
                .map_err(zip_err)?;
            write_npy(&mut zip, data).map_err(write_err)?;
        }
        zip.start_file("V.npy", FileOptions::default())
            .map_err(zip_err)?;
        write_npy(&mut zip, &self.vis[..]).map_err(write_err)?;
        zip.start_file("weights.npy", FileOptions::default())
            .map_err(zip_err)?;
        write_npy(&mut zip, &self.weights[..]).map_err(write_err)?;
        zip.finish().map_err(zip_err)?;
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.u.len()
    }
    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }
    /// Deprojects the visibilities with the disk geometry
    pub fn deproject(&self, geom: &Geometry) -> Deprojected {
        let (up, vp, vis) = geom.deproject_vis(&self.u, &self.v, &self.vis);
        Deprojected {
            baselines: up.iter().zip(&vp).map(|(u, v)| u.hypot(*v)).collect(),
            up,
            vp,
            vis,
            weights: self.weights.clone(),
        }
    }
}

fn write_npy<W, T>(writer: &mut W, data: &[T]) -> io::Result<()>
where
    W: io::Write,
    T: npyz::AutoSerialize,
{
    let mut npy = npyz::WriteOptions::new()
        .default_dtype()
        .shape(&[data.len() as u64])
        .writer(writer)
        .begin_nd()?;
    for x in data {
        npy.push(x)?;
    }
    npy.finish()
}

/// Deprojected visibilities
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Deprojected {
    pub up: Vec<f64>,
    pub vp: Vec<f64>,
    /// deprojected baseline lengths [wavelength]
    pub baselines: Vec<f64>,
    pub vis: Vec<Complex64>,
    pub weights: Vec<f64>,
}
impl Deprojected {
    /// Bins the visibilities in baseline, see [bin_visibilities]
    pub fn bin(&self, width: f64) -> Result<BinnedVis> {
        bin_visibilities(&self.baselines, &self.vis, &self.weights, width)
    }
}

/// Visibilities averaged in baseline bins
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinnedVis {
    /// weighted mean baseline [wavelength]
    pub uv: Vec<f64>,
    pub vis: Vec<Complex64>,
    /// `1/sqrt(Σw)`
    pub error: Vec<f64>,
    pub count: Vec<usize>,
}
impl BinnedVis {
    pub fn len(&self) -> usize {
        self.uv.len()
    }
    pub fn is_empty(&self) -> bool {
        self.uv.is_empty()
    }
    pub fn real(&self) -> Vec<f64> {
        self.vis.iter().map(|v| v.re).collect()
    }
}

/// Weighted averages of the visibilities in baseline bins of size `width`
///
/// Bins are `[k·width, (k+1)·width)`; empty bins and visibilities with non positive
/// weights are skipped. Bins are returned in increasing baseline order.
pub fn bin_visibilities(
    baselines: &[f64],
    vis: &[Complex64],
    weights: &[f64],
    width: f64,
) -> Result<BinnedVis> {
    if !(width > 0.) {
        return Err(UvTableError::BinWidth(width));
    }
    if vis.len() != baselines.len() || weights.len() != baselines.len() {
        return Err(UvTableError::Length);
    }
    // bin index -> (Σw, Σw·q, Σw·V, n)
    let mut bins: BTreeMap<u64, (f64, f64, Complex64, usize)> = BTreeMap::new();
    for ((&q, &v), &w) in baselines.iter().zip(vis).zip(weights) {
        if !(w > 0.) || !q.is_finite() {
            continue;
        }
        let bin = bins
            .entry((q / width).floor() as u64)
            .or_insert((0., 0., Complex64::new(0., 0.), 0));
        bin.0 += w;
        bin.1 += w * q;
        bin.2 += v * w;
        bin.3 += 1;
    }
    let mut binned = BinnedVis::default();
    for (sum_w, sum_wq, sum_wv, n) in bins.into_values() {
        binned.uv.push(sum_wq / sum_w);
        binned.vis.push(sum_wv / sum_w);
        binned.error.push(sum_w.sqrt().recip());
        binned.count.push(n);
    }
    Ok(binned)
}

/// Joins the visibility text tables `in_paths` into one table and saves it to `out_path`
///
/// Each table has the columns `u v Re(V) Im(V) weights` and possibly extra columns; the
/// rows are stacked in the order of `in_paths` and the column order is preserved.
pub fn concatenate_vis<P: AsRef<Path>, Q: AsRef<Path>>(in_paths: &[P], out_path: Q) -> Result<Table> {
    let mut combined: Option<Table> = None;
    for path in in_paths {
        let path = path.as_ref();
        log::info!("  appending {:?}", path);
        let table = Table::read(path)?;
        match combined.as_mut() {
            Some(combined) => combined.append(&table)?,
            None => combined = Some(table),
        }
    }
    let combined = combined.ok_or(UvTableError::NoTable)?;
    log::info!(
        "  writing {} visibilities to {:?}",
        combined.nrows(),
        out_path.as_ref()
    );
    UvTable::from_table(combined.clone())?.save_npz(out_path)?;
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize, offset: f64) -> Table {
        let columns = (0..6)
            .map(|j| (0..n).map(|i| offset + (10 * j + i) as f64).collect())
            .collect();
        Table::new("u v Re Im w extra", columns).unwrap()
    }

    #[test]
    fn concatenate_two_tables() {
        let dir = tempfile::tempdir().unwrap();
        let (f0, f1) = (dir.path().join("vis0.txt"), dir.path().join("vis1.txt"));
        table(10, 0.).write(&f0).unwrap();
        table(10, 1000.).write(&f1).unwrap();
        let out = dir.path().join("concat.npz");
        let combined = concatenate_vis(&[&f0, &f1], &out).unwrap();
        assert_eq!(combined.nrows(), 20);
        assert_eq!(combined.ncols(), 6);
        assert_eq!(combined.row(0), vec![0., 10., 20., 30., 40., 50.]);
        assert_eq!(
            combined.row(10),
            vec![1000., 1010., 1020., 1030., 1040., 1050.]
        );
        let uv = UvTable::load_npz(&out).unwrap();
        assert_eq!(uv.len(), 20);
        assert_eq!(uv.vis[3], Complex64::new(23., 33.));
        assert_eq!(uv.weights[11], 1041.);
    }

    #[test]
    fn too_few_columns() {
        let dir = tempfile::tempdir().unwrap();
        let f0 = dir.path().join("vis0.txt");
        Table::new("", vec![vec![1.]; 4]).unwrap().write(&f0).unwrap();
        assert!(matches!(
            concatenate_vis(&[&f0], dir.path().join("out.npz")),
            Err(UvTableError::Columns(4))
        ));
        let empty: [&Path; 0] = [];
        assert!(matches!(
            concatenate_vis(&empty, dir.path().join("out.npz")),
            Err(UvTableError::NoTable)
        ));
    }

    #[test]
    fn binning() {
        let q = [10., 15., 25., 55., 58.];
        let vis: Vec<Complex64> = [1., 3., 2., 4., 6.]
            .iter()
            .map(|&re| Complex64::new(re, 0.))
            .collect();
        let w = [1., 1., 4., 1., 0.];
        let binned = bin_visibilities(&q, &vis, &w, 20.).unwrap();
        assert_eq!(binned.uv, vec![12.5, 25., 55.]);
        assert_eq!(binned.real(), vec![2., 2., 4.]);
        assert_eq!(binned.count, vec![2, 1, 1]);
        assert_eq!(binned.error[1], 0.5);
        assert!(bin_visibilities(&q, &vis, &w, 0.).is_err());
    }

    #[test]
    fn face_on_deprojection() {
        let table = UvTable::new(
            vec![3e4, 0.],
            vec![4e4, 1e5],
            vec![Complex64::new(1., 0.); 2],
            vec![1.; 2],
        )
        .unwrap();
        let deprojected = table.deproject(&Geometry::default());
        assert!((deprojected.baselines[0] - 5e4).abs() < 1e-6);
        assert!((deprojected.baselines[1] - 1e5).abs() < 1e-6);
        assert!((deprojected.vis[0] - Complex64::new(1., 0.)).norm() < 1e-12);
    }
}
