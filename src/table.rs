//! Whitespace delimited text tables and numpy arrays

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use npyz::{NpyFile, Order, WriterBuilder};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read {1:?}")]
    Read(#[source] io::Error, PathBuf),
    #[error("failed to write {1:?}")]
    Write(#[source] io::Error, PathBuf),
    #[error("failed to parse table {1:?}")]
    Csv(#[source] csv::Error, PathBuf),
    #[error("invalid number {0:?} in {1:?}")]
    Number(String, PathBuf),
    #[error("row {0} of {1:?} has {2} columns, expected {3}")]
    Ragged(usize, PathBuf, usize, usize),
    #[error("columns have different lengths")]
    ColumnLength,
    #[error("array {0} is missing from {1:?}")]
    MissingArray(String, PathBuf),
    #[error("expected {0} columns, found {1}")]
    Columns(usize, usize),
}
type Result<T> = std::result::Result<T, TableError>;

/// A table of floating point columns with a free text header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<String>,
    columns: Vec<Vec<f64>>,
}
impl Table {
    /// Creates a table from columns of identical length
    pub fn new<S: AsRef<str>>(header: S, columns: Vec<Vec<f64>>) -> Result<Self> {
        if columns.windows(2).any(|w| w[0].len() != w[1].len()) {
            return Err(TableError::ColumnLength);
        }
        Ok(Self {
            header: header.as_ref().lines().map(|l| l.to_string()).collect(),
            columns,
        })
    }
    /// Creates a table from rows of identical length
    pub fn from_rows(header: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let ncols = rows.first().map_or(0, |row| row.len());
        if rows.iter().any(|row| row.len() != ncols) {
            return Err(TableError::ColumnLength);
        }
        let columns = (0..ncols)
            .map(|j| rows.iter().map(|row| row[j]).collect())
            .collect();
        Ok(Self { header, columns })
    }
    /// Reads a whitespace delimited table, `#` lines are the header
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("reading {:?}", path);
        let contents =
            fs::read_to_string(path).map_err(|e| TableError::Read(e, path.to_path_buf()))?;
        let header = contents
            .lines()
            .filter_map(|line| line.strip_prefix('#'))
            .map(|line| line.trim().to_string())
            .collect();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(contents.as_bytes());
        let mut rows: Vec<Vec<f64>> = vec![];
        for result in rdr.records() {
            let record = result.map_err(|e| TableError::Csv(e, path.to_path_buf()))?;
            let row = record
                .iter()
                .flat_map(|field| field.split('\t'))
                .map(|field| field.trim())
                .filter(|field| !field.is_empty())
                .map(|field| {
                    field
                        .parse::<f64>()
                        .map_err(|_| TableError::Number(field.to_string(), path.to_path_buf()))
                })
                .collect::<Result<Vec<f64>>>()?;
            if row.is_empty() {
                continue;
            }
            if let Some(first) = rows.first() {
                if first.len() != row.len() {
                    return Err(TableError::Ragged(
                        rows.len(),
                        path.to_path_buf(),
                        row.len(),
                        first.len(),
                    ));
                }
            }
            rows.push(row);
        }
        Self::from_rows(header, &rows)
    }
    /// Writes the table, one row per line, header lines prefixed with `# `
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_err = |e: io::Error| TableError::Write(e, path.to_path_buf());
        let mut buffer = BufWriter::new(File::create(path).map_err(write_err)?);
        for line in &self.header {
            writeln!(buffer, "# {}", line).map_err(write_err)?;
        }
        {
            let mut wtr = csv::WriterBuilder::new()
                .delimiter(b' ')
                .has_headers(false)
                .from_writer(&mut buffer);
            for i in 0..self.nrows() {
                wtr.write_record(self.columns.iter().map(|c| format!("{:.18e}", c[i])))
                    .map_err(|e| TableError::Csv(e, path.to_path_buf()))?;
            }
            wtr.flush().map_err(write_err)?;
        }
        buffer.flush().map_err(write_err)
    }
    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }
    pub fn column(&self, j: usize) -> Option<&[f64]> {
        self.columns.get(j).map(|c| c.as_slice())
    }
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }
    /// Returns the first `n` columns, fails if the table has fewer
    pub fn take_columns(self, n: usize) -> Result<Vec<Vec<f64>>> {
        if self.ncols() < n {
            return Err(TableError::Columns(n, self.ncols()));
        }
        Ok(self.columns.into_iter().take(n).collect())
    }
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }
    /// Appends the rows of `other`, both tables must have the same number of columns
    pub fn append(&mut self, other: &Table) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = other.columns.clone();
            return Ok(());
        }
        if other.ncols() != self.ncols() {
            return Err(TableError::Columns(self.ncols(), other.ncols()));
        }
        self.columns
            .iter_mut()
            .zip(&other.columns)
            .for_each(|(c, o)| c.extend_from_slice(o));
        Ok(())
    }
}

/// A C ordered n-dimensional array of 64 bit floats
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}
impl NpyArray {
    /// Loads a `.npy` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("reading {:?}", path);
        let read_err = |e: io::Error| TableError::Read(e, path.to_path_buf());
        let file = File::open(path).map_err(read_err)?;
        let npy = NpyFile::new(BufReader::new(file)).map_err(read_err)?;
        let shape: Vec<usize> = npy.shape().iter().map(|&n| n as usize).collect();
        let order = npy.order();
        let data: Vec<f64> = npy.into_vec().map_err(read_err)?;
        let data = match order {
            Order::C => data,
            Order::Fortran => from_fortran(&shape, data),
        };
        Ok(Self { shape, data })
    }
    /// Saves the array to a `.npy` file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_err = |e: io::Error| TableError::Write(e, path.to_path_buf());
        let mut file = BufWriter::new(File::create(path).map_err(write_err)?);
        let shape: Vec<u64> = self.shape.iter().map(|&n| n as u64).collect();
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(&shape)
            .writer(&mut file)
            .begin_nd()
            .map_err(write_err)?;
        for x in &self.data {
            writer.push(x).map_err(write_err)?;
        }
        writer.finish().map_err(write_err)?;
        file.flush().map_err(write_err)
    }
    /// Rows of a 2D array
    pub fn rows(&self) -> Vec<&[f64]> {
        match self.shape.as_slice() {
            [_, ncols] if *ncols > 0 => self.data.chunks(*ncols).collect(),
            _ => vec![self.data.as_slice()],
        }
    }
}
fn from_fortran(shape: &[usize], data: Vec<f64>) -> Vec<f64> {
    match shape {
        [nrows, ncols] => (0..*nrows)
            .flat_map(|i| (0..*ncols).map(move |j| j * nrows + i))
            .map(|k| data[k])
            .collect(),
        _ => data,
    }
}
