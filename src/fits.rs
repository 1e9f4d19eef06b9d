//! FITS primary image reader and writer
//!
//! Only the primary HDU is read. Degenerate axes beyond the second one (frequency and
//! Stokes axes of CASA images) are allowed and the first plane is returned.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::image::Image;

const BLOCK: usize = 2880;
const CARD: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("failed to read {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to write {1:?}")]
    Write(#[source] io::Error, PathBuf),
    #[error("{0:?} has no END card")]
    NoEnd(PathBuf),
    #[error("missing keyword {0} in {1:?}")]
    MissingKey(String, PathBuf),
    #[error("invalid value {1:?} for keyword {0}")]
    InvalidValue(String, String),
    #[error("unsupported BITPIX {0}")]
    Bitpix(i64),
    #[error("{0:?} is truncated: expected {1} bytes of data")]
    Truncated(PathBuf, usize),
    #[error("image in {0:?} has fewer than 2 axes")]
    NotAnImage(PathBuf),
}
type Result<T> = std::result::Result<T, FitsError>;

/// Gaussian restoring beam, FWHMs and position angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    /// major axis FWHM [arcsec]
    pub bmaj: f64,
    /// minor axis FWHM [arcsec]
    pub bmin: f64,
    /// position angle [deg]
    pub bpa: f64,
}

/// Header keyword values, keyed by keyword name
#[derive(Debug, Default, Clone)]
pub struct Header(BTreeMap<String, String>);
impl Header {
    fn parse(bytes: &[u8]) -> Option<(Self, usize)> {
        let mut cards = BTreeMap::new();
        for (k, card) in bytes.chunks(CARD).enumerate() {
            let card = String::from_utf8_lossy(card);
            let keyword = card.get(..8).unwrap_or(&card).trim().to_string();
            if keyword == "END" {
                let n_blocks = (k + 1) * CARD / BLOCK + usize::from((k + 1) * CARD % BLOCK > 0);
                return Some((Self(cards), n_blocks * BLOCK));
            }
            if card.get(8..10) == Some("= ") {
                cards.insert(keyword, parse_value(&card[10..]));
            }
        }
        None
    }
    /// Raw value of a keyword, string values without quotes
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }
    pub fn float(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)
            .map(|value| {
                value
                    .replace('D', "E")
                    .parse::<f64>()
                    .map_err(|_| FitsError::InvalidValue(key.to_string(), value.to_string()))
            })
            .transpose()
    }
    pub fn int(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)
            .map(|value| {
                value
                    .parse::<i64>()
                    .map_err(|_| FitsError::InvalidValue(key.to_string(), value.to_string()))
            })
            .transpose()
    }
}
fn parse_value(raw: &str) -> String {
    let raw = raw.trim_start();
    if let Some(quoted) = raw.strip_prefix('\'') {
        quoted
            .split('\'')
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string()
    } else {
        raw.split('/').next().unwrap_or_default().trim().to_string()
    }
}

/// A FITS primary image with its header
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub image: Image,
    pub header: Header,
}
impl FitsImage {
    /// Reads the primary image of a FITS file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("reading {:?}", path);
        let mut bytes = vec![];
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|e| FitsError::Io(e, path.to_path_buf()))?;
        let (header, data_start) =
            Header::parse(&bytes).ok_or_else(|| FitsError::NoEnd(path.to_path_buf()))?;

        let required = |key: &str| -> Result<i64> {
            header
                .int(key)?
                .ok_or_else(|| FitsError::MissingKey(key.to_string(), path.to_path_buf()))
        };
        let bitpix = required("BITPIX")?;
        if required("NAXIS")? < 2 {
            return Err(FitsError::NotAnImage(path.to_path_buf()));
        }
        let axis = |key: &str| -> Result<usize> {
            let n = required(key)?;
            usize::try_from(n)
                .map_err(|_| FitsError::InvalidValue(key.to_string(), n.to_string()))
        };
        let nx = axis("NAXIS1")?;
        let ny = axis("NAXIS2")?;
        let bscale = header.float("BSCALE")?.unwrap_or(1.);
        let bzero = header.float("BZERO")?.unwrap_or(0.);

        let width = match bitpix {
            8 => 1,
            16 => 2,
            32 | -32 => 4,
            64 | -64 => 8,
            _ => return Err(FitsError::Bitpix(bitpix)),
        };
        let n_bytes = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(width))
            .ok_or_else(|| FitsError::InvalidValue("NAXIS".into(), format!("{nx} x {ny}")))?;
        let data = data_start
            .checked_add(n_bytes)
            .and_then(|end| bytes.get(data_start..end))
            .ok_or_else(|| FitsError::Truncated(path.to_path_buf(), n_bytes))?;
        let values: Vec<f64> = data
            .chunks_exact(width)
            .map(|b| {
                let raw = match bitpix {
                    8 => b[0] as f64,
                    16 => i16::from_be_bytes([b[0], b[1]]) as f64,
                    32 => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                    -32 => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                    64 => i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                        as f64,
                    _ => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                };
                bzero + bscale * raw
            })
            .collect();
        let image = Image::new(nx, ny, values).ok_or_else(|| FitsError::NotAnImage(path.to_path_buf()))?;
        Ok(Self { image, header })
    }
    /// Restoring beam from the `BMAJ`, `BMIN` and `BPA` keywords
    pub fn beam(&self) -> Result<Option<Beam>> {
        match (self.header.float("BMAJ")?, self.header.float("BMIN")?) {
            (Some(bmaj), Some(bmin)) => Ok(Some(Beam {
                bmaj: bmaj * 3600.,
                bmin: bmin * 3600.,
                bpa: self.header.float("BPA")?.unwrap_or_default(),
            })),
            _ => Ok(None),
        }
    }
}

/// Writes `image` as the 64 bit float primary image of a FITS file
pub fn write_image<P: AsRef<Path>>(path: P, image: &Image, beam: Option<Beam>) -> Result<()> {
    let path = path.as_ref();
    let (nx, ny) = image.shape();
    let mut cards = vec![
        card("SIMPLE", "T"),
        card("BITPIX", "-64"),
        card("NAXIS", "2"),
        card("NAXIS1", &nx.to_string()),
        card("NAXIS2", &ny.to_string()),
    ];
    if let Some(Beam { bmaj, bmin, bpa }) = beam {
        cards.push(card("BMAJ", &format!("{:E}", bmaj / 3600.)));
        cards.push(card("BMIN", &format!("{:E}", bmin / 3600.)));
        cards.push(card("BPA", &format!("{:E}", bpa)));
    }
    cards.push(format!("{:<80}", "END"));

    let mut header = cards.concat().into_bytes();
    header.resize(header.len().div_ceil(BLOCK) * BLOCK, b' ');
    let mut data: Vec<u8> = image
        .to_row_major()
        .into_iter()
        .flat_map(|x| x.to_be_bytes())
        .collect();
    data.resize(data.len().div_ceil(BLOCK) * BLOCK, 0);

    File::create(path)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            writer.write_all(&header)?;
            writer.write_all(&data)?;
            writer.flush()
        })
        .map_err(|e| FitsError::Write(e, path.to_path_buf()))
}
fn card(key: &str, value: &str) -> String {
    format!("{:<80}", format!("{:<8}= {:>20}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_with_beam() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.fits");
        let image = Image::from_fn(5, 3, |i, j| i as f64 - 0.25 * j as f64);
        let beam = Beam {
            bmaj: 0.5,
            bmin: 0.4,
            bpa: -12.,
        };
        write_image(&path, &image, Some(beam)).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len() % BLOCK as u64, 0);
        let fits = FitsImage::open(&path).unwrap();
        assert_eq!(fits.image, image);
        let read_beam = fits.beam().unwrap().unwrap();
        assert!((read_beam.bmaj - 0.5).abs() < 1e-9);
        assert!((read_beam.bmin - 0.4).abs() < 1e-9);
        assert_eq!(read_beam.bpa, -12.);
    }

    #[test]
    fn header_values() {
        let mut bytes = [
            card("SIMPLE", "T"),
            format!("{:<80}", "OBJECT  = 'HD 107146'          / target"),
            format!("{:<80}", "CDELT1  =  -1.388888888889D-05 / deg"),
            format!("{:<80}", "END"),
        ]
        .concat()
        .into_bytes();
        bytes.resize(BLOCK, b' ');
        let (header, start) = Header::parse(&bytes).unwrap();
        assert_eq!(start, BLOCK);
        assert_eq!(header.get("OBJECT"), Some("HD 107146"));
        assert!((header.float("CDELT1").unwrap().unwrap() + 1.388888888889e-5).abs() < 1e-15);
        assert!(header.float("BMAJ").unwrap().is_none());
    }

    #[test]
    fn missing_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.fits");
        std::fs::write(&path, card("SIMPLE", "T")).unwrap();
        assert!(matches!(FitsImage::open(&path), Err(FitsError::NoEnd(_))));
    }

    #[test]
    fn negative_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("negative.fits");
        let mut header = [
            card("SIMPLE", "T"),
            card("BITPIX", "-64"),
            card("NAXIS", "2"),
            card("NAXIS1", "-4"),
            card("NAXIS2", "4"),
            format!("{:<80}", "END"),
        ]
        .concat()
        .into_bytes();
        header.resize(BLOCK, b' ');
        std::fs::write(&path, header).unwrap();
        assert!(matches!(
            FitsImage::open(&path),
            Err(FitsError::InvalidValue(ref key, ref value)) if key == "NAXIS1" && value == "-4"
        ));
    }
}
