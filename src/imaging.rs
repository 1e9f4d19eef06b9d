//! Dirty images of visibility tables
//!
//! Visibilities and their Hermitian conjugates are gridded onto the nearest cell of a
//! `npix × npix` Fourier grid and inverse transformed with an FFT. Images are in Jy per
//! dirty beam, east to the left and north up.

use nalgebra::DMatrix;
use rustfft::{num_complex::Complex64, FftPlanner};

use crate::{image::Image, units::ARCSEC, uvtable::UvTable};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ImagingError {
    #[error("image size must be an even number of pixels, found {0}")]
    Npix(usize),
    #[error("cell size must be positive, found {0}")]
    CellSize(f64),
    #[error("none of the visibilities fall onto the Fourier grid")]
    EmptyGrid,
}
type Result<T> = std::result::Result<T, ImagingError>;

/// Dirty imager
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirtyImager {
    npix: usize,
    /// [arcsec]
    cell_size: f64,
}
impl DirtyImager {
    pub fn new(npix: usize, cell_size: f64) -> Result<Self> {
        if npix == 0 || npix % 2 != 0 {
            return Err(ImagingError::Npix(npix));
        }
        if !(cell_size > 0.) {
            return Err(ImagingError::CellSize(cell_size));
        }
        Ok(Self { npix, cell_size })
    }
    /// Fourier grid cell size [wavelength]
    pub fn uv_cell(&self) -> f64 {
        1. / (self.npix as f64 * self.cell_size * ARCSEC)
    }
    /// Grid cell `(row, column)` in FFT order of the baseline `(u, v)`
    fn cell(&self, u: f64, v: f64) -> Option<(usize, usize)> {
        let n = self.npix as i64;
        let du = self.uv_cell();
        let (iu, iv) = ((u / du).round() as i64, (v / du).round() as i64);
        if iu.abs() >= n / 2 || iv.abs() >= n / 2 {
            return None;
        }
        Some((iv.rem_euclid(n) as usize, iu.rem_euclid(n) as usize))
    }
    /// Dirty image [Jy/dirty beam] of the visibilities with Briggs weighting
    pub fn dirty_image(&self, table: &UvTable, robust: f64) -> Result<Image> {
        let n = self.npix;
        // gridded visibilities and their conjugates
        let points: Vec<((usize, usize), Complex64, f64)> = table
            .u
            .iter()
            .zip(&table.v)
            .zip(&table.vis)
            .zip(&table.weights)
            .filter(|(_, w)| **w > 0.)
            .flat_map(|(((&u, &v), &vis), &w)| {
                [
                    self.cell(u, v).map(|k| (k, vis, w)),
                    self.cell(-u, -v).map(|k| (k, vis.conj(), w)),
                ]
            })
            .flatten()
            .collect();
        if points.is_empty() {
            return Err(ImagingError::EmptyGrid);
        }

        let mut cell_weights = DMatrix::<f64>::zeros(n, n);
        points.iter().for_each(|&(k, _, w)| cell_weights[k] += w);
        let sum_w: f64 = points.iter().map(|(_, _, w)| w).sum();
        let f2 = (5. * 10f64.powf(-robust)).powi(2) / (cell_weights.norm_squared() / sum_w);

        let mut grid = DMatrix::from_element(n, n, Complex64::new(0., 0.));
        let mut sum_weights = 0f64;
        for &(k, vis, w) in &points {
            let w = w / (1. + cell_weights[k] * f2);
            grid[k] += vis * w;
            sum_weights += w;
        }

        inverse_fft2(&mut grid);
        let half = n / 2;
        Ok(Image::from_fn(n, n, |i, j| {
            // fftshift with RA increasing to the left
            let km = (i + half) % n;
            let kl = ((n - j) % n + half) % n;
            grid[(km, kl)].re / sum_weights
        }))
    }
}

/// In place 2D inverse FFT of a square grid, one axis after the other
fn inverse_fft2(grid: &mut DMatrix<Complex64>) {
    let ifft = FftPlanner::<f64>::new().plan_fft_inverse(grid.nrows());
    for _ in 0..2 {
        grid.column_iter_mut()
            .for_each(|mut column| ifft.process(column.as_mut_slice()));
        grid.transpose_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn point_source(imager: &DirtyImager, l0_pixels: f64) -> UvTable {
        let du = imager.uv_cell();
        let l0 = l0_pixels * imager.cell_size * ARCSEC;
        let mut table = UvTable::default();
        for a in -10i32..=10 {
            for b in 1i32..=10 {
                let (u, v) = (a as f64 * du, b as f64 * du);
                table.u.push(u);
                table.v.push(v);
                table
                    .vis
                    .push(Complex64::from_polar(1., -2. * PI * u * l0));
                table.weights.push(1. + (a.abs() % 3) as f64);
            }
        }
        table
    }

    fn argmax(image: &Image) -> (usize, usize, f64) {
        image
            .indexed_iter()
            .fold((0, 0, f64::NEG_INFINITY), |acc, (i, j, x)| {
                if x > acc.2 {
                    (i, j, x)
                } else {
                    acc
                }
            })
    }

    #[test]
    fn centered_point_source() {
        let imager = DirtyImager::new(64, 0.05).unwrap();
        let table = point_source(&imager, 0.);
        for robust in [-2., 0.5, 2.] {
            let image = imager.dirty_image(&table, robust).unwrap();
            let (i, j, peak) = argmax(&image);
            assert_eq!((i, j), (32, 32));
            assert!((peak - 1.).abs() < 1e-9);
        }
    }

    #[test]
    fn east_offset_point_source() {
        let imager = DirtyImager::new(64, 0.05).unwrap();
        let table = point_source(&imager, 3.);
        let image = imager.dirty_image(&table, 2.).unwrap();
        let (i, j, peak) = argmax(&image);
        assert_eq!((i, j), (32, 29));
        assert!((peak - 1.).abs() < 1e-9);
        assert!(image.x_offset(j, 0.05) > 0.);
    }

    #[test]
    fn invalid_imager() {
        assert_eq!(DirtyImager::new(63, 0.05), Err(ImagingError::Npix(63)));
        assert_eq!(DirtyImager::new(64, 0.), Err(ImagingError::CellSize(0.)));
        let imager = DirtyImager::new(8, 0.05).unwrap();
        let table = UvTable::new(vec![1e9], vec![0.], vec![Complex64::new(1., 0.)], vec![1.])
            .unwrap();
        assert_eq!(
            imager.dirty_image(&table, 0.5),
            Err(ImagingError::EmptyGrid)
        );
    }
}
