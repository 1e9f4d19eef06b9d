use nalgebra::DMatrix;

/// A 2D image of `ny` rows by `nx` columns
///
/// Rows run along declination (south to north) and columns along right ascension,
/// with RA increasing toward lower column indices as in FITS images of the sky.
#[derive(Debug, Clone, PartialEq)]
pub struct Image(DMatrix<f64>);
impl From<DMatrix<f64>> for Image {
    fn from(matrix: DMatrix<f64>) -> Self {
        Self(matrix)
    }
}
impl Image {
    /// Wraps the row major `data` into a `nx` by `ny` image, returns `None` if the sizes disagree
    pub fn new(nx: usize, ny: usize, data: Vec<f64>) -> Option<Self> {
        (nx * ny == data.len()).then(|| Self(DMatrix::from_row_slice(ny, nx, &data)))
    }
    /// Builds an image from the value of `f(row, column)`
    pub fn from_fn<F>(nx: usize, ny: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> f64,
    {
        Self(DMatrix::from_fn(ny, nx, f))
    }
    /// Image size as `(nx, ny)`
    pub fn shape(&self) -> (usize, usize) {
        (self.nx(), self.ny())
    }
    pub fn nx(&self) -> usize {
        self.0.ncols()
    }
    pub fn ny(&self) -> usize {
        self.0.nrows()
    }
    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.0[(row, column)]
    }
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.0
    }
    /// Pixels in row major order
    pub fn to_row_major(&self) -> Vec<f64> {
        self.0.transpose().as_slice().to_vec()
    }
    /// Iterator over `(row, column, value)` in row major order
    pub fn indexed_iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.ny()).flat_map(move |i| (0..self.nx()).map(move |j| (i, j, self.0[(i, j)])))
    }
    /// Applies `f` to every pixel
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self(self.0.map(f))
    }
    /// Largest absolute pixel value, NaN pixels are ignored
    pub fn max_abs(&self) -> f64 {
        self.0
            .iter()
            .filter(|x| !x.is_nan())
            .fold(0f64, |m, x| m.max(x.abs()))
    }
    /// Largest pixel value, NaN pixels are ignored
    pub fn max(&self) -> f64 {
        self.0
            .iter()
            .filter(|x| !x.is_nan())
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }
    /// Smallest pixel value, NaN pixels are ignored
    pub fn min(&self) -> f64 {
        self.0
            .iter()
            .filter(|x| !x.is_nan())
            .cloned()
            .fold(f64::INFINITY, f64::min)
    }
    /// Sky offset [arcsec] of a column center from the image center, positive toward east
    pub fn x_offset(&self, column: usize, pixel_scale: f64) -> f64 {
        ((self.nx() as f64 - 1.) * 0.5 - column as f64) * pixel_scale
    }
    /// Sky offset [arcsec] of a row center from the image center, positive toward north
    pub fn y_offset(&self, row: usize, pixel_scale: f64) -> f64 {
        (row as f64 - (self.ny() as f64 - 1.) * 0.5) * pixel_scale
    }
    /// Half size [arcsec] of the image field along x
    pub fn half_extent(&self, pixel_scale: f64) -> f64 {
        self.nx() as f64 * pixel_scale * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_mirror_symmetric() {
        let image = Image::from_fn(6, 6, |i, j| (i * 6 + j) as f64);
        for j in 0..6 {
            assert_eq!(image.x_offset(j, 0.1), -image.x_offset(5 - j, 0.1));
            assert_eq!(image.y_offset(j, 0.1), -image.y_offset(5 - j, 0.1));
        }
        assert!(image.x_offset(0, 1.) > 0.);
        assert_eq!(image.get(2, 3), 15.);
    }

    #[test]
    fn extrema_skip_nan() {
        let image = Image::new(2, 2, vec![1., f64::NAN, -3., 2.]).unwrap();
        assert_eq!(image.max(), 2.);
        assert_eq!(image.min(), -3.);
        assert_eq!(image.max_abs(), 3.);
        assert!(Image::new(3, 2, vec![0.; 5]).is_none());
    }

    #[test]
    fn row_major_layout() {
        let data: Vec<f64> = (0..6).map(f64::from).collect();
        let image = Image::new(3, 2, data.clone()).unwrap();
        assert_eq!(image.shape(), (3, 2));
        assert_eq!(image.get(1, 0), 3.);
        assert_eq!(image.to_row_major(), data);
        let values: Vec<f64> = image.indexed_iter().map(|(_, _, x)| x).collect();
        assert_eq!(values, data);
    }
}
