//! One dimensional linear interpolation

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InterpError {
    #[error("abscissa and ordinate lengths differ: {0} != {1}")]
    Length(usize, usize),
    #[error("cannot interpolate from an empty sequence")]
    Empty,
    #[error("abscissa must be increasing")]
    NotIncreasing,
    #[error("{0} is outside the interpolation range [{1}, {2}]")]
    OutOfRange(f64, f64, f64),
}
type Result<T> = std::result::Result<T, InterpError>;

/// Behavior outside the range of the sampled abscissa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    /// hold the end values
    #[default]
    Clamp,
    /// fail with [InterpError::OutOfRange]
    Strict,
}

/// Linearly interpolates `(xp, fp)` at `x`
///
/// `xp` must be increasing. Values at the nodes of `xp` are returned unchanged.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64], edge: Edge) -> Result<Vec<f64>> {
    if xp.len() != fp.len() {
        return Err(InterpError::Length(xp.len(), fp.len()));
    }
    let (Some(&lo), Some(&hi)) = (xp.first(), xp.last()) else {
        return Err(InterpError::Empty);
    };
    if xp.windows(2).any(|w| w[1] < w[0]) {
        return Err(InterpError::NotIncreasing);
    }
    let n = xp.len();
    let mut clamped = 0usize;
    let values = x
        .iter()
        .map(|&xi| {
            if xi < lo || xi > hi {
                if edge == Edge::Strict {
                    return Err(InterpError::OutOfRange(xi, lo, hi));
                }
                clamped += 1;
            }
            let j = xp.partition_point(|&v| v <= xi);
            Ok(match j {
                0 => fp[0],
                j if j == n => fp[n - 1],
                j => {
                    let (x0, x1) = (xp[j - 1], xp[j]);
                    if xi == x0 {
                        fp[j - 1]
                    } else {
                        fp[j - 1] + (xi - x0) * (fp[j] - fp[j - 1]) / (x1 - x0)
                    }
                }
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    if clamped > 0 {
        log::warn!(
            "{} point(s) outside [{:.4}, {:.4}] held at the end values",
            clamped,
            lo,
            hi
        );
    }
    Ok(values)
}
