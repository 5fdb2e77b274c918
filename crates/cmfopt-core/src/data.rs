//! Input matrices and their observation masks.
//!
//! The primary matrix R (m×n) is only partially observed. The side matrices
//! D (m×l) and S (n×h) reach the core already imputed; their masks still
//! record which entries were originally observed. Every mask holds 1.0 for
//! an observed entry and 0.0 for a missing one.

use crate::{
    error::{CmfError, Result},
    types::{shape_string, DMatrix, DVector, Scalar},
};
use num_traits::Float;

/// Problem sizes shared by the factor matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimensions {
    /// Rows of R and D (row entities)
    pub m: usize,
    /// Columns of R, rows of S (column entities)
    pub n: usize,
    /// Columns of D (row-entity attributes)
    pub l: usize,
    /// Columns of S (column-entity attributes)
    pub h: usize,
}

/// Read-only inputs of a factorization: R, D, S and their weight masks.
#[derive(Debug, Clone)]
pub struct CmfData<T: Scalar> {
    r: DMatrix<T>,
    d: DMatrix<T>,
    s: DMatrix<T>,
    weight_r: DMatrix<T>,
    weight_d: DMatrix<T>,
    weight_s: DMatrix<T>,
}

impl<T: Scalar> CmfData<T> {
    /// Creates a data set from matrices whose missing entries are already
    /// zeroed and described by the given masks.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if D does not have m rows, S does not have n rows
    ///   or a mask does not match its matrix
    /// - `InvalidConfiguration` if a mask holds a value other than 0 or 1
    /// - `NumericalDegeneracy` if a matrix holds a NaN or infinite value
    pub fn new(
        r: DMatrix<T>,
        d: DMatrix<T>,
        s: DMatrix<T>,
        weight_r: DMatrix<T>,
        weight_d: DMatrix<T>,
        weight_s: DMatrix<T>,
    ) -> Result<Self> {
        if d.nrows() != r.nrows() {
            return Err(CmfError::dimension_mismatch(
                "D",
                format!("{} rows", r.nrows()),
                format!("{} rows", d.nrows()),
            ));
        }
        if s.nrows() != r.ncols() {
            return Err(CmfError::dimension_mismatch(
                "S",
                format!("{} rows", r.ncols()),
                format!("{} rows", s.nrows()),
            ));
        }

        for (name, matrix, mask) in [
            ("WeightR", &r, &weight_r),
            ("WeightD", &d, &weight_d),
            ("WeightS", &s, &weight_s),
        ] {
            check_mask(name, matrix.shape(), mask)?;
        }

        for (name, matrix) in [("R", &r), ("D", &d), ("S", &s)] {
            if let Some(pos) = matrix.iter().position(|&x| !<T as Float>::is_finite(x)) {
                let (i, j) = (pos % matrix.nrows(), pos / matrix.nrows());
                return Err(CmfError::numerical_degeneracy(
                    name,
                    format!("non-finite entry at ({i}, {j}); missing values must be zeroed and masked"),
                ));
            }
        }

        Ok(Self {
            r,
            d,
            s,
            weight_r,
            weight_d,
            weight_s,
        })
    }

    /// Builds a data set from raw matrices that mark missing values with NaN.
    ///
    /// Each mask is 1 where the raw value is finite and 0 where it is NaN;
    /// the NaN entries are then replaced by 0.
    pub fn from_raw(r: DMatrix<T>, d: DMatrix<T>, s: DMatrix<T>) -> Result<Self> {
        let (r, weight_r) = extract_observed(r);
        let (d, weight_d) = extract_observed(d);
        let (s, weight_s) = extract_observed(s);
        Self::new(r, d, s, weight_r, weight_d, weight_s)
    }

    /// Creates a data set whose side matrices are fully observed.
    pub fn with_dense_side(
        r: DMatrix<T>,
        weight_r: DMatrix<T>,
        d: DMatrix<T>,
        s: DMatrix<T>,
    ) -> Result<Self> {
        let weight_d = DMatrix::from_element(d.nrows(), d.ncols(), T::one());
        let weight_s = DMatrix::from_element(s.nrows(), s.ncols(), T::one());
        Self::new(r, d, s, weight_r, weight_d, weight_s)
    }

    /// Problem sizes (m, n, l, h).
    pub fn dims(&self) -> Dimensions {
        Dimensions {
            m: self.r.nrows(),
            n: self.r.ncols(),
            l: self.d.ncols(),
            h: self.s.ncols(),
        }
    }

    /// The primary matrix R.
    pub fn r(&self) -> &DMatrix<T> {
        &self.r
    }

    /// The row-entity attribute matrix D.
    pub fn d(&self) -> &DMatrix<T> {
        &self.d
    }

    /// The column-entity attribute matrix S.
    pub fn s(&self) -> &DMatrix<T> {
        &self.s
    }

    /// Observation mask of R.
    pub fn weight_r(&self) -> &DMatrix<T> {
        &self.weight_r
    }

    /// Observation mask of D.
    pub fn weight_d(&self) -> &DMatrix<T> {
        &self.weight_d
    }

    /// Observation mask of S.
    pub fn weight_s(&self) -> &DMatrix<T> {
        &self.weight_s
    }

    /// Coordinates of the observed entries of R in row-major order.
    pub fn observed_entries(&self) -> Vec<(usize, usize)> {
        let (m, n) = self.weight_r.shape();
        (0..m)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.weight_r[(i, j)] == T::one())
            .collect()
    }

    /// Number of observed entries of R.
    pub fn n_observed(&self) -> usize {
        self.weight_r.iter().filter(|&&w| w == T::one()).count()
    }

    /// Checks that `mask` has the shape of R.
    pub fn check_r_mask(&self, name: &str, mask: &DMatrix<T>) -> Result<()> {
        check_mask(name, self.r.shape(), mask)
    }
}

/// Per-row mean of the entries of `r` selected by `weight`.
///
/// Rows without any selected entry get a zero bias.
pub fn row_bias<T: Scalar>(r: &DMatrix<T>, weight: &DMatrix<T>) -> DVector<T> {
    let sums = r.component_mul(weight).column_sum();
    let counts = weight.column_sum();
    sums.zip_map(&counts, |sum, count| {
        if count > T::zero() {
            sum / count
        } else {
            T::zero()
        }
    })
}

fn check_mask<T: Scalar>(name: &str, shape: (usize, usize), mask: &DMatrix<T>) -> Result<()> {
    if mask.shape() != shape {
        return Err(CmfError::dimension_mismatch(
            name,
            shape_string(shape),
            shape_string(mask.shape()),
        ));
    }
    if let Some(w) = mask.iter().find(|&&w| w != T::zero() && w != T::one()) {
        return Err(CmfError::invalid_configuration(
            "weight masks may only hold 0 or 1",
            name,
            w.to_string(),
        ));
    }
    Ok(())
}

fn extract_observed<T: Scalar>(mut raw: DMatrix<T>) -> (DMatrix<T>, DMatrix<T>) {
    let weight = raw.map(|x| if <T as Float>::is_nan(x) { T::zero() } else { T::one() });
    raw.apply(|x| {
        if <T as Float>::is_nan(*x) {
            *x = T::zero();
        }
    });
    (raw, weight)
}
