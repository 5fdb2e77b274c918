//! Latent factor matrices and their gradients.
//!
//! R ≈ U·Vᵗ + mu, D ≈ U·Pᵗ and S ≈ V·Qᵗ: the row entities share U between R
//! and D, the column entities share V between R and S.

use crate::{
    data::Dimensions,
    types::{DMatrix, Scalar},
};
use num_traits::Float;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// The four factor matrices U (m×f), V (n×f), P (l×f) and Q (h×f).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatentFactors<T: Scalar> {
    /// Row-entity embeddings
    pub u: DMatrix<T>,
    /// Column-entity embeddings
    pub v: DMatrix<T>,
    /// Row-attribute embeddings
    pub p: DMatrix<T>,
    /// Column-attribute embeddings
    pub q: DMatrix<T>,
}

/// Partial derivatives of the loss with respect to each factor matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients<T: Scalar> {
    /// ∂L/∂U
    pub u: DMatrix<T>,
    /// ∂L/∂V
    pub v: DMatrix<T>,
    /// ∂L/∂P
    pub p: DMatrix<T>,
    /// ∂L/∂Q
    pub q: DMatrix<T>,
}

impl<T: Scalar> LatentFactors<T> {
    /// Draws every entry i.i.d. from uniform[0, 1), in the order U, P, V, Q.
    pub fn random<R: Rng + ?Sized>(dims: Dimensions, rank: usize, rng: &mut R) -> Self {
        let uniform = Uniform::new(0.0_f64, 1.0_f64);

        let u = uniform_matrix(dims.m, rank, &uniform, rng);
        let p = uniform_matrix(dims.l, rank, &uniform, rng);
        let v = uniform_matrix(dims.n, rank, &uniform, rng);
        let q = uniform_matrix(dims.h, rank, &uniform, rng);

        Self { u, v, p, q }
    }

    /// Constant-valued factors, mostly useful for tests.
    pub fn from_element(dims: Dimensions, rank: usize, value: T) -> Self {
        Self {
            u: DMatrix::from_element(dims.m, rank, value),
            v: DMatrix::from_element(dims.n, rank, value),
            p: DMatrix::from_element(dims.l, rank, value),
            q: DMatrix::from_element(dims.h, rank, value),
        }
    }

    /// Shared embedding dimension f.
    pub fn rank(&self) -> usize {
        self.u.ncols()
    }

    /// Problem sizes implied by the factor shapes.
    pub fn dims(&self) -> Dimensions {
        Dimensions {
            m: self.u.nrows(),
            n: self.v.nrows(),
            l: self.p.nrows(),
            h: self.q.nrows(),
        }
    }

    /// Candidate state `current − gamma·gradient`, all four matrices together.
    pub fn step(&self, gradients: &Gradients<T>, gamma: T) -> Self {
        Self {
            u: &self.u - &gradients.u * gamma,
            v: &self.v - &gradients.v * gamma,
            p: &self.p - &gradients.p * gamma,
            q: &self.q - &gradients.q * gamma,
        }
    }

    /// Squared Frobenius norms (‖U‖², ‖V‖², ‖P‖², ‖Q‖²).
    pub fn squared_norms(&self) -> [T; 4] {
        [
            self.u.norm_squared(),
            self.v.norm_squared(),
            self.p.norm_squared(),
            self.q.norm_squared(),
        ]
    }
}

impl<T: Scalar> Gradients<T> {
    /// Frobenius norm of the stacked gradient.
    pub fn norm(&self) -> T {
        let total = self.u.norm_squared()
            + self.v.norm_squared()
            + self.p.norm_squared()
            + self.q.norm_squared();
        <T as Float>::sqrt(total)
    }
}

fn uniform_matrix<T: Scalar, R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    uniform: &Uniform<f64>,
    rng: &mut R,
) -> DMatrix<T> {
    DMatrix::from_fn(rows, cols, |_, _| <T as Scalar>::from_f64(uniform.sample(&mut *rng)))
}
