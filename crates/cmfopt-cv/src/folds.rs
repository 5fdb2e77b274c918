//! K-fold partitioning of the observed entries of R.
//!
//! The observed coordinates are enumerated in row-major order, optionally
//! shuffled, and cut into `k` contiguous groups. The first `n % k` groups
//! hold one extra item. Every observed entry lands in exactly one fold's
//! held-out set; missing entries never enter any fold.

use cmfopt_core::{
    error::{CmfError, Result},
    types::{shape_string, DMatrix, Scalar},
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

/// K-fold splitter over item indices `0..n_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KFold {
    /// Number of folds (at least 2)
    pub n_folds: usize,
    /// Permute the items before cutting
    pub shuffle: bool,
    /// Seed of the permutation (None = entropy)
    pub seed: Option<u64>,
}

impl KFold {
    /// Creates a shuffling splitter with `n_folds` folds.
    pub fn new(n_folds: usize) -> Self {
        Self {
            n_folds,
            shuffle: true,
            seed: None,
        }
    }

    /// Enables or disables shuffling.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Fixes the permutation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Splits `0..n_items` into `n_folds` disjoint held-out groups.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if `n_folds < 2` or `n_folds > n_items`.
    pub fn split(&self, n_items: usize) -> Result<Vec<Vec<usize>>> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.split_with_rng(n_items, &mut rng)
    }

    /// Like [`split`](Self::split), drawing the permutation from `rng`
    /// instead of `self.seed`.
    pub fn split_with_rng<R: Rng + ?Sized>(&self, n_items: usize, rng: &mut R) -> Result<Vec<Vec<usize>>> {
        self.validate(n_items)?;

        let mut indices: Vec<usize> = (0..n_items).collect();
        if self.shuffle {
            indices.shuffle(rng);
        }

        let base = n_items / self.n_folds;
        let extra = n_items % self.n_folds;
        let mut folds = Vec::with_capacity(self.n_folds);
        let mut start = 0;
        for k in 0..self.n_folds {
            let size = base + usize::from(k < extra);
            folds.push(indices[start..start + size].to_vec());
            start += size;
        }

        Ok(folds)
    }

    fn validate(&self, n_items: usize) -> Result<()> {
        if self.n_folds < 2 {
            return Err(CmfError::invalid_configuration(
                "cross-validation needs at least 2 folds",
                "n_folds",
                self.n_folds.to_string(),
            ));
        }
        if self.n_folds > n_items {
            return Err(CmfError::invalid_configuration(
                format!("cannot split {n_items} observed entries into {} folds", self.n_folds),
                "n_folds",
                self.n_folds.to_string(),
            ));
        }
        Ok(())
    }
}

/// Train and held-out masks of R for one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldMasks<T: Scalar> {
    /// Observed entries outside the fold
    pub weight_train: DMatrix<T>,
    /// Exactly the fold's entries
    pub weight_test: DMatrix<T>,
}

impl<T: Scalar> FoldMasks<T> {
    /// Builds the masks of the fold holding `coords[i]` for each `i` in
    /// `test_indices`.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if an index is out of range or names an entry
    /// that is not observed in `weight_r`.
    pub fn build(weight_r: &DMatrix<T>, coords: &[(usize, usize)], test_indices: &[usize]) -> Result<Self> {
        let (m, n) = weight_r.shape();
        let mut weight_train = weight_r.clone();
        let mut weight_test = DMatrix::zeros(m, n);

        for &index in test_indices {
            let &(i, j) = coords.get(index).ok_or_else(|| {
                CmfError::invalid_configuration(
                    format!("fold index out of range for {} observed entries", coords.len()),
                    "test_indices",
                    index.to_string(),
                )
            })?;
            if i >= m || j >= n || weight_r[(i, j)] != T::one() {
                return Err(CmfError::invalid_configuration(
                    format!("({i}, {j}) is not an observed entry of a {} matrix", shape_string((m, n))),
                    "coords",
                    index.to_string(),
                ));
            }
            weight_train[(i, j)] = T::zero();
            weight_test[(i, j)] = T::one();
        }

        Ok(Self {
            weight_train,
            weight_test,
        })
    }

    /// Number of held-out entries.
    pub fn n_test(&self) -> usize {
        self.weight_test.iter().filter(|&&w| w == T::one()).count()
    }
}
