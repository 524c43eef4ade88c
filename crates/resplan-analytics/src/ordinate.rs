// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::{
    distance::{DistanceMatrix, DistanceMethod, Subject, distance, subject_rows},
    err::{AnalyticsError, DegenerateInputError},
};
use nalgebra::{DMatrix, SymmetricEigen};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use resplan_model::prelude::Portfolio;
use serde::{Deserialize, Serialize};

/// Relative eigenvalue below which an axis is treated as empty.
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdsConfig {
    pub dims: usize,
    pub seed: u64,
    pub max_iterations: usize,
    /// Relative stress improvement below which iteration stops.
    pub tolerance: f64,
    /// Used when ordinating a portfolio directly.
    pub distance: DistanceMethod,
}

impl Default for MdsConfig {
    #[inline]
    fn default() -> Self {
        Self {
            dims: 2,
            seed: 42,
            max_iterations: 300,
            tolerance: 1e-9,
            distance: DistanceMethod::BrayCurtis,
        }
    }
}

impl MdsConfig {
    #[inline]
    pub fn with_dims(mut self, dims: usize) -> Self {
        self.dims = dims;
        self
    }

    #[inline]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[inline]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[inline]
    pub fn with_distance(mut self, distance: DistanceMethod) -> Self {
        self.distance = distance;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdinationMethod {
    Pca { dims: usize },
    Mds(MdsConfig),
}

impl Default for OrdinationMethod {
    #[inline]
    fn default() -> Self {
        OrdinationMethod::Pca { dims: 2 }
    }
}

/// Low dimensional coordinates, one row per solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordination {
    points: Vec<Vec<f64>>,
    /// Share of total variance per axis (PCA only).
    explained: Vec<f64>,
    /// Normalized stress of the final configuration (MDS only).
    stress: Option<f64>,
    iterations: usize,
}

impl Ordination {
    #[inline]
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    #[inline]
    pub fn point(&self, i: usize) -> Option<&[f64]> {
        self.points.get(i).map(Vec::as_slice)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.points.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn explained(&self) -> &[f64] {
        &self.explained
    }

    #[inline]
    pub fn stress(&self) -> Option<f64> {
        self.stress
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Ordinates the solutions of `portfolio`. PCA works on the subject vectors
/// directly, MDS on their pairwise distances.
pub fn ordinate(
    portfolio: &Portfolio,
    subject: Subject,
    method: OrdinationMethod,
) -> Result<Ordination, AnalyticsError> {
    match method {
        OrdinationMethod::Pca { dims } => pca(&subject_rows(portfolio, subject), dims),
        OrdinationMethod::Mds(config) => mds(&distance(portfolio, subject, config.distance), &config),
    }
}

/// Principal component scores of `data` (one row per solution).
///
/// Computed from the eigendecomposition of the Gram matrix of the
/// column-centered data. Each axis is oriented so that its largest magnitude
/// coordinate is positive. Fewer axes than `dims` are returned when the
/// centered data has lower rank.
#[tracing::instrument(level = "debug", skip(data), fields(n = data.len()))]
pub fn pca(data: &[Vec<f64>], dims: usize) -> Result<Ordination, AnalyticsError> {
    let n = data.len();
    if n < 2 {
        return Err(DegenerateInputError::new("pca", "at least two solutions are required").into());
    }
    let p = data[0].len();
    if let Some((row, r)) = data.iter().enumerate().find(|(_, r)| r.len() != p) {
        return Err(AnalyticsError::RaggedInput {
            row,
            expected: p,
            found: r.len(),
        });
    }

    let mut x = DMatrix::from_fn(n, p, |i, j| data[i][j]);
    for j in 0..p {
        let mean = x.column(j).sum() / n as f64;
        x.column_mut(j).add_scalar_mut(-mean);
    }
    let gram = &x * x.transpose();

    let (values, vectors) = sorted_eigen(gram);
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    let rank = values
        .iter()
        .take_while(|v| **v > RANK_TOLERANCE * total.max(1.0))
        .count();
    if rank == 0 {
        return Err(DegenerateInputError::new("pca", "all solutions are identical").into());
    }
    let axes = dims.min(rank);

    let mut points = vec![vec![0.0; axes]; n];
    for (k, (value, vector)) in values.iter().zip(&vectors).take(axes).enumerate() {
        let scale = value.sqrt();
        for (i, row) in points.iter_mut().enumerate() {
            row[k] = vector[i] * scale;
        }
    }
    orient_axes(&mut points);

    Ok(Ordination {
        points,
        explained: values.iter().take(axes).map(|v| v / total).collect(),
        stress: None,
        iterations: 0,
    })
}

/// Eigenpairs sorted by descending eigenvalue.
fn sorted_eigen(matrix: DMatrix<f64>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let eigen = SymmetricEigen::new(matrix);
    let mut idx: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    idx.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .total_cmp(&eigen.eigenvalues[a])
            .then(a.cmp(&b))
    });
    let values = idx.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let vectors = idx
        .iter()
        .map(|&i| eigen.eigenvectors.column(i).iter().copied().collect())
        .collect();
    (values, vectors)
}

fn orient_axes(points: &mut [Vec<f64>]) {
    let dims = points.first().map_or(0, Vec::len);
    for k in 0..dims {
        let mut pivot = 0.0f64;
        for row in points.iter() {
            if row[k].abs() > pivot.abs() {
                pivot = row[k];
            }
        }
        if pivot < 0.0 {
            points.iter_mut().for_each(|row| row[k] = -row[k]);
        }
    }
}

/// Metric multidimensional scaling by SMACOF stress majorization.
///
/// The start configuration is drawn from a ChaCha8 stream seeded with
/// `config.seed`, so identical input yields identical output. The reported
/// stress is `sqrt(Σ (d_ij - δ_ij)² / Σ d_ij²)` over pairs `i < j`.
#[tracing::instrument(level = "debug", skip(distances), fields(n = distances.len()))]
pub fn mds(distances: &DistanceMatrix, config: &MdsConfig) -> Result<Ordination, AnalyticsError> {
    let n = distances.len();
    if n < 2 {
        return Err(DegenerateInputError::new("mds", "at least two solutions are required").into());
    }
    if distances.max() == 0.0 {
        return Err(DegenerateInputError::new("mds", "the distance matrix has rank zero").into());
    }
    let dims = config.dims.max(1);

    let scale = distances.max();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut x: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..dims).map(|_| rng.random_range(-scale..scale)).collect())
        .collect();
    center(&mut x);

    let total: f64 = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| distances.get(i, j).powi(2))
        .sum();

    let mut stress = raw_stress(distances, &x);
    let mut iterations = 0;
    while iterations < config.max_iterations {
        iterations += 1;
        x = guttman_transform(distances, &x);
        let next = raw_stress(distances, &x);
        let improvement = stress - next;
        stress = next;
        if stress <= f64::EPSILON * total || improvement <= config.tolerance * stress {
            break;
        }
    }

    center(&mut x);
    orient_axes(&mut x);
    tracing::debug!(iterations, stress, "MDS converged");

    Ok(Ordination {
        points: x,
        explained: Vec::new(),
        stress: Some((stress / total).sqrt()),
        iterations,
    })
}

#[inline]
fn euclid(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn raw_stress(distances: &DistanceMatrix, x: &[Vec<f64>]) -> f64 {
    let n = x.len();
    let mut s = 0.0;
    for i in 0..n {
        for j in i + 1..n {
            let r = distances.get(i, j) - euclid(&x[i], &x[j]);
            s += r * r;
        }
    }
    s
}

/// `X' = B(X) X / n` with unit weights.
fn guttman_transform(distances: &DistanceMatrix, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = x.len();
    let dims = x[0].len();
    let mut next = vec![vec![0.0; dims]; n];
    for i in 0..n {
        let mut diag = 0.0;
        for j in 0..n {
            if i == j {
                continue;
            }
            let current = euclid(&x[i], &x[j]);
            let b = if current > 0.0 {
                -distances.get(i, j) / current
            } else {
                0.0
            };
            diag -= b;
            for k in 0..dims {
                next[i][k] += b * x[j][k];
            }
        }
        for k in 0..dims {
            next[i][k] = (next[i][k] + diag * x[i][k]) / n as f64;
        }
    }
    next
}

fn center(x: &mut [Vec<f64>]) {
    let n = x.len() as f64;
    let dims = x.first().map_or(0, Vec::len);
    for k in 0..dims {
        let mean = x.iter().map(|r| r[k]).sum::<f64>() / n;
        x.iter_mut().for_each(|r| r[k] -= mean);
    }
}
