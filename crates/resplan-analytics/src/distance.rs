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

use crate::err::AnalyticsError;
use rayon::prelude::*;
use resplan_model::prelude::Portfolio;
use serde::{Deserialize, Serialize};

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// What each solution is represented by when comparing solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The 0/1 selection vector over planning units.
    #[default]
    Selections,
    /// The amount held of every feature.
    AmountHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    #[default]
    BrayCurtis,
    /// Quantitative Jaccard (Ruzicka); the usual Jaccard on 0/1 vectors.
    Jaccard,
    Euclidean,
    Manhattan,
}

impl DistanceMethod {
    /// Dissimilarity of two equally long vectors. Two all-zero vectors are at
    /// distance 0 under every method.
    pub fn between(self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        let pairs = a.iter().zip(b);
        match self {
            DistanceMethod::BrayCurtis => {
                let (diff, sum) = pairs.fold((0.0, 0.0), |(d, s), (x, y)| {
                    (d + (x - y).abs(), s + x.abs() + y.abs())
                });
                ratio_or_zero(diff, sum)
            }
            DistanceMethod::Jaccard => {
                let (min, max) = pairs.fold((0.0, 0.0), |(lo, hi), (x, y)| {
                    (lo + x.abs().min(y.abs()), hi + x.abs().max(y.abs()))
                });
                if max == 0.0 { 0.0 } else { 1.0 - min / max }
            }
            DistanceMethod::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            DistanceMethod::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

#[inline]
fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

/// Symmetric pairwise dissimilarities with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds a matrix from full rows, checking shape, symmetry and that
    /// every entry is finite and non-negative.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, AnalyticsError> {
        let n = rows.len();
        let mut values = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(AnalyticsError::RaggedInput {
                    row: i,
                    expected: n,
                    found: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        for i in 0..n {
            for j in 0..n {
                let v = values[i * n + j];
                let bad = !v.is_finite()
                    || v < 0.0
                    || (i == j && v != 0.0)
                    || (v - values[j * n + i]).abs() > SYMMETRY_TOLERANCE;
                if bad {
                    return Err(AnalyticsError::InvalidDistance {
                        row: i,
                        col: j,
                        value: v,
                    });
                }
            }
        }
        Ok(Self { n, values })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n).map(|i| self.row(i).to_vec()).collect()
    }
}

/// The vectors representing each solution of `portfolio`, in portfolio order.
pub fn subject_rows(portfolio: &Portfolio, subject: Subject) -> Vec<Vec<f64>> {
    match subject {
        Subject::Selections => portfolio
            .solutions()
            .iter()
            .map(|s| s.selection().to_vector())
            .collect(),
        Subject::AmountHeld => portfolio.amount_held(),
    }
}

/// Pairwise distances between the solutions of `portfolio`.
#[tracing::instrument(level = "debug", skip(portfolio), fields(solutions = portfolio.len()))]
pub fn distance(portfolio: &Portfolio, subject: Subject, method: DistanceMethod) -> DistanceMatrix {
    let rows = subject_rows(portfolio, subject);
    pairwise(&rows, method)
}

/// Pairwise distances between arbitrary equally long rows.
pub fn distance_rows(rows: &[Vec<f64>], method: DistanceMethod) -> Result<DistanceMatrix, AnalyticsError> {
    if let Some(first) = rows.first() {
        let width = first.len();
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(AnalyticsError::RaggedInput {
                row,
                expected: width,
                found: r.len(),
            });
        }
    }
    Ok(pairwise(rows, method))
}

fn pairwise(rows: &[Vec<f64>], method: DistanceMethod) -> DistanceMatrix {
    let n = rows.len();
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (i + 1..n)
                .map(|j| method.between(&rows[i], &rows[j]))
                .collect()
        })
        .collect();

    let mut values = vec![0.0; n * n];
    for (i, row) in upper.into_iter().enumerate() {
        for (k, d) in row.into_iter().enumerate() {
            let j = i + 1 + k;
            values[i * n + j] = d;
            values[j * n + i] = d;
        }
    }
    DistanceMatrix { n, values }
}
