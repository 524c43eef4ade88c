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

use crate::problem::tables::AmountTable;
use fixedbitset::FixedBitSet;

/// Sparse feature-major view of the amount table with per-feature totals.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidenceMatrix {
    units: usize,
    columns: Vec<Vec<(usize, f64)>>,
    totals: Vec<f64>,
}

impl IncidenceMatrix {
    pub fn from_amounts(amounts: &AmountTable) -> Self {
        let mut columns = vec![Vec::new(); amounts.features()];
        for u in 0..amounts.units() {
            for (f, &amount) in amounts.row(u).iter().enumerate() {
                if amount != 0.0 {
                    columns[f].push((u, amount));
                }
            }
        }
        let totals = columns
            .iter()
            .map(|c| c.iter().map(|(_, a)| *a).sum())
            .collect();
        Self {
            units: amounts.units(),
            columns,
            totals,
        }
    }

    #[inline]
    pub fn units(&self) -> usize {
        self.units
    }

    #[inline]
    pub fn features(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn column(&self, feature: usize) -> &[(usize, f64)] {
        &self.columns[feature]
    }

    #[inline]
    pub fn total(&self, feature: usize) -> f64 {
        self.totals[feature]
    }

    #[inline]
    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    /// Amount of every feature held by the selected units.
    pub fn held(&self, selection: &FixedBitSet) -> Vec<f64> {
        self.columns
            .iter()
            .map(|c| {
                c.iter()
                    .filter(|(u, _)| selection.contains(*u))
                    .map(|(_, a)| *a)
                    .sum()
            })
            .collect()
    }

    /// Number of stored non-zero amounts.
    pub fn nnz(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn approx_bytes(&self) -> usize {
        self.nnz() * std::mem::size_of::<(usize, f64)>()
            + self.columns.len() * std::mem::size_of::<Vec<(usize, f64)>>()
            + self.totals.len() * std::mem::size_of::<f64>()
    }
}
