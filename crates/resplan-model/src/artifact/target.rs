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

use crate::problem::tables::FeatureTable;

/// Absolute feature targets and penalty factors in canonical feature order.
///
/// Proportional targets are resolved against the feature totals of the
/// incidence matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTable {
    targets: Vec<f64>,
    spf: Vec<f64>,
}

impl TargetTable {
    pub fn from_features(features: &FeatureTable, totals: &[f64]) -> Self {
        debug_assert_eq!(features.len(), totals.len());
        Self {
            targets: features
                .iter()
                .zip(totals)
                .map(|(f, &total)| f.target().resolve(total))
                .collect(),
            spf: features.iter().map(|f| f.spf()).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    #[inline]
    pub fn target(&self, feature: usize) -> f64 {
        self.targets[feature]
    }

    #[inline]
    pub fn spf(&self) -> &[f64] {
        &self.spf
    }

    #[inline]
    pub fn approx_bytes(&self) -> usize {
        (self.targets.len() + self.spf.len()) * std::mem::size_of::<f64>()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.targets.iter().all(|t| t.is_finite())
    }
}
