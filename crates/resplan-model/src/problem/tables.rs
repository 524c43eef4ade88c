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

use crate::problem::{
    feature::{Feature, FeatureId},
    unit::{PlanningUnit, UnitId},
};
use fxhash::FxHashMap;
use std::sync::Arc;

/// Planning units in canonical (ascending id) order.
#[derive(Debug, Clone)]
pub struct UnitTable {
    units: Vec<PlanningUnit>,
    index: Arc<FxHashMap<UnitId, usize>>,
}

impl UnitTable {
    /// Builds a table from units already sorted by id and free of duplicates.
    pub(crate) fn from_sorted(units: Vec<PlanningUnit>) -> Self {
        debug_assert!(units.windows(2).all(|w| w[0].id() < w[1].id()));
        let index = units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id(), i))
            .collect::<FxHashMap<_, _>>();
        Self {
            units,
            index: Arc::new(index),
        }
    }

    /// Same ids in the same order, different unit payloads.
    pub(crate) fn with_units(&self, units: Vec<PlanningUnit>) -> Self {
        debug_assert_eq!(units.len(), self.units.len());
        Self {
            units,
            index: Arc::clone(&self.index),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&PlanningUnit> {
        self.units.get(position)
    }

    #[inline]
    pub fn position(&self, id: UnitId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    #[inline]
    pub fn by_id(&self, id: UnitId) -> Option<&PlanningUnit> {
        self.position(id).map(|i| &self.units[i])
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PlanningUnit> {
        self.units.iter()
    }

    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().map(|u| u.id())
    }

    #[inline]
    pub fn as_slice(&self) -> &[PlanningUnit] {
        &self.units
    }
}

/// Features in canonical (ascending id) order.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    features: Vec<Feature>,
    index: Arc<FxHashMap<FeatureId, usize>>,
}

impl FeatureTable {
    pub(crate) fn from_sorted(features: Vec<Feature>) -> Self {
        debug_assert!(features.windows(2).all(|w| w[0].id() < w[1].id()));
        let index = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id(), i))
            .collect::<FxHashMap<_, _>>();
        Self {
            features,
            index: Arc::new(index),
        }
    }

    pub(crate) fn with_features(&self, features: Vec<Feature>) -> Self {
        debug_assert_eq!(features.len(), self.features.len());
        Self {
            features,
            index: Arc::clone(&self.index),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Feature> {
        self.features.get(position)
    }

    #[inline]
    pub fn position(&self, id: FeatureId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    #[inline]
    pub fn by_id(&self, id: FeatureId) -> Option<&Feature> {
        self.position(id).map(|i| &self.features[i])
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.features.iter().map(|f| f.id())
    }

    #[inline]
    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }
}

/// Dense per-unit feature amounts, unit-major, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountTable {
    units: usize,
    features: usize,
    amounts: Vec<f64>,
}

impl AmountTable {
    pub(crate) fn new(units: usize, features: usize, amounts: Vec<f64>) -> Self {
        debug_assert_eq!(amounts.len(), units * features);
        Self {
            units,
            features,
            amounts,
        }
    }

    #[inline]
    pub fn units(&self) -> usize {
        self.units
    }

    #[inline]
    pub fn features(&self) -> usize {
        self.features
    }

    #[inline]
    pub fn get(&self, unit: usize, feature: usize) -> f64 {
        self.amounts[unit * self.features + feature]
    }

    #[inline]
    pub fn row(&self, unit: usize) -> &[f64] {
        let start = unit * self.features;
        &self.amounts[start..start + self.features]
    }

    pub fn feature_total(&self, feature: usize) -> f64 {
        (0..self.units).map(|u| self.get(u, feature)).sum()
    }
}

/// A canonical boundary edge between unit positions, `a <= b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryEdge {
    pub a: usize,
    pub b: usize,
    pub length: f64,
}

impl BoundaryEdge {
    #[inline]
    pub fn is_exterior(&self) -> bool {
        self.a == self.b
    }
}

/// Boundary edges sorted by `(a, b)`, duplicates summed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryTable {
    edges: Vec<BoundaryEdge>,
}

impl BoundaryTable {
    pub(crate) fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = BoundaryEdge>,
    {
        let mut merged: std::collections::BTreeMap<(usize, usize), f64> =
            std::collections::BTreeMap::new();
        for e in edges {
            let key = if e.a <= e.b { (e.a, e.b) } else { (e.b, e.a) };
            *merged.entry(key).or_insert(0.0) += e.length;
        }
        Self {
            edges: merged
                .into_iter()
                .map(|((a, b), length)| BoundaryEdge { a, b, length })
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &BoundaryEdge> {
        self.edges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_edges_are_normalized_and_summed() {
        let t = BoundaryTable::from_edges([
            BoundaryEdge {
                a: 1,
                b: 0,
                length: 2.0,
            },
            BoundaryEdge {
                a: 0,
                b: 1,
                length: 3.0,
            },
            BoundaryEdge {
                a: 2,
                b: 2,
                length: 1.0,
            },
        ]);
        let edges: Vec<_> = t.iter().copied().collect();
        assert_eq!(edges.len(), 2);
        assert_eq!((edges[0].a, edges[0].b, edges[0].length), (0, 1, 5.0));
        assert!(edges[1].is_exterior());
    }

    #[test]
    fn amount_table_rows_and_totals() {
        let t = AmountTable::new(2, 3, vec![1.0, 0.0, 2.0, 3.0, 1.0, 0.5]);
        assert_eq!(t.row(1), &[3.0, 1.0, 0.5]);
        assert_eq!(t.get(0, 2), 2.0);
        assert_eq!(t.feature_total(0), 4.0);
    }
}
