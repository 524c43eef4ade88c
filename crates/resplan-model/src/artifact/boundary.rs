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

use crate::problem::tables::BoundaryTable;
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

pub type Neighbors = SmallVec<[(usize, f64); 6]>;

/// Symmetric adjacency of planning units by shared boundary length.
///
/// Holds raw lengths only. The boundary length modifier is applied when a
/// score is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMatrix {
    neighbors: Vec<Neighbors>,
    exterior: Vec<f64>,
}

impl BoundaryMatrix {
    pub fn from_table(units: usize, table: &BoundaryTable) -> Self {
        let mut neighbors = vec![Neighbors::new(); units];
        let mut exterior = vec![0.0; units];
        for e in table.iter() {
            if e.is_exterior() {
                exterior[e.a] += e.length;
            } else {
                neighbors[e.a].push((e.b, e.length));
                neighbors[e.b].push((e.a, e.length));
            }
        }
        Self {
            neighbors,
            exterior,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    #[inline]
    pub fn neighbors(&self, unit: usize) -> &[(usize, f64)] {
        &self.neighbors[unit]
    }

    #[inline]
    pub fn exterior(&self, unit: usize) -> f64 {
        self.exterior[unit]
    }

    /// Boundary length of a selection: every edge with exactly one selected
    /// endpoint plus the exterior boundary of every selected unit.
    pub fn boundary_of(&self, selection: &FixedBitSet) -> f64 {
        selection
            .ones()
            .map(|u| {
                let cut: f64 = self.neighbors[u]
                    .iter()
                    .filter(|(v, _)| !selection.contains(*v))
                    .map(|(_, len)| *len)
                    .sum();
                self.exterior[u] + cut
            })
            .sum()
    }

    pub fn approx_bytes(&self) -> usize {
        let spilled: usize = self
            .neighbors
            .iter()
            .filter(|n| n.spilled())
            .map(|n| n.capacity() * std::mem::size_of::<(usize, f64)>())
            .sum();
        self.neighbors.len() * std::mem::size_of::<Neighbors>()
            + self.exterior.len() * std::mem::size_of::<f64>()
            + spilled
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.exterior.iter().all(|l| l.is_finite())
            && self
                .neighbors
                .iter()
                .all(|n| n.iter().all(|(_, l)| l.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::tables::BoundaryEdge;

    fn line() -> BoundaryMatrix {
        // 0 - 1 - 2, unit 0 also on the outer edge
        let table = BoundaryTable::from_edges([
            BoundaryEdge {
                a: 0,
                b: 1,
                length: 1.0,
            },
            BoundaryEdge {
                a: 1,
                b: 2,
                length: 2.0,
            },
            BoundaryEdge {
                a: 0,
                b: 0,
                length: 3.0,
            },
        ]);
        BoundaryMatrix::from_table(3, &table)
    }

    fn select(bits: &[usize]) -> FixedBitSet {
        let mut s = FixedBitSet::with_capacity(3);
        for &b in bits {
            s.insert(b);
        }
        s
    }

    #[test]
    fn adjacency_is_symmetric() {
        let m = line();
        assert_eq!(m.neighbors(1), &[(0, 1.0), (2, 2.0)]);
        assert_eq!(m.neighbors(0), &[(1, 1.0)]);
        assert_eq!(m.exterior(0), 3.0);
    }

    #[test]
    fn boundary_counts_cut_edges_and_exterior() {
        let m = line();
        assert_eq!(m.boundary_of(&select(&[])), 0.0);
        assert_eq!(m.boundary_of(&select(&[1])), 3.0);
        assert_eq!(m.boundary_of(&select(&[0, 1])), 3.0 + 2.0);
        assert_eq!(m.boundary_of(&select(&[0, 1, 2])), 3.0);
    }
}
