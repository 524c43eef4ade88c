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
    distance::DistanceMatrix,
    err::{AnalyticsError, DegenerateInputError},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    Single,
    Complete,
    /// UPGMA.
    #[default]
    Average,
    /// Ward's minimum variance on squared distances; heights are reported on
    /// the original scale.
    Ward,
}

impl Linkage {
    /// Lance-Williams update of the distance between the merged cluster
    /// `i ∪ j` and `k`.
    #[inline]
    fn update(self, dik: f64, djk: f64, dij: f64, ni: f64, nj: f64, nk: f64) -> f64 {
        match self {
            Linkage::Single => dik.min(djk),
            Linkage::Complete => dik.max(djk),
            Linkage::Average => (ni * dik + nj * djk) / (ni + nj),
            Linkage::Ward => ((ni + nk) * dik + (nj + nk) * djk - nk * dij) / (ni + nj + nk),
        }
    }
}

/// A dendrogram node: an original solution or the result of an earlier merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Leaf(usize),
    /// Index into [`Dendrogram::merges`].
    Cluster(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub left: Node,
    pub right: Node,
    pub height: f64,
    /// Number of leaves below this merge.
    pub size: usize,
}

/// Result of agglomerative clustering over `n` leaves: `n - 1` merges in
/// the order they were performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    leaves: usize,
    linkage: Linkage,
    merges: Vec<Merge>,
    order: Vec<usize>,
}

impl Dendrogram {
    #[inline]
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    #[inline]
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    #[inline]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Leaf order for plotting; leaves joined by a merge are contiguous.
    #[inline]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn heights(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.height).collect()
    }

    /// Flat cluster labels for `k` clusters, obtained by undoing the last
    /// `k - 1` merges. `k` is clamped to `1..=leaves`. Labels are numbered
    /// by the lowest leaf they contain.
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let k = k.clamp(1, self.leaves.max(1));
        let mut parent: Vec<usize> = (0..self.leaves).collect();
        let mut rep = Vec::with_capacity(self.merges.len());

        for m in &self.merges[..self.leaves - k] {
            let a = find(&mut parent, self.representative(m.left, &rep));
            let b = find(&mut parent, self.representative(m.right, &rep));
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            parent[hi] = lo;
            rep.push(lo);
        }

        let mut labels = vec![usize::MAX; self.leaves];
        let mut next = 0;
        let mut root_label = vec![usize::MAX; self.leaves];
        for leaf in 0..self.leaves {
            let root = find(&mut parent, leaf);
            if root_label[root] == usize::MAX {
                root_label[root] = next;
                next += 1;
            }
            labels[leaf] = root_label[root];
        }
        labels
    }

    #[inline]
    fn representative(&self, node: Node, rep: &[usize]) -> usize {
        match node {
            Node::Leaf(i) => i,
            Node::Cluster(c) => rep[c],
        }
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Agglomerative hierarchical clustering.
///
/// Among pairs at equal height the pair whose lowest original solution
/// indices have the smaller sum merges first, then the one with the smaller
/// lowest index; the output is a pure function of the matrix.
#[tracing::instrument(level = "debug", skip(distances), fields(n = distances.len()))]
pub fn cluster(distances: &DistanceMatrix, linkage: Linkage) -> Result<Dendrogram, AnalyticsError> {
    let n = distances.len();
    if n < 2 {
        return Err(DegenerateInputError::new("clustering", "at least two solutions are required").into());
    }

    let square = linkage == Linkage::Ward;
    let mut d: Vec<f64> = distances
        .as_slice()
        .iter()
        .map(|&v| if square { v * v } else { v })
        .collect();

    // Slot s always holds the cluster whose lowest leaf is s.
    let mut active = vec![true; n];
    let mut size = vec![1usize; n];
    let mut node: Vec<Node> = (0..n).map(Node::Leaf).collect();
    let mut merges = Vec::with_capacity(n - 1);

    for _ in 0..n - 1 {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in i + 1..n {
                if !active[j] {
                    continue;
                }
                let h = d[i * n + j];
                let better = match best {
                    None => true,
                    Some((bh, bi, bj)) => match h.total_cmp(&bh) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => (i + j, i) < (bi + bj, bi),
                    },
                };
                if better {
                    best = Some((h, i, j));
                }
            }
        }
        let Some((h, i, j)) = best else { break };

        let (ni, nj) = (size[i] as f64, size[j] as f64);
        for k in 0..n {
            if !active[k] || k == i || k == j {
                continue;
            }
            let updated = linkage.update(d[i * n + k], d[j * n + k], h, ni, nj, size[k] as f64);
            d[i * n + k] = updated;
            d[k * n + i] = updated;
        }

        merges.push(Merge {
            left: node[i],
            right: node[j],
            height: if square { h.max(0.0).sqrt() } else { h },
            size: size[i] + size[j],
        });
        node[i] = Node::Cluster(merges.len() - 1);
        size[i] += size[j];
        active[j] = false;
    }

    let order = leaf_order(&merges, n);
    Ok(Dendrogram {
        leaves: n,
        linkage,
        merges,
        order,
    })
}

fn leaf_order(merges: &[Merge], n: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(n);
    let mut stack = match merges.len() {
        0 => vec![Node::Leaf(0)],
        len => vec![Node::Cluster(len - 1)],
    };
    while let Some(next) = stack.pop() {
        match next {
            Node::Leaf(i) => order.push(i),
            Node::Cluster(c) => {
                stack.push(merges[c].right);
                stack.push(merges[c].left);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{DistanceMethod, distance_rows};

    fn matrix(rows: &[&[f64]]) -> DistanceMatrix {
        DistanceMatrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn zero_distance_pair_merges_first_at_height_zero() {
        let rows = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 1.0],
            vec![0.0, 1.0, 1.0],
            vec![1.0, 1.0, 0.0],
        ];
        let d = distance_rows(&rows, DistanceMethod::BrayCurtis).unwrap();
        assert_eq!(d.get(1, 2), 0.0);

        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let tree = cluster(&d, linkage).unwrap();
            let first = tree.merges()[0];
            assert_eq!((first.left, first.right), (Node::Leaf(1), Node::Leaf(2)));
            assert_eq!(first.height, 0.0);
            assert_eq!(tree.merges().len(), 3);
            assert_eq!(tree.merges()[2].size, 4);
        }
    }

    #[test]
    fn ties_prefer_lower_combined_index() {
        let d = matrix(&[
            &[0.0, 1.0, 5.0, 5.0],
            &[1.0, 0.0, 5.0, 5.0],
            &[5.0, 5.0, 0.0, 1.0],
            &[5.0, 5.0, 1.0, 0.0],
        ]);
        let tree = cluster(&d, Linkage::Average).unwrap();
        assert_eq!(tree.merges()[0].left, Node::Leaf(0));
        assert_eq!(tree.merges()[0].right, Node::Leaf(1));
        assert_eq!(tree.merges()[1].left, Node::Leaf(2));
        assert_eq!(tree.merges()[1].right, Node::Leaf(3));
        assert_eq!(tree.merges()[2].left, Node::Cluster(0));
        assert_eq!(tree.merges()[2].right, Node::Cluster(1));
        assert_eq!(tree.merges()[2].height, 5.0);
        assert_eq!(tree.order(), &[0, 1, 2, 3]);
        assert_eq!(cluster(&d, Linkage::Average).unwrap(), tree);
    }

    #[test]
    fn linkages_differ_on_chains() {
        let d = matrix(&[&[0.0, 1.0, 3.0], &[1.0, 0.0, 2.0], &[3.0, 2.0, 0.0]]);
        assert_eq!(cluster(&d, Linkage::Single).unwrap().heights(), vec![1.0, 2.0]);
        assert_eq!(cluster(&d, Linkage::Complete).unwrap().heights(), vec![1.0, 3.0]);
        assert_eq!(cluster(&d, Linkage::Average).unwrap().heights(), vec![1.0, 2.5]);
    }

    #[test]
    fn cut_undoes_last_merges() {
        let d = matrix(&[
            &[0.0, 1.0, 5.0, 5.0, 9.0],
            &[1.0, 0.0, 5.0, 5.0, 9.0],
            &[5.0, 5.0, 0.0, 1.0, 9.0],
            &[5.0, 5.0, 1.0, 0.0, 9.0],
            &[9.0, 9.0, 9.0, 9.0, 0.0],
        ]);
        let tree = cluster(&d, Linkage::Complete).unwrap();
        assert_eq!(tree.cut(1), vec![0, 0, 0, 0, 0]);
        assert_eq!(tree.cut(2), vec![0, 0, 0, 0, 1]);
        assert_eq!(tree.cut(3), vec![0, 0, 1, 1, 2]);
        assert_eq!(tree.cut(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(tree.cut(99), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn single_solution_is_degenerate() {
        let d = matrix(&[&[0.0]]);
        assert!(matches!(cluster(&d, Linkage::Average), Err(AnalyticsError::Degenerate(_))));
    }
}
