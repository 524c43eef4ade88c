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

pub mod cluster;
pub mod distance;
pub mod err;
pub mod ordinate;

pub mod prelude {
    pub use crate::cluster::{Dendrogram, Linkage, Merge, Node, cluster};
    pub use crate::distance::{
        DistanceMatrix, DistanceMethod, Subject, distance, distance_rows, subject_rows,
    };
    pub use crate::err::{AnalyticsError, DegenerateInputError};
    pub use crate::ordinate::{MdsConfig, Ordination, OrdinationMethod, mds, ordinate, pca};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use resplan_model::prelude::{
        FeatureRecord, PlanningUnitRecord, Portfolio, ProblemAssembler, ProblemDefinition,
        ProblemOptions, ScoreConfig, ScoringContext, Selection, Target,
    };

    fn problem() -> ProblemDefinition {
        ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(1, 1.0, 0),
                PlanningUnitRecord::new(2, 1.0, 0),
                PlanningUnitRecord::new(3, 1.0, 0),
            ])
            .with_features([
                FeatureRecord::new(1, "a", Target::Absolute(2.0), 1.0),
                FeatureRecord::new(2, "b", Target::Proportion(0.5), 1.0),
            ])
            .with_incidence([vec![1.0, 2.0], vec![1.0, 0.0], vec![1.0, 1.0]])
            .with_options(ProblemOptions::default())
            .assemble()
            .unwrap()
    }

    fn portfolio(selections: &[&[usize]]) -> Portfolio {
        let p = problem();
        let ctx = ScoringContext::from_problem(&p).unwrap();
        let requested = selections.len();
        let selections = selections
            .iter()
            .enumerate()
            .map(|(r, s)| (r, Selection::from_positions(p.unit_count(), s.iter().copied())))
            .collect();
        Portfolio::new(&p, &ctx, ScoreConfig::default(), selections, Vec::new(), requested)
    }

    #[test]
    fn identical_selections_cluster_at_zero() {
        let pf = portfolio(&[&[0, 1], &[1, 2], &[1, 2], &[0, 2]]);
        let d = distance(&pf, Subject::Selections, DistanceMethod::BrayCurtis);
        assert_eq!(d.len(), 4);
        assert_eq!(d.get(1, 2), 0.0);
        assert!(d.get(0, 1) > 0.0);

        let tree = cluster(&d, Linkage::default()).unwrap();
        let first = tree.merges()[0];
        assert_eq!((first.left, first.right, first.height), (Node::Leaf(1), Node::Leaf(2), 0.0));
    }

    #[test]
    fn amount_held_subject_uses_feature_totals() {
        let pf = portfolio(&[&[0], &[1, 2]]);
        let rows = subject_rows(&pf, Subject::AmountHeld);
        assert_eq!(rows, vec![vec![1.0, 2.0], vec![2.0, 1.0]]);
        let d = distance(&pf, Subject::AmountHeld, DistanceMethod::Manhattan);
        assert_eq!(d.get(0, 1), 2.0);
    }

    #[test]
    fn ordination_of_a_portfolio() {
        let pf = portfolio(&[&[0, 1], &[1, 2], &[0, 2], &[0]]);
        let pca = ordinate(&pf, Subject::Selections, OrdinationMethod::Pca { dims: 2 }).unwrap();
        assert_eq!(pca.len(), 4);
        assert_eq!(pca.dims(), 2);
        assert!(pca.stress().is_none());

        let mds = ordinate(&pf, Subject::Selections, OrdinationMethod::Mds(MdsConfig::default())).unwrap();
        assert_eq!(mds.len(), 4);
        assert!(mds.stress().is_some());
        assert_eq!(
            mds,
            ordinate(&pf, Subject::Selections, OrdinationMethod::Mds(MdsConfig::default())).unwrap()
        );
    }

    #[test]
    fn single_solution_is_degenerate_everywhere() {
        let pf = portfolio(&[&[0, 1]]);
        let d = distance(&pf, Subject::Selections, DistanceMethod::Jaccard);
        assert!(matches!(cluster(&d, Linkage::Ward), Err(AnalyticsError::Degenerate(_))));
        assert!(matches!(
            ordinate(&pf, Subject::Selections, OrdinationMethod::default()),
            Err(AnalyticsError::Degenerate(_))
        ));
    }
}
