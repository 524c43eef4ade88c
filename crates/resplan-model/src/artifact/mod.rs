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

pub mod boundary;
pub mod bundle;
pub mod cost;
pub mod incidence;
pub mod target;

use crate::problem::{definition::ProblemDefinition, kind::ArtifactKind};
use boundary::BoundaryMatrix;
use bundle::SolverBundle;
use cost::CostVector;
use incidence::IncidenceMatrix;
use std::sync::Arc;
use target::TargetTable;

/// A derived, immutable preprocessing artifact.
#[derive(Debug, Clone)]
pub enum Artifact {
    Boundary(Arc<BoundaryMatrix>),
    Incidence(Arc<IncidenceMatrix>),
    Costs(Arc<CostVector>),
    Targets(Arc<TargetTable>),
    Bundle(Arc<SolverBundle>),
}

impl Artifact {
    #[inline]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Boundary(_) => ArtifactKind::BoundaryMatrix,
            Artifact::Incidence(_) => ArtifactKind::IncidenceMatrix,
            Artifact::Costs(_) => ArtifactKind::CostVector,
            Artifact::Targets(_) => ArtifactKind::TargetTable,
            Artifact::Bundle(_) => ArtifactKind::SolverBundle,
        }
    }

    pub fn approx_bytes(&self) -> usize {
        match self {
            Artifact::Boundary(a) => a.approx_bytes(),
            Artifact::Incidence(a) => a.approx_bytes(),
            Artifact::Costs(a) => a.approx_bytes(),
            Artifact::Targets(a) => a.approx_bytes(),
            Artifact::Bundle(a) => a.approx_bytes(),
        }
    }

    /// Computes the artifact of `kind` for `problem` from scratch.
    pub fn compute(kind: ArtifactKind, problem: &ProblemDefinition) -> Result<Self, ArtifactError> {
        Ok(match kind {
            ArtifactKind::BoundaryMatrix => Artifact::Boundary(Arc::new(boundary_matrix(problem)?)),
            ArtifactKind::IncidenceMatrix => {
                Artifact::Incidence(Arc::new(incidence_matrix(problem)?))
            }
            ArtifactKind::CostVector => Artifact::Costs(Arc::new(cost_vector(problem))),
            ArtifactKind::TargetTable => Artifact::Targets(Arc::new(target_table(problem)?)),
            ArtifactKind::SolverBundle => Artifact::Bundle(Arc::new(solver_bundle(problem)?)),
        })
    }

    #[inline]
    pub fn as_boundary(&self) -> Option<&Arc<BoundaryMatrix>> {
        match self {
            Artifact::Boundary(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_incidence(&self) -> Option<&Arc<IncidenceMatrix>> {
        match self {
            Artifact::Incidence(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_costs(&self) -> Option<&Arc<CostVector>> {
        match self {
            Artifact::Costs(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_targets(&self) -> Option<&Arc<TargetTable>> {
        match self {
            Artifact::Targets(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bundle(&self) -> Option<&Arc<SolverBundle>> {
        match self {
            Artifact::Bundle(a) => Some(a),
            _ => None,
        }
    }
}

pub fn boundary_matrix(problem: &ProblemDefinition) -> Result<BoundaryMatrix, ArtifactError> {
    let m = BoundaryMatrix::from_table(problem.unit_count(), problem.boundary());
    if !m.is_finite() {
        return Err(ArtifactError::non_finite(ArtifactKind::BoundaryMatrix, "boundary length"));
    }
    Ok(m)
}

pub fn incidence_matrix(problem: &ProblemDefinition) -> Result<IncidenceMatrix, ArtifactError> {
    let m = IncidenceMatrix::from_amounts(problem.amounts());
    if !m.totals().iter().all(|t| t.is_finite()) {
        return Err(ArtifactError::non_finite(ArtifactKind::IncidenceMatrix, "feature total"));
    }
    Ok(m)
}

#[inline]
pub fn cost_vector(problem: &ProblemDefinition) -> CostVector {
    CostVector::from_units(problem.units())
}

pub fn target_table(problem: &ProblemDefinition) -> Result<TargetTable, ArtifactError> {
    let totals: Vec<f64> = (0..problem.feature_count())
        .map(|f| problem.amounts().feature_total(f))
        .collect();
    let t = TargetTable::from_features(problem.features(), &totals);
    if !t.is_finite() {
        return Err(ArtifactError::non_finite(ArtifactKind::TargetTable, "resolved target"));
    }
    Ok(t)
}

pub fn solver_bundle(problem: &ProblemDefinition) -> Result<SolverBundle, ArtifactError> {
    let b = SolverBundle::from_problem(problem);
    if !b.is_finite() {
        return Err(ArtifactError::non_finite(ArtifactKind::SolverBundle, "resolved target"));
    }
    Ok(b)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    NonFinite {
        kind: ArtifactKind,
        what: &'static str,
    },
}

impl ArtifactError {
    #[inline]
    fn non_finite(kind: ArtifactKind, what: &'static str) -> Self {
        ArtifactError::NonFinite { kind, what }
    }
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::NonFinite { kind, what } => {
                write!(f, "Computing {} produced a non-finite {}", kind, what)
            }
        }
    }
}

impl std::error::Error for ArtifactError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        builder::ProblemAssembler,
        feature::{FeatureRecord, Target},
        options::ProblemOptions,
        unit::{BoundaryRecord, PlanningUnitRecord},
    };

    fn problem() -> ProblemDefinition {
        ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(5, 1.0, 0),
                PlanningUnitRecord::new(3, 2.0, 3),
            ])
            .with_features([FeatureRecord::new(1, "a", Target::Proportion(0.5), 2.0)])
            .with_incidence([vec![1.0], vec![3.0]])
            .with_boundaries([BoundaryRecord::new(5, 3, 1.5)])
            .with_options(ProblemOptions::default().with_blm(0.25))
            .assemble()
            .unwrap()
    }

    #[test]
    fn computes_every_kind() {
        let p = problem();
        for kind in ArtifactKind::ALL {
            let a = Artifact::compute(kind, &p).unwrap();
            assert_eq!(a.kind(), kind);
            assert!(a.approx_bytes() > 0);
        }
    }

    #[test]
    fn proportional_targets_resolve_against_totals() {
        let p = problem();
        let a = Artifact::compute(ArtifactKind::TargetTable, &p).unwrap();
        let t = a.as_targets().unwrap();
        assert_eq!(t.targets(), &[2.0]);
        assert_eq!(t.spf(), &[2.0]);
    }

    #[test]
    fn bundle_uses_ids_not_positions() {
        let p = problem();
        let a = Artifact::compute(ArtifactKind::SolverBundle, &p).unwrap();
        let b = a.as_bundle().unwrap();
        assert_eq!(b.units[0].id.get(), 3);
        assert_eq!(b.units[0].status, crate::problem::unit::UnitStatus::LockedOut);
        assert_eq!(b.boundaries.len(), 1);
        assert_eq!((b.boundaries[0].a.get(), b.boundaries[0].b.get()), (3, 5));
        assert_eq!(b.incidence.len(), 2);
        assert_eq!(b.blm, 0.25);
        assert_eq!(b.features[0].target, 2.0);
    }
}
