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

use crate::cache::{
    err::CacheError,
    store::{ArtifactCache, CacheConfig, CacheLease, CacheStats, EvictionPolicy, EvictionReport, Weigh},
};
use resplan_model::prelude::{
    Artifact, ArtifactKind, BoundaryMatrix, CostVector, IncidenceMatrix, ProblemDefinition,
    ScoringContext, SolverBundle, TargetTable,
};
use std::sync::Arc;

impl Weigh for Artifact {
    #[inline]
    fn weight(&self) -> usize {
        self.approx_bytes()
    }
}

/// Cache of derived problem artifacts keyed by their content fingerprint.
///
/// Meant to be created once and shared by every run in the process; derived
/// problem definitions whose fingerprints did not change hit the same
/// entries as their base.
#[derive(Debug, Default)]
pub struct PreprocessingCache {
    cache: ArtifactCache<Artifact>,
}

macro_rules! typed_accessor {
    ($name:ident, $kind:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self, problem: &ProblemDefinition) -> Result<Arc<$ty>, CacheError> {
            match self.artifact(problem, ArtifactKind::$kind)? {
                Artifact::$variant(a) => Ok(a),
                other => Err(CacheError::KindMismatch {
                    fingerprint: problem.fingerprint(ArtifactKind::$kind),
                    expected: ArtifactKind::$kind,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl PreprocessingCache {
    #[inline]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: ArtifactCache::new(config),
        }
    }

    /// The artifact of `kind` for `problem`, computed at most once per
    /// fingerprint.
    pub fn artifact(
        &self,
        problem: &ProblemDefinition,
        kind: ArtifactKind,
    ) -> Result<Artifact, CacheError> {
        self.cache
            .get_or_compute(problem.fingerprint(kind), kind.name(), || {
                Artifact::compute(kind, problem)
            })
    }

    typed_accessor!(boundary_matrix, BoundaryMatrix, Boundary, BoundaryMatrix);
    typed_accessor!(incidence_matrix, IncidenceMatrix, Incidence, IncidenceMatrix);
    typed_accessor!(cost_vector, CostVector, Costs, CostVector);
    typed_accessor!(target_table, TargetTable, Targets, TargetTable);
    typed_accessor!(solver_bundle, SolverBundle, Bundle, SolverBundle);

    /// Everything needed to score selections of `problem`.
    pub fn scoring_context(&self, problem: &ProblemDefinition) -> Result<ScoringContext, CacheError> {
        Ok(ScoringContext::new(
            self.boundary_matrix(problem)?,
            self.incidence_matrix(problem)?,
            self.cost_vector(problem)?,
            self.target_table(problem)?,
            problem.options().blm,
        ))
    }

    /// Pins every artifact fingerprint of `problem`.
    #[inline]
    pub fn lease(&self, problem: &ProblemDefinition) -> CacheLease<'_, Artifact> {
        self.cache.lease(problem.fingerprints().values())
    }

    #[inline]
    pub fn contains(&self, problem: &ProblemDefinition, kind: ArtifactKind) -> bool {
        self.cache.contains(&problem.fingerprint(kind))
    }

    #[inline]
    pub fn evict(&self, policy: EvictionPolicy) -> EvictionReport {
        self.cache.evict(policy)
    }

    #[inline]
    pub fn drain(&self) -> EvictionReport {
        self.cache.drain()
    }

    #[inline]
    pub fn close(&self) -> EvictionReport {
        self.cache.close()
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    #[inline]
    pub fn store(&self) -> &ArtifactCache<Artifact> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resplan_model::prelude::{
        BoundaryRecord, FeatureId, FeatureRecord, ParameterOverlay, PlanningUnitRecord,
        ProblemAssembler, ProblemOptions, Target, UnitId, derive,
    };

    fn problem() -> ProblemDefinition {
        ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(1, 1.0, 0),
                PlanningUnitRecord::new(2, 2.0, 0),
            ])
            .with_features([FeatureRecord::new(1, "a", Target::Proportion(0.5), 1.0)])
            .with_incidence([vec![1.0], vec![1.0]])
            .with_boundaries([BoundaryRecord::new(1, 2, 1.5)])
            .with_options(ProblemOptions::default())
            .assemble()
            .unwrap()
    }

    #[test]
    fn derived_problem_reuses_unaffected_entries() {
        let cache = PreprocessingCache::new(CacheConfig::unbounded());
        let base = problem();
        let a = cache.incidence_matrix(&base).unwrap();
        cache.cost_vector(&base).unwrap();
        assert_eq!(cache.stats().computations, 2);

        let derived = derive(
            &base,
            &ParameterOverlay::builder("cost")
                .unit_cost(UnitId::new(1), 9.0)
                .build(),
        )
        .unwrap();

        let b = cache.incidence_matrix(&derived).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().computations, 2);

        let costs = cache.cost_vector(&derived).unwrap();
        assert_eq!(costs.costs(), &[9.0, 2.0]);
        assert_eq!(cache.stats().computations, 3);
    }

    #[test]
    fn target_change_reuses_boundary_matrix() {
        let cache = PreprocessingCache::new(CacheConfig::unbounded());
        let base = problem();
        let boundary = cache.boundary_matrix(&base).unwrap();
        cache.target_table(&base).unwrap();
        assert_eq!(cache.stats().computations, 2);

        let derived = derive(
            &base,
            &ParameterOverlay::builder("target")
                .feature_target(FeatureId::new(1), Target::Proportion(1.0))
                .build(),
        )
        .unwrap();

        let reused = cache.boundary_matrix(&derived).unwrap();
        assert!(Arc::ptr_eq(&boundary, &reused));
        assert_eq!(cache.stats().computations, 2);

        let targets = cache.target_table(&derived).unwrap();
        assert_eq!(targets.targets(), &[2.0]);
        assert_eq!(cache.stats().computations, 3);
    }

    #[test]
    fn leased_problem_survives_drain() {
        let cache = PreprocessingCache::default();
        let p = problem();
        let ctx = cache.scoring_context(&p).unwrap();
        assert_eq!(ctx.targets().targets(), &[1.0]);

        let lease = cache.lease(&p);
        assert!(cache.drain().evicted.is_empty());
        assert!(cache.contains(&p, ArtifactKind::TargetTable));
        drop(lease);
        assert_eq!(cache.drain().evicted.len(), 4);
        assert!(!cache.contains(&p, ArtifactKind::TargetTable));
    }
}
