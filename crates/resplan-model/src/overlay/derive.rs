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
    overlay::ParameterOverlay,
    problem::{
        definition::ProblemDefinition,
        err::ValidationError,
        kind::{DeltaCategory, ProblemParts},
    },
};
use std::sync::Arc;

/// Applies `overlay` to `base`, producing a new definition.
///
/// Only tables the overlay touches are rebuilt; everything else is shared
/// with `base`. Fingerprints of artifact kinds whose dependencies the overlay
/// does not touch are copied verbatim, so their cached artifacts stay valid.
/// No artifact is computed here.
#[tracing::instrument(level = "debug", skip(base, overlay), fields(overlay = overlay.name()))]
pub fn derive(
    base: &ProblemDefinition,
    overlay: &ParameterOverlay,
) -> Result<ProblemDefinition, ValidationError> {
    overlay.validate_against(base)?;
    let touched = overlay.categories();

    let units = if touched.contains(DeltaCategory::UnitCost)
        || touched.contains(DeltaCategory::UnitStatus)
    {
        let updated = base
            .units()
            .iter()
            .map(|u| {
                let mut u = *u;
                if let Some(&cost) = overlay.unit_costs().get(&u.id()) {
                    u = u.with_cost(cost);
                }
                if let Some(&status) = overlay.unit_status().get(&u.id()) {
                    u = u.with_status(status);
                }
                u
            })
            .collect();
        Arc::new(base.units().with_units(updated))
    } else {
        Arc::clone(base.units_arc())
    };

    let features = if touched.contains(DeltaCategory::FeatureTarget)
        || touched.contains(DeltaCategory::FeatureSpf)
    {
        let updated = base
            .features()
            .iter()
            .map(|f| {
                let mut f = f.clone();
                if let Some(&target) = overlay.feature_targets().get(&f.id()) {
                    f = f.with_target(target);
                }
                if let Some(&spf) = overlay.feature_spf().get(&f.id()) {
                    f = f.with_spf(spf);
                }
                f
            })
            .collect();
        Arc::new(base.features().with_features(updated))
    } else {
        Arc::clone(base.features_arc())
    };

    let mut options = *base.options();
    if let Some(blm) = overlay.blm() {
        options.blm = blm;
    }
    if let Some(replicates) = overlay.replicates() {
        options.replicates = replicates;
    }

    let amounts = Arc::clone(base.amounts_arc());
    let boundary = Arc::clone(base.boundary_arc());

    let fingerprints = ProblemParts {
        units: &units,
        features: &features,
        amounts: &amounts,
        boundary: &boundary,
        options: &options,
    }
    .refingerprint(Some(base.fingerprints()), touched);

    let mut lineage = base.lineage().to_vec();
    lineage.push(overlay.name().to_string());

    tracing::debug!(
        categories = ?touched.iter().collect::<Vec<_>>(),
        "Derived problem"
    );

    Ok(ProblemDefinition::from_derived(
        units,
        features,
        amounts,
        boundary,
        options,
        fingerprints,
        lineage,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        builder::ProblemAssembler,
        feature::{FeatureId, FeatureRecord, Target},
        kind::ArtifactKind,
        options::ProblemOptions,
        unit::{BoundaryRecord, PlanningUnitRecord, UnitId, UnitStatus},
    };

    fn assembler(costs: [f64; 3], target: Target, blm: f64) -> ProblemAssembler {
        ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(1, costs[0], 0),
                PlanningUnitRecord::new(2, costs[1], 0),
                PlanningUnitRecord::new(3, costs[2], 0),
            ])
            .with_features([
                FeatureRecord::new(1, "a", target, 1.0),
                FeatureRecord::new(2, "b", Target::Absolute(1.0), 1.0),
            ])
            .with_incidence([vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0]])
            .with_boundaries([
                BoundaryRecord::new(1, 2, 1.0),
                BoundaryRecord::new(2, 3, 1.0),
                BoundaryRecord::new(1, 1, 2.0),
            ])
            .with_options(
                ProblemOptions::default()
                    .with_blm(blm)
                    .with_replicates(4)
                    .with_concurrency(2),
            )
    }

    fn base() -> ProblemDefinition {
        assembler([1.0, 2.0, 3.0], Target::Absolute(1.0), 0.0)
            .assemble()
            .unwrap()
    }

    #[test]
    fn blm_only_changes_the_solver_bundle() {
        let b = base();
        let o = ParameterOverlay::builder("blm").blm(2.0).build();
        let d = derive(&b, &o).unwrap();

        for kind in ArtifactKind::ALL {
            let same = b.fingerprint(kind) == d.fingerprint(kind);
            assert_eq!(same, kind != ArtifactKind::SolverBundle, "{}", kind);
        }
        assert_eq!(d.options().blm, 2.0);
    }

    #[test]
    fn cost_change_keeps_structural_artifacts() {
        let b = base();
        let o = ParameterOverlay::builder("cost")
            .unit_cost(UnitId::new(2), 5.0)
            .build();
        let d = derive(&b, &o).unwrap();

        assert_eq!(
            b.fingerprint(ArtifactKind::BoundaryMatrix),
            d.fingerprint(ArtifactKind::BoundaryMatrix)
        );
        assert_eq!(
            b.fingerprint(ArtifactKind::IncidenceMatrix),
            d.fingerprint(ArtifactKind::IncidenceMatrix)
        );
        assert_eq!(
            b.fingerprint(ArtifactKind::TargetTable),
            d.fingerprint(ArtifactKind::TargetTable)
        );
        assert_ne!(
            b.fingerprint(ArtifactKind::CostVector),
            d.fingerprint(ArtifactKind::CostVector)
        );
        assert_ne!(
            b.fingerprint(ArtifactKind::SolverBundle),
            d.fingerprint(ArtifactKind::SolverBundle)
        );
    }

    #[test]
    fn target_change_keeps_boundary_matrix() {
        let b = base();
        let o = ParameterOverlay::builder("target")
            .feature_target(FeatureId::new(1), Target::Proportion(0.8))
            .build();
        let d = derive(&b, &o).unwrap();

        for kind in [
            ArtifactKind::BoundaryMatrix,
            ArtifactKind::IncidenceMatrix,
            ArtifactKind::CostVector,
        ] {
            assert_eq!(b.fingerprint(kind), d.fingerprint(kind), "{}", kind);
        }
        for kind in [ArtifactKind::TargetTable, ArtifactKind::SolverBundle] {
            assert_ne!(b.fingerprint(kind), d.fingerprint(kind), "{}", kind);
        }
        assert!(Arc::ptr_eq(b.boundary_arc(), d.boundary_arc()));
    }

    #[test]
    fn untouched_tables_are_shared() {
        let b = base();
        let o = ParameterOverlay::builder("spf")
            .feature_spf(FeatureId::new(2), 4.0)
            .build();
        let d = derive(&b, &o).unwrap();

        assert!(Arc::ptr_eq(b.units_arc(), d.units_arc()));
        assert!(Arc::ptr_eq(b.amounts_arc(), d.amounts_arc()));
        assert!(Arc::ptr_eq(b.boundary_arc(), d.boundary_arc()));
        assert!(!Arc::ptr_eq(b.features_arc(), d.features_arc()));
        assert_eq!(d.features().by_id(FeatureId::new(2)).unwrap().spf(), 4.0);
        assert_eq!(b.features().by_id(FeatureId::new(2)).unwrap().spf(), 1.0);
    }

    #[test]
    fn replicate_count_changes_no_fingerprint() {
        let b = base();
        let d = derive(&b, &ParameterOverlay::builder("r").replicates(9).build()).unwrap();
        assert_eq!(b.fingerprints(), d.fingerprints());
        assert_eq!(d.options().replicates, 9);
    }

    #[test]
    fn derived_fingerprints_match_fresh_assembly() {
        let b = base();
        let o = ParameterOverlay::builder("mix")
            .unit_cost(UnitId::new(1), 7.0)
            .feature_target(FeatureId::new(1), Target::Proportion(0.5))
            .blm(1.5)
            .build();
        let d = derive(&b, &o).unwrap();
        let fresh = assembler([7.0, 2.0, 3.0], Target::Proportion(0.5), 1.5)
            .assemble()
            .unwrap();
        assert_eq!(d.fingerprints(), fresh.fingerprints());
    }

    #[test]
    fn sequential_derive_equals_merged_overlay() {
        let b = base();
        let d1 = ParameterOverlay::builder("d1")
            .unit_cost(UnitId::new(1), 4.0)
            .blm(1.0)
            .build();
        let d2 = ParameterOverlay::builder("d2")
            .unit_cost(UnitId::new(1), 6.0)
            .unit_status(UnitId::new(3), UnitStatus::LockedIn)
            .build();

        let stepwise = derive(&derive(&b, &d1).unwrap(), &d2).unwrap();
        let merged = derive(&b, &d1.merge(&d2)).unwrap();

        assert_eq!(stepwise.fingerprints(), merged.fingerprints());
        assert_eq!(stepwise.options(), merged.options());
        assert_eq!(stepwise.lineage(), &["d1".to_string(), "d2".to_string()]);
        assert_eq!(merged.lineage(), &["d1+d2".to_string()]);
        let u1 = stepwise.units().by_id(UnitId::new(1)).unwrap();
        assert_eq!(u1.cost(), 6.0);
    }

    #[test]
    fn rejects_invalid_overlays() {
        let b = base();
        let unknown = ParameterOverlay::builder("x")
            .unit_cost(UnitId::new(99), 1.0)
            .build();
        assert_eq!(
            derive(&b, &unknown).unwrap_err(),
            ValidationError::UnknownUnit(UnitId::new(99))
        );

        let negative = ParameterOverlay::builder("x")
            .unit_cost(UnitId::new(1), -1.0)
            .build();
        assert!(matches!(
            derive(&b, &negative).unwrap_err(),
            ValidationError::InvalidCost { .. }
        ));

        let target = ParameterOverlay::builder("x")
            .feature_target(FeatureId::new(1), Target::Proportion(2.0))
            .build();
        assert!(matches!(
            derive(&b, &target).unwrap_err(),
            ValidationError::InvalidTarget { .. }
        ));

        let feature = ParameterOverlay::builder("x")
            .feature_spf(FeatureId::new(42), 1.0)
            .build();
        assert_eq!(
            derive(&b, &feature).unwrap_err(),
            ValidationError::UnknownFeature(FeatureId::new(42))
        );

        let blm = ParameterOverlay::builder("x").blm(f64::NAN).build();
        assert!(matches!(
            derive(&b, &blm).unwrap_err(),
            ValidationError::InvalidBlm(_)
        ));

        let zero = ParameterOverlay::builder("x").replicates(0).build();
        assert_eq!(derive(&b, &zero).unwrap_err(), ValidationError::ZeroReplicates);
    }
}
