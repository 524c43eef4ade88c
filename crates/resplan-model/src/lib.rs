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

pub mod artifact;
pub mod common;
pub mod overlay;
pub mod problem;
pub mod solution;

pub mod prelude {
    pub use crate::artifact::{
        Artifact, ArtifactError, boundary::BoundaryMatrix, bundle::SolverBundle,
        cost::CostVector, incidence::IncidenceMatrix, target::TargetTable,
    };
    pub use crate::overlay::{ParameterOverlay, ParameterOverlayBuilder, derive::derive};
    pub use crate::problem::{
        builder::{ProblemAssembler, assemble},
        definition::ProblemDefinition,
        err::{ProblemLoaderError, ValidationError},
        feature::{Feature, FeatureId, FeatureRecord, Target},
        kind::{ArtifactKind, DeltaCategories, DeltaCategory, FingerprintTable},
        loader::{ProblemDocument, ProblemLoader},
        options::ProblemOptions,
        unit::{BoundaryRecord, GeometryHandle, PlanningUnit, PlanningUnitRecord, UnitId, UnitStatus},
    };
    pub use crate::solution::{
        FailedSlot, Solution,
        err::SelectionError,
        portfolio::{Portfolio, SolutionSummary},
        score::{ScoreConfig, ScoringContext, ShortfallMode, SolutionMetrics},
        selection::Selection,
    };
}
