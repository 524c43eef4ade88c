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
    artifact::{
        self, ArtifactError, boundary::BoundaryMatrix, cost::CostVector,
        incidence::IncidenceMatrix, target::TargetTable,
    },
    problem::definition::ProblemDefinition,
    solution::selection::Selection,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Slack for floating point noise when comparing held amounts to targets.
pub const TARGET_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallMode {
    /// Penalize the raw shortfall amount.
    #[default]
    Absolute,
    /// Penalize the shortfall as a fraction of the target.
    Relative,
}

/// Weights of the score terms.
///
/// `score = cost_weight * cost + boundary_weight * blm * boundary
///        + penalty_weight * sum_f(spf_f * shortfall_f)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub cost_weight: f64,
    pub boundary_weight: f64,
    pub penalty_weight: f64,
    pub shortfall_mode: ShortfallMode,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            cost_weight: 1.0,
            boundary_weight: 1.0,
            penalty_weight: 1.0,
            shortfall_mode: ShortfallMode::Absolute,
        }
    }
}

impl ScoreConfig {
    #[inline]
    pub fn with_cost_weight(mut self, w: f64) -> Self {
        self.cost_weight = w;
        self
    }

    #[inline]
    pub fn with_boundary_weight(mut self, w: f64) -> Self {
        self.boundary_weight = w;
        self
    }

    #[inline]
    pub fn with_penalty_weight(mut self, w: f64) -> Self {
        self.penalty_weight = w;
        self
    }

    #[inline]
    pub fn with_shortfall_mode(mut self, mode: ShortfallMode) -> Self {
        self.shortfall_mode = mode;
        self
    }
}

/// The artifacts needed to evaluate selections against one problem.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    boundary: Arc<BoundaryMatrix>,
    incidence: Arc<IncidenceMatrix>,
    costs: Arc<CostVector>,
    targets: Arc<TargetTable>,
    blm: f64,
}

impl ScoringContext {
    pub fn new(
        boundary: Arc<BoundaryMatrix>,
        incidence: Arc<IncidenceMatrix>,
        costs: Arc<CostVector>,
        targets: Arc<TargetTable>,
        blm: f64,
    ) -> Self {
        Self {
            boundary,
            incidence,
            costs,
            targets,
            blm,
        }
    }

    /// Computes the artifacts directly, bypassing any cache.
    pub fn from_problem(problem: &ProblemDefinition) -> Result<Self, ArtifactError> {
        let boundary = Arc::new(artifact::boundary_matrix(problem)?);
        let incidence = Arc::new(artifact::incidence_matrix(problem)?);
        let costs = Arc::new(artifact::cost_vector(problem));
        let targets = Arc::new(artifact::target_table(problem)?);
        Ok(Self::new(
            boundary,
            incidence,
            costs,
            targets,
            problem.options().blm,
        ))
    }

    #[inline]
    pub fn boundary(&self) -> &BoundaryMatrix {
        &self.boundary
    }

    #[inline]
    pub fn incidence(&self) -> &IncidenceMatrix {
        &self.incidence
    }

    #[inline]
    pub fn costs(&self) -> &CostVector {
        &self.costs
    }

    #[inline]
    pub fn targets(&self) -> &TargetTable {
        &self.targets
    }

    #[inline]
    pub fn blm(&self) -> f64 {
        self.blm
    }
}

/// Metrics of one selection, computed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionMetrics {
    pub cost: f64,
    pub boundary: f64,
    pub amount_held: Vec<f64>,
    pub shortfall: Vec<f64>,
    pub penalty: f64,
    pub score: f64,
    /// Minimum proportion of any target met, capped at 1.
    pub mpm: f64,
}

impl SolutionMetrics {
    pub fn evaluate(ctx: &ScoringContext, config: &ScoreConfig, selection: &Selection) -> Self {
        let bits = selection.as_bitset();
        let cost = ctx.costs.total(bits);
        let boundary = ctx.boundary.boundary_of(bits);
        let amount_held = ctx.incidence.held(bits);
        let targets = ctx.targets.targets();

        let shortfall: Vec<f64> = amount_held
            .iter()
            .zip(targets)
            .map(|(&held, &target)| (target - held).max(0.0))
            .collect();

        let penalty = shortfall
            .iter()
            .zip(targets)
            .zip(ctx.targets.spf())
            .map(|((&s, &target), &spf)| match config.shortfall_mode {
                ShortfallMode::Absolute => spf * s,
                ShortfallMode::Relative if target > 0.0 => spf * s / target,
                ShortfallMode::Relative => 0.0,
            })
            .sum::<f64>();

        let mpm = amount_held
            .iter()
            .zip(targets)
            .map(|(&held, &target)| {
                if target > 0.0 {
                    (held / target).min(1.0)
                } else {
                    1.0
                }
            })
            .fold(1.0, f64::min);

        let score = config.cost_weight * cost
            + config.boundary_weight * ctx.blm * boundary
            + config.penalty_weight * penalty;

        Self {
            cost,
            boundary,
            amount_held,
            shortfall,
            penalty,
            score,
            mpm,
        }
    }

    /// Per feature, whether the held amount reaches the target.
    pub fn targets_met(&self, targets: &[f64]) -> Vec<bool> {
        self.amount_held
            .iter()
            .zip(targets)
            .map(|(&held, &target)| held + TARGET_TOLERANCE >= target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{
        builder::ProblemAssembler,
        feature::{FeatureRecord, Target},
        options::ProblemOptions,
        unit::{BoundaryRecord, PlanningUnitRecord},
    };

    fn ctx(blm: f64) -> ScoringContext {
        let p = ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(1, 2.0, 0),
                PlanningUnitRecord::new(2, 3.0, 0),
            ])
            .with_features([
                FeatureRecord::new(1, "a", Target::Absolute(4.0), 2.0),
                FeatureRecord::new(2, "b", Target::Absolute(1.0), 1.0),
            ])
            .with_incidence([vec![1.0, 1.0], vec![2.0, 0.0]])
            .with_boundaries([BoundaryRecord::new(1, 2, 5.0)])
            .with_options(ProblemOptions::default().with_blm(blm))
            .assemble()
            .unwrap();
        ScoringContext::from_problem(&p).unwrap()
    }

    #[test]
    fn evaluates_every_term() {
        let c = ctx(0.5);
        let s = Selection::from_positions(2, [0]);
        let m = SolutionMetrics::evaluate(&c, &ScoreConfig::default(), &s);
        assert_eq!(m.cost, 2.0);
        assert_eq!(m.boundary, 5.0);
        assert_eq!(m.amount_held, vec![1.0, 1.0]);
        assert_eq!(m.shortfall, vec![3.0, 0.0]);
        assert_eq!(m.penalty, 6.0);
        assert_eq!(m.score, 2.0 + 0.5 * 5.0 + 6.0);
        assert_eq!(m.mpm, 0.25);
        assert_eq!(m.targets_met(c.targets().targets()), vec![false, true]);
    }

    #[test]
    fn relative_mode_scales_by_target() {
        let c = ctx(0.0);
        let s = Selection::from_positions(2, [0]);
        let cfg = ScoreConfig::default()
            .with_shortfall_mode(ShortfallMode::Relative)
            .with_cost_weight(0.0);
        let m = SolutionMetrics::evaluate(&c, &cfg, &s);
        assert_eq!(m.penalty, 2.0 * 3.0 / 4.0);
        assert_eq!(m.score, m.penalty);
    }
}
