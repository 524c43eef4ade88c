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
    problem::{definition::ProblemDefinition, feature::FeatureId, unit::UnitId},
    solution::{
        FailedSlot, Solution,
        score::{ScoreConfig, ScoringContext, SolutionMetrics},
        selection::Selection,
    },
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of [`Portfolio::summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSummary {
    pub replicate: usize,
    pub score: f64,
    pub cost: f64,
    pub planning_units: usize,
    pub boundary: f64,
    pub penalty: f64,
    pub shortfall: f64,
    pub missing_values: usize,
    pub mpm: f64,
}

/// The immutable result of one solver invocation.
///
/// Solutions are ordered by replicate index. Slots that failed are absent
/// from the solution list and reported by [`Portfolio::failed`].
#[derive(Debug, Clone)]
pub struct Portfolio {
    unit_ids: Vec<UnitId>,
    feature_ids: Vec<FeatureId>,
    targets: Vec<f64>,
    solutions: Vec<Solution>,
    failed: Vec<FailedSlot>,
    requested: usize,
    frequency: Vec<f64>,
    config: ScoreConfig,
}

impl Portfolio {
    /// Evaluates every selection and builds the portfolio.
    pub fn new(
        problem: &ProblemDefinition,
        ctx: &ScoringContext,
        config: ScoreConfig,
        selections: Vec<(usize, Selection)>,
        mut failed: Vec<FailedSlot>,
        requested: usize,
    ) -> Self {
        let mut solutions: Vec<Solution> = selections
            .into_par_iter()
            .map(|(replicate, selection)| {
                let metrics = SolutionMetrics::evaluate(ctx, &config, &selection);
                Solution::new(replicate, selection, metrics)
            })
            .collect();
        solutions.sort_by_key(|s| s.replicate());
        failed.sort_by_key(|f| f.replicate);

        let units = problem.unit_count();
        let mut frequency = vec![0.0; units];
        if !solutions.is_empty() {
            for s in &solutions {
                for u in s.selection().positions() {
                    frequency[u] += 1.0;
                }
            }
            let n = solutions.len() as f64;
            frequency.iter_mut().for_each(|f| *f /= n);
        }

        Self {
            unit_ids: problem.unit_ids(),
            feature_ids: problem.feature_ids(),
            targets: ctx.targets().targets().to_vec(),
            solutions,
            failed,
            requested,
            frequency,
            config,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    #[inline]
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    #[inline]
    pub fn solution(&self, index: usize) -> Option<&Solution> {
        self.solutions.get(index)
    }

    pub fn by_replicate(&self, replicate: usize) -> Option<&Solution> {
        self.solutions
            .binary_search_by_key(&replicate, |s| s.replicate())
            .ok()
            .map(|i| &self.solutions[i])
    }

    #[inline]
    pub fn failed(&self) -> &[FailedSlot] {
        &self.failed
    }

    /// Number of replicate slots submitted.
    #[inline]
    pub fn requested(&self) -> usize {
        self.requested
    }

    #[inline]
    pub fn unit_ids(&self) -> &[UnitId] {
        &self.unit_ids
    }

    #[inline]
    pub fn feature_ids(&self) -> &[FeatureId] {
        &self.feature_ids
    }

    /// Absolute targets the solutions were scored against.
    #[inline]
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    #[inline]
    pub fn score_config(&self) -> &ScoreConfig {
        &self.config
    }

    /// `[solution][feature]`: whether the solution meets the feature target.
    pub fn targets_met(&self) -> Vec<Vec<bool>> {
        self.solutions
            .iter()
            .map(|s| s.metrics().targets_met(&self.targets))
            .collect()
    }

    pub fn costs(&self) -> Vec<f64> {
        self.solutions.iter().map(Solution::cost).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.solutions.iter().map(Solution::score).collect()
    }

    pub fn shortfalls(&self) -> Vec<Vec<f64>> {
        self.solutions
            .iter()
            .map(|s| s.shortfall().to_vec())
            .collect()
    }

    pub fn amount_held(&self) -> Vec<Vec<f64>> {
        self.solutions
            .iter()
            .map(|s| s.metrics().amount_held.clone())
            .collect()
    }

    pub fn mpm(&self) -> Vec<f64> {
        self.solutions.iter().map(|s| s.metrics().mpm).collect()
    }

    /// Fraction of solutions selecting each unit, in canonical unit order.
    #[inline]
    pub fn selection_frequency(&self) -> &[f64] {
        &self.frequency
    }

    /// Lowest scoring solution; the earliest one wins ties.
    pub fn best(&self) -> Option<&Solution> {
        self.solutions.iter().fold(None, |best, s| match best {
            Some(b) if b.score() <= s.score() => Some(b),
            _ => Some(s),
        })
    }

    pub fn summary(&self) -> Vec<SolutionSummary> {
        self.solutions
            .iter()
            .map(|s| {
                let m = s.metrics();
                SolutionSummary {
                    replicate: s.replicate(),
                    score: m.score,
                    cost: m.cost,
                    planning_units: s.selection().count(),
                    boundary: m.boundary,
                    penalty: m.penalty,
                    shortfall: m.shortfall.iter().sum(),
                    missing_values: m
                        .targets_met(&self.targets)
                        .iter()
                        .filter(|met| !**met)
                        .count(),
                    mpm: m.mpm,
                }
            })
            .collect()
    }
}
