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
    definition::ProblemDefinition,
    feature::FeatureId,
    unit::{UnitId, UnitStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BundleUnit {
    pub id: UnitId,
    pub cost: f64,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleFeature {
    pub id: FeatureId,
    pub name: String,
    /// Absolute target; proportional targets are already resolved.
    pub target: f64,
    pub spf: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BundleAmount {
    pub unit: UnitId,
    pub feature: FeatureId,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BundleEdge {
    pub a: UnitId,
    pub b: UnitId,
    pub length: f64,
}

/// The structured input handed to an external solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverBundle {
    pub units: Vec<BundleUnit>,
    pub features: Vec<BundleFeature>,
    pub incidence: Vec<BundleAmount>,
    pub boundaries: Vec<BundleEdge>,
    pub blm: f64,
    pub iterations: u64,
}

impl SolverBundle {
    pub fn from_problem(problem: &ProblemDefinition) -> Self {
        let units = problem.units();
        let features = problem.features();
        let amounts = problem.amounts();

        let mut incidence = Vec::new();
        for (u, unit) in units.iter().enumerate() {
            for (f, &amount) in amounts.row(u).iter().enumerate() {
                if amount != 0.0 {
                    incidence.push(BundleAmount {
                        unit: unit.id(),
                        feature: features.as_slice()[f].id(),
                        amount,
                    });
                }
            }
        }

        let unit_at = |pos: usize| units.as_slice()[pos].id();

        Self {
            units: units
                .iter()
                .map(|u| BundleUnit {
                    id: u.id(),
                    cost: u.cost(),
                    status: u.status(),
                })
                .collect(),
            features: features
                .iter()
                .enumerate()
                .map(|(f, feat)| BundleFeature {
                    id: feat.id(),
                    name: feat.name().to_string(),
                    target: feat.target().resolve(amounts.feature_total(f)),
                    spf: feat.spf(),
                })
                .collect(),
            incidence,
            boundaries: problem
                .boundary()
                .iter()
                .map(|e| BundleEdge {
                    a: unit_at(e.a),
                    b: unit_at(e.b),
                    length: e.length,
                })
                .collect(),
            blm: problem.options().blm,
            iterations: problem.options().iterations,
        }
    }

    pub fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.units.len() * std::mem::size_of::<BundleUnit>()
            + self
                .features
                .iter()
                .map(|f| std::mem::size_of::<BundleFeature>() + f.name.len())
                .sum::<usize>()
            + self.incidence.len() * std::mem::size_of::<BundleAmount>()
            + self.boundaries.len() * std::mem::size_of::<BundleEdge>()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.features.iter().all(|f| f.target.is_finite())
    }
}
