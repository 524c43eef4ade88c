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

pub mod err;

use crate::{
    cache::preprocessing::PreprocessingCache,
    external::{ExternalSolver, SolveRequest, err::SolverAttemptError},
    invoker::err::{CancelledError, InsufficientSolutionsError, RunError},
    monitor::stop::StopToken,
};
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use resplan_model::prelude::{
    FailedSlot, Portfolio, ProblemDefinition, ScoreConfig, Selection, SolverBundle,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// What a run returns once its stop token fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// The run fails with [`RunError::Cancelled`].
    #[default]
    Fail,
    /// The run returns the slots that completed; the rest are recorded as
    /// failed.
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Attempts per replicate slot, including the first.
    pub max_attempts: u32,
    /// Largest tolerated share of failed slots.
    pub max_failure_fraction: f64,
    pub cancel_mode: CancelMode,
    pub scoring: ScoreConfig,
}

impl Default for InvokerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_failure_fraction: 0.5,
            cancel_mode: CancelMode::Fail,
            scoring: ScoreConfig::default(),
        }
    }
}

/// Per-slot seeds for a run, one draw per slot in submission order.
pub fn replicate_seeds(base_seed: u64, replicates: usize) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    (0..replicates).map(|_| rng.next_u64()).collect()
}

/// Seed for a retry; the first attempt uses the slot seed unchanged.
pub fn attempt_seed(slot_seed: u64, attempt: u32) -> u64 {
    if attempt == 0 {
        return slot_seed;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(slot_seed);
    rng.set_stream(attempt as u64);
    rng.next_u64()
}

enum SlotOutcome {
    Solved(Selection),
    Failed(FailedSlot),
    Cancelled(FailedSlot),
}

/// Runs an [`ExternalSolver`] once per replicate and assembles the portfolio.
pub struct SolverInvoker<S> {
    solver: S,
    cache: Arc<PreprocessingCache>,
    config: InvokerConfig,
}

impl<S> std::fmt::Debug for SolverInvoker<S>
where
    S: ExternalSolver,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverInvoker")
            .field("solver", &self.solver.name())
            .field("config", &self.config)
            .finish()
    }
}

impl<S> SolverInvoker<S>
where
    S: ExternalSolver,
{
    #[inline]
    pub fn new(solver: S, cache: Arc<PreprocessingCache>, config: InvokerConfig) -> Self {
        Self {
            solver,
            cache,
            config,
        }
    }

    #[inline]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    #[inline]
    pub fn cache(&self) -> &Arc<PreprocessingCache> {
        &self.cache
    }

    #[inline]
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Runs with the replicate count and concurrency stored in the problem
    /// options.
    #[inline]
    pub fn run_default(
        &self,
        problem: &ProblemDefinition,
        stop: &StopToken,
    ) -> Result<Portfolio, RunError> {
        let options = problem.options();
        self.run(problem, options.replicates, options.concurrency, stop)
    }

    /// Solves `replicates` independent slots with at most `concurrency`
    /// attempts in flight.
    ///
    /// Solutions in the returned portfolio are ordered by slot index no
    /// matter in which order attempts finish. Every artifact fingerprint of
    /// `problem` stays leased on the cache while the run is active.
    #[tracing::instrument(level = "debug", skip(self, problem, stop), fields(solver = self.solver.name()))]
    pub fn run(
        &self,
        problem: &ProblemDefinition,
        replicates: usize,
        concurrency: usize,
        stop: &StopToken,
    ) -> Result<Portfolio, RunError> {
        if replicates == 0 {
            return Err(ValidationError::ZeroReplicates.into());
        }
        if concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency.into());
        }

        let _lease = self.cache.lease(problem);
        let bundle = self.cache.solver_bundle(problem)?;
        let ctx = self.cache.scoring_context(problem)?;
        let seeds = replicate_seeds(problem.options().seed, replicates);

        let next = AtomicUsize::new(0);
        let outcomes: Mutex<Vec<Option<SlotOutcome>>> =
            Mutex::new((0..replicates).map(|_| None).collect());
        let workers = concurrency.min(replicates);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if stop.is_set() {
                            break;
                        }
                        let slot = next.fetch_add(1, Ordering::Relaxed);
                        if slot >= replicates {
                            break;
                        }
                        let outcome = self.solve_slot(problem, &bundle, slot, seeds[slot], stop);
                        outcomes.lock()[slot] = Some(outcome);
                    }
                });
            }
        });

        let mut selections = Vec::with_capacity(replicates);
        let mut failed = Vec::new();
        let mut cancelled = 0usize;
        for (slot, outcome) in outcomes.into_inner().into_iter().enumerate() {
            match outcome {
                Some(SlotOutcome::Solved(selection)) => selections.push((slot, selection)),
                Some(SlotOutcome::Failed(f)) => failed.push(f),
                Some(SlotOutcome::Cancelled(f)) => {
                    cancelled += 1;
                    failed.push(f);
                }
                None => {
                    cancelled += 1;
                    failed.push(FailedSlot {
                        replicate: slot,
                        attempts: 0,
                        reason: SolverAttemptError::Cancelled.to_string(),
                    });
                }
            }
        }

        if cancelled > 0 {
            tracing::debug!(cancelled, completed = selections.len(), "Run cancelled");
            if self.config.cancel_mode == CancelMode::Fail {
                return Err(CancelledError::new(selections.len(), replicates).into());
            }
        } else {
            let fraction = failed.len() as f64 / replicates as f64;
            if fraction > self.config.max_failure_fraction {
                return Err(InsufficientSolutionsError::new(
                    failed.len(),
                    replicates,
                    self.config.max_failure_fraction,
                )
                .into());
            }
        }

        let portfolio = Portfolio::new(
            problem,
            &ctx,
            self.config.scoring,
            selections,
            failed,
            replicates,
        );
        tracing::info!(
            solutions = portfolio.len(),
            failed = portfolio.failed().len(),
            requested = replicates,
            "Run finished"
        );
        Ok(portfolio)
    }

    fn solve_slot(
        &self,
        problem: &ProblemDefinition,
        bundle: &SolverBundle,
        slot: usize,
        seed: u64,
        stop: &StopToken,
    ) -> SlotOutcome {
        let mut attempts = 0u32;
        let mut last = SolverAttemptError::Cancelled;

        for attempt in 0..self.config.max_attempts.max(1) {
            if stop.is_set() {
                last = SolverAttemptError::Cancelled;
                break;
            }
            attempts += 1;
            let request = SolveRequest {
                replicate: slot,
                attempt,
                seed: attempt_seed(seed, attempt),
                bundle,
            };
            let result = self.solver.solve(&request, stop).and_then(|reply| {
                Selection::from_unit_ids(problem, &reply.selected)
                    .map_err(|e| SolverAttemptError::MalformedOutput(e.to_string()))
            });
            match result {
                Ok(selection) => return SlotOutcome::Solved(selection),
                Err(e) if !e.is_retryable() => {
                    last = e;
                    break;
                }
                Err(e) => {
                    tracing::warn!(replicate = slot, attempt, error = %e, "Solver attempt failed");
                    last = e;
                }
            }
        }

        let failed = FailedSlot {
            replicate: slot,
            attempts,
            reason: last.to_string(),
        };
        if stop.is_set() {
            SlotOutcome::Cancelled(failed)
        } else {
            SlotOutcome::Failed(failed)
        }
    }
}

pub struct SolverInvokerBuilder<S> {
    solver: S,
    cache: Option<Arc<PreprocessingCache>>,
    config: InvokerConfig,
}

impl<S> SolverInvokerBuilder<S>
where
    S: ExternalSolver,
{
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            cache: None,
            config: InvokerConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<PreprocessingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn with_max_failure_fraction(mut self, fraction: f64) -> Self {
        self.config.max_failure_fraction = fraction;
        self
    }

    pub fn with_cancel_mode(mut self, cancel_mode: CancelMode) -> Self {
        self.config.cancel_mode = cancel_mode;
        self
    }

    pub fn with_score_config(mut self, scoring: ScoreConfig) -> Self {
        self.config.scoring = scoring;
        self
    }

    pub fn build(self) -> SolverInvoker<S> {
        let cache = self.cache.unwrap_or_default();
        SolverInvoker::new(self.solver, cache, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::SolverReply;
    use resplan_model::prelude::{
        ArtifactKind, FeatureRecord, PlanningUnitRecord, ProblemAssembler, ProblemOptions, Target,
        UnitId,
    };
    use std::time::Duration;

    struct FnSolver<F>(F);

    impl<F> ExternalSolver for FnSolver<F>
    where
        F: Fn(&SolveRequest<'_>, &StopToken) -> Result<SolverReply, SolverAttemptError>
            + Send
            + Sync,
    {
        fn name(&self) -> &str {
            "fn"
        }

        fn solve(
            &self,
            request: &SolveRequest<'_>,
            stop: &StopToken,
        ) -> Result<SolverReply, SolverAttemptError> {
            (self.0)(request, stop)
        }
    }

    fn ids(raw: &[u32]) -> Vec<UnitId> {
        raw.iter().copied().map(UnitId::new).collect()
    }

    fn problem() -> ProblemDefinition {
        ProblemAssembler::new()
            .with_units([
                PlanningUnitRecord::new(1, 1.0, 0),
                PlanningUnitRecord::new(2, 1.0, 0),
                PlanningUnitRecord::new(3, 1.0, 0),
            ])
            .with_features([FeatureRecord::new(1, "a", Target::Absolute(2.0), 1.0)])
            .with_incidence([vec![1.0], vec![1.0], vec![1.0]])
            .with_options(ProblemOptions::default().with_replicates(4).with_concurrency(2))
            .assemble()
            .unwrap()
    }

    fn invoker<F>(f: F) -> SolverInvoker<FnSolver<F>>
    where
        F: Fn(&SolveRequest<'_>, &StopToken) -> Result<SolverReply, SolverAttemptError>
            + Send
            + Sync,
    {
        SolverInvokerBuilder::new(FnSolver(f)).build()
    }

    #[test]
    fn portfolio_is_ordered_by_slot_not_completion() {
        let p = problem();
        let replicates = 6;
        let inv = invoker(move |req, _| {
            std::thread::sleep(Duration::from_millis(10 * (replicates - req.replicate) as u64));
            Ok(SolverReply::new(ids(&[(req.replicate % 3) as u32 + 1])))
        });
        let portfolio = inv.run(&p, replicates, 6, &StopToken::new()).unwrap();

        assert_eq!(portfolio.len(), replicates);
        for (i, s) in portfolio.solutions().iter().enumerate() {
            assert_eq!(s.replicate(), i);
            assert_eq!(s.selection().positions().collect::<Vec<_>>(), vec![i % 3]);
        }
    }

    #[test]
    fn end_to_end_frequency_and_costs() {
        let p = problem();
        let replies = [vec![1, 2], vec![2, 3], vec![1, 3], vec![1, 2]];
        let inv = invoker(move |req, _| Ok(SolverReply::new(ids(&replies[req.replicate]))));
        let portfolio = inv.run_default(&p, &StopToken::new()).unwrap();

        assert_eq!(portfolio.costs(), vec![2.0, 2.0, 2.0, 2.0]);
        assert_eq!(portfolio.selection_frequency(), &[0.75, 0.75, 0.5]);
        assert!(portfolio.targets_met().iter().all(|row| row == &[true]));
        assert!(portfolio.failed().is_empty());
    }

    #[test]
    fn flaky_attempts_are_retried_and_persistent_failures_recorded() {
        let p = problem();
        let inv = invoker(|req, _| {
            if req.replicate == 1 {
                return Err(SolverAttemptError::Failed("always".into()));
            }
            if req.attempt < 2 {
                return Err(SolverAttemptError::NonZeroExit {
                    code: Some(1),
                    stderr: String::new(),
                });
            }
            Ok(SolverReply::new(ids(&[1])))
        });
        let portfolio = inv.run(&p, 4, 2, &StopToken::new()).unwrap();

        assert_eq!(portfolio.len(), 3);
        assert!(portfolio.by_replicate(1).is_none());
        assert_eq!(portfolio.failed().len(), 1);
        assert_eq!(portfolio.failed()[0].replicate, 1);
        assert_eq!(portfolio.failed()[0].attempts, 3);
        assert!(portfolio.failed()[0].reason.contains("always"));
    }

    #[test]
    fn unknown_units_in_reply_count_as_malformed() {
        let p = problem();
        let calls = AtomicUsize::new(0);
        let inv = invoker(|req, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            if req.attempt == 0 {
                Ok(SolverReply::new(ids(&[99])))
            } else {
                Ok(SolverReply::new(ids(&[2])))
            }
        });
        let portfolio = inv.run(&p, 2, 1, &StopToken::new()).unwrap();
        assert_eq!(portfolio.len(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn too_many_failures_is_an_error() {
        let p = problem();
        let inv = invoker(|req, _| {
            if req.replicate < 3 {
                Err(SolverAttemptError::Failed("no".into()))
            } else {
                Ok(SolverReply::new(ids(&[1])))
            }
        });
        let err = inv.run(&p, 4, 2, &StopToken::new()).unwrap_err();
        assert_eq!(
            err,
            RunError::InsufficientSolutions(InsufficientSolutionsError::new(3, 4, 0.5))
        );

        // exactly half is tolerated
        let inv = invoker(|req, _| {
            if req.replicate < 2 {
                Err(SolverAttemptError::Failed("no".into()))
            } else {
                Ok(SolverReply::new(ids(&[1])))
            }
        });
        assert_eq!(inv.run(&p, 4, 2, &StopToken::new()).unwrap().len(), 2);
    }

    fn slow_after_first(req: &SolveRequest<'_>, stop: &StopToken) -> Result<SolverReply, SolverAttemptError> {
        if req.replicate > 0 && stop.sleep(Duration::from_secs(10), Duration::from_millis(2)) {
            return Err(SolverAttemptError::Cancelled);
        }
        Ok(SolverReply::new(ids(&[1])))
    }

    fn run_cancelled(mode: CancelMode) -> Result<Portfolio, RunError> {
        let p = problem();
        let inv = SolverInvokerBuilder::new(FnSolver(slow_after_first))
            .with_cancel_mode(mode)
            .build();
        let stop = StopToken::new();
        std::thread::scope(|s| {
            let stop_ref = &stop;
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                stop_ref.request_stop();
            });
            inv.run(&p, 4, 2, &stop)
        })
    }

    #[test]
    fn cancellation_fails_the_run_by_default() {
        let err = run_cancelled(CancelMode::Fail).unwrap_err();
        assert_eq!(err, RunError::Cancelled(CancelledError::new(1, 4)));
    }

    #[test]
    fn partial_cancellation_returns_completed_slots() {
        let portfolio = run_cancelled(CancelMode::Partial).unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio.solutions()[0].replicate(), 0);
        assert_eq!(portfolio.failed().len(), 3);
        assert_eq!(
            portfolio.failed().iter().map(|f| f.replicate).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn solver_reported_cancellation_without_stop_is_a_failed_slot() {
        let p = problem();
        let inv = invoker(|req, _| {
            if req.replicate == 2 {
                return Err(SolverAttemptError::Cancelled);
            }
            Ok(SolverReply::new(ids(&[1])))
        });
        assert_eq!(inv.config().cancel_mode, CancelMode::Fail);
        let portfolio = inv.run(&p, 4, 2, &StopToken::new()).unwrap();

        assert_eq!(portfolio.len(), 3);
        assert_eq!(portfolio.failed().len(), 1);
        assert_eq!(portfolio.failed()[0].replicate, 2);
        assert_eq!(portfolio.failed()[0].attempts, 1);
    }

    #[test]
    fn seeds_are_deterministic_per_slot_and_attempt() {
        let p = problem();
        let seen = Mutex::new(Vec::new());
        let inv = invoker(|req, _| {
            seen.lock().push((req.replicate, req.attempt, req.seed));
            if req.attempt == 0 {
                Err(SolverAttemptError::Failed("retry".into()))
            } else {
                Ok(SolverReply::new(ids(&[1])))
            }
        });
        inv.run(&p, 4, 4, &StopToken::new()).unwrap();
        let mut first = std::mem::take(&mut *seen.lock());
        inv.run(&p, 4, 1, &StopToken::new()).unwrap();
        let mut second = std::mem::take(&mut *seen.lock());
        first.sort();
        second.sort();
        assert_eq!(first, second);

        let slots = replicate_seeds(p.options().seed, 4);
        for &(slot, attempt, seed) in &first {
            assert_eq!(seed, attempt_seed(slots[slot], attempt));
        }
        assert_ne!(attempt_seed(slots[0], 0), attempt_seed(slots[0], 1));
        let mut distinct = slots.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let p = problem();
        let inv = invoker(|_, _| Ok(SolverReply::new(ids(&[1]))));
        assert_eq!(
            inv.run(&p, 0, 1, &StopToken::new()).unwrap_err(),
            RunError::Validation(ValidationError::ZeroReplicates)
        );
        assert_eq!(
            inv.run(&p, 1, 0, &StopToken::new()).unwrap_err(),
            RunError::Validation(ValidationError::ZeroConcurrency)
        );
    }

    #[test]
    fn shared_cache_keeps_artifacts_across_runs() {
        let p = problem();
        let cache = Arc::new(PreprocessingCache::default());
        let inv = SolverInvokerBuilder::new(FnSolver(|_: &SolveRequest<'_>, _: &StopToken| {
            Ok(SolverReply::new(ids(&[1])))
        }))
        .with_cache(Arc::clone(&cache))
        .build();

        inv.run(&p, 2, 2, &StopToken::new()).unwrap();
        let computed = cache.stats().computations;
        assert!(cache.contains(&p, ArtifactKind::SolverBundle));
        inv.run(&p, 2, 2, &StopToken::new()).unwrap();
        assert_eq!(cache.stats().computations, computed);
    }
}
