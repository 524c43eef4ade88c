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

pub mod cache;
pub mod external;
pub mod invoker;
pub mod monitor;

pub mod prelude {
    pub use crate::cache::{
        err::{CacheComputationError, CacheError},
        preprocessing::PreprocessingCache,
        store::{
            ArtifactCache, CacheConfig, CacheLease, CacheStats, EvictionPolicy, EvictionReport,
            Provenance, Weigh,
        },
    };
    pub use crate::external::{
        ExternalSolver, SolveRequest, SolverReply,
        err::SolverAttemptError,
        process::{ProcessSolver, ProcessSolverConfig, SolverProcess},
    };
    pub use crate::invoker::{
        CancelMode, InvokerConfig, SolverInvoker, SolverInvokerBuilder, attempt_seed,
        err::{CancelledError, InsufficientSolutionsError, RunError},
        replicate_seeds,
    };
    pub use crate::monitor::stop::StopToken;
}
