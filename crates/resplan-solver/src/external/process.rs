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
    external::{ExternalSolver, SolveRequest, SolverReply, err::SolverAttemptError},
    monitor::stop::StopToken,
};
use resplan_model::prelude::{SolverBundle, UnitId};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

/// Environment variable carrying the attempt seed.
pub const SEED_ENV: &str = "RESPLAN_SEED";

const INPUT_FILE: &str = "input.json";
const OUTPUT_FILE: &str = "output.json";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSolverConfig {
    pub program: PathBuf,
    /// Arguments placed before the input and output paths.
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ProcessSolverConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_millis(20),
        }
    }

    #[inline]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[derive(Serialize)]
struct SolverInput<'a> {
    replicate: usize,
    attempt: u32,
    seed: u64,
    bundle: &'a SolverBundle,
}

#[derive(Deserialize)]
struct SolverOutput {
    selected: Vec<UnitId>,
}

/// Owned handle to a running solver process; kills it when dropped.
#[derive(Debug)]
pub struct SolverProcess {
    child: Child,
    finished: bool,
}

impl SolverProcess {
    #[inline]
    pub fn new(child: Child) -> Self {
        Self {
            child,
            finished: false,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Waits for exit, killing the process on timeout or cancellation.
    pub fn wait(
        &mut self,
        timeout: Duration,
        poll_interval: Duration,
        stop: &StopToken,
    ) -> Result<ExitStatus, SolverAttemptError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.finished = true;
                return Ok(status);
            }
            if stop.is_set() {
                self.kill();
                return Err(SolverAttemptError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                self.kill();
                return Err(SolverAttemptError::Timeout(timeout));
            }
            std::thread::sleep(poll_interval.min(deadline - now));
        }
    }

    pub fn kill(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.child.kill() {
            tracing::debug!(pid = self.child.id(), error = %e, "Failed to kill solver process");
        }
        let _ = self.child.wait();
        self.finished = true;
    }
}

impl Drop for SolverProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Runs an external solver executable once per attempt.
///
/// Every attempt gets a fresh temporary working directory holding
/// `input.json`, `output.json` and the captured stdout and stderr. The
/// program is invoked as `program args... <input> <output>` with the seed in
/// `RESPLAN_SEED`, and must write `{"selected": [unit ids]}` to `<output>`.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    config: ProcessSolverConfig,
}

impl ProcessSolver {
    #[inline]
    pub fn new(config: ProcessSolverConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ProcessSolverConfig {
        &self.config
    }

    fn write_input(path: &Path, request: &SolveRequest<'_>) -> Result<(), SolverAttemptError> {
        let file = File::create(path)?;
        Self::encode_input(BufWriter::new(file), request)
    }

    fn encode_input<W: Write>(mut writer: W, request: &SolveRequest<'_>) -> Result<(), SolverAttemptError> {
        let input = SolverInput {
            replicate: request.replicate,
            attempt: request.attempt,
            seed: request.seed,
            bundle: request.bundle,
        };
        serde_json::to_writer(&mut writer, &input).map_err(|e| SolverAttemptError::Io(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    fn stderr_tail(path: &Path) -> String {
        let text = std::fs::read_to_string(path).unwrap_or_default();
        let start = text.len().saturating_sub(STDERR_TAIL);
        let start = (start..text.len())
            .find(|&i| text.is_char_boundary(i))
            .unwrap_or(text.len());
        text[start..].to_string()
    }
}

impl ExternalSolver for ProcessSolver {
    fn name(&self) -> &str {
        self.config
            .program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("process")
    }

    #[tracing::instrument(level = "debug", skip(self, request, stop), fields(replicate = request.replicate, attempt = request.attempt))]
    fn solve(
        &self,
        request: &SolveRequest<'_>,
        stop: &StopToken,
    ) -> Result<SolverReply, SolverAttemptError> {
        if stop.is_set() {
            return Err(SolverAttemptError::Cancelled);
        }

        let workdir = tempfile::Builder::new().prefix("resplan-").tempdir()?;
        let input = workdir.path().join(INPUT_FILE);
        let output = workdir.path().join(OUTPUT_FILE);
        let stdout_path = workdir.path().join(STDOUT_FILE);
        let stderr_path = workdir.path().join(STDERR_FILE);
        Self::write_input(&input, request)?;

        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&input)
            .arg(&output)
            .current_dir(workdir.path())
            .env(SEED_ENV, request.seed.to_string())
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path)?)
            .stderr(File::create(&stderr_path)?)
            .spawn()
            .map_err(|e| {
                SolverAttemptError::Spawn(format!("{}: {}", self.config.program.display(), e))
            })?;

        let mut process = SolverProcess::new(child);
        tracing::debug!(pid = process.id(), "Spawned solver");
        let status = process.wait(self.config.timeout, self.config.poll_interval, stop)?;

        if !status.success() {
            return Err(SolverAttemptError::NonZeroExit {
                code: status.code(),
                stderr: Self::stderr_tail(&stderr_path),
            });
        }

        let text = std::fs::read_to_string(&output).map_err(|e| {
            SolverAttemptError::MalformedOutput(format!("missing {}: {}", OUTPUT_FILE, e))
        })?;
        let parsed: SolverOutput = serde_json::from_str(&text)?;
        let log = std::fs::read_to_string(&stdout_path).unwrap_or_default();

        Ok(SolverReply {
            selected: parsed.selected,
            log,
        })
    }
}
