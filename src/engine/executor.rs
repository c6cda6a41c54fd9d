//! Fan-out over app environments.
//!
//! Each environment runs on its own worker with its own backend and output
//! sink. Errors and panics stop at the environment boundary and end up in
//! the [`RunReport`]; one environment failing never stops the others.

use anyhow::{Context as AnyhowContext, Result};
use appconfig::AppEnvKey;
use colored::Colorize;
use platform::Backend;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::output::{LabeledSink, OutputSink};

/// Worker count when `--jobs` is not given.
pub const DEFAULT_JOBS: usize = 4;

/// Creates one backend per environment task.
pub trait BackendFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Backend>>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Result<Box<dyn Backend>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn Backend>> {
        self()
    }
}

/// How one environment's task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOutcome {
    Completed,
    Failed(String),
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct EnvReport {
    pub key: AppEnvKey,
    pub outcome: EnvOutcome,
}

/// Outcomes of one fan-out, in selection order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub envs: Vec<EnvReport>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, EnvOutcome::Completed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EnvOutcome::Failed(_)))
    }

    pub fn interrupted(&self) -> usize {
        self.count(|o| matches!(o, EnvOutcome::Interrupted))
    }

    pub fn is_success(&self) -> bool {
        self.completed() == self.envs.len()
    }

    fn count(&self, pred: impl Fn(&EnvOutcome) -> bool) -> usize {
        self.envs.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Print the summary and turn failures into an error.
    pub fn finish(&self, action: &str) -> Result<()> {
        print_summary(self, action);
        if self.is_success() {
            Ok(())
        } else {
            anyhow::bail!(
                "{action} did not complete for {} of {} app environment(s)",
                self.envs.len() - self.completed(),
                self.envs.len()
            )
        }
    }
}

type SinkFactory = dyn Fn(&AppEnvKey, usize) -> Box<dyn OutputSink> + Send + Sync;

/// Runs one operation per key, sequentially or on a bounded pool.
pub struct Executor<'a> {
    jobs: usize,
    backends: &'a dyn BackendFactory,
    sinks: Box<SinkFactory>,
}

impl<'a> Executor<'a> {
    pub fn new(jobs: usize, backends: &'a dyn BackendFactory) -> Self {
        Self {
            jobs: jobs.max(1),
            backends,
            sinks: Box::new(|key, slot| Box::new(LabeledSink::new(&key.to_string(), slot))),
        }
    }

    /// Replace the per-environment sink (labeled stdout by default).
    pub fn with_sinks(
        mut self,
        sinks: impl Fn(&AppEnvKey, usize) -> Box<dyn OutputSink> + Send + Sync + 'static,
    ) -> Self {
        self.sinks = Box::new(sinks);
        self
    }

    /// Run `op` once per key. With `jobs == 1` keys run one after another.
    pub fn for_each<F>(&self, keys: &[AppEnvKey], op: F) -> Result<RunReport>
    where
        F: Fn(&AppEnvKey, &dyn Backend, &mut dyn OutputSink) -> Result<EnvOutcome> + Sync,
    {
        let run_one = |(slot, key): (usize, &AppEnvKey)| self.run_one(slot, key, &op);

        let envs = if self.jobs == 1 || keys.len() <= 1 {
            keys.iter().enumerate().map(run_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs.min(keys.len()))
                .build()
                .context("Failed to create environment thread pool")?;
            log::debug!(
                "running {} environments on {} workers",
                keys.len(),
                pool.current_num_threads()
            );
            pool.install(|| keys.par_iter().enumerate().map(run_one).collect())
        };

        Ok(RunReport { envs })
    }

    fn run_one<F>(&self, slot: usize, key: &AppEnvKey, op: &F) -> EnvReport
    where
        F: Fn(&AppEnvKey, &dyn Backend, &mut dyn OutputSink) -> Result<EnvOutcome> + Sync,
    {
        let mut sink = (self.sinks)(key, slot);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let backend = self.backends.create()?;
            op(key, backend.as_ref(), sink.as_mut())
        }));

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => EnvOutcome::Failed(format!("{e:#}")),
            Err(payload) => EnvOutcome::Failed(format!("panicked: {}", panic_message(&*payload))),
        };

        match &outcome {
            EnvOutcome::Completed => {}
            EnvOutcome::Failed(message) => sink.line(&format!("{} {message}", "ERROR".red().bold())),
            EnvOutcome::Interrupted => sink.line(&"Interrupted".yellow().to_string()),
        }

        EnvReport {
            key: key.clone(),
            outcome,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Print final summary
fn print_summary(report: &RunReport, action: &str) {
    if report.envs.len() <= 1 && report.is_success() {
        return;
    }

    println!();
    if report.is_success() {
        println!(
            "  {} {action} completed for {} app environment(s)",
            "✓".green().bold(),
            report.completed()
        );
        return;
    }

    println!("  {} {action} finished with problems", "⚠".yellow().bold());
    if report.completed() > 0 {
        println!("    • {} completed", report.completed());
    }
    if report.interrupted() > 0 {
        println!("    • {} interrupted", report.interrupted());
    }
    for env in &report.envs {
        if let EnvOutcome::Failed(message) = &env.outcome {
            println!("    • {} {}: {message}", env.key.to_string().red(), "failed".red());
        }
    }
}
