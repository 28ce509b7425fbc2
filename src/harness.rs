use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use tokio::{
    fs::File,
    io::{AsyncWrite, BufWriter},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    clock::{elapsed_millis, WallInstant},
    common::{DEFAULT_KEY_SPACE, DEFAULT_SAMPLE_PERIOD},
    error::BenchError,
    populate::populate,
    retry::{retry, FailFast, RetryStrategy},
    stats::{Counters, ThroughputSample, ThroughputSampler},
    store::KvStore,
    workload::{OpKind, WorkloadGenerator},
};

/// Options for a single benchmark run.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Operations issued by the measured loop.
    pub num_ops: u64,
    /// Percentage of reads, 0..=100.
    pub read_prob: u32,
    /// Keys written during population and addressed by the workload.
    pub key_space: usize,
    /// Throughput sampler cadence.
    pub sample_period: Duration,
    /// Throughput results file, truncated at start.
    pub output: PathBuf,
    /// Fixed seed for a reproducible operation sequence.
    pub seed: Option<u64>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            num_ops: 0,
            read_prob: 50,
            key_space: DEFAULT_KEY_SPACE,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            output: PathBuf::from("throughput.csv"),
            seed: None,
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub gets: u64,
    pub puts: u64,
    /// Component-wise wall-clock difference between `start` and `end`.
    pub elapsed_ms: i64,
    /// Monotonic time spent in the measured loop.
    pub wall: Duration,
    pub start: WallInstant,
    pub end: WallInstant,
    pub samples: Vec<ThroughputSample>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results: {} gets, {} puts, Total consume {}ms",
            self.gets, self.puts, self.elapsed_ms
        )
    }
}

/// Drives populate, the measured workload loop and the throughput sampler
/// against one store.
pub struct Harness<S> {
    store: S,
    options: HarnessOptions,
    retry_strategy: Arc<dyn RetryStrategy>,
}

impl<S> Harness<S>
where
    S: KvStore,
{
    pub fn new(store: S, options: HarnessOptions) -> Result<Self, BenchError> {
        if options.key_space < 2 {
            return Err(BenchError::InvalidArgument(format!(
                "key space must hold at least 2 keys, got {}",
                options.key_space
            )));
        }
        if options.read_prob > 100 {
            return Err(BenchError::InvalidArgument(format!(
                "read probability must be within 0..=100, got {}",
                options.read_prob
            )));
        }
        if options.sample_period.is_zero() {
            return Err(BenchError::InvalidArgument(
                "sample period must be positive".to_string(),
            ));
        }
        Ok(Self {
            store,
            options,
            retry_strategy: Arc::new(FailFast),
        })
    }

    /// Replace the default fail-fast policy for store calls.
    pub fn with_retry(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Run against the configured output file.
    pub async fn run(&self) -> Result<RunSummary, BenchError> {
        let file = File::create(&self.options.output).await.map_err(|err| {
            BenchError::Io(format!(
                "failed to open {}: {}",
                self.options.output.display(),
                err
            ))
        })?;
        let (summary, _) = self.run_with_sink(BufWriter::new(file)).await?;
        Ok(summary)
    }

    /// Run with throughput rows going to `sink`, handing the sink back.
    pub async fn run_with_sink<W>(&self, sink: W) -> Result<(RunSummary, W), BenchError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let opts = &self.options;
        let mut generator = match opts.seed {
            Some(seed) => WorkloadGenerator::with_seed(opts.key_space, opts.read_prob, seed)?,
            None => WorkloadGenerator::new(opts.key_space, opts.read_prob)?,
        };

        populate(&self.store, opts.key_space, self.retry_strategy.as_ref()).await?;

        info!("Running workload...");
        let counters = Arc::new(Counters::new());
        let start = WallInstant::now();
        let started_at = Instant::now();
        let sampler = ThroughputSampler::spawn(counters.clone(), opts.sample_period, sink);

        if let Err(err) = self.drive(&mut generator, &counters).await {
            // Flush whatever the sampler has before surfacing the failure.
            let _ = sampler.stop().await;
            return Err(err);
        }

        let end = WallInstant::now();
        let wall = started_at.elapsed();
        let report = sampler.stop().await?;

        let elapsed_ms = elapsed_millis(&start, &end);
        debug!("Workload ran from {} to {} ({:?} monotonic)", start, end, wall);
        if (elapsed_ms - wall.as_millis() as i64).abs() > 1_000 {
            warn!(
                "Wall-clock elapsed {}ms disagrees with monotonic {}ms, the run likely crossed midnight UTC",
                elapsed_ms,
                wall.as_millis()
            );
        }

        let summary = RunSummary {
            gets: counters.gets(),
            puts: counters.puts(),
            elapsed_ms,
            wall,
            start,
            end,
            samples: report.samples,
        };
        info!("{}", summary);
        Ok((summary, report.sink))
    }

    async fn drive(
        &self,
        generator: &mut WorkloadGenerator,
        counters: &Counters,
    ) -> Result<(), BenchError> {
        for i in 0..self.options.num_ops {
            let op = generator.next_operation(i);
            match op.kind {
                OpKind::Read => {
                    retry(self.retry_strategy.as_ref(), "get", || self.store.get(&op.key))
                        .await?;
                    counters.record_get();
                }
                OpKind::Write => {
                    let value = op.value.as_deref().unwrap_or_default();
                    retry(self.retry_strategy.as_ref(), "put", || {
                        self.store.put(&op.key, value)
                    })
                    .await?;
                    counters.record_put();
                }
            }
        }
        Ok(())
    }
}
