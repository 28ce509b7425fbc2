//! Operation counters and the periodic throughput sampler.
//!
//! The workload loop is the only writer of [`Counters`]; the sampler only
//! loads them. A sample may observe a slightly stale `ops` value, which just
//! shifts those operations into the next interval.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{common::THROUGHPUT_HEADER, error::BenchError};

/// Completed operation counters shared between the workload loop and the sampler.
#[derive(Debug, Default)]
pub struct Counters {
    gets: AtomicU64,
    puts: AtomicU64,
    ops: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed get.
    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.ops.fetch_add(1, Ordering::Release);
    }

    /// Count one completed put.
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.ops.fetch_add(1, Ordering::Release);
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Acquire)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Acquire)
    }

    /// Total completed operations, gets and puts together.
    pub fn ops(&self) -> u64 {
        self.ops.load(Ordering::Acquire)
    }
}

/// One throughput observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSample {
    /// Time since the sampler started, at the end of the interval.
    pub elapsed_ms: u64,
    /// Measured length of the interval.
    pub interval: Duration,
    /// Operations completed within the interval.
    pub ops: u64,
    /// Operations per second over the interval.
    pub rate: f64,
}

impl ThroughputSample {
    pub fn mreqs_per_sec(&self) -> f64 {
        self.rate / 1_000_000.0
    }

    /// CSV row matching [`THROUGHPUT_HEADER`].
    pub fn to_row(&self) -> String {
        format!("{},{:.6}", self.elapsed_ms, self.mreqs_per_sec())
    }
}

/// What a stopped sampler hands back: every sample taken plus its sink.
#[derive(Debug)]
pub struct SamplerReport<W> {
    pub samples: Vec<ThroughputSample>,
    pub sink: W,
}

/// Background task that turns the `ops` counter into a throughput series.
pub struct ThroughputSampler<W> {
    counters: Arc<Counters>,
    period: Duration,
    sink: W,
    samples: Vec<ThroughputSample>,
    start: Instant,
    last_at: Instant,
    last_ops: u64,
}

impl<W> ThroughputSampler<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Start sampling `counters` every `period`, writing rows to `sink`.
    pub fn spawn(counters: Arc<Counters>, period: Duration, sink: W) -> SamplerHandle<W> {
        let now = Instant::now();
        let last_ops = counters.ops();
        let sampler = Self {
            counters,
            period,
            sink,
            samples: Vec::new(),
            start: now,
            last_at: now,
            last_ops,
        };

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { sampler.run(task_cancel).await });

        SamplerHandle {
            cancel,
            handle: Some(handle),
        }
    }

    async fn run(mut self, cancel: CancellationToken) -> Result<SamplerReport<W>, BenchError> {
        debug!("Throughput sampler started, period {:?}", self.period);
        self.sink
            .write_all(format!("{}\n", THROUGHPUT_HEADER).as_bytes())
            .await?;

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sample(false).await?,
            }
        }

        // Pick up whatever completed since the last tick.
        self.sample(true).await?;
        self.sink.flush().await?;
        debug!("Throughput sampler stopped after {} samples", self.samples.len());

        Ok(SamplerReport {
            samples: self.samples,
            sink: self.sink,
        })
    }

    /// Record the ops completed since the previous sample. The last sample
    /// is always recorded when it has ops, even over a zero-length interval.
    async fn sample(&mut self, last: bool) -> Result<(), BenchError> {
        let current = self.counters.ops();
        let now = Instant::now();
        let interval = now.duration_since(self.last_at);
        let ops = current - self.last_ops;
        if interval.is_zero() && (!last || ops == 0) {
            // Nothing measurable yet; the ops carry into the next interval.
            return Ok(());
        }

        let rate = if interval.is_zero() {
            0.0
        } else {
            ops as f64 / interval.as_secs_f64()
        };
        let sample = ThroughputSample {
            elapsed_ms: now.duration_since(self.start).as_millis() as u64,
            interval,
            ops,
            rate,
        };
        info!(
            "{} ms: {:.6} MReqs/s ({} ops)",
            sample.elapsed_ms,
            sample.mreqs_per_sec(),
            sample.ops
        );
        self.sink
            .write_all(format!("{}\n", sample.to_row()).as_bytes())
            .await?;

        self.samples.push(sample);
        self.last_at = now;
        self.last_ops = current;
        Ok(())
    }
}

/// Owner side of a running sampler. Dropping it cancels the task.
pub struct SamplerHandle<W> {
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<SamplerReport<W>, BenchError>>>,
}

impl<W> SamplerHandle<W> {
    /// Stop the sampler after one final sample and wait for the sink to be flushed.
    pub async fn stop(mut self) -> Result<SamplerReport<W>, BenchError> {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|err| BenchError::Io(format!("sampler task failed: {}", err)))?,
            None => Err(BenchError::Io("sampler already stopped".to_string())),
        }
    }
}

impl<W> Drop for SamplerHandle<W> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
