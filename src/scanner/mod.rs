//! Core functionality for actual scanning behaviour.
//!
//! A single dispatcher task feeds targets through a capacity-one channel to
//! a pool of workers. Each worker probes the target it received and appends
//! the outcome to the shared [`ResultSink`]. Dropping the sender is the "no
//! more work" signal; the scan is over once every worker has been joined.
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

mod outcome;
mod prober;
mod report;
mod sink;

pub use outcome::ProbeOutcome;
pub use prober::{HttpProber, Probe, USER_AGENT};
pub use report::Reporter;
pub use sink::ResultSink;

use crate::target::{Target, TargetIterator};
use crate::warning;

type SharedQueue = Arc<Mutex<mpsc::Receiver<Target>>>;

/// Counters returned once every worker is done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Targets handed to workers.
    pub dispatched: usize,
    /// Outcomes durably written to the result file.
    pub recorded: usize,
    /// Outcomes whose write or sync failed.
    pub write_failures: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    recorded: usize,
    write_failures: usize,
}

/// One scan session: the targets, the prober, the pool size and the result
/// file. Nothing is shared outside of it, so several scans can run in the
/// same process.
#[derive(Debug)]
pub struct Scanner<P = HttpProber> {
    targets: TargetIterator,
    workers: usize,
    prober: Arc<P>,
    sink: Arc<ResultSink>,
    reporter: Reporter,
    accessible: bool,
}

impl<P: Probe> Scanner<P> {
    /// A pool size of 0 is corrected to 1.
    pub fn new(
        targets: TargetIterator,
        workers: usize,
        prober: P,
        sink: ResultSink,
        reporter: Reporter,
        accessible: bool,
    ) -> Self {
        Self {
            targets,
            workers: workers.max(1),
            prober: Arc::new(prober),
            sink: Arc::new(sink),
            reporter,
            accessible,
        }
    }

    /// Runs the dispatcher and the worker pool to completion.
    ///
    /// Returns once the dispatcher has closed the channel and every worker
    /// has finished its last probe.
    pub async fn run(self) -> ScanSummary {
        let (tx, rx) = mpsc::channel::<Target>(1);
        let queue: SharedQueue = Arc::new(Mutex::new(rx));

        debug!(
            "Start scanning.\nWorkers {}\nTargets {}\nOutput {}",
            self.workers,
            self.targets.total(),
            self.sink.path().display()
        );

        let dispatcher = tokio::spawn(dispatch(self.targets, tx));

        let mut pool = JoinSet::new();
        for id in 0..self.workers {
            pool.spawn(work(
                id,
                Arc::clone(&queue),
                Arc::clone(&self.prober),
                Arc::clone(&self.sink),
                self.reporter.clone(),
                self.accessible,
            ));
        }

        let mut summary = ScanSummary::default();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(stats) => {
                    summary.recorded += stats.recorded;
                    summary.write_failures += stats.write_failures;
                }
                Err(e) => error!("Worker stopped abnormally: {e}"),
            }
        }

        summary.dispatched = match dispatcher.await {
            Ok(sent) => sent,
            Err(e) => {
                error!("Dispatcher stopped abnormally: {e}");
                0
            }
        };
        self.reporter.finish();

        debug!("Scan finished: {summary:?}");
        summary
    }
}

/// Feeds every target into the channel, then closes it by dropping `tx`.
async fn dispatch(targets: TargetIterator, tx: mpsc::Sender<Target>) -> usize {
    let mut sent = 0;
    for target in targets {
        if tx.send(target).await.is_err() {
            warn!("All workers are gone, stopping dispatch after {sent} targets");
            break;
        }
        sent += 1;
    }
    debug!("Dispatcher exhausted after {sent} targets");
    sent
}

async fn work<P: Probe>(
    id: usize,
    queue: SharedQueue,
    prober: Arc<P>,
    sink: Arc<ResultSink>,
    reporter: Reporter,
    accessible: bool,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let next = queue.lock().await.recv().await;
        let Some(target) = next else {
            break;
        };

        let outcome = prober.probe(target).await;
        reporter.probed(&outcome);

        match sink.record(&outcome).await {
            Ok(()) => stats.recorded += 1,
            Err(e) => {
                stats.write_failures += 1;
                error!(
                    "Worker {id} could not write the record for {}:{} ({}): {e}",
                    outcome.address, outcome.port, outcome.virtual_host
                );
                warning!(
                    format!(
                        "Lost record for {}:{} ({}): {e}",
                        outcome.address, outcome.port, outcome.virtual_host
                    ),
                    accessible
                );
            }
        }
    }
    debug!("Worker {id} done: {stats:?}");
    stats
}
