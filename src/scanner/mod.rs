//! Core functionality for actual scanning behaviour.
use crate::error::ProbeError;
use crate::protocol::{query, slp};
use crate::status::ServerInfo;
use log::{debug, warn};

mod target_iterator;
pub use target_iterator::TargetIterator;

use std::{
    fmt,
    future::Future,
    net::SocketAddr,
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinSet;

/// Terminal result of probing one target.
pub type ProbeOutcome = Result<ServerInfo, ProbeError>;

/// Something that can decide whether a target hosts a server.
///
/// [`MinecraftProbe`] is the real implementation; the orchestrator only
/// depends on this trait.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, target: SocketAddr) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Receives every server found during a scan.
pub trait ResultSink {
    fn found(&mut self, info: ServerInfo);
}

impl ResultSink for Vec<ServerInfo> {
    fn found(&mut self, info: ServerInfo) {
        self.push(info);
    }
}

/// Settings shared read-only by every probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    /// Deadline applied separately to each network step.
    pub timeout: Duration,
    /// Try Query over UDP when Server List Ping fails.
    pub query_fallback: bool,
}

/// Server List Ping with an optional Query fallback.
#[derive(Debug)]
pub struct MinecraftProbe {
    config: ProbeConfig,
}

impl MinecraftProbe {
    pub const fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

impl Probe for MinecraftProbe {
    async fn probe(&self, target: SocketAddr) -> ProbeOutcome {
        let timeout = self.config.timeout;
        match slp::ping(target, timeout).await {
            Ok(info) => Ok(info),
            Err(e) if self.config.query_fallback => {
                debug!("SLP failed for {target} ({e}), falling back to query");
                query::query(target, timeout).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Counters for one run of [`Scanner::run`].
#[derive(Debug, Clone, Copy)]
pub struct ScanSession {
    found: usize,
    probed: usize,
    started: Instant,
    elapsed: Duration,
}

impl ScanSession {
    fn start() -> Self {
        Self {
            found: 0,
            probed: 0,
            started: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    fn record<S>(&mut self, target: SocketAddr, outcome: ProbeOutcome, sink: &mut S)
    where
        S: ResultSink + ?Sized,
    {
        self.probed += 1;
        match outcome {
            Ok(info) => {
                self.found += 1;
                sink.found(info);
            }
            Err(e) => debug!("No server at {target}: {e}"),
        }
    }

    fn finish(mut self) -> Self {
        self.elapsed = self.started.elapsed();
        self
    }

    /// Servers handed to the sink.
    pub const fn found(&self) -> usize {
        self.found
    }

    /// Targets whose probe ran to completion, successful or not.
    pub const fn probed(&self) -> usize {
        self.probed
    }

    /// Wall-clock time from the first dispatch until the last probe drained.
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found {} servers in {:.3} seconds",
            self.found,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Drives a [`Probe`] over a stream of targets with at most `concurrency`
/// probes in flight.
///
/// Targets are pulled from the iterator only when a slot is free, so a slow
/// network stalls target generation instead of queueing work without bound.
#[derive(Debug)]
pub struct Scanner<P = MinecraftProbe> {
    probe: Arc<P>,
    concurrency: NonZeroUsize,
}

impl Scanner<MinecraftProbe> {
    pub fn new(concurrency: usize, config: ProbeConfig) -> Self {
        Self::with_probe(MinecraftProbe::new(config), concurrency)
    }
}

impl<P: Probe> Scanner<P> {
    /// A concurrency of zero is corrected to one.
    pub fn with_probe(probe: P, concurrency: usize) -> Self {
        Self {
            probe: Arc::new(probe),
            concurrency: NonZeroUsize::new(concurrency).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub const fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    /// Probes every target, forwarding each server found to `sink`.
    ///
    /// Returns once the iterator is exhausted and every in-flight probe has
    /// finished. Results reach the sink in completion order.
    pub async fn run<T, S>(&self, targets: T, sink: &mut S) -> ScanSession
    where
        T: IntoIterator<Item = SocketAddr>,
        S: ResultSink + ?Sized,
    {
        let limit = self.concurrency.get();
        let mut session = ScanSession::start();
        let mut in_flight = JoinSet::new();

        debug!("Start scanning targets with {limit} probes in flight");

        for target in targets {
            while in_flight.len() >= limit {
                match in_flight.join_next().await {
                    Some(done) => settle(done, &mut session, sink),
                    None => break,
                }
            }

            let probe = Arc::clone(&self.probe);
            in_flight.spawn(async move { (target, probe.probe(target).await) });
        }

        while let Some(done) = in_flight.join_next().await {
            settle(done, &mut session, sink);
        }

        let session = session.finish();
        debug!(
            "Scan finished: {} probed, {} found",
            session.probed(),
            session.found()
        );
        session
    }
}

fn settle<S>(
    done: Result<(SocketAddr, ProbeOutcome), tokio::task::JoinError>,
    session: &mut ScanSession,
    sink: &mut S,
) where
    S: ResultSink + ?Sized,
{
    match done {
        Ok((target, outcome)) => session.record(target, outcome, sink),
        Err(e) => {
            session.probed += 1;
            warn!("Probe task did not complete: {e}");
        }
    }
}
