//! Perceptual-image search index for booru-style boards.
//!
//! Wires together the [`fingerprint`], [`store`], [`upstream`], [`ingest`]
//! and [`server`] crates into one deployable unit. The [`Supervisor`] hosts
//! the Discoverer, Fetcher, and HTTP server as independent long-running
//! tasks that share nothing but the KV store, restarting any task that
//! exits with an error.
//!
//! ## Observability
//!
//! Metrics and structured logs can be captured by installing a
//! [`BoorudexMetrics`] recorder via [`set_boorudex_metrics`] and/or a
//! [`BoorudexEventLogger`] with [`set_boorudex_logger`]. Both hooks receive
//! the stage, outcome, and duration of each Discoverer pass and Fetcher
//! pass driven by the [`Supervisor`]. The HTTP query surface lives in a
//! separate crate with no dependency on this one and keeps its own request
//! counters (see `server::routes::health::metrics`) rather than feeding
//! these hooks.
//!
//! ## Errors
//!
//! Failures produced by any layer converge on [`BoorudexError`], a single
//! `From<XError>` ladder one level up from each crate's own error type.

pub mod config;

pub use config::{BoorudexConfig, ConfigLoadError};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use ingest::{Discoverer, Fetcher, IngestError};
pub use server::{ServerConfig, ServerError, ServerState};
pub use store::{IndexEntry, IndexStore, KvStore, Rating, RedisKv, Searcher, StoreError};
pub use upstream::{UpstreamClient, UpstreamError};

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant};

/// Errors that can surface anywhere in the assembled pipeline.
#[derive(Debug)]
pub enum BoorudexError {
    Config(ConfigLoadError),
    Ingest(IngestError),
    Upstream(UpstreamError),
    Store(StoreError),
    Fingerprint(FingerprintError),
    Server(ServerError),
    Io(io::Error),
}

impl fmt::Display for BoorudexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoorudexError::Config(err) => write!(f, "configuration error: {err}"),
            BoorudexError::Ingest(err) => write!(f, "ingest task failure: {err}"),
            BoorudexError::Upstream(err) => write!(f, "upstream error: {err}"),
            BoorudexError::Store(err) => write!(f, "store error: {err}"),
            BoorudexError::Fingerprint(err) => write!(f, "fingerprint error: {err}"),
            BoorudexError::Server(err) => write!(f, "server error: {err}"),
            BoorudexError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for BoorudexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoorudexError::Config(err) => Some(err),
            BoorudexError::Ingest(err) => Some(err),
            BoorudexError::Upstream(err) => Some(err),
            BoorudexError::Store(err) => Some(err),
            BoorudexError::Fingerprint(err) => Some(err),
            BoorudexError::Server(err) => Some(err),
            BoorudexError::Io(err) => Some(err),
        }
    }
}

impl From<ConfigLoadError> for BoorudexError {
    fn from(value: ConfigLoadError) -> Self {
        BoorudexError::Config(value)
    }
}

impl From<IngestError> for BoorudexError {
    fn from(value: IngestError) -> Self {
        BoorudexError::Ingest(value)
    }
}

impl From<UpstreamError> for BoorudexError {
    fn from(value: UpstreamError) -> Self {
        BoorudexError::Upstream(value)
    }
}

impl From<StoreError> for BoorudexError {
    fn from(value: StoreError) -> Self {
        BoorudexError::Store(value)
    }
}

impl From<FingerprintError> for BoorudexError {
    fn from(value: FingerprintError) -> Self {
        BoorudexError::Fingerprint(value)
    }
}

impl From<ServerError> for BoorudexError {
    fn from(value: ServerError) -> Self {
        BoorudexError::Server(value)
    }
}

impl From<io::Error> for BoorudexError {
    fn from(value: io::Error) -> Self {
        BoorudexError::Io(value)
    }
}

/// Metrics observer for pipeline stages.
pub trait BoorudexMetrics: Send + Sync {
    fn record_discover_cycle(&self, latency: Duration, result: Result<(), &BoorudexError>);
    fn record_fetch_cycle(&self, latency: Duration, result: Result<(), &BoorudexError>);
}

/// Pipeline stage captured in observability events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoorudexStage {
    Discover,
    Fetch,
}

impl fmt::Display for BoorudexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoorudexStage::Discover => "discover",
            BoorudexStage::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// Outcome of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoorudexEventStatus {
    Success,
    Failure,
}

impl fmt::Display for BoorudexEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BoorudexEventStatus::Success => "success",
            BoorudexEventStatus::Failure => "failure",
        };
        f.write_str(label)
    }
}

/// Structured observation describing the outcome of a pipeline stage.
#[derive(Debug, Clone)]
pub struct BoorudexEvent {
    pub stage: BoorudexStage,
    pub status: BoorudexEventStatus,
    pub latency: Duration,
    pub label: String,
    pub error: Option<String>,
}

impl BoorudexEvent {
    fn format_key_values(&self, include_timestamp: bool) -> String {
        let mut parts = Vec::new();
        if include_timestamp {
            let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            parts.push(format!("timestamp=\"{ts}\""));
        }
        parts.push(format!("stage={}", self.stage));
        parts.push(format!("status={}", self.status));
        parts.push(format!("latency_us={}", self.latency.as_micros()));
        parts.push(format!("label=\"{}\"", escape_kv(&self.label)));
        if let Some(error) = &self.error {
            parts.push(format!("error=\"{}\"", escape_kv(error)));
        }
        parts.join(" ")
    }
}

fn escape_kv(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Hook for emitting structured events per pipeline stage.
pub trait BoorudexEventLogger: Send + Sync {
    fn log(&self, event: &BoorudexEvent);
}

/// Simple key-value logger that writes structured events to any writer.
pub struct KeyValueLogger {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    include_timestamp: bool,
}

impl KeyValueLogger {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            include_timestamp: true,
        }
    }

    pub fn with_timestamps(mut self, include_timestamp: bool) -> Self {
        self.include_timestamp = include_timestamp;
        self
    }
}

impl BoorudexEventLogger for KeyValueLogger {
    fn log(&self, event: &BoorudexEvent) {
        if let Ok(mut writer) = self.writer.lock() {
            let line = event.format_key_values(self.include_timestamp);
            let _ = writeln!(writer, "{line}");
        }
    }
}

/// Install or clear the global metrics recorder.
pub fn set_boorudex_metrics(recorder: Option<Arc<dyn BoorudexMetrics>>) {
    let mut guard = metrics_lock().write().expect("boorudex metrics lock poisoned");
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn BoorudexMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn BoorudexMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn boorudex_metrics() -> Option<Arc<dyn BoorudexMetrics>> {
    metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Install or clear the structured event logger.
pub fn set_boorudex_logger(logger: Option<Arc<dyn BoorudexEventLogger>>) {
    let mut guard = logger_lock().write().expect("boorudex logger lock poisoned");
    *guard = logger;
}

fn logger_lock() -> &'static RwLock<Option<Arc<dyn BoorudexEventLogger>>> {
    static LOGGER: OnceLock<RwLock<Option<Arc<dyn BoorudexEventLogger>>>> = OnceLock::new();
    LOGGER.get_or_init(|| RwLock::new(None))
}

fn boorudex_logger() -> Option<Arc<dyn BoorudexEventLogger>> {
    logger_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Wraps one Discoverer/Fetcher iteration, emitting a [`BoorudexEvent`] and
/// recording to the installed [`BoorudexMetrics`] on completion. A no-op
/// (`start` returns `None`) when nothing is installed.
pub(crate) struct StageSpan {
    recorder: Option<Arc<dyn BoorudexMetrics>>,
    logger: Option<Arc<dyn BoorudexEventLogger>>,
    stage: BoorudexStage,
    label: String,
    start: Instant,
}

impl StageSpan {
    pub(crate) fn start(stage: BoorudexStage, label: impl Into<String>) -> Option<Self> {
        let recorder = boorudex_metrics();
        let logger = boorudex_logger();
        if recorder.is_none() && logger.is_none() {
            return None;
        }
        Some(Self {
            recorder,
            logger,
            stage,
            label: label.into(),
            start: Instant::now(),
        })
    }

    pub(crate) fn finish(self, result: Result<(), &BoorudexError>) {
        let latency = self.start.elapsed();
        if let Some(logger) = &self.logger {
            let event = BoorudexEvent {
                stage: self.stage,
                status: if result.is_ok() {
                    BoorudexEventStatus::Success
                } else {
                    BoorudexEventStatus::Failure
                },
                latency,
                label: self.label,
                error: result.err().map(|e| e.to_string()),
            };
            logger.log(&event);
        }
        if let Some(recorder) = self.recorder {
            match self.stage {
                BoorudexStage::Discover => recorder.record_discover_cycle(latency, result),
                BoorudexStage::Fetch => recorder.record_fetch_cycle(latency, result),
            }
        }
    }
}

/// Which task a process launched with `--role` should run, or `AllInOne`
/// for every task hosted in one process via `tokio::spawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Discoverer,
    Fetcher,
    Server,
    AllInOne,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Discoverer => "discoverer",
            Role::Fetcher => "fetcher",
            Role::Server => "server",
            Role::AllInOne => "all-in-one",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discoverer" => Ok(Role::Discoverer),
            "fetcher" => Ok(Role::Fetcher),
            "server" => Ok(Role::Server),
            "all-in-one" => Ok(Role::AllInOne),
            other => Err(format!(
                "unknown role {other:?}; expected one of discoverer, fetcher, server, all-in-one"
            )),
        }
    }
}

/// Hosts the Discoverer, Fetcher, and HTTP server, wiring each to a shared
/// KV handle and upstream client built from one [`BoorudexConfig`].
///
/// Two deployment shapes are supported, both driving the same tasks:
/// in-process (`run_all_in_one`, every task as a `tokio::spawn`'d future in
/// this process — the default, and what tests use) or one OS process per
/// role (`run_role`, dispatched by `main`'s `--role` flag spawning this
/// same binary via `std::process::Command`). Either way, a task that exits
/// with an error is logged via `tracing::error!` and restarted; this
/// crash-and-restart loop is the supervisory behavior named by the task
/// boundary in `ingest::IngestError`'s doc comment.
pub struct Supervisor {
    config: BoorudexConfig,
    kv: Arc<dyn KvStore>,
    upstream: Arc<UpstreamClient>,
}

impl Supervisor {
    pub fn new(config: BoorudexConfig) -> Result<Self, BoorudexError> {
        let kv: Arc<dyn KvStore> = Arc::new(RedisKv::new(&config.store.redis_url)?);
        let upstream = Arc::new(
            UpstreamClient::new(config.upstream.base_url.clone(), config.upstream.indexer_ua.clone())
                .with_max_pages(config.upstream.max_page_count),
        );
        Ok(Self {
            config,
            kv,
            upstream,
        })
    }

    /// Build a Supervisor against an already-constructed KV handle,
    /// bypassing Redis connection setup. Used by in-process integration
    /// tests that drive the Discoverer/Fetcher/server against
    /// `InMemoryKv`.
    pub fn with_kv(config: BoorudexConfig, kv: Arc<dyn KvStore>) -> Self {
        let upstream = Arc::new(
            UpstreamClient::new(config.upstream.base_url.clone(), config.upstream.indexer_ua.clone())
                .with_max_pages(config.upstream.max_page_count),
        );
        Self {
            config,
            kv,
            upstream,
        }
    }

    fn build_discoverer(&self) -> Discoverer {
        Discoverer::new(
            self.kv.clone(),
            self.upstream.clone(),
            self.config.ingest.exclude_tags.clone(),
        )
        .with_sleep_between_passes(self.config.ingest.discoverer_interval())
    }

    fn build_fetcher(&self) -> Fetcher {
        Fetcher::new(self.kv.clone(), self.upstream.clone())
            .with_min_download_delay(self.config.ingest.min_download_delay())
    }

    /// Drive one Discoverer pass per loop iteration, instrumenting each
    /// with [`StageSpan`] and sleeping the configured interval between
    /// passes. A failed pass is logged and retried rather than sleeping,
    /// so a transient upstream outage doesn't silently stall discovery.
    async fn discoverer_loop(&self) -> Result<(), IngestError> {
        let discoverer = self.build_discoverer();
        let interval = self.config.ingest.discoverer_interval();
        loop {
            let span = StageSpan::start(BoorudexStage::Discover, "tag_pass");
            match discoverer.run_once().await {
                Ok(()) => {
                    if let Some(span) = span {
                        span.finish(Ok(()));
                    }
                }
                Err(err) => {
                    let wrapped = BoorudexError::Ingest(err);
                    if let Some(span) = span {
                        span.finish(Err(&wrapped));
                    }
                    let BoorudexError::Ingest(err) = wrapped else {
                        unreachable!()
                    };
                    return Err(err);
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Drive one Fetcher round-robin pass per loop iteration, instrumenting
    /// each with [`StageSpan`]. Matches `Fetcher::run`'s own immediate
    /// continuation with no between-pass sleep.
    async fn fetcher_loop(&self) -> Result<(), IngestError> {
        let fetcher = self.build_fetcher();
        loop {
            let span = StageSpan::start(BoorudexStage::Fetch, "round_robin_pass");
            match fetcher.run_once().await {
                Ok(()) => {
                    if let Some(span) = span {
                        span.finish(Ok(()));
                    }
                }
                Err(err) => {
                    let wrapped = BoorudexError::Ingest(err);
                    if let Some(span) = span {
                        span.finish(Err(&wrapped));
                    }
                    let BoorudexError::Ingest(err) = wrapped else {
                        unreachable!()
                    };
                    return Err(err);
                }
            }
        }
    }

    /// Run every task as an in-process `tokio::spawn`'d future, restarting
    /// any that exits with an error. Blocks forever (or until a task panics
    /// past the restart loop, which it does not).
    pub async fn run_all_in_one(self: Arc<Self>) -> Result<(), BoorudexError> {
        let discoverer = {
            let this = self.clone();
            tokio::spawn(async move { supervise("discoverer", || this.discoverer_loop()).await })
        };
        let fetcher = {
            let this = self.clone();
            tokio::spawn(async move { supervise("fetcher", || this.fetcher_loop()).await })
        };
        let server = {
            let this = self.clone();
            tokio::spawn(async move {
                loop {
                    let state = Arc::new(ServerState::new(this.config.server.clone(), this.kv.clone()));
                    if let Err(err) = server::start_server_with_state(state).await {
                        tracing::error!(task = "server", error = %err, "task exited with error, restarting");
                    } else {
                        break;
                    }
                }
            })
        };

        let _ = tokio::try_join!(discoverer, fetcher, server);
        Ok(())
    }

    /// Run a single role, blocking forever. Used by `main` when dispatched
    /// via `--role` into a dedicated OS process.
    pub async fn run_role(self: Arc<Self>, role: Role) -> Result<(), BoorudexError> {
        match role {
            Role::Discoverer => supervise("discoverer", || self.discoverer_loop()).await,
            Role::Fetcher => supervise("fetcher", || self.fetcher_loop()).await,
            Role::Server => {
                let state = Arc::new(ServerState::new(self.config.server.clone(), self.kv.clone()));
                server::start_server_with_state(state).await?;
                Ok(())
            }
            Role::AllInOne => self.run_all_in_one().await,
        }
    }

    /// Spawn one OS process per role (`discoverer`, `fetcher`, `server`),
    /// each re-invoking the current executable with `--role <name>`, and
    /// wait on all three. Used when process-level isolation between tasks
    /// is wanted instead of `run_all_in_one`'s shared-process tasks.
    pub fn spawn_os_processes() -> Result<Vec<std::process::Child>, BoorudexError> {
        let exe = std::env::current_exe()?;
        ["discoverer", "fetcher", "server"]
            .iter()
            .map(|role| {
                std::process::Command::new(&exe)
                    .arg("--role")
                    .arg(role)
                    .spawn()
                    .map_err(BoorudexError::from)
            })
            .collect()
    }
}

/// Run `make_task().await` forever, logging and restarting whenever it
/// returns an error (crash-and-restart, never a task-internal retry).
async fn supervise<F, Fut>(name: &str, mut make_task: F) -> Result<(), BoorudexError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), IngestError>>,
{
    loop {
        if let Err(err) = make_task().await {
            tracing::error!(task = name, error = %err, "task exited with error, restarting");
        } else {
            return Ok(());
        }
    }
}
