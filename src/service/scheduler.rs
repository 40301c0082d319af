//! Periodic job scheduling
//!
//! Named periodic jobs running on the tokio runtime. A job runs once right
//! after registration and then once per interval, measured from the end of the
//! previous run, so a job never overlaps with itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Initial delay after a job reports `Retry`
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound for re-checking connectivity while offline
const OFFLINE_RECHECK: Duration = Duration::from_secs(60);

/// Result a job reports back to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Success,
    /// Run again after an exponential backoff instead of the normal interval
    Retry,
    Failure,
}

/// One unit of periodic work
#[async_trait]
pub trait PeriodicWork: Send + Sync {
    async fn run(&self) -> WorkOutcome;
}

/// Preconditions checked before each run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobConstraints {
    pub requires_network: bool,
}

/// Periodic job definition
#[derive(Clone)]
pub struct PeriodicJob {
    pub name: String,
    pub interval: Duration,
    pub constraints: JobConstraints,
    pub work: Arc<dyn PeriodicWork>,
}

impl PeriodicJob {
    pub fn new(name: impl Into<String>, interval: Duration, work: Arc<dyn PeriodicWork>) -> Self {
        Self {
            name: name.into(),
            interval,
            constraints: JobConstraints::default(),
            work,
        }
    }

    pub fn requires_network(mut self, required: bool) -> Self {
        self.constraints.requires_network = required;
        self
    }
}

/// What to do when a job with the same name is already registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingJobPolicy {
    /// Keep the existing registration and its phase
    Keep,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    KeptExisting,
    Replaced,
}

/// Host scheduling facility
pub trait PeriodicScheduler: Send + Sync {
    fn register(&self, job: PeriodicJob, policy: ExistingJobPolicy) -> RegisterOutcome;

    /// Returns `false` when no such job was registered; that is not an error.
    fn cancel(&self, name: &str) -> bool;

    fn is_scheduled(&self, name: &str) -> bool;
}

/// Network connectivity check for `requires_network` jobs
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe that always reports online
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Probe that opens a TCP connection to a fixed address
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_online(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }
}

/// In-process scheduler backed by tokio tasks
pub struct TokioScheduler {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    probe: Arc<dyn ConnectivityProbe>,
    retry_backoff: Duration,
}

impl TokioScheduler {
    pub fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            probe,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Names of the jobs that are currently scheduled
    pub fn job_names(&self) -> Vec<String> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = jobs
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn spawn_job(&self, job: PeriodicJob) -> JoinHandle<()> {
        let probe = Arc::clone(&self.probe);
        let retry_backoff = self.retry_backoff;
        tokio::spawn(run_job(job, probe, retry_backoff))
    }
}

impl PeriodicScheduler for TokioScheduler {
    fn register(&self, job: PeriodicJob, policy: ExistingJobPolicy) -> RegisterOutcome {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);

        let name = job.name.clone();
        let existing_alive = jobs.get(&name).is_some_and(|handle| !handle.is_finished());

        let outcome = match (existing_alive, policy) {
            (true, ExistingJobPolicy::Keep) => {
                debug!(job = %name, "Periodic job already registered, keeping existing");
                return RegisterOutcome::KeptExisting;
            }
            (true, ExistingJobPolicy::Replace) => {
                if let Some(handle) = jobs.remove(&name) {
                    handle.abort();
                }
                RegisterOutcome::Replaced
            }
            (false, _) => RegisterOutcome::Registered,
        };

        info!(
            job = %name,
            interval_secs = job.interval.as_secs(),
            requires_network = job.constraints.requires_network,
            "Periodic job registered"
        );
        let handle = self.spawn_job(job);
        jobs.insert(name, handle);
        outcome
    }

    fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        match jobs.remove(name) {
            Some(handle) => {
                let was_alive = !handle.is_finished();
                handle.abort();
                info!(job = %name, "Periodic job cancelled");
                was_alive
            }
            None => {
                debug!(job = %name, "No periodic job to cancel");
                false
            }
        }
    }

    fn is_scheduled(&self, name: &str) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(name).is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
    }
}

async fn run_job(job: PeriodicJob, probe: Arc<dyn ConnectivityProbe>, retry_backoff: Duration) {
    let mut delay = Duration::ZERO;
    let mut backoff = retry_backoff;

    loop {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if job.constraints.requires_network && !probe.is_online().await {
            debug!(job = %job.name, "Offline, deferring periodic job");
            delay = OFFLINE_RECHECK.min(job.interval);
            continue;
        }

        let outcome = job.work.run().await;
        delay = match outcome {
            WorkOutcome::Success => {
                backoff = retry_backoff;
                job.interval
            }
            WorkOutcome::Retry => {
                let wait = backoff.min(job.interval);
                backoff = (backoff * 2).min(job.interval);
                debug!(job = %job.name, wait_secs = wait.as_secs(), "Periodic job asked for retry");
                wait
            }
            WorkOutcome::Failure => {
                warn!(job = %job.name, "Periodic job reported failure");
                backoff = retry_backoff;
                job.interval
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingWork {
        runs: AtomicUsize,
        outcome: WorkOutcome,
    }

    impl CountingWork {
        fn new(outcome: WorkOutcome) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                outcome,
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeriodicWork for CountingWork {
        async fn run(&self) -> WorkOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }
    }

    struct Offline;

    #[async_trait]
    impl ConnectivityProbe for Offline {
        async fn is_online(&self) -> bool {
            false
        }
    }

    fn job(work: Arc<CountingWork>) -> PeriodicJob {
        PeriodicJob::new("test_job", Duration::from_secs(60), work)
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_usable_after_poisoned_lock() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _jobs = scheduler.jobs.lock().unwrap();
            panic!("panic while holding the registry");
        }));
        assert!(poisoned.is_err());
        assert!(scheduler.jobs.is_poisoned());

        let work = CountingWork::new(WorkOutcome::Success);
        assert_eq!(
            scheduler.register(job(work.clone()), ExistingJobPolicy::Keep),
            RegisterOutcome::Registered
        );
        assert!(scheduler.is_scheduled("test_job"));
        assert_eq!(scheduler.job_names(), vec!["test_job".to_string()]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(work.runs(), 1);
        assert!(scheduler.cancel("test_job"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let work = CountingWork::new(WorkOutcome::Success);
        scheduler.register(job(work.clone()), ExistingJobPolicy::Keep);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(work.runs(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(work.runs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_policy_does_not_duplicate() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let work = CountingWork::new(WorkOutcome::Success);

        assert_eq!(
            scheduler.register(job(work.clone()), ExistingJobPolicy::Keep),
            RegisterOutcome::Registered
        );
        assert_eq!(
            scheduler.register(job(work.clone()), ExistingJobPolicy::Keep),
            RegisterOutcome::KeptExisting
        );
        assert_eq!(scheduler.job_names(), vec!["test_job".to_string()]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(work.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_policy() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        let first = CountingWork::new(WorkOutcome::Success);
        let second = CountingWork::new(WorkOutcome::Success);

        scheduler.register(job(first.clone()), ExistingJobPolicy::Keep);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            scheduler.register(job(second.clone()), ExistingJobPolicy::Replace),
            RegisterOutcome::Replaced
        );

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(first.runs(), 1);
        assert!(second.runs() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        assert!(!scheduler.cancel("missing"));

        let work = CountingWork::new(WorkOutcome::Success);
        scheduler.register(job(work.clone()), ExistingJobPolicy::Keep);
        assert!(scheduler.is_scheduled("test_job"));

        assert!(scheduler.cancel("test_job"));
        assert!(!scheduler.cancel("test_job"));
        assert!(!scheduler.is_scheduled("test_job"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_uses_backoff() {
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline))
            .with_retry_backoff(Duration::from_secs(5));
        let work = CountingWork::new(WorkOutcome::Retry);
        scheduler.register(job(work.clone()), ExistingJobPolicy::Keep);

        // 0s, 5s, 15s, 35s
        tokio::time::sleep(Duration::from_secs(36)).await;
        assert_eq!(work.runs(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_defers_network_job() {
        let scheduler = TokioScheduler::new(Arc::new(Offline));
        let work = CountingWork::new(WorkOutcome::Success);
        scheduler.register(job(work.clone()).requires_network(true), ExistingJobPolicy::Keep);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(work.runs(), 0);
        assert!(scheduler.is_scheduled("test_job"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_is_not_reentrant() {
        struct SlowWork {
            running: AtomicBool,
            overlapped: AtomicBool,
        }

        #[async_trait]
        impl PeriodicWork for SlowWork {
            async fn run(&self) -> WorkOutcome {
                if self.running.swap(true, Ordering::SeqCst) {
                    self.overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_secs(90)).await;
                self.running.store(false, Ordering::SeqCst);
                WorkOutcome::Success
            }
        }

        let work = Arc::new(SlowWork {
            running: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        });
        let scheduler = TokioScheduler::new(Arc::new(AlwaysOnline));
        scheduler.register(
            PeriodicJob::new("slow", Duration::from_secs(60), work.clone()),
            ExistingJobPolicy::Keep,
        );

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!work.overlapped.load(Ordering::SeqCst));
    }
}
