//! Sequential per-device benchmarking with a timeout.
//!
//! Devices are measured one after another, never concurrently, so one
//! device's run cannot disturb another's timing. Each run happens on a
//! worker thread so the caller can stop waiting after the configured
//! timeout. A timed-out run cannot be cancelled: before the next device
//! starts, the runner waits up to one more timeout for it to finish. If it
//! is still going, the next device is not run and is reported as blocked.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cinder_core::{validate_benchmark, BenchmarkConfig, DeviceConfig, DeviceDescriptor};
use cinder_select::DeviceCollection;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{BenchError, Result};
use crate::workload::{ReferenceWorkload, WorkloadRunner};

/// How one device's benchmark ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Finished; wall-clock time from dispatch to completion.
    Completed(Duration),
    /// The device could not run the workload.
    Failed(String),
    /// Still running when the timeout expired.
    TimedOut(Duration),
    /// Not run: the named device's timed-out run had not finished.
    Blocked(String),
}

/// One device's benchmark result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Measurement {
    /// Position of the device in the collection that was benchmarked.
    pub position: usize,
    pub device: String,
    pub outcome: Outcome,
}

impl Measurement {
    /// Elapsed time, if the run completed.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.outcome {
            Outcome::Completed(d) => Some(d),
            Outcome::Failed(_) | Outcome::TimedOut(_) | Outcome::Blocked(_) => None,
        }
    }

    /// The failure as an error, if the run did not complete.
    pub fn failure(&self) -> Option<BenchError> {
        let detail = match &self.outcome {
            Outcome::Completed(_) => return None,
            Outcome::Failed(reason) => reason.clone(),
            Outcome::TimedOut(limit) => format!("timed out after {} ms", limit.as_millis()),
            Outcome::Blocked(busy) => format!("not run while '{busy}' was still running"),
        };
        Some(BenchError::BenchmarkFailure {
            device: self.device.clone(),
            detail,
        })
    }

    /// Sort key: completed runs by time, then everything unrankable.
    pub(crate) fn rank_key(&self) -> (bool, Duration) {
        match self.elapsed() {
            Some(d) => (false, d),
            None => (true, Duration::ZERO),
        }
    }
}

/// A measurement together with the rebuilt device it was taken on.
///
/// `device` is `None` when the device was never rebuilt: the rebuild
/// failed, or the run was blocked.
#[derive(Debug)]
pub(crate) struct Run {
    pub(crate) measurement: Measurement,
    pub(crate) device: Option<DeviceDescriptor>,
}

type RunResult = std::result::Result<(), String>;

/// A timed-out run whose worker may still be executing.
struct Straggler {
    device: String,
    done: Receiver<RunResult>,
    worker: JoinHandle<()>,
}

impl Straggler {
    /// Wait up to `limit` for the worker. `Some` if it is still running.
    fn settle(self, limit: Duration) -> Option<Self> {
        match self.done.recv_timeout(limit) {
            Err(RecvTimeoutError::Timeout) => Some(self),
            Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                info!(device = %self.device, "timed-out benchmark finished");
                let _ = self.worker.join();
                None
            }
        }
    }
}

/// Runs the reference workload on devices through a [`WorkloadRunner`].
#[derive(Clone)]
pub struct BenchmarkRunner {
    runner: Arc<dyn WorkloadRunner>,
    workload: ReferenceWorkload,
    timeout: Duration,
}

impl BenchmarkRunner {
    /// A runner for the default 16K-body workload with the default timeout.
    pub fn new(runner: Arc<dyn WorkloadRunner>) -> Self {
        Self::build(runner, &BenchmarkConfig::default())
    }

    /// A runner whose workload and timeout come from `config`.
    ///
    /// Fails when `config` has zero bodies, iterations or timeout.
    pub fn with_config(runner: Arc<dyn WorkloadRunner>, config: &BenchmarkConfig) -> Result<Self> {
        if let Err(issues) = validate_benchmark(config) {
            let detail = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| i.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            if !detail.is_empty() {
                return Err(BenchError::InvalidConfig { detail });
            }
        }
        Ok(Self::build(runner, config))
    }

    fn build(runner: Arc<dyn WorkloadRunner>, config: &BenchmarkConfig) -> Self {
        Self {
            runner,
            workload: ReferenceWorkload::from(config),
            timeout: config.timeout(),
        }
    }

    pub fn workload(&self) -> &ReferenceWorkload {
        &self.workload
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Benchmark every device in order, each as its own single-device
    /// collection rebuilt under `config` against a private platform copy.
    pub fn measure_all(&self, devices: &DeviceCollection, config: DeviceConfig) -> Vec<Measurement> {
        self.run_all(devices, config)
            .into_iter()
            .map(|run| run.measurement)
            .collect()
    }

    /// Benchmark one device on its own.
    ///
    /// If this run times out, its worker is left to finish in the background.
    pub fn measure(
        &self,
        position: usize,
        device: &DeviceDescriptor,
        config: DeviceConfig,
    ) -> Measurement {
        self.run_one(position, device, config, &mut None).measurement
    }

    pub(crate) fn run_all(&self, devices: &DeviceCollection, config: DeviceConfig) -> Vec<Run> {
        let mut straggler = None;
        devices
            .iter()
            .enumerate()
            .map(|(position, device)| self.run_one(position, device, config, &mut straggler))
            .collect()
    }

    fn run_one(
        &self,
        position: usize,
        device: &DeviceDescriptor,
        config: DeviceConfig,
        straggler: &mut Option<Straggler>,
    ) -> Run {
        info!(position, device = device.name(), workload = %self.workload, "benchmarking device");
        if let Some(previous) = straggler.take() {
            *straggler = previous.settle(self.timeout);
        }

        let blocked_by = straggler.as_ref().map(|s| s.device.clone());
        let (outcome, rebuilt) = match blocked_by {
            Some(busy) => (Outcome::Blocked(busy), None),
            None => match device.reconfigured_with_platform_copy(config) {
                Ok(copy) => {
                    let kept = copy.copy_exact();
                    let (outcome, left_running) = self.run_bounded(position, copy);
                    *straggler = left_running;
                    (outcome, Some(kept))
                }
                Err(e) => (Outcome::Failed(e.to_string()), None),
            },
        };

        let measurement = Measurement {
            position,
            device: device.name().to_string(),
            outcome,
        };
        match &measurement.outcome {
            Outcome::Completed(elapsed) => info!(
                position,
                device = device.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "benchmark finished"
            ),
            _ => {
                if let Some(failure) = measurement.failure() {
                    warn!(position, error = %failure, "device is unrankable");
                }
            }
        }
        Run {
            measurement,
            device: rebuilt,
        }
    }

    fn run_bounded(&self, position: usize, device: DeviceDescriptor) -> (Outcome, Option<Straggler>) {
        let name = device.name().to_string();
        let single = DeviceCollection::from_devices(vec![device]);
        let (tx, rx) = mpsc::channel();
        let runner = Arc::clone(&self.runner);
        let workload = self.workload.clone();
        let started = Instant::now();
        let spawned = thread::Builder::new()
            .name(format!("cinder-bench-{position}"))
            .spawn(move || {
                let result = runner
                    .run(&single, &workload)
                    .map_err(|e| e.to_string());
                let _ = tx.send(result);
            });
        let worker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return (
                    Outcome::Failed(format!("cannot start benchmark thread: {e}")),
                    None,
                )
            }
        };

        match rx.recv_timeout(self.timeout) {
            Ok(result) => {
                let elapsed = started.elapsed();
                let _ = worker.join();
                let outcome = match result {
                    Ok(()) => Outcome::Completed(elapsed),
                    Err(detail) => Outcome::Failed(detail),
                };
                (outcome, None)
            }
            Err(RecvTimeoutError::Timeout) => (
                Outcome::TimedOut(self.timeout),
                Some(Straggler {
                    device: name,
                    done: rx,
                    worker,
                }),
            ),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                (Outcome::Failed("workload runner panicked".into()), None)
            }
        }
    }
}

impl std::fmt::Debug for BenchmarkRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkRunner")
            .field("workload", &self.workload)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use cinder_core::{
        DeviceKind, Inventory, InventoryDevice, InventoryPlatform, InventoryRuntime, KindSet,
        NativeRuntime,
    };
    use cinder_select::PlatformCatalog;

    use super::*;
    use crate::workload::RunError;

    /// Sleeps for a per-device time looked up by name; "broken" fails,
    /// "panics" panics.
    pub(crate) struct ScriptedRunner {
        pub(crate) millis: Vec<(&'static str, u64)>,
        pub(crate) calls: Mutex<Vec<String>>,
        pub(crate) running: AtomicUsize,
        pub(crate) max_running: AtomicUsize,
    }

    impl ScriptedRunner {
        pub(crate) fn new(millis: Vec<(&'static str, u64)>) -> Self {
            Self {
                millis,
                calls: Mutex::new(Vec::new()),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    impl WorkloadRunner for ScriptedRunner {
        fn run(
            &self,
            devices: &DeviceCollection,
            _workload: &ReferenceWorkload,
        ) -> std::result::Result<(), RunError> {
            assert_eq!(devices.len(), 1, "benchmarks run on one device at a time");
            let name = devices.device(0).map(|d| d.name().to_string()).unwrap_or_default();
            self.calls.lock().unwrap().push(name.clone());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            let outcome = match name.as_str() {
                "broken" => Err("kernel build failed".into()),
                "panics" => panic!("driver crash"),
                _ => {
                    let ms = self
                        .millis
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, ms)| *ms)
                        .unwrap_or(0);
                    thread::sleep(Duration::from_millis(ms));
                    Ok(())
                }
            };
            self.running.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }

    pub(crate) fn gpus(names: &[&str]) -> DeviceCollection {
        let mut platform = InventoryPlatform::new("Bench", "Vendor");
        for name in names {
            platform = platform.with_device(InventoryDevice::new(
                DeviceKind::Gpu,
                *name,
                "Vendor",
                16,
                1 << 30,
                false,
            ));
        }
        let runtime: Arc<dyn NativeRuntime> = Arc::new(InventoryRuntime::new(Inventory {
            platforms: vec![platform],
        }));
        PlatformCatalog::discover_all(runtime)
            .unwrap()
            .to_devices(KindSet::ALL, DeviceConfig::default())
    }

    fn bench(runner: Arc<ScriptedRunner>, timeout_ms: u64) -> BenchmarkRunner {
        let config = BenchmarkConfig {
            timeout_ms,
            ..BenchmarkConfig::default()
        };
        BenchmarkRunner::with_config(runner, &config).unwrap()
    }

    #[test]
    fn measures_every_device_in_order() {
        let runner = Arc::new(ScriptedRunner::new(vec![("slow", 60), ("fast", 0)]));
        let measurements = bench(runner.clone(), 5_000)
            .measure_all(&gpus(&["slow", "fast"]), DeviceConfig::default());
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0].device, "slow");
        assert_eq!(measurements[1].position, 1);
        assert!(measurements[0].elapsed().unwrap() >= Duration::from_millis(60));
        assert_eq!(*runner.calls.lock().unwrap(), vec!["slow", "fast"]);
    }

    #[test]
    fn devices_never_run_concurrently() {
        let runner = Arc::new(ScriptedRunner::new(vec![("a", 20), ("b", 20), ("c", 20)]));
        bench(runner.clone(), 5_000).measure_all(&gpus(&["a", "b", "c"]), DeviceConfig::default());
        assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_reported_not_swallowed() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let measurements = bench(runner, 5_000).measure_all(&gpus(&["broken"]), DeviceConfig::default());
        assert_eq!(measurements[0].outcome, Outcome::Failed("kernel build failed".into()));
        let err = measurements[0].failure().unwrap();
        assert!(matches!(err, BenchError::BenchmarkFailure { ref device, .. } if device == "broken"));
    }

    #[test]
    fn panicking_runner_is_a_failure() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let m = bench(runner, 5_000).measure_all(&gpus(&["panics"]), DeviceConfig::default());
        assert_eq!(m[0].outcome, Outcome::Failed("workload runner panicked".into()));
    }

    #[test]
    fn slow_device_times_out() {
        let runner = Arc::new(ScriptedRunner::new(vec![("stuck", 1_000)]));
        let m = bench(runner, 30).measure_all(&gpus(&["stuck"]), DeviceConfig::default());
        assert_eq!(m[0].outcome, Outcome::TimedOut(Duration::from_millis(30)));
        assert!(m[0].failure().unwrap().to_string().contains("timed out after 30 ms"));
    }

    #[test]
    fn timed_out_run_finishes_before_the_next_device_starts() {
        let runner = Arc::new(ScriptedRunner::new(vec![("stuck", 150), ("b", 20)]));
        let m = bench(runner.clone(), 100).measure_all(&gpus(&["stuck", "b"]), DeviceConfig::default());
        assert_eq!(m[0].outcome, Outcome::TimedOut(Duration::from_millis(100)));
        assert!(m[1].elapsed().is_some());
        assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_after_a_hung_run_is_blocked_not_overlapped() {
        let runner = Arc::new(ScriptedRunner::new(vec![("stuck", 2_000), ("b", 0)]));
        let m = bench(runner.clone(), 30).measure_all(&gpus(&["stuck", "b"]), DeviceConfig::default());
        assert_eq!(m[0].outcome, Outcome::TimedOut(Duration::from_millis(30)));
        assert_eq!(m[1].outcome, Outcome::Blocked("stuck".into()));
        assert!(m[1].failure().unwrap().to_string().contains("still running"));
        assert_eq!(*runner.calls.lock().unwrap(), vec!["stuck"]);
        assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = BenchmarkConfig {
            timeout_ms: 0,
            ..BenchmarkConfig::default()
        };
        let err = BenchmarkRunner::with_config(Arc::new(ScriptedRunner::new(vec![])), &config)
            .unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfig { ref detail } if detail.contains("timeout-ms")));
    }

    #[test]
    fn single_measurement() {
        let runner = BenchmarkRunner::new(Arc::new(ScriptedRunner::new(vec![])));
        let devices = gpus(&["solo"]);
        let m = runner.measure(0, devices.device(0).unwrap(), DeviceConfig::default());
        assert_eq!(m.device, "solo");
        assert!(m.elapsed().is_some());
    }

    #[test]
    fn defaults_follow_benchmark_config() {
        let runner = BenchmarkRunner::new(Arc::new(ScriptedRunner::new(vec![])));
        assert_eq!(runner.workload(), &ReferenceWorkload::nbody());
        assert_eq!(runner.timeout(), Duration::from_secs(60));
    }
}
