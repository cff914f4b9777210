//! Process-wide compiler loader
//!
//! The compiler capability is fetched lazily, at most one fetch in flight at
//! a time, and the published handle is shared by every widget. Callers that
//! arrive during a load wait on the same outcome; a failed load leaves the
//! loader in `Failed` and the next caller starts a fresh attempt.
//!
//! # Example
//!
//! ```rust,no_run
//! use playground_core::compiler::CompilerLoader;
//!
//! # async fn demo() -> Result<(), playground_core::compiler::LoadFailure> {
//! let compiler = CompilerLoader::global().ensure_loaded().await?;
//! println!("{} {}", compiler.name(), compiler.version());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::Compiler;
use crate::script::{ScriptCompiler, COMPILER_NAME, COMPILER_VERSION};

/// Locator of the compiler bundled with this crate
pub const DEFAULT_LOCATOR: &str = "bundled:snippet-script";

/// Global loader shared by every widget in the process
static GLOBAL_LOADER: OnceLock<Arc<CompilerLoader>> = OnceLock::new();

/* ===================== Errors ===================== */

/// Why the compiler capability could not be obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    #[error("Unsupported compiler locator '{0}'")]
    UnsupportedLocator(String),

    #[error("No bundled compiler named '{0}'")]
    NotFound(String),

    #[error("Compiler version {requested} requested but {available} is bundled")]
    VersionMismatch { requested: String, available: String },

    #[error("Failed to load compiler from '{locator}': {reason}")]
    Fetch { locator: String, reason: String },

    #[error("Compiler load ended without a result")]
    Abandoned,
}

/* ===================== Sources ===================== */

/// Where compiler capabilities come from
#[async_trait]
pub trait CompilerSource: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Arc<dyn Compiler>, LoadFailure>;
}

/// Resolves `bundled:<name>[@<version>]` to the compiler built into this crate
#[derive(Debug, Default, Clone)]
pub struct BundledSource;

#[async_trait]
impl CompilerSource for BundledSource {
    async fn fetch(&self, locator: &str) -> Result<Arc<dyn Compiler>, LoadFailure> {
        let spec = locator
            .strip_prefix("bundled:")
            .ok_or_else(|| LoadFailure::UnsupportedLocator(locator.to_string()))?;

        let (name, version) = match spec.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (spec, None),
        };

        if name != COMPILER_NAME {
            return Err(LoadFailure::NotFound(name.to_string()));
        }
        if let Some(version) = version {
            if version != COMPILER_VERSION {
                return Err(LoadFailure::VersionMismatch {
                    requested: version.to_string(),
                    available: COMPILER_VERSION.to_string(),
                });
            }
        }

        Ok(Arc::new(ScriptCompiler::new()))
    }
}

/* ===================== Loader ===================== */

type LoadOutcome = Option<Result<Arc<dyn Compiler>, LoadFailure>>;

enum Slot {
    Uninitialized,
    Loading(watch::Receiver<LoadOutcome>),
    Ready(Arc<dyn Compiler>),
    Failed(LoadFailure),
}

/// Observable lifecycle of the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Single-flight loader for the compiler capability
pub struct CompilerLoader {
    source: Arc<dyn CompilerSource>,
    locator: String,
    slot: Arc<Mutex<Slot>>,
    fetches: AtomicUsize,
    waiting: Arc<AtomicUsize>,
}

/// Counts one caller parked on a load for as long as it lives
struct Waiting(Arc<AtomicUsize>);

impl Waiting {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count.clone())
    }
}

impl Drop for Waiting {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CompilerLoader {
    pub fn new(source: Arc<dyn CompilerSource>, locator: impl Into<String>) -> Self {
        Self {
            source,
            locator: locator.into(),
            slot: Arc::new(Mutex::new(Slot::Uninitialized)),
            fetches: AtomicUsize::new(0),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Loader for the bundled compiler at the given locator
    pub fn bundled(locator: impl Into<String>) -> Self {
        Self::new(Arc::new(BundledSource), locator)
    }

    /// Install the process-wide loader
    ///
    /// Fails (returning the rejected loader) when a global loader already
    /// exists, either installed earlier or created by [`CompilerLoader::global`].
    pub fn install_global(loader: Arc<CompilerLoader>) -> Result<(), Arc<CompilerLoader>> {
        GLOBAL_LOADER.set(loader)
    }

    /// The process-wide loader, created with the bundled source on first use
    pub fn global() -> Arc<CompilerLoader> {
        GLOBAL_LOADER
            .get_or_init(|| Arc::new(Self::bundled(DEFAULT_LOCATOR)))
            .clone()
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Return the compiler, fetching it if no load has succeeded yet
    ///
    /// Joins the in-flight load when there is one. The fetch itself runs on a
    /// spawned task, so a caller that gives up does not strand the others.
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn Compiler>, LoadFailure> {
        let (mut outcome, _waiting) = {
            let mut slot = self.slot.lock();
            let joined = match &*slot {
                Slot::Ready(compiler) => return Ok(compiler.clone()),
                // a closed channel means the load task died without publishing
                Slot::Loading(rx) if rx.has_changed().is_ok() => Some(rx.clone()),
                _ => None,
            };

            let rx = match joined {
                Some(rx) => {
                    debug!(
                        locator = %self.locator,
                        waiters = self.waiting.load(Ordering::SeqCst),
                        "Joining in-flight compiler load"
                    );
                    rx
                }
                None => {
                    let rx = self.start_fetch();
                    *slot = Slot::Loading(rx.clone());
                    rx
                }
            };
            (rx, Waiting::enter(&self.waiting))
        };

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(published) => (*published).clone(),
            Err(_) => None,
        };
        result.unwrap_or(Err(LoadFailure::Abandoned))
    }

    fn start_fetch(&self) -> watch::Receiver<LoadOutcome> {
        let (tx, rx) = watch::channel(None);
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        info!(locator = %self.locator, attempt, "Fetching compiler");

        let source = self.source.clone();
        let locator = self.locator.clone();
        let slot = self.slot.clone();

        tokio::spawn(async move {
            let fetch = {
                let locator = locator.clone();
                tokio::spawn(async move { source.fetch(&locator).await })
            };
            let result = match fetch.await {
                Ok(result) => result,
                Err(err) => Err(LoadFailure::Fetch {
                    locator: locator.clone(),
                    reason: err.to_string(),
                }),
            };

            {
                let mut slot = slot.lock();
                match &result {
                    Ok(compiler) => {
                        info!(
                            compiler = compiler.name(),
                            version = compiler.version(),
                            "Compiler ready"
                        );
                        *slot = Slot::Ready(compiler.clone());
                    }
                    Err(failure) => {
                        warn!(locator = %locator, error = %failure, "Compiler load failed");
                        *slot = Slot::Failed(failure.clone());
                    }
                }
            }

            tx.send_replace(Some(result));
        });

        rx
    }

    /// Number of fetches started so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Ready(_))
    }

    pub fn state(&self) -> LoaderState {
        match &*self.slot.lock() {
            Slot::Uninitialized => LoaderState::Uninitialized,
            Slot::Loading(_) => LoaderState::Loading,
            Slot::Ready(_) => LoaderState::Ready,
            Slot::Failed(_) => LoaderState::Failed,
        }
    }

    /// Failure of the most recent attempt, while no retry has started
    pub fn last_failure(&self) -> Option<LoadFailure> {
        match &*self.slot.lock() {
            Slot::Failed(failure) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Callers currently waiting on the in-flight load
    pub fn waiters(&self) -> usize {
        match &*self.slot.lock() {
            Slot::Loading(_) => self.waiting.load(Ordering::SeqCst),
            _ => 0,
        }
    }
}

impl fmt::Debug for CompilerLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerLoader")
            .field("locator", &self.locator)
            .field("state", &self.state())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts fetches, holds them until the gate opens, fails the first N
    struct GatedSource {
        gate: watch::Receiver<bool>,
        fetches: AtomicUsize,
        failures_left: AtomicUsize,
    }

    impl GatedSource {
        fn new(failures: usize) -> (Arc<Self>, watch::Sender<bool>) {
            let (open, gate) = watch::channel(false);
            let source = Arc::new(Self {
                gate,
                fetches: AtomicUsize::new(0),
                failures_left: AtomicUsize::new(failures),
            });
            (source, open)
        }
    }

    #[async_trait]
    impl CompilerSource for GatedSource {
        async fn fetch(&self, locator: &str) -> Result<Arc<dyn Compiler>, LoadFailure> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;

            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(LoadFailure::Fetch {
                    locator: locator.to_string(),
                    reason: "network unreachable".to_string(),
                });
            }
            Ok(Arc::new(ScriptCompiler::new()))
        }
    }

    async fn wait_for_waiters(loader: &CompilerLoader, count: usize) {
        while loader.waiters() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let (source, open) = GatedSource::new(0);
        let loader = Arc::new(CompilerLoader::new(source.clone(), "gated:test"));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let loader = loader.clone();
            handles.push(tokio::spawn(async move { loader.ensure_loaded().await }));
        }

        wait_for_waiters(&loader, 5).await;
        assert_eq!(loader.state(), LoaderState::Loading);
        open.send_replace(true);

        let mut compilers = Vec::new();
        for handle in handles {
            compilers.push(handle.await.unwrap().expect("Should load"));
        }

        assert_eq!(loader.fetch_count(), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
        assert!(compilers.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn test_ready_loader_does_not_fetch_again() {
        let (source, open) = GatedSource::new(0);
        open.send_replace(true);
        let loader = CompilerLoader::new(source, "gated:test");

        let first = loader.ensure_loaded().await.expect("Should load");
        let second = loader.ensure_loaded().await.expect("Should load");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.fetch_count(), 1);
        assert_eq!(loader.waiters(), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_then_retry_succeeds() {
        let (source, open) = GatedSource::new(1);
        let loader = Arc::new(CompilerLoader::new(source, "gated:test"));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let loader = loader.clone();
            handles.push(tokio::spawn(async move { loader.ensure_loaded().await }));
        }
        wait_for_waiters(&loader, 3).await;
        open.send_replace(true);

        for handle in handles {
            let failure = handle.await.unwrap().unwrap_err();
            assert_eq!(
                failure,
                LoadFailure::Fetch {
                    locator: "gated:test".to_string(),
                    reason: "network unreachable".to_string(),
                }
            );
        }
        assert_eq!(loader.state(), LoaderState::Failed);
        assert!(loader.last_failure().is_some());

        loader.ensure_loaded().await.expect("Retry should load");
        assert_eq!(loader.fetch_count(), 2);
        assert_eq!(loader.state(), LoaderState::Ready);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_strand_waiters() {
        let (source, open) = GatedSource::new(0);
        let loader = Arc::new(CompilerLoader::new(source, "gated:test"));

        let first = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_loaded().await })
        };
        let second = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.ensure_loaded().await })
        };
        wait_for_waiters(&loader, 2).await;

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(loader.waiters(), 1);
        open.send_replace(true);

        second.await.unwrap().expect("Remaining waiter should load");
        assert_eq!(loader.fetch_count(), 1);
        assert_eq!(loader.waiters(), 0);
    }

    #[tokio::test]
    async fn test_bundled_source_locators() {
        let source = BundledSource;

        let compiler = source
            .fetch("bundled:snippet-script")
            .await
            .expect("Should resolve");
        assert_eq!(compiler.name(), COMPILER_NAME);

        let pinned = format!("bundled:snippet-script@{}", COMPILER_VERSION);
        assert!(source.fetch(&pinned).await.is_ok());

        assert!(matches!(
            source.fetch("bundled:snippet-script@0.0.0-never").await,
            Err(LoadFailure::VersionMismatch { .. })
        ));
        assert_eq!(
            source.fetch("bundled:coffeescript").await.unwrap_err(),
            LoadFailure::NotFound("coffeescript".to_string())
        );
        assert_eq!(
            source.fetch("https://cdn.example.com/ts.js").await.unwrap_err(),
            LoadFailure::UnsupportedLocator("https://cdn.example.com/ts.js".to_string())
        );
    }
}
