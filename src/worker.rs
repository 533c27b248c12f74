//! Background transform worker.
//!
//! One long-lived execution thread takes requests from a single-slot
//! mailbox. Submitting while a request is still waiting replaces it, so
//! only the latest edit is ever computed. Multi-channel images fan out to a
//! rayon pool, one job per channel plane, and are joined back in channel
//! order before the result callback runs.
//!
//! ```text
//! submit ──► [mailbox: 1 slot] ──► execution thread
//!                                     │ split
//!                           ┌─────────┼─────────┐
//!                         job 0     job 1     job 2   (rayon pool)
//!                           └─────────┼─────────┘
//!                                     │ join (index order)
//!                                     ▼
//!                                  callback
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, trace, warn};
use ndarray::Array2;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::channels;
use crate::effects::{apply_to_image, ChannelTransform};
use crate::error::{Result, TransformError};
use crate::image::Image;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Threads in the channel pool built by [`TransformWorker::new`].
    pub pool_threads: usize,
    /// How long the execution thread blocks on an empty mailbox before it
    /// checks for shutdown.
    pub poll_interval: Duration,
    pub thread_name: String,
    /// Fan multi-channel images out to the pool, one job per channel.
    pub split_channels: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let pool_threads = thread::available_parallelism()
            .map(|n| n.get().min(8))
            .unwrap_or(4);

        WorkerConfig {
            pool_threads,
            poll_interval: Duration::from_secs(1),
            thread_name: "warp-worker".to_string(),
            split_channels: true,
        }
    }
}

impl WorkerConfig {
    pub fn pool_threads(mut self, threads: usize) -> Self {
        self.pool_threads = threads.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn split_channels(mut self, split: bool) -> Self {
        self.split_channels = split;
        self
    }
}

// ============================================================================
// Requests and results
// ============================================================================

/// A transform together with the image it runs on.
pub struct TransformRequest {
    transform: Arc<dyn ChannelTransform>,
    image: Image,
    split_channels: Option<bool>,
}

impl TransformRequest {
    pub fn new<T: ChannelTransform + 'static>(transform: T, image: Image) -> Self {
        TransformRequest::shared(Arc::new(transform), image)
    }

    pub fn shared(transform: Arc<dyn ChannelTransform>, image: Image) -> Self {
        TransformRequest {
            transform,
            image,
            split_channels: None,
        }
    }

    /// Override [`WorkerConfig::split_channels`] for this request.
    pub fn split_channels(mut self, split: bool) -> Self {
        self.split_channels = Some(split);
        self
    }

    pub fn name(&self) -> &str {
        self.transform.name()
    }
}

/// Result of one executed request, handed to the callback.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub sequence: u64,
    pub name: String,
    pub image: Image,
}

pub type ResultCallback = Arc<dyn Fn(TransformOutput) + Send + Sync>;

struct Envelope {
    sequence: u64,
    request: TransformRequest,
}

// ============================================================================
// Mailbox
// ============================================================================

/// Single-slot channel where a send replaces any unconsumed item.
struct Mailbox {
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
}

impl Mailbox {
    fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Mailbox { sender, receiver }
    }

    fn post(&self, mut envelope: Envelope) {
        loop {
            match self.sender.try_send(envelope) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    envelope = returned;
                    // The execution thread may take the item first, then the retry succeeds
                    if let Ok(stale) = self.receiver.try_recv() {
                        debug!(
                            "request #{} ({}) superseded by #{}",
                            stale.sequence,
                            stale.request.name(),
                            envelope.sequence
                        );
                    }
                }
                // Both ends live in this struct
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Shared {
    callback: RwLock<Option<ResultCallback>>,
    shutdown: AtomicBool,
}

/// Owns the execution thread and the channel pool.
///
/// Dropping the worker shuts it down and joins the execution thread.
pub struct TransformWorker {
    config: WorkerConfig,
    mailbox: Arc<Mailbox>,
    shared: Arc<Shared>,
    sequence: AtomicU64,
    submit_lock: Mutex<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransformWorker {
    /// Start a worker with its own pool of `config.pool_threads` threads.
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let pool_name = config.thread_name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.pool_threads.max(1))
            .thread_name(move |i| format!("{pool_name}-pool-{i}"))
            .panic_handler(|_| error!("channel job panicked outside its guard"))
            .build()
            .map_err(|e| TransformError::Startup(e.to_string()))?;

        TransformWorker::with_pool(config, Arc::new(pool))
    }

    /// Start a worker that fans channels out to an existing pool.
    pub fn with_pool(config: WorkerConfig, pool: Arc<ThreadPool>) -> Result<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let shared = Arc::new(Shared {
            callback: RwLock::new(None),
            shutdown: AtomicBool::new(false),
        });

        let context = ExecutionContext {
            mailbox: Arc::clone(&mailbox),
            shared: Arc::clone(&shared),
            pool,
            poll_interval: config.poll_interval,
            split_channels: config.split_channels,
        };

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || context.run())
            .map_err(|e| TransformError::Startup(e.to_string()))?;

        info!(
            "transform worker `{}` started ({} pool threads)",
            config.thread_name, config.pool_threads
        );

        Ok(TransformWorker {
            config,
            mailbox,
            shared,
            sequence: AtomicU64::new(0),
            submit_lock: Mutex::new(()),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Queue `transform` on `image`, replacing any request not yet started.
    ///
    /// Returns the sequence number carried by the resulting output.
    pub fn submit<T: ChannelTransform + 'static>(&self, transform: T, image: Image) -> u64 {
        self.submit_request(TransformRequest::new(transform, image))
    }

    pub fn submit_request(&self, request: TransformRequest) -> u64 {
        // Sequence order must match mailbox order
        let _guard = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.mailbox.post(Envelope { sequence, request });
        sequence
    }

    /// Sequence number of the most recent submit, 0 before the first one.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Register the result callback, replacing the previous one.
    ///
    /// The callback runs on the execution thread.
    pub fn on_result<F>(&self, callback: F)
    where
        F: Fn(TransformOutput) + Send + Sync + 'static,
    {
        let mut slot = self.shared.callback.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    /// Stop the execution thread after its current request.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);

        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            // A callback dropping the worker would otherwise join itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("transform worker `{}` panicked", self.config.thread_name);
            }
            info!("transform worker `{}` stopped", self.config.thread_name);
        }
    }
}

impl Drop for TransformWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Execution thread
// ============================================================================

struct ExecutionContext {
    mailbox: Arc<Mailbox>,
    shared: Arc<Shared>,
    pool: Arc<ThreadPool>,
    poll_interval: Duration,
    split_channels: bool,
}

impl ExecutionContext {
    fn run(self) {
        while !self.shared.shutdown.load(Ordering::SeqCst) {
            match self.mailbox.receiver.recv_timeout(self.poll_interval) {
                Ok(envelope) => self.handle(envelope),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn handle(&self, envelope: Envelope) {
        let Envelope { sequence, request } = envelope;
        let name = request.name().to_string();
        let split = request.split_channels.unwrap_or(self.split_channels);

        let result = if split && request.image.channels() > 1 {
            self.fan_out(&request)
        } else {
            guarded(&name, "whole image", || apply_to_image(request.transform.as_ref(), &request.image))
        };

        match result {
            Ok(image) => self.emit(TransformOutput { sequence, name, image }),
            Err(e) => error!("request #{sequence} dropped: {e}"),
        }
    }

    /// Run one pool job per channel and join the planes in index order.
    fn fan_out(&self, request: &TransformRequest) -> Result<Image> {
        let receivers: Vec<Receiver<Result<Array2<f32>>>> = channels::split(&request.image)
            .into_iter()
            .enumerate()
            .map(|(index, plane)| {
                let (tx, rx) = bounded(1);
                let transform = Arc::clone(&request.transform);
                self.pool.spawn(move || {
                    trace!("{} on channel {index}", transform.name());
                    let scope = format!("channel {index}");
                    let result = guarded(transform.name(), &scope, || transform.apply(plane.view()));
                    // Receiver outlives every job
                    let _ = tx.send(result);
                });
                rx
            })
            .collect();

        let mut planes = Vec::with_capacity(receivers.len());
        let mut failure = None;

        // Drain every receiver so no job result is left behind
        for (index, rx) in receivers.into_iter().enumerate() {
            match rx.recv() {
                Ok(Ok(plane)) => planes.push(plane),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(TransformError::ExecutionFailure {
                        effect: request.name().to_string(),
                        scope: format!("channel {index}"),
                        message: "job ended without a result".to_string(),
                    });
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => channels::join(planes),
        }
    }

    fn emit(&self, output: TransformOutput) {
        let callback = self
            .shared
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(callback) = callback else {
            warn!("request #{} finished with no result callback", output.sequence);
            return;
        };

        let sequence = output.sequence;
        debug!("request #{sequence} ({}) finished", output.name);
        if catch_unwind(AssertUnwindSafe(|| callback(output))).is_err() {
            error!("result callback panicked on request #{sequence}");
        }
    }
}

/// Run `f`, turning a panic into [`TransformError::ExecutionFailure`].
fn guarded<T>(effect: &str, scope: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(TransformError::ExecutionFailure {
            effect: effect.to_string(),
            scope: scope.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
