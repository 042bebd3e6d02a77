//! Inference orchestration
//!
//! Gates requests on model readiness, frames them, and runs the blocking
//! engine call on a dedicated worker thread.
//!
//! # Concurrency
//!
//! There is exactly one in-flight slot. A request submitted while another is
//! running is rejected with [`GenerationError::Busy`] rather than queued, so
//! callers are expected to disable their trigger until the previous result
//! arrives. The worker thread and the lifecycle's model mutex each guarantee
//! that engine calls never overlap.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::inference::engine::{panic_message, Engine};
use crate::inference::lifecycle::ModelLifecycle;
use crate::text::framing::{NormalizedPrompt, PromptFramer};
use crate::types::generation::{GenerationError, GenerationRequest, GenerationResult};

/// Receives the result of one request
pub type CompletionSink = Box<dyn FnOnce(GenerationResult) + Send + 'static>;

/// Commands sent to the worker thread
enum WorkerCommand {
    Generate {
        prompt: NormalizedPrompt,
        on_complete: CompletionSink,
    },
    Shutdown,
}

/// Front door for generation requests.
///
/// Dropping it stops the worker after the running request, if any, finishes.
/// Outside a tokio runtime the drop blocks until then; inside one the join is
/// handed to the blocking pool so no runtime thread waits on the engine.
pub struct InferenceOrchestrator<E: Engine> {
    lifecycle: Arc<ModelLifecycle<E>>,
    framer: PromptFramer,
    busy: Arc<AtomicBool>,
    request_timeout: Option<Duration>,
    /// Channel to send commands to the worker thread
    command_tx: Option<Sender<WorkerCommand>>,
    /// Handle to the worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl<E: Engine> InferenceOrchestrator<E> {
    /// Spawns the worker thread that will run every engine call.
    pub fn new(lifecycle: Arc<ModelLifecycle<E>>, framer: PromptFramer) -> Self {
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();
        let busy = Arc::new(AtomicBool::new(false));

        let worker_lifecycle = lifecycle.clone();
        let worker_busy = busy.clone();
        let handle = thread::spawn(move || {
            worker_thread_main(command_rx, worker_lifecycle, worker_busy);
        });
        tracing::debug!("Inference worker thread started");

        Self {
            lifecycle,
            framer,
            busy,
            request_timeout: None,
            command_tx: Some(command_tx),
            worker_handle: Some(handle),
        }
    }

    /// Bounds how long [`generate`](Self::generate) waits for a result.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle<E>> {
        &self.lifecycle
    }

    /// True while a request occupies the in-flight slot
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Submits a request; `on_complete` is called exactly once.
    ///
    /// Validation, readiness and busy failures are delivered synchronously on
    /// the calling thread. Everything else is delivered on the worker thread.
    /// Never blocks on the engine.
    pub fn submit<F>(&self, request: GenerationRequest, on_complete: F)
    where
        F: FnOnce(GenerationResult) + Send + 'static,
    {
        if request.is_blank() {
            tracing::debug!("Rejecting request with empty input");
            on_complete(Err(GenerationError::EmptyInput));
            return;
        }

        if !self.lifecycle.is_ready() {
            tracing::debug!("Rejecting request, model is {:?}", self.lifecycle.state());
            on_complete(Err(GenerationError::NotReady));
            return;
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Rejecting request, a generation is already running");
            on_complete(Err(GenerationError::Busy));
            return;
        }

        let prompt = self.framer.frame_request(&request);
        tracing::debug!("Dispatching {:?}", prompt);

        let Some(command_tx) = self.command_tx.as_ref() else {
            self.busy.store(false, Ordering::Release);
            on_complete(Err(GenerationError::WorkerUnavailable));
            return;
        };

        let command = WorkerCommand::Generate {
            prompt,
            on_complete: Box::new(on_complete),
        };
        if let Err(mpsc::SendError(command)) = command_tx.send(command) {
            tracing::error!("Inference worker is gone");
            self.busy.store(false, Ordering::Release);
            if let WorkerCommand::Generate { on_complete, .. } = command {
                on_complete(Err(GenerationError::WorkerUnavailable));
            }
        }
    }

    /// Submits a request and awaits its result on the calling task.
    pub async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        let (result_tx, result_rx) = oneshot::channel();
        self.submit(request, move |result| {
            let _ = result_tx.send(result);
        });

        let received = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, result_rx).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::warn!("No result after {:?}, giving up on request", limit);
                    return Err(GenerationError::TimedOut);
                }
            },
            None => result_rx.await,
        };

        // The sink is only dropped unsent if the worker died with it
        received.unwrap_or(Err(GenerationError::WorkerUnavailable))
    }
}

impl<E: Engine> Drop for InferenceOrchestrator<E> {
    fn drop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(WorkerCommand::Shutdown);
        }
        let Some(handle) = self.worker_handle.take() else {
            return;
        };
        // Dropped from inside a completion callback: the worker exits on its own
        if handle.thread().id() == thread::current().id() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    let _ = handle.join();
                });
            }
            Err(_) => {
                let _ = handle.join();
            }
        }
    }
}

/// Worker thread main loop
fn worker_thread_main<E: Engine>(
    command_rx: Receiver<WorkerCommand>,
    lifecycle: Arc<ModelLifecycle<E>>,
    busy: Arc<AtomicBool>,
) {
    loop {
        match command_rx.recv() {
            Ok(WorkerCommand::Generate {
                prompt,
                on_complete,
            }) => {
                let started = Instant::now();
                let result = run_generation(&lifecycle, &prompt);
                match &result {
                    Ok(text) => tracing::info!(
                        "Generation finished in {:?} ({} chars)",
                        started.elapsed(),
                        text.chars().count()
                    ),
                    Err(e) => {
                        tracing::warn!("Generation failed after {:?}: {}", started.elapsed(), e)
                    }
                }

                // Free the slot first so the callback may submit a follow-up
                busy.store(false, Ordering::Release);
                if panic::catch_unwind(AssertUnwindSafe(move || on_complete(result))).is_err() {
                    tracing::error!("Completion callback panicked");
                }
            }
            Ok(WorkerCommand::Shutdown) => {
                tracing::debug!("Inference worker shutting down");
                break;
            }
            Err(_) => {
                tracing::debug!("Command channel closed, worker exiting");
                break;
            }
        }
    }
}

/// Runs one engine call, converting every failure (panics included) into a result
fn run_generation<E: Engine>(
    lifecycle: &ModelLifecycle<E>,
    prompt: &NormalizedPrompt,
) -> GenerationResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        lifecycle.with_model(|engine, model| match prompt {
            NormalizedPrompt::Single(text) => engine.generate(model, text),
            NormalizedPrompt::WithContext {
                left_context,
                input,
            } => engine.generate_with_context(model, left_context, input),
        })
    }));

    match outcome {
        Ok(Some(Ok(text))) => Ok(text),
        Ok(Some(Err(e))) => Err(GenerationError::Inference(e.to_string())),
        Ok(None) => Err(GenerationError::NotReady),
        Err(payload) => Err(GenerationError::Inference(panic_message(payload))),
    }
}
