//! Pipe runner: drains a pipe's output into a delivery sink
//!
//! The runner owns one task that loops reading the bound pipe and invoking
//! the sink once per envelope, so deliveries never happen on the caller's
//! thread. Swapping the bound pipe mid-flight reuses the same task and loses
//! nothing: the old pipe is closed and drained to its final buffered envelope
//! before the loop turns to the new pipe.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::protocol::{SignalPipe, SignalSink};

/// Threaded adapter between a [`SignalPipe`]'s output and a [`SignalSink`]
pub struct PipeRunner<In, Out> {
    shared: Arc<RunnerShared<In, Out>>,
    handle: JoinHandle<()>,
}

struct RunnerShared<In, Out> {
    state: Mutex<RunnerState<In, Out>>,
}

struct RunnerState<In, Out> {
    /// Pipe the loop should drain next; `None` means the runner winds down
    /// after finishing the pipe it is currently draining.
    pipe: Option<Arc<dyn SignalPipe<In, Out>>>,
    /// Set between a swap request and the old pipe's final drain.
    switching: bool,
}

impl<In, Out> PipeRunner<In, Out>
where
    In: Send + Sync + 'static,
    Out: Send + Sync + 'static,
{
    /// Start a runner bound to `pipe`, delivering every output envelope to
    /// `sink` on the runner's own task
    pub fn spawn(pipe: Arc<dyn SignalPipe<In, Out>>, sink: Arc<dyn SignalSink<Out>>) -> Self {
        let shared = Arc::new(RunnerShared {
            state: Mutex::new(RunnerState {
                pipe: Some(Arc::clone(&pipe)),
                switching: false,
            }),
        });

        let handle = tokio::spawn(Self::run(Arc::clone(&shared), sink));

        Self { shared, handle }
    }

    /// Atomically rebind the runner to `new_pipe`, closing the previous pipe
    ///
    /// The previous pipe's buffered output is still delivered, in order,
    /// before anything the new pipe produces. Passing `None` means "no more
    /// processing": the runner winds down once the old pipe is drained, and
    /// `None` is returned. Otherwise the runner itself is returned for
    /// chaining.
    pub fn switch_pipe(
        self,
        new_pipe: Option<Arc<dyn SignalPipe<In, Out>>>,
    ) -> Option<Self> {
        let keep_running = new_pipe.is_some();
        let old = {
            let mut state = self.shared.state.lock();
            state.switching = true;
            std::mem::replace(&mut state.pipe, new_pipe)
        };

        match old {
            Some(old) => {
                tracing::debug!(continuing = keep_running, "switching pipe");
                old.close();
            }
            None => {
                // Nothing to drain; the flag has no sentinel to consume.
                self.shared.state.lock().switching = false;
            }
        }

        keep_running.then_some(self)
    }

    /// Whether the runner task has terminated
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    async fn run(shared: Arc<RunnerShared<In, Out>>, sink: Arc<dyn SignalSink<Out>>) {
        let mut current = shared.state.lock().pipe.clone();

        while let Some(pipe) = current.clone() {
            match pipe.read().await {
                Some(envelope) => {
                    tracing::trace!(signal = %envelope.name, "runner delivering signal");
                    sink.deliver(envelope).await;
                }
                None => {
                    // Closed sentinel. With a swap pending this means the old
                    // pipe is fully drained: clear the flag and carry on
                    // against whatever is bound now. Without one, the runner
                    // is done for good.
                    let mut state = shared.state.lock();
                    if state.switching {
                        state.switching = false;
                        current = state.pipe.clone();
                    } else {
                        current = None;
                    }
                }
            }
        }

        tracing::debug!("pipe runner exiting");
    }
}
