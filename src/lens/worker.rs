use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Composition, CompositionError, Message, Predicate, Recorder, Started, Step};
use crate::moment::Moment;

/// Handle to a running composition.
pub struct CompositionHandle<S> {
    state: watch::Receiver<Arc<S>>,
    queue: mpsc::UnboundedSender<Message<S>>,
    moments: Option<mpsc::UnboundedReceiver<Moment>>,
    cancel: CancellationToken,
    worker: JoinHandle<Arc<S>>,
}

impl<S: Send + Sync + 'static> CompositionHandle<S> {
    /// Watch the latest aggregate state.
    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.state.clone()
    }

    pub fn current(&self) -> Arc<S> {
        Arc::clone(&self.state.borrow())
    }

    /// Take the stream of recorded moments. `None` without
    /// [`Composition::recording`] or once taken.
    pub fn moments(&mut self) -> Option<mpsc::UnboundedReceiver<Moment>> {
        self.moments.take()
    }

    /// Queue a state update behind any pending driver actions.
    ///
    /// Dispatched updates are not attributed to a driver and record no moment.
    pub fn dispatch(&self, update: impl FnOnce(&S) -> S + Send + 'static) -> Result<(), CompositionError> {
        let step = Step {
            cause: None,
            action: "dispatch".to_string(),
            apply: Box::new(move |state: &S| Ok(update(state))),
        };
        self.queue
            .send(Message::Step(step))
            .map_err(|_| CompositionError::Stopped)
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker to stop on its own and return the final state.
    pub async fn join(self) -> Result<Arc<S>, CompositionError> {
        Ok(self.worker.await?)
    }

    /// Stop the worker, tear every driver down and return the final state.
    pub async fn shutdown(self) -> Result<Arc<S>, CompositionError> {
        self.cancel.cancel();
        self.join().await
    }
}

pub(super) fn spawn<S: Send + Sync + 'static>(composition: Composition<S>) -> CompositionHandle<S> {
    let Composition {
        lenses,
        initial,
        recorder,
        terminate,
    } = composition;

    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let initial = Arc::new(initial);
    let (state_tx, state_rx) = watch::channel(Arc::clone(&initial));
    let (moments_tx, moments_rx) = match recorder {
        Some(_) => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        }
        None => (None, None),
    };

    let drivers: Vec<Started<S>> = lenses
        .into_iter()
        .enumerate()
        .map(|(index, lens)| lens.start(index, queue_tx.clone()))
        .collect();
    let cancel = CancellationToken::new();

    let worker = Worker {
        live: drivers.len(),
        state: initial,
        queue: queue_rx,
        drivers,
        recorder,
        moments: moments_tx,
        publish: state_tx,
        terminate,
        cancel: cancel.clone(),
    };
    tracing::debug!(drivers = worker.drivers.len(), "Starting composition");

    CompositionHandle {
        state: state_rx,
        queue: queue_tx,
        moments: moments_rx,
        cancel,
        worker: tokio::spawn(worker.run()),
    }
}

/// Sole owner of the aggregate state.
struct Worker<S> {
    state: Arc<S>,
    queue: mpsc::UnboundedReceiver<Message<S>>,
    drivers: Vec<Started<S>>,
    live: usize,
    recorder: Option<Recorder<S>>,
    moments: Option<mpsc::UnboundedSender<Moment>>,
    publish: watch::Sender<Arc<S>>,
    terminate: Option<Predicate<S>>,
    cancel: CancellationToken,
}

impl<S: Send + Sync + 'static> Worker<S> {
    async fn run(mut self) -> Arc<S> {
        self.render_all();

        while self.live > 0 {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Composition cancelled");
                    break;
                }
                message = self.queue.recv() => message,
            };
            match message {
                Some(Message::Step(step)) => {
                    if self.apply(step) {
                        tracing::debug!("Composition reached a terminating state");
                        break;
                    }
                }
                Some(Message::Ended(index)) => {
                    self.live -= 1;
                    tracing::debug!(driver = index, remaining = self.live, "Driver stream ended");
                }
                None => break,
            }
        }

        self.teardown().await;
        self.state
    }

    /// Returns true when the new state asks the composition to stop.
    fn apply(&mut self, step: Step<S>) -> bool {
        let Step {
            cause,
            action,
            apply,
        } = step;

        let next = match apply(self.state.as_ref()) {
            Ok(next) => Arc::new(next),
            Err(err) => {
                tracing::warn!(
                    driver = ?cause,
                    action = %action,
                    error = %err,
                    "Reducer rejected action, keeping prior state"
                );
                return false;
            }
        };

        if let (Some(cause), Some(recorder)) = (cause, self.recorder.as_mut()) {
            let moment = recorder(cause, action, self.state.as_ref(), next.as_ref());
            if let (Some(moment), Some(moments)) = (moment, &self.moments) {
                let _ = moments.send(moment);
            }
        }

        self.state = next;
        self.publish.send_replace(Arc::clone(&self.state));
        self.render_all();

        self.terminate
            .as_ref()
            .is_some_and(|terminate| terminate(self.state.as_ref()))
    }

    fn render_all(&self) {
        for driver in &self.drivers {
            let _ = driver.renders.send(Arc::clone(&self.state));
        }
    }

    async fn teardown(&mut self) {
        for driver in self.drivers.drain(..) {
            let Started {
                pump,
                renders,
                renderer,
            } = driver;
            pump.abort();
            let _ = pump.await;
            drop(renders);
            if let Err(err) = renderer.await {
                tracing::warn!(error = %err, "Driver render task failed");
            }
        }
        self.moments = None;
    }
}
