//! Combining drivers into one aggregate state.
//!
//! Each driver is paired with a projection (aggregate state → driver model)
//! and a reducer (aggregate state + driver action → aggregate state). Paired
//! drivers are zipped into a [`Lensed`] set, seeded with an initial state and
//! spawned as a single-writer [`Composition`]:
//!
//! ```text
//! driver events ──pump──┐
//! driver events ──pump──┼─▶ ordered queue ─▶ worker ─▶ Arc<S> ─▶ render task per driver
//! dispatch()    ────────┘                      │
//!                                              └─▶ moments (when recording)
//! ```
//!
//! Reductions never overlap: the worker applies one step at a time to the
//! latest state. Rendering happens in a separate task per driver so a slow
//! driver never delays the others.

mod worker;

pub use worker::CompositionHandle;

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::describe::{DecodeError, Describe};
use crate::driver::{Driver, DriverKind};
use crate::moment::{Moment, MomentRecorder};

/// Why a reducer declined to produce a new state.
///
/// The composition keeps the prior state and records nothing.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    #[error("failed to decode payload: {0}")]
    Decode(#[from] DecodeError),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("composition has stopped")]
    Stopped,

    #[error("composition worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

type Apply<S> = Box<dyn FnOnce(&S) -> Result<S, ReduceError> + Send>;
type Recorder<S> = Box<dyn FnMut(usize, String, &S, &S) -> Option<Moment> + Send>;
type Predicate<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;

/// One queued reduction. `cause` is the ordinal of the firing driver, or
/// `None` for steps injected through [`CompositionHandle::dispatch`].
struct Step<S> {
    cause: Option<usize>,
    action: String,
    apply: Apply<S>,
}

enum Message<S> {
    Step(Step<S>),
    Ended(usize),
}

struct Started<S> {
    pump: JoinHandle<()>,
    renders: mpsc::UnboundedSender<Arc<S>>,
    renderer: JoinHandle<()>,
}

trait ErasedLens<S>: Send {
    fn kind(&self) -> DriverKind;

    fn start(self: Box<Self>, index: usize, queue: mpsc::UnboundedSender<Message<S>>)
        -> Started<S>;
}

struct Lens<D, P, R> {
    driver: D,
    projection: P,
    reducer: R,
}

impl<S, D, P, R> ErasedLens<S> for Lens<D, P, R>
where
    S: Send + Sync + 'static,
    D: Driver,
    D::Action: Describe,
    P: Fn(&S) -> D::Model + Send + Sync + 'static,
    R: Fn(&S, D::Action) -> Result<S, ReduceError> + Send + Sync + 'static,
{
    fn kind(&self) -> DriverKind {
        self.driver.kind()
    }

    fn start(
        self: Box<Self>,
        index: usize,
        queue: mpsc::UnboundedSender<Message<S>>,
    ) -> Started<S> {
        let Lens {
            mut driver,
            projection,
            reducer,
        } = *self;
        let reducer = Arc::new(reducer);
        let mut events = driver.events();

        let pump = tokio::spawn(async move {
            while let Some(action) = events.next().await {
                let text = action.to_text();
                let reducer = Arc::clone(&reducer);
                let step = Step {
                    cause: Some(index),
                    action: text,
                    apply: Box::new(move |state: &S| reducer(state, action)),
                };
                if queue.send(Message::Step(step)).is_err() {
                    return;
                }
            }
            let _ = queue.send(Message::Ended(index));
        });

        let (renders, mut states) = mpsc::unbounded_channel::<Arc<S>>();
        let renderer = tokio::spawn(async move {
            while let Some(state) = states.recv().await {
                driver.render(projection(state.as_ref())).await;
            }
            driver.shutdown().await;
        });

        Started {
            pump,
            renders,
            renderer,
        }
    }
}

/// Pair `driver` with the slice of state it renders and the reducer for its actions.
pub fn compose<S, D, P, R>(projection: P, driver: D, reducer: R) -> Lensed<S>
where
    S: Send + Sync + 'static,
    D: Driver,
    D::Action: Describe,
    P: Fn(&S) -> D::Model + Send + Sync + 'static,
    R: Fn(&S, D::Action) -> S + Send + Sync + 'static,
{
    compose_fallible(projection, driver, move |state: &S, action| {
        Ok(reducer(state, action))
    })
}

/// Like [`compose`], for reducers that can reject an action.
pub fn compose_fallible<S, D, P, R>(projection: P, driver: D, reducer: R) -> Lensed<S>
where
    S: Send + Sync + 'static,
    D: Driver,
    D::Action: Describe,
    P: Fn(&S) -> D::Model + Send + Sync + 'static,
    R: Fn(&S, D::Action) -> Result<S, ReduceError> + Send + Sync + 'static,
{
    Lensed {
        lenses: vec![Box::new(Lens {
            driver,
            projection,
            reducer,
        })],
    }
}

/// A set of drivers sharing one aggregate state type.
pub struct Lensed<S> {
    lenses: Vec<Box<dyn ErasedLens<S>>>,
}

impl<S: Send + Sync + 'static> Lensed<S> {
    /// Merge two sets. Ordinals follow the order of the combined list.
    pub fn zip(mut self, other: Lensed<S>) -> Self {
        self.lenses.extend(other.lenses);
        self
    }

    pub fn merge(sets: impl IntoIterator<Item = Lensed<S>>) -> Self {
        Lensed {
            lenses: sets.into_iter().flat_map(|set| set.lenses).collect(),
        }
    }

    pub fn kinds(&self) -> Vec<DriverKind> {
        self.lenses.iter().map(|lens| lens.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.lenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lenses.is_empty()
    }

    /// Seed the composition with `initial`, rendered before any driver fires.
    pub fn prefixed(self, initial: S) -> Composition<S> {
        Composition {
            lenses: self.lenses,
            initial,
            recorder: None,
            terminate: None,
        }
    }
}

/// A seeded, not yet running composition.
pub struct Composition<S> {
    lenses: Vec<Box<dyn ErasedLens<S>>>,
    initial: S,
    recorder: Option<Recorder<S>>,
    terminate: Option<Predicate<S>>,
}

impl<S: Send + Sync + 'static> Composition<S> {
    /// Record a [`Moment`] for every successful driver reduction.
    ///
    /// Moments are available from [`CompositionHandle::moments`].
    pub fn recording(mut self) -> Self
    where
        S: Describe,
    {
        let kinds = self.lenses.iter().map(|lens| lens.kind()).collect();
        let mut recorder = MomentRecorder::new(kinds);
        self.recorder = Some(Box::new(move |cause, action, before: &S, after: &S| {
            recorder.record(cause, action, before.to_text(), after.to_text())
        }));
        self
    }

    /// Stop the worker once a produced state satisfies `predicate`.
    pub fn terminate_when(mut self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.terminate = Some(Box::new(predicate));
        self
    }

    /// Start the pumps, render tasks and worker on the current runtime.
    pub fn spawn(self) -> CompositionHandle<S> {
        worker::spawn(self)
    }
}
