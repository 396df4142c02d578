use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use burrow_query::{QueryOptions, QueryRow};
use burrow_store::Store;
use tracing::debug;

use crate::error::DbError;
use crate::view::View;

/// Signals fed to a live query's worker.
pub(crate) enum Signal {
    Mutation,
    OptionsChanged,
    Stop,
}

/// Delivered on the worker's thread whenever the published result set
/// materially changes, or a recompute fails.
pub struct ChangeEvent {
    pub rows: Option<Arc<Vec<QueryRow>>>,
    pub error: Option<Arc<DbError>>,
}

pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send>;

struct LiveShared<S: Store> {
    view: View<S>,
    options: Mutex<QueryOptions>,
    /// Current result snapshot; replaced atomically on recompute.
    published: ArcSwapOption<Vec<QueryRow>>,
    last_error: Mutex<Option<Arc<DbError>>>,
    listeners: Mutex<Vec<ChangeListener>>,
    first: Mutex<bool>,
    first_cv: Condvar,
}

struct Control {
    tx: Sender<Signal>,
    hub_id: u64,
    worker: Option<JoinHandle<()>>,
}

/// Keeps one query's result set current.
///
/// `start` spawns a dedicated worker that resolves the query once (always
/// firing one change event, even for an empty result), then recomputes on
/// document mutations, coalescing bursts through a debounce window.
/// Unchanged results never re-notify; option changes force a full
/// discard-and-recompute. Errors surface as error-bearing change events.
pub struct LiveQuery<S: Store + Send + Sync + 'static> {
    shared: Arc<LiveShared<S>>,
    control: Mutex<Option<Control>>,
}

impl<S: Store + Send + Sync + 'static> LiveQuery<S> {
    pub(crate) fn new(view: View<S>, options: QueryOptions) -> Self {
        Self {
            shared: Arc::new(LiveShared {
                view,
                options: Mutex::new(options),
                published: ArcSwapOption::empty(),
                last_error: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                first: Mutex::new(false),
                first_cv: Condvar::new(),
            }),
            control: Mutex::new(None),
        }
    }

    /// Begin observing. No-op when already running.
    pub fn start(&self) {
        let mut control = self.control.lock().unwrap();
        if control.is_some() {
            return;
        }
        let (tx, rx) = channel();
        let hub_id = self.shared.view.inner.hub.subscribe(tx.clone());
        let debounce =
            Duration::from_millis(self.shared.view.inner.config.live_query_debounce_ms);
        let shared = Arc::clone(&self.shared);
        let worker = thread::spawn(move || worker_loop(shared, rx, debounce));
        *control = Some(Control {
            tx,
            hub_id,
            worker: Some(worker),
        });
    }

    /// Cancel any pending recompute and suppress further notifications.
    pub fn stop(&self) {
        let mut control = self.control.lock().unwrap();
        if let Some(mut control) = control.take() {
            self.shared.view.inner.hub.unsubscribe(control.hub_id);
            let _ = control.tx.send(Signal::Stop);
            if let Some(worker) = control.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// The current published result set; `None` until the first resolution.
    pub fn rows(&self) -> Option<Arc<Vec<QueryRow>>> {
        self.shared.published.load_full()
    }

    pub fn last_error(&self) -> Option<Arc<DbError>> {
        self.shared.last_error.lock().unwrap().clone()
    }

    pub fn add_listener(&self, listener: ChangeListener) {
        self.shared.listeners.lock().unwrap().push(listener);
    }

    /// Replace the query options and force a recompute.
    pub fn set_options(&self, options: QueryOptions) {
        *self.shared.options.lock().unwrap() = options;
        self.query_options_changed();
    }

    /// Force a discard-and-recompute even if no document changed.
    pub fn query_options_changed(&self) {
        let control = self.control.lock().unwrap();
        if let Some(control) = control.as_ref() {
            let _ = control.tx.send(Signal::OptionsChanged);
        }
    }

    /// Block until the first resolution has been published.
    pub fn wait_for_rows(&self) -> Option<Arc<Vec<QueryRow>>> {
        let mut first = self.shared.first.lock().unwrap();
        while !*first {
            first = self.shared.first_cv.wait(first).unwrap();
        }
        drop(first);
        self.rows()
    }
}

impl<S: Store + Send + Sync + 'static> Drop for LiveQuery<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<S: Store + Send + Sync + 'static>(
    shared: Arc<LiveShared<S>>,
    rx: Receiver<Signal>,
    debounce: Duration,
) {
    recompute(&shared, true);
    loop {
        match rx.recv() {
            Err(_) | Ok(Signal::Stop) => break,
            Ok(signal) => {
                let mut force = matches!(signal, Signal::OptionsChanged);
                // Coalesce the burst: drain further signals until the
                // window elapses.
                let deadline = Instant::now() + debounce;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(Signal::Stop) => return,
                        Ok(Signal::OptionsChanged) => force = true,
                        Ok(Signal::Mutation) => {}
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                recompute(&shared, force);
            }
        }
    }
}

fn recompute<S: Store + Send + Sync + 'static>(shared: &LiveShared<S>, force: bool) {
    let options = shared.options.lock().unwrap().clone();
    let event = match shared.view.query(&options) {
        Ok(rows) => {
            let rows = Arc::new(rows);
            let unchanged = !force
                && shared
                    .published
                    .load()
                    .as_ref()
                    .is_some_and(|prev| **prev == *rows);
            shared.published.store(Some(Arc::clone(&rows)));
            *shared.last_error.lock().unwrap() = None;
            if unchanged {
                debug!(view = %shared.view.name(), "live query result unchanged");
                None
            } else {
                Some(ChangeEvent {
                    rows: Some(rows),
                    error: None,
                })
            }
        }
        Err(e) => {
            let error = Arc::new(e);
            *shared.last_error.lock().unwrap() = Some(Arc::clone(&error));
            Some(ChangeEvent {
                rows: None,
                error: Some(error),
            })
        }
    };

    {
        let mut first = shared.first.lock().unwrap();
        if !*first {
            *first = true;
            shared.first_cv.notify_all();
        }
    }

    if let Some(event) = event {
        let listeners = shared.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(&event);
        }
    }
}
