#![forbid(unsafe_code)]

//! Fire-and-forget persistence requests.
//!
//! Requests whose outcome does not gate the editor (deleting the backing
//! file of a cascaded delete) are handed to a [`Dispatcher`]. Inline mode
//! runs them immediately on the caller's thread; threaded mode queues them
//! to a single worker so the editor never waits on the network.
//!
//! Completions are collected and handed out by [`Dispatcher::poll`]; the
//! session turns failures into notices. Nothing is rolled back.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use trackfix_store::{PersistenceService, StoreError, StoreReply, StoreRequest};

/// Outcome of one dispatched request.
#[derive(Debug)]
pub struct Completion {
    pub request: StoreRequest,
    pub result: Result<StoreReply, StoreError>,
}

enum Job {
    Run(StoreRequest),
    Shutdown,
}

enum Mode {
    Inline {
        service: Arc<dyn PersistenceService>,
        done: Vec<Completion>,
    },
    Threaded {
        sender: mpsc::Sender<Job>,
        receiver: mpsc::Receiver<Completion>,
        handle: Option<JoinHandle<()>>,
    },
}

/// Runs requests whose result nobody waits for.
pub struct Dispatcher {
    mode: Mode,
    in_flight: usize,
    /// Requests the worker could not accept.
    orphans: Vec<Completion>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Inline { .. } => "inline",
            Mode::Threaded { .. } => "threaded",
        };
        f.debug_struct("Dispatcher")
            .field("mode", &mode)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Dispatcher {
    /// Run each request synchronously inside [`submit`](Self::submit).
    pub fn inline(service: Arc<dyn PersistenceService>) -> Self {
        Self {
            mode: Mode::Inline {
                service,
                done: Vec::new(),
            },
            in_flight: 0,
            orphans: Vec::new(),
        }
    }

    /// Run requests on a dedicated worker thread.
    pub fn threaded(service: Arc<dyn PersistenceService>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<Completion>();

        let handle = thread::Builder::new()
            .name("trackfix-dispatch".into())
            .spawn(move || worker_loop(service, job_rx, done_tx))?;

        Ok(Self {
            mode: Mode::Threaded {
                sender: job_tx,
                receiver: done_rx,
                handle: Some(handle),
            },
            in_flight: 0,
            orphans: Vec::new(),
        })
    }

    pub fn submit(&mut self, request: StoreRequest) {
        tracing::debug!(target: "trackfix.store", request = %request.summary(), "dispatching");
        let rejected = match &mut self.mode {
            Mode::Inline { service, done } => {
                let result = service.call(&request);
                done.push(Completion { request, result });
                None
            }
            Mode::Threaded { sender, .. } => match sender.send(Job::Run(request)) {
                Ok(()) => None,
                Err(mpsc::SendError(Job::Run(request))) => Some(request),
                Err(mpsc::SendError(Job::Shutdown)) => None,
            },
        };
        if let Some(request) = rejected {
            // Worker gone; report instead of losing the request.
            tracing::warn!(
                target: "trackfix.store",
                request = %request.summary(),
                "dispatcher worker is gone"
            );
            self.orphans.push(Completion {
                request,
                result: Err(StoreError::Disconnected),
            });
            return;
        }
        self.in_flight += 1;
    }

    /// Completions that arrived since the last poll.
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut out = std::mem::take(&mut self.orphans);
        let orphaned = out.len();
        match &mut self.mode {
            Mode::Inline { done, .. } => out.append(done),
            Mode::Threaded { receiver, .. } => {
                while let Ok(completion) = receiver.try_recv() {
                    out.push(completion);
                }
            }
        }
        self.in_flight = self.in_flight.saturating_sub(out.len() - orphaned);
        out
    }

    /// Wait until every submitted request completed or `timeout` passed.
    pub fn drain(&mut self, timeout: Duration) -> Vec<Completion> {
        let deadline = Instant::now() + timeout;
        let mut out = self.poll();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Mode::Threaded { receiver, .. } = &self.mode else {
                break;
            };
            match receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    self.in_flight -= 1;
                    out.push(completion);
                }
                Err(_) => break,
            }
        }
        out
    }

    /// Requests submitted but not yet polled.
    pub fn pending(&self) -> usize {
        self.in_flight
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Mode::Threaded { sender, handle, .. } = &mut self.mode {
            let _ = sender.send(Job::Shutdown);
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(
    service: Arc<dyn PersistenceService>,
    jobs: mpsc::Receiver<Job>,
    done: mpsc::Sender<Completion>,
) {
    while let Ok(job) = jobs.recv() {
        let request = match job {
            Job::Run(request) => request,
            Job::Shutdown => break,
        };
        let result = service.call(&request);
        if done.send(Completion { request, result }).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl PersistenceService for Recorder {
        fn send(&self, request: &StoreRequest) -> trackfix_store::Result<String> {
            self.seen.lock().unwrap().push(request.summary());
            match request {
                StoreRequest::DeleteFile { file_path } if file_path.contains("missing") => {
                    Ok("ERROR: no such file".into())
                }
                _ => Ok(String::new()),
            }
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[test]
    fn inline_runs_on_submit() {
        let service = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::inline(service.clone());
        dispatcher.submit(StoreRequest::delete_file("data/a_geojsons.json"));
        assert_eq!(service.seen.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.pending(), 1);

        let done = dispatcher.poll();
        assert_eq!(done.len(), 1);
        assert!(done[0].result.is_ok());
        assert_eq!(dispatcher.pending(), 0);
        assert!(dispatcher.poll().is_empty());
    }

    #[test]
    fn failures_are_reported_not_raised() {
        let mut dispatcher = Dispatcher::inline(Arc::new(Recorder::default()));
        dispatcher.submit(StoreRequest::delete_file("data/missing_geojsons.json"));
        let done = dispatcher.poll();
        assert!(matches!(done[0].result, Err(StoreError::Service { .. })));
    }

    #[test]
    fn threaded_completes_in_order() {
        let service = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::threaded(service.clone()).unwrap();
        for name in ["a", "b", "c"] {
            dispatcher.submit(StoreRequest::delete_file(format!("data/{name}_geojsons.json")));
        }
        let done = dispatcher.drain(Duration::from_secs(5));
        assert_eq!(done.len(), 3);
        assert_eq!(dispatcher.pending(), 0);
        let paths: Vec<_> = done
            .iter()
            .map(|c| match &c.request {
                StoreRequest::DeleteFile { file_path } => file_path.clone(),
                other => panic!("unexpected request {other:?}"),
            })
            .collect();
        assert_eq!(
            paths,
            ["data/a_geojsons.json", "data/b_geojsons.json", "data/c_geojsons.json"]
        );
        drop(dispatcher);
        assert_eq!(service.seen.lock().unwrap().len(), 3);
    }
}
