use std::sync::{Arc, Mutex};
use std::time::Duration;

use execplan::dag::NodeOutcome;
use execplan::exec::{ActionFuture, NodeAction};

#[derive(Debug, Default)]
struct LogInner {
    started: Vec<String>,
    finished: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Shared record of which actions ran, in which order, and how many
/// overlapped.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    inner: Arc<Mutex<LogInner>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An action that records into this log and succeeds immediately.
    pub fn action(&self) -> RecordingAction {
        RecordingAction {
            log: self.clone(),
            delay: Duration::ZERO,
            fail: false,
            panic: false,
        }
    }

    pub fn started(&self) -> Vec<String> {
        self.inner.lock().unwrap().started.clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.inner.lock().unwrap().finished.clone()
    }

    pub fn ran(&self, name: &str) -> bool {
        self.started().iter().any(|n| n == name)
    }

    /// Highest number of actions observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.lock().unwrap().max_in_flight
    }

    fn start(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.started.push(name.to_string());
        inner.in_flight += 1;
        inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
    }

    fn finish(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.finished.push(name.to_string());
        inner.in_flight -= 1;
    }
}

/// A node action for tests: records start/finish into an [`ExecutionLog`]
/// and can be told to sleep, fail or panic.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    log: ExecutionLog,
    delay: Duration,
    fail: bool,
    panic: bool,
}

impl RecordingAction {
    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn shared(self) -> Arc<dyn NodeAction> {
        Arc::new(self)
    }
}

impl NodeAction for RecordingAction {
    fn execute(&self, node: &str) -> ActionFuture {
        let this = self.clone();
        let name = node.to_string();

        Box::pin(async move {
            this.log.start(&name);
            if !this.delay.is_zero() {
                tokio::time::sleep(this.delay).await;
            }
            this.log.finish(&name);

            if this.panic {
                panic!("action for {name} panicked on purpose");
            }
            if this.fail {
                NodeOutcome::Failed(format!("{name} failed on purpose"))
            } else {
                NodeOutcome::Success
            }
        })
    }
}
