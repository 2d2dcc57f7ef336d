use std::future::Future;

use tokio::task::JoinHandle;

// Owns every background loop's handle so one teardown call can stop them
// all; no orphaned timers may outlive the owning session.
pub struct TaskRunner {
    handles: Vec<JoinHandle<()>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(task));
    }

    pub fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.abort_all();
    }
}
