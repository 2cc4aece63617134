use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool of worker threads running drain tasks.
///
/// `shutdown` is an orderly stop: intake ends, idle workers wake up and
/// exit, and in-flight jobs run to completion on their own. It never
/// blocks the caller, so a session can close while a drain task is still
/// pinned to a child that outlived its timeout.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    state: Mutex<PoolState>,
    available: Condvar,
}

struct PoolState {
    queue: VecDeque<Job>,
    shutdown: bool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        for n in 0..size.max(1) {
            let worker = inner.clone();
            let _ = thread::Builder::new()
                .name(format!("shellflow-worker-{n}"))
                .spawn(move || worker_loop(&worker));
        }

        Self { inner }
    }

    /// Enqueues a job and returns a handle that yields the job's result
    /// once it has run. After shutdown the job is rejected and the handle
    /// reports that immediately.
    pub fn submit(
        &self,
        job: impl FnOnce() -> io::Result<()> + Send + 'static,
    ) -> TaskHandle {
        let handle = TaskHandle::pending();
        let completion = handle.cell.clone();
        let wrapped: Job = Box::new(move || completion.complete(job()));

        let mut state = self.inner.lock_state();
        if state.shutdown {
            drop(state);
            handle
                .cell
                .complete(Err(io::Error::other("worker pool is shut down")));
            return handle;
        }
        state.queue.push_back(wrapped);
        drop(state);
        self.inner.available.notify_one();
        handle
    }

    /// Idempotent; safe to call while jobs are still running.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock_state();
        state.shutdown = true;
        drop(state);
        self.inner.available.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PoolInner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().expect("worker pool state poisoned")
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let job = {
            let mut state = inner.lock_state();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    break job;
                }
                if state.shutdown {
                    return;
                }
                state = inner
                    .available
                    .wait(state)
                    .expect("worker pool state poisoned");
            }
        };
        job();
    }
}

/// Completion handle for a submitted job.
pub struct TaskHandle {
    cell: Arc<Completion>,
}

struct Completion {
    state: Mutex<Option<io::Result<()>>>,
    done: Condvar,
}

impl Completion {
    fn complete(&self, result: io::Result<()>) {
        let mut slot = self.state.lock().expect("task completion poisoned");
        *slot = Some(result);
        drop(slot);
        self.done.notify_all();
    }
}

impl TaskHandle {
    fn pending() -> Self {
        Self {
            cell: Arc::new(Completion {
                state: Mutex::new(None),
                done: Condvar::new(),
            }),
        }
    }

    /// Blocks until the job has run and returns its result.
    pub fn join(self) -> io::Result<()> {
        let mut slot = self.cell.state.lock().expect("task completion poisoned");
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self
                .cell
                .done
                .wait(slot)
                .expect("task completion poisoned");
        }
    }

    pub fn is_done(&self) -> bool {
        self.cell
            .state
            .lock()
            .expect("task completion poisoned")
            .is_some()
    }
}
