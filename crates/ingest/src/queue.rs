//! FIFO task queue drained by a bounded number of concurrent workers.
//!
//! Tasks start in enqueue order as slots free up; completion order is
//! whatever the tasks make of it. There is no priority, timeout or
//! cancellation, and enqueueing never blocks.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    /// Highest `running` value observed since creation or the last
    /// [`TaskQueue::reset_peak`].
    pub peak_running: usize,
    pub completed: u64,
}

struct QueueState {
    pending: VecDeque<BoxFuture<'static, ()>>,
    running: usize,
    peak_running: usize,
    completed: u64,
}

struct Shared {
    limit: usize,
    state: Mutex<QueueState>,
    idle: Notify,
}

/// Cloneable handle to a concurrency-limited queue.
///
/// Must be used from within a tokio runtime: started tasks are spawned.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    /// A queue running at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                limit: limit.max(1),
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                    peak_running: 0,
                    completed: 0,
                }),
                idle: Notify::new(),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Append a task and start it right away if a slot is free.
    ///
    /// Tasks are expected to handle their own failures; a panicking task
    /// still frees its slot.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shared
            .state
            .lock()
            .expect("queue lock poisoned")
            .pending
            .push_back(task.boxed());
        self.drain();
    }

    /// Start queued tasks until every slot is busy or the queue is empty.
    fn drain(&self) {
        loop {
            let task = {
                let mut state = self.shared.state.lock().expect("queue lock poisoned");
                if state.running >= self.shared.limit {
                    break;
                }
                let Some(task) = state.pending.pop_front() else {
                    break;
                };
                state.running += 1;
                state.peak_running = state.peak_running.max(state.running);
                debug!(
                    queued = state.pending.len(),
                    running = state.running,
                    limit = self.shared.limit,
                    "next task"
                );
                task
            };

            let slot = Slot { queue: self.clone() };
            tokio::spawn(async move {
                task.await;
                drop(slot);
            });
        }
    }

    fn finish(&self) {
        let idle = {
            let mut state = self.shared.state.lock().expect("queue lock poisoned");
            state.running -= 1;
            state.completed += 1;
            state.running == 0 && state.pending.is_empty()
        };
        if idle {
            self.shared.idle.notify_waiters();
        } else {
            self.drain();
        }
    }

    /// Start a new peak measurement from the current number of running tasks.
    pub fn reset_peak(&self) {
        let mut state = self.shared.state.lock().expect("queue lock poisoned");
        state.peak_running = state.running;
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state.lock().expect("queue lock poisoned");
        QueueStats {
            queued: state.pending.len(),
            running: state.running,
            peak_running: state.peak_running,
            completed: state.completed,
        }
    }

    pub fn is_idle(&self) -> bool {
        let stats = self.stats();
        stats.running == 0 && stats.queued == 0
    }

    /// Wait until nothing is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

/// Occupied worker slot; released when the task finishes or panics.
struct Slot {
    queue: TaskQueue,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.queue.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit() {
        let queue = TaskQueue::new(5);
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..20u64 {
            let current = Arc::clone(&current);
            let max_seen = Arc::clone(&max_seen);
            let done = Arc::clone(&done);
            queue.enqueue(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + i % 3)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            });
            assert!(queue.stats().running <= 5);
        }

        queue.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 5);
        let stats = queue.stats();
        assert_eq!(stats.peak_running, 5);
        assert_eq!(stats.completed, 20);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn starts_in_enqueue_order() {
        let queue = TaskQueue::new(1);
        let started = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let started = Arc::clone(&started);
            queue.enqueue(async move {
                started.lock().unwrap().push(i);
                tokio::task::yield_now().await;
            });
        }
        queue.wait_idle().await;
        assert_eq!(*started.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn later_task_may_finish_first() {
        let queue = TaskQueue::new(2);
        let finished = Arc::new(Mutex::new(Vec::new()));
        for (name, delay) in [("slow", 30u64), ("fast", 1)] {
            let finished = Arc::clone(&finished);
            queue.enqueue(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                finished.lock().unwrap().push(name);
            });
        }
        queue.wait_idle().await;
        assert_eq!(*finished.lock().unwrap(), ["fast", "slow"]);
    }

    #[tokio::test]
    async fn panicking_task_frees_its_slot() {
        let queue = TaskQueue::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        queue.enqueue(async { panic!("task blew up") });
        let ran2 = Arc::clone(&ran);
        queue.enqueue(async move {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        queue.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().completed, 2);
    }

    #[tokio::test]
    async fn reset_peak_measures_from_now() {
        let queue = TaskQueue::new(5);
        for _ in 0..5 {
            queue.enqueue(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
            });
        }
        queue.wait_idle().await;
        assert_eq!(queue.stats().peak_running, 5);

        queue.reset_peak();
        assert_eq!(queue.stats().peak_running, 0);
        queue.enqueue(async {});
        queue.wait_idle().await;
        assert_eq!(queue.stats().peak_running, 1);
    }

    #[tokio::test]
    async fn wait_idle_on_empty_queue_returns() {
        let queue = TaskQueue::new(3);
        queue.wait_idle().await;
        assert!(queue.is_idle());
        assert_eq!(queue.limit(), 3);
    }

    #[test]
    fn zero_limit_is_clamped() {
        assert_eq!(TaskQueue::new(0).limit(), 1);
    }
}
