//! Task executors the ledger can dispatch onto
//!
//! The hosting environment decides where blocking store calls run. Anything
//! that can run a boxed closure to completion on some thread qualifies.

use futures::executor::ThreadPool;
use std::fmt;

/// A unit of blocking work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Opaque scheduling primitive supplied by the host
///
/// Implementations must eventually run every task they accept and must not
/// run it on the thread that called `execute` if that thread is an event
/// loop. No ordering between tasks is assumed.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs tasks on tokio's blocking thread pool
impl TaskExecutor for tokio::runtime::Handle {
    fn execute(&self, task: Task) {
        drop(self.spawn_blocking(task));
    }
}

/// Runs tasks on a dedicated `futures` thread pool
impl TaskExecutor for ThreadPool {
    fn execute(&self, task: Task) {
        self.spawn_ok(async move { task() });
    }
}

/// Adapts a host closure into an executor
pub struct ExecutorFn<F>(pub F);

impl<F> TaskExecutor for ExecutorFn<F>
where
    F: Fn(Task) + Send + Sync,
{
    fn execute(&self, task: Task) {
        (self.0)(task)
    }
}

impl<F> fmt::Debug for ExecutorFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExecutorFn")
    }
}

/// Thread pool sized to the machine, for hosts without their own executor
pub fn default_thread_pool() -> std::io::Result<ThreadPool> {
    ThreadPool::builder()
        .pool_size(num_cpus::get())
        .name_prefix("game-ledger-")
        .create()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn runs_task(executor: &dyn TaskExecutor) -> thread::ThreadId {
        let (tx, rx) = mpsc::channel();
        executor.execute(Box::new(move || {
            tx.send(thread::current().id()).unwrap();
        }));
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_thread_pool_runs_off_caller_thread() {
        let pool = default_thread_pool().unwrap();
        assert_ne!(runs_task(&pool), thread::current().id());
    }

    #[test]
    fn test_tokio_handle_runs_off_caller_thread() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        assert_ne!(runs_task(runtime.handle()), thread::current().id());
    }

    #[test]
    fn test_executor_fn_delegates() {
        let executor = ExecutorFn(|task: Task| {
            thread::spawn(task);
        });
        assert_ne!(runs_task(&executor), thread::current().id());
    }
}
