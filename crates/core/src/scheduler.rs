//! Serialised execution of upstream calls.
//!
//! The upstream API rejects bursts of parallel requests, so every call goes
//! through one [`Scheduler`]. Tasks run one at a time in submission order,
//! with a minimum pause between the end of one task and the start of the
//! next. A failing task never stalls the queue.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{self, Instant},
};
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 256;

/// A queued task; resolves to whether it succeeded.
type Job = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Errors surfaced to the caller of [`Scheduler::schedule`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The task itself failed; the original error is preserved.
    #[error(transparent)]
    Task(#[from] anyhow::Error),
    /// The task did not settle within its time limit.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
    /// The worker is gone and the task never ran.
    #[error("scheduler closed")]
    Closed,
}

/// Lifecycle notifications for scheduled tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Task accepted into the queue.
    Queued(u64),
    /// Task started running.
    Started(u64),
    /// Task finished successfully.
    Completed(u64),
    /// Task failed or timed out.
    Failed(u64),
}

struct Envelope {
    seq: u64,
    job: Job,
}

struct Shared {
    next_seq: AtomicU64,
    pending: AtomicUsize,
    events: broadcast::Sender<SchedulerEvent>,
}

impl Shared {
    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is the normal case.
        let _ = self.events.send(event);
    }
}

/// FIFO queue running at most one task at a time.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    sender: mpsc::UnboundedSender<Envelope>,
    shared: Arc<Shared>,
    timeout: Option<Duration>,
}

impl Scheduler {
    /// Start a scheduler worker on the current Tokio runtime.
    ///
    /// `delay` is the minimum gap between the completion of one task and the
    /// start of the next. `timeout` bounds each task unless overridden.
    pub fn new(delay: Duration, timeout: Option<Duration>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            next_seq: AtomicU64::new(1),
            pending: AtomicUsize::new(0),
            events,
        });
        tokio::spawn(run_worker(receiver, Arc::clone(&shared), delay));
        Self {
            sender,
            shared,
            timeout,
        }
    }

    /// Subscribe to task lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.shared.events.subscribe()
    }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Queue `task` with the scheduler's default timeout.
    ///
    /// The task is enqueued when this method is called, not when the returned
    /// future is first polled, so call order is submission order. Dropping the
    /// returned future does not cancel the task.
    pub fn schedule<T, F, Fut>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<T, SchedulerError>> + Send
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.schedule_with_timeout(self.timeout, task)
    }

    /// Queue `task` with an explicit timeout (`None` waits forever).
    pub fn schedule_with_timeout<T, F, Fut>(
        &self,
        limit: Option<Duration>,
        task: F,
    ) -> impl Future<Output = Result<T, SchedulerError>> + Send
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::SeqCst);
        let (done, outcome) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = match limit {
                Some(limit) => match time::timeout(limit, task()).await {
                    Ok(result) => result.map_err(SchedulerError::Task),
                    Err(_) => Err(SchedulerError::Timeout(limit)),
                },
                None => task().await.map_err(SchedulerError::Task),
            };
            let succeeded = result.is_ok();
            // The caller may have stopped listening; the work still counts.
            let _ = done.send(result);
            succeeded
        });

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let closed = self.sender.send(Envelope { seq, job }).is_err();
        if closed {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
        } else {
            debug!(seq, "request queued");
            self.shared.emit(SchedulerEvent::Queued(seq));
        }

        async move {
            if closed {
                return Err(SchedulerError::Closed);
            }
            outcome.await.map_err(|_| SchedulerError::Closed)?
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    shared: Arc<Shared>,
    delay: Duration,
) {
    let mut last_completed: Option<Instant> = None;
    while let Some(Envelope { seq, job }) = receiver.recv().await {
        if let Some(last) = last_completed {
            time::sleep_until(last + delay).await;
        }

        debug!(seq, "request started");
        shared.emit(SchedulerEvent::Started(seq));

        let succeeded = job.await;

        last_completed = Some(Instant::now());
        shared.pending.fetch_sub(1, Ordering::SeqCst);
        if succeeded {
            debug!(seq, "request completed");
            shared.emit(SchedulerEvent::Completed(seq));
        } else {
            warn!(seq, "request failed");
            shared.emit(SchedulerEvent::Failed(seq));
        }
    }
    debug!("scheduler worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use parking_lot::Mutex;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn failure_does_not_block_later_tasks() {
        let scheduler = Scheduler::new(Duration::from_millis(10), None);
        let order = recorder();

        let log = Arc::clone(&order);
        let a = scheduler.schedule(move || async move {
            time::sleep(Duration::from_millis(100)).await;
            log.lock().push("A");
            Ok("a")
        });
        let log = Arc::clone(&order);
        let b = scheduler.schedule(move || async move {
            log.lock().push("B");
            Err::<&str, _>(anyhow!("rate limited"))
        });
        let log = Arc::clone(&order);
        let c = scheduler.schedule(move || async move {
            time::sleep(Duration::from_millis(50)).await;
            log.lock().push("C");
            Ok("c")
        });

        let (a, b, c) = tokio::join!(a, b, c);
        assert_eq!(a.ok(), Some("a"));
        match b {
            Err(SchedulerError::Task(err)) => assert_eq!(err.to_string(), "rate limited"),
            other => panic!("expected task error, got {other:?}"),
        }
        assert_eq!(c.ok(), Some("c"));
        assert_eq!(*order.lock(), vec!["A", "B", "C"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn enforces_delay_between_tasks() {
        let delay = Duration::from_millis(200);
        let scheduler = Scheduler::new(delay, None);
        let spans = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let spans = Arc::clone(&spans);
            handles.push(scheduler.schedule(move || async move {
                let start = Instant::now();
                time::sleep(Duration::from_millis(30)).await;
                spans.lock().push((start, Instant::now()));
                Ok(())
            }));
        }
        for handle in handles {
            handle.await.expect("task succeeds");
        }

        let spans = spans.lock();
        assert_eq!(spans.len(), 4);
        for pair in spans.windows(2) {
            let (_, previous_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start >= previous_end + delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_and_queue_advances() {
        let scheduler = Scheduler::new(Duration::ZERO, Some(Duration::from_secs(1)));

        let stalled = scheduler.schedule(|| async {
            time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let next = scheduler.schedule(|| async { Ok(7) });

        assert!(matches!(stalled.await, Err(SchedulerError::Timeout(_))));
        assert_eq!(next.await.ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_does_not_cancel_task() {
        let scheduler = Scheduler::new(Duration::from_millis(5), None);
        let order = recorder();

        let log = Arc::clone(&order);
        drop(scheduler.schedule(move || async move {
            log.lock().push("ignored");
            Ok(())
        }));
        let log = Arc::clone(&order);
        scheduler
            .schedule(move || async move {
                log.lock().push("awaited");
                Ok(())
            })
            .await
            .expect("task succeeds");

        assert_eq!(*order.lock(), vec!["ignored", "awaited"]);
    }

    #[tokio::test(start_paused = true)]
    async fn started_events_never_overlap() {
        let scheduler = Scheduler::new(Duration::from_millis(1), None);
        let mut events = scheduler.subscribe();

        let mut handles = Vec::new();
        for index in 0..5u64 {
            handles.push(scheduler.schedule(move || async move {
                time::sleep(Duration::from_millis(10 * (5 - index))).await;
                if index == 2 {
                    anyhow::bail!("boom");
                }
                Ok(index)
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let mut running: Option<u64> = None;
        let mut finished = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                SchedulerEvent::Queued(_) => {}
                SchedulerEvent::Started(seq) => {
                    assert!(running.is_none(), "task {seq} started while another ran");
                    running = Some(seq);
                }
                SchedulerEvent::Completed(seq) | SchedulerEvent::Failed(seq) => {
                    assert_eq!(running.take(), Some(seq));
                    finished.push(seq);
                }
            }
        }
        assert_eq!(finished, vec![1, 2, 3, 4, 5]);
    }
}
