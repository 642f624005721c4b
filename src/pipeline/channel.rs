//! Unbounded multi-producer / multi-consumer queue joining two agents.
//!
//! `put` never blocks, so a slow consumer can never stall ingestion. Queue
//! growth is made visible through `depth` and `high_water` instead.

use {
    crate::config::{DF, constants},
    std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex, MutexGuard,
            atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        },
        time::Duration,
    },
    thiserror::Error,
    tokio::sync::Notify,
    tokio_util::sync::CancellationToken,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel '{0}' is complete, item dropped")]
    Completed(&'static str),
}

/// Outcome of a non-blocking take.
#[derive(Debug, PartialEq, Eq)]
pub enum TryTake<T> {
    Item(T),
    /// Nothing queued right now, more may arrive.
    Empty,
    /// Completed and empty. Iteration is over.
    Drained,
}

pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    name: &'static str,
    queue: Mutex<VecDeque<T>>,
    completed: AtomicBool,
    high_water: AtomicUsize,
    taken: AtomicU64,
    notify: Notify,
    backoff: Duration,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Channel<T> {
    pub fn new(name: &'static str, backoff: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                queue: Mutex::new(VecDeque::new()),
                completed: AtomicBool::new(false),
                high_water: AtomicUsize::new(0),
                taken: AtomicU64::new(0),
                notify: Notify::new(),
                backoff,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    // Every critical section is a plain VecDeque operation, so a poisoned lock
    // still guards a consistent queue.
    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends `item` at the tail. Fails only once the channel is complete.
    pub fn put(&self, item: T) -> Result<(), ChannelError> {
        {
            let mut queue = self.queue();
            if self.inner.completed.load(Ordering::Acquire) {
                return Err(ChannelError::Completed(self.inner.name));
            }
            queue.push_back(item);
            self.inner.high_water.fetch_max(queue.len(), Ordering::Relaxed);
        }
        self.inner.notify.notify_one();
        Ok(())
    }

    pub fn try_take(&self) -> TryTake<T> {
        let (item, depth) = {
            let mut queue = self.queue();
            let item = queue.pop_front();
            if item.is_none() && self.inner.completed.load(Ordering::Acquire) {
                return TryTake::Drained;
            }
            (item, queue.len())
        };

        match item {
            Some(item) => {
                let taken = self.inner.taken.fetch_add(1, Ordering::Relaxed) + 1;
                if DF.log_channel_depth && taken % constants::channel::DEPTH_LOG_EVERY == 0 {
                    log::info!(
                        "📬 [{}] depth {} (high water {}, {} taken)",
                        self.inner.name,
                        depth,
                        self.high_water(),
                        taken
                    );
                }
                TryTake::Item(item)
            }
            None => TryTake::Empty,
        }
    }

    /// Next item in FIFO order. Between empty polls it sleeps for the backoff,
    /// waking early when something is put. `None` once drained or cancelled.
    pub async fn take(&self, cancel: &CancellationToken) -> Option<T> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match self.try_take() {
                TryTake::Item(item) => return Some(item),
                TryTake::Drained => return None,
                TryTake::Empty => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = self.inner.notify.notified() => {}
                _ = tokio::time::sleep(self.inner.backoff) => {}
            }
        }
    }

    /// No further items will be accepted. Consumers finish what is queued.
    pub fn complete(&self) {
        {
            let _queue = self.queue();
            self.inner.completed.store(true, Ordering::Release);
        }
        self.inner.notify.notify_waiters();
        log::debug!("[{}] channel completed", self.inner.name);
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn depth(&self) -> usize {
        self.queue().len()
    }

    /// Largest depth ever observed.
    pub fn high_water(&self) -> usize {
        self.inner.high_water.load(Ordering::Relaxed)
    }
}
