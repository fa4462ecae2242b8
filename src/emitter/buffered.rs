//! Pull-based buffered emitter
//!
//! Events accumulate in an in-memory queue until a reader drains them. This
//! backs polling transports (e.g. an SSE endpoint that flushes whatever is
//! buffered on each tick) and reconnecting readers that want the backlog.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{Mutex, Notify};

use super::{EmittedEvent, Emitter};

/// Emitter that buffers events for pull-based consumption
#[derive(Clone)]
pub struct BufferedEmitter {
    queue: Arc<Mutex<VecDeque<EmittedEvent>>>,
    notify: Arc<Notify>,
}

impl BufferedEmitter {
    /// Create an empty buffered emitter
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Take all currently buffered events
    pub async fn drain(&self) -> Vec<EmittedEvent> {
        let mut queue = self.queue.lock().await;
        queue.drain(..).collect()
    }

    /// Wait for the next event
    pub async fn next(&self) -> EmittedEvent {
        loop {
            if let Some(event) = self.queue.lock().await.pop_front() {
                return event;
            }
            self.notify.notified().await;
        }
    }

    /// Number of buffered events
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Check whether the buffer is empty
    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    /// Consume the emitter into an async stream of events, ending after the
    /// terminal event
    pub fn into_stream(self) -> impl Stream<Item = EmittedEvent> {
        stream! {
            loop {
                let event = self.next().await;
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        }
    }
}

impl Default for BufferedEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Emitter for BufferedEmitter {
    async fn emit(&self, event: EmittedEvent) {
        self.queue.lock().await.push_back(event);
        self.notify.notify_one();
    }
}
