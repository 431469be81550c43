//! Status captions rotated while an answer is loading.

use super::events::{ChatEvent, EventSink};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

pub const STATUS_CAPTIONS: [&str; 4] = [
    "Analyzing your code structure...",
    "Searching for best practices...",
    "Generating optimal solution...",
    "Refining the explanation...",
];

pub const CAPTION_INTERVAL: Duration = Duration::from_millis(2500);

/// Background timer cycling through [`STATUS_CAPTIONS`].
///
/// Starts at index 0. The timer task is aborted when the ticker is dropped.
pub(crate) struct CaptionTicker {
    index: watch::Receiver<usize>,
    task: JoinHandle<()>,
}

impl CaptionTicker {
    pub(crate) fn start(events: EventSink) -> Self {
        let (tx, rx) = watch::channel(0usize);
        events.emit(ChatEvent::Caption(STATUS_CAPTIONS[0]));

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + CAPTION_INTERVAL, CAPTION_INTERVAL);
            let mut index = 0usize;
            loop {
                ticks.tick().await;
                index = (index + 1) % STATUS_CAPTIONS.len();
                if tx.send(index).is_err() {
                    return;
                }
                events.emit(ChatEvent::Caption(STATUS_CAPTIONS[index]));
            }
        });

        Self { index: rx, task }
    }

    pub(crate) fn current(&self) -> &'static str {
        STATUS_CAPTIONS[*self.index.borrow()]
    }
}

impl Drop for CaptionTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
