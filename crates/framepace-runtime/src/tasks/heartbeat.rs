//! Heartbeat: a tick marker on the console and fixed payloads to every
//! configured message sink, once per period

use std::sync::Arc;

use async_trait::async_trait;
use framepace_core::{FramepaceResult, RuntimeStats};
use tracing::warn;

use super::PeriodicWork;
use crate::collaborators::{LineSink, MessageSink};

pub const TICK_MARKER: &str = "*****TICK******";

/// A payload and the sink it is sent to on every heartbeat
#[derive(Clone)]
pub struct MessageRoute {
    pub sink: Arc<dyn MessageSink>,
    pub payload: String,
}

impl MessageRoute {
    pub fn new<P: Into<String>>(sink: Arc<dyn MessageSink>, payload: P) -> Self {
        Self {
            sink,
            payload: payload.into(),
        }
    }
}

impl core::fmt::Debug for MessageRoute {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageRoute")
            .field("sink", &self.sink.name())
            .field("payload", &self.payload)
            .finish()
    }
}

pub struct HeartbeatTask {
    console: Arc<dyn LineSink>,
    routes: Vec<MessageRoute>,
    stats: Arc<RuntimeStats>,
}

impl HeartbeatTask {
    pub fn new(console: Arc<dyn LineSink>, routes: Vec<MessageRoute>, stats: Arc<RuntimeStats>) -> Self {
        Self {
            console,
            routes,
            stats,
        }
    }
}

#[async_trait]
impl PeriodicWork for HeartbeatTask {
    async fn run_once(&mut self) -> FramepaceResult<()> {
        self.console.write_line(TICK_MARKER);
        self.stats.record_heartbeat();

        // One failing sink must not starve the others
        for route in &self.routes {
            if let Err(e) = route.sink.send(&route.payload) {
                self.stats.record_task_error();
                warn!("Heartbeat to {} failed: {}", route.sink.name(), e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ChannelLineSink;
    use framepace_core::FramepaceError;
    use std::sync::Mutex;

    struct RecordingSink {
        name: &'static str,
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl MessageSink for RecordingSink {
        fn name(&self) -> &str {
            self.name
        }

        fn send(&self, payload: &str) -> FramepaceResult<()> {
            if self.fail {
                return Err(FramepaceError::channel_error("queue full"));
            }
            self.sent.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_heartbeat_reaches_every_sink() {
        let (console, mut lines) = ChannelLineSink::new();
        let one = RecordingSink::new("/FreeRTOS_MQ_one_1", false);
        let broken = RecordingSink::new("/broken", true);
        let two = RecordingSink::new("/FreeRTOS_MQ_two_1", false);
        let stats = Arc::new(RuntimeStats::new());
        let mut task = HeartbeatTask::new(
            Arc::new(console),
            vec![
                MessageRoute::new(one.clone(), "Hello MQ one"),
                MessageRoute::new(broken, "lost"),
                MessageRoute::new(two.clone(), "Hello MQ two"),
            ],
            stats.clone(),
        );

        task.run_once().await.unwrap();
        task.run_once().await.unwrap();

        assert_eq!(lines.try_recv().unwrap(), TICK_MARKER);
        assert_eq!(*one.sent.lock().unwrap(), vec!["Hello MQ one"; 2]);
        assert_eq!(*two.sent.lock().unwrap(), vec!["Hello MQ two"; 2]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.heartbeats, 2);
        assert_eq!(snapshot.task_errors, 2);
    }
}
