//! Per-peer controller tying the collector to a transport.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::harness::collector::ResponseCollector;
use crate::harness::error::CollectError;
use crate::harness::expectation::Expectation;
use crate::harness::filter::Filter;
use crate::harness::response::Response;
use crate::harness::throttle::ActionThrottle;
use crate::harness::timeouts::TimeoutPolicy;
use crate::harness::transport::{Transport, TransportError};

/// Pause between consecutive ping messages.
const PING_SPACING: Duration = Duration::from_secs(1);

/// Drives interactions with one peer (the bot under test).
pub struct BotController<T: Transport> {
    transport: Arc<T>,
    collector: ResponseCollector,
    peer_chat_id: i64,
    policy: TimeoutPolicy,
    throttle: ActionThrottle,
}

impl<T: Transport> BotController<T> {
    pub fn new(
        transport: Arc<T>,
        collector: ResponseCollector,
        peer_chat_id: i64,
        policy: TimeoutPolicy,
        global_action_delay: Duration,
    ) -> Self {
        Self {
            transport,
            collector,
            peer_chat_id,
            policy,
            throttle: ActionThrottle::new(global_action_delay),
        }
    }

    pub fn peer_chat_id(&self) -> i64 {
        self.peer_chat_id
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Incoming messages from the peer, narrowed by `extra` if given.
    pub fn default_filter(&self, extra: Option<Filter>) -> Filter {
        let base = Filter::chat(self.peer_chat_id).and(Filter::incoming());
        match extra {
            Some(f) => f.and(base),
            None => base,
        }
    }

    /// Collect the peer's reply to `interaction`. `count` pins both bounds.
    pub async fn collect<F, Fut>(
        &self,
        filter: Option<Filter>,
        count: Option<usize>,
        policy: Option<&TimeoutPolicy>,
        interaction: F,
    ) -> Result<Response, CollectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let expectation = count.map(Expectation::exactly).unwrap_or_default();
        self.collect_expecting(filter, expectation, policy, interaction).await
    }

    pub async fn collect_expecting<F, Fut>(
        &self,
        filter: Option<Filter>,
        expectation: Expectation,
        policy: Option<&TimeoutPolicy>,
        interaction: F,
    ) -> Result<Response, CollectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        self.throttle.wait().await;
        let result = self
            .collector
            .collect(
                self.default_filter(filter),
                expectation,
                policy.unwrap_or(&self.policy),
                interaction,
            )
            .await;
        if let Ok(ref response) = result {
            self.throttle.record(response.last_received_at());
        }
        result
    }

    /// Send `text` to the peer and collect the reply.
    pub async fn send_text(
        &self,
        text: &str,
        expectation: Expectation,
        policy: Option<&TimeoutPolicy>,
    ) -> Result<Response, CollectError> {
        let transport = self.transport.clone();
        let chat_id = self.peer_chat_id;
        self.throttle.wait().await;
        let result = self
            .collector
            .send_and_await(
                |text: String| async move { transport.send_text(chat_id, &text).await },
                text.to_string(),
                self.default_filter(None),
                expectation,
                policy.unwrap_or(&self.policy),
            )
            .await;
        if let Ok(ref response) = result {
            self.throttle.record(response.last_received_at());
        }
        result
    }

    /// Send "/start" (or `messages`) and expect at least one reply.
    /// Flood waits are slept off and the next message is sent.
    pub async fn ping(&self, messages: Option<&[String]>) -> Result<Response, CollectError> {
        let default = ["/start".to_string()];
        let messages = messages.unwrap_or(&default);
        info!("Pinging chat {} with {} message(s)", self.peer_chat_id, messages.len());

        self.collect_expecting(None, Expectation::at_least(1), None, || async {
            for (n, text) in messages.iter().enumerate() {
                if n >= 1 {
                    sleep(PING_SPACING).await;
                }
                match self.transport.send_text(self.peer_chat_id, text).await {
                    Ok(_) => {}
                    Err(TransportError::FloodWait(wait)) => {
                        if wait > Duration::from_secs(5) {
                            warn!("send_text flood: waiting {} seconds", wait.as_secs());
                        }
                        sleep(wait).await;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })
        .await
    }
}
