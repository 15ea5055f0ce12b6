use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, InteractionEnvelope, InteractionRouter};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Delivery boundary to the hosting platform. The concrete implementation
/// (socket mode client, HTTP receiver, serverless adapter) lives outside the
/// core; everything here only assumes envelopes arrive and acks go back.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<InteractionEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopEventTransport;

#[async_trait]
impl EventTransport for NoopEventTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<InteractionEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Pumps envelopes from the transport into the router.
///
/// Ordering per envelope is fixed: log ingress, acknowledge (exactly once,
/// before any lookup work; the trigger token and the delivery guarantee
/// both expire within seconds), then dispatch under the configured deadline.
/// Neither ack failures nor handler errors stop the loop.
pub struct InteractionRunner {
    transport: Arc<dyn EventTransport>,
    router: InteractionRouter,
    reconnect_policy: ReconnectPolicy,
    dispatch_deadline: Duration,
}

impl InteractionRunner {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        router: InteractionRouter,
        reconnect_policy: ReconnectPolicy,
        dispatch_deadline: Duration,
    ) -> Self {
        Self { transport, router, reconnect_policy, dispatch_deadline }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "interaction transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening interaction transport connection");
        self.transport.connect().await?;

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "interaction transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.interaction.envelope_received",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                event_kind = ?envelope.event.kind(),
                route_id = envelope.event.route_id().unwrap_or("none"),
                "received interaction envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.interaction.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge interaction envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.interaction.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged interaction envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            match tokio::time::timeout(
                self.dispatch_deadline,
                self.router.dispatch(&envelope, &context),
            )
            .await
            {
                Ok(Ok(result)) => {
                    debug!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        result = ?result,
                        "interaction dispatched"
                    );
                }
                Ok(Err(error)) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        error = %error,
                        "interaction dispatch failed; continuing loop"
                    );
                }
                Err(_elapsed) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        deadline_ms = self.dispatch_deadline.as_millis() as u64,
                        "interaction dispatch exceeded deadline; abandoning this flow instance"
                    );
                }
            }
        }
    }
}
