use crate::nats::traits::{DeliverySource, DeliveryStream};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Connection glue to the NATS broker.
pub struct NatsClient {
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: std::time::Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("failed to connect to NATS")?;

        info!("connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client),
        })
    }

    /// Idempotently declare the transaction-event stream, the same way the
    /// consumer used to declare its exchange/queue topology on startup.
    pub async fn ensure_stream(&self, stream_name: &str) -> Result<()> {
        let config = StreamConfig {
            name: stream_name.to_string(),
            subjects: vec![format!("{}.*", stream_name)],
            description: Some("Transaction lifecycle events".to_string()),
            ..Default::default()
        };

        match self.jetstream.get_stream(stream_name).await {
            Ok(_) => info!(stream = %stream_name, "stream already exists"),
            Err(_) => {
                self.jetstream
                    .create_stream(config)
                    .await
                    .context("failed to create stream")?;
                info!(stream = %stream_name, "created stream");
            }
        }

        Ok(())
    }

    /// Create a [`DeliveryStream`] trait object backed by this connection.
    pub fn create_delivery_stream(&self) -> Arc<dyn DeliveryStream> {
        Arc::new(JetStreamDeliveryStream {
            context: self.jetstream.clone(),
        })
    }
}

struct JetStreamDeliveryStream {
    context: jetstream::Context,
}

#[async_trait]
impl DeliveryStream for JetStreamDeliveryStream {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn DeliverySource>> {
        let consumer = self
            .context
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("failed to create consumer")?;

        Ok(Box::new(JetStreamDeliverySource { consumer }))
    }
}

struct JetStreamDeliverySource {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl DeliverySource for JetStreamDeliverySource {
    async fn fetch(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<jetstream::Message>> {
        use futures::StreamExt;

        let mut batch = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("failed to fetch deliveries")?;

        let mut deliveries = Vec::new();
        while let Some(message) = batch.next().await {
            match message {
                Ok(message) => deliveries.push(message),
                Err(e) => error!(error = %e, "error receiving delivery"),
            }
        }
        Ok(deliveries)
    }
}
