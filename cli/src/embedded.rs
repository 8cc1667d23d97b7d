// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedded mode
//!
//! Runs a factory and a client in one process, connected through an
//! in-process swarm.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use botfactory_core::{
    application::{BotContainer, BotFactory},
    domain::node_config::FactoryConfig,
    infrastructure::{fs_watch::FsActivityProbe, source::LocalSourceResolver},
};
use botfactory_sdk::{ClientConfig, FactoryClient};
use botfactory_swarm::{InprocNetwork, PublicKey, SwarmTransport, Topic};

/// How long to wait for the factory to acknowledge a stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct EmbeddedFactory {
    topic: Topic,
    factory: Arc<BotFactory>,
    client: FactoryClient,
    _network: InprocNetwork,
}

impl EmbeddedFactory {
    pub async fn start(config: &FactoryConfig) -> Result<Self> {
        let topic = config.spec.factory.topic.unwrap_or_else(PublicKey::random);
        let settings = &config.spec.bots;

        std::fs::create_dir_all(&settings.root)
            .with_context(|| format!("Failed to create bots root {:?}", settings.root))?;

        let container = Arc::new(
            BotContainer::new(
                topic,
                Arc::new(LocalSourceResolver::from_settings(settings)),
                Arc::new(FsActivityProbe::new()),
            )
            .with_node_path(settings.node_path.clone()),
        );
        let factory = Arc::new(BotFactory::new(container));

        let network = InprocNetwork::new();
        network
            .transport(topic)
            .join(topic, factory.clone())
            .await
            .context("Failed to serve factory topic")?;

        let client = FactoryClient::with_config(
            Arc::new(network.transport(PublicKey::random())),
            topic,
            ClientConfig::from(&config.spec.client),
        );

        info!("Embedded factory listening on topic {}", topic);
        Ok(Self {
            topic,
            factory,
            client,
            _network: network,
        })
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn client(&self) -> &FactoryClient {
        &self.client
    }

    pub fn factory(&self) -> &Arc<BotFactory> {
        &self.factory
    }

    /// Send Stop through the client and wait for the factory to honour it.
    pub async fn shutdown(self, exit_code: i32) -> Result<i32> {
        let mut signal = self.factory.shutdown_signal();
        self.client
            .stop(exit_code)
            .await
            .context("Failed to send stop to factory")?;

        let acknowledged = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while signal.borrow_and_update().is_none() {
                if signal.changed().await.is_err() {
                    break;
                }
            }
            *signal.borrow()
        })
        .await
        .ok()
        .flatten();

        if acknowledged.is_none() {
            debug!("Factory did not acknowledge stop; stopping bots directly");
            self.factory.container().shutdown();
        }
        self.client.close().await.context("Failed to leave factory topic")?;
        Ok(acknowledged.unwrap_or(exit_code))
    }
}
