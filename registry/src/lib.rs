//! Game list for Fakeblok.
//!
//! Games register on one port and clients list them on another. Every
//! registered game is pinged periodically and dropped once it stops
//! answering.

mod games;
mod health;
mod service;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use fakeblok_config::RegistryConfig;
use fakeblok_protocol::RpcListener;

pub use games::HealthCheckSettings;
use games::Registry;
use service::{ListingService, RegistrationService};

pub struct GameList {
    registration: RpcListener,
    listing: RpcListener,
    registry: Arc<Registry>,
    max_connections: usize,
}

impl GameList {
    /// Bind the registration and listing ports.
    pub async fn bind(
        registration_addr: SocketAddr,
        list_addr: SocketAddr,
        config: &RegistryConfig,
    ) -> Result<Self> {
        let registration = RpcListener::bind(registration_addr)
            .await
            .context("binding registration port")?;
        let listing = RpcListener::bind(list_addr)
            .await
            .context("binding listing port")?;
        let registry = Registry::new(HealthCheckSettings {
            interval: config.health_check_interval(),
            max_failed_pings: config.max_failed_pings,
        });
        Ok(Self {
            registration,
            listing,
            registry,
            max_connections: config.max_connections,
        })
    }

    #[must_use]
    pub fn registration_addr(&self) -> SocketAddr {
        self.registration.local_addr()
    }

    #[must_use]
    pub fn list_addr(&self) -> SocketAddr {
        self.listing.local_addr()
    }

    /// Serve both ports until the task is dropped.
    pub async fn run(self) {
        let Self {
            registration,
            listing,
            registry,
            max_connections,
        } = self;
        tracing::info!(
            registration = %registration.local_addr(),
            listing = %listing.local_addr(),
            "game list listening"
        );

        let for_registration = registry.clone();
        let registrations = registration.serve(
            move |peer| RegistrationService {
                peer,
                registry: for_registration.clone(),
            },
            max_connections,
        );
        let listings = listing.serve(
            move |_| ListingService {
                registry: registry.clone(),
            },
            max_connections,
        );
        tokio::join!(registrations, listings);
    }
}
