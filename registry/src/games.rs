//! The table of registered games.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fakeblok_protocol::GameListing;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use crate::health;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckSettings {
    pub interval: Duration,
    pub max_failed_pings: u32,
}

struct GameEntry {
    name: String,
    /// Bumped on every re-registration of the same address.
    version: u64,
    health_check: AbortHandle,
}

/// Registered games keyed by address, shared by both listeners and every
/// health check task.
pub struct Registry {
    games: RwLock<HashMap<SocketAddr, GameEntry>>,
    settings: HealthCheckSettings,
}

impl Registry {
    pub fn new(settings: HealthCheckSettings) -> Arc<Self> {
        Arc::new(Self {
            games: RwLock::new(HashMap::new()),
            settings,
        })
    }

    /// Register `name` at `addr`, replacing any previous registration.
    ///
    /// Returns the name previously registered at that address.
    pub async fn register(self: &Arc<Self>, addr: SocketAddr, name: String) -> Option<String> {
        let mut games = self.games.write().await;
        let version = games.get(&addr).map_or(0, |entry| entry.version.wrapping_add(1));

        // The task cannot touch the table before this write lock is released,
        // so spawning before the insert is safe.
        let health_check = tokio::spawn(health::run(
            Arc::downgrade(self),
            addr,
            version,
            self.settings,
        ))
        .abort_handle();

        let previous = match games.entry(addr) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.health_check.abort();
                entry.health_check = health_check;
                entry.version = version;
                Some(std::mem::replace(&mut entry.name, name.clone()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(GameEntry {
                    name: name.clone(),
                    version,
                    health_check,
                });
                None
            }
        };

        match &previous {
            Some(old) => {
                tracing::info!(%addr, %name, previous = %old, version, "game re-registered");
            }
            None => tracing::info!(%addr, %name, "game registered"),
        }
        previous
    }

    pub async fn unregister(&self, addr: SocketAddr) -> Option<String> {
        let entry = self.games.write().await.remove(&addr)?;
        entry.health_check.abort();
        tracing::info!(%addr, name = %entry.name, "game unregistered");
        Some(entry.name)
    }

    /// Remove `addr` only while it is still the registration `version`
    /// refers to. Called by health checks, which must never remove a newer
    /// registration of the same address.
    pub async fn remove_if_current(&self, addr: SocketAddr, version: u64) -> Option<String> {
        let mut games = self.games.write().await;
        match games.get(&addr) {
            Some(entry) if entry.version == version => {}
            _ => {
                tracing::debug!(%addr, version, "stale health check; entry kept");
                return None;
            }
        }
        games.remove(&addr).map(|entry| entry.name)
    }

    /// Every registered game, sorted by address.
    pub async fn list(&self) -> Vec<GameListing> {
        let games = self.games.read().await;
        let mut listings: Vec<GameListing> = games
            .iter()
            .map(|(addr, entry)| GameListing {
                addr: *addr,
                name: entry.name.clone(),
            })
            .collect();
        listings.sort();
        listings
    }

    pub async fn count(&self) -> usize {
        self.games.read().await.len()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for entry in self.games.get_mut().values() {
            entry.health_check.abort();
        }
    }
}
