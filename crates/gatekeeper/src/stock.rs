//! Account stock: per-service ordered credential lists.
//!
//! Append-dedup on add, pop-from-front on generate, per user+service
//! cooldowns. Process-memory only; lost on restart by design. The
//! verification core never calls into this module.

use std::collections::HashMap;
use std::time::Duration;

use gatekeeper_common::{Service, UserId};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Result of an add operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddReport {
    /// Entries appended
    pub added: usize,
    /// Entries dropped: malformed or already present
    pub skipped: usize,
    /// Service total after the add
    pub total: usize,
}

/// Result of a generate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Account {
        credential: String,
        remaining: usize,
    },
    OutOfStock,
    Cooldown {
        retry_after_secs: u64,
    },
}

/// In-memory stock store with cooldown tracking
pub struct StockStore {
    services: Mutex<HashMap<Service, Vec<String>>>,
    cooldowns: Mutex<HashMap<(UserId, Service), Instant>>,
    cooldown: Duration,
    premium_cooldown: Duration,
}

impl StockStore {
    pub fn new(cooldown: Duration, premium_cooldown: Duration) -> Self {
        let services = Service::ALL
            .into_iter()
            .map(|service| (service, Vec::new()))
            .collect();
        Self {
            services: Mutex::new(services),
            cooldowns: Mutex::new(HashMap::new()),
            cooldown,
            premium_cooldown,
        }
    }

    /// Append credentials to a service.
    ///
    /// Only `email:pass`-shaped entries are accepted; duplicates of
    /// entries already in stock are skipped.
    pub async fn add(&self, service: Service, entries: &[String]) -> AddReport {
        let mut services = self.services.lock().await;
        let stock = services.entry(service).or_default();

        let mut added = 0;
        let mut skipped = 0;
        for entry in entries {
            if !entry.contains(':') || stock.contains(entry) {
                skipped += 1;
                continue;
            }
            stock.push(entry.clone());
            added += 1;
        }

        tracing::info!(service = %service, added, skipped, total = stock.len(), "Stock added");
        AddReport {
            added,
            skipped,
            total: stock.len(),
        }
    }

    /// Hand out the oldest credential for a service, subject to the
    /// requester's cooldown. The cooldown only starts on a successful
    /// hand-out.
    pub async fn generate(
        &self,
        user: &UserId,
        service: Service,
        premium: bool,
    ) -> GenerateOutcome {
        let window = if premium {
            self.premium_cooldown
        } else {
            self.cooldown
        };

        let now = Instant::now();
        let key = (user.clone(), service);
        {
            let cooldowns = self.cooldowns.lock().await;
            if let Some(last) = cooldowns.get(&key) {
                let elapsed = now.saturating_duration_since(*last);
                if elapsed < window {
                    let retry_after_secs = (window - elapsed).as_secs();
                    tracing::debug!(user = %user, service = %service, retry_after_secs, "Generate on cooldown");
                    return GenerateOutcome::Cooldown { retry_after_secs };
                }
            }
        }

        let mut services = self.services.lock().await;
        let stock = services.entry(service).or_default();
        if stock.is_empty() {
            return GenerateOutcome::OutOfStock;
        }
        let credential = stock.remove(0);
        let remaining = stock.len();
        drop(services);

        // Sweep entries that can no longer block anyone so the map stays
        // bounded over a long-running process.
        let mut cooldowns = self.cooldowns.lock().await;
        let horizon = self.cooldown.max(self.premium_cooldown);
        cooldowns.retain(|_, last| now.saturating_duration_since(*last) < horizon);
        cooldowns.insert(key, now);
        drop(cooldowns);
        tracing::info!(user = %user, service = %service, remaining, "Account generated");
        GenerateOutcome::Account {
            credential,
            remaining,
        }
    }

    /// Per-service counts, in catalog order
    pub async fn counts(&self) -> Vec<(Service, usize)> {
        let services = self.services.lock().await;
        Service::ALL
            .into_iter()
            .map(|service| {
                (
                    service,
                    services.get(&service).map(Vec::len).unwrap_or_default(),
                )
            })
            .collect()
    }

    pub async fn total(&self) -> usize {
        self.counts().await.into_iter().map(|(_, count)| count).sum()
    }

    /// Drop every credential for one service; returns how many were held
    pub async fn clear(&self, service: Service) -> usize {
        let mut services = self.services.lock().await;
        let stock = services.entry(service).or_default();
        let dropped = stock.len();
        stock.clear();
        tracing::warn!(service = %service, dropped, "Stock cleared");
        dropped
    }

    pub async fn clear_all(&self) -> usize {
        let mut dropped = 0;
        for service in Service::ALL {
            dropped += self.clear(service).await;
        }
        dropped
    }

    /// Full snapshot of every list, for the backup command
    pub async fn backup(&self) -> HashMap<Service, Vec<String>> {
        self.services.lock().await.clone()
    }

    #[cfg(test)]
    pub async fn cooldown_entries(&self) -> usize {
        self.cooldowns.lock().await.len()
    }
}
