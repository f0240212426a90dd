//! Flavorgroup policy cache.
//!
//! Wraps a [`PolicySource`] and keeps each flavorgroup's policy collection and
//! ever-defined parts in memory for a TTL. One cache is built at service
//! start and shared by handle; invalidation is explicit and happens whenever
//! a flavorgroup's policy or flavors change.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hvs_flavor::{FlavorMatchPolicyCollection, FlavorPart};
use tracing::{debug, instrument};

use crate::collaborators::PolicySource;
use crate::error::VerifyError;
use crate::types::FlavorgroupId;

/// Cached policy state for one flavorgroup.
#[derive(Debug, Clone)]
struct CacheEntry {
    policy: Arc<FlavorMatchPolicyCollection>,
    ever_defined: Arc<BTreeSet<FlavorPart>>,
    cached_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// Read-through cache in front of a [`PolicySource`].
pub struct PolicyCache {
    source: Arc<dyn PolicySource>,
    entries: RwLock<HashMap<FlavorgroupId, CacheEntry>>,
    ttl: Duration,
    /// Bumped on every invalidation; loads that straddle one are not stored.
    generation: AtomicU64,
}

impl PolicyCache {
    /// Create a cache over `source`.
    pub fn new(source: Arc<dyn PolicySource>, ttl: Duration) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Drop the cached state of one flavorgroup.
    pub fn invalidate(&self, flavorgroup_id: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(flavorgroup_id);
        }
        debug!(flavorgroup_id = %flavorgroup_id, "Policy cache entry invalidated");
    }

    /// Drop every cached flavorgroup.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        debug!("Policy cache cleared");
    }

    /// Number of cached flavorgroups, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_fresh(&self, flavorgroup_id: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().ok()?;
        entries
            .get(flavorgroup_id)
            .filter(|e| e.is_fresh(self.ttl))
            .cloned()
    }

    #[instrument(skip_all, fields(flavorgroup_id = %flavorgroup_id))]
    async fn load(&self, flavorgroup_id: &FlavorgroupId) -> Result<CacheEntry, VerifyError> {
        if let Some(entry) = self.get_fresh(flavorgroup_id) {
            debug!("Using cached flavorgroup policy");
            return Ok(entry);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let policy = self.source.policy_for(flavorgroup_id).await?;
        let ever_defined = self.source.ever_defined_parts_for(flavorgroup_id).await?;
        let entry = CacheEntry {
            policy: Arc::new(policy),
            ever_defined: Arc::new(ever_defined),
            cached_at: Instant::now(),
        };

        if let Ok(mut entries) = self.entries.write() {
            if self.generation.load(Ordering::SeqCst) == generation {
                entries.insert(flavorgroup_id.clone(), entry.clone());
            }
        }
        debug!(
            explicit_rules = entry.policy.len(),
            ever_defined = entry.ever_defined.len(),
            "Flavorgroup policy loaded"
        );
        Ok(entry)
    }
}

#[async_trait]
impl PolicySource for PolicyCache {
    async fn policy_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<FlavorMatchPolicyCollection, VerifyError> {
        Ok(self.load(flavorgroup_id).await?.policy.as_ref().clone())
    }

    async fn ever_defined_parts_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<BTreeSet<FlavorPart>, VerifyError> {
        Ok(self.load(flavorgroup_id).await?.ever_defined.as_ref().clone())
    }

    async fn policy_state_for(
        &self,
        flavorgroup_id: &FlavorgroupId,
    ) -> Result<(FlavorMatchPolicyCollection, BTreeSet<FlavorPart>), VerifyError> {
        let entry = self.load(flavorgroup_id).await?;
        Ok((
            entry.policy.as_ref().clone(),
            entry.ever_defined.as_ref().clone(),
        ))
    }
}
