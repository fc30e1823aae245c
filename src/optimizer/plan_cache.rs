use super::plan::PlanNode;
use super::query::Query;
use crate::config::{PLAN_CACHE_CAPACITY, PLAN_CACHE_TTL_MS};
use linked_hash_map::LinkedHashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

struct CachedPlan {
    plan: PlanNode,
    inserted_at: Instant,
}

/// LRU-with-TTL cache of plans keyed by a query's canonical signature,
/// reusing the same `linked_hash_map` primitive the buffer pool uses for
/// recency tracking. A cache hit still returns a clone: plans carry
/// estimated-row counts tied to the statistics at plan time, and the
/// caller treats them as disposable per-request objects.
pub struct PlanCache {
    inner: Mutex<LinkedHashMap<String, CachedPlan>>,
}

static CACHE: OnceLock<PlanCache> = OnceLock::new();

impl PlanCache {
    pub fn global() -> &'static PlanCache {
        CACHE.get_or_init(|| PlanCache { inner: Mutex::new(LinkedHashMap::new()) })
    }

    pub fn signature(query: &Query) -> String {
        format!(
            "{:?}|{}|{:?}|{}",
            query.kind,
            query.table,
            query.join.as_ref().map(|j| (j.right_table.clone(), j.left_column.clone(), j.right_column.clone())),
            query.condition.canonical_signature(),
        )
    }

    pub fn get(&self, signature: &str) -> Option<PlanNode> {
        let mut map = self.inner.lock().unwrap();
        let expired = match map.get_refresh(signature) {
            Some(entry) => entry.inserted_at.elapsed() > Duration::from_millis(PLAN_CACHE_TTL_MS),
            None => return None,
        };
        if expired {
            map.remove(signature);
            return None;
        }
        map.get(signature).map(|e| e.plan.clone())
    }

    pub fn put(&self, signature: String, plan: PlanNode) {
        let mut map = self.inner.lock().unwrap();
        map.remove(&signature);
        map.insert(signature, CachedPlan { plan, inserted_at: Instant::now() });
        if map.len() > PLAN_CACHE_CAPACITY {
            map.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
