// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应缓存
//!
//! 以 [`ResourceIdentity`] 为键缓存已生成的响应，进程内只构造一次并以 `Arc` 注入各处理器。
//!
//! ## 并发模型
//! - 外层 `Mutex<LruCache>` 只保护“键 → 槽位”的映射，持有时间极短，从不在持有期间执行生成。
//! - 每个槽位自带一把互斥锁，生成期间一直持有。同一键的并发请求在槽位锁上排队，
//!   第一个请求生成，其余请求拿到同一个 `Arc<Response>`；不同键之间互不阻塞。
//! - 生成失败时槽位保持为空，等待者获得锁后会各自重试，失败结果从不进入缓存。
//! - 生成过程中 panic 会使槽位锁中毒，后续加锁时恢复并继续（槽位仍为空）；没有等待者时槽位随即被移除。
//! - LRU 淘汰掉一个仍被持有（生成中或有等待者）的槽位时，只记下它的弱引用。
//!   在最后一个持有者放手之前，同一键的新请求仍会找回这个槽位，因此生成不会被重复执行。
//!
//! 过期策略通过 [`ExpiryPolicy`] 插拔，容量满时按 LRU 淘汰。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use lru::LruCache;
use uuid::Uuid;

use crate::identity::{PageKind, ResourceIdentity};
use crate::response::Response;

/// 缓存条目的过期判定。
pub trait ExpiryPolicy: Send + Sync {
    fn is_expired(&self, created: Instant, now: Instant) -> bool;
}

/// 条目只会被显式失效或 LRU 淘汰。
pub struct NeverExpire;

impl ExpiryPolicy for NeverExpire {
    fn is_expired(&self, _created: Instant, _now: Instant) -> bool {
        false
    }
}

/// 条目在创建后存活固定时长。
pub struct TimeToLive(pub Duration);

impl ExpiryPolicy for TimeToLive {
    fn is_expired(&self, created: Instant, now: Instant) -> bool {
        now.saturating_duration_since(created) >= self.0
    }
}

struct CachedEntry {
    response: Arc<Response>,
    created: Instant,
}

#[derive(Default)]
struct Slot {
    entry: Mutex<Option<CachedEntry>>,
}

struct Slots {
    lru: LruCache<ResourceIdentity, Arc<Slot>>,
    // 被淘汰时仍有持有者的槽位
    displaced: HashMap<ResourceIdentity, Weak<Slot>>,
}

impl Slots {
    fn find(&mut self, identity: &ResourceIdentity) -> Option<Arc<Slot>> {
        if let Some(slot) = self.lru.get(identity) {
            return Some(Arc::clone(slot));
        }
        let slot = self.displaced.remove(identity)?.upgrade()?;
        debug!("找回仍在使用中的已淘汰槽位: {}", identity);
        self.insert(identity.clone(), Arc::clone(&slot));
        Some(slot)
    }

    fn peek(&self, identity: &ResourceIdentity) -> Option<Arc<Slot>> {
        match self.lru.peek(identity) {
            Some(slot) => Some(Arc::clone(slot)),
            None => self.displaced.get(identity).and_then(Weak::upgrade),
        }
    }

    fn insert(&mut self, identity: ResourceIdentity, slot: Arc<Slot>) {
        if let Some((evicted_key, evicted)) = self.lru.push(identity, slot) {
            // 映射之外仍有引用：正在生成或有线程在等待
            if Arc::strong_count(&evicted) > 1 {
                debug!("淘汰的槽位仍在使用中，保留弱引用: {}", evicted_key);
                self.displaced.insert(evicted_key, Arc::downgrade(&evicted));
            }
        }
        self.displaced.retain(|_, slot| slot.strong_count() > 0);
    }

    fn remove(&mut self, identity: &ResourceIdentity) -> bool {
        let cached = self.lru.pop(identity).is_some();
        let displaced = self.displaced.remove(identity).is_some();
        cached || displaced
    }

    fn keys(&self) -> Vec<ResourceIdentity> {
        self.lru
            .iter()
            .map(|(key, _)| key)
            .chain(self.displaced.keys())
            .cloned()
            .collect()
    }
}

pub struct ResponseCache {
    slots: Mutex<Slots>,
    expiry: Box<dyn ExpiryPolicy>,
}

// 生成函数 panic 时把槽位从映射中移除（没有等待者的前提下）
struct DiscardOnUnwind<'a> {
    cache: &'a ResponseCache,
    identity: &'a ResourceIdentity,
    slot: &'a Arc<Slot>,
}

impl Drop for DiscardOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("生成{}时发生panic，丢弃空槽位", self.identity);
            self.cache.discard_if_idle(self.identity, self.slot);
        }
    }
}

impl ResponseCache {
    // 根据容量构造，0 会被提升为 1
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = match NonZeroUsize::new(capacity) {
            Some(c) => c,
            None => {
                warn!("响应缓存容量被设置为0，已提升为1");
                NonZeroUsize::MIN
            }
        };
        Self {
            slots: Mutex::new(Slots {
                lru: LruCache::new(capacity),
                displaced: HashMap::new(),
            }),
            expiry: Box::new(NeverExpire),
        }
    }

    pub fn with_expiry(mut self, policy: impl ExpiryPolicy + 'static) -> Self {
        self.expiry = Box::new(policy);
        self
    }

    /// 返回 `identity` 对应的缓存响应；不存在或已过期时调用 `generator` 生成并存入。
    ///
    /// 同一键的并发调用中 `generator` 只会执行一次。`generator` 的错误原样返回，
    /// 且不会留下任何缓存条目。
    pub fn get_or_cache<E, F>(
        &self,
        identity: &ResourceIdentity,
        generator: F,
    ) -> Result<Arc<Response>, E>
    where
        F: FnOnce() -> Result<Response, E>,
    {
        let slot = self.slot(identity);
        let mut entry = lock_or_recover(&slot.entry);

        if let Some(cached) = entry.as_ref() {
            if !self.expiry.is_expired(cached.created, Instant::now()) {
                debug!("缓存命中: {}", identity);
                return Ok(Arc::clone(&cached.response));
            }
            debug!("缓存条目已过期: {}", identity);
            *entry = None;
        }

        debug!("缓存未命中，开始生成: {}", identity);
        let _unwind = DiscardOnUnwind {
            cache: self,
            identity,
            slot: &slot,
        };
        match generator() {
            Ok(response) => {
                let response = Arc::new(response);
                *entry = Some(CachedEntry {
                    response: Arc::clone(&response),
                    created: Instant::now(),
                });
                Ok(response)
            }
            Err(e) => {
                drop(entry);
                self.discard_if_idle(identity, &slot);
                Err(e)
            }
        }
    }

    /// 无条件移除一个条目。正在进行的生成不受影响，但其结果不会再被新请求看到。
    pub fn invalidate(&self, identity: &ResourceIdentity) {
        if self.lock_slots().remove(identity) {
            debug!("缓存条目已失效: {}", identity);
        }
    }

    pub fn invalidate_all(&self) {
        let mut slots = self.lock_slots();
        let count = slots.lru.len();
        slots.lru.clear();
        slots.displaced.clear();
        debug!("已清空全部缓存，共{}个键", count);
    }

    /// 玩家数据变化时调用：玩家页、原始 JSON 以及玩家列表一并失效。
    pub fn invalidate_player(&self, uuid: Uuid) {
        let mut slots = self.lock_slots();
        slots.remove(&ResourceIdentity::player(uuid));
        slots.remove(&ResourceIdentity::raw_player(uuid));
        slots.remove(&ResourceIdentity::players());
    }

    /// 服务器数据变化时调用：服务器页、其标签页以及全网页面一并失效。
    pub fn invalidate_server(&self, uuid: Uuid) {
        let mut slots = self.lock_slots();
        let keys: Vec<ResourceIdentity> = slots
            .keys()
            .into_iter()
            .filter(|key| {
                key.sub_key() == Some(uuid) && matches!(key.kind(), PageKind::Server | PageKind::Tab(_))
            })
            .collect();
        for key in keys {
            slots.remove(&key);
        }
        slots.remove(&ResourceIdentity::network());
    }

    /// 是否存在一个未过期的条目。生成中的键视为不存在。
    pub fn contains(&self, identity: &ResourceIdentity) -> bool {
        let slot = match self.lock_slots().peek(identity) {
            Some(slot) => slot,
            None => return false,
        };
        let entry = match slot.entry.try_lock() {
            Ok(entry) => entry,
            Err(_) => return false,
        };
        match entry.as_ref() {
            Some(cached) => !self.expiry.is_expired(cached.created, Instant::now()),
            None => false,
        }
    }

    /// 当前持有响应的条目数（不含正在生成的键）。
    pub fn len(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self
            .lock_slots()
            .lru
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        slots
            .iter()
            .filter(|slot| matches!(slot.entry.try_lock(), Ok(entry) if entry.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock_slots().lru.cap().get()
    }

    fn slot(&self, identity: &ResourceIdentity) -> Arc<Slot> {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.find(identity) {
            return slot;
        }
        let slot = Arc::new(Slot::default());
        slots.insert(identity.clone(), Arc::clone(&slot));
        slot
    }

    // 只有映射和当前调用者引用该槽位时才移除，有等待者时留给它们重试
    fn discard_if_idle(&self, identity: &ResourceIdentity, slot: &Arc<Slot>) {
        let mut slots = self.lock_slots();
        let idle = match slots.lru.peek(identity) {
            Some(current) => Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2,
            None => false,
        };
        if idle {
            slots.lru.pop(identity);
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        lock_or_recover(&self.slots)
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("缓存锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn page(body: &str) -> Response {
        Response::with_status(200).with_body("text/plain", body.to_string())
    }

    #[test]
    fn test_cache_creation() {
        let cache = ResponseCache::from_capacity(10);
        assert_eq!(cache.capacity(), 10);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cache_zero_capacity_promoted() {
        let cache = ResponseCache::from_capacity(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_hit_does_not_regenerate() {
        let cache = ResponseCache::from_capacity(4);
        let key = ResourceIdentity::network();
        let calls = Cell::new(0);

        let first = cache
            .get_or_cache(&key, || -> Result<_, ()> {
                calls.set(calls.get() + 1);
                Ok(page("net"))
            })
            .unwrap();
        let second = cache
            .get_or_cache(&key, || -> Result<_, ()> {
                calls.set(calls.get() + 1);
                Ok(page("other"))
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.text(), "net");
    }

    #[test]
    fn test_failure_leaves_no_entry() {
        let cache = ResponseCache::from_capacity(4);
        let key = ResourceIdentity::players();

        let result = cache.get_or_cache(&key, || Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(!cache.contains(&key));
        assert_eq!(cache.len(), 0);

        let retried = cache.get_or_cache(&key, || -> Result<_, &str> { Ok(page("ok")) });
        assert_eq!(retried.unwrap().text(), "ok");
        assert!(cache.contains(&key));
    }

    #[test]
    fn test_invalidate_forces_regeneration() {
        let cache = ResponseCache::from_capacity(4);
        let key = ResourceIdentity::player(Uuid::new_v4());
        let calls = Cell::new(0);
        let generate = || -> Result<_, ()> {
            calls.set(calls.get() + 1);
            Ok(page("p"))
        };

        cache.get_or_cache(&key, generate).unwrap();
        cache.invalidate(&key);
        assert!(!cache.contains(&key));
        cache.get_or_cache(&key, generate).unwrap();

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = ResponseCache::from_capacity(4);
        for key in [ResourceIdentity::network(), ResourceIdentity::players()] {
            cache.get_or_cache(&key, || -> Result<_, ()> { Ok(page("x")) }).unwrap();
        }
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();

        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_player_drops_both_representations() {
        let cache = ResponseCache::from_capacity(8);
        let uuid = Uuid::new_v4();
        let other = ResourceIdentity::player(Uuid::new_v4());
        for key in [
            ResourceIdentity::player(uuid),
            ResourceIdentity::raw_player(uuid),
            ResourceIdentity::players(),
            other.clone(),
        ] {
            cache.get_or_cache(&key, || -> Result<_, ()> { Ok(page("x")) }).unwrap();
        }

        cache.invalidate_player(uuid);

        assert!(!cache.contains(&ResourceIdentity::player(uuid)));
        assert!(!cache.contains(&ResourceIdentity::raw_player(uuid)));
        assert!(!cache.contains(&ResourceIdentity::players()));
        assert!(cache.contains(&other));
    }

    #[test]
    fn test_invalidate_server_drops_tabs_and_network() {
        let cache = ResponseCache::from_capacity(8);
        let uuid = Uuid::new_v4();
        let unrelated_tab = ResourceIdentity::tab("sessions", Some(Uuid::new_v4()));
        for key in [
            ResourceIdentity::server(uuid),
            ResourceIdentity::tab("sessions", Some(uuid)),
            ResourceIdentity::network(),
            unrelated_tab.clone(),
        ] {
            cache.get_or_cache(&key, || -> Result<_, ()> { Ok(page("x")) }).unwrap();
        }

        cache.invalidate_server(uuid);

        assert!(!cache.contains(&ResourceIdentity::server(uuid)));
        assert!(!cache.contains(&ResourceIdentity::tab("sessions", Some(uuid))));
        assert!(!cache.contains(&ResourceIdentity::network()));
        assert!(cache.contains(&unrelated_tab));
    }

    #[test]
    fn test_evicted_slot_in_use_is_found_again() {
        let cache = ResponseCache::from_capacity(1);
        let players = ResourceIdentity::players();
        let held = cache.slot(&players);

        cache
            .get_or_cache(&ResourceIdentity::network(), || -> Result<_, ()> { Ok(page("net")) })
            .unwrap();
        assert!(cache.lock_slots().lru.peek(&players).is_none());

        // 仍被持有的槽位不会被新槽位取代
        assert!(Arc::ptr_eq(&held, &cache.slot(&players)));
        drop(held);

        // 放手后的槽位会在下一次插入时被清理
        cache
            .get_or_cache(&ResourceIdentity::network(), || -> Result<_, ()> { Ok(page("net")) })
            .unwrap();
        assert!(cache.lock_slots().displaced.is_empty());
    }

    #[test]
    fn test_invalidate_reaches_displaced_slot() {
        let cache = ResponseCache::from_capacity(1);
        let players = ResourceIdentity::players();
        let held = cache.slot(&players);
        cache
            .get_or_cache(&ResourceIdentity::network(), || -> Result<_, ()> { Ok(page("net")) })
            .unwrap();

        cache.invalidate(&players);

        assert!(!Arc::ptr_eq(&held, &cache.slot(&players)));
    }

    #[test]
    fn test_panicking_generator_releases_slot() {
        let cache = ResponseCache::from_capacity(4);
        let key = ResourceIdentity::players();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_or_cache(&key, || -> Result<Response, ()> { panic!("render failed") })
        }));

        assert!(result.is_err());
        assert_eq!(cache.lock_slots().lru.len(), 0);
        let retried = cache.get_or_cache(&key, || -> Result<_, ()> { Ok(page("ok")) });
        assert_eq!(retried.unwrap().text(), "ok");
    }

    #[test]
    fn test_time_to_live_expires() {
        let cache = ResponseCache::from_capacity(4).with_expiry(TimeToLive(Duration::ZERO));
        let key = ResourceIdentity::network();
        let calls = Cell::new(0);
        let generate = || -> Result<_, ()> {
            calls.set(calls.get() + 1);
            Ok(page("n"))
        };

        cache.get_or_cache(&key, generate).unwrap();
        cache.get_or_cache(&key, generate).unwrap();

        assert_eq!(calls.get(), 2);
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_time_to_live_policy() {
        let policy = TimeToLive(Duration::from_secs(60));
        let created = Instant::now();
        assert!(!policy.is_expired(created, created + Duration::from_secs(59)));
        assert!(policy.is_expired(created, created + Duration::from_secs(60)));
        assert!(!NeverExpire.is_expired(created, created + Duration::from_secs(86400)));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ResponseCache::from_capacity(2);
        let a = ResourceIdentity::network();
        let b = ResourceIdentity::players();
        let c = ResourceIdentity::tab("sessions", None);
        let ok = || -> Result<_, ()> { Ok(page("x")) };

        cache.get_or_cache(&a, ok).unwrap();
        cache.get_or_cache(&b, ok).unwrap();
        cache.get_or_cache(&a, ok).unwrap();
        cache.get_or_cache(&c, ok).unwrap();

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_panicking_generator_leaves_slot_usable() {
        let cache = ResponseCache::from_capacity(4);
        let key = ResourceIdentity::network();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = cache.get_or_cache(&key, || -> Result<Response, ()> { panic!("render crashed") });
        }));
        assert!(outcome.is_err());

        let response = cache.get_or_cache(&key, || -> Result<_, ()> { Ok(page("recovered")) });
        assert_eq!(response.unwrap().text(), "recovered");
    }
}
