// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Content-addressed evaluation cache

use super::future::{GeometryFuture, Promise};
use crate::ast::{CacheKey, NodeId};
use crate::error::EvalError;
use crate::geometry::{Geometry, SharedGeometry};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// 3D representation a consumer asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// Polyhedron accepted by the boolean kernel
    Exact,
    Mesh,
}

impl Form {
    fn matches(self, geometry: &Geometry) -> bool {
        match (self, geometry) {
            (_, Geometry::Polygon2d(_)) => true,
            (Form::Exact, Geometry::Polyhedron(_)) => true,
            (Form::Mesh, Geometry::Mesh(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct Derived {
    exact: Option<SharedGeometry>,
    mesh: Option<SharedGeometry>,
}

/// One cache entry: the shared future of a computation plus the alternate
/// 3D form, once something has asked for it
#[derive(Debug)]
pub struct CacheSlot {
    kind: &'static str,
    future: GeometryFuture,
    derived: Mutex<Derived>,
}

impl CacheSlot {
    fn new(kind: &'static str, future: GeometryFuture) -> Self {
        Self {
            kind,
            future,
            derived: Mutex::new(Derived::default()),
        }
    }

    pub fn future(&self) -> &GeometryFuture {
        &self.future
    }

    /// `base` in the requested form, converting at most once per slot.
    ///
    /// The slot lock is held during conversion, so concurrent readers
    /// asking for the same form wait for the first conversion instead of
    /// repeating it.
    pub fn derived<E>(
        &self,
        base: &SharedGeometry,
        form: Form,
        convert: impl FnOnce(&Geometry) -> Result<Geometry, E>,
    ) -> Result<SharedGeometry, E> {
        if form.matches(base) {
            return Ok(Arc::clone(base));
        }
        let mut derived = self.derived.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = match form {
            Form::Exact => &mut derived.exact,
            Form::Mesh => &mut derived.mesh,
        };
        if let Some(done) = entry {
            return Ok(Arc::clone(done));
        }
        let converted = Arc::new(convert(base)?);
        *entry = Some(Arc::clone(&converted));
        Ok(converted)
    }
}

pub(crate) enum Reservation {
    /// Some node with this key was already scheduled or computed
    Existing(Arc<CacheSlot>),
    /// The caller owns the computation and must fulfil the promise
    New(Promise, Arc<CacheSlot>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Percentage of reservations served by an existing entry
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f32 / total as f32) * 100.0
        }
    }
}

/// Memoized node results for one evaluation session.
///
/// Entries are keyed by [`CacheKey`], so structurally equal subtrees share
/// one entry. An entry is created when a node is scheduled, before its value
/// exists; later requests wait on the same future.
#[derive(Debug, Default)]
pub struct GeometryCache {
    slots: DashMap<CacheKey, Arc<CacheSlot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Whether a computation for `key` exists, finished or not
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Finished value for `key`, if it completed successfully
    pub fn get(&self, key: &CacheKey) -> Option<SharedGeometry> {
        self.slots.get(key)?.future.try_get()?.ok()
    }

    pub(crate) fn slot(&self, key: &CacheKey) -> Option<Arc<CacheSlot>> {
        self.slots.get(key).map(|slot| Arc::clone(slot.value()))
    }

    /// Look up `key`, creating an in-flight entry when it is absent.
    ///
    /// Lookup and insertion happen under one shard lock, so two requests
    /// for the same key never both get [`Reservation::New`].
    pub(crate) fn reserve(&self, key: CacheKey, node: NodeId, kind: &'static str) -> Result<Reservation, EvalError> {
        match self.slots.entry(key) {
            Entry::Occupied(entry) => {
                let slot = Arc::clone(entry.get());
                if slot.kind != kind {
                    return Err(EvalError::CacheCorruption(format!(
                        "key {} of {} node {} resolves to a {} entry",
                        key, kind, node, slot.kind
                    )));
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%node, %key, "cache hit");
                Ok(Reservation::Existing(slot))
            }
            Entry::Vacant(entry) => {
                let (promise, future) = Promise::new(node);
                let slot = Arc::new(CacheSlot::new(kind, future));
                entry.insert(Arc::clone(&slot));
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(Reservation::New(promise, slot))
            }
        }
    }

    /// Drop entries whose computation failed so a later request retries
    pub fn purge_failed(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.future.is_failed());
        before - self.slots.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.slots.len(),
        }
    }
}
