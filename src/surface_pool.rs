// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Pool of hardware surfaces the accelerator decodes into.
//!
//! The pool is sized once per coded resolution by [`configure_pool`] and filled by
//! [`SurfacePool::rebuild`]. Surfaces are then lent with [`SurfacePool::acquire`] and given back
//! with [`SurfacePool::release`], possibly from different threads. Each lease is recorded in a
//! binding table owned by the pool, so returning a frame never requires the frame to know about
//! the pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use thiserror::Error;

use crate::backend::AccelBackend;
use crate::Codec;
use crate::Resolution;
use crate::VideoFormat;

/// Maximum number of surfaces a pool can hold.
pub const MAX_SURFACE_COUNT: usize = 64;

/// Number of surfaces every pool starts with, before codec and threading headroom.
const BASE_SURFACE_COUNT: usize = 4;

const DEFAULT_SURFACE_ALIGNMENT: u32 = 16;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid coded dimensions {0}")]
    InvalidDimensions(Resolution),
    #[error("too many surfaces requested ({requested}, max {max})")]
    TooManySurfaces { requested: usize, max: usize },
    #[error("failed to allocate the frame for surface {index}")]
    AllocationFailed { index: usize },
    #[error("failed to create the decoder surfaces")]
    DecoderSurfaces(#[source] anyhow::Error),
    #[error("the surface pool is not configured")]
    NotConfigured,
}

/// How the decoder spreads its work across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Threading {
    #[default]
    Single,
    Slice,
    /// Several frames are decoded in parallel, each of them keeping a surface busy.
    Frame,
}

/// Geometry and size of a surface pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub codec: Codec,
    /// Resolution of the stream.
    pub coded_resolution: Resolution,
    /// Resolution of the surfaces, i.e. the coded resolution padded to `surface_alignment`.
    pub surface_resolution: Resolution,
    pub surface_alignment: u32,
    pub surface_count: usize,
}

/// Returns the surface alignment and the number of extra surfaces needed by `codec`.
fn codec_requirements(codec: Codec) -> (u32, usize) {
    match codec {
        Codec::Mpeg2Video => (32, 2),
        // Some HEVC accelerators read past the coded area of the picture.
        Codec::Hevc => (128, 16),
        Codec::H264 => (DEFAULT_SURFACE_ALIGNMENT, 16),
        _ => (DEFAULT_SURFACE_ALIGNMENT, 2),
    }
}

/// Computes the pool to create for a stream of `codec` at `coded_resolution`.
///
/// With frame threading every thread may hold one more surface, so `thread_count` surfaces are
/// added to the pool.
pub fn configure_pool(
    codec: Codec,
    coded_resolution: Resolution,
    threading: Threading,
    thread_count: usize,
) -> Result<PoolConfig, PoolError> {
    let (surface_alignment, extra_surfaces) = codec_requirements(codec);

    let max_dimension = u32::MAX - (surface_alignment - 1);
    if coded_resolution.width == 0
        || coded_resolution.height == 0
        || coded_resolution.width > max_dimension
        || coded_resolution.height > max_dimension
    {
        return Err(PoolError::InvalidDimensions(coded_resolution));
    }

    let mut surface_count = BASE_SURFACE_COUNT + extra_surfaces;
    if threading == Threading::Frame {
        surface_count = surface_count.saturating_add(thread_count);
    }

    if surface_count > MAX_SURFACE_COUNT {
        return Err(PoolError::TooManySurfaces {
            requested: surface_count,
            max: MAX_SURFACE_COUNT,
        });
    }

    Ok(PoolConfig {
        codec,
        coded_resolution,
        surface_resolution: coded_resolution.round_up(surface_alignment),
        surface_alignment,
        surface_count,
    })
}

/// Key identifying a lease in the binding table of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseKey(u64);

/// A surface lent by a [`SurfacePool`], along with the frame wrapping it.
///
/// The lease must be given back with [`SurfacePool::release`]. Dropping it without releasing it
/// keeps the surface referenced until the pool runs out of free surfaces and lends it again, or is
/// torn down.
#[derive(Debug)]
pub struct Lease<S, P> {
    key: LeaseKey,
    index: usize,
    surface: S,
    payload: Arc<P>,
    reused: bool,
}

impl<S, P> Lease<S, P> {
    pub fn key(&self) -> LeaseKey {
        self.key
    }

    /// Index of the lent surface in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Hardware surface to decode into.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Frame wrapping the surface. Clones of it can outlive the lease.
    pub fn payload(&self) -> &Arc<P> {
        &self.payload
    }

    /// Whether the surface was still referenced by an earlier lease when it was lent.
    ///
    /// Releasing that earlier lease has no effect anymore.
    pub fn reused(&self) -> bool {
        self.reused
    }
}

struct Slot<S, P> {
    surface: S,
    payload: Arc<P>,
    ref_count: u32,
    /// Value of the generation counter the last time this surface was lent.
    generation: u64,
}

struct PoolState<S, P> {
    slots: Vec<Slot<S, P>>,
    /// Surface index of each outstanding lease. At most one lease is bound to each surface.
    bindings: HashMap<LeaseKey, usize>,
    /// Never reset, so generations keep increasing across rebuilds.
    next_generation: u64,
    next_key: u64,
}

impl<S, P> Default for PoolState<S, P> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            bindings: HashMap::new(),
            next_generation: 0,
            next_key: 0,
        }
    }
}

/// A fixed set of decode surfaces lent to the decoder and renderer.
///
/// `acquire` and `release` can be called concurrently from any thread. `rebuild` and `teardown`
/// take the pool mutably, which guarantees no lease is being taken or returned while the surfaces
/// are replaced.
pub struct SurfacePool<S, P> {
    state: Mutex<PoolState<S, P>>,
    config: Option<PoolConfig>,
    /// Whether the backend decoder currently exists.
    decoder_live: bool,
}

impl<S: Clone, P> Default for SurfacePool<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone, P> SurfacePool<S, P> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Default::default()),
            config: None,
            decoder_live: false,
        }
    }

    /// The state only holds counters and handles, so it stays consistent if a holder of the lock
    /// panicked.
    fn lock(&self) -> MutexGuard<'_, PoolState<S, P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the pool already holds surfaces for streams of `coded_resolution`.
    pub fn is_current(&self, coded_resolution: Resolution) -> bool {
        self.decoder_live
            && self
                .config
                .map(|config| config.coded_resolution == coded_resolution)
                .unwrap_or(false)
    }

    /// Replaces the surfaces of the pool with `config.surface_count` new ones.
    ///
    /// Does nothing if the pool already serves `config.coded_resolution`. On error the pool is
    /// left empty and every resource obtained from `backend` so far is released.
    pub fn rebuild<B>(
        &mut self,
        backend: &mut B,
        config: PoolConfig,
        format: &VideoFormat,
    ) -> Result<(), PoolError>
    where
        B: AccelBackend<Surface = S, Payload = P>,
    {
        if self.is_current(config.coded_resolution) {
            log::debug!("Reusing the surface pool for {}", config.coded_resolution);
            return Ok(());
        }

        self.teardown(backend);

        log::debug!(
            "Creating {} surfaces of {} for {} (alignment {})",
            config.surface_count,
            config.surface_resolution,
            config.coded_resolution,
            config.surface_alignment
        );

        let surfaces = backend
            .create_decoder_surfaces(&config, format)
            .map_err(PoolError::DecoderSurfaces)?;
        self.decoder_live = true;

        if surfaces.len() != config.surface_count {
            let err = anyhow::anyhow!(
                "expected {} surfaces, got {}",
                config.surface_count,
                surfaces.len()
            );
            self.release_resources(backend, surfaces, Vec::new());
            return Err(PoolError::DecoderSurfaces(err));
        }

        if config.surface_resolution != config.coded_resolution {
            log::warn!(
                "Surface dimensions {} differ from coded dimensions {}",
                config.surface_resolution,
                config.coded_resolution
            );
        }

        backend.setup_codec_context();

        let mut payloads = Vec::with_capacity(surfaces.len());
        for index in 0..surfaces.len() {
            match backend.alloc_surface_payload(format, index) {
                Some(payload) => payloads.push(Arc::new(payload)),
                None => {
                    log::error!("Failed to allocate the frame for surface {}", index);
                    self.release_resources(backend, surfaces, payloads);
                    return Err(PoolError::AllocationFailed { index });
                }
            }
        }

        let mut state = self.lock();
        state.bindings.clear();
        state.slots = surfaces
            .into_iter()
            .zip(payloads)
            .map(|(surface, payload)| Slot {
                surface,
                payload,
                ref_count: 0,
                generation: 0,
            })
            .collect();
        drop(state);

        self.config = Some(config);
        Ok(())
    }

    /// Lends the least recently lent free surface.
    ///
    /// If every surface is still referenced, the least recently lent one is lent again and the
    /// lease that held it is dropped from the binding table.
    pub fn acquire(&self) -> Result<Lease<S, P>, PoolError> {
        let mut state = self.lock();

        let mut best: Option<usize> = None;
        let mut best_used: Option<usize> = None;
        for (index, slot) in state.slots.iter().enumerate() {
            if best_used.map_or(true, |i| slot.generation < state.slots[i].generation) {
                best_used = Some(index);
            }
            if slot.ref_count == 0
                && best.map_or(true, |i| slot.generation < state.slots[i].generation)
            {
                best = Some(index);
            }
        }

        let (index, reused) = match (best, best_used) {
            (Some(index), _) => (index, false),
            (None, Some(index)) => {
                log::warn!(
                    "No free surface, reusing surface {} which is still referenced",
                    index
                );
                (index, true)
            }
            (None, None) => return Err(PoolError::NotConfigured),
        };

        if reused {
            state.bindings.retain(|_, bound| *bound != index);
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let key = LeaseKey(state.next_key);
        state.next_key += 1;
        state.bindings.insert(key, index);

        let slot = &mut state.slots[index];
        slot.ref_count = 1;
        slot.generation = generation;

        Ok(Lease {
            key,
            index,
            surface: slot.surface.clone(),
            payload: Arc::clone(&slot.payload),
            reused,
        })
    }

    /// Gives back a surface obtained from `acquire`.
    ///
    /// Leases taken before the last rebuild or teardown are ignored.
    pub fn release(&self, lease: Lease<S, P>) {
        self.release_key(lease.key)
    }

    /// Gives back the surface bound to `key`.
    pub fn release_key(&self, key: LeaseKey) {
        let mut state = self.lock();

        let Some(index) = state.bindings.remove(&key) else {
            log::warn!("Ignoring release of unknown lease {:?}", key);
            return;
        };

        match state.slots.get_mut(index) {
            Some(slot) if slot.ref_count > 0 => slot.ref_count -= 1,
            Some(_) => log::warn!("Surface {} released while not referenced", index),
            None => log::warn!("Lease {:?} bound to missing surface {}", key, index),
        }
    }

    /// Releases every surface and frame of the pool, referenced or not, then the decoder.
    pub fn teardown<B>(&mut self, backend: &mut B)
    where
        B: AccelBackend<Surface = S, Payload = P>,
    {
        let slots = {
            let mut state = self.lock();
            state.bindings.clear();
            std::mem::take(&mut state.slots)
        };

        let (surfaces, payloads) = slots
            .into_iter()
            .map(|slot| (slot.surface, slot.payload))
            .unzip();
        self.release_resources(backend, surfaces, payloads);
    }

    fn release_resources<B>(&mut self, backend: &mut B, surfaces: Vec<S>, payloads: Vec<Arc<P>>)
    where
        B: AccelBackend<Surface = S, Payload = P>,
    {
        if self.decoder_live || !surfaces.is_empty() {
            backend.destroy_surfaces();
        }

        for surface in surfaces {
            backend.release_surface(surface);
        }

        for payload in payloads {
            backend.release_payload(payload);
        }

        if self.decoder_live {
            backend.destroy_decoder();
            self.decoder_live = false;
        }

        self.config = None;
    }

    pub fn config(&self) -> Option<&PoolConfig> {
        self.config.as_ref()
    }

    /// Number of surfaces in the pool, 0 if it is not configured.
    pub fn surface_count(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn coded_resolution(&self) -> Option<Resolution> {
        self.config.map(|config| config.coded_resolution)
    }

    pub fn surface_resolution(&self) -> Option<Resolution> {
        self.config.map(|config| config.surface_resolution)
    }

    /// Number of surfaces currently not referenced.
    pub fn num_free_surfaces(&self) -> usize {
        self.lock()
            .slots
            .iter()
            .filter(|slot| slot.ref_count == 0)
            .count()
    }

    /// Reference count of surface `index`.
    pub fn ref_count(&self, index: usize) -> Option<u32> {
        self.lock().slots.get(index).map(|slot| slot.ref_count)
    }

    /// Generation surface `index` was last lent at, 0 if never lent since the last rebuild.
    pub fn generation(&self, index: usize) -> Option<u64> {
        self.lock().slots.get(index).map(|slot| slot.generation)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::thread;

    use super::*;
    use crate::backend::dummy::take_calls;
    use crate::backend::dummy::Backend;
    use crate::backend::dummy::Call;
    use crate::backend::dummy::DummyFrame;
    use crate::backend::dummy::DummySurface;
    use crate::backend::dummy::Failures;

    type TestPool = SurfacePool<DummySurface, DummyFrame>;

    fn config(count: usize) -> PoolConfig {
        PoolConfig {
            codec: Codec::H264,
            coded_resolution: Resolution::from((320, 240)),
            surface_resolution: Resolution::from((320, 240)),
            surface_alignment: 16,
            surface_count: count,
        }
    }

    fn format() -> VideoFormat {
        VideoFormat {
            width: 320,
            height: 240,
            ..Default::default()
        }
    }

    fn built_pool(backend: &mut Backend, count: usize) -> TestPool {
        let mut pool = TestPool::new();
        pool.rebuild(backend, config(count), &format()).unwrap();
        take_calls(&backend.calls);
        pool
    }

    #[test]
    fn hevc_pool_config() {
        let config = configure_pool(
            Codec::Hevc,
            Resolution::from((1920, 1082)),
            Threading::Single,
            1,
        )
        .unwrap();

        assert_eq!(config.surface_alignment, 128);
        assert_eq!(config.surface_resolution, Resolution::from((1920, 1152)));
        assert_eq!(config.coded_resolution, Resolution::from((1920, 1082)));
        assert_eq!(config.surface_count, 20);
    }

    #[test]
    fn codec_pool_configs() {
        let res = Resolution::from((720, 576));

        let mpeg2 = configure_pool(Codec::Mpeg2Video, res, Threading::Single, 1).unwrap();
        assert_eq!(mpeg2.surface_alignment, 32);
        assert_eq!(mpeg2.surface_resolution, Resolution::from((736, 576)));
        assert_eq!(mpeg2.surface_count, 6);

        let h264 = configure_pool(Codec::H264, res, Threading::Single, 1).unwrap();
        assert_eq!(h264.surface_alignment, 16);
        assert_eq!(h264.surface_count, 20);

        let vc1 = configure_pool(Codec::Vc1, res, Threading::Single, 1).unwrap();
        assert_eq!(vc1.surface_alignment, 16);
        assert_eq!(vc1.surface_count, 6);
    }

    #[test]
    fn frame_threading_adds_headroom() {
        let res = Resolution::from((1280, 720));

        let frame = configure_pool(Codec::H264, res, Threading::Frame, 8).unwrap();
        assert_eq!(frame.surface_count, 28);

        // Slice threading does not keep more frames in flight.
        let slice = configure_pool(Codec::H264, res, Threading::Slice, 8).unwrap();
        assert_eq!(slice.surface_count, 20);
    }

    #[test]
    fn too_many_surfaces() {
        let res = Resolution::from((1920, 1080));
        assert!(configure_pool(Codec::Hevc, res, Threading::Frame, 44).is_ok());
        assert!(matches!(
            configure_pool(Codec::Hevc, res, Threading::Frame, 45),
            Err(PoolError::TooManySurfaces {
                requested: 65,
                max: MAX_SURFACE_COUNT
            })
        ));
        assert!(matches!(
            configure_pool(Codec::Hevc, res, Threading::Frame, usize::MAX),
            Err(PoolError::TooManySurfaces { .. })
        ));
    }

    #[test]
    fn invalid_dimensions() {
        for res in [(0, 240), (320, 0), (u32::MAX, 240)] {
            assert!(matches!(
                configure_pool(Codec::Hevc, Resolution::from(res), Threading::Single, 1),
                Err(PoolError::InvalidDimensions(_))
            ));
        }
    }

    #[test]
    fn rebuild_creates_surfaces_and_frames() {
        let mut backend = Backend::new(vec![]);
        let mut pool = TestPool::new();
        pool.rebuild(&mut backend, config(3), &format()).unwrap();

        assert_eq!(
            take_calls(&backend.calls),
            vec![
                Call::CreateDecoderSurfaces(Codec::H264, Resolution::from((320, 240)), 3),
                Call::SetupCodecContext,
                Call::AllocPayload(0),
                Call::AllocPayload(1),
                Call::AllocPayload(2),
            ]
        );
        assert_eq!(pool.surface_count(), 3);
        assert_eq!(pool.num_free_surfaces(), 3);
        assert_eq!(pool.coded_resolution(), Some(Resolution::from((320, 240))));
        assert!(pool.is_current(Resolution::from((320, 240))));
    }

    #[test]
    fn rebuild_same_resolution_is_noop() {
        let mut backend = Backend::new(vec![]);
        let mut pool = built_pool(&mut backend, 3);
        let lease = pool.acquire().unwrap();

        pool.rebuild(&mut backend, config(3), &format()).unwrap();

        assert!(take_calls(&backend.calls).is_empty());
        assert_eq!(pool.surface_count(), 3);
        assert_eq!(pool.ref_count(lease.index()), Some(1));
        pool.release(lease);
        assert_eq!(pool.num_free_surfaces(), 3);
    }

    #[test]
    fn rebuild_new_resolution_replaces_pool() {
        let mut backend = Backend::new(vec![]);
        let mut pool = built_pool(&mut backend, 2);

        let new_config = PoolConfig {
            coded_resolution: Resolution::from((640, 480)),
            surface_resolution: Resolution::from((640, 480)),
            ..config(2)
        };
        pool.rebuild(&mut backend, new_config, &format()).unwrap();

        assert_eq!(
            take_calls(&backend.calls),
            vec![
                Call::DestroySurfaces,
                Call::ReleaseSurface(0),
                Call::ReleaseSurface(1),
                Call::ReleasePayload(0),
                Call::ReleasePayload(1),
                Call::DestroyDecoder,
                Call::CreateDecoderSurfaces(Codec::H264, Resolution::from((640, 480)), 2),
                Call::SetupCodecContext,
                Call::AllocPayload(0),
                Call::AllocPayload(1),
            ]
        );
        assert_eq!(pool.surface_resolution(), Some(Resolution::from((640, 480))));
    }

    #[test]
    fn decoder_failure_leaves_pool_empty() {
        let mut backend = Backend::new(vec![]).with_failures(Failures {
            create_decoder_surfaces: true,
            ..Default::default()
        });
        let mut pool = TestPool::new();

        assert!(matches!(
            pool.rebuild(&mut backend, config(3), &format()),
            Err(PoolError::DecoderSurfaces(_))
        ));
        assert_eq!(pool.surface_count(), 0);
        assert!(pool.config().is_none());
        assert!(matches!(pool.acquire(), Err(PoolError::NotConfigured)));
    }

    #[test]
    fn allocation_failure_rolls_back() {
        let mut backend = Backend::new(vec![]).with_failures(Failures {
            alloc_payload: Some(2),
            ..Default::default()
        });
        let mut pool = TestPool::new();

        assert!(matches!(
            pool.rebuild(&mut backend, config(4), &format()),
            Err(PoolError::AllocationFailed { index: 2 })
        ));
        assert_eq!(
            take_calls(&backend.calls),
            vec![
                Call::CreateDecoderSurfaces(Codec::H264, Resolution::from((320, 240)), 4),
                Call::SetupCodecContext,
                Call::AllocPayload(0),
                Call::AllocPayload(1),
                Call::AllocPayload(2),
                Call::DestroySurfaces,
                Call::ReleaseSurface(0),
                Call::ReleaseSurface(1),
                Call::ReleaseSurface(2),
                Call::ReleaseSurface(3),
                Call::ReleasePayload(0),
                Call::ReleasePayload(1),
                Call::DestroyDecoder,
            ]
        );
        assert_eq!(pool.surface_count(), 0);
        assert!(!pool.is_current(Resolution::from((320, 240))));
        assert!(matches!(pool.acquire(), Err(PoolError::NotConfigured)));
    }

    #[test]
    fn acquire_prefers_oldest_free_surface() {
        let mut backend = Backend::new(vec![]);
        let pool = built_pool(&mut backend, 3);

        {
            let mut state = pool.lock();
            for (slot, (generation, ref_count)) in
                state.slots.iter_mut().zip([(5, 0), (2, 0), (8, 1)])
            {
                slot.generation = generation;
                slot.ref_count = ref_count;
            }
            state.next_generation = 8;
        }

        let lease = pool.acquire().unwrap();
        assert_eq!(lease.index(), 1);
        assert_eq!(*lease.surface(), DummySurface(1));
        assert_eq!(lease.payload().index, 1);
        assert_eq!(pool.ref_count(1), Some(1));
        assert_eq!(pool.generation(1), Some(9));
    }

    #[test]
    fn acquire_reuses_oldest_when_all_referenced() {
        let mut backend = Backend::new(vec![]);
        let pool = built_pool(&mut backend, 3);

        let leases: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        let indices: HashSet<_> = leases.iter().map(Lease::index).collect();
        assert_eq!(indices.len(), 3);
        assert_eq!(pool.num_free_surfaces(), 0);

        assert!(leases.iter().all(|lease| !lease.reused()));

        // All surfaces are busy: the one lent first is lent again.
        let reused = pool.acquire().unwrap();
        assert!(reused.reused());
        assert_eq!(reused.index(), leases[0].index());
        assert_eq!(pool.ref_count(reused.index()), Some(1));
        assert_eq!(pool.lock().bindings.len(), 3);

        // The earlier lease of the surface no longer holds it.
        let first = leases.into_iter().next().unwrap();
        let index = first.index();
        pool.release(first);
        assert_eq!(pool.ref_count(index), Some(1));

        pool.release(reused);
        assert_eq!(pool.ref_count(index), Some(0));
    }

    #[test]
    fn dropped_leases_do_not_grow_bindings() {
        let mut backend = Backend::new(vec![]);
        let pool = built_pool(&mut backend, 2);

        for i in 0..10_000 {
            let lease = pool.acquire().unwrap();
            assert_eq!(lease.reused(), i >= 2);
            drop(lease);
        }

        let bindings_len = pool.lock().bindings.len();
        assert!(bindings_len <= pool.surface_count());
        assert_eq!(pool.num_free_surfaces(), 0);

        // A surface leaked that way comes back once its latest lease is released.
        let lease = pool.acquire().unwrap();
        let index = lease.index();
        pool.release(lease);
        assert_eq!(pool.ref_count(index), Some(0));
        assert_eq!(pool.num_free_surfaces(), 1);
    }

    #[test]
    fn acquire_release_round_trip() {
        let mut backend = Backend::new(vec![]);
        let pool = built_pool(&mut backend, 4);

        let lease = pool.acquire().unwrap();
        let index = lease.index();
        assert_eq!(pool.ref_count(index), Some(1));
        assert_eq!(pool.num_free_surfaces(), 3);

        pool.release(lease);
        assert_eq!(pool.ref_count(index), Some(0));
        assert_eq!(pool.num_free_surfaces(), 4);

        // The surface just returned is now the most recently used.
        assert_ne!(pool.acquire().unwrap().index(), index);
    }

    #[test]
    fn double_release_is_ignored() {
        let mut backend = Backend::new(vec![]);
        let pool = built_pool(&mut backend, 2);

        let lease = pool.acquire().unwrap();
        let key = lease.key();
        let index = lease.index();
        pool.release(lease);
        pool.release_key(key);

        assert_eq!(pool.ref_count(index), Some(0));
    }

    #[test]
    fn stale_release_after_rebuild() {
        let mut backend = Backend::new(vec![]);
        let mut pool = built_pool(&mut backend, 2);
        let stale = pool.acquire().unwrap();

        let new_config = PoolConfig {
            coded_resolution: Resolution::from((640, 480)),
            ..config(2)
        };
        pool.rebuild(&mut backend, new_config, &format()).unwrap();
        pool.release(stale);

        assert_eq!(pool.num_free_surfaces(), 2);
    }

    #[test]
    fn generations_persist_across_rebuilds() {
        let mut backend = Backend::new(vec![]);
        let mut pool = built_pool(&mut backend, 2);
        pool.release(pool.acquire().unwrap());
        pool.release(pool.acquire().unwrap());
        assert_eq!(pool.generation(0), Some(1));
        assert_eq!(pool.generation(1), Some(2));

        pool.teardown(&mut backend);
        pool.rebuild(&mut backend, config(2), &format()).unwrap();
        assert_eq!(pool.generation(0), Some(0));

        let lease = pool.acquire().unwrap();
        assert_eq!(pool.generation(lease.index()), Some(3));
    }

    #[test]
    fn teardown_releases_every_frame_once() {
        let mut backend = Backend::new(vec![]);
        let mut pool = built_pool(&mut backend, 3);

        // Outstanding leases do not prevent the frames from being released.
        let _held = pool.acquire().unwrap();
        let _also_held = pool.acquire().unwrap();
        pool.teardown(&mut backend);

        let calls = take_calls(&backend.calls);
        assert_eq!(calls.first(), Some(&Call::DestroySurfaces));
        assert_eq!(calls.last(), Some(&Call::DestroyDecoder));
        for index in 0..3 {
            let released = calls
                .iter()
                .filter(|call| **call == Call::ReleasePayload(index))
                .count();
            assert_eq!(released, 1);
        }
        assert_eq!(pool.surface_count(), 0);
        assert!(pool.config().is_none());

        // Nothing is left to release.
        pool.teardown(&mut backend);
        assert!(take_calls(&backend.calls).is_empty());
    }

    #[test]
    fn concurrent_acquire_release() {
        const NUM_THREADS: usize = 4;
        const ITERATIONS: usize = 500;

        let mut backend = Backend::new(vec![]);
        let pool = Arc::new(built_pool(&mut backend, NUM_THREADS + 2));
        let in_use: Arc<Vec<AtomicBool>> =
            Arc::new((0..NUM_THREADS + 2).map(|_| AtomicBool::new(false)).collect());

        let workers: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let in_use = Arc::clone(&in_use);
                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        let lease = pool.acquire().unwrap();
                        // No other thread may hold this surface.
                        assert!(!in_use[lease.index()].swap(true, Ordering::SeqCst));
                        thread::yield_now();
                        in_use[lease.index()].store(false, Ordering::SeqCst);
                        pool.release(lease);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(pool.num_free_surfaces(), NUM_THREADS + 2);
        assert_eq!(pool.lock().next_generation, (NUM_THREADS * ITERATIONS) as u64);
        assert!(pool.lock().bindings.is_empty());
    }
}
