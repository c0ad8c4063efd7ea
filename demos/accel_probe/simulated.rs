// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! An acceleration service that only pretends to decode.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::anyhow;

use hwaccel_va::backend::AccelBackend;
use hwaccel_va::mode::ModeId;
use hwaccel_va::surface_pool::PoolConfig;
use hwaccel_va::Resolution;
use hwaccel_va::VideoFormat;

/// Frame wrapping a simulated surface.
#[derive(Debug)]
pub struct SimulatedFrame {
    pub index: usize,
    pub resolution: Resolution,
}

pub struct SimulatedBackend {
    modes: Vec<ModeId>,
    /// Number of device checks left before the device is reported lost.
    device_checks_left: Option<AtomicUsize>,
    surface_resolution: Resolution,
    next_surface_id: u32,
}

impl SimulatedBackend {
    pub fn new(modes: Vec<ModeId>, lose_device_after: Option<usize>) -> Self {
        Self {
            modes,
            device_checks_left: lose_device_after.map(AtomicUsize::new),
            surface_resolution: Default::default(),
            next_surface_id: 0,
        }
    }
}

impl AccelBackend for SimulatedBackend {
    type Surface = u32;
    type Payload = SimulatedFrame;

    fn create_device(&mut self) -> anyhow::Result<()> {
        log::debug!("creating simulated device");
        Ok(())
    }

    fn destroy_device(&mut self) {
        log::debug!("destroying simulated device");
    }

    fn create_device_manager(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn destroy_device_manager(&mut self) {}

    fn create_video_service(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn destroy_video_service(&mut self) {}

    fn supported_modes(&mut self) -> anyhow::Result<Vec<ModeId>> {
        Ok(self.modes.clone())
    }

    fn setup_output(&mut self, mode: &ModeId, format: &VideoFormat) -> anyhow::Result<()> {
        log::debug!("output of {} set to {}", mode, format.resolution());
        Ok(())
    }

    fn create_decoder_surfaces(
        &mut self,
        config: &PoolConfig,
        _format: &VideoFormat,
    ) -> anyhow::Result<Vec<u32>> {
        let count = u32::try_from(config.surface_count)?;
        let first = self.next_surface_id;
        self.next_surface_id = first
            .checked_add(count)
            .ok_or(anyhow!("out of surface identifiers"))?;
        self.surface_resolution = config.surface_resolution;

        Ok((first..self.next_surface_id).collect())
    }

    fn destroy_surfaces(&mut self) {}

    fn release_surface(&mut self, surface: u32) {
        log::trace!("releasing surface {}", surface);
    }

    fn destroy_decoder(&mut self) {
        log::debug!("destroying simulated decoder");
    }

    fn alloc_surface_payload(&mut self, _format: &VideoFormat, index: usize) -> Option<SimulatedFrame> {
        Some(SimulatedFrame {
            index,
            resolution: self.surface_resolution,
        })
    }

    fn release_payload(&mut self, payload: Arc<SimulatedFrame>) {
        log::trace!(
            "releasing frame {} ({} references left)",
            payload.index,
            Arc::strong_count(&payload) - 1
        );
    }

    fn check_device(&self) -> anyhow::Result<()> {
        match &self.device_checks_left {
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map(|_| ())
                .map_err(|_| anyhow!("simulated device lost")),
            None => Ok(()),
        }
    }
}
