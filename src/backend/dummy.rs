// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This file contains a dummy backend whose only purpose is to let the session and pool run so we
//! can test them in isolation.
//!
//! Every call is recorded, and failures can be injected at any step.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::anyhow;

use crate::backend::AccelBackend;
use crate::mode::ModeId;
use crate::surface_pool::PoolConfig;
use crate::Codec;
use crate::Resolution;
use crate::VideoFormat;

/// Calls recorded by [`Backend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    CreateDevice,
    DestroyDevice,
    CreateDeviceManager,
    DestroyDeviceManager,
    CreateVideoService,
    DestroyVideoService,
    SupportedModes,
    SetupOutput(ModeId),
    CreateDecoderSurfaces(Codec, Resolution, usize),
    DestroySurfaces,
    ReleaseSurface(u32),
    DestroyDecoder,
    SetupCodecContext,
    AllocPayload(usize),
    ReleasePayload(usize),
}

/// Surface handle of the dummy backend: just an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DummySurface(pub u32);

/// Frame wrapping a dummy surface.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct DummyFrame {
    pub index: usize,
}

/// Failures to inject into [`Backend`].
#[derive(Debug, Default, Clone)]
pub(crate) struct Failures {
    pub create_device: bool,
    pub create_device_manager: bool,
    pub create_video_service: bool,
    pub supported_modes: bool,
    /// Modes for which `setup_output` fails.
    pub setup_output: Vec<ModeId>,
    pub create_decoder_surfaces: bool,
    /// Index for which payload allocation fails.
    pub alloc_payload: Option<usize>,
}

pub(crate) struct Backend {
    pub modes: Vec<ModeId>,
    pub failures: Failures,
    pub calls: Arc<Mutex<Vec<Call>>>,
    /// Set to false to make `check_device` fail.
    pub device_valid: Arc<AtomicBool>,
    next_surface_id: u32,
}

impl Backend {
    pub(crate) fn new(modes: Vec<ModeId>) -> Self {
        Self {
            modes,
            failures: Default::default(),
            calls: Default::default(),
            device_valid: Arc::new(AtomicBool::new(true)),
            next_surface_id: 0,
        }
    }

    pub(crate) fn with_failures(mut self, failures: Failures) -> Self {
        self.failures = failures;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail_if(&self, fail: bool, what: &str) -> anyhow::Result<()> {
        if fail {
            Err(anyhow!("injected {} failure", what))
        } else {
            Ok(())
        }
    }
}

/// Returns the calls recorded so far and clears the record.
pub(crate) fn take_calls(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
    std::mem::take(&mut *calls.lock().unwrap())
}

impl AccelBackend for Backend {
    type Surface = DummySurface;
    type Payload = DummyFrame;

    fn create_device(&mut self) -> anyhow::Result<()> {
        self.record(Call::CreateDevice);
        self.fail_if(self.failures.create_device, "device")
    }

    fn destroy_device(&mut self) {
        self.record(Call::DestroyDevice);
    }

    fn create_device_manager(&mut self) -> anyhow::Result<()> {
        self.record(Call::CreateDeviceManager);
        self.fail_if(self.failures.create_device_manager, "device manager")
    }

    fn destroy_device_manager(&mut self) {
        self.record(Call::DestroyDeviceManager);
    }

    fn create_video_service(&mut self) -> anyhow::Result<()> {
        self.record(Call::CreateVideoService);
        self.fail_if(self.failures.create_video_service, "video service")
    }

    fn destroy_video_service(&mut self) {
        self.record(Call::DestroyVideoService);
    }

    fn supported_modes(&mut self) -> anyhow::Result<Vec<ModeId>> {
        self.record(Call::SupportedModes);
        self.fail_if(self.failures.supported_modes, "mode list")?;
        Ok(self.modes.clone())
    }

    fn setup_output(&mut self, mode: &ModeId, _format: &VideoFormat) -> anyhow::Result<()> {
        self.record(Call::SetupOutput(*mode));
        self.fail_if(self.failures.setup_output.contains(mode), "output setup")
    }

    fn create_decoder_surfaces(
        &mut self,
        config: &PoolConfig,
        _format: &VideoFormat,
    ) -> anyhow::Result<Vec<DummySurface>> {
        self.record(Call::CreateDecoderSurfaces(
            config.codec,
            config.surface_resolution,
            config.surface_count,
        ));
        self.fail_if(self.failures.create_decoder_surfaces, "decoder")?;

        let first = self.next_surface_id;
        self.next_surface_id += config.surface_count as u32;
        Ok((first..self.next_surface_id).map(DummySurface).collect())
    }

    fn destroy_surfaces(&mut self) {
        self.record(Call::DestroySurfaces);
    }

    fn release_surface(&mut self, surface: DummySurface) {
        self.record(Call::ReleaseSurface(surface.0));
    }

    fn destroy_decoder(&mut self) {
        self.record(Call::DestroyDecoder);
    }

    fn setup_codec_context(&mut self) {
        self.record(Call::SetupCodecContext);
    }

    fn alloc_surface_payload(&mut self, _format: &VideoFormat, index: usize) -> Option<DummyFrame> {
        self.record(Call::AllocPayload(index));
        if self.failures.alloc_payload == Some(index) {
            None
        } else {
            Some(DummyFrame { index })
        }
    }

    fn release_payload(&mut self, payload: Arc<DummyFrame>) {
        self.record(Call::ReleasePayload(payload.index));
    }

    fn check_device(&self) -> anyhow::Result<()> {
        if self.device_valid.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("device lost"))
        }
    }
}
