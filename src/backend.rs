// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interface to the platform acceleration service.
//!
//! A backend is the platform-specific provider of hardware decoding (e.g. a DXVA2 or D3D11 video
//! device). This crate never talks to the platform directly: every device, service, decoder and
//! surface operation goes through the [`AccelBackend`] trait, and the code in this crate only
//! decides which operations to call and in which order.

#[cfg(test)]
pub(crate) mod dummy;

use std::sync::Arc;

use crate::mode::ModeId;
use crate::surface_pool::PoolConfig;
use crate::VideoFormat;

/// Operations a platform acceleration service must provide.
///
/// Creation methods are called in the order device, device manager, video service. Destruction
/// happens in the reverse order and is only requested for objects whose creation succeeded.
pub trait AccelBackend: Send + Sync {
    /// Hardware surface the decoder writes into.
    type Surface: Clone + Send + Sync;
    /// Frame object wrapping a hardware surface, lent to the renderer.
    type Payload: Send + Sync;

    fn create_device(&mut self) -> anyhow::Result<()>;
    fn destroy_device(&mut self);

    fn create_device_manager(&mut self) -> anyhow::Result<()>;
    fn destroy_device_manager(&mut self);

    fn create_video_service(&mut self) -> anyhow::Result<()>;
    fn destroy_video_service(&mut self);

    /// Returns the decode modes supported by the video service.
    fn supported_modes(&mut self) -> anyhow::Result<Vec<ModeId>>;

    /// Checks whether the platform can decode with `mode` into the output described by `format`,
    /// and if so, sets up its output format accordingly.
    fn setup_output(&mut self, mode: &ModeId, format: &VideoFormat) -> anyhow::Result<()>;

    /// Creates the decoder for streams of `format`, and the `config.surface_count` hardware
    /// surfaces of `config.surface_resolution` it decodes into.
    fn create_decoder_surfaces(
        &mut self,
        config: &PoolConfig,
        format: &VideoFormat,
    ) -> anyhow::Result<Vec<Self::Surface>>;

    /// Stops producing into the surfaces created by `create_decoder_surfaces`.
    fn destroy_surfaces(&mut self);

    /// Releases a hardware surface obtained from `create_decoder_surfaces`.
    fn release_surface(&mut self, _surface: Self::Surface) {}

    /// Releases the decoder created by `create_decoder_surfaces`.
    fn destroy_decoder(&mut self);

    /// Lets the codec side pick up the negotiated decoder state. Called once the decoder
    /// surfaces exist.
    fn setup_codec_context(&mut self) {}

    /// Allocates the frame wrapping surface `index`. Returns `None` on failure.
    fn alloc_surface_payload(&mut self, format: &VideoFormat, index: usize)
        -> Option<Self::Payload>;

    /// Releases a frame obtained from `alloc_surface_payload`.
    ///
    /// The renderer may still hold references to `payload`.
    fn release_payload(&mut self, _payload: Arc<Self::Payload>) {}

    /// Checks that the device is still usable before handing out a surface.
    fn check_device(&self) -> anyhow::Result<()>;
}
