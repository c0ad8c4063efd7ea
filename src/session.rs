// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware decode session.
//!
//! A [`Session`] drives a backend through its whole life: device and service creation, decode
//! mode negotiation, surface pool (re)creation for each coded resolution, and teardown in reverse
//! order. Surfaces are lent and returned through `&self`, so the decoder and the renderer can
//! share a session across threads.

use anyhow::Context;
use thiserror::Error;

use crate::backend::AccelBackend;
use crate::mode::DecodeMode;
use crate::negotiator;
use crate::negotiator::NegotiationError;
use crate::surface_pool::configure_pool;
use crate::surface_pool::Lease;
use crate::surface_pool::PoolError;
use crate::surface_pool::SurfacePool;
use crate::surface_pool::Threading;
use crate::Resolution;
use crate::StreamFormat;
use crate::VideoFormat;

/// State of a [`Session`]. Each state implies all the previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Closed,
    /// The device and its manager exist.
    DeviceReady,
    /// The video service exists.
    ServiceReady,
    /// A decode mode has been selected and the output format is set.
    ModeNegotiated,
    /// The decoder and its surface pool exist.
    PoolReady,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("the device is no longer valid: {0:#}")]
    DeviceInvalid(anyhow::Error),
    #[error("invalid session state {actual:?} (expected {expected:?})")]
    InvalidState { expected: State, actual: State },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decoding parameters that affect the size of the surface pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub thread_count: usize,
    pub threading: Threading,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            thread_count: 1,
            threading: Threading::Single,
        }
    }
}

pub struct Session<B: AccelBackend> {
    backend: B,
    options: SessionOptions,
    state: State,
    format: Option<StreamFormat>,
    mode: Option<&'static DecodeMode>,
    pool: SurfacePool<B::Surface, B::Payload>,
}

impl<B: AccelBackend> Session<B> {
    pub fn new(backend: B, options: SessionOptions) -> Self {
        Self {
            backend,
            options,
            state: State::Closed,
            format: None,
            mode: None,
            pool: SurfacePool::new(),
        }
    }

    fn expect_state(&self, expected: State) -> Result<()> {
        if self.state < expected {
            Err(Error::InvalidState {
                expected,
                actual: self.state,
            })
        } else {
            Ok(())
        }
    }

    /// Creates the device, its manager and the video service, then selects the decode mode to use
    /// for `format`.
    ///
    /// On error every object created so far is destroyed and the session is back to
    /// [`State::Closed`].
    pub fn open(&mut self, format: StreamFormat) -> Result<()> {
        if self.state != State::Closed {
            return Err(Error::InvalidState {
                expected: State::Closed,
                actual: self.state,
            });
        }

        let res = self.open_steps(&format);
        if let Err(e) = &res {
            log::error!("Failed to open {:?} session: {}", format.codec, e);
            self.close();
        } else {
            self.format = Some(format);
        }

        res
    }

    fn open_steps(&mut self, format: &StreamFormat) -> Result<()> {
        self.backend
            .create_device()
            .context("failed to create the device")?;
        if let Err(e) = self.backend.create_device_manager() {
            self.backend.destroy_device();
            return Err(e.context("failed to create the device manager").into());
        }
        self.state = State::DeviceReady;

        self.backend
            .create_video_service()
            .context("failed to create the video service")?;
        self.state = State::ServiceReady;

        let modes = self
            .backend
            .supported_modes()
            .map_err(NegotiationError::ModeList)?;

        let backend = &mut self.backend;
        let mode = negotiator::select_mode(format, &modes, |mode, video| {
            backend.setup_output(&mode.id, video)
        })?;

        self.mode = Some(mode);
        self.state = State::ModeNegotiated;
        Ok(())
    }

    /// Creates the decoder and its surface pool for streams of `width`x`height`.
    ///
    /// Nothing is done if the pool already serves this resolution. Otherwise the current pool is
    /// destroyed first, and on error the session is left without a pool.
    pub fn setup(&mut self, width: u32, height: u32) -> Result<()> {
        self.expect_state(State::ModeNegotiated)?;
        let coded_resolution = Resolution::from((width, height));

        if self.pool.is_current(coded_resolution) {
            return Ok(());
        }

        self.pool.teardown(&mut self.backend);
        self.state = State::ModeNegotiated;

        let Some(format) = &self.format else {
            return Err(Error::InvalidState {
                expected: State::ModeNegotiated,
                actual: self.state,
            });
        };

        let config = configure_pool(
            format.codec,
            coded_resolution,
            self.options.threading,
            self.options.thread_count,
        )?;
        let video = VideoFormat {
            width,
            height,
            ..format.video
        };

        self.pool.rebuild(&mut self.backend, config, &video)?;
        self.state = State::PoolReady;
        Ok(())
    }

    /// Lends a surface to decode into, along with the frame wrapping it.
    pub fn acquire(&self) -> Result<Lease<B::Surface, B::Payload>> {
        self.expect_state(State::PoolReady)?;
        self.backend.check_device().map_err(Error::DeviceInvalid)?;

        Ok(self.pool.acquire()?)
    }

    /// Gives back a surface obtained from [`Session::acquire`].
    pub fn release(&self, lease: Lease<B::Surface, B::Payload>) {
        self.pool.release(lease)
    }

    /// Destroys the surface pool, the decoder, the video service, the device manager and the
    /// device, in this order.
    ///
    /// No surface may be acquired or released while the session closes.
    pub fn close(&mut self) {
        self.pool.teardown(&mut self.backend);

        if self.state >= State::ServiceReady {
            self.backend.destroy_video_service();
        }
        if self.state >= State::DeviceReady {
            self.backend.destroy_device_manager();
            self.backend.destroy_device();
        }

        self.state = State::Closed;
        self.mode = None;
        self.format = None;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The decode mode selected by [`Session::open`].
    pub fn selected_mode(&self) -> Option<&'static DecodeMode> {
        self.mode
    }

    pub fn stream_format(&self) -> Option<&StreamFormat> {
        self.format.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn pool(&self) -> &SurfacePool<B::Surface, B::Payload> {
        &self.pool
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: AccelBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.close();
    }
}
