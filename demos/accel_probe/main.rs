// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! accel_probe, a program negotiating a decode mode and cycling frames through the surface pool
//! of a simulated acceleration service.

use std::fs;
use std::sync::mpsc;
use std::thread;

use anyhow::Context;

use hwaccel_va::mode::DECODE_MODES;
use hwaccel_va::session::Session;
use hwaccel_va::session::SessionOptions;
use hwaccel_va::surface_pool::Threading;
use hwaccel_va::StreamFormat;
use hwaccel_va::VideoFormat;

use crate::simulated::SimulatedBackend;
use crate::util::Args;

mod simulated;
mod util;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Args = argh::from_env();

    let extradata = match &args.extradata {
        Some(path) => fs::read(path).with_context(|| format!("cannot read {}", path.display()))?,
        None => Vec::new(),
    };

    let format = StreamFormat {
        codec: args.codec,
        profile: args.profile,
        extradata,
        video: VideoFormat {
            width: args.width,
            height: args.height,
            frame_rate: 30,
            frame_rate_base: 1,
        },
    };

    let modes = if args.mode.is_empty() {
        DECODE_MODES
            .iter()
            .filter(|mode| mode.decodes(args.codec))
            .map(|mode| mode.id)
            .collect()
    } else {
        args.mode.clone()
    };

    let options = SessionOptions {
        thread_count: args.threads,
        threading: if args.frame_threading {
            Threading::Frame
        } else {
            Threading::Single
        },
    };

    let mut session = Session::new(SimulatedBackend::new(modes, args.lose_device_after), options);
    session.open(format)?;
    session.setup(args.width, args.height)?;

    if let Some(mode) = session.selected_mode() {
        println!("Decode mode: {} ({})", mode.name, mode.id);
    }
    if let Some(config) = session.pool().config() {
        println!(
            "Surface pool: {} surfaces of {} (alignment {})",
            config.surface_count, config.surface_resolution, config.surface_alignment
        );
    }

    // Frames are decoded on one thread and displayed on another, with a few frames in flight.
    let session = &session;
    let (sender, receiver) = mpsc::sync_channel(args.threads.max(1));
    let decoded = thread::scope(|s| {
        let decoder = s.spawn(move || -> hwaccel_va::session::Result<usize> {
            for frame in 0..args.frames {
                match session.acquire() {
                    Ok(lease) => {
                        if sender.send(lease).is_err() {
                            return Ok(frame);
                        }
                    }
                    Err(e) => {
                        log::error!("Cannot get a surface for frame {}: {}", frame, e);
                        return Err(e);
                    }
                }
            }
            Ok(args.frames)
        });

        s.spawn(move || {
            for lease in receiver {
                log::debug!(
                    "displaying frame from surface {} ({})",
                    lease.index(),
                    lease.payload().resolution
                );
                session.release(lease);
            }
        });

        decoder.join()
    });

    match decoded {
        Ok(Ok(frames)) => println!("Cycled {} frames", frames),
        Ok(Err(e)) => println!("Decoding stopped: {}", e),
        Err(_) => anyhow::bail!("decoder thread panicked"),
    }
    println!("Free surfaces: {}", session.pool().num_free_surfaces());

    Ok(())
}
