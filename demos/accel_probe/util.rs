// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;

use argh::FromArgs;

use hwaccel_va::mode::ModeId;
use hwaccel_va::Codec;

/// Runs a hardware decode session against a simulated acceleration service
#[derive(Debug, FromArgs)]
pub struct Args {
    /// codec of the stream (mpeg1, mpeg2, h264, hevc, vc1, wmv3, vp9)
    #[argh(option)]
    pub codec: Codec,

    /// profile signalled by the container. Default: unknown
    #[argh(option, default = "0")]
    pub profile: i32,

    /// file containing the codec configuration data (avcC, hvcC or Annex B parameter sets)
    #[argh(option)]
    pub extradata: Option<PathBuf>,

    /// coded width of the stream
    #[argh(option)]
    pub width: u32,

    /// coded height of the stream
    #[argh(option)]
    pub height: u32,

    /// number of decoding threads. Default: 1
    #[argh(option, default = "1")]
    pub threads: usize,

    /// whether frames are decoded in parallel
    #[argh(switch)]
    pub frame_threading: bool,

    /// decode mode supported by the simulated platform, as a GUID. Can be repeated. Default: all
    /// the modes known for the codec
    #[argh(option)]
    pub mode: Vec<ModeId>,

    /// number of frames to cycle through the surface pool. Default: 64
    #[argh(option, default = "64")]
    pub frames: usize,

    /// number of frames after which the simulated device is lost
    #[argh(option)]
    pub lose_device_after: Option<usize>,
}
