// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware video decode acceleration helpers.
//!
//! This crate picks which hardware decode mode a platform acceleration service should use for a
//! given codec and profile, and manages the fixed pool of hardware surfaces the accelerator
//! decodes into while a session is running.
//!
//! The platform itself (device creation, decoder instantiation, surface memory) stays behind the
//! [`backend::AccelBackend`] trait. The crate-side pieces are:
//!
//! * [`mode`], the preference-ordered table of known decode modes,
//! * [`negotiator`], which matches that table against what the platform supports,
//! * [`surface_pool`], which sizes, lends and recycles decode surfaces,
//! * [`session`], which ties everything into an open/setup/close state machine.

pub mod backend;
pub mod codec;
pub mod mode;
pub mod negotiator;
pub mod session;
pub mod surface_pool;

use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Whether `self` can contain `other`.
    pub fn can_contain(&self, other: Self) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    /// Returns `self` with both dimensions rounded up to the next multiple of `alignment`.
    pub fn round_up(&self, alignment: u32) -> Self {
        Self {
            width: align_up(self.width, alignment),
            height: align_up(self.height, alignment),
        }
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self {
            width: value.0,
            height: value.1,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rounds `value` up to the next multiple of `alignment`, which must be a power of two.
pub const fn align_up(value: u32, alignment: u32) -> u32 {
    (value + (alignment - 1)) & !(alignment - 1)
}

/// Compressed video formats known to the decode mode table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Mpeg1Video,
    Mpeg2Video,
    H264,
    Hevc,
    Vc1,
    Wmv3,
    Vp9,
}

impl FromStr for Codec {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mpeg1" | "MPEG1" => Ok(Codec::Mpeg1Video),
            "mpeg2" | "MPEG2" => Ok(Codec::Mpeg2Video),
            "h264" | "H264" => Ok(Codec::H264),
            "h265" | "H265" | "hevc" | "HEVC" => Ok(Codec::Hevc),
            "vc1" | "VC1" => Ok(Codec::Vc1),
            "wmv3" | "WMV3" => Ok(Codec::Wmv3),
            "vp9" | "VP9" => Ok(Codec::Vp9),
            _ => Err("unrecognized codec. Valid values: mpeg1, mpeg2, h264, hevc, vc1, wmv3, vp9"),
        }
    }
}

/// Geometry and timing of the video the accelerator is asked to produce.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub frame_rate_base: u32,
}

impl VideoFormat {
    pub fn resolution(&self) -> Resolution {
        Resolution::from((self.width, self.height))
    }
}

/// Description of the elementary stream a session is opened for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    pub codec: Codec,
    /// Profile signalled by the container, or a value `<= 0` if unknown.
    pub profile: i32,
    /// Codec configuration data (avcC/hvcC records or Annex B parameter sets), possibly empty.
    pub extradata: Vec<u8>,
    pub video: VideoFormat,
}

impl StreamFormat {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            profile: 0,
            extradata: Vec::new(),
            video: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_next_multiple() {
        assert_eq!(align_up(1920, 128), 1920);
        assert_eq!(align_up(1082, 128), 1152);
        assert_eq!(align_up(1080, 16), 1088);
        assert_eq!(align_up(1, 32), 32);
        assert_eq!(align_up(0, 16), 0);
    }

    #[test]
    fn resolution_round_up() {
        let res = Resolution::from((1280, 720)).round_up(32);
        assert_eq!(res, Resolution::from((1280, 736)));
        assert!(res.can_contain(Resolution::from((1280, 720))));
        assert!(!Resolution::from((1280, 720)).can_contain(res));
    }

    #[test]
    fn codec_from_str() {
        assert_eq!("hevc".parse::<Codec>(), Ok(Codec::Hevc));
        assert_eq!("H264".parse::<Codec>(), Ok(Codec::H264));
        assert!("av1".parse::<Codec>().is_err());
    }
}
