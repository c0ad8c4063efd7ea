// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Codec-specific helpers used during mode negotiation.
//!
//! Decode modes may restrict which profiles of a codec they accept. The profile advertised by the
//! container is not always reliable, so for H.264 and HEVC the profile is read directly from the
//! codec configuration data when it can be parsed.

pub mod h264;
pub mod h265;
pub(crate) mod nalu;
pub(crate) mod nalu_reader;

use crate::Codec;

/// Profile identifiers, numbered as libavcodec numbers them.
pub mod profiles {
    pub const MPEG2_MAIN: i32 = 4;
    pub const MPEG2_SIMPLE: i32 = 5;

    /// Flag set on H.264 profiles carrying constraint_set1_flag.
    pub const H264_CONSTRAINED: i32 = 1 << 9;
    pub const H264_BASELINE: i32 = 66;
    pub const H264_CONSTRAINED_BASELINE: i32 = H264_BASELINE | H264_CONSTRAINED;
    pub const H264_MAIN: i32 = 77;
    pub const H264_EXTENDED: i32 = 88;
    pub const H264_HIGH: i32 = 100;
    pub const H264_HIGH_10: i32 = 110;
    pub const H264_HIGH_422: i32 = 122;

    pub const HEVC_MAIN: i32 = 1;
    pub const HEVC_MAIN_10: i32 = 2;
    pub const HEVC_MAIN_STILL_PICTURE: i32 = 3;
    pub const HEVC_REXT: i32 = 4;
}

/// Reads the stream profile of `codec` from its configuration data `extradata`.
///
/// Returns `None` for codecs without a profile parser, or if `extradata` does not contain
/// anything the parser can make sense of.
pub fn profile_from_extradata(codec: Codec, extradata: &[u8]) -> Option<i32> {
    if extradata.is_empty() {
        return None;
    }

    let profile = match codec {
        Codec::H264 => h264::profile_from_extradata(extradata),
        Codec::Hevc => h265::profile_from_extradata(extradata),
        _ => return None,
    };

    match profile {
        Ok(profile) => Some(profile),
        Err(e) => {
            log::debug!("cannot read {:?} profile from extradata: {:#}", codec, e);
            None
        }
    }
}
