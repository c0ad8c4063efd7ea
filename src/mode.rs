// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decode modes known to this crate, ordered by preference.
//!
//! A decode mode is a hardware decoding capability as advertised by the platform acceleration
//! service, identified by an opaque 128-bit value (a GUID on most platforms). The
//! [`DECODE_MODES`] table lists every mode we know the name of, and the codec and profiles that
//! may be decoded with it. Entries without a codec are only listed so they can be named in logs;
//! they are never selected.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use anyhow::Context;

use crate::codec::profiles;
use crate::Codec;

/// Opaque identifier of a hardware decode mode.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeId(u128);

impl ModeId {
    /// Creates an identifier from its 128-bit value, written in GUID order, e.g.
    /// `0x1b81be68_a0c7_11d3_b984_00c04f2e73c5`.
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Creates an identifier from the fields of a platform GUID structure.
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self(
            (data1 as u128) << 96
                | (data2 as u128) << 80
                | (data3 as u128) << 64
                | u64::from_be_bytes(data4) as u128,
        )
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

impl FromStr for ModeId {
    type Err = anyhow::Error;

    /// Parses the canonical GUID form, e.g. `1b81be68-a0c7-11d3-b984-00c04f2e73c5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.trim_matches(&['{', '}'][..]).split('-').collect();
        let well_formed = groups.iter().map(|g| g.len()).eq([8, 4, 4, 4, 12])
            && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_hexdigit()));
        if !well_formed {
            return Err(anyhow!("malformed mode identifier {:?}", s));
        }

        let value = u128::from_str_radix(&groups.concat(), 16)
            .with_context(|| format!("malformed mode identifier {:?}", s))?;
        Ok(Self(value))
    }
}

impl fmt::Debug for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModeId({})", self)
    }
}

pub const MPEG1_A: ModeId = ModeId::from_u128(0x1b81be09_a0c7_11d3_b984_00c04f2e73c5);
pub const MPEG2_A: ModeId = ModeId::from_u128(0x1b81be0a_a0c7_11d3_b984_00c04f2e73c5);
pub const MPEG2_B: ModeId = ModeId::from_u128(0x1b81be0b_a0c7_11d3_b984_00c04f2e73c5);
pub const MPEG2_C: ModeId = ModeId::from_u128(0x1b81be0c_a0c7_11d3_b984_00c04f2e73c5);
pub const MPEG2_D: ModeId = ModeId::from_u128(0x1b81be0d_a0c7_11d3_b984_00c04f2e73c5);
pub const MPEG2_VLD: ModeId = ModeId::from_u128(0xee27417f_5e28_4e65_beea_1d26b508adc9);
pub const MPEG2AND1_VLD: ModeId = ModeId::from_u128(0x86695f12_340e_4f04_9fd3_9253dd327460);
pub const MPEG2_MO_COMP: ModeId = ModeId::from_u128(0xe6a9f44b_61b0_4563_9ea4_63d2a3c6fe66);
pub const MPEG2_IDCT: ModeId = ModeId::from_u128(0xbf22ad00_03ea_4690_8077_473346209b7e);
pub const MPEG1_VLD: ModeId = ModeId::from_u128(0x6f3ec719_3735_42cc_8063_65cc3cb36616);
pub const H264_F: ModeId = ModeId::from_u128(0x1b81be69_a0c7_11d3_b984_00c04f2e73c5);
pub const INTEL_H264_NO_FGT_CLEAR_VIDEO: ModeId = ModeId::from_u128(0x604f8e68_4951_4c54_88fe_abd25c15b3d6);
pub const H264_E: ModeId = ModeId::from_u128(0x1b81be68_a0c7_11d3_b984_00c04f2e73c5);
pub const H264_VLD_WITH_FMOASO_NO_FGT: ModeId = ModeId::from_u128(0xd5f04ff9_3418_45d8_9561_32a76aae2ddd);
pub const H264_VLD_NO_FGT_FLASH: ModeId = ModeId::from_u128(0x4245f676_2bbc_4166_a0bb_54e7b849c380);
pub const H264_D: ModeId = ModeId::from_u128(0x1b81be67_a0c7_11d3_b984_00c04f2e73c5);
pub const H264_C: ModeId = ModeId::from_u128(0x1b81be66_a0c7_11d3_b984_00c04f2e73c5);
pub const INTEL_H264_C: ModeId = ModeId::from_u128(0x604f8e66_4951_4c54_88fe_abd25c15b3d6);
pub const H264_B: ModeId = ModeId::from_u128(0x1b81be65_a0c7_11d3_b984_00c04f2e73c5);
pub const H264_A: ModeId = ModeId::from_u128(0x1b81be64_a0c7_11d3_b984_00c04f2e73c5);
pub const INTEL_H264_A: ModeId = ModeId::from_u128(0x604f8e64_4951_4c54_88fe_abd25c15b3d6);
pub const H264_VLD_STEREO_PROGRESSIVE_NO_FGT: ModeId = ModeId::from_u128(0xd79be8da_0cf1_4c81_b82a_69a4e236f43d);
pub const H264_VLD_STEREO_NO_FGT: ModeId = ModeId::from_u128(0xf9aaccbb_c2b6_4cfc_8779_5707b1760552);
pub const H264_VLD_MULTIVIEW_NO_FGT: ModeId = ModeId::from_u128(0x705b9d82_76cf_49d6_b7e6_ac8872db013c);
pub const H264_VLD_SVC_SCALABLE_BASELINE: ModeId = ModeId::from_u128(0xc30700c4_e384_43e0_b982_2d89ee7f77c4);
pub const H264_VLD_SVC_RESTRICTED_SCALABLE_BASELINE: ModeId = ModeId::from_u128(0x9b8175d4_d670_4cf2_a9f0_fa56df71a1ae);
pub const H264_VLD_SVC_SCALABLE_HIGH: ModeId = ModeId::from_u128(0x728012c9_66a8_422f_97e9_b5e39b51c053);
pub const H264_VLD_SVC_RESTRICTED_SCALABLE_HIGH_PROGRESSIVE: ModeId = ModeId::from_u128(0x8efa5926_bd9e_4b04_8b72_8f977dc44c36);
pub const WMV8_B: ModeId = ModeId::from_u128(0x1b81be81_a0c7_11d3_b984_00c04f2e73c5);
pub const WMV8_A: ModeId = ModeId::from_u128(0x1b81be80_a0c7_11d3_b984_00c04f2e73c5);
pub const WMV9_C: ModeId = ModeId::from_u128(0x1b81be94_a0c7_11d3_b984_00c04f2e73c5);
pub const WMV9_B: ModeId = ModeId::from_u128(0x1b81be91_a0c7_11d3_b984_00c04f2e73c5);
pub const WMV9_A: ModeId = ModeId::from_u128(0x1b81be90_a0c7_11d3_b984_00c04f2e73c5);
pub const VC1_D: ModeId = ModeId::from_u128(0x1b81bea3_a0c7_11d3_b984_00c04f2e73c5);
pub const VC1_D2010: ModeId = ModeId::from_u128(0x1b81bea4_a0c7_11d3_b984_00c04f2e73c5);
pub const INTEL_VC1_CLEAR_VIDEO_2: ModeId = ModeId::from_u128(0xe07ec519_e651_4cd6_ac84_1370cceec851);
pub const INTEL_VC1_CLEAR_VIDEO: ModeId = ModeId::from_u128(0xbcc5db6d_a2b6_4af0_ace4_adb1f787bc89);
pub const VC1_C: ModeId = ModeId::from_u128(0x1b81bea2_a0c7_11d3_b984_00c04f2e73c5);
pub const VC1_B: ModeId = ModeId::from_u128(0x1b81bea1_a0c7_11d3_b984_00c04f2e73c5);
pub const VC1_A: ModeId = ModeId::from_u128(0x1b81bea0_a0c7_11d3_b984_00c04f2e73c5);
pub const NVIDIA_MPEG4_ASP: ModeId = ModeId::from_u128(0x9947ec6f_689b_11dc_a320_0019dbbc4184);
pub const MPEG4PT2_VLD_SIMPLE: ModeId = ModeId::from_u128(0xefd64d74_c9e8_41d7_a5e9_e9b0e39fa319);
pub const MPEG4PT2_VLD_ADV_SIMPLE_NO_GMC: ModeId = ModeId::from_u128(0xed418a9f_010d_4eda_9ae3_9a65358d8d2e);
pub const MPEG4PT2_VLD_ADV_SIMPLE_GMC: ModeId = ModeId::from_u128(0xab998b5b_4258_44a9_9feb_94e597a6baae);
pub const MPEG4PT2_VLD_ADV_SIMPLE_AVIVO: ModeId = ModeId::from_u128(0x7c74adc6_e2ba_4ade_86de_30beabb40cc1);
pub const HEVC_VLD_MAIN: ModeId = ModeId::from_u128(0x5b11d51b_2f4c_4452_bcc3_09f2a1160cc0);
pub const HEVC_VLD_MAIN10: ModeId = ModeId::from_u128(0x107af0e0_ef1a_4d19_aba8_67a163073d13);
pub const H261_A: ModeId = ModeId::from_u128(0x1b81be01_a0c7_11d3_b984_00c04f2e73c5);
pub const H261_B: ModeId = ModeId::from_u128(0x1b81be02_a0c7_11d3_b984_00c04f2e73c5);
pub const H263_A: ModeId = ModeId::from_u128(0x1b81be03_a0c7_11d3_b984_00c04f2e73c5);
pub const H263_B: ModeId = ModeId::from_u128(0x1b81be04_a0c7_11d3_b984_00c04f2e73c5);
pub const H263_C: ModeId = ModeId::from_u128(0x1b81be05_a0c7_11d3_b984_00c04f2e73c5);
pub const H263_D: ModeId = ModeId::from_u128(0x1b81be06_a0c7_11d3_b984_00c04f2e73c5);
pub const H263_E: ModeId = ModeId::from_u128(0x1b81be07_a0c7_11d3_b984_00c04f2e73c5);
pub const H263_F: ModeId = ModeId::from_u128(0x1b81be08_a0c7_11d3_b984_00c04f2e73c5);
pub const VP8_VLD: ModeId = ModeId::from_u128(0x90b899ea_3a62_4705_88b3_8df04b2744e7);
pub const VP9_VLD_PROFILE0: ModeId = ModeId::from_u128(0x463707f8_a1d0_4585_876d_83aa6d60b89e);

const PROFILES_MPEG2_SIMPLE: [i32; 1] = [profiles::MPEG2_SIMPLE];
const PROFILES_MPEG2_MAIN: [i32; 2] = [profiles::MPEG2_SIMPLE, profiles::MPEG2_MAIN];
const PROFILES_H264_HIGH: [i32; 3] = [
    profiles::H264_CONSTRAINED_BASELINE,
    profiles::H264_MAIN,
    profiles::H264_HIGH,
];
const PROFILES_HEVC_MAIN: [i32; 1] = [profiles::HEVC_MAIN];
const PROFILES_HEVC_MAIN10: [i32; 2] = [profiles::HEVC_MAIN, profiles::HEVC_MAIN_10];

/// A hardware decode mode and the streams it can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeMode {
    pub name: &'static str,
    pub id: ModeId,
    /// Codec this mode decodes, or `None` for modes we never select.
    pub codec: Option<Codec>,
    /// Profiles this mode accepts, or `None` if it accepts any profile of `codec`.
    pub profiles: Option<&'static [i32]>,
}

impl DecodeMode {
    const fn new(
        name: &'static str,
        id: ModeId,
        codec: Codec,
        profiles: Option<&'static [i32]>,
    ) -> Self {
        Self {
            name,
            id,
            codec: Some(codec),
            profiles,
        }
    }

    const fn generic(name: &'static str, id: ModeId) -> Self {
        Self {
            name,
            id,
            codec: None,
            profiles: None,
        }
    }

    /// Whether this mode may be used to decode `codec`.
    pub fn decodes(&self, codec: Codec) -> bool {
        self.codec == Some(codec)
    }

    /// Whether this mode restricts the profiles it accepts.
    pub fn restricts_profiles(&self) -> bool {
        matches!(self.profiles, Some(profiles) if !profiles.is_empty())
    }
}

/// All known decode modes. Preferred modes come first.
#[rustfmt::skip]
pub static DECODE_MODES: &[DecodeMode] = &[
    // MPEG-1/2
    DecodeMode::generic("MPEG-1 decoder, restricted profile A", MPEG1_A),
    DecodeMode::generic("MPEG-2 decoder, restricted profile A", MPEG2_A),
    DecodeMode::generic("MPEG-2 decoder, restricted profile B", MPEG2_B),
    DecodeMode::generic("MPEG-2 decoder, restricted profile C", MPEG2_C),
    DecodeMode::generic("MPEG-2 decoder, restricted profile D", MPEG2_D),
    DecodeMode::new("MPEG-2 variable-length decoder", MPEG2_VLD, Codec::Mpeg2Video, Some(&PROFILES_MPEG2_SIMPLE)),
    DecodeMode::new("MPEG-2 & MPEG-1 variable-length decoder", MPEG2AND1_VLD, Codec::Mpeg2Video, Some(&PROFILES_MPEG2_MAIN)),
    DecodeMode::new("MPEG-2 & MPEG-1 variable-length decoder", MPEG2AND1_VLD, Codec::Mpeg1Video, None),
    DecodeMode::generic("MPEG-2 motion compensation", MPEG2_MO_COMP),
    DecodeMode::generic("MPEG-2 inverse discrete cosine transform", MPEG2_IDCT),

    // MPEG-1
    DecodeMode::generic("MPEG-1 variable-length decoder, no D pictures", MPEG1_VLD),

    // H.264
    DecodeMode::new("H.264 variable-length decoder, film grain technology", H264_F, Codec::H264, Some(&PROFILES_H264_HIGH)),
    DecodeMode::new("H.264 variable-length decoder, no film grain technology (Intel ClearVideo)", INTEL_H264_NO_FGT_CLEAR_VIDEO, Codec::H264, Some(&PROFILES_H264_HIGH)),
    DecodeMode::new("H.264 variable-length decoder, no film grain technology", H264_E, Codec::H264, Some(&PROFILES_H264_HIGH)),
    DecodeMode::new("H.264 variable-length decoder, no film grain technology, FMO/ASO", H264_VLD_WITH_FMOASO_NO_FGT, Codec::H264, Some(&PROFILES_H264_HIGH)),
    DecodeMode::new("H.264 variable-length decoder, no film grain technology, Flash", H264_VLD_NO_FGT_FLASH, Codec::H264, Some(&PROFILES_H264_HIGH)),
    DecodeMode::generic("H.264 inverse discrete cosine transform, film grain technology", H264_D),
    DecodeMode::generic("H.264 inverse discrete cosine transform, no film grain technology", H264_C),
    DecodeMode::generic("H.264 inverse discrete cosine transform, no film grain technology (Intel)", INTEL_H264_C),
    DecodeMode::generic("H.264 motion compensation, film grain technology", H264_B),
    DecodeMode::generic("H.264 motion compensation, no film grain technology", H264_A),
    DecodeMode::generic("H.264 motion compensation, no film grain technology (Intel)", INTEL_H264_A),

    // H.264 MVC
    DecodeMode::generic("H.264 stereo high profile, mbs flag set", H264_VLD_STEREO_PROGRESSIVE_NO_FGT),
    DecodeMode::generic("H.264 stereo high profile", H264_VLD_STEREO_NO_FGT),
    DecodeMode::generic("H.264 multiview high profile", H264_VLD_MULTIVIEW_NO_FGT),

    // H.264 SVC
    DecodeMode::generic("H.264 scalable video coding, Scalable Baseline Profile", H264_VLD_SVC_SCALABLE_BASELINE),
    DecodeMode::generic("H.264 scalable video coding, Scalable Constrained Baseline Profile", H264_VLD_SVC_RESTRICTED_SCALABLE_BASELINE),
    DecodeMode::generic("H.264 scalable video coding, Scalable High Profile", H264_VLD_SVC_SCALABLE_HIGH),
    DecodeMode::generic("H.264 scalable video coding, Scalable Constrained High Profile", H264_VLD_SVC_RESTRICTED_SCALABLE_HIGH_PROGRESSIVE),

    // WMV
    DecodeMode::generic("Windows Media Video 8 motion compensation", WMV8_B),
    DecodeMode::generic("Windows Media Video 8 post processing", WMV8_A),
    DecodeMode::generic("Windows Media Video 9 IDCT", WMV9_C),
    DecodeMode::generic("Windows Media Video 9 motion compensation", WMV9_B),
    DecodeMode::generic("Windows Media Video 9 post processing", WMV9_A),

    // VC-1
    DecodeMode::new("VC-1 variable-length decoder", VC1_D, Codec::Vc1, None),
    DecodeMode::new("VC-1 variable-length decoder", VC1_D, Codec::Wmv3, None),
    DecodeMode::new("VC-1 variable-length decoder", VC1_D2010, Codec::Vc1, None),
    DecodeMode::new("VC-1 variable-length decoder", VC1_D2010, Codec::Wmv3, None),
    DecodeMode::generic("VC-1 variable-length decoder 2 (Intel)", INTEL_VC1_CLEAR_VIDEO_2),
    DecodeMode::generic("VC-1 variable-length decoder (Intel)", INTEL_VC1_CLEAR_VIDEO),
    DecodeMode::generic("VC-1 inverse discrete cosine transform", VC1_C),
    DecodeMode::generic("VC-1 motion compensation", VC1_B),
    DecodeMode::generic("VC-1 post processing", VC1_A),

    // MPEG-4 Part 2
    DecodeMode::generic("MPEG-4 Part 2 nVidia bitstream decoder", NVIDIA_MPEG4_ASP),
    DecodeMode::generic("MPEG-4 Part 2 variable-length decoder, Simple Profile", MPEG4PT2_VLD_SIMPLE),
    DecodeMode::generic("MPEG-4 Part 2 variable-length decoder, Simple&Advanced Profile, no GMC", MPEG4PT2_VLD_ADV_SIMPLE_NO_GMC),
    DecodeMode::generic("MPEG-4 Part 2 variable-length decoder, Simple&Advanced Profile, GMC", MPEG4PT2_VLD_ADV_SIMPLE_GMC),
    DecodeMode::generic("MPEG-4 Part 2 variable-length decoder, Simple&Advanced Profile, Avivo", MPEG4PT2_VLD_ADV_SIMPLE_AVIVO),

    // HEVC
    DecodeMode::new("HEVC Main profile", HEVC_VLD_MAIN, Codec::Hevc, Some(&PROFILES_HEVC_MAIN)),
    DecodeMode::new("HEVC Main 10 profile", HEVC_VLD_MAIN10, Codec::Hevc, Some(&PROFILES_HEVC_MAIN10)),

    // H.261
    DecodeMode::generic("H.261 decoder, restricted profile A", H261_A),
    DecodeMode::generic("H.261 decoder, restricted profile B", H261_B),

    // H.263
    DecodeMode::generic("H.263 decoder, restricted profile A", H263_A),
    DecodeMode::generic("H.263 decoder, restricted profile B", H263_B),
    DecodeMode::generic("H.263 decoder, restricted profile C", H263_C),
    DecodeMode::generic("H.263 decoder, restricted profile D", H263_D),
    DecodeMode::generic("H.263 decoder, restricted profile E", H263_E),
    DecodeMode::generic("H.263 decoder, restricted profile F", H263_F),

    // VPx
    DecodeMode::generic("VP8", VP8_VLD),
    DecodeMode::new("VP9 profile 0", VP9_VLD_PROFILE0, Codec::Vp9, None),
];

/// Returns the table entry for `id`, if any.
///
/// Some identifiers appear several times in the table, once per codec; the first entry is
/// returned.
pub fn find_mode(id: &ModeId) -> Option<&'static DecodeMode> {
    DECODE_MODES.iter().find(|mode| mode.id == *id)
}

/// Returns a human-readable name for the decode mode `id`.
pub fn decoder_name(id: &ModeId) -> Cow<'static, str> {
    match find_mode(id) {
        Some(mode) => Cow::Borrowed(mode.name),
        None => Cow::Owned(format!("Unknown decoder {}", id)),
    }
}
