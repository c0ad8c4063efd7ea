// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! HEVC profile extraction from hvcC records and Annex B parameter sets.

use std::io::Cursor;

use anyhow::anyhow;
use anyhow::Context;
use bitreader::BitReader;
use bytes::Buf;
use enumn::N;

use crate::codec::nalu;
use crate::codec::nalu::Header;
use crate::codec::nalu_reader::NaluReader;

pub(crate) type Nalu<'a> = nalu::Nalu<'a, NaluHeader>;

/// Minimum size of an hvcC record, without any parameter set array.
const HVCC_HEADER_LEN: usize = 23;

#[derive(N, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NaluType {
    TrailN = 0,
    TrailR = 1,
    TsaN = 2,
    TsaR = 3,
    StsaN = 4,
    StsaR = 5,
    RadlN = 6,
    RadlR = 7,
    RaslN = 8,
    RaslR = 9,
    RsvVclN10 = 10,
    RsvVclR11 = 11,
    RsvVclN12 = 12,
    RsvVclR13 = 13,
    RsvVclN14 = 14,
    RsvVclR15 = 15,
    BlaWLp = 16,
    BlaWRadl = 17,
    BlaNLp = 18,
    IdrWRadl = 19,
    IdrNLp = 20,
    CraNut = 21,
    RsvIrapVcl22 = 22,
    RsvIrapVcl23 = 23,
    RsvVcl24 = 24,
    RsvVcl25 = 25,
    RsvVcl26 = 26,
    RsvVcl27 = 27,
    RsvVcl28 = 28,
    RsvVcl29 = 29,
    RsvVcl30 = 30,
    RsvVcl31 = 31,
    VpsNut = 32,
    SpsNut = 33,
    PpsNut = 34,
    AudNut = 35,
    EosNut = 36,
    EobNut = 37,
    FdNut = 38,
    PrefixSeiNut = 39,
    SuffixSeiNut = 40,
    RsvNvcl41 = 41,
    RsvNvcl42 = 42,
    RsvNvcl43 = 43,
    RsvNvcl44 = 44,
    RsvNvcl45 = 45,
    RsvNvcl46 = 46,
    RsvNvcl47 = 47,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NaluHeader {
    pub type_: NaluType,
    pub nuh_layer_id: u8,
    pub nuh_temporal_id_plus1: u8,
}

impl Header for NaluHeader {
    fn parse(cursor: &Cursor<&[u8]>) -> anyhow::Result<Self> {
        let data = cursor
            .chunk()
            .get(0..2)
            .ok_or(anyhow!("Broken Data"))?;
        let mut r = BitReader::new(data);

        // Skip forbidden_zero_bit
        r.skip(1)?;

        Ok(Self {
            type_: NaluType::n(r.read_u32(6)?).ok_or(anyhow!("Invalid NALU type"))?,
            nuh_layer_id: r.read_u8(6)?,
            nuh_temporal_id_plus1: r.read_u8(3)?,
        })
    }

    fn is_end(&self) -> bool {
        matches!(self.type_, NaluType::EosNut | NaluType::EobNut)
    }

    fn len(&self) -> usize {
        2
    }
}

/// The general profile fields of a profile_tier_level() structure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneralProfile {
    pub profile_space: u8,
    pub tier_flag: bool,
    pub profile_idc: u8,
    pub profile_compatibility_flags: u32,
}

impl GeneralProfile {
    fn parse(r: &mut NaluReader) -> anyhow::Result<Self> {
        let profile = GeneralProfile {
            profile_space: r.read_bits(2)?,
            tier_flag: r.read_bit()?,
            profile_idc: r.read_bits(5)?,
            ..Default::default()
        };

        let high: u32 = r.read_bits(16)?;
        let low: u32 = r.read_bits(16)?;

        Ok(GeneralProfile {
            profile_compatibility_flags: (high << 16) | low,
            ..profile
        })
    }

    /// Whether general_profile_compatibility_flag[`j`] is set.
    pub fn is_compatible_with(&self, j: u32) -> bool {
        j < 32 && self.profile_compatibility_flags & (1 << (31 - j)) != 0
    }

    /// Returns the profile identifier, falling back to the compatibility flags for streams that
    /// leave general_profile_idc unset.
    pub fn profile(&self) -> anyhow::Result<i32> {
        if self.profile_idc != 0 {
            return Ok(i32::from(self.profile_idc));
        }

        (1..32)
            .find(|j| self.is_compatible_with(*j))
            .map(|j| j as i32)
            .ok_or(anyhow!("no profile signalled"))
    }
}

/// Parses the general profile of a VPS RBSP.
fn profile_from_vps(rbsp: &[u8]) -> anyhow::Result<GeneralProfile> {
    let mut r = NaluReader::new(rbsp);

    // vps_video_parameter_set_id, vps_base_layer_internal_flag, vps_base_layer_available_flag,
    // vps_max_layers_minus1, vps_max_sub_layers_minus1, vps_temporal_id_nesting_flag and
    // vps_reserved_0xffff_16bits.
    r.skip_bits(32)?;

    GeneralProfile::parse(&mut r)
}

/// Parses the general profile of an SPS RBSP.
fn profile_from_sps(rbsp: &[u8]) -> anyhow::Result<GeneralProfile> {
    let mut r = NaluReader::new(rbsp);

    // sps_video_parameter_set_id, sps_max_sub_layers_minus1 and sps_temporal_id_nesting_flag.
    r.skip_bits(8)?;

    GeneralProfile::parse(&mut r)
}

fn profile_from_hvcc(hvcc: &[u8]) -> anyhow::Result<GeneralProfile> {
    if hvcc.len() < HVCC_HEADER_LEN {
        return Err(anyhow!("hvcC record too short ({} bytes)", hvcc.len()));
    }

    let mut r = BitReader::new(&hvcc[1..6]);
    Ok(GeneralProfile {
        profile_space: r.read_u8(2)?,
        tier_flag: r.read_bool()?,
        profile_idc: r.read_u8(5)?,
        profile_compatibility_flags: r.read_u32(32)?,
    })
}

fn profile_from_annex_b(stream: &[u8]) -> anyhow::Result<GeneralProfile> {
    let mut cursor = Cursor::new(stream);

    loop {
        let nalu = Nalu::next_known(&mut cursor).context("no VPS or SPS in Annex B stream")?;
        match nalu.header().type_ {
            NaluType::VpsNut => return profile_from_vps(nalu.payload()),
            NaluType::SpsNut => return profile_from_sps(nalu.payload()),
            _ => continue,
        }
    }
}

/// Reads the stream profile from HEVC codec configuration data, which may either be an hvcC
/// record or Annex B encoded parameter sets.
pub fn profile_from_extradata(extradata: &[u8]) -> anyhow::Result<i32> {
    // Annex B data always starts with a zero byte, while hvcC starts with configurationVersion.
    let profile = match extradata.first() {
        Some(0) => profile_from_annex_b(extradata)?,
        Some(_) => profile_from_hvcc(extradata)?,
        None => return Err(anyhow!("empty extradata")),
    };

    profile.profile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::profiles;

    #[test]
    fn hvcc_main() {
        let mut hvcc = vec![0x01, 0x01, 0x60, 0x00, 0x00, 0x00];
        hvcc.resize(HVCC_HEADER_LEN, 0);

        let profile = profile_from_hvcc(&hvcc).unwrap();
        assert_eq!(profile.profile_idc, 1);
        assert!(profile.is_compatible_with(1));
        assert!(profile.is_compatible_with(2));
        assert!(!profile.is_compatible_with(3));
        assert_eq!(profile_from_extradata(&hvcc).unwrap(), profiles::HEVC_MAIN);
    }

    #[test]
    fn hvcc_too_short() {
        assert!(profile_from_extradata(&[0x01, 0x01, 0x60]).is_err());
    }

    #[test]
    fn annex_b_sps_main10() {
        let stream = [
            0x00, 0x00, 0x00, 0x01, 0x42, 0x01, // SPS header
            0x01, // vps id, max sub layers, temporal id nesting
            0x02, 0x20, 0x00, 0x00, 0x00, // general profile: Main 10
            0x90, 0x80,
        ];

        assert_eq!(profile_from_extradata(&stream).unwrap(), profiles::HEVC_MAIN_10);
    }

    #[test]
    fn annex_b_vps_main() {
        let stream = [
            0x00, 0x00, 0x00, 0x01, 0x40, 0x01, // VPS header
            0x0c, 0x01, 0xff, 0xff, // fixed VPS fields
            0x01, 0x60, 0x00, 0x00, 0x00, // general profile: Main
            0x90, 0x80,
        ];

        assert_eq!(profile_from_extradata(&stream).unwrap(), profiles::HEVC_MAIN);
    }

    #[test]
    fn profile_from_compatibility_flags() {
        let profile = GeneralProfile {
            profile_idc: 0,
            profile_compatibility_flags: 0x2000_0000,
            ..Default::default()
        };
        assert_eq!(profile.profile().unwrap(), profiles::HEVC_MAIN_10);

        let profile = GeneralProfile::default();
        assert!(profile.profile().is_err());
    }

    #[test]
    fn annex_b_skips_unspecified_nalu_types() {
        let stream = [
            0x00, 0x00, 0x01, 0x60, 0x01, 0xff, // unspecified type 48
            0x00, 0x00, 0x00, 0x01, 0x42, 0x01, // SPS header
            0x01, // vps id, max sub layers, temporal id nesting
            0x02, 0x20, 0x00, 0x00, 0x00, // general profile: Main 10
            0x90, 0x80,
        ];

        assert_eq!(profile_from_extradata(&stream).unwrap(), profiles::HEVC_MAIN_10);
    }

    #[test]
    fn annex_b_without_parameter_sets() {
        // A lone AUD.
        let stream = [0x00, 0x00, 0x01, 0x46, 0x01, 0x50];
        assert!(profile_from_extradata(&stream).is_err());
    }
}
