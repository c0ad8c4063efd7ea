// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! H.264 profile extraction from avcC records and Annex B parameter sets.

use std::io::Cursor;

use anyhow::anyhow;
use anyhow::Context;
use byteorder::BigEndian;
use byteorder::ByteOrder;
use bytes::Buf;
use enumn::N;

use crate::codec::nalu;
use crate::codec::nalu::Header;
use crate::codec::nalu_reader::NaluReader;
use crate::codec::profiles;

pub(crate) type Nalu<'a> = nalu::Nalu<'a, NaluHeader>;

/// Size of the fixed part of an avcC record, before the first SPS length.
const AVCC_HEADER_LEN: usize = 6;

#[derive(N, Debug, PartialEq, Eq, Clone, Copy)]
pub enum NaluType {
    Unknown = 0,
    Slice = 1,
    SliceDpa = 2,
    SliceDpb = 3,
    SliceDpc = 4,
    SliceIdr = 5,
    Sei = 6,
    Sps = 7,
    Pps = 8,
    AuDelimiter = 9,
    SeqEnd = 10,
    StreamEnd = 11,
    FillerData = 12,
    SpsExt = 13,
    PrefixUnit = 14,
    SubsetSps = 15,
    DepthSps = 16,
    SliceAux = 19,
    SliceExt = 20,
    SliceDepth = 21,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaluHeader {
    pub ref_idc: u8,
    pub type_: NaluType,
}

impl Header for NaluHeader {
    fn parse(cursor: &Cursor<&[u8]>) -> anyhow::Result<Self> {
        if !cursor.has_remaining() {
            return Err(anyhow!("Broken Data"));
        }

        let byte = cursor.chunk()[0];
        let type_ = NaluType::n(byte & 0x1f).ok_or(anyhow!("Broken Data"))?;
        let ref_idc = (byte & 0x60) >> 5;

        Ok(NaluHeader { ref_idc, type_ })
    }

    fn is_end(&self) -> bool {
        matches!(self.type_, NaluType::SeqEnd | NaluType::StreamEnd)
    }

    fn len(&self) -> usize {
        1
    }
}

/// Profile-related fields found at the start of every SPS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpsProfile {
    pub profile_idc: u8,
    pub constraint_set0_flag: bool,
    pub constraint_set1_flag: bool,
    pub constraint_set2_flag: bool,
    pub constraint_set3_flag: bool,
    pub level_idc: u8,
}

impl SpsProfile {
    /// Parses the leading fields of an SPS RBSP, i.e. the NALU contents after its header.
    pub fn parse(rbsp: &[u8]) -> anyhow::Result<Self> {
        let mut r = NaluReader::new(rbsp);
        let profile = SpsProfile {
            profile_idc: r.read_bits(8)?,
            constraint_set0_flag: r.read_bit()?,
            constraint_set1_flag: r.read_bit()?,
            constraint_set2_flag: r.read_bit()?,
            constraint_set3_flag: r.read_bit()?,
            ..Default::default()
        };

        // constraint_set4_flag, constraint_set5_flag and reserved_zero_2bits
        r.skip_bits(4)?;

        Ok(SpsProfile {
            level_idc: r.read_bits(8)?,
            ..profile
        })
    }

    /// Returns the profile identifier this SPS signals.
    pub fn profile(&self) -> i32 {
        let profile = i32::from(self.profile_idc);
        if profile == profiles::H264_BASELINE && self.constraint_set1_flag {
            profiles::H264_CONSTRAINED_BASELINE
        } else {
            profile
        }
    }
}

/// Returns the first SPS found in an avcC record.
fn sps_from_avcc(avcc: &[u8]) -> anyhow::Result<SpsProfile> {
    if avcc.len() < AVCC_HEADER_LEN {
        return Err(anyhow!("avcC record too short ({} bytes)", avcc.len()));
    }

    let num_sps = avcc[5] & 0x1f;
    if num_sps == 0 {
        // No parameter set, but the record repeats the SPS profile fields.
        return Ok(SpsProfile {
            profile_idc: avcc[1],
            constraint_set0_flag: avcc[2] & 0x80 != 0,
            constraint_set1_flag: avcc[2] & 0x40 != 0,
            constraint_set2_flag: avcc[2] & 0x20 != 0,
            constraint_set3_flag: avcc[2] & 0x10 != 0,
            level_idc: avcc[3],
        });
    }

    let sps_data = &avcc[AVCC_HEADER_LEN..];
    if sps_data.len() < 2 {
        return Err(anyhow!("avcC record truncated before SPS length"));
    }
    let sps_len = usize::from(BigEndian::read_u16(sps_data));
    let sps = sps_data
        .get(2..2 + sps_len)
        .ok_or(anyhow!("avcC SPS of {} bytes is truncated", sps_len))?;

    let header = NaluHeader::parse(&Cursor::new(sps))?;
    if header.type_ != NaluType::Sps {
        return Err(anyhow!("expected SPS in avcC record, got {:?}", header.type_));
    }

    SpsProfile::parse(&sps[header.len()..])
}

/// Returns the first SPS found in an Annex B byte stream.
fn sps_from_annex_b(stream: &[u8]) -> anyhow::Result<SpsProfile> {
    let mut cursor = Cursor::new(stream);

    loop {
        let nalu = Nalu::next_known(&mut cursor).context("no SPS in Annex B stream")?;
        if nalu.header().type_ == NaluType::Sps {
            return SpsProfile::parse(nalu.payload());
        }
    }
}

/// Reads the stream profile from H.264 codec configuration data, which may either be an avcC
/// record or Annex B encoded parameter sets.
pub fn profile_from_extradata(extradata: &[u8]) -> anyhow::Result<i32> {
    let sps = match extradata.first() {
        Some(1) => sps_from_avcc(extradata)?,
        Some(_) => sps_from_annex_b(extradata)?,
        None => return Err(anyhow!("empty extradata")),
    };

    Ok(sps.profile())
}
