// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt::Debug;
use std::io::Cursor;

use anyhow::anyhow;
use anyhow::Result;

pub(crate) trait Header: Sized {
    /// Parse the NALU header, returning it.
    fn parse(cursor: &Cursor<&[u8]>) -> Result<Self>;
    /// Whether this header type indicates EOS.
    fn is_end(&self) -> bool;
    /// The length of the header.
    fn len(&self) -> usize;
}

/// A NAL unit found in an Annex B byte stream.
#[derive(Debug)]
pub(crate) struct Nalu<'a, U> {
    header: U,
    /// The stream this NALU has been found in.
    data: &'a [u8],

    size: usize,
    offset: usize,
}

impl<'a, U> Nalu<'a, U>
where
    U: Debug + Header,
{
    fn find_start_code(data: &[u8], offset: usize) -> Option<usize> {
        // discard all zeroes until the start code pattern is found
        data.get(offset..)?
            .windows(3)
            .position(|window| window == [0x00, 0x00, 0x01])
    }

    /// Find the next Annex B encoded NAL unit.
    pub fn next(cursor: &mut Cursor<&'a [u8]>) -> Result<Nalu<'a, U>> {
        let data = *cursor.get_ref();
        let pos = usize::try_from(cursor.position())?;

        // Find the start code for this NALU
        let current_nalu_offset = match Self::find_start_code(data, pos) {
            Some(offset) => offset,
            None => return Err(anyhow!("No NAL found")),
        };

        // The NALU offset is its offset + 3 bytes to skip the start code.
        let nalu_offset = pos + current_nalu_offset + 3;

        // Set the bitstream position to the start of the current NALU
        cursor.set_position(u64::try_from(nalu_offset)?);

        let header = U::parse(cursor)?;

        // Find the start of the subsequent NALU.
        let mut next_nalu_offset = match Self::find_start_code(data, nalu_offset) {
            Some(offset) => offset,
            // Whatever data is left must be part of the current NALU
            None => data.len() - nalu_offset,
        };

        while next_nalu_offset > 0 && data[nalu_offset + next_nalu_offset - 1] == 0x00 {
            // Discard trailing_zero_8bits
            next_nalu_offset -= 1;
        }

        let size = if header.is_end() {
            header.len()
        } else {
            next_nalu_offset
        };

        Ok(Nalu {
            header,
            data,
            size,
            offset: nalu_offset,
        })
    }

    /// Find the next Annex B encoded NAL unit with a header `U` can parse, skipping the others.
    pub fn next_known(cursor: &mut Cursor<&'a [u8]>) -> Result<Nalu<'a, U>> {
        loop {
            let pos = cursor.position();
            match Self::next(cursor) {
                Ok(nalu) => return Ok(nalu),
                // `next` moved past the start code, so the scan resumes after this NALU.
                Err(e) if cursor.position() > pos => log::trace!("skipping NALU: {:#}", e),
                Err(e) => return Err(e),
            }
        }
    }

    /// Get a reference to the nalu's header.
    pub fn header(&self) -> &U {
        &self.header
    }

    /// The NALU contents following its header.
    pub fn payload(&self) -> &'a [u8] {
        let start = (self.offset + self.header.len()).min(self.offset + self.size);
        &self.data[start..self.offset + self.size]
    }
}
