// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Selection of the hardware decode mode to use for a stream.
//!
//! The platform reports the set of decode modes it supports. [`select_mode`] walks
//! [`DECODE_MODES`] in preference order and picks the first mode that decodes the requested codec,
//! is supported by the platform, accepts the stream's profile, and for which the platform agrees
//! to produce the requested output. Table order is the only tie-break.

use thiserror::Error;

use crate::codec;
use crate::mode::decoder_name;
use crate::mode::DecodeMode;
use crate::mode::ModeId;
use crate::mode::DECODE_MODES;
use crate::Codec;
use crate::StreamFormat;
use crate::VideoFormat;

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("no input format found for hardware acceleration")]
    NoInputModes,
    #[error("unsupported profile {profile} for {mode}")]
    UnsupportedProfile { profile: i32, mode: &'static str },
    #[error("no supported decode mode found for {0:?}")]
    NotFound(Codec),
    #[error("failed to retrieve the supported decode modes")]
    ModeList(#[source] anyhow::Error),
}

/// Returns the profile to match against mode restrictions for `format`.
///
/// The profile found in the codec configuration data takes precedence over the one signalled by
/// the container. A value `<= 0` means the profile is unknown.
pub fn stream_profile(format: &StreamFormat) -> i32 {
    codec::profile_from_extradata(format.codec, &format.extradata).unwrap_or(format.profile)
}

/// Checks whether `mode` accepts streams of `profile`.
///
/// Modes without a profile restriction accept everything. An unknown profile (`<= 0`) is
/// accepted by every mode.
pub fn check_profile(mode: &DecodeMode, profile: i32) -> Result<(), NegotiationError> {
    let profiles = match mode.profiles {
        Some(profiles) if !profiles.is_empty() => profiles,
        _ => return Ok(()),
    };

    if profile <= 0 || profiles.contains(&profile) {
        Ok(())
    } else {
        Err(NegotiationError::UnsupportedProfile {
            profile,
            mode: mode.name,
        })
    }
}

/// Selects the decode mode to use for `format` among the `supported` ones.
///
/// `confirm` is called with each acceptable candidate, in preference order, and the geometry of
/// the output to produce. The first candidate it accepts is returned. A refusal is not fatal: the
/// next candidate is tried.
pub fn select_mode<F>(
    format: &StreamFormat,
    supported: &[ModeId],
    mut confirm: F,
) -> Result<&'static DecodeMode, NegotiationError>
where
    F: FnMut(&DecodeMode, &VideoFormat) -> anyhow::Result<()>,
{
    if supported.is_empty() {
        log::warn!("No input format found for HWAccel");
        return Err(NegotiationError::NoInputModes);
    }

    for id in supported {
        log::debug!("- '{}' is supported by hardware", decoder_name(id));
    }

    let profile = stream_profile(format);

    for mode in DECODE_MODES.iter().filter(|mode| mode.decodes(format.codec)) {
        if !supported.contains(&mode.id) {
            continue;
        }

        if let Err(e) = check_profile(mode, profile) {
            log::warn!("{}", e);
            continue;
        }

        log::debug!("Trying to use '{}' as input", mode.name);
        match confirm(mode, &format.video) {
            Ok(()) => {
                log::info!("Selected decode mode '{}' ({})", mode.name, mode.id);
                return Ok(mode);
            }
            Err(e) => log::debug!("Output setup failed for '{}': {:#}", mode.name, e),
        }
    }

    Err(NegotiationError::NotFound(format.codec))
}
