#![no_main]

use hwaccel_va::codec::h265::profile_from_extradata;
use hwaccel_va::codec::profile_from_extradata as stream_profile;
use hwaccel_va::Codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = profile_from_extradata(data);
    let _ = stream_profile(Codec::Hevc, data);
});
