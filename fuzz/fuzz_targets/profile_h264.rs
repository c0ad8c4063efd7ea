#![no_main]

use hwaccel_va::codec::h264::profile_from_extradata;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = profile_from_extradata(data);
});
