//! Fuzz target: SSDP request parsing
//!
//! Arbitrary datagrams must never panic the responder, and anything it
//! answers must be a well-formed node search.
//!
//! cargo fuzz run fuzz_ssdp

#![no_main]

use libfuzzer_sys::fuzz_target;
use propnode::adapters::ssdp::{self, SsdpRequest};

fuzz_target!(|data: &[u8]| {
    if ssdp::respond_to(data).is_some() {
        let text = core::str::from_utf8(data).unwrap();
        let request = SsdpRequest::parse(text).unwrap();
        assert_eq!(request.method, "M-SEARCH");
        assert_eq!(request.header("st"), Some(ssdp::SEARCH_TARGET));
    }
});
