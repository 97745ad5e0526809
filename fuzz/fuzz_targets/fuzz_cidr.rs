//! Fuzz testing for allow-list rule parsing and source-address resolution.
//!
//! Both functions consume attacker- or operator-supplied text and must never
//! panic, whatever the input.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_cidr -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `CidrRule::parse` and `parse_rule_list`: `ALLOWED_IPS` entries
//! - `resolve_source_address`: raw `X-Forwarded-For` values
//! - Matching never panics for any parsed rule and resolved address

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv4Addr};

use gatekeeper::gate::cidr::{parse_rule_list, resolve_source_address};
use gatekeeper::gate::CidrRule;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    rule: &'a str,
    forwarded_for: Option<&'a str>,
    peer: Option<[u8; 4]>,
}

fuzz_target!(|input: Input<'_>| {
    let _ = parse_rule_list(input.rule);

    let peer = input.peer.map(|octets| IpAddr::V4(Ipv4Addr::from(octets)));
    let resolved = resolve_source_address(input.forwarded_for, peer);

    if let Ok(rule) = CidrRule::parse(input.rule) {
        // Display output must parse back to the same rule.
        let reparsed = CidrRule::parse(&rule.to_string());
        assert_eq!(reparsed.ok(), Some(rule));

        if let Ok(address) = resolved {
            let _ = rule.matches(address);
        }
    }
});
