//! An IP datagram reassembly engine: feeds on IPv4 (RFC 791) and IPv6
//! (RFC 2460) fragments, tracks the missing ranges with the hole algorithm
//! of RFC 815, and hands each reconstructed datagram upward exactly once.

pub mod c_like_enum;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod ipv4;
pub mod ipv6;
pub mod reassembly;
