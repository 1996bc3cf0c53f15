pub mod error;
pub mod exthdr;
pub mod packet;
