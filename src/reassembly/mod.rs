//! Reconstructs fragmented IP datagrams (RFC 791, RFC 2460) with the hole
//! bookkeeping of RFC 815. Fragments of both address families share one
//! table, one arrival routine and one expiry sweep.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{Duration, Utc};
use log::{debug, error, trace};
use timer::{Guard, Timer};

use crate::checksum::checksum;
use crate::error::Result;
use crate::frame::Frame;
use crate::ipv4::packet::Packet as Ipv4Packet;
use crate::ipv6::error::Error as Ipv6Error;
use crate::ipv6::exthdr::{self, FragmentHeader, FRAGMENT_HEADER_LEN};
use crate::ipv6::packet::consts as ipv6_consts;
use crate::ipv6::packet::Packet as Ipv6Packet;
use crate::reassembly::record::{AddrPair, DatagramKey, FragmentRecord};

pub mod hole;
pub mod record;

pub mod consts {
    /// An incomplete datagram is abandoned this long after its first-seen
    /// fragment. First fragment wins; later arrivals do not refresh it.
    pub const REASSEMBLY_TIMEOUT_MS: u64 = 60_000;
    /// The sweep first fires this long after the table becomes non-empty.
    pub const SWEEP_DELAY_MS: i64 = 1_000;
    /// Refire interval of the sweep while the table stays non-empty.
    pub const SWEEP_INTERVAL_MS: i64 = 3_000;
    /// Initial payload capacity of a reassembly buffer.
    pub const DEFAULT_MTU: usize = 1500;
    /// Extra capacity absorbing IPv4 options or IPv6 extension headers.
    pub const MAX_OPTIONS_LEN: usize = 64;
    /// Stand-in upper bound for the still unknown tail of a datagram
    /// (RFC 815): larger than any reassembly the engine is sized for, and
    /// below 2^16.
    pub const INFINITY: u16 = 55_555;
    /// No fragment may claim payload octets past this extent.
    pub const MAX_DATAGRAM_LEN: u32 = 65_535;

    /// ICMPv6 Parameter Problem codes (RFC 4443)
    pub const PARAMPROB_HEADER_FIELD: u8 = 0;
    pub const PARAMPROB_NEXT_HEADER: u8 = 1;
}

/// Upward delivery of completed datagrams. Validation of upper-layer
/// checksums is this sink's concern; the engine recomputes only the outer
/// IPv4 header checksum.
pub trait Transport {
    fn receive(&mut self, frame: Frame, proto: u8);
}

/// Outbound ICMP notifications the engine is obliged to request.
pub trait Icmp {
    fn parameter_problem(&mut self, frame: &Frame, code: u8, pointer: u32);
    fn time_exceeded_reassembly(&mut self, frame: &Frame);
}

/// Monotonic millisecond clock driving the reassembly deadlines.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

pub struct MonotonicClock {
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { started: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

enum Arrival {
    Pending,
    Complete,
    Abandoned,
}

struct Inner {
    records: BTreeMap<DatagramKey, FragmentRecord>,
    sweep_guard: Option<Guard>,
    clock: Box<dyn Clock + Send>,
    transport: Box<dyn Transport + Send>,
    icmp: Box<dyn Icmp + Send>,
}

/// The reassembly engine. One instance owns one fragment table and at most
/// one armed sweep; independent instances do not share state.
pub struct Reassembler {
    task_timer: Timer,
    inner: Arc<Mutex<Inner>>,
}

impl Reassembler {
    pub fn new(transport: Box<dyn Transport + Send>, icmp: Box<dyn Icmp + Send>) -> Self {
        Self::with_clock(transport, icmp, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        transport: Box<dyn Transport + Send>,
        icmp: Box<dyn Icmp + Send>,
        clock: Box<dyn Clock + Send>,
    ) -> Self {
        Self {
            task_timer: Timer::new(),
            inner: Arc::new(Mutex::new(Inner {
                records: BTreeMap::new(),
                sweep_guard: None,
                clock,
                transport,
                icmp,
            })),
        }
    }

    /// Feeds one received IPv4 packet through reassembly. `Some(frame)`
    /// hands the frame back to the caller for further processing (it was
    /// not a fragment); `None` means its payload has been absorbed or
    /// rejected and the caller is done with it.
    pub fn process_v4(&self, frame: Frame, proto: u8) -> Option<Frame> {
        let (offset, more, key) = {
            let header = Ipv4Packet::new_unchecked(frame.net_bytes());
            (
                header.offset() << 3,
                header.more_fragments(),
                DatagramKey {
                    frag_id: u32::from(header.identification()),
                    proto,
                    addrs: AddrPair::V4 {
                        src: header.src_addr(),
                        dst: header.dest_addr(),
                    },
                },
            )
        };

        if offset == 0 && !more {
            // not a fragment; the caller keeps the frame
            return Some(frame);
        }

        if frame.transport_len == 0 {
            debug!("dropping empty fragment of id {:#x}", key.frag_id);
            return None;
        }
        if u32::from(offset) + frame.transport_len as u32 > consts::MAX_DATAGRAM_LEN {
            debug!("dropping overlong fragment of id {:#x}", key.frag_id);
            return None;
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.records.contains_key(&key) {
            match new_v4_record(key, &frame, proto) {
                Ok(record) => {
                    inner.records.insert(key, record);
                }
                Err(e) => {
                    error!("no resources to reassemble id {:#x}: {}", key.frag_id, e);
                    return None;
                }
            }
        }

        inner.fragment_arrived(key, &frame, offset, more);
        self.arm_sweep_if_idle(&mut inner);
        None
    }

    /// Feeds one received IPv6 packet carrying a Fragment extension header.
    /// This adapter never hands the frame back: an atomic fragment is
    /// delivered to the transport sink directly, everything else is
    /// absorbed or rejected.
    pub fn process_v6(&self, frame: Frame, proto: u8) {
        let packet_start = frame.net_hdr;

        let frag_idx = match exthdr::locate_fragment(&frame.bytes()[packet_start..]) {
            Ok(Some(idx)) => idx,
            Ok(None) => {
                // nothing to reassemble
                self.inner.lock().unwrap().deliver(frame, proto);
                return;
            }
            Err(e) => {
                self.reject_v6(&frame, e);
                return;
            }
        };

        let (offset, more, key) = {
            let bytes = &frame.bytes()[packet_start..];
            let frag_header = FragmentHeader::new_unchecked(&bytes[frag_idx..frag_idx + FRAGMENT_HEADER_LEN]);
            let header = Ipv6Packet::new_unchecked(bytes);
            (
                frag_header.offset(),
                frag_header.more_fragments(),
                DatagramKey {
                    frag_id: frag_header.identification(),
                    proto,
                    addrs: AddrPair::V6 {
                        src: header.src_addr(),
                        dst: header.dest_addr(),
                    },
                },
            )
        };

        if offset == 0 && !more {
            self.inner.lock().unwrap().deliver(frame, proto);
            return;
        }

        if frame.transport_len == 0 {
            let mut inner = self.inner.lock().unwrap();
            inner
                .icmp
                .parameter_problem(&frame, consts::PARAMPROB_HEADER_FIELD, 4);
            return;
        }
        if u32::from(offset) + frame.transport_len as u32 > consts::MAX_DATAGRAM_LEN {
            debug!("dropping overlong fragment of id {:#x}", key.frag_id);
            return;
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.records.contains_key(&key) {
            let mut record = match new_v6_record(key, &frame, proto) {
                Ok(record) => record,
                Err(e) => {
                    error!("no resources to reassemble id {:#x}: {}", key.frag_id, e);
                    return;
                }
            };

            // seed the unfragmentable extension chain, with the Fragment
            // header deleted
            let net_hdr = record.frame.net_hdr;
            let copied = {
                let src = &frame.bytes()[packet_start..];
                let dst = &mut record.frame.bytes_mut()[net_hdr..];
                exthdr::copy_without_fragment(dst, src)
            };
            match copied {
                Ok(chain) => {
                    record.frame.transport_hdr = net_hdr + ipv6_consts::HEADER_LEN + chain.ext_len;
                    inner.records.insert(key, record);
                }
                Err(e) => {
                    drop(inner);
                    self.reject_v6(&frame, e);
                    return;
                }
            }
        }

        inner.fragment_arrived(key, &frame, offset, more);
        self.arm_sweep_if_idle(&mut inner);
    }

    fn reject_v6(&self, frame: &Frame, error: Ipv6Error) {
        match error {
            Ipv6Error::UnrecognizedNextHeader { value, pointer } => {
                debug!("unrecognized next header {} in fragment chain", value);
                self.inner
                    .lock()
                    .unwrap()
                    .icmp
                    .parameter_problem(frame, consts::PARAMPROB_NEXT_HEADER, pointer);
            }
            other => debug!("dropping malformed fragment: {}", other),
        }
    }

    fn arm_sweep_if_idle(&self, inner: &mut Inner) {
        if inner.sweep_guard.is_some() || inner.records.is_empty() {
            return;
        }

        let shared = Arc::clone(&self.inner);
        let guard = self.task_timer.schedule(
            Utc::now() + Duration::milliseconds(consts::SWEEP_DELAY_MS),
            Some(Duration::milliseconds(consts::SWEEP_INTERVAL_MS)),
            move || {
                let mut inner = shared.lock().unwrap();
                let now = inner.clock.now_ms();
                inner.sweep(now);
            },
        );
        inner.sweep_guard = Some(guard);
    }
}

impl Inner {
    /// Steps shared by both address families once a record exists: seed the
    /// holes on first arrival, close the tail on the terminal fragment,
    /// copy the payload, rebalance the holes, and deliver when none remain.
    fn fragment_arrived(&mut self, key: DatagramKey, frame: &Frame, offset: u16, more: bool) {
        let now = self.clock.now_ms();

        let arrival = {
            let record = match self.records.get_mut(&key) {
                Some(record) => record,
                None => return,
            };

            if record.holes.is_empty() {
                // first fragment of this datagram
                record.holes.seed();
                record.expire_at = now + consts::REASSEMBLY_TIMEOUT_MS;
                trace!("new reassembly of id {:#x}", key.frag_id);
            }
            if offset == 0 {
                record.got_first = true;
            }

            let last_octet = (u32::from(offset) + frame.transport_len as u32 - 1) as u16;

            if !more {
                // the terminal fragment fixes the datagram length
                record.holes.close_tail(last_octet);
                record.frame.transport_len = offset as usize + frame.transport_len;
            }

            match record.copy_payload(frame, offset) {
                Err(e) => {
                    error!("buffer regrowth failed, abandoning id {:#x}: {}", key.frag_id, e);
                    Arrival::Abandoned
                }
                Ok(()) => {
                    record.holes.update(offset, last_octet, more);
                    trace!("id {:#x} holes: {:?}", key.frag_id, record.holes.holes());
                    if record.holes.is_empty() {
                        Arrival::Complete
                    } else {
                        Arrival::Pending
                    }
                }
            }
        };

        match arrival {
            Arrival::Pending => {}
            Arrival::Abandoned => {
                self.records.remove(&key);
            }
            Arrival::Complete => {
                if let Some(record) = self.records.remove(&key) {
                    let frame = finalize(record);
                    debug!(
                        "datagram id {:#x} complete, {} transport octets",
                        key.frag_id, frame.transport_len
                    );
                    self.deliver(frame, key.proto);
                }
            }
        }
    }

    fn deliver(&mut self, mut frame: Frame, proto: u8) {
        frame.proto = proto;
        self.transport.receive(frame, proto);
    }

    /// Removes every record whose deadline passed. Runs from the timer
    /// callback and re-scans the table rather than holding references into
    /// it. Finding the table empty disarms the sweep.
    fn sweep(&mut self, now: u64) {
        let expired: Vec<DatagramKey> = self
            .records
            .iter()
            .filter(|(_, record)| record.expire_at < now)
            .map(|(key, _)| *key)
            .collect();

        for key in expired {
            if let Some(record) = self.records.remove(&key) {
                debug!("reassembly of id {:#x} timed out", key.frag_id);
                if record.got_first {
                    self.icmp.time_exceeded_reassembly(&record.frame);
                }
            }
        }

        if self.records.is_empty() {
            // the next first fragment re-arms
            self.sweep_guard = None;
        }
    }
}

/// A new record for an IPv4 datagram: the link and network headers of the
/// first-seen fragment are copied in, with the fragmentation fields cleared
/// so the stored header describes the reassembled datagram.
fn new_v4_record(key: DatagramKey, frame: &Frame, proto: u8) -> Result<FragmentRecord> {
    let link_len = frame.net_hdr - frame.datalink_hdr;
    let mut record = FragmentRecord::alloc(
        key,
        link_len,
        frame.net_len,
        consts::DEFAULT_MTU + consts::MAX_OPTIONS_LEN,
    )?;

    let prefix_len = link_len + frame.net_len;
    record.frame.bytes_mut()[..prefix_len]
        .copy_from_slice(&frame.bytes()[frame.datalink_hdr..frame.datalink_hdr + prefix_len]);

    Ipv4Packet::new_unchecked(record.frame.net_bytes_mut()).clear_fragmentation();
    record.frame.frag = 0;
    record.frame.proto = proto;
    Ok(record)
}

/// A new record for an IPv6 datagram: the link header and fixed IPv6 header
/// are copied in; the caller follows up with the extension-chain copy,
/// which also determines where the transport payload begins.
fn new_v6_record(key: DatagramKey, frame: &Frame, proto: u8) -> Result<FragmentRecord> {
    let link_len = frame.net_hdr - frame.datalink_hdr;
    let mut record = FragmentRecord::alloc(
        key,
        link_len,
        ipv6_consts::HEADER_LEN,
        consts::DEFAULT_MTU + consts::MAX_OPTIONS_LEN,
    )?;

    let prefix_len = link_len + ipv6_consts::HEADER_LEN;
    record.frame.bytes_mut()[..prefix_len]
        .copy_from_slice(&frame.bytes()[frame.datalink_hdr..frame.datalink_hdr + prefix_len]);

    record.frame.frag = 0;
    record.frame.proto = proto;
    Ok(record)
}

/// Rewrites the stored network header to describe the finished datagram:
/// real length fields, and for IPv4 a fresh header checksum (IPv6 has
/// none).
fn finalize(mut record: FragmentRecord) -> Frame {
    match record.key.addrs {
        AddrPair::V4 { .. } => {
            let total_len = (record.frame.net_len + record.frame.transport_len) as u16;
            let mut header = Ipv4Packet::new_unchecked(record.frame.net_bytes_mut());
            header.set_total_len(total_len);
            header.clear_fragmentation();
            header.set_checksum(0);

            let header_checksum = checksum(record.frame.net_bytes());
            Ipv4Packet::new_unchecked(record.frame.net_bytes_mut()).set_checksum(header_checksum);
        }
        AddrPair::V6 { .. } => {
            let ext_len = record.frame.transport_hdr - record.frame.net_hdr - ipv6_consts::HEADER_LEN;
            let payload_len = (ext_len + record.frame.transport_len) as u16;
            Ipv6Packet::new_unchecked(record.frame.net_bytes_mut()).set_payload_len(payload_len);
        }
    }
    record.frame
}
