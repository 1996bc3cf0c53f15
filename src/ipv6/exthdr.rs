use crate::c_like_enum;
use crate::ipv6::error::Error;
use crate::ipv6::packet::consts::HEADER_LEN;

c_like_enum!(
    /// Next Header values the reassembly path has to recognize: the
    /// extension headers of RFC 2460/4302/4303 plus the upper-layer
    /// protocols that terminate a chain.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum NextHeader(u8) {
        HopByHop = 0,
        Tcp = 6,
        Udp = 17,
        Routing = 43,
        Fragment = 44,
        Esp = 50,
        Auth = 51,
        Icmpv6 = 58,
        NoNextHeader = 59,
        DestinationOptions = 60,
    }
);

/// Fragment extension header (RFC 2460 section 4.5): next header, reserved
/// octet, 13-bit offset in 8-octet units plus the M flag, 32-bit
/// identification.
pub struct FragmentHeader<Buf> {
    buffer: Buf,
}

pub const FRAGMENT_HEADER_LEN: usize = 8;

impl<Buf> FragmentHeader<Buf>
where
    Buf: AsRef<[u8]>,
{
    pub fn new_unchecked(buffer: Buf) -> Self {
        FragmentHeader { buffer }
    }

    pub fn next_header(&self) -> u8 {
        self.buffer.as_ref()[0]
    }

    /// The raw 16-bit offset/flags word, host order.
    pub fn frag_word(&self) -> u16 {
        u16::from_be_bytes([self.buffer.as_ref()[2], self.buffer.as_ref()[3]])
    }

    /// Fragment offset in octets.
    pub fn offset(&self) -> u16 {
        self.frag_word() & 0xfff8
    }

    pub fn more_fragments(&self) -> bool {
        self.frag_word() & 0x0001 != 0
    }

    pub fn identification(&self) -> u32 {
        u32::from_be_bytes([
            self.buffer.as_ref()[4],
            self.buffer.as_ref()[5],
            self.buffer.as_ref()[6],
            self.buffer.as_ref()[7],
        ])
    }
}

impl<Buf> FragmentHeader<Buf>
where
    Buf: AsMut<[u8]>,
{
    pub fn set_next_header(&mut self, next_header: u8) {
        self.buffer.as_mut()[0] = next_header;
    }

    /// `offset` is in octets and must be a multiple of 8.
    pub fn set_offset_and_more(&mut self, offset: u16, more: bool) {
        let word = (offset & 0xfff8) | more as u16;
        self.buffer.as_mut()[2..=3].copy_from_slice(word.to_be_bytes().as_ref());
    }

    pub fn set_identification(&mut self, identification: u32) {
        self.buffer.as_mut()[4..=7].copy_from_slice(identification.to_be_bytes().as_ref());
    }
}

/// Walks the extension chain of `packet` (a full IPv6 packet, fixed header
/// first) and returns the offset of the Fragment header, or `None` when the
/// chain reaches an upper-layer protocol without one.
pub fn locate_fragment(packet: &[u8]) -> Result<Option<usize>, Error> {
    if packet.len() < HEADER_LEN {
        return Err(Error::TruncatedExtensionChain);
    }

    let mut next = packet[6];
    let mut idx = HEADER_LEN;
    let mut next_slot = 6;
    loop {
        match NextHeader::from(next) {
            NextHeader::Fragment => return Ok(Some(idx)),
            NextHeader::Tcp | NextHeader::Udp | NextHeader::Icmpv6 | NextHeader::NoNextHeader => {
                return Ok(None);
            }
            NextHeader::HopByHop
            | NextHeader::Routing
            | NextHeader::Esp
            | NextHeader::Auth
            | NextHeader::DestinationOptions => {
                if idx + 2 > packet.len() {
                    return Err(Error::TruncatedExtensionChain);
                }
                let block_len = (packet[idx + 1] as usize + 1) * 8;
                if idx + block_len > packet.len() {
                    return Err(Error::TruncatedExtensionChain);
                }
                next = packet[idx];
                next_slot = idx;
                idx += block_len;
            }
            NextHeader::Unknown(value) => {
                return Err(Error::UnrecognizedNextHeader {
                    value,
                    pointer: next_slot as u32,
                });
            }
        }
    }
}

/// Result of [`copy_without_fragment`]: how many extension octets were
/// written after the destination's fixed header, and the upper-layer
/// protocol the rewritten chain ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopiedChain {
    pub ext_len: usize,
    pub proto: u8,
}

/// Copies the extension chain of `src` into `dst`, deleting the Fragment
/// header: every other extension block is copied verbatim and its type is
/// written into the previous Next Header slot of the destination, so after
/// the walk the chain reads as if the datagram had never been fragmented.
/// Both slices start at the IPv6 fixed header; the destination's fixed
/// header must already be in place.
pub fn copy_without_fragment(dst: &mut [u8], src: &[u8]) -> Result<CopiedChain, Error> {
    if src.len() < HEADER_LEN || dst.len() < HEADER_LEN {
        return Err(Error::TruncatedExtensionChain);
    }

    let mut next = src[6];
    let mut src_idx = HEADER_LEN;
    let mut dst_idx = HEADER_LEN;
    // where the type of the element under inspection gets written
    let mut dst_next_slot = 6;
    let mut src_next_slot = 6;

    loop {
        match NextHeader::from(next) {
            NextHeader::HopByHop
            | NextHeader::Routing
            | NextHeader::Esp
            | NextHeader::Auth
            | NextHeader::DestinationOptions => {
                if src_idx + 2 > src.len() {
                    return Err(Error::TruncatedExtensionChain);
                }
                let block_len = (src[src_idx + 1] as usize + 1) * 8;
                if src_idx + block_len > src.len() || dst_idx + block_len > dst.len() {
                    return Err(Error::TruncatedExtensionChain);
                }

                dst[dst_idx..dst_idx + block_len].copy_from_slice(&src[src_idx..src_idx + block_len]);
                dst[dst_next_slot] = next;
                dst_next_slot = dst_idx;
                src_next_slot = src_idx;

                next = src[src_idx];
                src_idx += block_len;
                dst_idx += block_len;
            }
            NextHeader::Fragment => {
                if src_idx + FRAGMENT_HEADER_LEN > src.len() {
                    return Err(Error::TruncatedExtensionChain);
                }
                // skipped in the destination; the previous Next Header slot
                // is left for the element that follows
                next = src[src_idx];
                src_next_slot = src_idx;
                src_idx += FRAGMENT_HEADER_LEN;
            }
            NextHeader::Tcp | NextHeader::Udp | NextHeader::Icmpv6 | NextHeader::NoNextHeader => {
                dst[dst_next_slot] = next;
                return Ok(CopiedChain {
                    ext_len: dst_idx - HEADER_LEN,
                    proto: next,
                });
            }
            NextHeader::Unknown(value) => {
                return Err(Error::UnrecognizedNextHeader {
                    value,
                    pointer: src_next_slot as u32,
                });
            }
        }
    }
}
