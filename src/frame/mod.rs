use std::fmt::{Debug, Formatter};

use crate::error::Result;
use crate::frame::error::Error;

pub mod error;

/// A frame owns one contiguous buffer and locates the link, network and
/// transport regions inside it by offset, so the regions stay valid when the
/// buffer is swapped for a larger one.
#[derive(Clone)]
pub struct Frame {
    buffer: Vec<u8>,
    pub datalink_hdr: usize,
    pub net_hdr: usize,
    pub net_len: usize,
    pub transport_hdr: usize,
    pub transport_len: usize,
    /// Raw fragmentation word: the IPv4 flags/offset field, or the IPv6
    /// Fragment extension header's offset/M field.
    pub frag: u32,
    pub proto: u8,
}

impl Frame {
    /// Allocate a zero-filled frame of `size` octets.
    pub fn alloc(size: usize) -> Result<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).map_err(|_| Error::AllocationFailed)?;
        buffer.resize(size, 0);

        Ok(Frame {
            buffer,
            datalink_hdr: 0,
            net_hdr: 0,
            net_len: 0,
            transport_hdr: 0,
            transport_len: 0,
            frag: 0,
            proto: 0,
        })
    }

    /// Wrap an already-received packet. The caller sets the region offsets.
    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        Frame {
            buffer,
            datalink_hdr: 0,
            net_hdr: 0,
            net_len: 0,
            transport_hdr: 0,
            transport_len: 0,
            frag: 0,
            proto: 0,
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut_slice()
    }

    pub fn net_bytes(&self) -> &[u8] {
        &self.buffer[self.net_hdr..self.net_hdr + self.net_len]
    }

    pub fn net_bytes_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.net_hdr, self.net_hdr + self.net_len);
        &mut self.buffer[start..end]
    }

    pub fn transport_bytes(&self) -> &[u8] {
        &self.buffer[self.transport_hdr..self.transport_hdr + self.transport_len]
    }

    pub fn transport_bytes_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.transport_hdr, self.transport_hdr + self.transport_len);
        &mut self.buffer[start..end]
    }

    /// Replace the buffer with a zero-padded copy of `new_len` octets. The
    /// stored region offsets keep their meaning against the new buffer.
    pub fn grow_to(&mut self, new_len: usize) -> Result<()> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(new_len).map_err(|_| Error::AllocationFailed)?;
        buffer.extend_from_slice(self.buffer.as_slice());
        buffer.resize(new_len, 0);

        self.buffer = buffer;
        Ok(())
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "buffer length: {:?}, net header: {:?}+{:?}, transport: {:?}+{:?}, frag: {:#x}, protocol: {:?}",
            self.buffer.len(),
            self.net_hdr,
            self.net_len,
            self.transport_hdr,
            self.transport_len,
            self.frag,
            self.proto
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;

    #[test]
    fn alloc_zeroed() {
        let frame = Frame::alloc(64).unwrap();
        assert_eq!(frame.buffer_len(), 64);
        assert_eq!(frame.bytes(), vec![0u8; 64].as_slice());
    }

    #[test]
    fn grow_preserves_contents_and_offsets() {
        let mut frame = Frame::alloc(16).unwrap();
        frame.net_hdr = 2;
        frame.net_len = 4;
        frame.bytes_mut()[2..6].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        frame.grow_to(64).unwrap();

        assert_eq!(frame.buffer_len(), 64);
        assert_eq!(frame.net_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&frame.bytes()[16..], vec![0u8; 48].as_slice());
    }
}
