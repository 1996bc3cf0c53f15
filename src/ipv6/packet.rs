use std::fmt::{Debug, Formatter};
use std::net::Ipv6Addr;

use crate::error::Result;
use crate::ipv6::error::Error;

pub mod consts {
    pub const VERSION: u8 = 6;
    pub const HEADER_LEN: usize = 40;
}

pub struct Packet<Buf> {
    buffer: Buf,
}

impl<Buf> Packet<Buf>
where
    Buf: AsRef<[u8]>,
{
    pub fn new_unchecked(buffer: Buf) -> Self {
        Packet { buffer }
    }

    pub fn new_checked(buffer: Buf) -> Result<Self> {
        let packet = Self::new_unchecked(buffer);
        packet.check_version()?;
        packet.check_len()?;
        Ok(packet)
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version() != consts::VERSION {
            return Err(Error::InvalidVersion.into());
        }
        Ok(())
    }

    pub fn check_len(&self) -> Result<()> {
        let buffer_len = self.buffer.as_ref().len();

        if buffer_len < consts::HEADER_LEN {
            return Err(Error::InvalidTotalLen.into());
        }
        if consts::HEADER_LEN + self.payload_len() as usize != buffer_len {
            return Err(Error::InvalidTotalLen.into());
        }

        Ok(())
    }

    pub fn version(&self) -> u8 {
        self.buffer.as_ref()[0] >> 4
    }

    pub fn traffic_class(&self) -> u8 {
        (self.buffer.as_ref()[0] << 4) | (self.buffer.as_ref()[1] >> 4)
    }

    pub fn flow_label(&self) -> u32 {
        u32::from_be_bytes([
            0,
            self.buffer.as_ref()[1] & 0x0f,
            self.buffer.as_ref()[2],
            self.buffer.as_ref()[3],
        ])
    }

    /// Length of everything after the fixed header, extension headers
    /// included.
    pub fn payload_len(&self) -> u16 {
        u16::from_be_bytes([self.buffer.as_ref()[4], self.buffer.as_ref()[5]])
    }

    pub fn next_header(&self) -> u8 {
        self.buffer.as_ref()[6]
    }

    pub fn hop_limit(&self) -> u8 {
        self.buffer.as_ref()[7]
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.buffer.as_ref()[8..24]);
        Ipv6Addr::from(octets)
    }

    pub fn dest_addr(&self) -> Ipv6Addr {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.buffer.as_ref()[24..40]);
        Ipv6Addr::from(octets)
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[consts::HEADER_LEN..]
    }
}

impl<Buf> Packet<Buf>
where
    Buf: AsMut<[u8]>,
{
    pub fn set_version(&mut self, version: u8) {
        self.buffer.as_mut()[0] = (self.buffer.as_mut()[0] & 0x0f) | (version << 4);
    }

    pub fn set_payload_len(&mut self, payload_len: u16) {
        self.buffer.as_mut()[4..=5].copy_from_slice(payload_len.to_be_bytes().as_ref());
    }

    pub fn set_next_header(&mut self, next_header: u8) {
        self.buffer.as_mut()[6] = next_header;
    }

    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.buffer.as_mut()[7] = hop_limit;
    }

    pub fn set_src_addr(&mut self, src_addr: Ipv6Addr) {
        self.buffer.as_mut()[8..24].copy_from_slice(src_addr.octets().as_ref());
    }

    pub fn set_dest_addr(&mut self, dest_addr: Ipv6Addr) {
        self.buffer.as_mut()[24..40].copy_from_slice(dest_addr.octets().as_ref());
    }
}

impl<Buf> Debug for Packet<Buf>
where
    Buf: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "version: {:?}, payload length: {:?}, next header: {:?}, hop limit: {:?}, source address: {:?}, destination address: {:?}",
            self.version(),
            self.payload_len(),
            self.next_header(),
            self.hop_limit(),
            self.src_addr(),
            self.dest_addr()
        )
    }
}

impl<Buf> AsRef<[u8]> for Packet<Buf>
where
    Buf: AsRef<[u8]>,
{
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

impl<Buf> AsMut<[u8]> for Packet<Buf>
where
    Buf: AsMut<[u8]>,
{
    fn as_mut(&mut self) -> &mut [u8] {
        self.buffer.as_mut()
    }
}
