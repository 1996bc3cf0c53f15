use std::net::Ipv4Addr;

use crate::checksum::checksum;
use crate::ipv4::packet::{consts, Packet, Protocol};

pub struct PacketBuilder {
    header_len: u8,
    tos: u8,
    total_len: u16,
    identification: u16,
    flags: u8,
    offset: u16,
    ttl: u8,
    protocol: Protocol,
    src_addr: Ipv4Addr,
    dest_addr: Ipv4Addr,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn header_len(mut self, header_len: u8) -> Self {
        self.header_len = header_len;
        self
    }

    pub fn tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    pub fn total_len(mut self, total_len: u16) -> Self {
        self.total_len = total_len;
        self
    }

    pub fn identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn more_fragments(mut self, more: bool) -> Self {
        if more {
            self.flags |= 0b001;
        } else {
            self.flags &= !0b001;
        }
        self
    }

    pub fn dont_fragment(mut self, dont: bool) -> Self {
        if dont {
            self.flags |= 0b010;
        } else {
            self.flags &= !0b010;
        }
        self
    }

    /// Fragment offset in 8-octet units.
    pub fn offset(mut self, offset: u16) -> Self {
        self.offset = offset;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn src_addr(mut self, src_addr: Ipv4Addr) -> Self {
        self.src_addr = src_addr;
        self
    }

    pub fn dest_addr(mut self, dest_addr: Ipv4Addr) -> Self {
        self.dest_addr = dest_addr;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build_vec(mut self) -> Vec<u8> {
        if self.total_len == 0 {
            self.total_len = ((self.header_len * 4) as usize + self.payload.len()) as u16;
        }

        let mut buffer: Vec<u8> = vec![0; (self.header_len * 4) as usize];
        buffer.append(&mut self.payload);

        let mut packet = Packet::new_unchecked(buffer.as_mut_slice());
        packet.set_version(consts::VERSION);
        packet.set_header_len(self.header_len);
        packet.set_tos(self.tos);
        packet.set_total_len(self.total_len);
        packet.set_identification(self.identification);
        packet.set_flags(self.flags);
        packet.set_offset(self.offset);
        packet.set_ttl(self.ttl);
        packet.set_protocol(self.protocol);
        packet.set_src_addr(self.src_addr);
        packet.set_dest_addr(self.dest_addr);

        let header_checksum = checksum(&packet.as_ref()[..(self.header_len * 4) as usize]);
        packet.set_checksum(header_checksum);

        buffer
    }

    pub fn build(self) -> Packet<Vec<u8>> {
        Packet::new_unchecked(self.build_vec())
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self {
            header_len: consts::MIN_HEADER_LEN,
            tos: 0,
            total_len: 0,
            identification: 0,
            flags: 0,
            offset: 0,
            ttl: 0,
            protocol: Protocol::Unknown(0),
            src_addr: Ipv4Addr::new(0, 0, 0, 0),
            dest_addr: Ipv4Addr::new(0, 0, 0, 0),
            payload: vec![],
        }
    }
}
