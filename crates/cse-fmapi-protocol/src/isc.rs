//! Infrastructure (ISC) payloads: identify, background-operation status, and
//! the response message limit pair.

use crate::{get_u16, get_u64, need, DecodeError};

/// ISC Identify response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IscIdRsp {
    pub vid: u16,
    pub did: u16,
    pub svid: u16,
    pub ssid: u16,
    pub sn: u64,
    /// Max message payload size exponent: the limit is `2^max_msg_size_n`.
    pub max_msg_size_n: u8,
}

impl IscIdRsp {
    pub const WIRE_LEN: usize = 17;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(&self.vid.to_le_bytes());
        out.extend_from_slice(&self.did.to_le_bytes());
        out.extend_from_slice(&self.svid.to_le_bytes());
        out.extend_from_slice(&self.ssid.to_le_bytes());
        out.extend_from_slice(&self.sn.to_le_bytes());
        out.push(self.max_msg_size_n);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            vid: get_u16(buf, 0),
            did: get_u16(buf, 2),
            svid: get_u16(buf, 4),
            ssid: get_u16(buf, 6),
            sn: get_u64(buf, 8),
            max_msg_size_n: buf[16],
        })
    }
}

/// ISC Background Operation Status response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IscBosRsp {
    pub running: u8,
    pub pcnt: u8,
    pub opcode: u16,
    pub rc: u16,
    pub ext: u16,
}

impl IscBosRsp {
    pub const WIRE_LEN: usize = 8;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.running);
        out.push(self.pcnt);
        out.extend_from_slice(&self.opcode.to_le_bytes());
        out.extend_from_slice(&self.rc.to_le_bytes());
        out.extend_from_slice(&self.ext.to_le_bytes());
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            running: buf[0],
            pcnt: buf[1],
            opcode: get_u16(buf, 2),
            rc: get_u16(buf, 4),
            ext: get_u16(buf, 6),
        })
    }
}

/// Message response limit, used as the SET request and as both responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IscMsgLimit {
    /// Limit exponent: responses are capped at `2^limit` bytes.
    pub limit: u8,
}

impl IscMsgLimit {
    pub const WIRE_LEN: usize = 1;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.limit);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self { limit: buf[0] })
    }
}
