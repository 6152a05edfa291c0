//! MLD port (MPC) payloads: per-LD config-space access, the bounded memory
//! pass-through, and the management-command tunnel.

use crate::{get_u16, get_u64, need, DecodeError, FM_MAX_MEM_XFER};

/// MPC LD CXL.io Configuration request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpcCfgReq {
    pub ppid: u8,
    pub ldid: u16,
    pub reg: u8,
    pub ext: u8,
    pub fdbe: u8,
    pub r#type: u8,
    pub data: [u8; 4],
}

impl MpcCfgReq {
    pub const WIRE_LEN: usize = 10;

    pub fn register(&self) -> u16 {
        (u16::from(self.ext) << 8) | u16::from(self.reg)
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ppid);
        out.extend_from_slice(&self.ldid.to_le_bytes());
        out.push(self.reg);
        out.push((self.fdbe << 4) | (self.ext & 0x0F));
        out.push(self.r#type);
        out.extend_from_slice(&self.data);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            ppid: buf[0],
            ldid: get_u16(buf, 1),
            reg: buf[3],
            ext: buf[4] & 0x0F,
            fdbe: buf[4] >> 4,
            r#type: buf[5],
            data: [buf[6], buf[7], buf[8], buf[9]],
        })
    }
}

/// MPC LD CXL.io Configuration response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpcCfgRsp {
    pub data: [u8; 4],
}

impl MpcCfgRsp {
    pub const WIRE_LEN: usize = 4;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(&self.data);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            data: [buf[0], buf[1], buf[2], buf[3]],
        })
    }
}

/// MPC LD Memory request: a read or write of at most [`FM_MAX_MEM_XFER`]
/// bytes at `offset` within the LD's allocated range. `data` is populated
/// for writes only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpcMemReq {
    pub ppid: u8,
    pub ldid: u16,
    pub r#type: u8,
    pub offset: u64,
    pub len: u16,
    pub data: Vec<u8>,
}

impl MpcMemReq {
    pub const FIXED_LEN: usize = 14;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ppid);
        out.extend_from_slice(&self.ldid.to_le_bytes());
        out.push(self.r#type);
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.len.to_le_bytes());
        out.extend_from_slice(&self.data);
        Self::FIXED_LEN + self.data.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::FIXED_LEN)?;
        let len = get_u16(buf, 12);
        if usize::from(len) > FM_MAX_MEM_XFER {
            return Err(DecodeError::PayloadTooLarge {
                len: len.into(),
                max: FM_MAX_MEM_XFER,
            });
        }
        let r#type = buf[3];
        // Write requests carry the data inline; reads carry none.
        let data = if r#type == super::psc::CFG_TYPE_WRITE {
            need(buf, Self::FIXED_LEN + usize::from(len))?;
            buf[Self::FIXED_LEN..Self::FIXED_LEN + usize::from(len)].to_vec()
        } else {
            Vec::new()
        };
        Ok(Self {
            ppid: buf[0],
            ldid: get_u16(buf, 1),
            r#type,
            offset: get_u64(buf, 4),
            len,
            data,
        })
    }
}

/// MPC LD Memory response. `data` is populated for reads only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpcMemRsp {
    pub len: u16,
    pub data: Vec<u8>,
}

impl MpcMemRsp {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(&self.len.to_le_bytes());
        out.extend_from_slice(&self.data);
        2 + self.data.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 2)?;
        let len = get_u16(buf, 0);
        need(buf, 2 + usize::from(len))?;
        Ok(Self {
            len,
            data: buf[2..2 + usize::from(len)].to_vec(),
        })
    }
}

/// MPC Tunnel Management Command request: a complete inner FM API message
/// addressed to the MLD behind `ppid`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpcTmcReq {
    pub ppid: u8,
    /// Inner MCTP message type; only CXL CCI is accepted.
    pub r#type: u8,
    pub msg: Vec<u8>,
}

impl MpcTmcReq {
    pub const FIXED_LEN: usize = 4;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ppid);
        out.push(self.r#type);
        out.extend_from_slice(&(self.msg.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.msg);
        Self::FIXED_LEN + self.msg.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::FIXED_LEN)?;
        let len = get_u16(buf, 2) as usize;
        need(buf, Self::FIXED_LEN + len)?;
        Ok(Self {
            ppid: buf[0],
            r#type: buf[1],
            msg: buf[4..4 + len].to_vec(),
        })
    }
}

/// MPC Tunnel Management Command response, wrapping the inner response
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpcTmcRsp {
    pub r#type: u8,
    pub msg: Vec<u8>,
}

impl MpcTmcRsp {
    pub const FIXED_LEN: usize = 4;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.r#type);
        out.push(0);
        out.extend_from_slice(&(self.msg.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.msg);
        Self::FIXED_LEN + self.msg.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::FIXED_LEN)?;
        let len = get_u16(buf, 2) as usize;
        need(buf, Self::FIXED_LEN + len)?;
        Ok(Self {
            r#type: buf[0],
            msg: buf[4..4 + len].to_vec(),
        })
    }
}
