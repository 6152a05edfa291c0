#![forbid(unsafe_code)]

//! CXL 2.0 Fabric Management API wire codec.
//!
//! Every management command and response exchanged with a Fabric Manager is a
//! 12-byte application header followed by an opcode-specific payload. This
//! crate owns that mapping in both directions: typed request/response values
//! in, little-endian bytes out, and back. It performs no I/O and holds no
//! switch state; the server crate decides what the bytes mean.
//!
//! Header layout (all integer fields little-endian):
//!
//! ```text
//! 0                1        2                 4
//! +----------------+--------+-----------------+
//! | tag:4 | cat:4  | rsvd   |  opcode (u16)   |
//! +----------------+--------+-----------------+
//! 4                                           8
//! | u32: bit0 = background, bits[23:1] = len  |
//! +---------------------+---------------------+
//! 8                     10                    12
//! |  return code (u16)  |  vendor ext (u16)   |
//! +---------------------+---------------------+
//! ```
//!
//! Payload layouts live in the per-family modules ([`isc`], [`psc`], [`vsc`],
//! [`mpc`], [`mcc`]); the byte-exact contract is pinned by
//! `tests/wire_vectors.rs`.

use thiserror::Error;

pub mod isc;
pub mod mcc;
pub mod mpc;
pub mod msg;
pub mod psc;
pub mod vsc;

pub use msg::{FmApiRequest, FmApiResponse};

/// MCTP message type carrying Fabric Management API payloads.
pub const MCTP_TYPE_CXL_FMAPI: u8 = 0x07;
/// MCTP message type for tunneled CXL component commands.
pub const MCTP_TYPE_CXL_CCI: u8 = 0x08;

pub const FM_HDR_LEN: usize = 12;

/// Maximum logical devices a single MLD presents.
pub const FM_MAX_NUM_LD: usize = 16;
/// Maximum VCS info blocks returned by a single VSC_INFO response.
pub const FM_MAX_VCS_PER_RSP: usize = 8;
/// Largest MPC_MEM transfer in bytes.
pub const FM_MAX_MEM_XFER: usize = 4096;

// Infrastructure family.
pub const FMOP_ISC_ID: u16 = 0x0001;
pub const FMOP_ISC_BOS: u16 = 0x0002;
pub const FMOP_ISC_MSG_LIMIT_GET: u16 = 0x0003;
pub const FMOP_ISC_MSG_LIMIT_SET: u16 = 0x0004;

// Physical switch family.
pub const FMOP_PSC_ID: u16 = 0x5100;
pub const FMOP_PSC_PORT: u16 = 0x5101;
pub const FMOP_PSC_PORT_CTRL: u16 = 0x5102;
pub const FMOP_PSC_CFG: u16 = 0x5103;

// Virtual switch family.
pub const FMOP_VSC_INFO: u16 = 0x5300;
pub const FMOP_VSC_BIND: u16 = 0x5301;
pub const FMOP_VSC_UNBIND: u16 = 0x5302;
pub const FMOP_VSC_AER: u16 = 0x5303;

// MLD port family.
pub const FMOP_MPC_CFG: u16 = 0x5400;
pub const FMOP_MPC_MEM: u16 = 0x5401;
pub const FMOP_MPC_TMC: u16 = 0x5402;

// MLD component family. These share the 0x54xx block with the MPC family and
// are only valid inside an MPC_TMC tunnel, which is how the two are told
// apart.
pub const FMOP_MCC_INFO: u16 = 0x5400;
pub const FMOP_MCC_ALLOC_GET: u16 = 0x5401;
pub const FMOP_MCC_ALLOC_SET: u16 = 0x5402;
pub const FMOP_MCC_QOS_CTRL_GET: u16 = 0x5403;
pub const FMOP_MCC_QOS_CTRL_SET: u16 = 0x5404;
pub const FMOP_MCC_QOS_STAT: u16 = 0x5405;
pub const FMOP_MCC_QOS_BW_ALLOC_GET: u16 = 0x5406;
pub const FMOP_MCC_QOS_BW_ALLOC_SET: u16 = 0x5407;
pub const FMOP_MCC_QOS_BW_LIMIT_GET: u16 = 0x5408;
pub const FMOP_MCC_QOS_BW_LIMIT_SET: u16 = 0x5409;

/// LD id meaning "the whole port" in a bind request.
pub const LDID_WHOLE_PORT: u16 = 0xFFFF;

/// Command return codes (CXL 2.0 numeric values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FmRc {
    Success = 0x0000,
    BackgroundOpStarted = 0x0001,
    InvalidInput = 0x0002,
    Unsupported = 0x0003,
}

impl From<FmRc> for u16 {
    fn from(rc: FmRc) -> u16 {
        rc as u16
    }
}

/// Message category nibble of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmMsgCategory {
    Request,
    Response,
}

impl FmMsgCategory {
    fn to_nibble(self) -> u8 {
        match self {
            FmMsgCategory::Request => 0,
            FmMsgCategory::Response => 1,
        }
    }

    fn from_nibble(nibble: u8) -> Result<Self, DecodeError> {
        match nibble {
            0 => Ok(FmMsgCategory::Request),
            1 => Ok(FmMsgCategory::Response),
            value => Err(DecodeError::BadCategory { value }),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated message: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("bad message category nibble: {value:#x}")]
    BadCategory { value: u8 },
    #[error("unknown opcode {opcode:#06x}")]
    UnknownOpcode { opcode: u16 },
    #[error("list length {num} exceeds maximum {max}")]
    ListTooLong { num: usize, max: usize },
    #[error("payload length {len} exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// The 12-byte application header shared by requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmApiHdr {
    pub category: FmMsgCategory,
    pub tag: u8,
    pub opcode: u16,
    pub background: bool,
    pub len: u32,
    pub rc: u16,
    pub ext: u16,
}

impl FmApiHdr {
    pub fn request(tag: u8, opcode: u16, len: u32) -> Self {
        Self {
            category: FmMsgCategory::Request,
            tag,
            opcode,
            background: false,
            len,
            rc: 0,
            ext: 0,
        }
    }

    pub fn response(tag: u8, opcode: u16, len: u32, rc: FmRc) -> Self {
        Self {
            category: FmMsgCategory::Response,
            tag,
            opcode,
            background: false,
            len,
            rc: rc.into(),
            ext: 0,
        }
    }

    pub fn encode(&self, out: &mut [u8; FM_HDR_LEN]) {
        out[0] = (self.tag << 4) | self.category.to_nibble();
        out[1] = 0;
        out[2..4].copy_from_slice(&self.opcode.to_le_bytes());
        let word = ((self.len & 0x007F_FFFF) << 1) | u32::from(self.background);
        out[4..8].copy_from_slice(&word.to_le_bytes());
        out[8..10].copy_from_slice(&self.rc.to_le_bytes());
        out[10..12].copy_from_slice(&self.ext.to_le_bytes());
    }

    pub fn to_bytes(&self) -> [u8; FM_HDR_LEN] {
        let mut out = [0u8; FM_HDR_LEN];
        self.encode(&mut out);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < FM_HDR_LEN {
            return Err(DecodeError::Truncated {
                need: FM_HDR_LEN,
                got: buf.len(),
            });
        }
        let category = FmMsgCategory::from_nibble(buf[0] & 0x0F)?;
        let tag = buf[0] >> 4;
        let opcode = get_u16(buf, 2);
        let word = get_u32(buf, 4);
        Ok(Self {
            category,
            tag,
            opcode,
            background: word & 0x1 != 0,
            len: (word >> 1) & 0x007F_FFFF,
            rc: get_u16(buf, 8),
            ext: get_u16(buf, 10),
        })
    }
}

pub(crate) fn need(buf: &[u8], need: usize) -> Result<(), DecodeError> {
    if buf.len() < need {
        return Err(DecodeError::Truncated {
            need,
            got: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn get_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn get_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}
