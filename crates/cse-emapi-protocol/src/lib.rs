#![forbid(unsafe_code)]

//! Emulator control API wire codec.
//!
//! Alongside the standard Fabric Management API, the emulator answers a small
//! private command set used by test harnesses to hot-plug catalog devices
//! into ports. It rides the same transport under its own MCTP message type
//! and a 12-byte header that differs from the FM API one: a 24-bit length and
//! two per-opcode parameter bytes `a` and `b`.
//!
//! ```text
//! 0                1        2                 4
//! +----------------+--------+-----------------+
//! | tag:4 | type:4 | rsvd   |  opcode (u16)   |
//! +----------------+--------+-----------------+
//! 4                  7      8      9
//! |  length (u24)   |  a    |  b   |
//! +-----------------+-------+------+----------+
//! 9                     11           12
//! |  return code (u16)  |   rsvd    |
//! +---------------------+-----------+
//! ```
//!
//! Opcode use of `(a, b)`: LIST_DEV request `(num_requested, start)` and
//! response `(count, 0)`; CONN_DEV `(ppid, devid)`; DISCON_DEV `(ppid, all)`.

use thiserror::Error;

/// MCTP message type carrying emulator control commands.
pub const MCTP_TYPE_CSE: u8 = 0xC5;

pub const EM_HDR_LEN: usize = 12;

pub const EMOP_EVENT: u16 = 0x00;
pub const EMOP_LIST_DEV: u16 = 0x01;
pub const EMOP_CONN_DEV: u16 = 0x02;
pub const EMOP_DISCON_DEV: u16 = 0x03;

/// Return codes, sharing the FM API numeric space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EmRc {
    Success = 0x0000,
    InvalidInput = 0x0002,
    Unsupported = 0x0003,
}

impl From<EmRc> for u16 {
    fn from(rc: EmRc) -> u16 {
        rc as u16
    }
}

/// Message type nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmMsgType {
    Request,
    Response,
    Event,
}

impl EmMsgType {
    fn to_nibble(self) -> u8 {
        match self {
            EmMsgType::Request => 0,
            EmMsgType::Response => 1,
            EmMsgType::Event => 2,
        }
    }

    fn from_nibble(nibble: u8) -> Result<Self, DecodeError> {
        match nibble {
            0 => Ok(EmMsgType::Request),
            1 => Ok(EmMsgType::Response),
            2 => Ok(EmMsgType::Event),
            value => Err(DecodeError::BadMsgType { value }),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated message: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("bad message type nibble: {value:#x}")]
    BadMsgType { value: u8 },
    #[error("device name is not UTF-8")]
    BadName,
}

/// The 12-byte emulator API header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmApiHdr {
    pub r#type: EmMsgType,
    pub tag: u8,
    pub opcode: u16,
    pub len: u32,
    pub a: u8,
    pub b: u8,
    pub rc: u16,
}

impl EmApiHdr {
    pub fn request(tag: u8, opcode: u16, a: u8, b: u8) -> Self {
        Self {
            r#type: EmMsgType::Request,
            tag,
            opcode,
            len: 0,
            a,
            b,
            rc: 0,
        }
    }

    pub fn response(tag: u8, opcode: u16, len: u32, a: u8, b: u8, rc: EmRc) -> Self {
        Self {
            r#type: EmMsgType::Response,
            tag,
            opcode,
            len,
            a,
            b,
            rc: rc.into(),
        }
    }

    pub fn encode(&self, out: &mut [u8; EM_HDR_LEN]) {
        out[0] = (self.tag << 4) | self.r#type.to_nibble();
        out[1] = 0;
        out[2..4].copy_from_slice(&self.opcode.to_le_bytes());
        let len = self.len & 0x00FF_FFFF;
        out[4] = len as u8;
        out[5] = (len >> 8) as u8;
        out[6] = (len >> 16) as u8;
        out[7] = self.a;
        out[8] = self.b;
        out[9..11].copy_from_slice(&self.rc.to_le_bytes());
        out[11] = 0;
    }

    pub fn to_bytes(&self) -> [u8; EM_HDR_LEN] {
        let mut out = [0u8; EM_HDR_LEN];
        self.encode(&mut out);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < EM_HDR_LEN {
            return Err(DecodeError::Truncated {
                need: EM_HDR_LEN,
                got: buf.len(),
            });
        }
        Ok(Self {
            r#type: EmMsgType::from_nibble(buf[0] & 0x0F)?,
            tag: buf[0] >> 4,
            opcode: u16::from_le_bytes([buf[2], buf[3]]),
            len: u32::from(buf[4]) | (u32::from(buf[5]) << 8) | (u32::from(buf[6]) << 16),
            a: buf[7],
            b: buf[8],
            rc: u16::from_le_bytes([buf[9], buf[10]]),
        })
    }
}

/// One device in a LIST_DEV response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceListEntry {
    pub devid: u8,
    pub name: String,
}

/// LIST_DEV response payload: a packed run of length-prefixed names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDevRsp {
    pub devices: Vec<DeviceListEntry>,
}

impl ListDevRsp {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        let mut len = 0;
        for dev in &self.devices {
            out.push(dev.devid);
            out.push(dev.name.len() as u8);
            out.extend_from_slice(dev.name.as_bytes());
            len += 2 + dev.name.len();
        }
        len
    }

    /// Decode `count` entries, as reported by the response header's `a`.
    pub fn decode(buf: &[u8], count: usize) -> Result<Self, DecodeError> {
        let mut devices = Vec::with_capacity(count);
        let mut at = 0;
        for _ in 0..count {
            if buf.len() < at + 2 {
                return Err(DecodeError::Truncated {
                    need: at + 2,
                    got: buf.len(),
                });
            }
            let devid = buf[at];
            let name_len = buf[at + 1] as usize;
            if buf.len() < at + 2 + name_len {
                return Err(DecodeError::Truncated {
                    need: at + 2 + name_len,
                    got: buf.len(),
                });
            }
            let name = std::str::from_utf8(&buf[at + 2..at + 2 + name_len])
                .map_err(|_| DecodeError::BadName)?
                .to_owned();
            devices.push(DeviceListEntry { devid, name });
            at += 2 + name_len;
        }
        Ok(Self { devices })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let hdr = EmApiHdr::response(5, EMOP_LIST_DEV, 0x12_3456, 7, 0, EmRc::Success);
        assert_eq!(EmApiHdr::decode(&hdr.to_bytes()).unwrap(), hdr);
    }

    #[test]
    fn header_byte_layout() {
        let hdr = EmApiHdr::request(2, EMOP_CONN_DEV, 10, 3);
        let bytes = hdr.to_bytes();
        assert_eq!(
            bytes,
            [0x20, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x0A, 0x03, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn header_rejects_short_input() {
        assert_eq!(
            EmApiHdr::decode(&[0u8; 4]).unwrap_err(),
            DecodeError::Truncated { need: 12, got: 4 }
        );
    }

    #[test]
    fn header_rejects_bad_type() {
        let mut bytes = EmApiHdr::request(0, EMOP_LIST_DEV, 0, 0).to_bytes();
        bytes[0] = 0x0F;
        assert_eq!(
            EmApiHdr::decode(&bytes).unwrap_err(),
            DecodeError::BadMsgType { value: 0xF }
        );
    }

    #[test]
    fn device_list_round_trip() {
        let rsp = ListDevRsp {
            devices: vec![
                DeviceListEntry {
                    devid: 0,
                    name: "sld_8G".into(),
                },
                DeviceListEntry {
                    devid: 3,
                    name: "mld_5x8_2.0_4G".into(),
                },
            ],
        };
        let mut buf = Vec::new();
        let len = rsp.encode(&mut buf);
        assert_eq!(len, buf.len());
        assert_eq!(ListDevRsp::decode(&buf, 2).unwrap(), rsp);
    }

    #[test]
    fn device_list_truncated_name() {
        // name_len 5 but only 3 bytes follow.
        let buf = [0u8, 5, b'a', b'b', b'c'];
        assert!(matches!(
            ListDevRsp::decode(&buf, 1).unwrap_err(),
            DecodeError::Truncated { .. }
        ));
    }
}
