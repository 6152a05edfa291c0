//! Virtual switch (VSC) payloads: VCS info, vPPB bind/unbind, and AER
//! injection.

use crate::{get_u16, get_u32, need, DecodeError, FM_MAX_VCS_PER_RSP};

/// VSC Get Virtual CXL Switch Info request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VscInfoReq {
    /// First vPPB reported per VCS block.
    pub vppbid_start: u8,
    /// Maximum vPPB entries reported per VCS block.
    pub vppbid_limit: u8,
    /// VCS ids to report.
    pub vcss: Vec<u8>,
}

impl VscInfoReq {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.vppbid_start);
        out.push(self.vppbid_limit);
        out.push(self.vcss.len() as u8);
        out.extend_from_slice(&self.vcss);
        3 + self.vcss.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 3)?;
        let num = buf[2] as usize;
        need(buf, 3 + num)?;
        Ok(Self {
            vppbid_start: buf[0],
            vppbid_limit: buf[1],
            vcss: buf[3..3 + num].to_vec(),
        })
    }
}

/// One vPPB's binding in a VCS info block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VppbStatus {
    pub status: u8,
    pub ppid: u8,
    pub ldid: u16,
}

impl VppbStatus {
    pub const WIRE_LEN: usize = 4;
}

/// One VCS in a VSC_INFO response. `total` is the VCS's vPPB count; `vppbs`
/// holds the window selected by the request's start/limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VscInfoBlk {
    pub vcsid: u8,
    pub state: u8,
    pub uspid: u8,
    pub total: u8,
    pub vppbs: Vec<VppbStatus>,
}

impl VscInfoBlk {
    fn wire_len(&self) -> usize {
        5 + self.vppbs.len() * VppbStatus::WIRE_LEN
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.vcsid);
        out.push(self.state);
        out.push(self.uspid);
        out.push(self.total);
        out.push(self.vppbs.len() as u8);
        for vppb in &self.vppbs {
            out.push(vppb.status);
            out.push(vppb.ppid);
            out.extend_from_slice(&vppb.ldid.to_le_bytes());
        }
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        need(buf, 5)?;
        let num = buf[4] as usize;
        let len = 5 + num * VppbStatus::WIRE_LEN;
        need(buf, len)?;
        let vppbs = (0..num)
            .map(|i| {
                let at = 5 + i * VppbStatus::WIRE_LEN;
                VppbStatus {
                    status: buf[at],
                    ppid: buf[at + 1],
                    ldid: get_u16(buf, at + 2),
                }
            })
            .collect();
        Ok((
            Self {
                vcsid: buf[0],
                state: buf[1],
                uspid: buf[2],
                total: buf[3],
                vppbs,
            },
            len,
        ))
    }
}

/// VSC Get Virtual CXL Switch Info response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VscInfoRsp {
    pub blocks: Vec<VscInfoBlk>,
}

impl VscInfoRsp {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.blocks.len() as u8);
        let mut len = 1;
        for blk in &self.blocks {
            blk.encode(out);
            len += blk.wire_len();
        }
        len
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 1)?;
        let num = buf[0] as usize;
        if num > FM_MAX_VCS_PER_RSP {
            return Err(DecodeError::ListTooLong {
                num,
                max: FM_MAX_VCS_PER_RSP,
            });
        }
        let mut blocks = Vec::with_capacity(num);
        let mut at = 1;
        for _ in 0..num {
            let (blk, len) = VscInfoBlk::decode(&buf[at..])?;
            blocks.push(blk);
            at += len;
        }
        Ok(Self { blocks })
    }
}

/// VSC Bind vPPB request. `ldid == LDID_WHOLE_PORT` requests a whole-port
/// bind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VscBindReq {
    pub vcsid: u8,
    pub vppbid: u8,
    pub ppid: u8,
    pub ldid: u16,
}

impl VscBindReq {
    pub const WIRE_LEN: usize = 6;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.vcsid);
        out.push(self.vppbid);
        out.push(self.ppid);
        out.push(0);
        out.extend_from_slice(&self.ldid.to_le_bytes());
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            vcsid: buf[0],
            vppbid: buf[1],
            ppid: buf[2],
            ldid: get_u16(buf, 4),
        })
    }
}

/// VSC Unbind vPPB request. The unbind option byte is carried but has no
/// effect on this switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VscUnbindReq {
    pub vcsid: u8,
    pub vppbid: u8,
    pub option: u8,
}

impl VscUnbindReq {
    pub const WIRE_LEN: usize = 3;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.vcsid);
        out.push(self.vppbid);
        out.push(self.option);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            vcsid: buf[0],
            vppbid: buf[1],
            option: buf[2],
        })
    }
}

/// VSC Generate AER request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VscAerReq {
    pub vcsid: u8,
    pub vppbid: u8,
    pub error_type: u32,
    pub header: [u8; 32],
}

impl Default for VscAerReq {
    fn default() -> Self {
        Self {
            vcsid: 0,
            vppbid: 0,
            error_type: 0,
            header: [0; 32],
        }
    }
}

impl VscAerReq {
    pub const WIRE_LEN: usize = 40;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.vcsid);
        out.push(self.vppbid);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.error_type.to_le_bytes());
        out.extend_from_slice(&self.header);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        let mut header = [0u8; 32];
        header.copy_from_slice(&buf[8..40]);
        Ok(Self {
            vcsid: buf[0],
            vppbid: buf[1],
            error_type: get_u32(buf, 4),
            header,
        })
    }
}
