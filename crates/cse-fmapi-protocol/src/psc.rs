//! Physical switch (PSC) payloads: identify, per-port state, port control,
//! and PPB config-space access.

use crate::{get_u16, get_u64, need, DecodeError};

/// Port bitmap length in the identify response; ports beyond it are not
/// reported there (per-port state still is, via PSC_PORT).
pub const PSC_ID_PORT_BITMAP_LEN: usize = 16;
/// VCS bitmap length in the identify response.
pub const PSC_ID_VCS_BITMAP_LEN: usize = 4;

/// PSC Identify Switch Device response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PscIdRsp {
    pub vid: u16,
    pub did: u16,
    pub svid: u16,
    pub ssid: u16,
    pub sn: u64,
    pub ingress_port: u8,
    pub num_ports: u8,
    pub num_vcss: u8,
    /// Bit `i % 8` of byte `i / 8` set when port `i` is not disabled.
    pub active_ports: [u8; PSC_ID_PORT_BITMAP_LEN],
    /// Bit `i % 8` of byte `i / 8` set when VCS `i` is enabled.
    pub active_vcss: [u8; PSC_ID_VCS_BITMAP_LEN],
    pub num_vppbs: u16,
    pub active_vppbs: u16,
    pub num_decoders: u8,
}

impl Default for PscIdRsp {
    fn default() -> Self {
        Self {
            vid: 0,
            did: 0,
            svid: 0,
            ssid: 0,
            sn: 0,
            ingress_port: 0,
            num_ports: 0,
            num_vcss: 0,
            active_ports: [0; PSC_ID_PORT_BITMAP_LEN],
            active_vcss: [0; PSC_ID_VCS_BITMAP_LEN],
            num_vppbs: 0,
            active_vppbs: 0,
            num_decoders: 0,
        }
    }
}

impl PscIdRsp {
    pub const WIRE_LEN: usize = 44;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(&self.vid.to_le_bytes());
        out.extend_from_slice(&self.did.to_le_bytes());
        out.extend_from_slice(&self.svid.to_le_bytes());
        out.extend_from_slice(&self.ssid.to_le_bytes());
        out.extend_from_slice(&self.sn.to_le_bytes());
        out.push(self.ingress_port);
        out.push(self.num_ports);
        out.push(self.num_vcss);
        out.extend_from_slice(&self.active_ports);
        out.extend_from_slice(&self.active_vcss);
        out.extend_from_slice(&self.num_vppbs.to_le_bytes());
        out.extend_from_slice(&self.active_vppbs.to_le_bytes());
        out.push(self.num_decoders);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        let mut active_ports = [0u8; PSC_ID_PORT_BITMAP_LEN];
        active_ports.copy_from_slice(&buf[19..35]);
        let mut active_vcss = [0u8; PSC_ID_VCS_BITMAP_LEN];
        active_vcss.copy_from_slice(&buf[35..39]);
        Ok(Self {
            vid: get_u16(buf, 0),
            did: get_u16(buf, 2),
            svid: get_u16(buf, 4),
            ssid: get_u16(buf, 6),
            sn: get_u64(buf, 8),
            ingress_port: buf[16],
            num_ports: buf[17],
            num_vcss: buf[18],
            active_ports,
            active_vcss,
            num_vppbs: get_u16(buf, 39),
            active_vppbs: get_u16(buf, 41),
            num_decoders: buf[43],
        })
    }
}

/// PSC Get Physical Port State request: a list of port ids to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PscPortReq {
    pub ports: Vec<u8>,
}

impl PscPortReq {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ports.len() as u8);
        out.extend_from_slice(&self.ports);
        1 + self.ports.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 1)?;
        let num = buf[0] as usize;
        need(buf, 1 + num)?;
        Ok(Self {
            ports: buf[1..1 + num].to_vec(),
        })
    }
}

/// One port's state in a PSC_PORT response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PscPortInfo {
    pub ppid: u8,
    pub state: u8,
    pub dv: u8,
    pub dt: u8,
    pub cv: u8,
    pub mlw: u8,
    pub nlw: u8,
    pub speeds: u8,
    pub mls: u8,
    pub cls: u8,
    pub ltssm: u8,
    pub lane: u8,
    pub lane_rev: u8,
    pub perst: u8,
    pub prsnt: u8,
    pub pwrctrl: u8,
    pub num_ld: u8,
}

impl PscPortInfo {
    pub const WIRE_LEN: usize = 17;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            self.ppid,
            self.state,
            self.dv,
            self.dt,
            self.cv,
            self.mlw,
            self.nlw,
            self.speeds,
            self.mls,
            self.cls,
            self.ltssm,
            self.lane,
            self.lane_rev,
            self.perst,
            self.prsnt,
            self.pwrctrl,
            self.num_ld,
        ]);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            ppid: buf[0],
            state: buf[1],
            dv: buf[2],
            dt: buf[3],
            cv: buf[4],
            mlw: buf[5],
            nlw: buf[6],
            speeds: buf[7],
            mls: buf[8],
            cls: buf[9],
            ltssm: buf[10],
            lane: buf[11],
            lane_rev: buf[12],
            perst: buf[13],
            prsnt: buf[14],
            pwrctrl: buf[15],
            num_ld: buf[16],
        }
    }
}

/// PSC Get Physical Port State response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PscPortRsp {
    pub ports: Vec<PscPortInfo>,
}

impl PscPortRsp {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ports.len() as u8);
        for info in &self.ports {
            info.encode(out);
        }
        1 + self.ports.len() * PscPortInfo::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 1)?;
        let num = buf[0] as usize;
        need(buf, 1 + num * PscPortInfo::WIRE_LEN)?;
        let ports = (0..num)
            .map(|i| PscPortInfo::decode(&buf[1 + i * PscPortInfo::WIRE_LEN..]))
            .collect();
        Ok(Self { ports })
    }
}

/// Port control sub-opcodes.
pub const PSC_PORT_CTRL_ASSERT_PERST: u8 = 0x00;
pub const PSC_PORT_CTRL_DEASSERT_PERST: u8 = 0x01;
pub const PSC_PORT_CTRL_RESET_PPB: u8 = 0x02;

/// PSC Physical Port Control request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PscPortCtrlReq {
    pub ppid: u8,
    pub opcode: u8,
}

impl PscPortCtrlReq {
    pub const WIRE_LEN: usize = 2;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ppid);
        out.push(self.opcode);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            ppid: buf[0],
            opcode: buf[1],
        })
    }
}

/// Config-space transaction types, shared with the MPC family.
pub const CFG_TYPE_READ: u8 = 0x00;
pub const CFG_TYPE_WRITE: u8 = 0x01;

/// PSC PPB CXL.io Configuration request.
///
/// `reg` plus the 4-bit `ext` extension address a dword within the 4 KiB
/// config space; `fdbe` selects participating bytes of that dword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PscCfgReq {
    pub ppid: u8,
    pub reg: u8,
    pub ext: u8,
    pub fdbe: u8,
    pub r#type: u8,
    pub data: [u8; 4],
}

impl PscCfgReq {
    pub const WIRE_LEN: usize = 8;

    pub fn register(&self) -> u16 {
        (u16::from(self.ext) << 8) | u16::from(self.reg)
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.ppid);
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
            reg: buf[1],
            ext: buf[2] & 0x0F,
            fdbe: buf[2] >> 4,
            r#type: buf[3],
            data: [buf[4], buf[5], buf[6], buf[7]],
        })
    }
}

/// PSC PPB CXL.io Configuration response: the read data dword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PscCfgRsp {
    pub data: [u8; 4],
}

impl PscCfgRsp {
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
