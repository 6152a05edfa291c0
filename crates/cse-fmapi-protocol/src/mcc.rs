//! MLD component (MCC) payloads. These commands address the multi-logical
//! device behind a port and only ever arrive inside an MPC_TMC tunnel.

use crate::{get_u16, get_u64, need, DecodeError, FM_MAX_NUM_LD};

/// MCC Get LD Info response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MccInfoRsp {
    pub memory_size: u64,
    pub num: u16,
    pub epc: u8,
    pub ttr: u8,
}

impl MccInfoRsp {
    pub const WIRE_LEN: usize = 12;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(&self.memory_size.to_le_bytes());
        out.extend_from_slice(&self.num.to_le_bytes());
        out.push(self.epc);
        out.push(self.ttr);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            memory_size: get_u64(buf, 0),
            num: get_u16(buf, 8),
            epc: buf[10],
            ttr: buf[11],
        })
    }
}

/// Range-allocation multipliers of one logical device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LdAllocEntry {
    pub rng1: u64,
    pub rng2: u64,
}

impl LdAllocEntry {
    pub const WIRE_LEN: usize = 16;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.rng1.to_le_bytes());
        out.extend_from_slice(&self.rng2.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            rng1: get_u64(buf, 0),
            rng2: get_u64(buf, 8),
        }
    }
}

/// MCC Get LD Allocations request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MccAllocGetReq {
    pub start: u8,
    pub limit: u8,
}

impl MccAllocGetReq {
    pub const WIRE_LEN: usize = 2;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.start);
        out.push(self.limit);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            start: buf[0],
            limit: buf[1],
        })
    }
}

/// MCC Get LD Allocations response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MccAllocGetRsp {
    /// LD count of the device.
    pub total: u8,
    pub granularity: u8,
    pub start: u8,
    pub entries: Vec<LdAllocEntry>,
}

impl MccAllocGetRsp {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.total);
        out.push(self.granularity);
        out.push(self.start);
        out.push(self.entries.len() as u8);
        for entry in &self.entries {
            entry.encode(out);
        }
        4 + self.entries.len() * LdAllocEntry::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 4)?;
        let num = buf[3] as usize;
        need(buf, 4 + num * LdAllocEntry::WIRE_LEN)?;
        let entries = (0..num)
            .map(|i| LdAllocEntry::decode(&buf[4 + i * LdAllocEntry::WIRE_LEN..]))
            .collect();
        Ok(Self {
            total: buf[0],
            granularity: buf[1],
            start: buf[2],
            entries,
        })
    }
}

/// MCC Set LD Allocations request; the response has the same shape and
/// echoes the stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MccAllocSet {
    pub start: u8,
    pub entries: Vec<LdAllocEntry>,
}

impl MccAllocSet {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.entries.len() as u8);
        out.push(self.start);
        for entry in &self.entries {
            entry.encode(out);
        }
        2 + self.entries.len() * LdAllocEntry::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 2)?;
        let num = buf[0] as usize;
        if num > FM_MAX_NUM_LD {
            return Err(DecodeError::ListTooLong {
                num,
                max: FM_MAX_NUM_LD,
            });
        }
        need(buf, 2 + num * LdAllocEntry::WIRE_LEN)?;
        let entries = (0..num)
            .map(|i| LdAllocEntry::decode(&buf[2 + i * LdAllocEntry::WIRE_LEN..]))
            .collect();
        Ok(Self {
            start: buf[1],
            entries,
        })
    }
}

/// The QoS control block: SET request, and the response of both GET and
/// SET.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MccQosCtrl {
    pub epc_en: u8,
    pub ttr_en: u8,
    pub egress_mod_pcnt: u8,
    pub egress_sev_pcnt: u8,
    pub sample_interval: u8,
    pub rcb: u16,
    pub comp_interval: u8,
}

impl MccQosCtrl {
    pub const WIRE_LEN: usize = 8;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.epc_en);
        out.push(self.ttr_en);
        out.push(self.egress_mod_pcnt);
        out.push(self.egress_sev_pcnt);
        out.push(self.sample_interval);
        out.extend_from_slice(&self.rcb.to_le_bytes());
        out.push(self.comp_interval);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            epc_en: buf[0],
            ttr_en: buf[1],
            egress_mod_pcnt: buf[2],
            egress_sev_pcnt: buf[3],
            sample_interval: buf[4],
            rcb: get_u16(buf, 5),
            comp_interval: buf[7],
        })
    }
}

/// MCC Get QoS Status response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MccQosStatRsp {
    pub bp_avg_pcnt: u8,
}

impl MccQosStatRsp {
    pub const WIRE_LEN: usize = 1;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.bp_avg_pcnt);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            bp_avg_pcnt: buf[0],
        })
    }
}

/// Window request for the bandwidth GET commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MccBwGetReq {
    pub num: u8,
    pub start: u8,
}

impl MccBwGetReq {
    pub const WIRE_LEN: usize = 2;

    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.num);
        out.push(self.start);
        Self::WIRE_LEN
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, Self::WIRE_LEN)?;
        Ok(Self {
            num: buf[0],
            start: buf[1],
        })
    }
}

/// Counted byte list used by the bandwidth allocation and limit commands:
/// SET request, and the response of both GET and SET.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MccBwList {
    pub start: u8,
    pub list: Vec<u8>,
}

impl MccBwList {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        out.push(self.list.len() as u8);
        out.push(self.start);
        out.extend_from_slice(&self.list);
        2 + self.list.len()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        need(buf, 2)?;
        let num = buf[0] as usize;
        if num > FM_MAX_NUM_LD {
            return Err(DecodeError::ListTooLong {
                num,
                max: FM_MAX_NUM_LD,
            });
        }
        need(buf, 2 + num)?;
        Ok(Self {
            start: buf[1],
            list: buf[2..2 + num].to_vec(),
        })
    }
}

/// An MCC request, decoded from the inner message of an MPC_TMC tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MccRequest {
    Info,
    AllocGet(MccAllocGetReq),
    AllocSet(MccAllocSet),
    QosCtrlGet,
    QosCtrlSet(MccQosCtrl),
    QosStat,
    QosBwAllocGet(MccBwGetReq),
    QosBwAllocSet(MccBwList),
    QosBwLimitGet(MccBwGetReq),
    QosBwLimitSet(MccBwList),
}

impl MccRequest {
    pub fn decode(opcode: u16, payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(match opcode {
            crate::FMOP_MCC_INFO => MccRequest::Info,
            crate::FMOP_MCC_ALLOC_GET => MccRequest::AllocGet(MccAllocGetReq::decode(payload)?),
            crate::FMOP_MCC_ALLOC_SET => MccRequest::AllocSet(MccAllocSet::decode(payload)?),
            crate::FMOP_MCC_QOS_CTRL_GET => MccRequest::QosCtrlGet,
            crate::FMOP_MCC_QOS_CTRL_SET => MccRequest::QosCtrlSet(MccQosCtrl::decode(payload)?),
            crate::FMOP_MCC_QOS_STAT => MccRequest::QosStat,
            crate::FMOP_MCC_QOS_BW_ALLOC_GET => {
                MccRequest::QosBwAllocGet(MccBwGetReq::decode(payload)?)
            }
            crate::FMOP_MCC_QOS_BW_ALLOC_SET => {
                MccRequest::QosBwAllocSet(MccBwList::decode(payload)?)
            }
            crate::FMOP_MCC_QOS_BW_LIMIT_GET => {
                MccRequest::QosBwLimitGet(MccBwGetReq::decode(payload)?)
            }
            crate::FMOP_MCC_QOS_BW_LIMIT_SET => {
                MccRequest::QosBwLimitSet(MccBwList::decode(payload)?)
            }
            opcode => return Err(DecodeError::UnknownOpcode { opcode }),
        })
    }
}

/// An MCC response, encoded into the inner message of an MPC_TMC tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MccResponse {
    Info(MccInfoRsp),
    AllocGet(MccAllocGetRsp),
    AllocSet(MccAllocSet),
    QosCtrl(MccQosCtrl),
    QosStat(MccQosStatRsp),
    QosBwAlloc(MccBwList),
    QosBwLimit(MccBwList),
}

impl MccResponse {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        match self {
            MccResponse::Info(rsp) => rsp.encode(out),
            MccResponse::AllocGet(rsp) => rsp.encode(out),
            MccResponse::AllocSet(rsp) => rsp.encode(out),
            MccResponse::QosCtrl(rsp) => rsp.encode(out),
            MccResponse::QosStat(rsp) => rsp.encode(out),
            MccResponse::QosBwAlloc(rsp) | MccResponse::QosBwLimit(rsp) => rsp.encode(out),
        }
    }
}
