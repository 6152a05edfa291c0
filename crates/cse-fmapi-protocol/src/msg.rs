//! Closed request/response sum types over the outer opcode space.
//!
//! The dispatcher decodes a request into [`FmApiRequest`] once and matches on
//! the variant; handlers build an [`FmApiResponse`] and the dispatcher encodes
//! it. MCC commands are not part of this space — they arrive inside an
//! [`crate::mpc::MpcTmcReq`] tunnel and use [`crate::mcc::MccRequest`].

use crate::isc::{IscBosRsp, IscIdRsp, IscMsgLimit};
use crate::mpc::{MpcCfgReq, MpcCfgRsp, MpcMemReq, MpcMemRsp, MpcTmcReq, MpcTmcRsp};
use crate::psc::{PscCfgReq, PscCfgRsp, PscIdRsp, PscPortCtrlReq, PscPortReq, PscPortRsp};
use crate::vsc::{VscAerReq, VscBindReq, VscInfoReq, VscInfoRsp, VscUnbindReq};
use crate::DecodeError;

/// A decoded Fabric Management API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FmApiRequest {
    IscId,
    IscBos,
    IscMsgLimitGet,
    IscMsgLimitSet(IscMsgLimit),
    PscId,
    PscPort(PscPortReq),
    PscPortCtrl(PscPortCtrlReq),
    PscCfg(PscCfgReq),
    VscInfo(VscInfoReq),
    VscBind(VscBindReq),
    VscUnbind(VscUnbindReq),
    VscAer(VscAerReq),
    MpcCfg(MpcCfgReq),
    MpcMem(MpcMemReq),
    MpcTmc(MpcTmcReq),
}

impl FmApiRequest {
    /// Decode the request payload for `opcode`. Unknown opcodes are reported
    /// rather than guessed at, so the caller can answer UNSUPPORTED.
    pub fn decode(opcode: u16, payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(match opcode {
            crate::FMOP_ISC_ID => FmApiRequest::IscId,
            crate::FMOP_ISC_BOS => FmApiRequest::IscBos,
            crate::FMOP_ISC_MSG_LIMIT_GET => FmApiRequest::IscMsgLimitGet,
            crate::FMOP_ISC_MSG_LIMIT_SET => {
                FmApiRequest::IscMsgLimitSet(IscMsgLimit::decode(payload)?)
            }
            crate::FMOP_PSC_ID => FmApiRequest::PscId,
            crate::FMOP_PSC_PORT => FmApiRequest::PscPort(PscPortReq::decode(payload)?),
            crate::FMOP_PSC_PORT_CTRL => {
                FmApiRequest::PscPortCtrl(PscPortCtrlReq::decode(payload)?)
            }
            crate::FMOP_PSC_CFG => FmApiRequest::PscCfg(PscCfgReq::decode(payload)?),
            crate::FMOP_VSC_INFO => FmApiRequest::VscInfo(VscInfoReq::decode(payload)?),
            crate::FMOP_VSC_BIND => FmApiRequest::VscBind(VscBindReq::decode(payload)?),
            crate::FMOP_VSC_UNBIND => FmApiRequest::VscUnbind(VscUnbindReq::decode(payload)?),
            crate::FMOP_VSC_AER => FmApiRequest::VscAer(VscAerReq::decode(payload)?),
            crate::FMOP_MPC_CFG => FmApiRequest::MpcCfg(MpcCfgReq::decode(payload)?),
            crate::FMOP_MPC_MEM => FmApiRequest::MpcMem(MpcMemReq::decode(payload)?),
            crate::FMOP_MPC_TMC => FmApiRequest::MpcTmc(MpcTmcReq::decode(payload)?),
            opcode => return Err(DecodeError::UnknownOpcode { opcode }),
        })
    }

    /// Encode the request payload, returning the opcode and written length.
    /// Used by clients and tests; the server only decodes requests.
    pub fn encode(&self, out: &mut Vec<u8>) -> (u16, usize) {
        match self {
            FmApiRequest::IscId => (crate::FMOP_ISC_ID, 0),
            FmApiRequest::IscBos => (crate::FMOP_ISC_BOS, 0),
            FmApiRequest::IscMsgLimitGet => (crate::FMOP_ISC_MSG_LIMIT_GET, 0),
            FmApiRequest::IscMsgLimitSet(req) => {
                (crate::FMOP_ISC_MSG_LIMIT_SET, req.encode(out))
            }
            FmApiRequest::PscId => (crate::FMOP_PSC_ID, 0),
            FmApiRequest::PscPort(req) => (crate::FMOP_PSC_PORT, req.encode(out)),
            FmApiRequest::PscPortCtrl(req) => (crate::FMOP_PSC_PORT_CTRL, req.encode(out)),
            FmApiRequest::PscCfg(req) => (crate::FMOP_PSC_CFG, req.encode(out)),
            FmApiRequest::VscInfo(req) => (crate::FMOP_VSC_INFO, req.encode(out)),
            FmApiRequest::VscBind(req) => (crate::FMOP_VSC_BIND, req.encode(out)),
            FmApiRequest::VscUnbind(req) => (crate::FMOP_VSC_UNBIND, req.encode(out)),
            FmApiRequest::VscAer(req) => (crate::FMOP_VSC_AER, req.encode(out)),
            FmApiRequest::MpcCfg(req) => (crate::FMOP_MPC_CFG, req.encode(out)),
            FmApiRequest::MpcMem(req) => (crate::FMOP_MPC_MEM, req.encode(out)),
            FmApiRequest::MpcTmc(req) => (crate::FMOP_MPC_TMC, req.encode(out)),
        }
    }
}

/// A Fabric Management API response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FmApiResponse {
    /// Validation failures and control responses carry no payload.
    Empty,
    IscId(IscIdRsp),
    IscBos(IscBosRsp),
    IscMsgLimit(IscMsgLimit),
    PscId(PscIdRsp),
    PscPort(PscPortRsp),
    PscCfg(PscCfgRsp),
    VscInfo(VscInfoRsp),
    MpcCfg(MpcCfgRsp),
    MpcMem(MpcMemRsp),
    MpcTmc(MpcTmcRsp),
}

impl FmApiResponse {
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        match self {
            FmApiResponse::Empty => 0,
            FmApiResponse::IscId(rsp) => rsp.encode(out),
            FmApiResponse::IscBos(rsp) => rsp.encode(out),
            FmApiResponse::IscMsgLimit(rsp) => rsp.encode(out),
            FmApiResponse::PscId(rsp) => rsp.encode(out),
            FmApiResponse::PscPort(rsp) => rsp.encode(out),
            FmApiResponse::PscCfg(rsp) => rsp.encode(out),
            FmApiResponse::VscInfo(rsp) => rsp.encode(out),
            FmApiResponse::MpcCfg(rsp) => rsp.encode(out),
            FmApiResponse::MpcMem(rsp) => rsp.encode(out),
            FmApiResponse::MpcTmc(rsp) => rsp.encode(out),
        }
    }
}
