//! Fabric Management API command handlers.
//!
//! Handlers come in two layers. The functions here assume the caller already
//! holds the model lock; the dispatcher acquires it once per request and
//! releases it before any I/O. That split lets the MPC_TMC tunnel call the
//! MCC handlers directly without re-entering the lock.
//!
//! Every handler follows the same contract: validate against the model,
//! apply the effect, and return a return code plus response body. Validation
//! failures return `INVALID_INPUT` (or the opcode's specific code) with an
//! empty body and leave the model untouched.

use cse_fmapi_protocol::{FmApiHdr, FmApiRequest, FmApiResponse, FmRc};
use cse_switch::CxlSwitch;

pub mod isc;
pub mod mcc;
pub mod mpc;
pub mod psc;
pub mod vsc;

/// What a handler produced: the return code and the response body to
/// encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub rc: FmRc,
    pub rsp: FmApiResponse,
}

impl Outcome {
    pub fn ok(rsp: FmApiResponse) -> Self {
        Self {
            rc: FmRc::Success,
            rsp,
        }
    }

    pub fn invalid() -> Self {
        Self {
            rc: FmRc::InvalidInput,
            rsp: FmApiResponse::Empty,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            rc: FmRc::Unsupported,
            rsp: FmApiResponse::Empty,
        }
    }
}

/// Route a decoded request to its handler. The model lock is held by the
/// caller for the whole call.
pub fn handle(switch: &mut CxlSwitch, hdr: &FmApiHdr, req: &FmApiRequest) -> Outcome {
    match req {
        FmApiRequest::IscId => isc::id(switch),
        FmApiRequest::IscBos => isc::bos(switch),
        FmApiRequest::IscMsgLimitGet => isc::msg_limit_get(switch),
        FmApiRequest::IscMsgLimitSet(req) => isc::msg_limit_set(switch, req),
        FmApiRequest::PscId => psc::id(switch),
        FmApiRequest::PscPort(req) => psc::port(switch, req),
        FmApiRequest::PscPortCtrl(req) => psc::port_ctrl(switch, req),
        FmApiRequest::PscCfg(req) => psc::cfg(switch, req),
        FmApiRequest::VscInfo(req) => vsc::info(switch, req),
        FmApiRequest::VscBind(req) => vsc::bind(switch, hdr, req),
        FmApiRequest::VscUnbind(req) => vsc::unbind(switch, hdr, req),
        FmApiRequest::VscAer(req) => vsc::aer(switch, req),
        FmApiRequest::MpcCfg(req) => mpc::cfg(switch, req),
        FmApiRequest::MpcMem(req) => mpc::mem(switch, req),
        FmApiRequest::MpcTmc(req) => mpc::tmc(switch, req),
    }
}
