//! Infrastructure commands: identify, background-operation status, and the
//! response message limit.

use cse_fmapi_protocol::isc::IscMsgLimit;
use cse_fmapi_protocol::FmApiResponse;
use cse_switch::CxlSwitch;
use tracing::{debug, warn};

use super::Outcome;

pub fn id(switch: &CxlSwitch) -> Outcome {
    debug!("cmd: isc identify");
    Outcome::ok(FmApiResponse::IscId(switch.isc_identity()))
}

pub fn bos(switch: &CxlSwitch) -> Outcome {
    debug!("cmd: isc background operation status");
    Outcome::ok(FmApiResponse::IscBos(switch.bos_status()))
}

pub fn msg_limit_get(switch: &CxlSwitch) -> Outcome {
    debug!("cmd: isc get response message limit");
    Outcome::ok(FmApiResponse::IscMsgLimit(IscMsgLimit {
        limit: switch.msg_rsp_limit_n,
    }))
}

pub fn msg_limit_set(switch: &mut CxlSwitch, req: &IscMsgLimit) -> Outcome {
    debug!(limit = req.limit, "cmd: isc set response message limit");
    if !(8..=20).contains(&req.limit) {
        warn!(limit = req.limit, "message limit outside 8..=20");
        return Outcome::invalid();
    }
    switch.msg_rsp_limit_n = req.limit;
    Outcome::ok(FmApiResponse::IscMsgLimit(IscMsgLimit {
        limit: switch.msg_rsp_limit_n,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cse_fmapi_protocol::FmRc;

    #[test]
    fn msg_limit_set_enforces_range() {
        let mut sw = CxlSwitch::new(4, 2, 16);
        assert_eq!(msg_limit_set(&mut sw, &IscMsgLimit { limit: 7 }).rc, FmRc::InvalidInput);
        assert_eq!(msg_limit_set(&mut sw, &IscMsgLimit { limit: 21 }).rc, FmRc::InvalidInput);
        assert_eq!(sw.msg_rsp_limit_n, 13);

        let out = msg_limit_set(&mut sw, &IscMsgLimit { limit: 20 });
        assert_eq!(out.rc, FmRc::Success);
        assert_eq!(sw.msg_rsp_limit_n, 20);
        assert_eq!(
            out.rsp,
            FmApiResponse::IscMsgLimit(IscMsgLimit { limit: 20 })
        );
    }

    #[test]
    fn bos_reflects_last_background_command() {
        let mut sw = CxlSwitch::new(4, 2, 16);
        sw.bos.complete(0x5301);
        let out = bos(&sw);
        match out.rsp {
            FmApiResponse::IscBos(rsp) => {
                assert_eq!(rsp.pcnt, 100);
                assert_eq!(rsp.opcode, 0x5301);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
