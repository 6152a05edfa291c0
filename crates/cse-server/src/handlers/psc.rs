//! Physical switch commands: identify, port state, port control, and PPB
//! config-space access.

use cse_fmapi_protocol::psc::{
    PscCfgReq, PscCfgRsp, PscPortCtrlReq, PscPortReq, PscPortRsp, CFG_TYPE_READ, CFG_TYPE_WRITE,
    PSC_PORT_CTRL_ASSERT_PERST, PSC_PORT_CTRL_DEASSERT_PERST, PSC_PORT_CTRL_RESET_PPB,
};
use cse_fmapi_protocol::FmApiResponse;
use cse_switch::CxlSwitch;
use tracing::{debug, info, warn};

use super::Outcome;

pub fn id(switch: &CxlSwitch) -> Outcome {
    debug!("cmd: psc identify switch device");
    Outcome::ok(FmApiResponse::PscId(switch.identity()))
}

/// Report state for each requested port. Out-of-range ids are skipped, not
/// rejected; the response counts only what was included.
pub fn port(switch: &CxlSwitch, req: &PscPortReq) -> Outcome {
    debug!(num = req.ports.len(), "cmd: psc get physical port state");
    let ports = req
        .ports
        .iter()
        .filter_map(|&id| switch.port(id))
        .map(CxlSwitch::port_info)
        .collect();
    Outcome::ok(FmApiResponse::PscPort(PscPortRsp { ports }))
}

pub fn port_ctrl(switch: &mut CxlSwitch, req: &PscPortCtrlReq) -> Outcome {
    debug!(ppid = req.ppid, opcode = req.opcode, "cmd: psc physical port control");
    let Some(port) = switch.port_mut(req.ppid) else {
        warn!(ppid = req.ppid, "port id out of range");
        return Outcome::invalid();
    };
    match req.opcode {
        PSC_PORT_CTRL_ASSERT_PERST => {
            info!(ppid = req.ppid, "asserting PERST#");
            port.perst = 1;
        }
        PSC_PORT_CTRL_DEASSERT_PERST => {
            info!(ppid = req.ppid, "deasserting PERST#");
            port.perst = 0;
        }
        PSC_PORT_CTRL_RESET_PPB => {
            // Nothing to reset on an emulated PPB.
            info!(ppid = req.ppid, "ppb reset");
        }
        opcode => {
            warn!(ppid = req.ppid, opcode, "unknown port control opcode");
            return Outcome::invalid();
        }
    }
    Outcome::ok(FmApiResponse::Empty)
}

pub fn cfg(switch: &mut CxlSwitch, req: &PscCfgReq) -> Outcome {
    debug!(
        ppid = req.ppid,
        reg = req.register(),
        fdbe = req.fdbe,
        ty = req.r#type,
        "cmd: psc cxl.io config"
    );
    let Some(port) = switch.port_mut(req.ppid) else {
        warn!(ppid = req.ppid, "port id out of range");
        return Outcome::invalid();
    };
    match req.r#type {
        CFG_TYPE_READ => {
            let data = port.cfgspace.read(req.register(), req.fdbe);
            Outcome::ok(FmApiResponse::PscCfg(PscCfgRsp { data }))
        }
        CFG_TYPE_WRITE => {
            port.cfgspace.write(req.register(), req.fdbe, &req.data);
            Outcome::ok(FmApiResponse::PscCfg(PscCfgRsp::default()))
        }
        r#type => {
            warn!(ty = r#type, "unknown config transaction type");
            Outcome::invalid()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cse_fmapi_protocol::FmRc;

    #[test]
    fn port_skips_out_of_range_ids() {
        let sw = CxlSwitch::new(32, 4, 256);
        let out = port(
            &sw,
            &PscPortReq {
                ports: vec![0, 32, 33],
            },
        );
        assert_eq!(out.rc, FmRc::Success);
        match out.rsp {
            FmApiResponse::PscPort(rsp) => {
                assert_eq!(rsp.ports.len(), 1);
                assert_eq!(rsp.ports[0].ppid, 0);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn port_ctrl_toggles_perst() {
        let mut sw = CxlSwitch::new(4, 2, 16);
        let out = port_ctrl(
            &mut sw,
            &PscPortCtrlReq {
                ppid: 2,
                opcode: PSC_PORT_CTRL_ASSERT_PERST,
            },
        );
        assert_eq!(out.rc, FmRc::Success);
        assert_eq!(sw.port(2).unwrap().perst, 1);

        port_ctrl(
            &mut sw,
            &PscPortCtrlReq {
                ppid: 2,
                opcode: PSC_PORT_CTRL_DEASSERT_PERST,
            },
        );
        assert_eq!(sw.port(2).unwrap().perst, 0);
    }

    #[test]
    fn port_ctrl_rejects_unknown_opcode() {
        let mut sw = CxlSwitch::new(4, 2, 16);
        let out = port_ctrl(&mut sw, &PscPortCtrlReq { ppid: 0, opcode: 9 });
        assert_eq!(out.rc, FmRc::InvalidInput);
    }

    #[test]
    fn cfg_write_then_read_honors_byte_enables() {
        let mut sw = CxlSwitch::new(4, 2, 16);
        let out = cfg(
            &mut sw,
            &PscCfgReq {
                ppid: 1,
                reg: 0x40,
                ext: 0,
                fdbe: 0b1111,
                r#type: CFG_TYPE_WRITE,
                data: [0x11, 0x22, 0x33, 0x44],
            },
        );
        assert_eq!(out.rc, FmRc::Success);

        let out = cfg(
            &mut sw,
            &PscCfgReq {
                ppid: 1,
                reg: 0x40,
                ext: 0,
                fdbe: 0b0110,
                r#type: CFG_TYPE_READ,
                data: [0; 4],
            },
        );
        assert_eq!(
            out.rsp,
            FmApiResponse::PscCfg(PscCfgRsp {
                data: [0, 0x22, 0x33, 0]
            })
        );
    }
}
