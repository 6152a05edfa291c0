//! Virtual switch commands: VCS info, vPPB bind/unbind, and AER injection.

use cse_fmapi_protocol::vsc::{VscAerReq, VscBindReq, VscInfoReq, VscInfoRsp, VscUnbindReq};
use cse_fmapi_protocol::{FmApiHdr, FmApiResponse, FmRc, FM_MAX_VCS_PER_RSP, LDID_WHOLE_PORT};
use cse_switch::{BindStatus, CxlSwitch, PortState};
use tracing::{debug, info, warn};

use super::Outcome;

/// Report the requested VCSs. Out-of-range ids are skipped; the block count
/// is capped at [`FM_MAX_VCS_PER_RSP`].
pub fn info(switch: &CxlSwitch, req: &VscInfoReq) -> Outcome {
    debug!(
        num = req.vcss.len(),
        start = req.vppbid_start,
        limit = req.vppbid_limit,
        "cmd: vsc get virtual switch info"
    );
    let blocks = req
        .vcss
        .iter()
        .take(FM_MAX_VCS_PER_RSP)
        .filter_map(|&id| switch.vcs(id))
        .map(|vcs| CxlSwitch::vcs_info(vcs, req.vppbid_start, req.vppbid_limit))
        .collect();
    Outcome::ok(FmApiResponse::VscInfo(VscInfoRsp { blocks }))
}

/// Bind a vPPB to a physical port, or to one logical device of an MLD
/// port. Completes synchronously but reports background semantics, so
/// success is `BACKGROUND_OP_STARTED` and the status block reads done.
pub fn bind(switch: &mut CxlSwitch, hdr: &FmApiHdr, req: &VscBindReq) -> Outcome {
    debug!(
        vcsid = req.vcsid,
        vppbid = req.vppbid,
        ppid = req.ppid,
        ldid = format_args!("{:#06x}", req.ldid),
        "cmd: vsc bind vppb"
    );

    let Some(vcs) = switch.vcs(req.vcsid) else {
        warn!(vcsid = req.vcsid, "vcs id out of range");
        return Outcome::invalid();
    };
    if vcs.vppb(req.vppbid).is_none() {
        warn!(vppbid = req.vppbid, num = vcs.num, "vppb id out of range");
        return Outcome::invalid();
    }
    let Some(port) = switch.port(req.ppid) else {
        warn!(ppid = req.ppid, "port id out of range");
        return Outcome::invalid();
    };

    if port.state == PortState::Disabled {
        warn!(ppid = req.ppid, "port is disabled");
        return Outcome::invalid();
    }
    if req.ldid != LDID_WHOLE_PORT && !port.is_type3() {
        warn!(ppid = req.ppid, dt = ?port.dt, "ld bind requires a type-3 device");
        return Outcome::invalid();
    }
    if port.ld > 0 && req.ldid == LDID_WHOLE_PORT {
        warn!(ppid = req.ppid, "cannot bind the physical port of an MLD");
        return Outcome::invalid();
    }
    if req.ldid != LDID_WHOLE_PORT && port.ld == 0 {
        warn!(ppid = req.ppid, "port does not support multiple logical devices");
        return Outcome::invalid();
    }

    let vppb = switch
        .vcs(req.vcsid)
        .and_then(|v| v.vppb(req.vppbid))
        .copied()
        .unwrap_or_default();
    if vppb.bind_status != BindStatus::Unbound {
        warn!(
            vppbid = req.vppbid,
            status = ?vppb.bind_status,
            "vppb is not available to bind"
        );
        return Outcome::invalid();
    }

    info!(
        vcsid = req.vcsid,
        vppbid = req.vppbid,
        ppid = req.ppid,
        ldid = format_args!("{:#06x}", req.ldid),
        "binding vppb"
    );
    let slot = switch
        .vcs_mut(req.vcsid)
        .and_then(|v| v.vppb_mut(req.vppbid))
        .expect("validated above");
    if req.ldid != LDID_WHOLE_PORT {
        slot.bind_status = BindStatus::BoundLd;
        slot.ppid = req.ppid;
        slot.ldid = req.ldid;
    } else {
        slot.bind_status = BindStatus::BoundPort;
        slot.ppid = req.ppid;
        slot.ldid = 0;
    }
    if let Some(port) = switch.port_mut(req.ppid) {
        port.state = PortState::Dsp;
    }
    switch.bos.complete(hdr.opcode);

    Outcome {
        rc: FmRc::BackgroundOpStarted,
        rsp: FmApiResponse::Empty,
    }
}

/// Release a vPPB's binding. Same background semantics as bind.
pub fn unbind(switch: &mut CxlSwitch, hdr: &FmApiHdr, req: &VscUnbindReq) -> Outcome {
    debug!(vcsid = req.vcsid, vppbid = req.vppbid, "cmd: vsc unbind vppb");

    let Some(vcs) = switch.vcs(req.vcsid) else {
        warn!(vcsid = req.vcsid, "vcs id out of range");
        return Outcome::invalid();
    };
    let Some(vppb) = vcs.vppb(req.vppbid).copied() else {
        warn!(vppbid = req.vppbid, num = vcs.num, "vppb id out of range");
        return Outcome::invalid();
    };

    if matches!(vppb.bind_status, BindStatus::Unbound | BindStatus::InProgress) {
        warn!(vppbid = req.vppbid, status = ?vppb.bind_status, "vppb is not bound");
        return Outcome::invalid();
    }

    // A binding that points at a vanished port cannot be released, only
    // reported; error responses leave the model untouched.
    if switch.port(vppb.ppid).is_none() {
        warn!(ppid = vppb.ppid, "bound port id out of range");
        return Outcome::invalid();
    }

    let port_state = switch.port(vppb.ppid).map(|p| p.state).unwrap_or_default();
    if !matches!(
        port_state,
        PortState::Binding | PortState::Unbinding | PortState::Usp | PortState::Dsp
    ) {
        warn!(ppid = vppb.ppid, state = ?port_state, "port is not in a bound state");
        return Outcome::invalid();
    }

    info!(vcsid = req.vcsid, vppbid = req.vppbid, "unbinding vppb");
    let slot = switch
        .vcs_mut(req.vcsid)
        .and_then(|v| v.vppb_mut(req.vppbid))
        .expect("validated above");
    slot.bind_status = BindStatus::Unbound;
    slot.ppid = 0;
    slot.ldid = 0;
    switch.bos.complete(hdr.opcode);

    Outcome {
        rc: FmRc::BackgroundOpStarted,
        rsp: FmApiResponse::Empty,
    }
}

/// Record an AER injection request. Error injection itself is not emulated;
/// the command validates and logs.
pub fn aer(switch: &CxlSwitch, req: &VscAerReq) -> Outcome {
    debug!(
        vcsid = req.vcsid,
        vppbid = req.vppbid,
        error_type = format_args!("{:#010x}", req.error_type),
        "cmd: vsc generate aer"
    );
    let Some(vcs) = switch.vcs(req.vcsid) else {
        warn!(vcsid = req.vcsid, "vcs id out of range");
        return Outcome::invalid();
    };
    if vcs.vppb(req.vppbid).is_none() {
        warn!(vppbid = req.vppbid, num = vcs.num, "vppb id out of range");
        return Outcome::invalid();
    }
    info!(
        vcsid = req.vcsid,
        vppbid = req.vppbid,
        error_type = format_args!("{:#010x}", req.error_type),
        "aer event recorded"
    );
    Outcome::ok(FmApiResponse::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cse_switch::{DevType, DeviceEntry, Mld};

    fn switch_with_bound_setup() -> CxlSwitch {
        let mut sw = CxlSwitch::new(32, 4, 256);
        sw.vcss[0].num = 8;
        let mut entry = DeviceEntry::new("mld_5x8_2.0_4G");
        entry.dt = DevType::CxlType3Pooled;
        entry.mld = Some(Mld::new(4));
        sw.set_device(0, entry);
        sw.connect_device(1, 0).unwrap();
        sw
    }

    #[test]
    fn bind_then_info_reports_bound_ld() {
        let mut sw = switch_with_bound_setup();
        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_BIND, 6);
        let out = bind(
            &mut sw,
            &hdr,
            &VscBindReq {
                vcsid: 0,
                vppbid: 1,
                ppid: 1,
                ldid: 0,
            },
        );
        assert_eq!(out.rc, FmRc::BackgroundOpStarted);
        assert_eq!(sw.bos.pcnt, 100);
        assert_eq!(sw.bos.opcode, cse_fmapi_protocol::FMOP_VSC_BIND);

        let out = info(
            &sw,
            &VscInfoReq {
                vppbid_start: 0,
                vppbid_limit: 8,
                vcss: vec![0],
            },
        );
        match out.rsp {
            FmApiResponse::VscInfo(rsp) => {
                let blk = &rsp.blocks[0];
                assert_eq!(blk.vppbs[1].status, BindStatus::BoundLd as u8);
                assert_eq!(blk.vppbs[1].ppid, 1);
                assert_eq!(blk.vppbs[1].ldid, 0);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn bind_rejects_bad_vcs_and_leaves_state_alone() {
        let mut sw = switch_with_bound_setup();
        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_BIND, 6);
        let out = bind(
            &mut sw,
            &hdr,
            &VscBindReq {
                vcsid: 99,
                vppbid: 1,
                ppid: 1,
                ldid: 0,
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);
        assert!(sw.vcss[0]
            .vppbs
            .iter()
            .all(|b| b.bind_status == BindStatus::Unbound));
    }

    #[test]
    fn bind_whole_port_of_mld_is_rejected() {
        let mut sw = switch_with_bound_setup();
        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_BIND, 6);
        let out = bind(
            &mut sw,
            &hdr,
            &VscBindReq {
                vcsid: 0,
                vppbid: 1,
                ppid: 1,
                ldid: LDID_WHOLE_PORT,
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);
    }

    #[test]
    fn bind_ld_on_sld_is_rejected() {
        let mut sw = switch_with_bound_setup();
        // Port 2: a plain type-3 device without multiple LDs.
        let mut entry = DeviceEntry::new("sld_8G");
        entry.dt = DevType::CxlType3;
        sw.set_device(1, entry);
        sw.connect_device(2, 1).unwrap();

        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_BIND, 6);
        let out = bind(
            &mut sw,
            &hdr,
            &VscBindReq {
                vcsid: 0,
                vppbid: 1,
                ppid: 2,
                ldid: 1,
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);

        // Whole-port bind of the SLD is fine.
        let out = bind(
            &mut sw,
            &hdr,
            &VscBindReq {
                vcsid: 0,
                vppbid: 1,
                ppid: 2,
                ldid: LDID_WHOLE_PORT,
            },
        );
        assert_eq!(out.rc, FmRc::BackgroundOpStarted);
        assert_eq!(sw.vcss[0].vppbs[1].bind_status, BindStatus::BoundPort);
        assert_eq!(sw.vcss[0].vppbs[1].ldid, 0);
    }

    #[test]
    fn unbind_restores_unbound_defaults() {
        let mut sw = switch_with_bound_setup();
        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_BIND, 6);
        bind(
            &mut sw,
            &hdr,
            &VscBindReq {
                vcsid: 0,
                vppbid: 1,
                ppid: 1,
                ldid: 2,
            },
        );

        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_UNBIND, 3);
        let out = unbind(
            &mut sw,
            &hdr,
            &VscUnbindReq {
                vcsid: 0,
                vppbid: 1,
                option: 0,
            },
        );
        assert_eq!(out.rc, FmRc::BackgroundOpStarted);
        let vppb = sw.vcss[0].vppbs[1];
        assert_eq!(vppb.bind_status, BindStatus::Unbound);
        assert_eq!(vppb.ppid, 0);
        assert_eq!(vppb.ldid, 0);
        assert_eq!(sw.bos.opcode, cse_fmapi_protocol::FMOP_VSC_UNBIND);
    }

    #[test]
    fn unbind_of_unbound_vppb_is_rejected() {
        let mut sw = switch_with_bound_setup();
        let hdr = FmApiHdr::request(0, cse_fmapi_protocol::FMOP_VSC_UNBIND, 3);
        let out = unbind(
            &mut sw,
            &hdr,
            &VscUnbindReq {
                vcsid: 0,
                vppbid: 1,
                option: 0,
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);
    }

    #[test]
    fn info_caps_block_count() {
        let mut sw = CxlSwitch::new(4, 16, 16);
        for vcs in &mut sw.vcss {
            vcs.num = 1;
        }
        let out = info(
            &sw,
            &VscInfoReq {
                vppbid_start: 0,
                vppbid_limit: 1,
                vcss: (0..16).collect(),
            },
        );
        match out.rsp {
            FmApiResponse::VscInfo(rsp) => assert_eq!(rsp.blocks.len(), FM_MAX_VCS_PER_RSP),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
