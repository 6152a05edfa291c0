//! MLD port commands: per-LD config space, the bounded memory window, and
//! the tunneled component commands.

use cse_fmapi_protocol::mpc::{MpcCfgReq, MpcCfgRsp, MpcMemReq, MpcMemRsp, MpcTmcReq, MpcTmcRsp};
use cse_fmapi_protocol::psc::{CFG_TYPE_READ, CFG_TYPE_WRITE};
use cse_fmapi_protocol::{
    FmApiHdr, FmApiResponse, FmMsgCategory, FmRc, MCTP_TYPE_CXL_CCI, FM_MAX_MEM_XFER,
};
use cse_fmapi_protocol::mcc::MccRequest;
use cse_fmapi_protocol::{DecodeError, FM_HDR_LEN};
use cse_switch::CxlSwitch;
use tracing::{debug, warn};

use super::{mcc, Outcome};

pub fn cfg(switch: &mut CxlSwitch, req: &MpcCfgReq) -> Outcome {
    debug!(
        ppid = req.ppid,
        ldid = req.ldid,
        reg = req.register(),
        ty = req.r#type,
        "cmd: mpc ld cxl.io config"
    );
    let Some(port) = switch.port_mut(req.ppid) else {
        warn!(ppid = req.ppid, "port id out of range");
        return Outcome::invalid();
    };
    if !port.is_type3() {
        warn!(ppid = req.ppid, dt = ?port.dt, "port is not a type-3 device");
        return Outcome::invalid();
    }
    if req.ldid >= u16::from(port.ld) {
        warn!(ldid = req.ldid, ld = port.ld, "ld id exceeds the port's ld count");
        return Outcome::invalid();
    }
    let Some(mld) = port.mld.as_mut() else {
        warn!(ppid = req.ppid, "port has no mld state");
        return Outcome::invalid();
    };
    let cfgspace = &mut mld.cfgspace[usize::from(req.ldid)];
    match req.r#type {
        CFG_TYPE_READ => {
            let data = cfgspace.read(req.register(), req.fdbe);
            Outcome::ok(FmApiResponse::MpcCfg(MpcCfgRsp { data }))
        }
        CFG_TYPE_WRITE => {
            cfgspace.write(req.register(), req.fdbe, &req.data);
            Outcome::ok(FmApiResponse::MpcCfg(MpcCfgRsp::default()))
        }
        r#type => {
            warn!(ty = r#type, "unknown config transaction type");
            Outcome::invalid()
        }
    }
}

/// Read or write up to 4 KiB of one LD's memory through the backing map.
pub fn mem(switch: &mut CxlSwitch, req: &MpcMemReq) -> Outcome {
    debug!(
        ppid = req.ppid,
        ldid = req.ldid,
        offset = format_args!("{:#x}", req.offset),
        len = req.len,
        ty = req.r#type,
        "cmd: mpc ld memory"
    );
    let Some(port) = switch.port_mut(req.ppid) else {
        warn!(ppid = req.ppid, "port id out of range");
        return Outcome::invalid();
    };
    if !port.is_type3() {
        warn!(ppid = req.ppid, dt = ?port.dt, "port is not a type-3 device");
        return Outcome::invalid();
    }
    if req.ldid >= u16::from(port.ld) {
        warn!(ldid = req.ldid, ld = port.ld, "ld id exceeds the port's ld count");
        return Outcome::invalid();
    }
    let Some(mld) = port.mld.as_mut() else {
        warn!(ppid = req.ppid, "port has no mld state");
        return Outcome::invalid();
    };
    if mld.memspace.is_none() {
        warn!(ppid = req.ppid, "port has no mapped memory space");
        return Outcome::unsupported();
    }
    if usize::from(req.len) > FM_MAX_MEM_XFER {
        warn!(len = req.len, "transfer length exceeds 4096");
        return Outcome::invalid();
    }

    let (base, max) = mld.ld_range(req.ldid);
    let ld_size = max.saturating_sub(base);
    let Some(end) = req.offset.checked_add(u64::from(req.len)) else {
        warn!(offset = format_args!("{:#x}", req.offset), "offset overflow");
        return Outcome::invalid();
    };
    if end >= ld_size {
        warn!(
            offset = format_args!("{:#x}", req.offset),
            len = req.len,
            ld_size,
            "offset + len exceeds the ld"
        );
        return Outcome::invalid();
    }

    let memspace = mld.memspace.as_mut().expect("checked above");
    // LD ranges come from configuration; the mapping is sized by
    // memory_size. The two must agree before bytes move.
    if base.saturating_add(end) > memspace.len() as u64 {
        warn!(
            base = format_args!("{base:#x}"),
            offset = format_args!("{:#x}", req.offset),
            "ld range exceeds the mapped image"
        );
        return Outcome::invalid();
    }
    match req.r#type {
        CFG_TYPE_READ => {
            let mut data = vec![0u8; usize::from(req.len)];
            memspace.read(base + req.offset, &mut data);
            Outcome::ok(FmApiResponse::MpcMem(MpcMemRsp { len: req.len, data }))
        }
        CFG_TYPE_WRITE => {
            if req.data.len() != usize::from(req.len) {
                warn!(
                    len = req.len,
                    got = req.data.len(),
                    "write data does not match the declared length"
                );
                return Outcome::invalid();
            }
            memspace.write(base + req.offset, &req.data);
            Outcome::ok(FmApiResponse::MpcMem(MpcMemRsp {
                len: 0,
                data: Vec::new(),
            }))
        }
        r#type => {
            warn!(ty = r#type, "unknown memory transaction type");
            Outcome::invalid()
        }
    }
}

/// Encode a complete inner FM API message: header plus payload.
fn inner_message(hdr: &FmApiHdr, payload: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(FM_HDR_LEN + payload.len());
    msg.extend_from_slice(&hdr.to_bytes());
    msg.extend_from_slice(payload);
    msg
}

/// Build an inner error response: a bare header with the given return code.
fn inner_error(tag: u8, opcode: u16, rc: FmRc) -> Vec<u8> {
    inner_message(&FmApiHdr::response(tag, opcode, 0, rc), &[])
}

/// Tunnel a component command to the MLD behind a port.
///
/// The inner message is a complete FM API message of the MCC family. The
/// outer response is SUCCESS whenever a well-formed inner response could be
/// produced, even if that inner response reports an error; only a
/// malformed tunnel fails the outer command. The lock is already held, so
/// the inner handlers are called directly.
pub fn tmc(switch: &mut CxlSwitch, req: &MpcTmcReq) -> Outcome {
    debug!(ppid = req.ppid, inner_len = req.msg.len(), "cmd: mpc tunnel management command");

    if req.r#type != MCTP_TYPE_CXL_CCI {
        warn!(ty = req.r#type, "tunneled message is not a cxl cci message");
        return Outcome::invalid();
    }
    let port_index = usize::from(req.ppid);
    if port_index >= switch.num_ports() {
        warn!(ppid = req.ppid, "port id out of range");
        return Outcome::invalid();
    }
    if !switch.ports[port_index].is_type3() {
        warn!(ppid = req.ppid, "port is not a type-3 device");
        return Outcome::invalid();
    }

    let inner_hdr = match FmApiHdr::decode(&req.msg) {
        Ok(hdr) => hdr,
        Err(err) => {
            warn!(%err, "tunneled message header is malformed");
            return Outcome::invalid();
        }
    };

    let msg = if inner_hdr.category != FmMsgCategory::Request {
        warn!("tunneled message is not a request");
        inner_error(inner_hdr.tag, inner_hdr.opcode, FmRc::InvalidInput)
    } else {
        match MccRequest::decode(inner_hdr.opcode, &req.msg[FM_HDR_LEN..]) {
            Ok(mcc_req) => {
                let port = &mut switch.ports[port_index];
                let (rc, payload) = mcc::handle(port, &mcc_req);
                let hdr =
                    FmApiHdr::response(inner_hdr.tag, inner_hdr.opcode, payload.len() as u32, rc);
                inner_message(&hdr, &payload)
            }
            Err(DecodeError::UnknownOpcode { opcode }) => {
                warn!(opcode = format_args!("{opcode:#06x}"), "tunneled opcode is not a component command");
                inner_error(inner_hdr.tag, inner_hdr.opcode, FmRc::Unsupported)
            }
            Err(err) => {
                warn!(%err, "tunneled request payload is malformed");
                inner_error(inner_hdr.tag, inner_hdr.opcode, FmRc::InvalidInput)
            }
        }
    };

    Outcome::ok(FmApiResponse::MpcTmc(MpcTmcRsp {
        r#type: req.r#type,
        msg,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cse_switch::{DevType, DeviceEntry, Granularity, Mld};

    fn switch_with_mapped_mld() -> (CxlSwitch, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut sw = CxlSwitch::new(32, 4, 256);
        sw.dir = Some(dir.path().to_path_buf());
        let mut entry = DeviceEntry::new("mld_5x8_2.0_4G");
        entry.dt = DevType::CxlType3Pooled;
        let mut mld = Mld::new(4);
        mld.granularity = Granularity::Mib256;
        // One granule per LD; the sparse backing file stays untouched until
        // a write lands.
        for i in 0..4u64 {
            mld.rng1[i as usize] = i;
            mld.rng2[i as usize] = i;
        }
        mld.memory_size = 4 * 256 * 1024 * 1024;
        mld.want_mmap = true;
        entry.mld = Some(mld);
        sw.set_device(0, entry);
        sw.connect_device(1, 0).unwrap();
        (sw, dir)
    }

    #[test]
    fn mem_write_then_read_round_trips() {
        let (mut sw, _dir) = switch_with_mapped_mld();
        let out = mem(
            &mut sw,
            &MpcMemReq {
                ppid: 1,
                ldid: 0,
                r#type: CFG_TYPE_WRITE,
                offset: 0x1000,
                len: 4,
                data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            },
        );
        assert_eq!(out.rc, FmRc::Success);

        let out = mem(
            &mut sw,
            &MpcMemReq {
                ppid: 1,
                ldid: 0,
                r#type: CFG_TYPE_READ,
                offset: 0x1000,
                len: 4,
                data: Vec::new(),
            },
        );
        assert_eq!(out.rc, FmRc::Success);
        assert_eq!(
            out.rsp,
            FmApiResponse::MpcMem(MpcMemRsp {
                len: 4,
                data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            })
        );
    }

    #[test]
    fn mem_without_mapping_is_unsupported() {
        let mut sw = CxlSwitch::new(4, 2, 16);
        let mut entry = DeviceEntry::new("mld_nomap");
        entry.dt = DevType::CxlType3Pooled;
        entry.mld = Some(Mld::new(2));
        sw.set_device(0, entry);
        sw.connect_device(1, 0).unwrap();

        let out = mem(
            &mut sw,
            &MpcMemReq {
                ppid: 1,
                ldid: 0,
                r#type: CFG_TYPE_READ,
                offset: 0,
                len: 4,
                data: Vec::new(),
            },
        );
        assert_eq!(out.rc, FmRc::Unsupported);
    }

    #[test]
    fn mem_rejects_out_of_ld_window() {
        let (mut sw, _dir) = switch_with_mapped_mld();
        // LD 0 spans one 256 MiB granule; a transfer crossing its end must
        // fail.
        let out = mem(
            &mut sw,
            &MpcMemReq {
                ppid: 1,
                ldid: 0,
                r#type: CFG_TYPE_READ,
                offset: 256 * 1024 * 1024 - 2,
                len: 4,
                data: Vec::new(),
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);
    }

    #[test]
    fn cfg_targets_the_selected_ld() {
        let (mut sw, _dir) = switch_with_mapped_mld();
        cfg(
            &mut sw,
            &MpcCfgReq {
                ppid: 1,
                ldid: 2,
                reg: 0x40,
                ext: 0,
                fdbe: 0b0001,
                r#type: CFG_TYPE_WRITE,
                data: [0x5A, 0, 0, 0],
            },
        );
        let mld = sw.port(1).unwrap().mld.as_ref().unwrap();
        assert_eq!(mld.cfgspace[2].as_bytes()[0x40], 0x5A);
        assert_eq!(mld.cfgspace[0].as_bytes()[0x40], 0x00);
    }

    #[test]
    fn cfg_rejects_ld_out_of_range() {
        let (mut sw, _dir) = switch_with_mapped_mld();
        let out = cfg(
            &mut sw,
            &MpcCfgReq {
                ppid: 1,
                ldid: 4,
                ..Default::default()
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);
    }

    #[test]
    fn tmc_rejects_non_cci_tunnel() {
        let (mut sw, _dir) = switch_with_mapped_mld();
        let out = tmc(
            &mut sw,
            &MpcTmcReq {
                ppid: 1,
                r#type: 0x07,
                msg: Vec::new(),
            },
        );
        assert_eq!(out.rc, FmRc::InvalidInput);
    }

    #[test]
    fn tmc_answers_unknown_inner_opcode_with_inner_unsupported() {
        let (mut sw, _dir) = switch_with_mapped_mld();
        let inner = FmApiHdr::request(5, 0x1234, 0).to_bytes().to_vec();
        let out = tmc(
            &mut sw,
            &MpcTmcReq {
                ppid: 1,
                r#type: MCTP_TYPE_CXL_CCI,
                msg: inner,
            },
        );
        assert_eq!(out.rc, FmRc::Success);
        match out.rsp {
            FmApiResponse::MpcTmc(rsp) => {
                let hdr = FmApiHdr::decode(&rsp.msg).unwrap();
                assert_eq!(hdr.rc, u16::from(FmRc::Unsupported));
                assert_eq!(hdr.len, 0);
                assert_eq!(hdr.tag, 5);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
}
