//! End-to-end scenarios driven through the dispatcher: requests enter as
//! MCTP-framed byte payloads and come back as framed responses, exactly as
//! a Fabric Manager would see them.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use cse_emapi_protocol::{EmApiHdr, EmRc, EMOP_CONN_DEV, EMOP_DISCON_DEV, MCTP_TYPE_CSE};
use cse_fmapi_protocol::isc::{IscBosRsp, IscMsgLimit};
use cse_fmapi_protocol::mcc::{MccBwGetReq, MccBwList};
use cse_fmapi_protocol::mpc::{MpcMemReq, MpcMemRsp, MpcTmcReq, MpcTmcRsp};
use cse_fmapi_protocol::psc::{PscPortReq, PscPortRsp, CFG_TYPE_READ, CFG_TYPE_WRITE};
use cse_fmapi_protocol::vsc::{VscBindReq, VscInfoReq, VscInfoRsp};
use cse_fmapi_protocol::{
    FmApiHdr, FmApiRequest, FmMsgCategory, FmRc, FM_HDR_LEN, MCTP_TYPE_CXL_CCI,
    MCTP_TYPE_CXL_FMAPI,
};
use cse_server::config;
use cse_server::transport::{self, RequestAction, ResponseAction};
use cse_server::Dispatcher;
use cse_switch::{BindStatus, CxlSwitch};

struct Harness {
    dispatcher: Dispatcher,
    switch: Arc<Mutex<CxlSwitch>>,
    outbound: Receiver<ResponseAction>,
    _dir: Option<tempfile::TempDir>,
}

fn harness_from_yaml(doc: &str, dir: Option<tempfile::TempDir>) -> Harness {
    let parsed: config::Document = serde_yaml::from_str(doc).unwrap();
    let (switch, _settings) = config::build(parsed);
    let switch = Arc::new(Mutex::new(switch));
    let (_in_tx, _in_rx, queues, out_rx, _done_rx) = transport::queues();
    Harness {
        dispatcher: Dispatcher::new(Arc::clone(&switch), transport::LOCAL_EID, queues),
        switch,
        outbound: out_rx,
        _dir: dir,
    }
}

/// The reference topology: a 32-port switch with one 4-LD pooled device on
/// port 1, another on port 2, and VCS 0 carved with eight vPPBs.
fn reference_yaml(dir: Option<&std::path::Path>) -> String {
    let emulator = match dir {
        Some(path) => format!("emulator:\n  dir: {}\n", path.display()),
        None => String::new(),
    };
    format!(
        r#"{emulator}devices:
  mld_5x8_2.0_4G:
    did: 3
    port: {{ dv: 2, dt: 5, cv: 1, mlw: 8, mls: 5 }}
    mld:
      memory_size: 0x40000000
      num: 4
      granularity: 0
      rng1: [0, 1, 2, 3]
      rng2: [0, 1, 2, 3]
      alloc_bw: [16, 16, 16, 16]
      mmap: 1
  mld_5x8_1.1_4G:
    did: 5
    port: {{ dv: 1, dt: 5, cv: 1, mlw: 8, mls: 4 }}
    mld:
      memory_size: 0x40000000
      num: 4
      granularity: 0
      rng1: [0, 1, 2, 3]
      rng2: [0, 1, 2, 3]
switch:
  max_msg_size_n: 13
  num_ports: 32
  num_vcss: 4
  num_vppbs: 256
ports:
  1: {{ device: mld_5x8_2.0_4G }}
  2: {{ device: mld_5x8_2.0_4G }}
  10: {{ state: 0 }}
vcss:
  0:
    state: 1
    uspid: 0
    num_vppb: 8
"#
    )
}

fn reference_harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let doc = reference_yaml(Some(dir.path()));
    harness_from_yaml(&doc, Some(dir))
}

impl Harness {
    fn send_fm(&self, tag: u8, req: &FmApiRequest) -> (FmApiHdr, Vec<u8>) {
        let mut body = Vec::new();
        let (opcode, len) = req.encode(&mut body);
        let mut payload = FmApiHdr::request(tag, opcode, len as u32).to_bytes().to_vec();
        payload.extend_from_slice(&body);
        self.dispatcher.process(RequestAction {
            src: 8,
            dst: transport::LOCAL_EID,
            tag,
            msg_type: MCTP_TYPE_CXL_FMAPI,
            payload,
        });
        let rsp = self.outbound.try_recv().expect("a response");
        assert_eq!(rsp.msg_type, MCTP_TYPE_CXL_FMAPI);
        assert_eq!(rsp.dst, 8);
        let hdr = FmApiHdr::decode(&rsp.payload).unwrap();
        self.check_invariants();
        (hdr, rsp.payload[FM_HDR_LEN..].to_vec())
    }

    fn send_em(&self, tag: u8, opcode: u16, a: u8, b: u8) -> (EmApiHdr, Vec<u8>) {
        let payload = EmApiHdr::request(tag, opcode, a, b).to_bytes().to_vec();
        self.dispatcher.process(RequestAction {
            src: 8,
            dst: transport::LOCAL_EID,
            tag,
            msg_type: MCTP_TYPE_CSE,
            payload,
        });
        let rsp = self.outbound.try_recv().expect("a response");
        assert_eq!(rsp.msg_type, MCTP_TYPE_CSE);
        let hdr = EmApiHdr::decode(&rsp.payload).unwrap();
        self.check_invariants();
        (hdr, rsp.payload[cse_emapi_protocol::EM_HDR_LEN..].to_vec())
    }

    /// Tunnel an MCC request to `ppid` and return the inner header and
    /// payload.
    fn send_tunneled(&self, ppid: u8, opcode: u16, body: &[u8]) -> (FmApiHdr, Vec<u8>) {
        let mut inner = FmApiHdr::request(1, opcode, body.len() as u32)
            .to_bytes()
            .to_vec();
        inner.extend_from_slice(body);
        let (hdr, payload) = self.send_fm(
            6,
            &FmApiRequest::MpcTmc(MpcTmcReq {
                ppid,
                r#type: MCTP_TYPE_CXL_CCI,
                msg: inner,
            }),
        );
        assert_eq!(hdr.rc, u16::from(FmRc::Success));
        let rsp = MpcTmcRsp::decode(&payload).unwrap();
        let inner_hdr = FmApiHdr::decode(&rsp.msg).unwrap();
        (inner_hdr, rsp.msg[FM_HDR_LEN..].to_vec())
    }

    /// The model invariants hold after every request.
    fn check_invariants(&self) {
        let switch = self.switch.lock().unwrap();
        let total: u16 = switch.vcss.iter().map(|v| v.num).sum();
        assert!(switch.active_vppbs() <= total);
        assert!((8..=20).contains(&switch.msg_rsp_limit_n));
        for vcs in &switch.vcss {
            for vppb in vcs.vppbs.iter().take(usize::from(vcs.num)) {
                if vppb.bind_status == BindStatus::BoundLd {
                    let port = switch.port(vppb.ppid).expect("bound port exists");
                    assert!(
                        vppb.ldid == 0xFFFF || vppb.ldid < u16::from(port.ld),
                        "bound ldid within the port's ld count"
                    );
                }
            }
        }
        for port in &switch.ports {
            if let Some(mld) = &port.mld {
                // Nothing in these scenarios writes out-of-domain QoS
                // values, so the documented ranges must hold throughout.
                assert!(mld.egress_mod_pcnt <= 100);
                assert!(mld.egress_sev_pcnt <= 100);
                assert!(mld.sample_interval <= 15);
                if let Some(memspace) = &mld.memspace {
                    assert!(!memspace.path().as_os_str().is_empty());
                }
            }
        }
    }
}

#[test]
fn identify_reports_the_documented_identity() {
    let harness = reference_harness();
    let (hdr, payload) = harness.send_fm(3, &FmApiRequest::PscId);

    assert_eq!(hdr.category, FmMsgCategory::Response);
    assert_eq!(hdr.tag, 3);
    assert_eq!(hdr.opcode, 0x5100);
    assert!(!hdr.background);
    assert_eq!(hdr.len, 44);
    assert_eq!(hdr.rc, 0);
    assert_eq!(
        &payload[..19],
        &[
            0xB2, 0xB1, 0xC2, 0xC1, 0xD2, 0xD1, 0xE2, 0xE1, // vid/did/svid/ssid
            0xA8, 0xA7, 0xA6, 0xA5, 0xA4, 0xA3, 0xA2, 0xA1, // sn
            0x01, 0x20, 0x04, // ingress, 32 ports, 4 VCSs
        ]
    );
}

#[test]
fn bind_then_list_vcs() {
    let harness = reference_harness();

    let (hdr, _) = harness.send_fm(
        0,
        &FmApiRequest::VscBind(VscBindReq {
            vcsid: 0,
            vppbid: 1,
            ppid: 1,
            ldid: 0,
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::BackgroundOpStarted));

    let (hdr, payload) = harness.send_fm(
        1,
        &FmApiRequest::VscInfo(VscInfoReq {
            vppbid_start: 0,
            vppbid_limit: 8,
            vcss: vec![0],
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::Success));
    let rsp = VscInfoRsp::decode(&payload).unwrap();
    assert_eq!(rsp.blocks.len(), 1);
    let entry = rsp.blocks[0].vppbs[1];
    assert_eq!(entry.status, BindStatus::BoundLd as u8);
    assert_eq!(entry.ppid, 1);
    assert_eq!(entry.ldid, 0);

    let (hdr, payload) = harness.send_fm(2, &FmApiRequest::IscBos);
    assert_eq!(hdr.rc, u16::from(FmRc::Success));
    let bos = IscBosRsp::decode(&payload).unwrap();
    assert_eq!(bos.pcnt, 100);
    assert_eq!(bos.opcode, 0x5301);
    assert_eq!(bos.running, 0);
}

#[test]
fn invalid_bind_changes_nothing() {
    let harness = reference_harness();
    let (hdr, payload) = harness.send_fm(
        0,
        &FmApiRequest::VscBind(VscBindReq {
            vcsid: 99,
            vppbid: 1,
            ppid: 1,
            ldid: 0,
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::InvalidInput));
    assert_eq!(hdr.len, 0);
    assert!(payload.is_empty());

    let switch = harness.switch.lock().unwrap();
    assert!(switch
        .vcss
        .iter()
        .flat_map(|v| v.vppbs.iter())
        .all(|b| b.bind_status == BindStatus::Unbound));
}

#[test]
fn mld_memory_write_read_round_trip() {
    let harness = reference_harness();

    let (hdr, _) = harness.send_fm(
        0,
        &FmApiRequest::MpcMem(MpcMemReq {
            ppid: 1,
            ldid: 0,
            r#type: CFG_TYPE_WRITE,
            offset: 0x1000,
            len: 4,
            data: vec![0xDE, 0xAD, 0xBE, 0xEF],
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::Success));

    let (hdr, payload) = harness.send_fm(
        1,
        &FmApiRequest::MpcMem(MpcMemReq {
            ppid: 1,
            ldid: 0,
            r#type: CFG_TYPE_READ,
            offset: 0x1000,
            len: 4,
            data: Vec::new(),
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::Success));
    let rsp = MpcMemRsp::decode(&payload).unwrap();
    assert_eq!(rsp.data, [0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn qos_bw_alloc_set_get_through_the_tunnel() {
    let harness = reference_harness();

    let mut body = Vec::new();
    MccBwList {
        start: 1,
        list: vec![0x40, 0x80],
    }
    .encode(&mut body);
    let (inner, _) =
        harness.send_tunneled(2, cse_fmapi_protocol::FMOP_MCC_QOS_BW_ALLOC_SET, &body);
    assert_eq!(inner.rc, u16::from(FmRc::Success));

    let mut body = Vec::new();
    MccBwGetReq { num: 4, start: 0 }.encode(&mut body);
    let (inner, payload) =
        harness.send_tunneled(2, cse_fmapi_protocol::FMOP_MCC_QOS_BW_ALLOC_GET, &body);
    assert_eq!(inner.rc, u16::from(FmRc::Success));
    let rsp = MccBwList::decode(&payload).unwrap();
    assert_eq!(rsp.list, [16, 0x40, 0x80, 16]);
}

#[test]
fn emulator_connect_then_disconnect() {
    let harness = reference_harness();

    let (hdr, _) = harness.send_em(0, EMOP_CONN_DEV, 10, 5);
    assert_eq!(hdr.rc, u16::from(EmRc::Success));

    let (hdr, payload) = harness.send_fm(
        1,
        &FmApiRequest::PscPort(PscPortReq { ports: vec![10] }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::Success));
    let rsp = PscPortRsp::decode(&payload).unwrap();
    assert_eq!(rsp.ports.len(), 1);
    assert_eq!(rsp.ports[0].dt, 5);
    assert_eq!(rsp.ports[0].prsnt, 1);
    assert_eq!(rsp.ports[0].num_ld, 4);

    let (hdr, _) = harness.send_em(2, EMOP_DISCON_DEV, 10, 0);
    assert_eq!(hdr.rc, u16::from(EmRc::Success));

    let (_, payload) = harness.send_fm(
        3,
        &FmApiRequest::PscPort(PscPortReq { ports: vec![10] }),
    );
    let rsp = PscPortRsp::decode(&payload).unwrap();
    assert_eq!(rsp.ports[0].dt, 0);
    assert_eq!(rsp.ports[0].prsnt, 0);
    assert_eq!(rsp.ports[0].num_ld, 0);
}

#[test]
fn msg_limit_set_boundaries() {
    let harness = reference_harness();
    for (limit, want) in [
        (7u8, FmRc::InvalidInput),
        (8, FmRc::Success),
        (20, FmRc::Success),
        (21, FmRc::InvalidInput),
    ] {
        let (hdr, _) = harness.send_fm(
            0,
            &FmApiRequest::IscMsgLimitSet(IscMsgLimit { limit }),
        );
        assert_eq!(hdr.rc, u16::from(want), "limit {limit}");
        if want == FmRc::InvalidInput {
            assert_eq!(hdr.len, 0);
        }
    }
}

#[test]
fn psc_port_skips_out_of_range_ids() {
    let harness = reference_harness();
    let (hdr, payload) = harness.send_fm(
        0,
        &FmApiRequest::PscPort(PscPortReq {
            ports: vec![0, 32, 33],
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::Success));
    let rsp = PscPortRsp::decode(&payload).unwrap();
    assert_eq!(rsp.ports.len(), 1);
    assert_eq!(rsp.ports[0].ppid, 0);
}

#[test]
fn alloc_get_at_the_tail_is_empty_success() {
    let harness = reference_harness();
    let mut body = Vec::new();
    cse_fmapi_protocol::mcc::MccAllocGetReq { start: 4, limit: 8 }.encode(&mut body);
    let (inner, payload) =
        harness.send_tunneled(1, cse_fmapi_protocol::FMOP_MCC_ALLOC_GET, &body);
    assert_eq!(inner.rc, u16::from(FmRc::Success));
    let rsp = cse_fmapi_protocol::mcc::MccAllocGetRsp::decode(&payload).unwrap();
    assert_eq!(rsp.total, 4);
    assert!(rsp.entries.is_empty());
}

#[test]
fn bind_unbind_restores_the_vppb() {
    let harness = reference_harness();
    harness.send_fm(
        0,
        &FmApiRequest::VscBind(VscBindReq {
            vcsid: 0,
            vppbid: 2,
            ppid: 1,
            ldid: 1,
        }),
    );
    let (hdr, _) = harness.send_fm(
        1,
        &FmApiRequest::VscUnbind(cse_fmapi_protocol::vsc::VscUnbindReq {
            vcsid: 0,
            vppbid: 2,
            option: 0,
        }),
    );
    assert_eq!(hdr.rc, u16::from(FmRc::BackgroundOpStarted));

    let switch = harness.switch.lock().unwrap();
    let vppb = switch.vcs(0).unwrap().vppbs[2];
    assert_eq!(vppb.bind_status, BindStatus::Unbound);
    assert_eq!(vppb.ppid, 0);
    assert_eq!(vppb.ldid, 0);
}
