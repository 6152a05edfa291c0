//! The dispatcher: pulls requests off the inbound queue, routes them by
//! MCTP message type and opcode, and frames the responses.
//!
//! Per request the flow is fixed: decode the outer application header,
//! decode the opcode's request object, take the model lock, run the
//! handler, release the lock, then encode and enqueue the response.
//! Requests that fail before a handler can answer — undecodable headers,
//! truncated payloads, non-request categories — go to the completion queue
//! with code 1 and produce no response at all.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use cse_emapi_protocol::{EmApiHdr, EmMsgType, MCTP_TYPE_CSE};
use cse_fmapi_protocol::{
    DecodeError, FmApiHdr, FmApiRequest, FmMsgCategory, FmRc, FM_HDR_LEN, MCTP_TYPE_CXL_FMAPI,
};
use cse_switch::CxlSwitch;
use tracing::{debug, warn};

use crate::emapi;
use crate::handlers::{self, Outcome};
use crate::transport::{CompletionAction, RequestAction, ResponseAction, TransportQueues};

/// Completion code for requests dropped without a response.
pub const COMPLETION_FAILED: u8 = 1;

pub struct Dispatcher {
    switch: Arc<Mutex<CxlSwitch>>,
    local_eid: u8,
    queues: TransportQueues,
}

impl Dispatcher {
    pub fn new(switch: Arc<Mutex<CxlSwitch>>, local_eid: u8, queues: TransportQueues) -> Self {
        Self {
            switch,
            local_eid,
            queues,
        }
    }

    /// Consume the inbound queue until it closes.
    pub fn run(&self, inbound: Receiver<RequestAction>) {
        while let Ok(req) = inbound.recv() {
            self.process(req);
        }
    }

    /// Handle one request end to end.
    pub fn process(&self, req: RequestAction) {
        match req.msg_type {
            MCTP_TYPE_CXL_FMAPI => self.process_fmapi(req),
            MCTP_TYPE_CSE => self.process_emapi(req),
            msg_type => {
                warn!(msg_type = format_args!("{msg_type:#04x}"), "unknown mctp message type");
                self.complete(&req);
            }
        }
    }

    fn complete(&self, req: &RequestAction) {
        let _ = self.queues.completion.send(CompletionAction {
            tag: req.tag,
            msg_type: req.msg_type,
            completion_code: COMPLETION_FAILED,
        });
    }

    fn respond(&self, req: &RequestAction, payload: Vec<u8>) {
        let _ = self.queues.outbound.send(ResponseAction {
            dst: req.src,
            src: self.local_eid,
            tag: req.tag,
            msg_type: req.msg_type,
            payload,
        });
    }

    fn process_fmapi(&self, req: RequestAction) {
        let hdr = match FmApiHdr::decode(&req.payload) {
            Ok(hdr) => hdr,
            Err(err) => {
                warn!(%err, "undecodable fm api header");
                return self.complete(&req);
            }
        };
        if hdr.category != FmMsgCategory::Request {
            warn!(opcode = format_args!("{:#06x}", hdr.opcode), "fm api message is not a request");
            return self.complete(&req);
        }

        let request = match FmApiRequest::decode(hdr.opcode, &req.payload[FM_HDR_LEN..]) {
            Ok(request) => request,
            Err(DecodeError::UnknownOpcode { opcode }) => {
                debug!(opcode = format_args!("{opcode:#06x}"), "unsupported opcode");
                let rsp_hdr = FmApiHdr::response(hdr.tag, hdr.opcode, 0, FmRc::Unsupported);
                return self.respond(&req, rsp_hdr.to_bytes().to_vec());
            }
            Err(err) => {
                warn!(opcode = format_args!("{:#06x}", hdr.opcode), %err, "undecodable request payload");
                return self.complete(&req);
            }
        };

        let outcome = {
            let mut switch = match self.switch.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers::handle(&mut switch, &hdr, &request)
        };
        // The lock is released; all that remains is framing and I/O.
        let Outcome { rc, rsp } = outcome;

        let mut payload = vec![0u8; FM_HDR_LEN];
        let len = rsp.encode(&mut payload) as u32;
        let rsp_hdr = FmApiHdr::response(hdr.tag, hdr.opcode, len, rc);
        rsp_hdr.encode(
            (&mut payload[..FM_HDR_LEN])
                .try_into()
                .expect("header slice is FM_HDR_LEN"),
        );
        self.respond(&req, payload);
    }

    fn process_emapi(&self, req: RequestAction) {
        let hdr = match EmApiHdr::decode(&req.payload) {
            Ok(hdr) => hdr,
            Err(err) => {
                warn!(%err, "undecodable emulator header");
                return self.complete(&req);
            }
        };
        if hdr.r#type != EmMsgType::Request {
            warn!(opcode = format_args!("{:#06x}", hdr.opcode), "emulator message is not a request");
            return self.complete(&req);
        }
        // Inbound events are legal but ignored; nothing is emitted back.
        if hdr.opcode == cse_emapi_protocol::EMOP_EVENT {
            debug!("emulator event dropped");
            return;
        }

        let outcome = {
            let mut switch = match self.switch.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            emapi::handle(&mut switch, &hdr)
        };

        let rsp_hdr = EmApiHdr::response(
            hdr.tag,
            hdr.opcode,
            outcome.payload.len() as u32,
            outcome.a,
            0,
            outcome.rc,
        );
        let mut payload = rsp_hdr.to_bytes().to_vec();
        payload.extend_from_slice(&outcome.payload);
        self.respond(&req, payload);
    }
}
