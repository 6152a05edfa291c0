//! MCTP transport glue.
//!
//! The dispatcher only sees three queues: requests in, responses out, and a
//! completion-code lane for requests that never earned an application
//! response. This module owns the queues and the TCP binding that feeds
//! them: each packet on the socket is a little-endian u32 frame length
//! followed by a 4-byte MCTP-ish header (`dst`, `src`, `tag`, `msg_type`)
//! and the message payload.
//!
//! One Fabric Manager connection is served at a time; the accept loop picks
//! up the next client after the current one hangs up.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

pub const MCTP_FRAME_HDR_LEN: usize = 4;
/// Ceiling on a single frame, transport header included. Generous compared
/// to the largest legal FM API message.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Local endpoint id reported as the source of responses.
pub const LOCAL_EID: u8 = 0x10;

/// One inbound request, as handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAction {
    pub src: u8,
    pub dst: u8,
    pub tag: u8,
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

/// A response ready to go back on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseAction {
    pub dst: u8,
    pub src: u8,
    pub tag: u8,
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

/// A request that failed before producing a response. The transport logs
/// the code and recycles the frame; the requester sees silence on that tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionAction {
    pub tag: u8,
    pub msg_type: u8,
    pub completion_code: u8,
}

/// Sender-side handles given to the dispatcher.
#[derive(Clone)]
pub struct TransportQueues {
    pub outbound: Sender<ResponseAction>,
    pub completion: Sender<CompletionAction>,
}

/// Build the three queues, returning the dispatcher-side handles and the
/// transport-side ends.
pub fn queues() -> (
    Sender<RequestAction>,
    Receiver<RequestAction>,
    TransportQueues,
    Receiver<ResponseAction>,
    Receiver<CompletionAction>,
) {
    let (inbound_tx, inbound_rx) = mpsc::channel();
    let (outbound_tx, outbound_rx) = mpsc::channel();
    let (completion_tx, completion_rx) = mpsc::channel();
    (
        inbound_tx,
        inbound_rx,
        TransportQueues {
            outbound: outbound_tx,
            completion: completion_tx,
        },
        outbound_rx,
        completion_rx,
    )
}

/// Pop the next complete frame off the front of `buf`, if one has fully
/// arrived. Partial frames stay buffered for the next read.
fn take_frame(buf: &mut Vec<u8>) -> io::Result<Option<RequestAction>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if !(MCTP_FRAME_HDR_LEN..=MAX_FRAME_LEN).contains(&len) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad frame length {len}"),
        ));
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }
    let frame: Vec<u8> = buf.drain(..4 + len).skip(4).collect();
    Ok(Some(RequestAction {
        dst: frame[0],
        src: frame[1],
        tag: frame[2] & 0x0F,
        msg_type: frame[3],
        payload: frame[MCTP_FRAME_HDR_LEN..].to_vec(),
    }))
}

fn write_frame(stream: &mut TcpStream, rsp: &ResponseAction) -> io::Result<()> {
    let len = (MCTP_FRAME_HDR_LEN + rsp.payload.len()) as u32;
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(&[rsp.dst, rsp.src, rsp.tag & 0x0F, rsp.msg_type])?;
    stream.write_all(&rsp.payload)?;
    stream.flush()
}

/// Serve one connected Fabric Manager until it hangs up or the stop flag
/// rises. Reads are timeboxed so the loop can interleave outbound
/// responses and notice shutdown.
fn serve_connection(
    mut stream: TcpStream,
    inbound: &Sender<RequestAction>,
    outbound: &Receiver<ResponseAction>,
    stop: &AtomicBool,
) -> io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_millis(50)))?;
    let mut write_half = stream.try_clone()?;
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        while let Ok(rsp) = outbound.try_recv() {
            write_frame(&mut write_half, &rsp)?;
        }
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                pending.extend_from_slice(&chunk[..n]);
                while let Some(req) = take_frame(&mut pending)? {
                    debug!(
                        src = req.src,
                        tag = req.tag,
                        msg_type = format_args!("{:#04x}", req.msg_type),
                        len = req.payload.len(),
                        "request"
                    );
                    if inbound.send(req).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(err) => return Err(err),
        }
    }
}

/// Run the TCP server loop on a dedicated thread. Completion codes are
/// drained on their own thread; the requester sees silence for those tags.
pub fn spawn(
    addr: SocketAddr,
    inbound: Sender<RequestAction>,
    outbound: Receiver<ResponseAction>,
    completion: Receiver<CompletionAction>,
    stop: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    info!(%addr, "listening");

    thread::Builder::new()
        .name("cse-completion".into())
        .spawn(move || {
            while let Ok(done) = completion.recv() {
                warn!(
                    tag = done.tag,
                    msg_type = format_args!("{:#04x}", done.msg_type),
                    code = done.completion_code,
                    "request dropped without a response"
                );
            }
        })?;

    thread::Builder::new()
        .name("cse-transport".into())
        .spawn(move || loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "fabric manager connected");
                    match serve_connection(stream, &inbound, &outbound, &stop) {
                        Ok(()) => info!(%peer, "fabric manager disconnected"),
                        Err(err) => warn!(%peer, %err, "connection failed"),
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(100));
                }
                Err(err) => {
                    warn!(%err, "accept failed");
                    thread::sleep(Duration::from_millis(100));
                }
            }
        })
}
