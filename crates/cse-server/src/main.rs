//! `cse` — the CXL switch emulator server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use anyhow::Context;
use clap::Parser;
use cse_server::{config, transport, Dispatcher};
use cse_switch::CxlSwitch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cse", version, about = "CXL 2.0 switch emulator")]
struct Args {
    /// YAML configuration file describing the switch and device catalog.
    #[arg(short, long, env = "CSE_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides the configuration file).
    #[arg(short, long, env = "CSE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the configuration file).
    #[arg(short, long, env = "CSE_ADDR")]
    addr: Option<std::net::IpAddr>,

    /// Print the loaded switch state and continue.
    #[arg(long)]
    print_state: bool,

    /// Log filter (tracing-subscriber EnvFilter syntax).
    #[arg(long, env = "CSE_LOG", default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).context("bad --log-level filter")?)
        .init();

    let (switch, mut settings) = match &args.config {
        Some(path) => config::load(path).with_context(|| format!("load {}", path.display()))?,
        None => (CxlSwitch::new(32, 32, 256), config::ServerSettings::default()),
    };
    if let Some(port) = args.port {
        settings.tcp_port = port;
    }
    if let Some(addr) = args.addr {
        settings.tcp_address = addr;
    }

    if args.print_state {
        print!("{}", switch.dump());
    }

    let switch = Arc::new(Mutex::new(switch));
    let stop = Arc::new(AtomicBool::new(false));

    let (inbound_tx, inbound_rx, queues, outbound_rx, completion_rx) = transport::queues();
    let bind_addr = SocketAddr::new(settings.tcp_address, settings.tcp_port);
    transport::spawn(
        bind_addr,
        inbound_tx,
        outbound_rx,
        completion_rx,
        Arc::clone(&stop),
    )
    .with_context(|| format!("bind {bind_addr}"))?;

    let dispatcher = Dispatcher::new(Arc::clone(&switch), transport::LOCAL_EID, queues);
    let dispatch_thread = thread::Builder::new()
        .name("cse-dispatch".into())
        .spawn(move || dispatcher.run(inbound_rx))
        .context("spawn dispatcher")?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("install SIGINT handler")?;

    stop_rx.recv().ok();
    info!("stop requested, shutting down");
    stop.store(true, Ordering::Relaxed);
    // The transport thread observes the flag and closes the inbound queue;
    // the dispatcher finishes in-flight work and exits with it.
    let _ = dispatch_thread.join();
    Ok(())
}
