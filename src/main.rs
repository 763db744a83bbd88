use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{error, info};
use mio::net::UdpSocket as MioUdpSocket;

use ssdp_responder::config::{self, ParseOutcome};
use ssdp_responder::event_loop::EventLoop;
use ssdp_responder::identity::{self, DeviceMetadata, DiscoveryIdentity};
use ssdp_responder::net::socket::{open_description_listener, open_multicast_listener_v4, open_multicast_listener_v6};
use ssdp_responder::registry::InterfaceRegistry;
use ssdp_responder::{logger, signals};

const CACHE_DIR: &str = "/var/lib/ssdpd";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let config = match config::parse(args) {
        ParseOutcome::PrintAndExit { message, code } => {
            print!("{message}");
            return exit_code(code);
        }
        ParseOutcome::Run(cfg) => cfg,
    };

    logger::init(config.debug);

    let identity = build_identity();

    match run(config, identity) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            exit_code(1)
        }
    }
}

fn build_identity() -> DiscoveryIdentity {
    let cache_path = PathBuf::from(CACHE_DIR).join(format!("{}.cache", config::PKG_NAME));
    let uuid = identity::load_or_create_uuid(&cache_path);
    let server_string = identity::server_banner(&PathBuf::from("/etc/os-release"));
    DiscoveryIdentity::new(uuid, server_string, DeviceMetadata::default())
}

fn run(config: config::Config, identity: DiscoveryIdentity) -> ssdp_responder::Result<()> {
    let listener_v4 = to_mio_udp(open_multicast_listener_v4())?;
    let listener_v6 = to_mio_udp(open_multicast_listener_v6())?;

    let mut registry = InterfaceRegistry::new();
    registry.register_listener(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
    registry.register_listener(std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED));

    let http_listener = open_description_listener().map_err(|e| {
        ssdp_responder::ErrorKind::Fatal(format!("could not bind description server: {e}"))
    })?;

    let shutdown = Arc::new(AtomicBool::new(false));
    signals::install(&shutdown)?;

    let mut event_loop = EventLoop::new(listener_v4, listener_v6, http_listener, registry, identity, config, shutdown)
        .map_err(|e| ssdp_responder::ErrorKind::Fatal(format!("could not start event loop: {e}")))?;

    info!("ssdpd starting up");
    event_loop.run().map_err(|e| ssdp_responder::ErrorKind::Fatal(format!("event loop failed: {e}")).into())
}

fn to_mio_udp(result: std::io::Result<MioUdpSocket>) -> ssdp_responder::Result<MioUdpSocket> {
    result.map_err(|e| ssdp_responder::ErrorKind::Fatal(format!("could not open multicast listener: {e}")).into())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}
