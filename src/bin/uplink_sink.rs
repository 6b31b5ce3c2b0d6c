//! Receiving end of the uplink: accepts one connection per flush cycle,
//! reads it to EOF and logs every decoded record.
//!
//! Usage: `uplink_sink [bind_addr] [--timestamped]` (default `0.0.0.0:1010`).

use std::{
    env,
    io::Read,
    net::{TcpListener, TcpStream},
    process::ExitCode,
};

use log::{error, info, warn};

use sensor_uplink::WireFormat;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let format = if args.iter().any(|a| a == "--timestamped") {
        WireFormat::Timestamped
    } else {
        WireFormat::Compact
    };
    let bind = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "0.0.0.0:1010".to_string());

    let listener = match TcpListener::bind(&bind) {
        Ok(l) => l,
        Err(e) => {
            error!("[Sink] failed to bind {}: {}", bind, e);
            return ExitCode::FAILURE;
        }
    };
    info!("[Sink] waiting for connections on {} ({:?} records)", bind, format);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => handle_cycle(stream, format),
            Err(e) => warn!("[Sink] accept failed: {}", e),
        }
    }
    ExitCode::SUCCESS
}

fn handle_cycle(mut stream: TcpStream, format: WireFormat) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());

    let mut data = Vec::new();
    if let Err(e) = stream.read_to_end(&mut data) {
        warn!("[Sink] read from {} failed: {}", peer, e);
        return;
    }

    let readings = format.decode_all(&data);
    info!("[Sink] {} sent {} bytes, {} records", peer, data.len(), readings.len());
    for r in &readings {
        match r.timestamp_us {
            Some(ts) => info!(
                "deviceId={} measurementType={} value={:.2} timestamp_us={}",
                r.device_id, r.measurement_type, r.value, ts
            ),
            None => info!(
                "deviceId={} measurementType={} value={:.2}",
                r.device_id, r.measurement_type, r.value
            ),
        }
    }
    let trailing = data.len() % format.record_size();
    if trailing != 0 {
        warn!("[Sink] {} trailing bytes from {} ignored", trailing, peer);
    }
}
