//! TCP request server: a listener task handing accepted sockets to a fixed
//! worker pool over a bounded channel, plus the line-protocol dispatcher.
//!
//! Grounded on `original_source/src/NetServer.c`'s `netServerThreadMain` /
//! `netServerWorkerThreadMain` accept-then-dispatch structure (the mutex/
//! condvar circular buffer of accepted fds becomes a bounded
//! `tokio::sync::mpsc::channel`) and `NetServer_handleRequest`'s request-type
//! table, translated onto `tokio::net::TcpListener`/`tokio::spawn` per the
//! teacher's server-task pattern in `main.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use sailnavsim_types::{BoatFlags, GeoPos};

use crate::boat;
use crate::command;
use crate::error::NetServerError;
use crate::registry::Registry;
use crate::scheduler::EnvBundle;

const ACCEPT_QUEUE_SIZE: usize = 256;
const RECV_BUF_SIZE: usize = 1024;
const SEND_BUF_SIZE: usize = 64 * 1024;

const INVALID_DOUBLE: f64 = -999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReqType {
    Invalid = 0,
    Wind = 1,
    WindAdjCur = 2,
    WindGust = 3,
    WindGustAdjCur = 4,
    OceanCurrent = 5,
    SeaIce = 6,
    WaveHeight = 7,
    BoatData = 8,
    BoatDataNoCelestial = 9,
    BoatCmd = 10,
    BoatGroupMembership = 11,
    SysRequestCounts = 12,
}

const REQ_TYPE_COUNT: usize = 13;

impl ReqType {
    fn parse(s: &str) -> ReqType {
        // Matches the original's ordering: the most common request type
        // (`bd_nc`) is checked first.
        match s {
            "bd_nc" => ReqType::BoatDataNoCelestial,
            "wind" => ReqType::Wind,
            "wind_c" => ReqType::WindAdjCur,
            "wind_gust" => ReqType::WindGust,
            "wind_gust_c" => ReqType::WindGustAdjCur,
            "ocean_current" => ReqType::OceanCurrent,
            "sea_ice" => ReqType::SeaIce,
            "wave_height" => ReqType::WaveHeight,
            "bd" => ReqType::BoatData,
            "boatcmd" => ReqType::BoatCmd,
            "boatgroupmembers" => ReqType::BoatGroupMembership,
            "sys_req_counts" => ReqType::SysRequestCounts,
            _ => ReqType::Invalid,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ReqType::Invalid => "invalid",
            ReqType::Wind => "wind",
            ReqType::WindAdjCur => "wind_c",
            ReqType::WindGust => "wind_gust",
            ReqType::WindGustAdjCur => "wind_gust_c",
            ReqType::OceanCurrent => "ocean_current",
            ReqType::SeaIce => "sea_ice",
            ReqType::WaveHeight => "wave_height",
            ReqType::BoatData => "bd",
            ReqType::BoatDataNoCelestial => "bd_nc",
            ReqType::BoatCmd => "boatcmd",
            ReqType::BoatGroupMembership => "boatgroupmembers",
            ReqType::SysRequestCounts => "sys_req_counts",
        }
    }
}

/// Cache-line-isolated lifecycle counters, matching the original's
/// `CacheLineAlignedAtomic _counter[]` under contention from many worker
/// tasks incrementing concurrently.
#[derive(Default)]
#[repr(align(64))]
struct Counter(AtomicU64);

impl Counter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct Counters {
    accept: Counter,
    accept_fail: Counter,
    read: Counter,
    read_fail: Counter,
    data_too_long: Counter,
    message: Counter,
    message_fail: Counter,
    req_type: [Counter; REQ_TYPE_COUNT],
}

impl Counters {
    fn inc_req_type(&self, req_type: ReqType) {
        self.req_type[req_type as usize].inc();
    }
}

/// Runs the listener loop forever: binds, then accepts connections and
/// hands each one to a bounded queue serviced by `worker_count` worker
/// tasks. Returns only on bind failure.
pub async fn run(
    host: &str,
    port: u16,
    worker_count: usize,
    registry: Arc<RwLock<Registry>>,
    env: Arc<EnvBundle>,
    cmd_tx: mpsc::UnboundedSender<sailnavsim_types::Command>,
) -> Result<(), NetServerError> {
    let listener = TcpListener::bind((host, port)).await.map_err(NetServerError::Bind)?;
    serve(listener, worker_count, registry, env, cmd_tx).await
}

/// Accept loop plus worker pool over an already-bound listener. Split out
/// from `run` so tests can bind an ephemeral port (`127.0.0.1:0`) and learn
/// the actual port via `TcpListener::local_addr` before handing it here.
pub async fn serve(
    listener: TcpListener,
    worker_count: usize,
    registry: Arc<RwLock<Registry>>,
    env: Arc<EnvBundle>,
    cmd_tx: mpsc::UnboundedSender<sailnavsim_types::Command>,
) -> Result<(), NetServerError> {
    let counters = Arc::new(Counters::default());

    let (conn_tx, conn_rx) = mpsc::channel::<TcpStream>(ACCEPT_QUEUE_SIZE);
    let conn_rx = Arc::new(tokio::sync::Mutex::new(conn_rx));

    for _ in 0..worker_count.max(1) {
        let conn_rx = Arc::clone(&conn_rx);
        let registry = Arc::clone(&registry);
        let env = Arc::clone(&env);
        let cmd_tx = cmd_tx.clone();
        let counters = Arc::clone(&counters);

        tokio::spawn(async move {
            loop {
                let stream = {
                    let mut rx = conn_rx.lock().await;
                    rx.recv().await
                };
                match stream {
                    Some(stream) => {
                        if let Err(e) = service_connection(stream, &registry, &env, &cmd_tx, &counters).await {
                            warn!(error = %e, "connection handling error");
                        }
                    }
                    None => break,
                }
            }
        });
    }

    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                counters.accept.inc();
                if conn_tx.try_send(stream).is_err() {
                    warn!("accepted connection queue full or closed, dropping new connection");
                }
            }
            Err(e) => {
                counters.accept_fail.inc();
                warn!(error = %e, "accept() failed");
            }
        }
    }
}

/// Services one connection to completion: reads pipelined request lines
/// until EOS or an oversized message, dispatching and replying to each.
async fn service_connection(
    mut stream: TcpStream,
    registry: &Arc<RwLock<Registry>>,
    env: &Arc<EnvBundle>,
    cmd_tx: &mpsc::UnboundedSender<sailnavsim_types::Command>,
    counters: &Counters,
) -> Result<(), NetServerError> {
    let mut buf = vec![0u8; RECV_BUF_SIZE];
    let mut ready = 0usize;
    let mut eos = false;

    loop {
        if ready == RECV_BUF_SIZE {
            counters.data_too_long.inc();
            break;
        }

        if !eos {
            let rb = stream.read(&mut buf[ready..]).await.map_err(NetServerError::Io)?;
            counters.read.inc();
            if rb == 0 {
                eos = true;
            }
            ready += rb;
        }

        let newline_at = buf[..ready].iter().position(|&b| b == b'\n');
        let Some(i) = newline_at else {
            if eos {
                break;
            } else {
                continue;
            }
        };

        let line = String::from_utf8_lossy(&buf[..i]).into_owned();
        counters.message.inc();

        let response = dispatch(&line, registry, env, cmd_tx, counters).await;
        if stream.write_all(response.as_bytes()).await.is_err() {
            counters.message_fail.inc();
            break;
        }

        buf.copy_within(i + 1..ready, 0);
        ready -= i + 1;

        if eos && ready == 0 {
            break;
        }
    }

    Ok(())
}

/// Parses and handles one request line, returning the `\n`-terminated
/// response body.
async fn dispatch(
    line: &str,
    registry: &Arc<RwLock<Registry>>,
    env: &Arc<EnvBundle>,
    cmd_tx: &mpsc::UnboundedSender<sailnavsim_types::Command>,
    counters: &Counters,
) -> String {
    let mut fields = line.split(',');
    let Some(req_str) = fields.next() else {
        return "error\n".to_string();
    };

    let req_type = ReqType::parse(req_str);
    counters.inc_req_type(req_type);

    match req_type {
        ReqType::Invalid => "error\n".to_string(),
        ReqType::Wind | ReqType::WindAdjCur | ReqType::WindGust | ReqType::WindGustAdjCur => {
            match parse_lat_lon(&mut fields) {
                Some(pos) => populate_wind_response(
                    env,
                    &pos,
                    matches!(req_type, ReqType::WindGust | ReqType::WindGustAdjCur),
                    matches!(req_type, ReqType::WindAdjCur | ReqType::WindGustAdjCur),
                ),
                None => "error\n".to_string(),
            }
        }
        ReqType::OceanCurrent | ReqType::SeaIce => match parse_lat_lon(&mut fields) {
            Some(pos) => populate_ocean_response(env, &pos, req_type == ReqType::SeaIce),
            None => "error\n".to_string(),
        },
        ReqType::WaveHeight => match parse_lat_lon(&mut fields) {
            Some(pos) => populate_wave_response(env, &pos),
            None => "error\n".to_string(),
        },
        ReqType::BoatData | ReqType::BoatDataNoCelestial => match fields.next() {
            Some(key) => populate_boat_data_response(registry, key, req_type == ReqType::BoatDataNoCelestial).await,
            None => "error\n".to_string(),
        },
        ReqType::BoatCmd => {
            let body = fields.collect::<Vec<_>>().join(",");
            populate_boat_cmd_response(&body, cmd_tx)
        }
        ReqType::BoatGroupMembership => match fields.next() {
            Some(key) => populate_boat_group_membership_response(registry, key).await,
            None => "error\n".to_string(),
        },
        ReqType::SysRequestCounts => populate_sys_request_counts_response(counters),
    }
}

fn parse_lat_lon<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<GeoPos> {
    let lat: f64 = fields.next()?.parse().ok()?;
    let lon: f64 = fields.next()?.parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(GeoPos::new(lat, lon))
}

fn populate_wind_response(env: &EnvBundle, pos: &GeoPos, gust: bool, adjust_for_current: bool) -> String {
    let mut wx = env.weather.get(pos, true);
    let mut gust_angle = wx.wind.angle;

    if adjust_for_current {
        if let Some(ocean) = env.ocean.get(pos) {
            gust_angle = boat::adjust_wind_for_current(&mut wx, ocean.current);
        }
    }

    if gust {
        let req = if adjust_for_current { "wind_gust_c" } else { "wind_gust" };
        format!("{},{:.6},{:.6},{:.6},{:.6}\n", req, pos.lat, pos.lon, gust_angle, wx.wind_gust)
    } else {
        let req = if adjust_for_current { "wind_c" } else { "wind" };
        format!("{},{:.6},{:.6},{:.6},{:.6}\n", req, pos.lat, pos.lon, wx.wind.angle, wx.wind.mag)
    }
}

fn populate_ocean_response(env: &EnvBundle, pos: &GeoPos, sea_ice: bool) -> String {
    let ocean = env.ocean.get(pos);

    if sea_ice {
        let ice = ocean.map(|o| o.ice as f64).unwrap_or(INVALID_DOUBLE);
        format!("sea_ice,{:.6},{:.6},{:.6}\n", pos.lat, pos.lon, ice)
    } else {
        let (angle, mag) = ocean.map(|o| (o.current.angle, o.current.mag)).unwrap_or((INVALID_DOUBLE, INVALID_DOUBLE));
        format!("ocean_current,{:.6},{:.6},{:.6},{:.6}\n", pos.lat, pos.lon, angle, mag)
    }
}

fn populate_wave_response(env: &EnvBundle, pos: &GeoPos) -> String {
    let height = env.wave.get(pos).map(|w| w.wave_height as f64).unwrap_or(INVALID_DOUBLE);
    format!("wave_height,{:.6},{:.6},{:.6}\n", pos.lat, pos.lon, height)
}

async fn populate_boat_data_response(registry: &Arc<RwLock<Registry>>, key: &str, no_celestial: bool) -> String {
    let req = if no_celestial { "bd_nc" } else { "bd" };
    let reg = registry.read().await;

    let entry = reg.get(key);
    let hidden_for_query = entry.map(|e| no_celestial && e.boat.flags.contains(BoatFlags::CELESTIAL)).unwrap_or(false);

    match entry {
        Some(e) if !hidden_for_query => {
            let b = &e.boat;
            format!(
                "{},{},ok,{:.6},{:.6},{:.1},{:.2},{:.1},{:.2},{:.2},{:.1}\n",
                req, key, b.pos.lat, b.pos.lon, b.v.angle, b.v.mag, b.v_ground.angle, b.v_ground.mag, b.leeway_speed, b.heeling_angle
            )
        }
        _ => format!("{},{},noboat\n", req, key),
    }
}

fn populate_boat_cmd_response(body: &str, cmd_tx: &mpsc::UnboundedSender<sailnavsim_types::Command>) -> String {
    match command::parse_line(body) {
        Ok(cmd) => {
            let ok = cmd_tx.send(cmd).is_ok();
            format!("boatcmd,{}\n", if ok { "ok" } else { "fail" })
        }
        Err(_) => "boatcmd,fail\n".to_string(),
    }
}

async fn populate_boat_group_membership_response(registry: &Arc<RwLock<Registry>>, key: &str) -> String {
    let reg = registry.read().await;

    let Some(entry) = reg.get(key) else {
        return format!("boatgroupmembers,{},noboat\n", key);
    };

    if entry.group.is_none() {
        return format!("boatgroupmembers,{},nogroup\n", key);
    }

    match reg.group_membership_response(key) {
        Some(body) => format!("boatgroupmembers,{},ok\n{}\n", key, body),
        None => format!("boatgroupmembers,{},fail\n", key),
    }
}

fn populate_sys_request_counts_response(counters: &Counters) -> String {
    let mut out = String::from("sys_req_counts,");

    for c in [
        &counters.accept,
        &counters.accept_fail,
        &counters.read,
        &counters.read_fail,
        &counters.data_too_long,
        &counters.message,
        &counters.message_fail,
    ] {
        out.push_str(&c.get().to_string());
        out.push(',');
    }

    for c in &counters.req_type {
        out.push_str(&c.get().to_string());
        out.push(',');
    }

    out.pop();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_type_parse_round_trips_known_strings() {
        for s in [
            "wind",
            "wind_c",
            "wind_gust",
            "wind_gust_c",
            "ocean_current",
            "sea_ice",
            "wave_height",
            "bd",
            "bd_nc",
            "boatcmd",
            "boatgroupmembers",
            "sys_req_counts",
        ] {
            let parsed = ReqType::parse(s);
            assert_ne!(parsed, ReqType::Invalid);
            assert_eq!(parsed.as_str(), s);
        }
    }

    #[test]
    fn unknown_request_type_is_invalid() {
        assert_eq!(ReqType::parse("frobnicate"), ReqType::Invalid);
    }

    #[test]
    fn lat_lon_out_of_range_rejected() {
        let mut fields = "91.0,0.0".split(',');
        assert!(parse_lat_lon(&mut fields).is_none());
    }

    #[test]
    fn lat_lon_in_range_accepted() {
        let mut fields = "45.0,-60.0".split(',');
        assert!(parse_lat_lon(&mut fields).is_some());
    }
}
