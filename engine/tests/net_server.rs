//! End-to-end exercise of the TCP line protocol against a real server
//! instance bound to an ephemeral port, the way the spec's ambient test
//! tooling calls for rather than unit-testing the dispatcher in isolation.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};

use sailnavsim_engine::boat::Boat;
use sailnavsim_engine::net_server;
use sailnavsim_engine::registry::Registry;
use sailnavsim_engine::scheduler::EnvBundle;
use sailnavsim_env::{SyntheticCelestial, SyntheticCompass, SyntheticGeoInfo, SyntheticOcean, SyntheticWave, SyntheticWeather};
use sailnavsim_types::GeoPos;

async fn spawn_test_server() -> (std::net::SocketAddr, mpsc::UnboundedReceiver<sailnavsim_types::Command>) {
    let mut registry = Registry::new();
    let boat = Boat::new("tester".to_string(), GeoPos::new(10.0, 20.0), 0, 0, 1);
    registry.add("tester", boat, None, None).unwrap();
    let registry = Arc::new(RwLock::new(registry));

    let env = Arc::new(EnvBundle {
        weather: Arc::new(SyntheticWeather::new()),
        ocean: Arc::new(SyntheticOcean::new()),
        wave: Arc::new(SyntheticWave::new()),
        geo: Arc::new(SyntheticGeoInfo::new()),
        compass: Arc::new(SyntheticCompass::new()),
        celestial: Arc::new(SyntheticCelestial::new()),
    });

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(net_server::serve(listener, 2, registry, env, cmd_tx));

    (addr, cmd_rx)
}

async fn send_line(stream: &mut TcpStream, line: &str) -> String {
    stream.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    response.trim_end().to_string()
}

#[tokio::test]
async fn wind_request_returns_wind_response() {
    let (addr, _cmd_rx) = spawn_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = send_line(&mut stream, "wind,10.0,20.0").await;
    assert!(response.starts_with("wind,"), "unexpected response: {response}");
}

#[tokio::test]
async fn boat_data_request_for_known_boat_returns_ok() {
    let (addr, _cmd_rx) = spawn_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = send_line(&mut stream, "bd_nc,tester").await;
    assert_eq!(response.split(',').nth(2), Some("ok"), "unexpected response: {response}");
}

#[tokio::test]
async fn boat_data_request_for_unknown_boat_returns_noboat() {
    let (addr, _cmd_rx) = spawn_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = send_line(&mut stream, "bd_nc,ghost").await;
    assert_eq!(response, "bd_nc,ghost,noboat");
}

#[tokio::test]
async fn boat_cmd_request_forwards_parsed_command() {
    let (addr, mut cmd_rx) = spawn_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = send_line(&mut stream, "boatcmd,tester,stop").await;
    assert_eq!(response, "boatcmd,ok");

    let cmd = cmd_rx.recv().await.expect("command should have been forwarded");
    assert_eq!(cmd.target_name, "tester");
}

#[tokio::test]
async fn unknown_request_type_is_reported_as_error() {
    let (addr, _cmd_rx) = spawn_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = send_line(&mut stream, "not_a_real_request,foo").await;
    assert_eq!(response, "error");
}

#[tokio::test]
async fn pipelined_requests_are_each_answered() {
    let (addr, _cmd_rx) = spawn_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"wind,10.0,20.0\nwave_height,10.0,20.0\n").await.unwrap();
    let mut reader = BufReader::new(&mut stream);

    let mut first = String::new();
    reader.read_line(&mut first).await.unwrap();
    assert!(first.trim_end().starts_with("wind,"));

    let mut second = String::new();
    reader.read_line(&mut second).await.unwrap();
    assert!(second.trim_end().starts_with("wave_height,"));
}
