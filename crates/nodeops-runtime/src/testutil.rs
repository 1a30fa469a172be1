//! Shared test fixtures.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nodeops_core::config::{Sampling, Settings};
use nodeops_core::params::{EnvParams, NetworkRequirements, NodeParams, StaticParams};

pub const STATIC_PARAMS: &str = r#"
[envs.devnet.server]
cpu_total = 4
cpu_physical = 1
memory = 30000000000
swap = 0
disk = 100000000000

[envs.devnet.packages]
lvm2 = "2.02.0"
lsof = "4.89"

[envs.devnet.docker]
docker_engine = "20.10.0"
docker_compose = "2.0.0"

[envs.devnet.allocation.cpu]
workload = 0.8
companion = 0.2

[envs.devnet.allocation.mem]
workload = 0.8
companion = 0.2

[envs.devnet.allocation.volume_limits]
state = 0.6
logs = 0.1
"#;

pub const NODE_PARAMS: &str = r#"
env_type = "devnet"
container_configs_url = "https://example.com/node-services.git"
container_configs_stream = "2.1.0"
volume_manager_url = "https://example.com/volume-manager.git"
volume_manager_stream = "1.0.2"
disk_mountpoint = "/dev/sdb"
endpoint = "http://10.0.0.1:8545"
manager_contracts_url = "https://example.com/manager.json"
bridge_contracts_url = "https://example.com/bridge.json"
"#;

pub fn env_params() -> EnvParams {
    let params: StaticParams = toml::from_str(STATIC_PARAMS).unwrap();
    params.for_env("devnet").unwrap().clone()
}

pub fn node_params() -> NodeParams {
    NodeParams::from_toml_str(NODE_PARAMS).unwrap()
}

/// Sampling that does not sleep.
pub fn instant() -> Sampling {
    Sampling {
        count: 2,
        interval: Duration::ZERO,
    }
}

/// Settings with every path inside `dir`.
pub fn settings(dir: &Path) -> Settings {
    Settings {
        root: dir.join("root"),
        docker_daemon_config: dir.join("daemon.json"),
        docker_socket: dir.join("docker.sock"),
        backend_url: "http://127.0.0.1:9".to_string(),
        sampling: instant(),
    }
}

/// A reachable local listener standing in for the connectivity target.
/// Keep the listener alive for the duration of the test.
pub fn local_network() -> (TcpListener, NetworkRequirements) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    (
        listener,
        NetworkRequirements {
            probe_addr: addr.to_string(),
            timeout_secs: 1,
        },
    )
}

/// A connectivity target nothing listens on.
pub fn closed_network() -> NetworkRequirements {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    NetworkRequirements {
        probe_addr: addr.to_string(),
        timeout_secs: 1,
    }
}

/// Write what a clone of the service-definition repository contains, with
/// the connectivity probe pointed at `network`.
pub fn write_config_checkout(settings: &Settings, network: &NetworkRequirements) -> PathBuf {
    let dir = settings.paths().config_dir();
    std::fs::create_dir_all(dir.join(".git")).unwrap();
    let static_params = format!(
        "{STATIC_PARAMS}\n[envs.devnet.network]\nprobe_addr = \"{}\"\ntimeout_secs = {}\n",
        network.probe_addr, network.timeout_secs
    );
    std::fs::write(dir.join("static_params.toml"), static_params).unwrap();
    std::fs::write(dir.join("docker-compose.yml"), "services: {}\n").unwrap();
    dir
}

/// Node params whose contract artifacts are local files inside `dir`.
pub fn local_node_params(dir: &Path) -> NodeParams {
    let sources = dir.join("sources");
    std::fs::create_dir_all(&sources).unwrap();
    std::fs::write(sources.join("manager.json"), "{\"contract\": \"manager\"}").unwrap();
    std::fs::write(sources.join("bridge.json"), "{\"contract\": \"bridge\"}").unwrap();
    let mut params = node_params();
    params.manager_contracts_url = sources.join("manager.json").display().to_string();
    params.bridge_contracts_url = sources.join("bridge.json").display().to_string();
    params
}

/// Serve a single HTTP response on a local port. Returns the base URL.
pub fn serve_once(status: u16, body: &str) -> String {
    serve_recorded(status, body).0
}

/// Like [`serve_once`], also yielding the request line that was received.
pub fn serve_recorded(status: u16, body: &str) -> (String, std::sync::mpsc::Receiver<String>) {
    use std::io::{Read, Write};

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (format!("http://{addr}"), rx)
}
