//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// A configuration tree in a scratch directory, removed on drop.
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new(label: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("slatewire-it-{label}-"))
            .tempdir()
            .unwrap();
        std::fs::create_dir_all(dir.path().join("config/data_format")).unwrap();
        Self { dir }
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory with `frontend_to_control` (Flag BOOL) and `router_to_control`
    /// (an include plus a float), and a config file pointing at it.
    pub fn with_services(label: &str, frontend_port: u16, router_port: u16) -> (Self, PathBuf) {
        let workspace = Self::new(label);
        workspace.write(
            "config/service_directory.json",
            &format!(
                r#"{{
                    "frontend_to_control": {{"host": "192.168.100.1", "port": {frontend_port},
                        "sender": "frontend", "receiver": "control", "crc": 610193511}},
                    "router_to_control": {{"host": "192.168.100.1", "port": {router_port},
                        "sender": "router", "receiver": "control"}}
                }}"#
            ),
        );
        workspace.write("config/data_format/frontend_to_control", "# frontend\nFlag BOOL\n");
        workspace.write(
            "config/data_format/router_to_control",
            "%include router_status\n%include not_there\nSpeed FLOAT\n",
        );
        workspace.write("config/data_format/router_status", "Mode UINT8\nCounter UINT16\n");
        let config = workspace.write("slate.yaml", "store_capacity: 5\n");
        (workspace, config)
    }
}

/// Ethernet frame carrying one IPv4/UDP datagram to `port`.
pub fn ethernet_udp_frame(port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let total_len = 20 + udp_len;

    let mut frame = vec![0u8; 12];
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&(total_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0x40, 0, 64, 17, 0, 0, 192, 168, 100, 2, 192, 168, 100, 1]);
    frame.extend_from_slice(&50000u16.to_be_bytes());
    frame.extend_from_slice(&port.to_be_bytes());
    frame.extend_from_slice(&(udp_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(payload);
    frame
}

/// Little-endian microsecond pcap stream of Ethernet frames.
pub fn pcap_stream(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xA1B2_C3D4u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    for word in [0u32, 0, 65535, 1] {
        bytes.extend_from_slice(&word.to_le_bytes());
    }

    for (index, frame) in frames.iter().enumerate() {
        for word in [1_700_000_000u32, index as u32, frame.len() as u32, frame.len() as u32] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes.extend_from_slice(frame);
    }
    bytes
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
