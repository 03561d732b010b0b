use serde_derive::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MESH_PORT: u16 = 28800;

#[derive(Serialize, Deserialize)]
pub struct MeshSettings {
    pub port: u16,
    pub max_nodes: u8,
    pub send_rate: f32,
    pub timeout: f32,
}

#[derive(Serialize, Deserialize)]
pub struct RunnerConfig {
    pub protocol_id: u32,
    pub fps: u64,
    pub run_secs: u64,
    pub node_count: u8,
    pub node_base_port: u16,
    pub mesh: MeshSettings,
}

impl Default for RunnerConfig {
    fn default() -> RunnerConfig {
        RunnerConfig {
            protocol_id: 0x1a2b_3c4d,
            fps: 60,
            run_secs: 5,
            node_count: 2,
            node_base_port: DEFAULT_MESH_PORT + 1,
            mesh: MeshSettings {
                port: DEFAULT_MESH_PORT,
                max_nodes: 4,
                send_rate: 0.25,
                timeout: 10.0,
            },
        }
    }
}

impl RunnerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> RunnerConfig {
        serdeconv::from_toml_file(path).expect("Error loading runner configuration file")
    }
}
