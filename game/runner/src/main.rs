use cavorite::net::address::Address;
use cavorite::net::mesh::Mesh;
use cavorite::net::node::Node;
use cavorite::net::socket;
use flint::logging;
use meshrunner::config::RunnerConfig;
use std::env;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
    let log = logging::init();

    let config = match env::args().nth(1) {
        Some(path) => RunnerConfig::load(path),
        None => RunnerConfig::default(),
    };

    assert!(socket::init_sockets());

    let mut mesh = Mesh::new(
        config.protocol_id,
        config.mesh.max_nodes,
        config.mesh.send_rate,
        config.mesh.timeout,
        &log,
    );
    mesh.start(config.mesh.port).expect("Failed to bind mesh port");

    // slot 0 stays pinned to the first node, whatever the join order
    mesh.reserve(0, Address::localhost(config.node_base_port));

    let mesh_address = Address::localhost(config.mesh.port);
    let mut nodes = Vec::new();
    for index in 0..config.node_count {
        let mut node = Node::new(
            config.protocol_id,
            config.mesh.send_rate,
            config.mesh.timeout,
            &log,
        );
        node.start(config.node_base_port + index as u16)
            .expect("Failed to bind node port");
        node.connect(mesh_address);
        nodes.push(node);
    }

    logging::info!(log, "runner started";
                   "started_at" => flint::time::timestamp_secs(),
                   "nodes" => nodes.len(),
                   "mesh_port" => config.mesh.port);

    let dt = 1.0 / config.fps as f32;
    let tick = Duration::from_secs_f64(1.0 / config.fps as f64);
    let started = Instant::now();
    let mut payload = [0u8; 256];

    while started.elapsed().as_secs() < config.run_secs {
        for (index, node) in nodes.iter_mut().enumerate() {
            if node.is_connected() {
                let heartbeat = [index as u8];
                for peer in 0..config.mesh.max_nodes {
                    if node.local_node_id() != Some(peer) && node.is_node_connected(peer) {
                        node.send_packet(peer, &heartbeat);
                    }
                }
            }
            while let Some((from, size)) = node.receive_packet(&mut payload) {
                logging::trace!(log, "node payload";
                               "to" => index, "from" => from, "bytes" => size);
            }
            node.update(dt);
        }
        mesh.update(dt);
        thread::sleep(tick);
    }

    for node_id in 0..config.mesh.max_nodes {
        logging::info!(log, "slot status";
                       "node_id" => node_id,
                       "connected" => mesh.is_node_connected(node_id));
    }

    for node in nodes.iter_mut() {
        node.stop();
    }
    mesh.stop();
    socket::shutdown_sockets();

    logging::info!(log, "runner stopped");
}
