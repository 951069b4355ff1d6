use std::{
    net::SocketAddrV4,
    sync::atomic::AtomicBool,
    time::Duration,
};

use chrono::Local;
use rand::{rngs::StdRng, SeedableRng};

use sim_lidar::{
    Config, ConfigFile, FixedClock, FrameGenerator, Overrides, PacketEncoder, PacketSink,
    SocketError,
};

#[derive(Default)]
struct Capture {
    datagrams: Vec<(SocketAddrV4, Vec<u8>)>,
}

impl PacketSink for Capture {
    fn send(&mut self, dest: SocketAddrV4, payload: &[u8]) -> Result<usize, SocketError> {
        self.datagrams.push((dest, payload.to_vec()));
        Ok(payload.len())
    }
}

fn config_from(toml: &str, overrides: Overrides) -> Config {
    let file: ConfigFile = toml.parse().unwrap();
    Config::resolve(file, overrides).unwrap()
}

#[test]
fn one_full_frame_walks_the_geometry() {
    let config = config_from(
        r#"
            ipaddr = "127.0.0.1"
            interval_ms = 0
        "#,
        Overrides::default(),
    );
    assert_eq!(config.frame_interval, Duration::ZERO);

    let encoder = PacketEncoder::with_parts(
        config.layout.clone(),
        StdRng::seed_from_u64(0),
        FixedClock(Local::now()),
    );
    let mut generator = FrameGenerator::with_encoder(&config, encoder, Capture::default());
    let stats = generator.run(1, &AtomicBool::new(false));

    assert_eq!(stats.frames, 1);
    assert_eq!(stats.packets_sent, 400);
    assert_eq!(stats.packets_failed, 0);

    let geometry = generator.geometry().clone();
    let capture = generator.into_sink();
    assert_eq!(capture.datagrams.len(), 400);

    let points_per_packet = config.layout.points_per_packet();
    for (index, (dest, payload)) in capture.datagrams.iter().enumerate() {
        assert_eq!(*dest, "127.0.0.1:51180".parse().unwrap());
        assert_eq!(payload.len(), 950);
        assert_eq!(u16::from_le_bytes([payload[8], payload[9]]), index as u16);

        // azimuth of the first sample in the first block
        let azimuth = u16::from_le_bytes([payload[40], payload[41]]);
        assert_eq!(azimuth, geometry[index * points_per_packet].azimuth);
    }
}

#[test]
fn laser_override_changes_packet_size() {
    let overrides = Overrides {
        laser: Some(2),
        count: Some(1),
        interval_ms: Some(0),
        ..Overrides::default()
    };
    let config = config_from("", overrides);

    let mut generator = FrameGenerator::new(&config, Capture::default());
    let stats = generator.run(config.frames, &AtomicBool::new(false));
    assert_eq!(stats.packets_sent, 400);
    assert_eq!(stats.bytes_sent, 400 * (34 + 12 * 40 + 4));
}
