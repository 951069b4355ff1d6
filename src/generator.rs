//! The frame loop: encodes every sub-packet of a frame, sends it and paces the frames.

use std::{
    net::SocketAddrV4,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use log::{debug, warn};
use rand::{rngs::StdRng, Rng};

use crate::config::Config;
use crate::consts::BASE_DISTANCE_MAX;
use crate::encoder::{Clock, PacketEncoder, SystemClock};
use crate::geometry::ScanGeometryMap;
use crate::transport::PacketSink;

/// Counters accumulated over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u32,
    pub packets_sent: u64,
    pub packets_failed: u64,
    pub bytes_sent: u64,
}

pub struct FrameGenerator<S, R = StdRng, C = SystemClock> {
    target: SocketAddrV4,
    frame_interval: Duration,
    geometry: ScanGeometryMap,
    encoder: PacketEncoder<R, C>,
    sink: S,
    frame_id: u32,
    base_distance: u16,
    stats: RunStats,
}

impl<S: PacketSink> FrameGenerator<S> {
    pub fn new(config: &Config, sink: S) -> Self {
        Self::with_encoder(config, PacketEncoder::new(config.layout.clone()), sink)
    }
}

impl<S: PacketSink, R: Rng, C: Clock> FrameGenerator<S, R, C> {
    /// Builds the geometry for the encoder's layout. The encoder's layout wins over `config.layout`.
    pub fn with_encoder(config: &Config, encoder: PacketEncoder<R, C>, sink: S) -> Self {
        let geometry = ScanGeometryMap::from_layout(encoder.layout());
        Self {
            target: config.target,
            frame_interval: config.frame_interval,
            geometry,
            encoder,
            sink,
            frame_id: 0,
            base_distance: 1,
            stats: RunStats::default(),
        }
    }

    pub fn geometry(&self) -> &ScanGeometryMap {
        &self.geometry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Sends up to `frames` frames, stopping early once `stop` is set.
    pub fn run(&mut self, frames: u32, stop: &AtomicBool) -> RunStats {
        for _ in 0..frames {
            if !self.send_frame(stop) {
                break;
            }
            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
        self.stats
    }

    /// Encodes and sends every sub-packet of the next frame.
    ///
    /// Failed sends are logged and skipped. Returns `false` if `stop` was raised before the frame
    /// completed; the datagram in flight is always finished first.
    pub fn send_frame(&mut self, stop: &AtomicBool) -> bool {
        let packets = self.encoder.layout().packets_per_frame();
        for sub in 0..packets {
            if stop.load(Ordering::Relaxed) {
                debug!("stop requested in frame {} at packet {sub}", self.frame_id);
                return false;
            }

            let packet = self.encoder.encode(
                self.frame_id,
                sub as u32,
                sub as u16,
                self.base_distance,
                &self.geometry,
            );
            let payload = packet.to_bytes();
            match self.sink.send(self.target, &payload) {
                Ok(sent) => {
                    self.stats.packets_sent += 1;
                    self.stats.bytes_sent += sent as u64;
                }
                Err(error) => {
                    self.stats.packets_failed += 1;
                    warn!(
                        "frame {} packet {sub} to {} not sent: {error}",
                        self.frame_id, self.target
                    );
                }
            }
        }

        debug!(
            "frame {} done, {} packets, base distance {}",
            self.frame_id, packets, self.base_distance
        );
        self.stats.frames += 1;
        self.frame_id = self.frame_id.wrapping_add(1);
        self.base_distance = if self.base_distance >= BASE_DISTANCE_MAX {
            1
        } else {
            self.base_distance + 1
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rand::SeedableRng;

    use super::*;
    use crate::config::SensorLayout;
    use crate::encoder::FixedClock;
    use crate::error::SocketError;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(SocketAddrV4, Vec<u8>)>,
        fail_every: Option<usize>,
    }

    impl PacketSink for Recorder {
        fn send(&mut self, dest: SocketAddrV4, payload: &[u8]) -> Result<usize, SocketError> {
            let call = self.sent.len() + 1;
            self.sent.push((dest, payload.to_vec()));
            match self.fail_every {
                Some(n) if call % n == 0 => Err(SocketError::Send(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "no raw sockets here",
                ))),
                _ => Ok(payload.len()),
            }
        }
    }

    fn small_config() -> Config {
        Config {
            target: "127.0.0.1:51180".parse().unwrap(),
            frame_interval: Duration::ZERO,
            layout: SensorLayout {
                vertical_rings: 2,
                horizontal_steps: 12,
                modules: 1,
                ..SensorLayout::default()
            },
            ..Config::default()
        }
    }

    fn generator(config: &Config, sink: Recorder) -> FrameGenerator<Recorder, StdRng, FixedClock> {
        let encoder = PacketEncoder::with_parts(
            config.layout.clone(),
            StdRng::seed_from_u64(9),
            FixedClock(chrono::Local::now()),
        );
        FrameGenerator::with_encoder(config, encoder, sink)
    }

    fn frame_and_seq(payload: &[u8]) -> (u32, u16) {
        (
            u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
            u16::from_le_bytes([payload[8], payload[9]]),
        )
    }

    #[test]
    fn sequence_resets_every_frame() {
        let config = small_config();
        // 2 * 12 points per frame, 24 points per packet
        assert_eq!(config.layout.packets_per_frame(), 1);

        let config = Config {
            layout: SensorLayout {
                horizontal_steps: 36,
                ..config.layout
            },
            ..config
        };
        assert_eq!(config.layout.packets_per_frame(), 3);

        let mut generator = generator(&config, Recorder::default());
        let stats = generator.run(2, &AtomicBool::new(false));
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.packets_sent, 6);
        assert_eq!(stats.bytes_sent, 6 * config.layout.packet_len() as u64);

        let ids: Vec<_> = generator
            .sink()
            .sent
            .iter()
            .map(|(_, payload)| frame_and_seq(payload))
            .collect();
        assert_eq!(ids, [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn failures_do_not_stop_the_loop() {
        let config = small_config();
        let sink = Recorder {
            fail_every: Some(2),
            ..Recorder::default()
        };
        let mut generator = generator(&config, sink);
        let stats = generator.run(4, &AtomicBool::new(false));
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.packets_sent, 2);
        assert_eq!(stats.packets_failed, 2);
        assert_eq!(generator.into_sink().sent.len(), 4);
    }

    #[test]
    fn stop_flag_halts_before_next_packet() {
        let config = small_config();
        let mut generator = generator(&config, Recorder::default());
        let stats = generator.run(10, &AtomicBool::new(true));
        assert_eq!(stats, RunStats::default());
        assert!(generator.sink().sent.is_empty());
    }

    #[test]
    fn base_distance_cycles() {
        let config = small_config();
        let mut generator = generator(&config, Recorder::default());
        let stop = AtomicBool::new(false);
        let mut seen = Vec::new();
        for _ in 0..12 {
            seen.push(generator.base_distance);
            generator.send_frame(&stop);
        }
        assert_eq!(seen, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 1, 2]);
    }
}
