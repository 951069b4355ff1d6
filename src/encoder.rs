//! Fills MSOP packets from the scan geometry and synthetic returns.

use chrono::{DateTime, Local};
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SensorLayout;
use crate::consts::{DISTANCE_MAX, DISTANCE_MIN, DISTANCE_SCALE, ECHO_COUNT};
use crate::geometry::ScanGeometryMap;
use crate::packet::{Block, Packet, PacketHeader, PointSample, Tail, UtcTime};

/// Source of the wall-clock time stamped into each header.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Always reports the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

pub struct PacketEncoder<R = StdRng, C = SystemClock> {
    layout: SensorLayout,
    rng: R,
    clock: C,
}

impl PacketEncoder {
    /// Encoder seeded from the OS and stamping packets with the system clock.
    pub fn new(layout: SensorLayout) -> Self {
        Self::with_parts(layout, StdRng::from_entropy(), SystemClock)
    }
}

impl<R: Rng, C: Clock> PacketEncoder<R, C> {
    pub fn with_parts(layout: SensorLayout, rng: R, clock: C) -> Self {
        Self { layout, rng, clock }
    }

    pub fn layout(&self) -> &SensorLayout {
        &self.layout
    }

    /// Builds sub-packet `sub_packet_index` of a frame.
    ///
    /// Consumes `points_per_packet` consecutive geometry entries starting at
    /// `sub_packet_index * points_per_packet`, one per channel, walking through all blocks in order.
    /// Distances and intensities are drawn from the random source. `base_distance` is only
    /// reported in the trace log.
    ///
    /// # Panics
    ///
    /// Panics if `geometry` is shorter than the requested window.
    pub fn encode(
        &mut self,
        frame_id: u32,
        sub_packet_index: u32,
        sequence_number: u16,
        base_distance: u16,
        geometry: &ScanGeometryMap,
    ) -> Packet {
        let channels = self.layout.channels_per_block();
        let points_per_packet = self.layout.points_per_packet();
        let start = sub_packet_index as usize * points_per_packet;
        let window = geometry.window(start, points_per_packet);

        if let Some(first) = window.first() {
            trace!(
                "frame {frame_id} packet {sub_packet_index}: azimuth {}, elevation {}, base distance {base_distance}",
                first.azimuth,
                first.elevation
            );
        }

        let now = self.clock.now();
        let header = PacketHeader {
            frame_id,
            seq_num: sequence_number,
            utc_time: UtcTime::from_local(&now),
            timestamp: now.timestamp_subsec_micros().min(999_999),
            laser_num: channels as u8,
            block_num: self.layout.blocks_per_packet as u8,
            echo_count: ECHO_COUNT,
            point_num: (self.layout.points_per_frame() * ECHO_COUNT as usize) as u32,
            ..PacketHeader::default()
        };

        let rng = &mut self.rng;
        let blocks = window
            .chunks(channels)
            .map(|channel_points| Block {
                channel_num: channels as u8,
                time_offset: 0,
                return_sn: 0,
                reserved: 0,
                points: channel_points
                    .iter()
                    .map(|point| PointSample {
                        distance: rng.gen_range(DISTANCE_MIN..DISTANCE_MAX) * DISTANCE_SCALE,
                        azimuth: point.azimuth,
                        elevation: point.elevation,
                        intensity: rng.gen(),
                        reserved: 0,
                    })
                    .collect(),
            })
            .collect();

        Packet {
            header,
            blocks,
            tail: Tail::default(),
        }
    }
}
