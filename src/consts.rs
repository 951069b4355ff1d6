//! Constants used by the MSOP wire format and the simulated sensor.

/// Start-of-block sync word, written little-endian as `AA 55 A5 5A`.
pub const SYNC_WORD: u32 = 0x5AA5_55AA;

pub const VERSION_MAJOR: u8 = 0x01;
pub const VERSION_MINOR: u8 = 0x04;

/// Number of echoes reported per point. The simulator only emits single returns.
pub const ECHO_COUNT: u8 = 1;

/// Fixed trailer closing every packet.
pub const TAIL_BYTES: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Size of the packet header on the wire.
pub const HEADER_SIZE: usize = 34;

/// Size of the sub-header preceding the samples of a block.
pub const BLOCK_HEADER_SIZE: usize = 4;

/// Size of one point sample on the wire.
pub const POINT_SIZE: usize = 9;

pub const TAIL_SIZE: usize = 4;

/// Synthetic distances are drawn from `[DISTANCE_MIN, DISTANCE_MAX)` and scaled by this factor.
pub const DISTANCE_SCALE: u16 = 100;
pub const DISTANCE_MIN: u16 = 2;
pub const DISTANCE_MAX: u16 = 50;

/// The base distance handed to the encoder cycles through `1..=BASE_DISTANCE_MAX`.
pub const BASE_DISTANCE_MAX: u16 = 10;

/// Default MSOP (point cloud) destination port.
pub const DEFAULT_MSOP_PORT: u16 = 51180;

/// Default DIFOP (device info) port. Declared for completeness, nothing is sent there.
pub const DEFAULT_DIFOP_PORT: u16 = 51080;

/// UDP source port stamped on every raw datagram.
pub const SOURCE_PORT: u16 = 51234;

pub const DEFAULT_FRAME_COUNT: u32 = 1_000_000;

/// Pause between frames in milliseconds.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 10;

pub const LASER_MODULE_NUM: u8 = 4;
pub const CHANNEL_NUM_PER_MODULE: u8 = 2;
pub const BLOCK_NUM: u8 = 12;
pub const POINT_NUM_PER_LASER_HORIZON: u16 = 200;
pub const POINT_NUM_PER_LASER_VERTICAL: u16 = 48;

/// Angular resolutions in degrees.
pub const RESOLUTION_HORIZON: f32 = 0.1;
pub const RESOLUTION_VERTICAL: f32 = 0.4;

/// Wire unit for azimuth and elevation, in degrees.
pub const ANGLE_UNIT: f32 = 0.01;

pub const IPV4_HEADER_SIZE: usize = 20;
pub const UDP_HEADER_SIZE: usize = 8;

/// Ethernet MTU. Raw datagrams carry Don't Fragment and are never fragmented by the kernel.
pub const DEFAULT_MTU: usize = 1500;

/// Largest payload that still fits in one IPv4 datagram.
pub const MAX_UDP_PAYLOAD: usize = u16::MAX as usize - IPV4_HEADER_SIZE - UDP_HEADER_SIZE;
