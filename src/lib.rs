//! Simulated LiDAR that streams MSOP point cloud packets.
//!
//! A [`ScanGeometryMap`] is built once per run, [`PacketEncoder`] turns a window of it into a
//! [`Packet`], and a [`PacketSink`] such as [`RawTransport`] puts the encoded bytes on the wire.
//! [`FrameGenerator`] ties the three together.

pub mod checksum;
pub mod config;
pub mod consts;
pub mod encoder;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod packet;
pub mod transport;

pub use config::{Config, ConfigFile, Overrides, SensorLayout, TransportKind};
pub use encoder::{Clock, FixedClock, PacketEncoder, SystemClock};
pub use error::{ConfigError, SocketError};
pub use generator::{FrameGenerator, RunStats};
pub use geometry::{ScanGeometryMap, ScanPoint};
pub use packet::{Block, Packet, PacketHeader, PointSample, Tail, UtcTime};
pub use transport::{PacketSink, RawTransport, UdpTransport};
