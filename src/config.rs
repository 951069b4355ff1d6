//! Run configuration: sensor layout, destination and pacing.
//!
//! Values come from three places, later ones winning: built-in defaults, an optional TOML file
//! and command line overrides.

use std::{
    fs,
    net::{Ipv4Addr, SocketAddrV4},
    path::Path,
    str::FromStr,
    time::Duration,
};

use derivative::Derivative;
use serde::Deserialize;

use crate::consts::{
    self, ANGLE_UNIT, BLOCK_HEADER_SIZE, HEADER_SIZE, IPV4_HEADER_SIZE, POINT_SIZE, TAIL_SIZE,
    UDP_HEADER_SIZE,
};
use crate::error::ConfigError;

/// Dimensions of the simulated sensor and of the packets it emits.
#[derive(Derivative, Deserialize, Clone, Debug, PartialEq)]
#[derivative(Default)]
#[serde(default, deny_unknown_fields)]
pub struct SensorLayout {
    /// Number of laser modules.
    #[derivative(Default(value = "consts::LASER_MODULE_NUM as u16"))]
    pub modules: u16,
    #[derivative(Default(value = "consts::CHANNEL_NUM_PER_MODULE as u16"))]
    pub channels_per_module: u16,
    #[derivative(Default(value = "consts::BLOCK_NUM as u16"))]
    pub blocks_per_packet: u16,
    /// Rings per frame, i.e. points along the vertical axis of one laser.
    #[derivative(Default(value = "consts::POINT_NUM_PER_LASER_VERTICAL"))]
    pub vertical_rings: u16,
    /// Points along the horizontal axis of one laser.
    #[derivative(Default(value = "consts::POINT_NUM_PER_LASER_HORIZON"))]
    pub horizontal_steps: u16,
    /// Degrees between consecutive rings.
    #[derivative(Default(value = "consts::RESOLUTION_VERTICAL"))]
    pub vertical_resolution: f32,
    /// Degrees between consecutive horizontal steps.
    #[derivative(Default(value = "consts::RESOLUTION_HORIZON"))]
    pub horizontal_resolution: f32,
    /// Wire unit of azimuth and elevation in degrees.
    #[derivative(Default(value = "ANGLE_UNIT"))]
    pub angle_unit: f32,
}

impl SensorLayout {
    pub fn with_modules(modules: u16) -> Self {
        Self {
            modules,
            ..Self::default()
        }
    }

    pub fn channels_per_block(&self) -> usize {
        self.modules as usize * self.channels_per_module as usize
    }

    pub fn points_per_packet(&self) -> usize {
        self.blocks_per_packet as usize * self.channels_per_block()
    }

    pub fn points_per_frame(&self) -> usize {
        self.vertical_rings as usize * self.horizontal_steps as usize * self.modules as usize
    }

    /// Sub-packets needed to carry one frame.
    pub fn packets_per_frame(&self) -> usize {
        match self.points_per_packet() {
            0 => 0,
            n => self.points_per_frame() / n,
        }
    }

    pub fn block_len(&self) -> usize {
        BLOCK_HEADER_SIZE + self.channels_per_block() * POINT_SIZE
    }

    /// Encoded size of one packet. Constant for a given layout.
    pub fn packet_len(&self) -> usize {
        HEADER_SIZE + self.blocks_per_packet as usize * self.block_len() + TAIL_SIZE
    }

    /// Azimuth step in wire units.
    pub fn azimuth_increment(&self) -> u16 {
        angle_increment(self.horizontal_resolution, self.angle_unit)
    }

    /// Elevation step in wire units.
    pub fn elevation_increment(&self) -> u16 {
        angle_increment(self.vertical_resolution, self.angle_unit)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("modules", self.modules),
            ("channels_per_module", self.channels_per_module),
            ("blocks_per_packet", self.blocks_per_packet),
            ("vertical_rings", self.vertical_rings),
            ("horizontal_steps", self.horizontal_steps),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(invalid(format!("{name} must be at least 1")));
        }
        if self.channels_per_block() > u8::MAX as usize {
            return Err(invalid(format!(
                "{} channels per block do not fit the header's laser count",
                self.channels_per_block()
            )));
        }
        if self.blocks_per_packet > u8::MAX as u16 {
            return Err(invalid(format!(
                "{} blocks per packet do not fit the header's block count",
                self.blocks_per_packet
            )));
        }
        if self.points_per_frame() % self.points_per_packet() != 0 {
            return Err(invalid(format!(
                "{} points per frame is not a multiple of {} points per packet",
                self.points_per_frame(),
                self.points_per_packet()
            )));
        }
        if self.packet_len() > consts::MAX_UDP_PAYLOAD {
            return Err(invalid(format!(
                "{} byte packets do not fit in one datagram",
                self.packet_len()
            )));
        }
        let resolutions = [
            ("vertical_resolution", self.vertical_resolution),
            ("horizontal_resolution", self.horizontal_resolution),
            ("angle_unit", self.angle_unit),
        ];
        if let Some((name, _)) = resolutions
            .iter()
            .find(|(_, value)| !value.is_finite() || *value <= 0.0)
        {
            return Err(invalid(format!("{name} must be a positive number")));
        }
        if self.azimuth_increment() == 0 || self.elevation_increment() == 0 {
            return Err(invalid(
                "resolutions must be at least one angle unit".to_string(),
            ));
        }
        Ok(())
    }
}

fn angle_increment(resolution: f32, unit: f32) -> u16 {
    // saturating float-to-int cast
    (resolution / unit).round() as u16
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::InvalidLayout(reason)
}

/// Which socket carries the packets.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Hand-built IPv4 and UDP headers over a raw socket.
    #[default]
    Raw,
    /// Plain kernel UDP socket.
    Udp,
}

/// Contents of the optional TOML config file. Every key may be omitted.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub ipaddr: Option<String>,
    pub port: Option<u16>,
    pub count: Option<u32>,
    pub interval_ms: Option<u64>,
    pub transport: Option<TransportKind>,
    pub mtu: Option<usize>,
    pub layout: SensorLayout,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }
}

impl FromStr for ConfigFile {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line. `None` leaves the file or default value in place.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub ipaddr: Option<String>,
    pub port: Option<String>,
    pub count: Option<u32>,
    pub laser: Option<u16>,
    pub interval_ms: Option<u64>,
    pub mtu: Option<usize>,
    pub udp: bool,
}

/// Fully resolved run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub target: SocketAddrV4,
    pub frames: u32,
    pub frame_interval: Duration,
    pub transport: TransportKind,
    /// Largest datagram the raw path may emit.
    pub mtu: usize,
    pub layout: SensorLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: SocketAddrV4::new(Ipv4Addr::BROADCAST, consts::DEFAULT_MSOP_PORT),
            frames: consts::DEFAULT_FRAME_COUNT,
            frame_interval: Duration::from_millis(consts::DEFAULT_FRAME_INTERVAL_MS),
            transport: TransportKind::default(),
            mtu: consts::DEFAULT_MTU,
            layout: SensorLayout::default(),
        }
    }
}

impl Config {
    /// Merges file values and overrides on top of the defaults and validates the result.
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ip = match overrides.ipaddr.or(file.ipaddr) {
            Some(text) => parse_address(&text)?,
            None => *defaults.target.ip(),
        };
        let port = match overrides.port {
            Some(text) => parse_port(&text)?,
            None => match file.port {
                Some(0) => return Err(ConfigError::InvalidPort("0".to_string())),
                Some(port) => port,
                None => defaults.target.port(),
            },
        };

        let mut layout = file.layout;
        if let Some(laser) = overrides.laser {
            layout.modules = laser;
        }
        layout.validate()?;

        let transport = if overrides.udp {
            TransportKind::Udp
        } else {
            file.transport.unwrap_or(defaults.transport)
        };

        let mtu = overrides.mtu.or(file.mtu).unwrap_or(defaults.mtu);
        let datagram_len = IPV4_HEADER_SIZE + UDP_HEADER_SIZE + layout.packet_len();
        if transport == TransportKind::Raw && datagram_len > mtu {
            return Err(ConfigError::ExceedsMtu {
                packet_len: layout.packet_len(),
                datagram_len,
                mtu,
            });
        }

        Ok(Self {
            target: SocketAddrV4::new(ip, port),
            frames: overrides.count.or(file.count).unwrap_or(defaults.frames),
            frame_interval: overrides
                .interval_ms
                .or(file.interval_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.frame_interval),
            transport,
            mtu,
            layout,
        })
    }
}

/// Parses a dotted-quad IPv4 literal.
pub fn parse_address(text: &str) -> Result<Ipv4Addr, ConfigError> {
    text.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(text.to_string()))
}

/// Parses a non-zero UDP port.
pub fn parse_port(text: &str) -> Result<u16, ConfigError> {
    match text.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(text.to_string())),
    }
}
