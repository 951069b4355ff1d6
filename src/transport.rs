//! Putting encoded packets on the wire.
//!
//! [`RawTransport`] writes its own IPv4 and UDP headers through a raw socket with `IP_HDRINCL`.
//! The source address is left as zero. Linux fills it in for header-included raw sockets, but
//! other platforms may need it resolved and written explicitly. [`UdpTransport`] is the plain
//! kernel socket fallback.

use std::{
    io::{self, Write},
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
};

use byteorder::{BigEndian, WriteBytesExt};
use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::checksum::internet_checksum;
use crate::consts::{IPV4_HEADER_SIZE, MAX_UDP_PAYLOAD, SOURCE_PORT, UDP_HEADER_SIZE};
use crate::error::SocketError;

const IPPROTO_RAW: i32 = 255;
const IPPROTO_UDP: u8 = 17;
const VERSION_IHL: u8 = 0x45;
const DONT_FRAGMENT: u16 = 0x4000;
const DEFAULT_TTL: u8 = 255;

/// Anything that can deliver an encoded packet to a destination.
pub trait PacketSink {
    /// Sends `payload` to `dest` and returns the number of bytes the transport accepted.
    fn send(&mut self, dest: SocketAddrV4, payload: &[u8]) -> Result<usize, SocketError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub dest_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    /// Header for `payload_len` bytes. The checksum is left as zero, which IPv4 allows.
    ///
    /// `payload_len` must not exceed [`MAX_UDP_PAYLOAD`]; the length field is truncated otherwise.
    pub fn new(dest_port: u16, payload_len: usize) -> Self {
        Self {
            source_port: SOURCE_PORT,
            dest_port,
            length: (UDP_HEADER_SIZE + payload_len) as u16,
            checksum: 0,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<BigEndian>(self.source_port)?;
        writer.write_u16::<BigEndian>(self.dest_port)?;
        writer.write_u16::<BigEndian>(self.length)?;
        writer.write_u16::<BigEndian>(self.checksum)?;
        Ok(())
    }
}

/// Option-less IPv4 header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// Header for a UDP datagram carrying `payload_len` bytes, with the checksum filled in.
    ///
    /// `payload_len` must not exceed [`MAX_UDP_PAYLOAD`]; the total length is truncated otherwise.
    pub fn udp(destination: Ipv4Addr, identification: u16, payload_len: usize) -> Self {
        let mut header = Self {
            version_ihl: VERSION_IHL,
            tos: 0,
            total_length: (IPV4_HEADER_SIZE + UDP_HEADER_SIZE + payload_len) as u16,
            identification,
            flags_fragment: DONT_FRAGMENT,
            ttl: DEFAULT_TTL,
            protocol: IPPROTO_UDP,
            checksum: 0,
            source: Ipv4Addr::UNSPECIFIED,
            destination,
        };
        header.checksum = header.compute_checksum();
        header
    }

    /// Checksum over the header with its checksum field zeroed.
    pub fn compute_checksum(&self) -> u16 {
        let zeroed = Self {
            checksum: 0,
            ..*self
        };
        internet_checksum(&zeroed.to_bytes())
    }

    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_SIZE] {
        let mut buf = [0u8; IPV4_HEADER_SIZE];
        // writing into a fixed buffer of exactly the header size cannot fail
        let _ = self.write_to(&mut &mut buf[..]);
        buf
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(self.version_ihl)?;
        writer.write_u8(self.tos)?;
        writer.write_u16::<BigEndian>(self.total_length)?;
        writer.write_u16::<BigEndian>(self.identification)?;
        writer.write_u16::<BigEndian>(self.flags_fragment)?;
        writer.write_u8(self.ttl)?;
        writer.write_u8(self.protocol)?;
        writer.write_u16::<BigEndian>(self.checksum)?;
        writer.write_all(&self.source.octets())?;
        writer.write_all(&self.destination.octets())?;
        Ok(())
    }
}

/// Concatenates IPv4 header, UDP header and `payload` into one datagram.
///
/// Fails with [`SocketError::PayloadTooLarge`] when the lengths would not fit their 16-bit fields.
pub fn build_datagram(
    dest: SocketAddrV4,
    identification: u16,
    payload: &[u8],
) -> Result<Vec<u8>, SocketError> {
    if payload.len() > MAX_UDP_PAYLOAD {
        return Err(SocketError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_UDP_PAYLOAD,
        });
    }
    let ip = Ipv4Header::udp(*dest.ip(), identification, payload.len());
    let udp = UdpHeader::new(dest.port(), payload.len());

    let mut buf = Vec::with_capacity(ip.total_length as usize);
    buf.extend_from_slice(&ip.to_bytes());
    // io::Write for Vec never fails
    let _ = udp.write_to(&mut buf);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Raw IPv4 socket sending hand-assembled UDP datagrams.
pub struct RawTransport {
    socket: Socket,
    rng: StdRng,
}

impl RawTransport {
    /// Opens an `IPPROTO_RAW` socket with header inclusion and broadcast enabled.
    ///
    /// Needs `CAP_NET_RAW` or root on Linux.
    pub fn open() -> Result<Self, SocketError> {
        let socket = Socket::new(
            Domain::IPV4,
            Type::RAW,
            Some(Protocol::from(IPPROTO_RAW)),
        )
        .map_err(SocketError::Create)?;
        socket
            .set_header_included_v4(true)
            .map_err(|source| SocketError::SetOption {
                option: "IP_HDRINCL",
                source,
            })?;
        socket
            .set_broadcast(true)
            .map_err(|source| SocketError::SetOption {
                option: "SO_BROADCAST",
                source,
            })?;
        info!("opened raw socket with IP_HDRINCL");

        Ok(Self {
            socket,
            rng: StdRng::from_entropy(),
        })
    }

    /// Local address of the socket. Unbound raw sockets report `0.0.0.0:0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()?.as_socket().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "raw socket has no inet address")
        })
    }
}

impl PacketSink for RawTransport {
    fn send(&mut self, dest: SocketAddrV4, payload: &[u8]) -> Result<usize, SocketError> {
        let identification = self.rng.gen_range(0..u16::MAX);
        let datagram = build_datagram(dest, identification, payload)?;
        let sent = self
            .socket
            .send_to(&datagram, &SockAddr::from(dest))
            .map_err(SocketError::Send)?;
        debug!("sent {sent} bytes to {dest}");
        check_complete(sent, datagram.len())
    }
}

/// Kernel UDP socket, for hosts where raw sockets are unavailable.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds an ephemeral local port with broadcast enabled.
    pub fn open() -> Result<Self, SocketError> {
        Self::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
    }

    pub fn bind(local: SocketAddrV4) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(SocketError::Create)?;
        socket
            .set_broadcast(true)
            .map_err(|source| SocketError::SetOption {
                option: "SO_BROADCAST",
                source,
            })?;
        socket
            .bind(&SockAddr::from(local))
            .map_err(SocketError::Bind)?;
        let socket: UdpSocket = socket.into();
        info!("opened udp socket");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl PacketSink for UdpTransport {
    fn send(&mut self, dest: SocketAddrV4, payload: &[u8]) -> Result<usize, SocketError> {
        let sent = self
            .socket
            .send_to(payload, dest)
            .map_err(SocketError::Send)?;
        debug!("sent {sent} bytes to {dest}");
        check_complete(sent, payload.len())
    }
}

impl<S: PacketSink + ?Sized> PacketSink for Box<S> {
    fn send(&mut self, dest: SocketAddrV4, payload: &[u8]) -> Result<usize, SocketError> {
        (**self).send(dest, payload)
    }
}

fn check_complete(sent: usize, expected: usize) -> Result<usize, SocketError> {
    if sent == expected {
        Ok(sent)
    } else {
        Err(SocketError::PartialSend { sent, expected })
    }
}
