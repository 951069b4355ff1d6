//! MSOP packet records and their wire encoding.
//!
//! Every record is serialized field by field in little-endian order, so the encoded size is the
//! plain sum of the field sizes with no alignment padding.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Datelike, Local, Timelike};

use crate::consts::{
    BLOCK_HEADER_SIZE, ECHO_COUNT, HEADER_SIZE, POINT_SIZE, SYNC_WORD, TAIL_BYTES, TAIL_SIZE,
    VERSION_MAJOR, VERSION_MINOR,
};

/// Calendar fields of the header, in the order they are sent.
///
/// Despite the name on the wire these hold local time: `year` counts years since 1900 and
/// `month` runs from 1 to 12.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtcTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl UtcTime {
    /// Splits a local time into the header's calendar bytes.
    pub fn from_local(time: &DateTime<Local>) -> Self {
        Self {
            year: (time.year() - 1900) as u8,
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
        }
    }

    fn as_bytes(&self) -> [u8; 6] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    pub sob: u32,
    pub frame_id: u32,
    pub seq_num: u16,
    pub version_major: u8,
    pub version_minor: u8,
    pub utc_time: UtcTime,
    /// Microseconds within the current second.
    pub timestamp: u32,
    pub measure_mode: u8,
    pub laser_num: u8,
    pub block_num: u8,
    pub echo_count: u8,
    pub time_sync_mode: u8,
    pub time_sync_stat: u8,
    pub mems_temp: u8,
    pub slot_num: u8,
    pub point_num: u32,
}

impl Default for PacketHeader {
    fn default() -> Self {
        Self {
            sob: SYNC_WORD,
            frame_id: 0,
            seq_num: 0,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            utc_time: UtcTime::default(),
            timestamp: 0,
            measure_mode: 0,
            laser_num: 0,
            block_num: 0,
            echo_count: ECHO_COUNT,
            time_sync_mode: 0,
            time_sync_stat: 0,
            mems_temp: 0,
            slot_num: 0,
            point_num: 0,
        }
    }
}

impl PacketHeader {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.sob)?;
        writer.write_u32::<LittleEndian>(self.frame_id)?;
        writer.write_u16::<LittleEndian>(self.seq_num)?;
        writer.write_u8(self.version_major)?;
        writer.write_u8(self.version_minor)?;
        writer.write_all(&self.utc_time.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.timestamp)?;
        writer.write_all(&[
            self.measure_mode,
            self.laser_num,
            self.block_num,
            self.echo_count,
            self.time_sync_mode,
            self.time_sync_stat,
            self.mems_temp,
            self.slot_num,
        ])?;
        writer.write_u32::<LittleEndian>(self.point_num)?;
        Ok(())
    }
}

/// One return of one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointSample {
    /// Radial distance in 0.01 m.
    pub distance: u16,
    /// Azimuth in 0.01 degree.
    pub azimuth: u16,
    /// Elevation in 0.01 degree.
    pub elevation: u16,
    pub intensity: u8,
    pub reserved: u16,
}

impl PointSample {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.distance)?;
        writer.write_u16::<LittleEndian>(self.azimuth)?;
        writer.write_u16::<LittleEndian>(self.elevation)?;
        writer.write_u8(self.intensity)?;
        writer.write_u16::<LittleEndian>(self.reserved)?;
        Ok(())
    }
}

/// A firing group: one sample per channel behind a 4 byte sub-header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub channel_num: u8,
    pub time_offset: u8,
    pub return_sn: u8,
    pub reserved: u8,
    pub points: Vec<PointSample>,
}

impl Block {
    pub fn wire_len(&self) -> usize {
        BLOCK_HEADER_SIZE + self.points.len() * POINT_SIZE
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[
            self.channel_num,
            self.time_offset,
            self.return_sn,
            self.reserved,
        ])?;
        for point in &self.points {
            point.write_to(writer)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tail(pub [u8; TAIL_SIZE]);

impl Default for Tail {
    fn default() -> Self {
        Tail(TAIL_BYTES)
    }
}

/// Header, blocks and tail of one MSOP datagram payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub blocks: Vec<Block>,
    pub tail: Tail,
}

impl Packet {
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.blocks.iter().map(Block::wire_len).sum::<usize>() + TAIL_SIZE
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.header.write_to(writer)?;
        for block in &self.blocks {
            block.write_to(writer)?;
        }
        writer.write_all(&self.tail.0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_len());
        // io::Write for Vec never fails
        let _ = self.write_to(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = PacketHeader {
            frame_id: 0x0102_0304,
            seq_num: 0x0506,
            utc_time: UtcTime {
                year: 126,
                month: 10,
                day: 16,
                hour: 7,
                minute: 35,
                second: 59,
            },
            timestamp: 500_000,
            laser_num: 8,
            block_num: 12,
            point_num: 38_400,
            ..PacketHeader::default()
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[0..4], &[0xAA, 0x55, 0xA5, 0x5A]);
        assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[8..10], &[0x06, 0x05]);
        assert_eq!(&buf[10..12], &[0x01, 0x04]);
        assert_eq!(&buf[12..18], &[126, 10, 16, 7, 35, 59]);
        assert_eq!(&buf[18..22], &[0x20, 0xA1, 0x07, 0x00]);
        assert_eq!(&buf[22..30], &[0, 8, 12, 1, 0, 0, 0, 0]);
        assert_eq!(&buf[30..34], &38_400u32.to_le_bytes());
    }

    #[test]
    fn calendar_bytes_from_local_time() {
        use chrono::TimeZone;

        let time = Local.with_ymd_and_hms(2031, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            UtcTime::from_local(&time).as_bytes(),
            [131, 1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn point_layout() {
        let point = PointSample {
            distance: 0x1234,
            azimuth: 0x5678,
            elevation: 0x9ABC,
            intensity: 0xDE,
            reserved: 0,
        };
        let mut buf = Vec::new();
        point.write_to(&mut buf).unwrap();
        assert_eq!(buf, [0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A, 0xDE, 0, 0]);
    }

    #[test]
    fn packet_has_no_padding() {
        let block = Block {
            channel_num: 8,
            points: vec![PointSample::default(); 8],
            ..Block::default()
        };
        assert_eq!(block.wire_len(), 76);

        let packet = Packet {
            blocks: vec![block; 12],
            ..Packet::default()
        };
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), packet.wire_len());
        assert_eq!(bytes.len(), 34 + 12 * 76 + 4);
        assert_eq!(bytes[34], 8);
        assert_eq!(&bytes[bytes.len() - 4..], &TAIL_BYTES);
    }
}
