//! Precomputed scan pattern of one frame.

use std::ops::Index;

use crate::config::SensorLayout;

/// Angular position of one point, in wire units (0.01 degree by default).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScanPoint {
    pub azimuth: u16,
    pub elevation: u16,
}

/// Read-only table with one [`ScanPoint`] per point of a frame, ordered ring by ring.
///
/// Entry `ring * row_len + step` holds the point at horizontal `step` of `ring`, where
/// `row_len = horizontal_steps * modules`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanGeometryMap {
    points: Vec<ScanPoint>,
    row_len: usize,
}

impl ScanGeometryMap {
    /// Builds the table.
    ///
    /// Both angles accumulate in 16 bits and wrap on overflow. Elevation is bumped before the
    /// first point of every ring is written, so ring 0 already sits one increment above zero.
    /// Azimuth restarts at zero for every ring and is likewise bumped before each point.
    pub fn build(
        vertical_rings: u16,
        horizontal_steps: u16,
        modules: u16,
        vertical_resolution: f32,
        horizontal_resolution: f32,
        angle_unit: f32,
    ) -> Self {
        let layout = SensorLayout {
            vertical_rings,
            horizontal_steps,
            modules,
            vertical_resolution,
            horizontal_resolution,
            angle_unit,
            ..SensorLayout::default()
        };
        Self::from_layout(&layout)
    }

    pub fn from_layout(layout: &SensorLayout) -> Self {
        let rings = layout.vertical_rings as usize;
        let row_len = layout.horizontal_steps as usize * layout.modules as usize;
        let azimuth_step = layout.azimuth_increment();
        let elevation_step = layout.elevation_increment();

        let mut points = Vec::with_capacity(rings * row_len);
        let mut elevation: u16 = 0;
        for _ in 0..rings {
            elevation = elevation.wrapping_add(elevation_step);
            let mut azimuth: u16 = 0;
            for _ in 0..row_len {
                azimuth = azimuth.wrapping_add(azimuth_step);
                points.push(ScanPoint { azimuth, elevation });
            }
        }

        Self { points, row_len }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in one ring.
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn points(&self) -> &[ScanPoint] {
        &self.points
    }

    /// The points of one ring, or `None` past the last ring.
    pub fn ring(&self, ring: usize) -> Option<&[ScanPoint]> {
        let start = ring.checked_mul(self.row_len)?;
        self.points.get(start..start + self.row_len)
    }

    /// `count` consecutive points starting at `start`.
    ///
    /// # Panics
    ///
    /// Panics if the window runs past the end of the table.
    pub fn window(&self, start: usize, count: usize) -> &[ScanPoint] {
        &self.points[start..start + count]
    }
}

impl Index<usize> for ScanGeometryMap {
    type Output = ScanPoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn default_table() {
        let map = ScanGeometryMap::from_layout(&SensorLayout::default());
        assert_eq!(map.len(), 48 * 200 * 4);
        assert_eq!(map.row_len(), 800);
        assert_eq!(map[0], ScanPoint { azimuth: 10, elevation: 40 });
        assert_eq!(map[799], ScanPoint { azimuth: 8000, elevation: 40 });
        assert_eq!(map[800], ScanPoint { azimuth: 10, elevation: 80 });
        assert_eq!(
            *map.points().last().unwrap(),
            ScanPoint { azimuth: 8000, elevation: 48 * 40 }
        );
    }

    #[test]
    fn rings_are_ordered() {
        let map = ScanGeometryMap::build(6, 20, 3, 0.4, 0.1, 0.01);
        assert_eq!(map.len(), 6 * 20 * 3);

        let rings: Vec<_> = (0..6).map(|r| map.ring(r).unwrap()).collect();
        assert!(map.ring(6).is_none());
        for ring in &rings {
            assert!(ring.iter().map(|p| p.azimuth).tuple_windows().all(|(a, b)| a < b));
            assert!(ring.iter().map(|p| p.elevation).all_equal());
        }
        assert!(rings
            .iter()
            .map(|ring| ring[0].elevation)
            .tuple_windows()
            .all(|(a, b)| a < b));
    }

    #[test]
    fn azimuth_wraps_silently() {
        // 7000 steps of 10 units overflow u16 after step 6553.
        let map = ScanGeometryMap::build(1, 7000, 1, 0.4, 0.1, 0.01);
        assert_eq!(map[6552].azimuth, 65530);
        assert_eq!(map[6553].azimuth, 4);
    }

    #[test]
    fn window_is_contiguous() {
        let map = ScanGeometryMap::build(2, 4, 1, 1.0, 1.0, 0.01);
        let window = map.window(3, 3);
        assert_eq!(window, &map.points()[3..6]);
        assert_eq!(window[1], ScanPoint { azimuth: 100, elevation: 200 });
    }
}
