//! Well-known binary geometry decoding (ISO and EWKB flavours, 2D output).

use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

struct WkbReader<'a> {
    cursor: Cursor<&'a [u8]>,
    little_endian: bool,
    /// Number of ordinates per coordinate (2, 3 or 4).
    dims: usize,
}

impl<'a> WkbReader<'a> {
    fn u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.cursor.read_exact(&mut b).context("[io::wkb] Unexpected end of WKB")?;
        Ok(b[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.cursor.read_exact(&mut b).context("[io::wkb] Unexpected end of WKB")?;
        Ok(if self.little_endian { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) })
    }

    fn f64(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.cursor.read_exact(&mut b).context("[io::wkb] Unexpected end of WKB")?;
        Ok(if self.little_endian { f64::from_le_bytes(b) } else { f64::from_be_bytes(b) })
    }

    fn coord(&mut self) -> Result<Coord<f64>> {
        let (x, y) = (self.f64()?, self.f64()?);
        for _ in 2..self.dims { self.f64()?; }
        Ok(Coord { x, y })
    }

    fn line_string(&mut self) -> Result<LineString<f64>> {
        let n = self.u32()? as usize;
        (0..n).map(|_| self.coord()).collect::<Result<Vec<_>>>().map(LineString::new)
    }

    fn polygon(&mut self) -> Result<Polygon<f64>> {
        let rings = self.u32()? as usize;
        if rings == 0 { return Ok(Polygon::new(LineString::new(vec![]), vec![])) }
        let exterior = self.line_string()?;
        let interiors = (1..rings).map(|_| self.line_string()).collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    /// Read a full geometry, including its own byte-order and type header.
    fn geometry(&mut self) -> Result<Geometry<f64>> {
        self.little_endian = match self.u8()? {
            0 => false,
            1 => true,
            other => bail!("[io::wkb] Invalid byte order marker {other}"),
        };

        let raw = self.u32()?;
        let (mut code, mut dims) = (raw & 0x0FFF_FFFF, 2);
        if raw & EWKB_Z != 0 { dims += 1 }
        if raw & EWKB_M != 0 { dims += 1 }
        if raw & EWKB_SRID != 0 { self.u32()?; }
        // ISO codes: 1000s = Z, 2000s = M, 3000s = ZM
        match code / 1000 {
            1 | 2 => { dims += 1; code %= 1000 }
            3 => { dims += 2; code %= 1000 }
            _ => {}
        }
        let saved = self.dims;
        self.dims = dims;

        let geometry = match code {
            1 => Geometry::Point(Point::from(self.coord()?)),
            2 => Geometry::LineString(self.line_string()?),
            3 => Geometry::Polygon(self.polygon()?),
            4 => Geometry::MultiPoint(MultiPoint::new(
                self.children()?.into_iter().filter_map(|g| Point::try_from(g).ok()).collect())),
            5 => Geometry::MultiLineString(MultiLineString::new(
                self.children()?.into_iter().filter_map(|g| LineString::try_from(g).ok()).collect())),
            6 => Geometry::MultiPolygon(MultiPolygon::new(
                self.children()?.into_iter().filter_map(|g| Polygon::try_from(g).ok()).collect())),
            7 => Geometry::GeometryCollection(GeometryCollection::new_from(self.children()?)),
            other => bail!("[io::wkb] Unsupported WKB geometry type {other}"),
        };

        self.dims = saved;
        Ok(geometry)
    }

    fn children(&mut self) -> Result<Vec<Geometry<f64>>> {
        let n = self.u32()? as usize;
        (0..n).map(|_| self.geometry()).collect()
    }
}

/// Decode a single WKB geometry.
pub(crate) fn read_wkb(bytes: &[u8]) -> Result<Geometry<f64>> {
    WkbReader { cursor: Cursor::new(bytes), little_endian: true, dims: 2 }.geometry()
}
