//! PCD (Point Cloud Data) I/O
//!
//! PCD is the native format for Point Cloud Library (PCL). Only `x y z` are
//! required; `normal_x/normal_y/normal_z` and a packed `rgb`/`rgba` field are
//! picked up when present.

use crate::{Error, Result};
use cv_core::point_cloud::PointCloud;
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// PCD data format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdData {
    Ascii,
    Binary,
    BinaryCompressed,
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    size: usize,
    kind: char,
    count: usize,
}

#[derive(Debug, Clone)]
struct PcdHeader {
    fields: Vec<Field>,
    points: usize,
    record_bytes: usize,
    data: PcdData,
}

/// Points reserved up front; larger clouds grow as records are decoded.
const PREALLOCATED_POINTS: usize = 1 << 20;

/// Where a field lives inside one record.
#[derive(Debug, Clone, Copy)]
struct Slot {
    kind: char,
    size: usize,
    column: usize,
    byte_offset: usize,
}

impl PcdHeader {
    fn slot(&self, names: &[&str]) -> Option<Slot> {
        let mut column = 0;
        let mut byte_offset = 0;
        for f in &self.fields {
            if names.contains(&f.name.as_str()) {
                return Some(Slot {
                    kind: f.kind,
                    size: f.size,
                    column,
                    byte_offset,
                });
            }
            column += f.count;
            byte_offset += f.size * f.count;
        }
        None
    }

    fn record_bytes(&self) -> usize {
        self.record_bytes
    }
}

/// One decoded-but-unparsed record.
enum Record<'a> {
    Ascii(&'a [&'a str]),
    Binary(&'a [u8]),
}

impl Record<'_> {
    fn scalar(&self, slot: Slot) -> Result<f32> {
        match self {
            Record::Ascii(tokens) => {
                let token = tokens.get(slot.column).ok_or_else(|| {
                    Error::Parse(format!("Missing column {} in PCD record", slot.column))
                })?;
                if token.eq_ignore_ascii_case("nan") {
                    return Ok(f32::NAN);
                }
                token
                    .parse::<f64>()
                    .map(|v| v as f32)
                    .map_err(|_| Error::Parse(format!("Invalid PCD value '{}'", token)))
            }
            Record::Binary(bytes) => {
                let raw = field_bytes(bytes, slot)?;
                let value = match (slot.kind, slot.size) {
                    ('F', 4) => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
                    ('F', 8) => f64::from_le_bytes(eight(raw)) as f32,
                    ('U', 1) => raw[0] as f32,
                    ('U', 2) => u16::from_le_bytes([raw[0], raw[1]]) as f32,
                    ('U', 4) => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32,
                    ('I', 1) => raw[0] as i8 as f32,
                    ('I', 2) => i16::from_le_bytes([raw[0], raw[1]]) as f32,
                    ('I', 4) => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32,
                    (kind, size) => {
                        return Err(Error::UnsupportedFormat(format!(
                            "PCD field type {}{} not supported",
                            kind, size
                        )))
                    }
                };
                Ok(value)
            }
        }
    }

    /// Packed 0x00RRGGBB color. PCL stores `rgb` as a float whose bit pattern
    /// is the packed integer.
    fn packed_color(&self, slot: Slot) -> Result<u32> {
        match self {
            Record::Ascii(tokens) => {
                let token = tokens.get(slot.column).ok_or_else(|| {
                    Error::Parse(format!("Missing column {} in PCD record", slot.column))
                })?;
                if slot.kind == 'F' {
                    token
                        .parse::<f32>()
                        .map(f32::to_bits)
                        .map_err(|_| Error::Parse(format!("Invalid PCD color '{}'", token)))
                } else {
                    token
                        .parse::<u32>()
                        .map_err(|_| Error::Parse(format!("Invalid PCD color '{}'", token)))
                }
            }
            Record::Binary(bytes) => {
                let raw = field_bytes(bytes, slot)?;
                if raw.len() < 4 {
                    return Err(Error::UnsupportedFormat(
                        "PCD color field must be 4 bytes".to_string(),
                    ));
                }
                Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
        }
    }
}

fn field_bytes(bytes: &[u8], slot: Slot) -> Result<&[u8]> {
    bytes
        .get(slot.byte_offset..slot.byte_offset + slot.size)
        .ok_or_else(|| Error::Parse("Truncated PCD binary record".to_string()))
}

fn eight(raw: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&raw[..8]);
    out
}

/// Open and read a PCD file.
pub fn load_pcd<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let cloud = read_pcd(BufReader::new(file))?;
    tracing::debug!("Loaded {} points from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Read a PCD stream
pub fn read_pcd<R: BufRead>(mut reader: R) -> Result<PointCloud> {
    let header = read_header(&mut reader)?;

    match header.data {
        PcdData::Ascii => parse_pcd_ascii(reader, &header),
        PcdData::Binary => parse_pcd_binary(reader, &header),
        PcdData::BinaryCompressed => Err(Error::UnsupportedFormat(
            "Binary compressed PCD not supported".to_string(),
        )),
    }
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<PcdHeader> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut types: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width: usize = 0;
    let mut height: usize = 1;
    let mut points_count = 0;

    let mut line = String::new();
    let data = loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::Parse("Unexpected EOF in header".to_string()));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        match parts[0] {
            "FIELDS" => {
                names = parts[1..].iter().map(|s| s.to_string()).collect();
            }
            "SIZE" => {
                sizes = parts[1..].iter().map(|s| s.parse().unwrap_or(4)).collect();
            }
            "TYPE" => {
                types = parts[1..].iter().filter_map(|s| s.chars().next()).collect();
            }
            "COUNT" => {
                counts = parts[1..].iter().map(|s| s.parse().unwrap_or(1)).collect();
            }
            "WIDTH" => {
                width = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
            }
            "HEIGHT" => {
                height = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
            }
            "POINTS" => {
                points_count = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
            }
            "DATA" => {
                break match parts.get(1).copied() {
                    Some("binary") => PcdData::Binary,
                    Some("binary_compressed") => PcdData::BinaryCompressed,
                    _ => PcdData::Ascii,
                };
            }
            _ => {}
        }
    };

    if points_count == 0 {
        points_count = width
            .checked_mul(height)
            .ok_or_else(|| Error::Parse(format!("PCD size {width} x {height} overflows")))?;
    }

    let fields: Vec<Field> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Field {
            name,
            size: sizes.get(i).copied().unwrap_or(4),
            kind: types.get(i).copied().unwrap_or('F'),
            count: counts.get(i).copied().unwrap_or(1),
        })
        .collect();

    // Columns and bytes per record must both be representable.
    let mut columns = 0usize;
    let mut record_bytes = 0usize;
    for f in &fields {
        columns = columns.checked_add(f.count).ok_or_else(|| field_overflow(f))?;
        record_bytes = f
            .size
            .checked_mul(f.count)
            .and_then(|bytes| record_bytes.checked_add(bytes))
            .ok_or_else(|| field_overflow(f))?;
    }

    Ok(PcdHeader {
        fields,
        points: points_count,
        record_bytes,
        data,
    })
}

fn field_overflow(field: &Field) -> Error {
    Error::Parse(format!(
        "PCD field '{}' (SIZE {}, COUNT {}) overflows the record size",
        field.name, field.size, field.count
    ))
}

/// Accumulates decoded records into a cloud.
struct CloudBuilder {
    x: Slot,
    y: Slot,
    z: Slot,
    normal: Option<(Slot, Slot, Slot)>,
    color: Option<Slot>,
    points: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    colors: Vec<Point3<f32>>,
}

impl CloudBuilder {
    fn new(header: &PcdHeader) -> Result<Self> {
        let axis = |name: &str| {
            header
                .slot(&[name])
                .ok_or_else(|| Error::Parse(format!("PCD file has no '{}' field", name)))
        };
        let normal = match (
            header.slot(&["normal_x", "nx"]),
            header.slot(&["normal_y", "ny"]),
            header.slot(&["normal_z", "nz"]),
        ) {
            (Some(nx), Some(ny), Some(nz)) => Some((nx, ny, nz)),
            _ => None,
        };

        Ok(Self {
            x: axis("x")?,
            y: axis("y")?,
            z: axis("z")?,
            normal,
            color: header.slot(&["rgb", "rgba"]),
            points: Vec::with_capacity(header.points.min(PREALLOCATED_POINTS)),
            normals: Vec::new(),
            colors: Vec::new(),
        })
    }

    fn push(&mut self, record: &Record<'_>) -> Result<()> {
        self.points.push(Point3::new(
            record.scalar(self.x)?,
            record.scalar(self.y)?,
            record.scalar(self.z)?,
        ));

        if let Some((nx, ny, nz)) = self.normal {
            self.normals.push(Vector3::new(
                record.scalar(nx)?,
                record.scalar(ny)?,
                record.scalar(nz)?,
            ));
        }

        if let Some(slot) = self.color {
            let packed = record.packed_color(slot)?;
            let r = ((packed >> 16) & 0xFF) as f32 / 255.0;
            let g = ((packed >> 8) & 0xFF) as f32 / 255.0;
            let b = (packed & 0xFF) as f32 / 255.0;
            self.colors.push(Point3::new(r, g, b));
        }
        Ok(())
    }

    fn finish(self) -> PointCloud {
        let mut cloud = PointCloud::new(self.points);
        if self.normal.is_some() {
            cloud.normals = Some(self.normals);
        }
        if self.color.is_some() {
            cloud.colors = Some(self.colors);
        }
        cloud
    }
}

fn parse_pcd_ascii<R: BufRead>(reader: R, header: &PcdHeader) -> Result<PointCloud> {
    let mut builder = CloudBuilder::new(header)?;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        builder.push(&Record::Ascii(&tokens))?;

        if builder.points.len() >= header.points {
            break;
        }
    }

    if builder.points.len() < header.points {
        return Err(Error::Parse(format!(
            "PCD declares {} points but only {} were read",
            header.points,
            builder.points.len()
        )));
    }

    Ok(builder.finish())
}

fn parse_pcd_binary<R: BufRead>(mut reader: R, header: &PcdHeader) -> Result<PointCloud> {
    let mut builder = CloudBuilder::new(header)?;
    let stride = header.record_bytes();
    if stride == 0 {
        return Err(Error::Parse("PCD header declares no fields".to_string()));
    }

    let expected = stride.checked_mul(header.points).ok_or_else(|| {
        Error::Parse(format!(
            "PCD declares {} points of {} bytes, more than can be addressed",
            header.points, stride
        ))
    })?;

    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    if data.len() < expected {
        return Err(Error::Parse(format!(
            "PCD binary payload has {} bytes, expected {}",
            data.len(),
            expected
        )));
    }

    for record in data.chunks_exact(stride).take(header.points) {
        builder.push(&Record::Binary(record))?;
    }

    Ok(builder.finish())
}

/// Write point cloud to PCD format (ASCII)
pub fn write_pcd<W: Write>(writer: &mut W, cloud: &PointCloud) -> Result<()> {
    let num_points = cloud.len();
    let has_normals = cloud.normals.is_some();
    let has_colors = cloud.colors.is_some();

    writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
    writeln!(writer, "VERSION 0.7")?;

    write!(writer, "FIELDS x y z")?;
    if has_normals {
        write!(writer, " normal_x normal_y normal_z")?;
    }
    if has_colors {
        write!(writer, " rgb")?;
    }
    writeln!(writer)?;

    write!(writer, "SIZE 4 4 4")?;
    if has_normals {
        write!(writer, " 4 4 4")?;
    }
    if has_colors {
        write!(writer, " 4")?;
    }
    writeln!(writer)?;

    write!(writer, "TYPE F F F")?;
    if has_normals {
        write!(writer, " F F F")?;
    }
    if has_colors {
        write!(writer, " U")?;
    }
    writeln!(writer)?;

    write!(writer, "COUNT 1 1 1")?;
    if has_normals {
        write!(writer, " 1 1 1")?;
    }
    if has_colors {
        write!(writer, " 1")?;
    }
    writeln!(writer)?;

    writeln!(writer, "WIDTH {}", num_points)?;
    writeln!(writer, "HEIGHT 1")?;
    writeln!(writer, "VIEWPOINT 0 0 0 1 0 0 0")?;
    writeln!(writer, "POINTS {}", num_points)?;
    writeln!(writer, "DATA ascii")?;

    for i in 0..num_points {
        let p = cloud.points[i];
        write!(writer, "{} {} {}", p.x, p.y, p.z)?;

        if let Some(ref normals) = cloud.normals {
            let n = normals[i];
            write!(writer, " {} {} {}", n.x, n.y, n.z)?;
        }

        if let Some(ref colors) = cloud.colors {
            let c = colors[i];
            let r = (c.x.clamp(0.0, 1.0) * 255.0).round() as u32;
            let g = (c.y.clamp(0.0, 1.0) * 255.0).round() as u32;
            let b = (c.z.clamp(0.0, 1.0) * 255.0).round() as u32;
            let packed: u32 = (r << 16) | (g << 8) | b;
            write!(writer, " {}", packed)?;
        }

        writeln!(writer)?;
    }

    Ok(())
}
