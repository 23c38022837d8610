//! GDS-II stream reader and writer.
//!
//! Each record is `[2-byte length][2-byte record type][payload]`. The reader
//! collects the records of an element (BOUNDARY, BOX, PATH, SREF, AREF, TEXT)
//! up to its ENDEL and turns them into cell contents of an
//! [`LayoutLibrary`]. Coordinates are converted to micrometers with the
//! library's UNITS record; the database unit is kept on the library so the
//! geometry kernel can snap to the same grid.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path as FsPath;

use thiserror::Error;

use lvs_core::cell::{ArraySpec, Cell, CellInstance, Transform};
use lvs_core::database::LayoutLibrary;
use lvs_core::geometry::{BBox, GeomPrimitive, Label, Path, PathEnd, Point, Polygon};
use lvs_core::layer::LayerSpec;

// ── GDS-II Record Types ──────────────────────────────────────────────

#[allow(dead_code)]
mod record_type {
    pub const HEADER: u16 = 0x0002;
    pub const BGNLIB: u16 = 0x0102;
    pub const LIBNAME: u16 = 0x0206;
    pub const UNITS: u16 = 0x0305;
    pub const ENDLIB: u16 = 0x0400;
    pub const BGNSTR: u16 = 0x0502;
    pub const STRNAME: u16 = 0x0606;
    pub const ENDSTR: u16 = 0x0700;
    pub const BOUNDARY: u16 = 0x0800;
    pub const PATH: u16 = 0x0900;
    pub const SREF: u16 = 0x0A00;
    pub const AREF: u16 = 0x0B00;
    pub const TEXT: u16 = 0x0C00;
    pub const LAYER: u16 = 0x0D02;
    pub const DATATYPE: u16 = 0x0E02;
    pub const WIDTH: u16 = 0x0F03;
    pub const XY: u16 = 0x1003;
    pub const ENDEL: u16 = 0x1100;
    pub const SNAME: u16 = 0x1206;
    pub const COLROW: u16 = 0x1302;
    pub const NODE: u16 = 0x1500;
    pub const TEXTTYPE: u16 = 0x1602;
    pub const PRESENTATION: u16 = 0x1701;
    pub const STRING: u16 = 0x1906;
    pub const STRANS: u16 = 0x1A01;
    pub const MAG: u16 = 0x1B05;
    pub const ANGLE: u16 = 0x1C05;
    pub const PATHTYPE: u16 = 0x2102;
    pub const BOX: u16 = 0x2D00;
    pub const BOXTYPE: u16 = 0x2E02;
    pub const BGNEXTN: u16 = 0x3003;
    pub const ENDEXTN: u16 = 0x3103;
}

/// STRANS reflection bit.
const STRANS_REFLECT: u16 = 0x8000;

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid GDS-II record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },

    #[error("Unexpected record type 0x{record_type:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { record_type: u16, expected: u16 },

    #[error("Invalid coordinate data in {0}")]
    InvalidCoordinates(String),
}

// ── Record framing ────────────────────────────────────────────────────

#[derive(Debug)]
struct GdsRecord {
    record_type: u16,
    offset: u64,
    data: Vec<u8>,
}

impl GdsRecord {
    fn i16s(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    fn first_i16(&self) -> Option<i16> {
        self.i16s().first().copied()
    }

    fn i32s(&self) -> Vec<i32> {
        self.data
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn string(&self) -> String {
        let s: String = self.data.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    fn reals(&self) -> Vec<f64> {
        self.data
            .chunks_exact(8)
            .map(|c| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(c);
                real8_to_f64(&bytes)
            })
            .collect()
    }
}

/// Decode a GDS-II excess-64 base-16 real.
fn real8_to_f64(bytes: &[u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;
    let mantissa = bytes[1..]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64);
    sign * (mantissa as f64 / (1u64 << 56) as f64) * 16f64.powi(exponent)
}

/// Encode an f64 as a GDS-II excess-64 base-16 real.
fn f64_to_real8(value: f64) -> [u8; 8] {
    if value == 0.0 || !value.is_finite() {
        return [0u8; 8];
    }
    let sign: u8 = if value < 0.0 { 0x80 } else { 0 };
    let mut m = value.abs();
    let mut exponent: i32 = 0;
    while m >= 1.0 && exponent < 63 {
        m /= 16.0;
        exponent += 1;
    }
    while m < 1.0 / 16.0 && exponent > -64 {
        m *= 16.0;
        exponent -= 1;
    }
    let mantissa = ((m * (1u64 << 56) as f64).round() as u64).min((1u64 << 56) - 1);

    let mut out = [0u8; 8];
    out[0] = sign | ((exponent + 64) as u8 & 0x7F);
    out[1..].copy_from_slice(&mantissa.to_be_bytes()[1..]);
    out
}

// ── Element fields ────────────────────────────────────────────────────

/// Every record an element may carry between its header and ENDEL.
#[derive(Debug, Default)]
struct ElementFields {
    layer: u16,
    datatype: u16,
    width: i32,
    pathtype: i16,
    bgnextn: i32,
    endextn: i32,
    xy: Vec<(i32, i32)>,
    sname: String,
    strans: u16,
    mag: Option<f64>,
    angle: Option<f64>,
    colrow: Option<(u16, u16)>,
    string: String,
}

// ── GDS-II Reader ─────────────────────────────────────────────────────

pub struct GdsReader<R: Read> {
    reader: R,
    offset: u64,
    /// Micrometers per database unit.
    dbu_um: f64,
}

impl<R: Read> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            dbu_um: 0.001,
        }
    }

    /// Read the entire GDS-II stream into a layout library.
    pub fn read(&mut self) -> Result<LayoutLibrary, GdsError> {
        let mut lib = LayoutLibrary::new("imported");
        self.read_header()?;
        self.read_lib(&mut lib)?;
        Ok(lib)
    }

    fn read_record(&mut self) -> Result<Option<GdsRecord>, GdsError> {
        let offset = self.offset;
        let mut len_buf = [0u8; 2];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(GdsError::Io(e)),
        }
        let total_len = u16::from_be_bytes(len_buf) as usize;
        if total_len < 4 {
            return Err(GdsError::InvalidRecord {
                offset,
                message: format!("Record length {} is too small", total_len),
            });
        }

        let mut type_buf = [0u8; 2];
        self.reader.read_exact(&mut type_buf)?;
        let mut data = vec![0u8; total_len - 4];
        self.reader.read_exact(&mut data)?;
        self.offset += total_len as u64;

        Ok(Some(GdsRecord {
            record_type: u16::from_be_bytes(type_buf),
            offset,
            data,
        }))
    }

    fn expect_record(&mut self) -> Result<GdsRecord, GdsError> {
        let offset = self.offset;
        self.read_record()?.ok_or(GdsError::InvalidRecord {
            offset,
            message: "Unexpected end of stream".into(),
        })
    }

    fn read_header(&mut self) -> Result<(), GdsError> {
        let rec = self.expect_record()?;
        if rec.record_type != record_type::HEADER {
            return Err(GdsError::UnexpectedRecord {
                record_type: rec.record_type,
                expected: record_type::HEADER,
            });
        }
        if let Some(version) = rec.first_i16() {
            log::debug!("GDS-II version: {}", version);
        }
        Ok(())
    }

    fn read_lib(&mut self, lib: &mut LayoutLibrary) -> Result<(), GdsError> {
        while let Some(rec) = self.read_record()? {
            match rec.record_type {
                record_type::LIBNAME => {
                    lib.name = rec.string();
                }
                record_type::UNITS => {
                    let units = rec.reals();
                    if units.len() < 2 || units[0] <= 0.0 || units[1] <= 0.0 {
                        return Err(GdsError::InvalidRecord {
                            offset: rec.offset,
                            message: "UNITS must carry two positive reals".into(),
                        });
                    }
                    // units[0]: database unit in user units, units[1]: in meters.
                    self.dbu_um = units[1] * 1e6;
                    lib.dbu = self.dbu_um;
                    lib.user_unit_m = units[1] / units[0];
                    log::info!(
                        "Library '{}': database unit {} um, user unit {} m",
                        lib.name,
                        lib.dbu,
                        lib.user_unit_m
                    );
                }
                record_type::BGNSTR => self.read_structure(lib)?,
                record_type::ENDLIB => {
                    log::info!("Read {} cells from GDS stream", lib.cell_count());
                    return Ok(());
                }
                _ => {}
            }
        }
        log::warn!("GDS stream ended without ENDLIB");
        Ok(())
    }

    fn read_structure(&mut self, lib: &mut LayoutLibrary) -> Result<(), GdsError> {
        let mut cell = Cell::new("unnamed");
        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::STRNAME => cell.name = rec.string(),
                record_type::BOUNDARY => {
                    let f = self.read_element()?;
                    if let Some(poly) = self.boundary(&f, "BOUNDARY")? {
                        cell.add_polygon(poly);
                    }
                }
                record_type::BOX => {
                    let f = self.read_element()?;
                    let points = self.points(&f);
                    if let Some(bb) = BBox::from_points(&points) {
                        cell.add_polygon(Polygon::rect(
                            LayerSpec::new(f.layer, f.datatype),
                            bb.min.x,
                            bb.min.y,
                            bb.max.x,
                            bb.max.y,
                        ));
                    }
                }
                record_type::PATH => {
                    let f = self.read_element()?;
                    if let Some(path) = self.path(&f) {
                        cell.add_geometry(GeomPrimitive::Path(path));
                    }
                }
                record_type::SREF | record_type::AREF => {
                    let f = self.read_element()?;
                    let inst = self.instance(&f, rec.record_type == record_type::AREF)?;
                    cell.add_instance(inst);
                }
                record_type::TEXT => {
                    let f = self.read_element()?;
                    if let Some(&(x, y)) = f.xy.first() {
                        cell.add_label(Label::new(
                            LayerSpec::new(f.layer, f.datatype),
                            f.string.trim(),
                            self.point(x, y),
                        ));
                    }
                }
                record_type::NODE => {
                    self.read_element()?;
                }
                record_type::ENDSTR => break,
                _ => {}
            }
        }
        log::debug!(
            "Cell '{}': {} shapes, {} instances, {} labels",
            cell.name,
            cell.geometry_count(),
            cell.instance_count(),
            cell.labels.len()
        );
        lib.add_cell(cell);
        Ok(())
    }

    fn read_element(&mut self) -> Result<ElementFields, GdsError> {
        let mut f = ElementFields::default();
        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::LAYER => f.layer = rec.first_i16().unwrap_or(0) as u16,
                record_type::DATATYPE | record_type::TEXTTYPE | record_type::BOXTYPE => {
                    f.datatype = rec.first_i16().unwrap_or(0) as u16
                }
                record_type::WIDTH => f.width = rec.i32s().first().copied().unwrap_or(0),
                record_type::PATHTYPE => f.pathtype = rec.first_i16().unwrap_or(0),
                record_type::BGNEXTN => f.bgnextn = rec.i32s().first().copied().unwrap_or(0),
                record_type::ENDEXTN => f.endextn = rec.i32s().first().copied().unwrap_or(0),
                record_type::XY => {
                    let raw = rec.i32s();
                    if raw.len() % 2 != 0 {
                        return Err(GdsError::InvalidRecord {
                            offset: rec.offset,
                            message: "XY record with an odd number of values".into(),
                        });
                    }
                    f.xy = raw.chunks_exact(2).map(|c| (c[0], c[1])).collect();
                }
                record_type::SNAME => f.sname = rec.string(),
                record_type::STRANS => f.strans = rec.first_i16().unwrap_or(0) as u16,
                record_type::MAG => f.mag = rec.reals().first().copied(),
                record_type::ANGLE => f.angle = rec.reals().first().copied(),
                record_type::COLROW => {
                    let v = rec.i16s();
                    if v.len() >= 2 {
                        f.colrow = Some((v[0].max(0) as u16, v[1].max(0) as u16));
                    }
                }
                record_type::STRING => f.string = rec.string(),
                record_type::ENDEL => return Ok(f),
                _ => {}
            }
        }
    }

    fn point(&self, x: i32, y: i32) -> Point {
        Point::new(x as f64 * self.dbu_um, y as f64 * self.dbu_um)
    }

    fn points(&self, f: &ElementFields) -> Vec<Point> {
        f.xy.iter().map(|&(x, y)| self.point(x, y)).collect()
    }

    fn boundary(&self, f: &ElementFields, what: &str) -> Result<Option<Polygon>, GdsError> {
        let mut points = self.points(f);
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.is_empty() {
            return Ok(None);
        }
        if points.len() < 3 {
            return Err(GdsError::InvalidCoordinates(format!(
                "{} with {} vertices",
                what,
                points.len()
            )));
        }
        Ok(Some(Polygon::new(LayerSpec::new(f.layer, f.datatype), points)))
    }

    fn path(&self, f: &ElementFields) -> Option<Path> {
        let points = self.points(f);
        if points.len() < 2 {
            return None;
        }
        let end = match f.pathtype {
            1 | 2 => PathEnd::HalfWidth,
            4 => PathEnd::Custom {
                begin: f.bgnextn as f64 * self.dbu_um,
                end: f.endextn as f64 * self.dbu_um,
            },
            _ => PathEnd::Flush,
        };
        Some(
            Path::new(
                LayerSpec::new(f.layer, f.datatype),
                points,
                f.width.unsigned_abs() as f64 * self.dbu_um,
            )
            .with_end(end),
        )
    }

    fn instance(&self, f: &ElementFields, arrayed: bool) -> Result<CellInstance, GdsError> {
        let points = self.points(f);
        let origin = points
            .first()
            .copied()
            .ok_or_else(|| GdsError::InvalidCoordinates(format!("reference to '{}'", f.sname)))?;
        let transform = Transform {
            offset: origin,
            rotation: f.angle.unwrap_or(0.0),
            mirror_x: f.strans & STRANS_REFLECT != 0,
            scale: f.mag.unwrap_or(1.0),
        };
        if !arrayed {
            return Ok(CellInstance::new(&f.sname, transform));
        }

        let (columns, rows) = f.colrow.unwrap_or((1, 1));
        if points.len() < 3 || columns == 0 || rows == 0 {
            return Err(GdsError::InvalidCoordinates(format!(
                "AREF of '{}'",
                f.sname
            )));
        }
        let step = |p: Point, n: u16| {
            Point::new((p.x - origin.x) / n as f64, (p.y - origin.y) / n as f64)
        };
        Ok(CellInstance::arrayed(
            &f.sname,
            transform,
            ArraySpec {
                columns,
                rows,
                column_step: step(points[1], columns),
                row_step: step(points[2], rows),
            },
        ))
    }
}

/// Read a GDS-II file from disk.
pub fn read_gds(path: impl AsRef<FsPath>) -> Result<LayoutLibrary, GdsError> {
    let file = File::open(path.as_ref())?;
    GdsReader::new(BufReader::new(file)).read()
}

// ── GDS-II Writer ─────────────────────────────────────────────────────

const TIMESTAMP: [i16; 12] = [2024, 1, 1, 0, 0, 0, 2024, 1, 1, 0, 0, 0];

pub struct GdsWriter<W: Write> {
    writer: W,
    dbu_um: f64,
}

fn ring_area2(ring: &[Point]) -> f64 {
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum()
}

/// A boundary has no holes, so each hole is spliced into the outer ring
/// through a zero-width cut from the first outer vertex. Holes run against
/// the outer ring's orientation.
fn keyhole_ring(poly: &Polygon) -> Vec<Point> {
    let mut ring = poly.vertices.clone();
    let Some(&start) = poly.vertices.first() else {
        return ring;
    };
    let outer_ccw = ring_area2(&poly.vertices) > 0.0;
    for hole in poly.holes.iter().filter(|h| h.len() >= 3) {
        let mut hole = hole.clone();
        if (ring_area2(&hole) > 0.0) == outer_ccw {
            hole.reverse();
        }
        ring.push(start);
        ring.push(hole[0]);
        ring.extend_from_slice(&hole[1..]);
        ring.push(hole[0]);
    }
    ring
}

impl<W: Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            dbu_um: 0.001,
        }
    }

    /// Write a library as a GDS-II stream, using the library's units.
    pub fn write(&mut self, lib: &LayoutLibrary) -> Result<(), GdsError> {
        self.dbu_um = if lib.dbu > 0.0 { lib.dbu } else { 0.001 };
        let dbu_m = self.dbu_um * 1e-6;
        let user_unit_m = if lib.user_unit_m > 0.0 { lib.user_unit_m } else { 1e-6 };

        self.write_i16_record(record_type::HEADER, &[600])?;
        self.write_i16_record(record_type::BGNLIB, &TIMESTAMP)?;
        self.write_string_record(record_type::LIBNAME, &lib.name)?;
        self.write_real8_record(record_type::UNITS, &[dbu_m / user_unit_m, dbu_m])?;
        for cell in lib.all_cells() {
            self.write_cell(cell)?;
        }
        self.write_record(record_type::ENDLIB, &[])?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = u16::try_from(data.len() + 4).map_err(|_| GdsError::InvalidRecord {
            offset: 0,
            message: format!("record payload of {} bytes is too long", data.len()),
        })?;
        self.writer.write_all(&total_len.to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data: Vec<u8> = s.bytes().collect();
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| f64_to_real8(*v)).collect();
        self.write_record(record_type, &data)
    }

    fn grid(&self, v: f64) -> Result<i32, GdsError> {
        let g = (v / self.dbu_um).round();
        if g.is_finite() && g >= i32::MIN as f64 && g <= i32::MAX as f64 {
            Ok(g as i32)
        } else {
            Err(GdsError::InvalidCoordinates(format!("{} um", v)))
        }
    }

    fn xy(&self, points: &[Point]) -> Result<Vec<i32>, GdsError> {
        let mut coords = Vec::with_capacity(points.len() * 2);
        for p in points {
            coords.push(self.grid(p.x)?);
            coords.push(self.grid(p.y)?);
        }
        Ok(coords)
    }

    fn write_layer(&mut self, layer: LayerSpec, type_record: u16) -> Result<(), GdsError> {
        self.write_i16_record(record_type::LAYER, &[layer.layer as i16])?;
        self.write_i16_record(type_record, &[layer.datatype as i16])
    }

    fn write_cell(&mut self, cell: &Cell) -> Result<(), GdsError> {
        self.write_i16_record(record_type::BGNSTR, &TIMESTAMP)?;
        self.write_string_record(record_type::STRNAME, &cell.name)?;
        for geom in &cell.geometries {
            match geom {
                GeomPrimitive::Polygon(poly) => self.write_polygon(poly)?,
                GeomPrimitive::Path(path) => self.write_path(path)?,
            }
        }
        for inst in &cell.instances {
            self.write_reference(inst)?;
        }
        for label in &cell.labels {
            self.write_text(label)?;
        }
        self.write_record(record_type::ENDSTR, &[])
    }

    fn write_polygon(&mut self, poly: &Polygon) -> Result<(), GdsError> {
        let ring = keyhole_ring(poly);
        let mut coords = self.xy(&ring)?;
        if coords.len() >= 2 {
            coords.push(coords[0]);
            coords.push(coords[1]);
        }
        self.write_record(record_type::BOUNDARY, &[])?;
        self.write_layer(poly.layer, record_type::DATATYPE)?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_path(&mut self, path: &Path) -> Result<(), GdsError> {
        self.write_record(record_type::PATH, &[])?;
        self.write_layer(path.layer, record_type::DATATYPE)?;
        match path.end {
            PathEnd::Flush => {}
            PathEnd::HalfWidth => self.write_i16_record(record_type::PATHTYPE, &[2])?,
            PathEnd::Custom { begin, end } => {
                self.write_i16_record(record_type::PATHTYPE, &[4])?;
                let (b, e) = (self.grid(begin)?, self.grid(end)?);
                self.write_i32_record(record_type::BGNEXTN, &[b])?;
                self.write_i32_record(record_type::ENDEXTN, &[e])?;
            }
        }
        let width = self.grid(path.width)?;
        self.write_i32_record(record_type::WIDTH, &[width])?;
        let coords = self.xy(&path.points)?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_reference(&mut self, inst: &CellInstance) -> Result<(), GdsError> {
        let t = inst.transform;
        let kind = if inst.array.is_some() {
            record_type::AREF
        } else {
            record_type::SREF
        };
        self.write_record(kind, &[])?;
        self.write_string_record(record_type::SNAME, &inst.cell_name)?;
        if t.mirror_x || t.rotation != 0.0 || t.scale != 1.0 {
            let bits = if t.mirror_x { STRANS_REFLECT } else { 0 };
            self.write_i16_record(record_type::STRANS, &[bits as i16])?;
            if t.scale != 1.0 {
                self.write_real8_record(record_type::MAG, &[t.scale])?;
            }
            if t.rotation != 0.0 {
                self.write_real8_record(record_type::ANGLE, &[t.rotation])?;
            }
        }
        let mut points = vec![t.offset];
        if let Some(a) = inst.array {
            self.write_i16_record(record_type::COLROW, &[a.columns as i16, a.rows as i16])?;
            points.push(t.offset.translate(
                a.column_step.x * a.columns as f64,
                a.column_step.y * a.columns as f64,
            ));
            points.push(
                t.offset
                    .translate(a.row_step.x * a.rows as f64, a.row_step.y * a.rows as f64),
            );
        }
        let coords = self.xy(&points)?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_text(&mut self, label: &Label) -> Result<(), GdsError> {
        self.write_record(record_type::TEXT, &[])?;
        self.write_layer(label.layer, record_type::TEXTTYPE)?;
        let coords = self.xy(&[label.position])?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_string_record(record_type::STRING, &label.text)?;
        self.write_record(record_type::ENDEL, &[])
    }
}

/// Write a library to disk as GDS-II.
pub fn write_gds(path: impl AsRef<FsPath>, lib: &LayoutLibrary) -> Result<(), GdsError> {
    let file = File::create(path.as_ref())?;
    GdsWriter::new(BufWriter::new(file)).write(lib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DIFF: LayerSpec = LayerSpec::new(1, 0);
    const M1: LayerSpec = LayerSpec::new(7, 0);
    const PIN: LayerSpec = LayerSpec::new(8, 5);

    fn roundtrip(lib: &LayoutLibrary) -> LayoutLibrary {
        let mut buffer: Vec<u8> = Vec::new();
        GdsWriter::new(&mut buffer).write(lib).unwrap();
        GdsReader::new(Cursor::new(buffer)).read().unwrap()
    }

    #[test]
    fn test_real8_units_values() {
        for v in [1e-3, 1e-9, 1.0, 90.0] {
            let back = real8_to_f64(&f64_to_real8(v));
            assert!((back - v).abs() < v * 1e-12, "{} decoded as {}", v, back);
        }
        // 1.0 is 0x41 0x10 00..
        assert_eq!(f64_to_real8(1.0)[0], 0x41);
        assert_eq!(f64_to_real8(1.0)[1], 0x10);
    }

    #[test]
    fn test_polygons_and_labels_survive_write_read() {
        let mut lib = LayoutLibrary::new("inv_lib");
        let mut cell = Cell::new("INV");
        cell.add_polygon(Polygon::rect(DIFF, 0.0, 0.0, 2.2, 1.0));
        cell.add_polygon(Polygon::rect(M1, 1.4, 0.2, 1.9, 3.9));
        cell.add_label(Label::new(PIN, "Y", Point::new(1.65, 2.0)));
        lib.add_cell(cell);

        let read = roundtrip(&lib);
        assert_eq!(read.name, "inv_lib");
        assert!((read.dbu - 0.001).abs() < 1e-12);
        assert!((read.user_unit_m - 1e-6).abs() < 1e-15);

        let cell = read.get_cell("INV").unwrap();
        assert_eq!(cell.geometry_count(), 2);
        assert_eq!(cell.labels.len(), 1);
        assert_eq!(cell.labels[0].text, "Y");
        assert_eq!(cell.labels[0].layer, PIN);
        assert!((cell.labels[0].position.x - 1.65).abs() < 1e-9);

        let GeomPrimitive::Polygon(p) = &cell.geometries[0] else {
            panic!("expected a polygon");
        };
        assert_eq!(p.layer, DIFF);
        assert_eq!(p.vertex_count(), 4);
        let bb = p.bbox().unwrap();
        assert!((bb.max.x - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_holes_are_written_as_a_keyhole() {
        let outer = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        // same orientation as the outer ring; the writer reverses it
        let hole = vec![
            Point::new(1.0, 1.0),
            Point::new(3.0, 1.0),
            Point::new(3.0, 3.0),
            Point::new(1.0, 3.0),
        ];
        let mut lib = LayoutLibrary::new("lib");
        let mut cell = Cell::new("RING");
        cell.add_polygon(Polygon::with_holes(M1, outer, vec![hole]));
        lib.add_cell(cell);

        let read = roundtrip(&lib);
        let GeomPrimitive::Polygon(p) = &read.get_cell("RING").unwrap().geometries[0] else {
            panic!("expected a polygon");
        };
        // outer ring, cut back to the start, hole closed on itself
        assert_eq!(p.vertex_count(), 10);
        let at = |i: usize, x: f64, y: f64| {
            let v = p.vertices[i];
            assert!((v.x - x).abs() < 1e-9 && (v.y - y).abs() < 1e-9, "vertex {}: {:?}", i, v);
        };
        at(4, 0.0, 0.0);
        at(5, 1.0, 3.0);
        at(6, 3.0, 3.0);
        at(9, 1.0, 3.0);
    }

    #[test]
    fn test_references_paths_and_flattening() {
        let mut lib = LayoutLibrary::new("hier");
        let mut leaf = Cell::new("leaf");
        leaf.add_polygon(Polygon::rect(M1, 0.0, 0.0, 1.0, 1.0));
        lib.add_cell(leaf);

        let mut top = Cell::new("top");
        top.add_geometry(GeomPrimitive::Path(
            Path::new(M1, vec![Point::new(0.0, 10.0), Point::new(5.0, 10.0)], 0.5)
                .with_end(PathEnd::Custom { begin: 0.1, end: 0.2 }),
        ));
        top.add_instance(CellInstance::new(
            "leaf",
            Transform {
                offset: Point::new(5.0, 0.0),
                rotation: 90.0,
                mirror_x: false,
                scale: 1.0,
            },
        ));
        top.add_instance(CellInstance::arrayed(
            "leaf",
            Transform::translate(20.0, 0.0),
            ArraySpec {
                columns: 3,
                rows: 2,
                column_step: Point::new(2.0, 0.0),
                row_step: Point::new(0.0, 3.0),
            },
        ));
        lib.add_cell(top);

        let read = roundtrip(&lib);
        assert_eq!(read.top_cells(), vec!["top"]);
        let top = read.get_cell("top").unwrap();
        assert_eq!(top.instances[1].array.unwrap().columns, 3);
        let GeomPrimitive::Path(path) = &top.geometries[0] else {
            panic!("expected a path");
        };
        let PathEnd::Custom { begin, end } = path.end else {
            panic!("expected explicit extensions");
        };
        assert!((begin - 0.1).abs() < 1e-9);
        assert!((end - 0.2).abs() < 1e-9);

        let flat = read.flatten("top").unwrap();
        // path + rotated leaf + 6 arrayed copies
        assert_eq!(flat.polygons.len(), 8);
        let rotated = flat.polygons[1].bbox().unwrap();
        assert!((rotated.min.x - 4.0).abs() < 1e-9);
        assert!((rotated.max.x - 5.0).abs() < 1e-9);
        let last = flat.polygons[7].bbox().unwrap();
        assert!((last.min.x - 24.0).abs() < 1e-9);
        assert!((last.min.y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_stream_without_header() {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.extend_from_slice(&4u16.to_be_bytes());
        buffer.extend_from_slice(&record_type::ENDLIB.to_be_bytes());
        let err = GdsReader::new(Cursor::new(buffer)).read().unwrap_err();
        assert!(matches!(err, GdsError::UnexpectedRecord { .. }));
    }
}
