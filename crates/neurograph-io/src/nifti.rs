// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! NIfTI-1 single-file volumes
//!
//! Reads `.nii` and gzip-compressed `.nii.gz` files of either byte order and
//! writes little-endian float32 volumes. Voxel data is stored on disk in
//! Fortran order (x fastest); in memory every image is an `Array4<f32>`
//! indexed `[x, y, z, t]`, with 3-D volumes carrying a single timepoint.

use crate::error::{open_error, DataIoError, DataIoResult};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array4, ArrayView3, Axis, ShapeBuilder};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// `sizeof_hdr` of a NIfTI-1 header
pub const HEADER_SIZE: usize = 348;
/// Header plus the 4-byte extension flag
const DATA_OFFSET: usize = 352;
const MAGIC_SINGLE_FILE: &[u8; 4] = b"n+1\0";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const UNITS_MM: u8 = 2;
const UNITS_SEC: u8 = 8;
const UNITS_MSEC: u8 = 16;
const UNITS_USEC: u8 = 24;

/// Voxel storage types understood by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiftiDataType {
    Uint8,
    Int16,
    Int32,
    Float32,
    Float64,
    Int8,
    Uint16,
    Uint32,
}

impl NiftiDataType {
    pub fn from_code(code: i16) -> DataIoResult<Self> {
        Ok(match code {
            2 => Self::Uint8,
            4 => Self::Int16,
            8 => Self::Int32,
            16 => Self::Float32,
            64 => Self::Float64,
            256 => Self::Int8,
            512 => Self::Uint16,
            768 => Self::Uint32,
            other => return Err(DataIoError::UnsupportedDataType(other)),
        })
    }

    pub fn code(self) -> i16 {
        match self {
            Self::Uint8 => 2,
            Self::Int16 => 4,
            Self::Int32 => 8,
            Self::Float32 => 16,
            Self::Float64 => 64,
            Self::Int8 => 256,
            Self::Uint16 => 512,
            Self::Uint32 => 768,
        }
    }

    pub fn bytes_per_voxel(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// The subset of the NIfTI-1 header that the pipeline reads or preserves
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    pub dim: [i16; 8],
    pub datatype: NiftiDataType,
    pub pixdim: [f32; 8],
    pub vox_offset: f32,
    pub scl_slope: f32,
    pub scl_inter: f32,
    pub xyzt_units: u8,
    pub descrip: String,
    pub qform_code: i16,
    pub sform_code: i16,
    pub quatern: [f32; 3],
    pub qoffset: [f32; 3],
    pub srow_x: [f32; 4],
    pub srow_y: [f32; 4],
    pub srow_z: [f32; 4],
}

impl NiftiHeader {
    /// Float32 header for a `[x, y, z, t]` grid with a scanner-space sform of
    /// the given voxel sizes
    pub fn new(shape: [usize; 4], voxel_sizes: [f32; 3], t_r: f32) -> Self {
        let ndim = if shape[3] > 1 { 4 } else { 3 };
        let mut dim = [1i16; 8];
        dim[0] = ndim;
        for (i, &extent) in shape.iter().enumerate() {
            dim[i + 1] = extent as i16;
        }
        let pixdim = [
            1.0,
            voxel_sizes[0],
            voxel_sizes[1],
            voxel_sizes[2],
            t_r,
            0.0,
            0.0,
            0.0,
        ];
        Self {
            dim,
            datatype: NiftiDataType::Float32,
            pixdim,
            vox_offset: DATA_OFFSET as f32,
            scl_slope: 1.0,
            scl_inter: 0.0,
            xyzt_units: UNITS_MM | UNITS_SEC,
            descrip: String::new(),
            qform_code: 0,
            sform_code: 1,
            quatern: [0.0; 3],
            qoffset: [0.0; 3],
            srow_x: [voxel_sizes[0], 0.0, 0.0, 0.0],
            srow_y: [0.0, voxel_sizes[1], 0.0, 0.0],
            srow_z: [0.0, 0.0, voxel_sizes[2], 0.0],
        }
    }

    /// Number of dimensions declared in `dim[0]`
    pub fn ndim(&self) -> usize {
        self.dim[0].max(0) as usize
    }

    /// Grid extents as `[x, y, z, t]`, missing axes reported as 1
    pub fn shape(&self) -> [usize; 4] {
        let mut shape = [1usize; 4];
        for (i, extent) in shape.iter_mut().enumerate() {
            if i < self.ndim() {
                *extent = self.dim[i + 1].max(1) as usize;
            }
        }
        shape
    }

    /// Voxel edge lengths in millimetres
    pub fn voxel_sizes(&self) -> [f64; 3] {
        [
            self.pixdim[1].abs() as f64,
            self.pixdim[2].abs() as f64,
            self.pixdim[3].abs() as f64,
        ]
    }

    /// Repetition time in seconds, if the header records one
    pub fn repetition_time(&self) -> Option<f64> {
        if self.ndim() < 4 || !(self.pixdim[4] > 0.0) {
            return None;
        }
        let value = self.pixdim[4] as f64;
        Some(match self.xyzt_units & 0x38 {
            UNITS_MSEC => value / 1_000.0,
            UNITS_USEC => value / 1_000_000.0,
            _ => value,
        })
    }

    /// Voxel-to-world affine
    ///
    /// Uses the sform when `sform_code > 0`, else the qform quaternion when
    /// `qform_code > 0`, else plain voxel scaling.
    pub fn affine(&self) -> [[f64; 4]; 4] {
        if self.sform_code > 0 {
            let row = |r: &[f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
            return [
                row(&self.srow_x),
                row(&self.srow_y),
                row(&self.srow_z),
                [0.0, 0.0, 0.0, 1.0],
            ];
        }

        let [dx, dy, dz] = self.voxel_sizes();
        if self.qform_code > 0 {
            let b = self.quatern[0] as f64;
            let c = self.quatern[1] as f64;
            let d = self.quatern[2] as f64;
            let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
            let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            let rot = [
                [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
                [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
                [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - c * c - b * b],
            ];
            let scale = [dx, dy, dz * qfac];
            let mut affine = [[0.0; 4]; 4];
            for r in 0..3 {
                for col in 0..3 {
                    affine[r][col] = rot[r][col] * scale[col];
                }
                affine[r][3] = self.qoffset[r] as f64;
            }
            affine[3][3] = 1.0;
            return affine;
        }

        [
            [dx, 0.0, 0.0, 0.0],
            [0.0, dy, 0.0, 0.0],
            [0.0, 0.0, dz, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Parse a header, detecting byte order from `sizeof_hdr`
    pub fn parse(buf: &[u8]) -> DataIoResult<(Self, bool)> {
        if buf.len() < HEADER_SIZE {
            return Err(DataIoError::Truncated {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }
        if LittleEndian::read_i32(&buf[0..4]) == HEADER_SIZE as i32 {
            Ok((Self::parse_with::<LittleEndian>(buf)?, false))
        } else if BigEndian::read_i32(&buf[0..4]) == HEADER_SIZE as i32 {
            Ok((Self::parse_with::<BigEndian>(buf)?, true))
        } else {
            Err(DataIoError::InvalidHeader(
                "sizeof_hdr is not 348 in either byte order".to_string(),
            ))
        }
    }

    fn parse_with<B: ByteOrder>(buf: &[u8]) -> DataIoResult<Self> {
        if &buf[344..348] != MAGIC_SINGLE_FILE {
            return Err(DataIoError::InvalidHeader(format!(
                "unsupported magic {:?} (only single-file n+1 images are supported)",
                String::from_utf8_lossy(&buf[344..347])
            )));
        }

        let mut dim = [0i16; 8];
        for (i, d) in dim.iter_mut().enumerate() {
            *d = B::read_i16(&buf[40 + 2 * i..]);
        }
        let ndim = dim[0];
        if !(1..=7).contains(&ndim) {
            return Err(DataIoError::InvalidHeader(format!("dim[0] = {} out of range", ndim)));
        }
        for (axis, &extent) in dim.iter().enumerate().take(ndim as usize + 1).skip(1) {
            if extent < 1 {
                return Err(DataIoError::InvalidHeader(format!(
                    "dim[{}] = {} must be positive",
                    axis, extent
                )));
            }
            if axis > 4 && extent > 1 {
                return Err(DataIoError::InvalidHeader(format!(
                    "{}-D images are not supported",
                    ndim
                )));
            }
        }

        let mut pixdim = [0f32; 8];
        for (i, p) in pixdim.iter_mut().enumerate() {
            *p = B::read_f32(&buf[76 + 4 * i..]);
        }
        let read_row = |offset: usize| {
            [
                B::read_f32(&buf[offset..]),
                B::read_f32(&buf[offset + 4..]),
                B::read_f32(&buf[offset + 8..]),
                B::read_f32(&buf[offset + 12..]),
            ]
        };
        let descrip_raw = &buf[148..228];
        let descrip_len = descrip_raw.iter().position(|&b| b == 0).unwrap_or(descrip_raw.len());

        Ok(Self {
            dim,
            datatype: NiftiDataType::from_code(B::read_i16(&buf[70..]))?,
            pixdim,
            vox_offset: B::read_f32(&buf[108..]),
            scl_slope: B::read_f32(&buf[112..]),
            scl_inter: B::read_f32(&buf[116..]),
            xyzt_units: buf[123],
            descrip: String::from_utf8_lossy(&descrip_raw[..descrip_len]).into_owned(),
            qform_code: B::read_i16(&buf[252..]),
            sform_code: B::read_i16(&buf[254..]),
            quatern: [
                B::read_f32(&buf[256..]),
                B::read_f32(&buf[260..]),
                B::read_f32(&buf[264..]),
            ],
            qoffset: [
                B::read_f32(&buf[268..]),
                B::read_f32(&buf[272..]),
                B::read_f32(&buf[276..]),
            ],
            srow_x: read_row(280),
            srow_y: read_row(296),
            srow_z: read_row(312),
        })
    }

    /// Encode header plus empty extension flag (352 bytes)
    pub(crate) fn encode<B: ByteOrder>(&self) -> Vec<u8> {
        let mut buf = vec![0u8; DATA_OFFSET];
        B::write_i32(&mut buf[0..4], HEADER_SIZE as i32);
        buf[38] = b'r';
        for (i, &d) in self.dim.iter().enumerate() {
            B::write_i16(&mut buf[40 + 2 * i..], d);
        }
        B::write_i16(&mut buf[70..], self.datatype.code());
        B::write_i16(&mut buf[72..], (self.datatype.bytes_per_voxel() * 8) as i16);
        for (i, &p) in self.pixdim.iter().enumerate() {
            B::write_f32(&mut buf[76 + 4 * i..], p);
        }
        B::write_f32(&mut buf[108..], self.vox_offset);
        B::write_f32(&mut buf[112..], self.scl_slope);
        B::write_f32(&mut buf[116..], self.scl_inter);
        buf[123] = self.xyzt_units;
        let descrip = self.descrip.as_bytes();
        let n = descrip.len().min(79);
        buf[148..148 + n].copy_from_slice(&descrip[..n]);
        B::write_i16(&mut buf[252..], self.qform_code);
        B::write_i16(&mut buf[254..], self.sform_code);
        for (i, &q) in self.quatern.iter().enumerate() {
            B::write_f32(&mut buf[256 + 4 * i..], q);
        }
        for (i, &q) in self.qoffset.iter().enumerate() {
            B::write_f32(&mut buf[268 + 4 * i..], q);
        }
        for (row, offset) in [(&self.srow_x, 280), (&self.srow_y, 296), (&self.srow_z, 312)] {
            for (i, &v) in row.iter().enumerate() {
                B::write_f32(&mut buf[offset + 4 * i..], v);
            }
        }
        buf[344..348].copy_from_slice(MAGIC_SINGLE_FILE);
        buf
    }
}

/// A volume or time series of volumes with its header
#[derive(Debug, Clone)]
pub struct NiftiImage {
    pub header: NiftiHeader,
    /// Voxel values indexed `[x, y, z, t]`
    pub data: Array4<f32>,
}

impl NiftiImage {
    /// Wrap `data` in a copy of `template`, updating extents and storage type
    pub fn from_array(data: Array4<f32>, template: &NiftiHeader) -> Self {
        let s = data.shape();
        let header = float32_header(template, [s[0], s[1], s[2], s[3]]);
        Self { header, data }
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn n_timepoints(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// Spatial volume at timepoint `t`
    pub fn volume(&self, t: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(3), t)
    }
}

/// Copy of `template` describing a float32 grid of `shape`
fn float32_header(template: &NiftiHeader, shape: [usize; 4]) -> NiftiHeader {
    let mut header = template.clone();
    header.dim = [1; 8];
    header.dim[0] = if shape[3] > 1 || template.ndim() >= 4 { 4 } else { 3 };
    for (i, &extent) in shape.iter().enumerate() {
        header.dim[i + 1] = extent as i16;
    }
    header.datatype = NiftiDataType::Float32;
    header.vox_offset = DATA_OFFSET as f32;
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header
}

/// Read a NIfTI-1 file (`.nii` or `.nii.gz`, gzip detected by content)
pub fn read_nifti(path: &Path) -> DataIoResult<NiftiImage> {
    let mut raw = Vec::new();
    File::open(path)
        .map_err(|e| open_error(path, e))?
        .read_to_end(&mut raw)?;

    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        let mut decompressed = Vec::with_capacity(raw.len() * 4);
        MultiGzDecoder::new(&raw[..]).read_to_end(&mut decompressed)?;
        decompressed
    } else {
        raw
    };

    let (header, big_endian) = NiftiHeader::parse(&bytes)?;
    let data = if big_endian {
        decode_voxels::<BigEndian>(&header, &bytes)?
    } else {
        decode_voxels::<LittleEndian>(&header, &bytes)?
    };

    debug!(
        path = %path.display(),
        shape = ?header.shape(),
        datatype = ?header.datatype,
        "Loaded NIfTI image"
    );
    Ok(NiftiImage { header, data })
}

fn decode_voxels<B: ByteOrder>(header: &NiftiHeader, bytes: &[u8]) -> DataIoResult<Array4<f32>> {
    let [nx, ny, nz, nt] = header.shape();
    let n_voxels = nx * ny * nz * nt;
    let width = header.datatype.bytes_per_voxel();
    let offset = (header.vox_offset.max(0.0) as usize).max(DATA_OFFSET);
    let expected = offset + n_voxels * width;
    if bytes.len() < expected {
        return Err(DataIoError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let raw = &bytes[offset..expected];
    let mut values: Vec<f32> = match header.datatype {
        NiftiDataType::Uint8 => raw.iter().map(|&v| v as f32).collect(),
        NiftiDataType::Int8 => raw.iter().map(|&v| v as i8 as f32).collect(),
        NiftiDataType::Int16 => raw.chunks_exact(2).map(|c| B::read_i16(c) as f32).collect(),
        NiftiDataType::Uint16 => raw.chunks_exact(2).map(|c| B::read_u16(c) as f32).collect(),
        NiftiDataType::Int32 => raw.chunks_exact(4).map(|c| B::read_i32(c) as f32).collect(),
        NiftiDataType::Uint32 => raw.chunks_exact(4).map(|c| B::read_u32(c) as f32).collect(),
        NiftiDataType::Float32 => raw.chunks_exact(4).map(B::read_f32).collect(),
        NiftiDataType::Float64 => raw.chunks_exact(8).map(|c| B::read_f64(c) as f32).collect(),
    };

    let slope = header.scl_slope;
    if slope != 0.0 && slope.is_finite() && (slope != 1.0 || header.scl_inter != 0.0) {
        let inter = if header.scl_inter.is_finite() { header.scl_inter } else { 0.0 };
        for v in values.iter_mut() {
            *v = *v * slope + inter;
        }
    }

    Ok(Array4::from_shape_vec((nx, ny, nz, nt).f(), values)?)
}

/// Write a single-file float32 NIfTI-1 image; gzip when the path ends in `.gz`
pub fn write_nifti(path: &Path, image: &NiftiImage) -> DataIoResult<()> {
    let shape = image.shape();
    let header = float32_header(&image.header, shape);

    let mut payload = header.encode::<LittleEndian>();
    payload.reserve(image.data.len() * 4);
    // Reversed-axis view iterates x fastest, matching the on-disk order
    for &v in image.data.t().iter() {
        payload.write_f32::<LittleEndian>(v)?;
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = BufWriter::new(File::create(path)?);
    let gzip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&payload)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        file.write_all(&payload)?;
        file.flush()?;
    }

    debug!(path = %path.display(), shape = ?shape, "Wrote NIfTI image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_image(shape: [usize; 4]) -> NiftiImage {
        let data = Array4::from_shape_fn((shape[0], shape[1], shape[2], shape[3]), |(x, y, z, t)| {
            (x + 10 * y + 100 * z + 1000 * t) as f32
        });
        NiftiImage::from_array(data, &NiftiHeader::new(shape, [2.0, 2.0, 3.0], 2.0))
    }

    #[test]
    fn test_write_read_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let image = ramp_image([3, 4, 2, 5]);

        for name in ["bold.nii", "bold.nii.gz"] {
            let path = dir.path().join(name);
            write_nifti(&path, &image).unwrap();
            let loaded = read_nifti(&path).unwrap();
            assert_eq!(loaded.shape(), [3, 4, 2, 5]);
            assert_eq!(loaded.data, image.data);
            assert_eq!(loaded.header.voxel_sizes(), [2.0, 2.0, 3.0]);
            assert_eq!(loaded.header.repetition_time(), Some(2.0));
        }
    }

    #[test]
    fn test_big_endian_int16_with_scaling() {
        let mut header = NiftiHeader::new([2, 2, 1, 1], [1.0, 1.0, 1.0], 0.0);
        header.datatype = NiftiDataType::Int16;
        header.scl_slope = 0.5;
        header.scl_inter = 1.0;

        let mut bytes = header.encode::<BigEndian>();
        // x fastest: (0,0) (1,0) (0,1) (1,1)
        for v in [2i16, -4, 10, 0] {
            bytes.write_i16::<BigEndian>(v).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("be.nii");
        std::fs::write(&path, &bytes).unwrap();

        let image = read_nifti(&path).unwrap();
        assert_eq!(image.shape(), [2, 2, 1, 1]);
        assert_relative_eq!(image.data[[0, 0, 0, 0]], 2.0);
        assert_relative_eq!(image.data[[1, 0, 0, 0]], -1.0);
        assert_relative_eq!(image.data[[0, 1, 0, 0]], 6.0);
        assert_relative_eq!(image.data[[1, 1, 0, 0]], 1.0);
        assert_eq!(image.header.repetition_time(), None);
    }

    #[test]
    fn test_truncated_data() {
        let header = NiftiHeader::new([4, 4, 4, 2], [1.0, 1.0, 1.0], 2.0);
        let mut bytes = header.encode::<LittleEndian>();
        bytes.extend_from_slice(&[0u8; 16]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.nii");
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(read_nifti(&path), Err(DataIoError::Truncated { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = read_nifti(Path::new("/nonexistent/sub-0010001_bold.nii.gz"));
        assert!(matches!(result, Err(DataIoError::NotFound(_))));
    }

    #[test]
    fn test_bad_magic() {
        let header = NiftiHeader::new([1, 1, 1, 1], [1.0, 1.0, 1.0], 0.0);
        let mut bytes = header.encode::<LittleEndian>();
        bytes[344..348].copy_from_slice(b"ni1\0");
        assert!(matches!(
            NiftiHeader::parse(&bytes),
            Err(DataIoError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_affine_sources() {
        let mut header = NiftiHeader::new([10, 10, 10, 1], [2.0, 2.0, 2.0], 0.0);
        header.srow_x[3] = -90.0;
        assert_eq!(header.affine()[0], [2.0, 0.0, 0.0, -90.0]);

        // Identity quaternion with qfac = -1 flips z
        header.sform_code = 0;
        header.qform_code = 1;
        header.pixdim[0] = -1.0;
        header.qoffset = [1.0, 2.0, 3.0];
        let affine = header.affine();
        assert_relative_eq!(affine[0][0], 2.0);
        assert_relative_eq!(affine[2][2], -2.0);
        assert_relative_eq!(affine[1][3], 2.0);

        header.qform_code = 0;
        assert_relative_eq!(header.affine()[2][2], 2.0);
    }

    #[test]
    fn test_repetition_time_units() {
        let mut header = NiftiHeader::new([2, 2, 2, 10], [3.0, 3.0, 4.0], 2000.0);
        header.xyzt_units = UNITS_MM | UNITS_MSEC;
        assert_relative_eq!(header.repetition_time().unwrap(), 2.0);
    }
}
