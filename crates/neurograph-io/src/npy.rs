// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! NumPy `.npy` matrices
//!
//! Time series (`time × region`) and connectivity matrices (`region × region`)
//! are exchanged as 2-D float arrays so they stay readable from NumPy.

use crate::error::{open_error, DataIoError, DataIoResult};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use ndarray::{Array2, ShapeBuilder};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

/// Write a matrix as NPY v1.0, little-endian float64, C order
pub fn write_npy(path: &Path, array: &Array2<f64>) -> DataIoResult<()> {
    let (rows, cols) = array.dim();
    let dict = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // magic(6) + version(2) + header_len(2) + dict + padding + '\n'
    let unpadded = NPY_MAGIC.len() + 4 + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(NPY_MAGIC)?;
    out.write_all(&[1, 0])?;
    out.write_u16::<LittleEndian>(header_len as u16)?;
    out.write_all(dict.as_bytes())?;
    out.write_all(&vec![b' '; padding])?;
    out.write_all(b"\n")?;
    for &v in array.iter() {
        out.write_f64::<LittleEndian>(v)?;
    }
    out.flush()?;
    Ok(())
}

/// Element encoding parsed from the `descr` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Descr {
    big_endian: bool,
    width: usize,
}

/// Read a 2-D float32/float64 NPY file (format versions 1-3, either order)
pub fn read_npy(path: &Path) -> DataIoResult<Array2<f64>> {
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| open_error(path, e))?
        .read_to_end(&mut bytes)?;
    parse_npy(&bytes)
}

fn parse_npy(bytes: &[u8]) -> DataIoResult<Array2<f64>> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(DataIoError::InvalidNpy("missing \\x93NUMPY magic".to_string()));
    }
    let major = bytes[6];
    let (header_len, dict_start) = match major {
        1 => (LittleEndian::read_u16(&bytes[8..10]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(DataIoError::InvalidNpy("truncated preamble".to_string()));
            }
            (LittleEndian::read_u32(&bytes[8..12]) as usize, 12)
        }
        other => {
            return Err(DataIoError::InvalidNpy(format!("unsupported format version {}", other)))
        }
    };
    let data_start = dict_start + header_len;
    if bytes.len() < data_start {
        return Err(DataIoError::Truncated {
            expected: data_start,
            actual: bytes.len(),
        });
    }
    let dict = std::str::from_utf8(&bytes[dict_start..data_start])
        .map_err(|_| DataIoError::InvalidNpy("header is not valid UTF-8".to_string()))?;

    let descr = parse_descr(&quoted_value(dict, "descr")?)?;
    let fortran_order = match raw_value(dict, "fortran_order")?.trim() {
        v if v.starts_with("True") => true,
        v if v.starts_with("False") => false,
        other => {
            return Err(DataIoError::InvalidNpy(format!("bad fortran_order '{}'", other)))
        }
    };
    let shape = parse_shape(dict)?;
    let (rows, cols) = match shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        other => {
            return Err(DataIoError::ShapeMismatch(format!(
                "expected a 2-D array, found shape {:?}",
                other
            )))
        }
    };

    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(descr.width))
        .ok_or_else(|| {
            DataIoError::InvalidNpy(format!("shape ({}, {}) overflows the address space", rows, cols))
        })?;
    let payload = &bytes[data_start..];
    if payload.len() < expected {
        return Err(DataIoError::Truncated {
            expected: data_start.saturating_add(expected),
            actual: bytes.len(),
        });
    }
    let payload = &payload[..expected];
    let values: Vec<f64> = match (descr.width, descr.big_endian) {
        (8, false) => payload.chunks_exact(8).map(LittleEndian::read_f64).collect(),
        (8, true) => payload.chunks_exact(8).map(BigEndian::read_f64).collect(),
        (4, false) => payload.chunks_exact(4).map(|c| LittleEndian::read_f32(c) as f64).collect(),
        (4, true) => payload.chunks_exact(4).map(|c| BigEndian::read_f32(c) as f64).collect(),
        _ => unreachable!("parse_descr only accepts 4- and 8-byte floats"),
    };

    let array = if fortran_order {
        Array2::from_shape_vec((rows, cols).f(), values)?
    } else {
        Array2::from_shape_vec((rows, cols), values)?
    };
    Ok(array)
}

/// Text following `'key':` up to the next top-level comma
fn raw_value<'a>(dict: &'a str, key: &str) -> DataIoResult<&'a str> {
    let needle = format!("'{}':", key);
    let start = dict
        .find(&needle)
        .ok_or_else(|| DataIoError::InvalidNpy(format!("header has no '{}' entry", key)))?
        + needle.len();
    Ok(&dict[start..])
}

fn quoted_value(dict: &str, key: &str) -> DataIoResult<String> {
    let rest = raw_value(dict, key)?.trim_start();
    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| DataIoError::InvalidNpy(format!("'{}' is not a string", key)))?;
    let body = &rest[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| DataIoError::InvalidNpy(format!("unterminated '{}' value", key)))?;
    Ok(body[..end].to_string())
}

fn parse_descr(descr: &str) -> DataIoResult<Descr> {
    let (big_endian, rest) = match descr.chars().next() {
        Some('<') | Some('=') | Some('|') => (false, &descr[1..]),
        Some('>') => (true, &descr[1..]),
        _ => (false, descr),
    };
    let width = match rest {
        "f8" => 8,
        "f4" => 4,
        other => {
            return Err(DataIoError::InvalidNpy(format!(
                "unsupported dtype '{}' (only f4/f8)",
                other
            )))
        }
    };
    Ok(Descr { big_endian, width })
}

fn parse_shape(dict: &str) -> DataIoResult<Vec<usize>> {
    let rest = raw_value(dict, "shape")?;
    let open = rest
        .find('(')
        .ok_or_else(|| DataIoError::InvalidNpy("shape is not a tuple".to_string()))?;
    let close = rest[open..]
        .find(')')
        .ok_or_else(|| DataIoError::InvalidNpy("unterminated shape tuple".to_string()))?
        + open;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| DataIoError::InvalidNpy(format!("bad shape entry '{}'", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header_is_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.npy");
        write_npy(&path, &Array2::<f64>::zeros((45, 45))).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header_len = LittleEndian::read_u16(&bytes[8..10]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 45 * 45 * 8);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ts.npy");
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        write_npy(&path, &m).unwrap();
        assert_eq!(read_npy(&path).unwrap(), m);
    }

    fn npy_bytes(dict: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        bytes.extend_from_slice(dict.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_fortran_order_float32() {
        let dict = "{'descr': '<f4', 'fortran_order': True, 'shape': (2, 2), }\n";
        let mut payload = Vec::new();
        for v in [1.0f32, 3.0, 2.0, 4.0] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let m = parse_npy(&npy_bytes(dict, &payload)).unwrap();
        assert_eq!(m, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_big_endian_float64() {
        let dict = "{'descr': '>f8', 'fortran_order': False, 'shape': (1, 2), }\n";
        let mut payload = Vec::new();
        for v in [0.5f64, -2.0] {
            payload.extend_from_slice(&v.to_be_bytes());
        }
        let m = parse_npy(&npy_bytes(dict, &payload)).unwrap();
        assert_eq!(m, array![[0.5, -2.0]]);
    }

    #[test]
    fn test_rejects_non_matrix_and_integer_arrays() {
        let one_d = "{'descr': '<f8', 'fortran_order': False, 'shape': (3,), }\n";
        assert!(matches!(
            parse_npy(&npy_bytes(one_d, &[0u8; 24])),
            Err(DataIoError::ShapeMismatch(_))
        ));

        let ints = "{'descr': '<i8', 'fortran_order': False, 'shape': (1, 1), }\n";
        assert!(matches!(
            parse_npy(&npy_bytes(ints, &[0u8; 8])),
            Err(DataIoError::InvalidNpy(_))
        ));
    }

    #[test]
    fn test_oversized_shape_is_rejected() {
        let huge = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, 3), }}\n",
            usize::MAX / 2
        );
        assert!(matches!(
            parse_npy(&npy_bytes(&huge, &[0u8; 8])),
            Err(DataIoError::InvalidNpy(_))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let dict = "{'descr': '<f8', 'fortran_order': False, 'shape': (2, 2), }\n";
        assert!(matches!(
            parse_npy(&npy_bytes(dict, &[0u8; 16])),
            Err(DataIoError::Truncated { .. })
        ));
    }
}
