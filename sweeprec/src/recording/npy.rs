//! NumPy `.npy` array encoding.
//!
//! Only the handful of dtypes a recording needs are supported:
//!
//! | dtype   | use                           |
//! |---------|-------------------------------|
//! | `<c8`   | IQ samples (complex64)        |
//! | `<f8`   | scalar numbers                |
//! | `<U{n}` | JSON dumps and text metadata  |
//!
//! Layout (format version 1.0):
//!
//! ```text
//! ┌──────────┬─────────┬──────────────┬────────────────────────┬──────────┐
//! │ \x93NUMPY│ 01 00   │ hlen (u16 LE)│ dict, space padded, \n │ raw data │
//! └──────────┴─────────┴──────────────┴────────────────────────┴──────────┘
//! ```
//!
//! The preamble plus header is padded to a multiple of 64 bytes.

use num_complex::Complex32;

use crate::error::RecordError;

pub const NPY_MAGIC: [u8; 6] = *b"\x93NUMPY";

pub const DESCR_COMPLEX64: &str = "<c8";
pub const DESCR_FLOAT64: &str = "<f8";

/// Magic, version and header length of a version 1.0 file
const PREAMBLE_LEN: usize = 10;
const HEADER_ALIGN: usize = 64;

/// Array description at the start of every `.npy` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub descr: String,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl NpyHeader {
    /// C-ordered array header
    pub fn new(descr: impl Into<String>, shape: &[usize]) -> Self {
        Self {
            descr: descr.into(),
            fortran_order: false,
            shape: shape.to_vec(),
        }
    }

    /// Number of elements, one for a scalar
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Encode magic, version, length and the padded header dict
    pub fn to_bytes(&self) -> Vec<u8> {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({},)", n),
            dims => format!(
                "({})",
                dims.iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let mut dict = format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}",
            self.descr,
            if self.fortran_order { "True" } else { "False" },
            shape
        );
        let unpadded = PREAMBLE_LEN + dict.len() + 1;
        let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
        dict.extend(std::iter::repeat(' ').take(padding));
        dict.push('\n');

        let mut out = Vec::with_capacity(PREAMBLE_LEN + dict.len());
        out.extend_from_slice(&NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
        out.extend_from_slice(dict.as_bytes());
        out
    }

    /// Decode a header, returning it with the offset of the array data
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        if bytes.len() < PREAMBLE_LEN || bytes[0..6] != NPY_MAGIC {
            return Err(RecordError::Malformed("not an npy array".to_string()));
        }

        let (header_len, data_start) = match bytes[6] {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 if bytes.len() >= 12 => (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            ),
            v => {
                return Err(RecordError::Malformed(format!(
                    "unsupported npy version {}",
                    v
                )))
            }
        };
        let end = data_start + header_len;
        let dict = bytes
            .get(data_start..end)
            .and_then(|h| std::str::from_utf8(h).ok())
            .ok_or_else(|| RecordError::Malformed("truncated npy header".to_string()))?;

        let descr = dict_value(dict, "descr")?
            .strip_prefix('\'')
            .and_then(|v| v.split('\'').next())
            .ok_or_else(|| RecordError::Malformed("bad descr".to_string()))?
            .to_string();

        let fortran_order = dict_value(dict, "fortran_order")?.starts_with("True");

        let shape_text = dict_value(dict, "shape")?;
        let shape_text = shape_text
            .strip_prefix('(')
            .and_then(|s| s.split(')').next())
            .ok_or_else(|| RecordError::Malformed("bad shape".to_string()))?;
        let shape = shape_text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| RecordError::Malformed(format!("bad dimension '{}'", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((
            Self {
                descr,
                fortran_order,
                shape,
            },
            end,
        ))
    }
}

/// Text following `'key':` in a header dict
fn dict_value<'a>(dict: &'a str, key: &str) -> Result<&'a str, RecordError> {
    let pattern = format!("'{}':", key);
    dict.find(&pattern)
        .map(|at| dict[at + pattern.len()..].trim_start())
        .ok_or_else(|| RecordError::Malformed(format!("npy header has no '{}'", key)))
}

/// Complex64 array of the given shape, values in C order
pub fn complex64_array<'a>(
    shape: &[usize],
    values: impl IntoIterator<Item = &'a Complex32>,
) -> Vec<u8> {
    let header = NpyHeader::new(DESCR_COMPLEX64, shape);
    let mut out = header.to_bytes();
    out.reserve(header.element_count() * 8);
    for value in values {
        out.extend_from_slice(&value.re.to_le_bytes());
        out.extend_from_slice(&value.im.to_le_bytes());
    }
    out
}

/// Zero-dimensional float64 array
pub fn float64_scalar(value: f64) -> Vec<u8> {
    let mut out = NpyHeader::new(DESCR_FLOAT64, &[]).to_bytes();
    out.extend_from_slice(&value.to_le_bytes());
    out
}

/// Zero-dimensional unicode array, UTF-32 encoded as numpy stores `str`
pub fn unicode_scalar(value: &str) -> Vec<u8> {
    let chars: Vec<char> = value.chars().collect();
    let width = chars.len().max(1);
    let mut out = NpyHeader::new(format!("<U{}", width), &[]).to_bytes();
    for c in &chars {
        out.extend_from_slice(&(*c as u32).to_le_bytes());
    }
    if chars.is_empty() {
        out.extend_from_slice(&0u32.to_le_bytes());
    }
    out
}

/// Read back an array written by [`complex64_array`]
pub fn read_complex64(bytes: &[u8]) -> Result<(Vec<usize>, Vec<Complex32>), RecordError> {
    let (header, start) = NpyHeader::parse(bytes)?;
    expect_descr(&header, DESCR_COMPLEX64)?;
    let data = payload(bytes, start, header.element_count() * 8)?;
    let values = data
        .chunks_exact(8)
        .map(|c| {
            Complex32::new(
                f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            )
        })
        .collect();
    Ok((header.shape, values))
}

/// Read back a value written by [`float64_scalar`]
pub fn read_float64_scalar(bytes: &[u8]) -> Result<f64, RecordError> {
    let (header, start) = NpyHeader::parse(bytes)?;
    expect_descr(&header, DESCR_FLOAT64)?;
    let data = payload(bytes, start, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(data);
    Ok(f64::from_le_bytes(buf))
}

/// Read back a string written by [`unicode_scalar`]
pub fn read_unicode_scalar(bytes: &[u8]) -> Result<String, RecordError> {
    let (header, start) = NpyHeader::parse(bytes)?;
    let width = header
        .descr
        .strip_prefix("<U")
        .and_then(|w| w.parse::<usize>().ok())
        .ok_or_else(|| RecordError::Malformed(format!("expected unicode, got {}", header.descr)))?;
    let data = payload(bytes, start, width * 4)?;
    data.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .take_while(|&code| code != 0)
        .map(|code| {
            char::from_u32(code)
                .ok_or_else(|| RecordError::Malformed(format!("bad code point {:#x}", code)))
        })
        .collect()
}

fn expect_descr(header: &NpyHeader, descr: &str) -> Result<(), RecordError> {
    if header.descr == descr && !header.fortran_order {
        Ok(())
    } else {
        Err(RecordError::Malformed(format!(
            "expected {} in C order, got {}",
            descr, header.descr
        )))
    }
}

fn payload(bytes: &[u8], start: usize, len: usize) -> Result<&[u8], RecordError> {
    bytes
        .get(start..start + len)
        .ok_or_else(|| RecordError::Malformed("truncated npy data".to_string()))
}
