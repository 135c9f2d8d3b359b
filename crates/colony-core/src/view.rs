//! Builder view sync: the binary payload a client decodes to show a
//! construction site's resources and progress.
//!
//! Field order is fixed and must match the client:
//!
//! 1. resource count (`i32`)
//! 2. per resource: item id (string), item count (`i32`), available (`i32`),
//!    needed (`i32`)
//! 3. construction name (string)
//! 4. construction position (string)
//! 5. progress fraction (`f64`)
//! 6. total stages (`i32`)
//! 7. finished stages (`i32`)
//! 8. worker name (string)
//!
//! Numbers are big-endian. Strings are UTF-8 prefixed with a VarInt byte
//! length and capped at [`MAX_STRING_LEN`] bytes.

use crate::id::ResourceId;
use crate::item::ItemStack;
use crate::registry::ItemRegistry;

/// Longest string the client accepts.
pub const MAX_STRING_LEN: usize = 32767;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewDecodeError {
    #[error("unexpected end of data reading {0}")]
    TooShort(&'static str),
    #[error("varint longer than five bytes")]
    VarIntTooLong,
    #[error("string length {0} exceeds {MAX_STRING_LEN}")]
    StringTooLong(i64),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("negative resource count {0}")]
    NegativeCount(i32),
    #[error("invalid item id {0:?}")]
    InvalidItem(String),
    #[error("{0} trailing bytes after view")]
    TrailingBytes(usize),
}

// ---------------------------------------------------------------------------
// View data
// ---------------------------------------------------------------------------

/// One line of the builder's resource list.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewResource {
    pub item: ResourceId,
    pub count: i32,
    pub available: i32,
    pub needed: i32,
}

impl ViewResource {
    /// Describe `stack` by its registry id. `None` for unregistered kinds.
    pub fn from_stack(
        stack: &ItemStack,
        registry: &ItemRegistry,
        available: u32,
        needed: u32,
    ) -> Option<Self> {
        let item = registry.item_id(stack.kind)?.clone();
        Some(Self {
            item,
            count: saturate(stack.count),
            available: saturate(available),
            needed: saturate(needed),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuilderView {
    pub resources: Vec<ViewResource>,
    pub construction_name: String,
    pub position: String,
    /// Fraction of the current stage done, 0.0 to 1.0.
    pub progress: f64,
    pub total_stages: i32,
    pub finished_stages: i32,
    pub worker_name: String,
}

fn saturate(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Collection length as a wire count, clamped rather than wrapped.
fn length_prefix(len: usize) -> i32 {
    saturate(u32::try_from(len).unwrap_or(u32::MAX))
}

impl BuilderView {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_i32(&mut out, length_prefix(self.resources.len()));
        for resource in &self.resources {
            put_string(&mut out, &resource.item.to_string());
            put_i32(&mut out, resource.count);
            put_i32(&mut out, resource.available);
            put_i32(&mut out, resource.needed);
        }
        put_string(&mut out, &self.construction_name);
        put_string(&mut out, &self.position);
        out.extend_from_slice(&self.progress.to_be_bytes());
        put_i32(&mut out, self.total_stages);
        put_i32(&mut out, self.finished_stages);
        put_string(&mut out, &self.worker_name);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ViewDecodeError> {
        let mut reader = Reader { bytes, pos: 0 };
        let count = reader.i32("resource count")?;
        if count < 0 {
            return Err(ViewDecodeError::NegativeCount(count));
        }
        let mut resources = Vec::with_capacity((count as usize).min(256));
        for _ in 0..count {
            let text = reader.string("item id")?;
            let item = ResourceId::parse(&text).ok_or(ViewDecodeError::InvalidItem(text))?;
            resources.push(ViewResource {
                item,
                count: reader.i32("item count")?,
                available: reader.i32("available")?,
                needed: reader.i32("needed")?,
            });
        }
        let view = Self {
            resources,
            construction_name: reader.string("construction name")?,
            position: reader.string("position")?,
            progress: f64::from_be_bytes(reader.take::<8>("progress")?),
            total_stages: reader.i32("total stages")?,
            finished_stages: reader.i32("finished stages")?,
            worker_name: reader.string("worker name")?,
        };
        match bytes.len() - reader.pos {
            0 => Ok(view),
            extra => Err(ViewDecodeError::TrailingBytes(extra)),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire primitives
// ---------------------------------------------------------------------------

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_varint(out: &mut Vec<u8>, v: i32) {
    let mut v = v as u32;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Writes at most [`MAX_STRING_LEN`] bytes, cut at a char boundary.
fn put_string(out: &mut Vec<u8>, s: &str) {
    let mut end = s.len().min(MAX_STRING_LEN);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    put_varint(out, end as i32);
    out.extend_from_slice(&s.as_bytes()[..end]);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ViewDecodeError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + N)
            .ok_or(ViewDecodeError::TooShort(field))?;
        self.pos += N;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, ViewDecodeError> {
        Ok(i32::from_be_bytes(self.take::<4>(field)?))
    }

    fn varint(&mut self, field: &'static str) -> Result<i32, ViewDecodeError> {
        let mut value: u32 = 0;
        for shift in 0..5 {
            let [byte] = self.take::<1>(field)?;
            value |= u32::from(byte & 0x7F) << (7 * shift);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(ViewDecodeError::VarIntTooLong)
    }

    fn string(&mut self, field: &'static str) -> Result<String, ViewDecodeError> {
        let len = self.varint(field)?;
        if len < 0 || len as usize > MAX_STRING_LEN {
            return Err(ViewDecodeError::StringTooLong(i64::from(len)));
        }
        let len = len as usize;
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or(ViewDecodeError::TooShort(field))?;
        self.pos += len;
        String::from_utf8(slice.to_vec()).map_err(|_| ViewDecodeError::InvalidUtf8)
    }
}
