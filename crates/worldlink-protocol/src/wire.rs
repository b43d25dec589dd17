//! Byte-order-correct primitive encoding.
//!
//! Everything on the wire is big-endian ("network order"). Variable-length
//! values (strings, blobs) carry an `i32` length prefix. Composite
//! geometry values are fixed sequences of `f32`s, except colors, which are
//! quantized to one byte per component and written alpha first:
//!
//! ```text
//! string   [len: i32][utf-8 bytes]
//! blob     [len: i32][bytes]
//! vector   [x: f32][y: f32][z: f32]
//! quat     [x: f32][y: f32][z: f32][w: f32]
//! color    [a: u8][b: u8][g: u8][r: u8]
//! ```

use glam::{Quat, Vec3};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// An RGBA color with float components in `0.0..=1.0`.
///
/// Only 8 bits per component survive the wire, so a decoded color equals
/// the original only when each component is a multiple of `1/255`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color from 8-bit components.
    pub fn from_bytes(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

fn quantize(component: f32) -> u8 {
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// A read cursor over a borrowed byte slice.
///
/// Every read either consumes exactly the bytes it needs or fails with
/// [`ProtocolError::UnexpectedEndOfData`] and leaves the cursor where it
/// was.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current cursor offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unconsumed tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::UnexpectedEndOfData {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.take_array().map(i16::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.take_array().map(i32::from_be_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.take_array().map(i64::from_be_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        self.take_array().map(f32::from_be_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        self.take_array().map(f64::from_be_bytes)
    }

    /// Reads an `i32` length and checks it is non-negative.
    ///
    /// The cursor is rolled back if the length turns out invalid, so a
    /// failed read never leaves the reader half-advanced.
    fn read_len(&mut self) -> Result<usize, ProtocolError> {
        let start = self.pos;
        let len = self.read_i32()?;
        if len < 0 {
            self.pos = start;
            return Err(ProtocolError::InvalidLength(len));
        }
        Ok(len as usize)
    }

    /// Reads an element count for a repeated field.
    pub fn read_count(&mut self) -> Result<usize, ProtocolError> {
        self.read_len()
    }

    /// Reads a length-prefixed blob.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let start = self.pos;
        let len = self.read_len()?;
        match self.take(len) {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| {
            self.pos = start;
            ProtocolError::InvalidUtf8(e)
        })
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, ProtocolError> {
        let raw: [u8; 12] = self.take_array()?;
        Ok(Vec3::new(f32_at(&raw, 0), f32_at(&raw, 4), f32_at(&raw, 8)))
    }

    pub fn read_quat(&mut self) -> Result<Quat, ProtocolError> {
        let raw: [u8; 16] = self.take_array()?;
        Ok(Quat::from_xyzw(
            f32_at(&raw, 0),
            f32_at(&raw, 4),
            f32_at(&raw, 8),
            f32_at(&raw, 12),
        ))
    }

    /// Reads a quantized color stored as `[a, b, g, r]`.
    pub fn read_color(&mut self) -> Result<Color, ProtocolError> {
        let [a, b, g, r] = self.take_array::<4>()?;
        Ok(Color::from_bytes(r, g, b, a))
    }

    /// Reads a field that older peers may not send.
    ///
    /// If `read` fails with [`ProtocolError::UnexpectedEndOfData`] the
    /// cursor is restored and `default` is returned. Any other error is
    /// real corruption and propagates.
    pub fn optional<T>(
        &mut self,
        default: T,
        read: impl FnOnce(&mut Self) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let start = self.pos;
        match read(self) {
            Ok(value) => Ok(value),
            Err(e) if e.is_end_of_data() => {
                self.pos = start;
                Ok(default)
            }
            Err(e) => Err(e),
        }
    }
}

fn f32_at(raw: &[u8], offset: usize) -> f32 {
    f32::from_be_bytes([
        raw[offset],
        raw[offset + 1],
        raw[offset + 2],
        raw[offset + 3],
    ])
}

// ---------------------------------------------------------------------------
// WireWriter
// ---------------------------------------------------------------------------

/// An append-only encode buffer.
#[derive(Debug, Clone, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes an element count for a repeated field.
    ///
    /// Counts beyond `i32::MAX` cannot be represented on the wire; callers
    /// never build collections that large, so the value saturates.
    pub fn write_count(&mut self, count: usize) {
        self.write_i32(i32::try_from(count).unwrap_or(i32::MAX));
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_count(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_quat(&mut self, value: Quat) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
        self.write_f32(value.w);
    }

    /// Writes a color quantized to bytes in `[a, b, g, r]` order.
    pub fn write_color(&mut self, value: Color) {
        self.buf.extend_from_slice(&[
            quantize(value.a),
            quantize(value.b),
            quantize(value.g),
            quantize(value.r),
        ]);
    }
}
