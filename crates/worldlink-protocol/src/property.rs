//! Self-describing property maps.
//!
//! Extensible payloads (object properties, ability info, trade offers,
//! character records) are carried as string-keyed maps of tagged values.
//! Every value is written as a one-byte tag followed by its encoding, and
//! containers nest other values, so a map can describe itself without a
//! schema on either side.
//!
//! ```text
//! map    [count: i32] ([key: string][tag: u8][value])*
//! list   [count: i32] ([tag: u8][value])*
//! set    same layout as list
//! ```

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use crate::{Color, ProtocolError, WireReader, WireWriter};

/// Maximum container nesting accepted on decode.
///
/// Input comes from the network, so recursion has to be bounded; no real
/// payload comes close to this.
pub const MAX_PROPERTY_DEPTH: usize = 128;

mod tag {
    pub const NULL: u8 = 0;
    pub const BOOL: u8 = 1;
    pub const BYTE: u8 = 2;
    pub const SHORT: u8 = 3;
    pub const INT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const FLOAT: u8 = 6;
    pub const DOUBLE: u8 = 7;
    pub const STRING: u8 = 8;
    pub const VECTOR: u8 = 9;
    pub const QUATERNION: u8 = 10;
    pub const COLOR: u8 = 11;
    pub const LIST: u8 = 12;
    pub const SET: u8 = 13;
    pub const MAP: u8 = 14;
    pub const BYTES: u8 = 15;
}

// ---------------------------------------------------------------------------
// PropertyValue
// ---------------------------------------------------------------------------

/// One value in a property map.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Vector(Vec3),
    Quaternion(Quat),
    Color(Color),
    Bytes(Vec<u8>),
    List(Vec<PropertyValue>),
    Set(PropertySet),
    Map(PropertyMap),
}

impl PropertyValue {
    fn tag(&self) -> u8 {
        match self {
            Self::Null => tag::NULL,
            Self::Bool(_) => tag::BOOL,
            Self::Byte(_) => tag::BYTE,
            Self::Short(_) => tag::SHORT,
            Self::Int(_) => tag::INT,
            Self::Long(_) => tag::LONG,
            Self::Float(_) => tag::FLOAT,
            Self::Double(_) => tag::DOUBLE,
            Self::String(_) => tag::STRING,
            Self::Vector(_) => tag::VECTOR,
            Self::Quaternion(_) => tag::QUATERNION,
            Self::Color(_) => tag::COLOR,
            Self::Bytes(_) => tag::BYTES,
            Self::List(_) => tag::LIST,
            Self::Set(_) => tag::SET,
            Self::Map(_) => tag::MAP,
        }
    }

    /// Writes the tag byte and the value.
    pub fn encode(&self, w: &mut WireWriter) {
        w.write_u8(self.tag());
        match self {
            Self::Null => {}
            Self::Bool(v) => w.write_bool(*v),
            Self::Byte(v) => w.write_u8(*v),
            Self::Short(v) => w.write_i16(*v),
            Self::Int(v) => w.write_i32(*v),
            Self::Long(v) => w.write_i64(*v),
            Self::Float(v) => w.write_f32(*v),
            Self::Double(v) => w.write_f64(*v),
            Self::String(v) => w.write_string(v),
            Self::Vector(v) => w.write_vec3(*v),
            Self::Quaternion(v) => w.write_quat(*v),
            Self::Color(v) => w.write_color(*v),
            Self::Bytes(v) => w.write_bytes(v),
            Self::List(items) => encode_values(items, w),
            Self::Set(set) => encode_values(&set.items, w),
            Self::Map(map) => map.encode(w),
        }
    }

    /// Reads one tagged value.
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Self::decode_at(r, 0)
    }

    fn decode_at(r: &mut WireReader<'_>, depth: usize) -> Result<Self, ProtocolError> {
        let value = match r.read_u8()? {
            tag::NULL => Self::Null,
            tag::BOOL => Self::Bool(r.read_bool()?),
            tag::BYTE => Self::Byte(r.read_u8()?),
            tag::SHORT => Self::Short(r.read_i16()?),
            tag::INT => Self::Int(r.read_i32()?),
            tag::LONG => Self::Long(r.read_i64()?),
            tag::FLOAT => Self::Float(r.read_f32()?),
            tag::DOUBLE => Self::Double(r.read_f64()?),
            tag::STRING => Self::String(r.read_string()?),
            tag::VECTOR => Self::Vector(r.read_vec3()?),
            tag::QUATERNION => Self::Quaternion(r.read_quat()?),
            tag::COLOR => Self::Color(r.read_color()?),
            tag::BYTES => Self::Bytes(r.read_bytes()?),
            tag::LIST => Self::List(decode_values(r, depth + 1)?),
            tag::SET => {
                let mut set = PropertySet::new();
                for item in decode_values(r, depth + 1)? {
                    set.insert(item);
                }
                Self::Set(set)
            }
            tag::MAP => Self::Map(PropertyMap::decode_at(r, depth + 1)?),
            other => return Err(ProtocolError::UnknownPropertyTag(other)),
        };
        Ok(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view over the whole integer family.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Short(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view over the float family.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

fn encode_values(items: &[PropertyValue], w: &mut WireWriter) {
    w.write_count(items.len());
    for item in items {
        item.encode(w);
    }
}

fn check_depth(depth: usize) -> Result<(), ProtocolError> {
    if depth > MAX_PROPERTY_DEPTH {
        return Err(ProtocolError::NestingTooDeep(MAX_PROPERTY_DEPTH));
    }
    Ok(())
}

fn decode_values(
    r: &mut WireReader<'_>,
    depth: usize,
) -> Result<Vec<PropertyValue>, ProtocolError> {
    check_depth(depth)?;
    let count = r.read_count()?;
    // Each value is at least its tag byte; never trust the count for
    // preallocation beyond what the buffer could hold.
    let mut items = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        items.push(PropertyValue::decode_at(r, depth)?);
    }
    Ok(items)
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec3> for PropertyValue {
    fn from(v: Vec3) -> Self {
        Self::Vector(v)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(v: PropertyMap) -> Self {
        Self::Map(v)
    }
}

// ---------------------------------------------------------------------------
// PropertySet
// ---------------------------------------------------------------------------

/// An insertion-ordered collection of distinct values.
///
/// Values include floats, so this cannot be a `HashSet`; membership is
/// checked with `PartialEq` instead. Sets on the wire are small.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet {
    items: Vec<PropertyValue>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value. Returns `false` if an equal value was already present.
    pub fn insert(&mut self, value: PropertyValue) -> bool {
        if self.items.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &PropertyValue) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.items.iter()
    }
}

impl FromIterator<PropertyValue> for PropertySet {
    fn from_iter<I: IntoIterator<Item = PropertyValue>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// PropertyMap
// ---------------------------------------------------------------------------

/// A key-ordered map of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: BTreeMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropertyValue::as_i64)
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get_i64(key).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(PropertyValue::as_f64).map(|v| v as f32)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    pub fn get_map(&self, key: &str) -> Option<&PropertyMap> {
        self.get(key).and_then(PropertyValue::as_map)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.entries.iter()
    }

    /// Writes the map without a leading tag byte.
    pub fn encode(&self, w: &mut WireWriter) {
        w.write_count(self.entries.len());
        for (key, value) in &self.entries {
            w.write_string(key);
            value.encode(w);
        }
    }

    /// Reads an untagged map.
    pub fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Self::decode_at(r, 0)
    }

    fn decode_at(r: &mut WireReader<'_>, depth: usize) -> Result<Self, ProtocolError> {
        check_depth(depth)?;
        let count = r.read_count()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let key = r.read_string()?;
            let value = PropertyValue::decode_at(r, depth)?;
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
