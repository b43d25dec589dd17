//! Bodies that configure the scene: sky, lights, fog, terrain, decals.

use glam::Vec3;

use crate::codec::WireBody;
use crate::{Color, ProtocolError, WireReader, WireWriter};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SkyboxMaterial {
    pub material: String,
}

impl WireBody for SkyboxMaterial {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            material: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.material);
    }
}

/// An opaque region configuration document (XML on current servers).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionConfig {
    pub config: String,
}

impl WireBody for RegionConfig {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            config: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.config);
    }
}

/// Terrain generator settings. `kind` names the generator that reads `config`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TerrainConfig {
    pub kind: String,
    pub config: String,
}

impl WireBody for TerrainConfig {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind: r.read_string()?,
            config: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.kind);
        w.write_string(&self.config);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AmbientLight {
    pub color: Color,
}

impl WireBody for AmbientLight {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            color: r.read_color()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_color(self.color);
    }
}

/// The shape of a light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum LightKind {
    #[default]
    Point = 0,
    Directional = 1,
    Spot = 2,
}

impl LightKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Point),
            1 => Some(Self::Directional),
            2 => Some(Self::Spot),
            _ => None,
        }
    }

    fn has_location(self) -> bool {
        matches!(self, Self::Point | Self::Spot)
    }

    fn has_direction(self) -> bool {
        matches!(self, Self::Directional | Self::Spot)
    }
}

/// A light entered the scene.
///
/// Which vectors are on the wire depends on the kind: point lights carry a
/// location, directional lights a direction, spot lights both. A vector
/// the kind does not carry is left at zero and not encoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewLight {
    pub light_id: i64,
    pub name: String,
    pub kind: LightKind,
    pub diffuse: Color,
    pub specular: Color,
    pub attenuation_range: f32,
    pub location: Vec3,
    pub direction: Vec3,
}

impl WireBody for NewLight {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let light_id = r.read_i64()?;
        let name = r.read_string()?;
        let code = r.read_i32()?;
        let kind = LightKind::from_code(code)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("unknown light kind {code}")))?;
        let diffuse = r.read_color()?;
        let specular = r.read_color()?;
        let attenuation_range = r.read_f32()?;
        let location = if kind.has_location() {
            r.read_vec3()?
        } else {
            Vec3::ZERO
        };
        let direction = if kind.has_direction() {
            r.read_vec3()?
        } else {
            Vec3::ZERO
        };
        Ok(Self {
            light_id,
            name,
            kind,
            diffuse,
            specular,
            attenuation_range,
            location,
            direction,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.light_id);
        w.write_string(&self.name);
        w.write_i32(self.kind as i32);
        w.write_color(self.diffuse);
        w.write_color(self.specular);
        w.write_f32(self.attenuation_range);
        if self.kind.has_location() {
            w.write_vec3(self.location);
        }
        if self.kind.has_direction() {
            w.write_vec3(self.direction);
        }
    }
}

/// Linear fog between `near` and `far` world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fog {
    pub color: Color,
    pub near: i32,
    pub far: i32,
}

impl WireBody for Fog {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            color: r.read_color()?,
            near: r.read_i32()?,
            far: r.read_i32()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_color(self.color);
        w.write_i32(self.near);
        w.write_i32(self.far);
    }
}

/// A terrain decal. Position is in whole world units on the ground plane.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewDecal {
    pub decal_id: i64,
    pub image: String,
    pub position_x: i32,
    pub position_z: i32,
    pub size_x: f32,
    pub size_z: f32,
    pub rotation: f32,
    pub priority: i32,
}

impl WireBody for NewDecal {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            decal_id: r.read_i64()?,
            image: r.read_string()?,
            position_x: r.read_i32()?,
            position_z: r.read_i32()?,
            size_x: r.read_f32()?,
            size_z: r.read_f32()?,
            rotation: r.read_f32()?,
            priority: r.read_i32()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.decal_id);
        w.write_string(&self.image);
        w.write_i32(self.position_x);
        w.write_i32(self.position_z);
        w.write_f32(self.size_x);
        w.write_f32(self.size_z);
        w.write_f32(self.rotation);
        w.write_i32(self.priority);
    }
}
