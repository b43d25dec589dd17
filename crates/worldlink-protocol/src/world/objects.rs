//! Bodies describing world objects: movement, appearance, effects, stats.

use glam::{Quat, Vec3};

use crate::codec::{read_list, read_strings, write_list, write_strings, WireBody};
use crate::{Color, PropertyMap, ProtocolError, WireReader, WireWriter};

/// A body that only names another object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectRef {
    pub object_id: i64,
}

impl WireBody for ObjectRef {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            object_id: r.read_i64()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.object_id);
    }
}

/// A `name = value` pair used by stat and state updates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamedValue {
    pub name: String,
    pub value: i32,
}

fn read_named_values(r: &mut WireReader<'_>) -> Result<Vec<NamedValue>, ProtocolError> {
    read_list(r, |r| {
        Ok(NamedValue {
            name: r.read_string()?,
            value: r.read_i32()?,
        })
    })
}

fn write_named_values(w: &mut WireWriter, values: &[NamedValue]) {
    write_list(w, values, |w, v| {
        w.write_string(&v.name);
        w.write_i32(v.value);
    });
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Heading and position of the subject at `timestamp`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Direction {
    pub timestamp: i64,
    pub direction: Vec3,
    pub location: Vec3,
}

impl WireBody for Direction {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            timestamp: r.read_i64()?,
            direction: r.read_vec3()?,
            location: r.read_vec3()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.timestamp);
        w.write_vec3(self.direction);
        w.write_vec3(self.location);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Orientation {
    pub orientation: Quat,
}

impl WireBody for Orientation {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            orientation: r.read_quat()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_quat(self.orientation);
    }
}

/// Direction, location and orientation in one update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirLocOrient {
    pub timestamp: i64,
    pub direction: Vec3,
    pub location: Vec3,
    pub orientation: Quat,
}

impl WireBody for DirLocOrient {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            timestamp: r.read_i64()?,
            direction: r.read_vec3()?,
            location: r.read_vec3()?,
            orientation: r.read_quat()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.timestamp);
        w.write_vec3(self.direction);
        w.write_vec3(self.location);
        w.write_quat(self.orientation);
    }
}

/// A server-driven path for a mob, starting at `start_time`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MobPath {
    pub start_time: i64,
    pub interpolation: String,
    pub speed: f32,
    pub terrain_string: String,
    pub path: Vec<Vec3>,
}

impl WireBody for MobPath {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            start_time: r.read_i64()?,
            interpolation: r.read_string()?,
            speed: r.read_f32()?,
            terrain_string: r.read_string()?,
            path: read_list(r, |r| r.read_vec3())?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.start_time);
        w.write_string(&self.interpolation);
        w.write_f32(self.speed);
        w.write_string(&self.terrain_string);
        write_list(w, &self.path, |w, p| w.write_vec3(*p));
    }
}

// ---------------------------------------------------------------------------
// Object lifecycle
// ---------------------------------------------------------------------------

/// An object entered the subject's view.
///
/// `follow_terrain` arrived in a later protocol revision. Servers that
/// predate it always snapped objects to the terrain, so the default is
/// `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObject {
    pub object_id: i64,
    pub name: String,
    pub location: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
    pub object_type: i32,
    pub follow_terrain: bool,
}

impl Default for NewObject {
    fn default() -> Self {
        Self {
            object_id: 0,
            name: String::new(),
            location: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            object_type: 0,
            follow_terrain: true,
        }
    }
}

impl WireBody for NewObject {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let object_id = r.read_i64()?;
        let name = r.read_string()?;
        let location = r.read_vec3()?;
        let orientation = r.read_quat()?;
        let scale = r.read_vec3()?;
        let object_type = r.read_i32()?;
        let follow_terrain = r.optional(true, |r| r.read_bool())?;
        Ok(Self {
            object_id,
            name,
            location,
            orientation,
            scale,
            object_type,
            follow_terrain,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.object_id);
        w.write_string(&self.name);
        w.write_vec3(self.location);
        w.write_quat(self.orientation);
        w.write_vec3(self.scale);
        w.write_i32(self.object_type);
        w.write_bool(self.follow_terrain);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreeObject {
    pub object_type: i32,
    pub object_id: i64,
}

impl WireBody for FreeObject {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            object_type: r.read_i32()?,
            object_id: r.read_i64()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i32(self.object_type);
        w.write_i64(self.object_id);
    }
}

/// Property changes for the subject object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectProperty {
    pub timestamp: i64,
    pub properties: PropertyMap,
}

impl WireBody for ObjectProperty {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            timestamp: r.read_i64()?,
            properties: PropertyMap::decode(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.timestamp);
        self.properties.encode(w);
    }
}

// ---------------------------------------------------------------------------
// Appearance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmeshInfo {
    pub name: String,
    pub material: String,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshInfo {
    pub mesh_file: String,
    pub submeshes: Vec<SubmeshInfo>,
}

/// The meshes and materials that make up the subject's model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelInfo {
    pub force_instantiation: bool,
    pub meshes: Vec<MeshInfo>,
}

impl WireBody for ModelInfo {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let force_instantiation = r.read_bool()?;
        let meshes = read_list(r, |r| {
            Ok(MeshInfo {
                mesh_file: r.read_string()?,
                submeshes: read_list(r, |r| {
                    Ok(SubmeshInfo {
                        name: r.read_string()?,
                        material: r.read_string()?,
                        cast_shadows: r.read_bool()?,
                        receive_shadows: r.read_bool()?,
                    })
                })?,
            })
        })?;
        Ok(Self {
            force_instantiation,
            meshes,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_bool(self.force_instantiation);
        write_list(w, &self.meshes, |w, mesh| {
            w.write_string(&mesh.mesh_file);
            write_list(w, &mesh.submeshes, |w, sub| {
                w.write_string(&sub.name);
                w.write_string(&sub.material);
                w.write_bool(sub.cast_shadows);
                w.write_bool(sub.receive_shadows);
            });
        });
    }
}

/// Attach another object's mesh to a slot on the subject.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachObject {
    pub attached_id: i64,
    pub slot: String,
    pub mesh_file: String,
}

impl WireBody for AttachObject {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            attached_id: r.read_i64()?,
            slot: r.read_string()?,
            mesh_file: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.attached_id);
        w.write_string(&self.slot);
        w.write_string(&self.mesh_file);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetachObject {
    pub attached_id: i64,
    pub slot: String,
}

impl WireBody for DetachObject {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            attached_id: r.read_i64()?,
            slot: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.attached_id);
        w.write_string(&self.slot);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnimationEntry {
    pub name: String,
    pub looping: bool,
}

/// Animations to queue on the subject; `clear` drops the current queue first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Animation {
    pub clear: bool,
    pub animations: Vec<AnimationEntry>,
}

impl WireBody for Animation {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            clear: r.read_bool()?,
            animations: read_list(r, |r| {
                Ok(AnimationEntry {
                    name: r.read_string()?,
                    looping: r.read_bool()?,
                })
            })?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_bool(self.clear);
        write_list(w, &self.animations, |w, a| {
            w.write_string(&a.name);
            w.write_bool(a.looping);
        });
    }
}

// ---------------------------------------------------------------------------
// Sound and effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sound {
    pub clear: bool,
    pub looping: bool,
    pub sounds: Vec<String>,
}

impl WireBody for Sound {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            clear: r.read_bool()?,
            looping: r.read_bool()?,
            sounds: read_strings(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_bool(self.clear);
        w.write_bool(self.looping);
        write_strings(w, &self.sounds);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoundEntry {
    pub sound_id: i64,
    pub name: String,
    pub properties: PropertyMap,
}

/// Positional sounds to start and sound ids to stop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoundControl {
    pub new_sounds: Vec<SoundEntry>,
    pub free_sound_ids: Vec<i64>,
}

impl WireBody for SoundControl {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            new_sounds: read_list(r, |r| {
                Ok(SoundEntry {
                    sound_id: r.read_i64()?,
                    name: r.read_string()?,
                    properties: PropertyMap::decode(r)?,
                })
            })?,
            free_sound_ids: read_list(r, |r| r.read_i64())?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_list(w, &self.new_sounds, |w, s| {
            w.write_i64(s.sound_id);
            w.write_string(&s.name);
            s.properties.encode(w);
        });
        write_list(w, &self.free_sound_ids, |w, id| w.write_i64(*id));
    }
}

const PARTICLE_HAS_COLOR: u8 = 0x01;

/// Start a particle system on a slot of the subject.
///
/// The color override is only on the wire when the flag byte says so.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddParticleEffect {
    pub effect_name: String,
    pub slot: String,
    pub velocity_multiplier: f32,
    pub particle_size_multiplier: f32,
    pub color: Option<Color>,
}

impl WireBody for AddParticleEffect {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let effect_name = r.read_string()?;
        let slot = r.read_string()?;
        let velocity_multiplier = r.read_f32()?;
        let particle_size_multiplier = r.read_f32()?;
        let flags = r.read_u8()?;
        let color = if flags & PARTICLE_HAS_COLOR != 0 {
            Some(r.read_color()?)
        } else {
            None
        };
        Ok(Self {
            effect_name,
            slot,
            velocity_multiplier,
            particle_size_multiplier,
            color,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.effect_name);
        w.write_string(&self.slot);
        w.write_f32(self.velocity_multiplier);
        w.write_f32(self.particle_size_multiplier);
        match self.color {
            Some(color) => {
                w.write_u8(PARTICLE_HAS_COLOR);
                w.write_color(color);
            }
            None => w.write_u8(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoveParticleEffect {
    pub slot: String,
}

impl WireBody for RemoveParticleEffect {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.slot);
    }
}

/// Run a scripted client effect with arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvokeEffect {
    pub effect_name: String,
    pub instance_id: i64,
    pub args: PropertyMap,
}

impl WireBody for InvokeEffect {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            effect_name: r.read_string()?,
            instance_id: r.read_i64()?,
            args: PropertyMap::decode(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.effect_name);
        w.write_i64(self.instance_id);
        self.args.encode(w);
    }
}

// ---------------------------------------------------------------------------
// Combat and stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatUpdate {
    pub stats: Vec<NamedValue>,
}

impl WireBody for StatUpdate {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            stats: read_named_values(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_named_values(w, &self.stats);
    }
}

/// Boolean-ish state flags (combat, dead, sitting...) as integers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateMessage {
    pub states: Vec<NamedValue>,
}

impl WireBody for StateMessage {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            states: read_named_values(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_named_values(w, &self.states);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoAttack {
    pub target_id: i64,
    pub active: bool,
}

impl WireBody for AutoAttack {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            target_id: r.read_i64()?,
            active: r.read_bool()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.target_id);
        w.write_bool(self.active);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Damage {
    pub target_id: i64,
    pub damage_type: String,
    pub amount: i32,
}

impl WireBody for Damage {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            target_id: r.read_i64()?,
            damage_type: r.read_string()?,
            amount: r.read_i32()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.target_id);
        w.write_string(&self.damage_type);
        w.write_i32(self.amount);
    }
}
