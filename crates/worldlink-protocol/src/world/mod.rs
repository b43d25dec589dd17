//! World (live session) code-space.
//!
//! Every world message starts with `[subject_id: i64][type code: i32]`.
//! The subject is the object the message is about (the player, a mob, a
//! light). The type code table below is the wire contract; codes 6, 20,
//! 26 and 27 are retired and decode as unknown.

mod environment;
mod gameplay;
mod objects;
mod session;

pub use environment::{
    AmbientLight, Fog, LightKind, NewDecal, NewLight, RegionConfig, SkyboxMaterial, TerrainConfig,
};
pub use gameplay::{
    AbilityEntry, AbilityInfo, AbilityUpdate, AcquireResponse, ActivateItem, EquipRequest,
    EquipResponse, GroupInfo, GroupMember, InventoryEntry, InventoryUpdate, QuestInfoRequest,
    QuestInfoResponse, QuestResponse, TradeComplete, TradeOfferRequest, TradeOfferUpdate,
    TradePartner,
};
pub use objects::{
    AddParticleEffect, Animation, AnimationEntry, AttachObject, AutoAttack, Damage, DetachObject,
    DirLocOrient, Direction, FreeObject, InvokeEffect, MeshInfo, MobPath, ModelInfo, NamedValue,
    NewObject, ObjectProperty, ObjectRef, Orientation, RemoveParticleEffect, Sound, SoundControl,
    SoundEntry, StatUpdate, StateMessage, SubmeshInfo,
};
pub use session::{
    ClientParameter, Comm, Command, Empty, Extension, LoadingState, Login, LoginResponse, Portal,
    ServerTime, UiTheme, EXTENSION_SUBTYPE_KEY,
};

use crate::codec::{note_trailing, CodeSpace, WireBody, WireMessage};
use crate::fragment::{Aggregated, Fragment};
use crate::{ProtocolError, WireReader, WireWriter};

/// Generates the type-code enum, the body enum and the registry match from
/// one table so the three cannot drift apart.
macro_rules! world_messages {
    ($($variant:ident($body:ty) = $code:literal,)+) => {
        /// Type codes of the world code-space. Fixed wire contract.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum WorldMessageType {
            $($variant = $code,)+
        }

        impl WorldMessageType {
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn code(self) -> i32 {
                self as i32
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }
        }

        /// The body of a world message, one variant per type code.
        #[derive(Debug, Clone, PartialEq)]
        pub enum WorldBody {
            $($variant($body),)+
        }

        impl WorldBody {
            pub fn kind(&self) -> WorldMessageType {
                match self {
                    $(Self::$variant(_) => WorldMessageType::$variant,)+
                }
            }

            fn encode_body(&self, w: &mut WireWriter) {
                match self {
                    $(Self::$variant(body) => body.encode(w),)+
                }
            }

            fn decode_body(
                kind: WorldMessageType,
                r: &mut WireReader<'_>,
            ) -> Result<Self, ProtocolError> {
                Ok(match kind {
                    $(WorldMessageType::$variant => Self::$variant(<$body as WireBody>::decode(r)?),)+
                })
            }
        }
    };
}

world_messages! {
    Login(Login) = 1,
    Direction(Direction) = 2,
    Comm(Comm) = 3,
    LoginResponse(LoginResponse) = 4,
    Logout(Empty) = 5,
    SkyboxMaterial(SkyboxMaterial) = 7,
    NewObject(NewObject) = 8,
    Orientation(Orientation) = 9,
    FreeObject(FreeObject) = 10,
    AcquireObject(ObjectRef) = 11,
    AcquireResponse(AcquireResponse) = 12,
    Command(Command) = 13,
    EquipObject(EquipRequest) = 14,
    EquipResponse(EquipResponse) = 15,
    UnequipObject(EquipRequest) = 16,
    UnequipResponse(EquipResponse) = 17,
    Attach(AttachObject) = 18,
    Detach(DetachObject) = 19,
    AutoAttack(AutoAttack) = 21,
    StatUpdate(StatUpdate) = 22,
    Damage(Damage) = 23,
    Animation(Animation) = 24,
    Sound(Sound) = 25,
    Portal(Portal) = 28,
    AmbientLight(AmbientLight) = 29,
    NewLight(NewLight) = 30,
    TradeStartRequest(TradePartner) = 31,
    TradeStart(TradePartner) = 32,
    TradeOfferRequest(TradeOfferRequest) = 33,
    TradeComplete(TradeComplete) = 34,
    TradeOfferUpdate(TradeOfferUpdate) = 35,
    StateMessage(StateMessage) = 36,
    QuestInfoRequest(QuestInfoRequest) = 37,
    QuestInfoResponse(QuestInfoResponse) = 38,
    QuestResponse(QuestResponse) = 39,
    RegionConfig(RegionConfig) = 40,
    InventoryUpdate(InventoryUpdate) = 41,
    GroupInfo(GroupInfo) = 42,
    UiTheme(UiTheme) = 43,
    LootAll(ObjectRef) = 44,
    Fragment(Fragment) = 45,
    Fog(Fog) = 46,
    AbilityInfo(AbilityInfo) = 47,
    AbilityUpdate(AbilityUpdate) = 48,
    ObjectProperty(ObjectProperty) = 49,
    AddParticleEffect(AddParticleEffect) = 50,
    RemoveParticleEffect(RemoveParticleEffect) = 51,
    ClientParameter(ClientParameter) = 52,
    TerrainConfig(TerrainConfig) = 53,
    MobPath(MobPath) = 54,
    Aggregated(Aggregated) = 55,
    NewDecal(NewDecal) = 56,
    FreeDecal(ObjectRef) = 57,
    ModelInfo(ModelInfo) = 58,
    SoundControl(SoundControl) = 59,
    DirLocOrient(DirLocOrient) = 60,
    AuthorizedLogin(Login) = 61,
    AuthorizedLoginResponse(LoginResponse) = 62,
    LoadingState(LoadingState) = 63,
    Extension(Extension) = 64,
    InvokeEffect(InvokeEffect) = 65,
    ActivateItem(ActivateItem) = 66,
    ServerTime(ServerTime) = 67,
}

impl WorldBody {
    /// The server timestamp this body carries, if it has one.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Self::Direction(b) => Some(b.timestamp),
            Self::LoginResponse(b) | Self::AuthorizedLoginResponse(b) => Some(b.timestamp),
            Self::ObjectProperty(b) => Some(b.timestamp),
            Self::DirLocOrient(b) => Some(b.timestamp),
            Self::ServerTime(b) => Some(b.server_time),
            Self::MobPath(b) => Some(b.start_time),
            _ => None,
        }
    }

    /// Replaces the timestamp. Returns `false` for bodies without one.
    pub fn set_timestamp(&mut self, timestamp: i64) -> bool {
        let slot = match self {
            Self::Direction(b) => &mut b.timestamp,
            Self::LoginResponse(b) | Self::AuthorizedLoginResponse(b) => &mut b.timestamp,
            Self::ObjectProperty(b) => &mut b.timestamp,
            Self::DirLocOrient(b) => &mut b.timestamp,
            Self::ServerTime(b) => &mut b.server_time,
            Self::MobPath(b) => &mut b.start_time,
            _ => return false,
        };
        *slot = timestamp;
        true
    }
}

/// A message on the world channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldMessage {
    pub subject_id: i64,
    pub body: WorldBody,
}

impl WorldMessage {
    pub fn new(subject_id: i64, body: WorldBody) -> Self {
        Self { subject_id, body }
    }

    pub fn kind(&self) -> WorldMessageType {
        self.body.kind()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.body.timestamp()
    }
}

impl WireMessage for WorldMessage {
    const CODE_SPACE: CodeSpace = CodeSpace::World;

    fn type_code(&self) -> i32 {
        self.kind().code()
    }

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.subject_id);
        w.write_i32(self.type_code());
        self.body.encode_body(w);
    }

    fn decode(bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let mut r = WireReader::new(bytes);
        let subject_id = r.read_i64()?;
        let code = r.read_i32()?;
        let Some(kind) = WorldMessageType::from_code(code) else {
            tracing::warn!(code, subject_id, len = bytes.len(), "unknown world message type");
            return Ok(None);
        };
        let body = WorldBody::decode_body(kind, &mut r)?;
        note_trailing(Self::CODE_SPACE, code, &r);
        Ok(Some(Self { subject_id, body }))
    }
}
