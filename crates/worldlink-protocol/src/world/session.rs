//! Session control bodies: login, logout, portals, chat, client settings.

use crate::codec::{read_list, read_strings, write_list, write_strings, WireBody};
use crate::{PropertyMap, ProtocolError, WireReader, WireWriter};

/// Property key that names an extension message's sub-type.
pub const EXTENSION_SUBTYPE_KEY: &str = "ext_msg_subtype";

/// Client → world: open a session with the token from character selection.
///
/// Also the body of `AuthorizedLogin`, which differs only in its type code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Login {
    pub version: String,
    pub world_token: Vec<u8>,
}

impl WireBody for Login {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: r.read_string()?,
            world_token: r.read_bytes()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.version);
        w.write_bytes(&self.world_token);
    }
}

/// World → client: whether the login was accepted.
///
/// `server_version` is absent from servers that predate it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginResponse {
    pub timestamp: i64,
    pub success: bool,
    pub message: String,
    pub server_version: String,
}

impl WireBody for LoginResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let timestamp = r.read_i64()?;
        let success = r.read_bool()?;
        let message = r.read_string()?;
        let server_version = r.optional(String::new(), |r| r.read_string())?;
        Ok(Self {
            timestamp,
            success,
            message,
            server_version,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.timestamp);
        w.write_bool(self.success);
        w.write_string(&self.message);
        w.write_string(&self.server_version);
    }
}

/// A body with no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Empty;

impl WireBody for Empty {
    fn decode(_r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self)
    }

    fn encode(&self, _w: &mut WireWriter) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingState {
    pub loading: bool,
}

impl WireBody for LoadingState {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            loading: r.read_bool()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_bool(self.loading);
    }
}

/// Move the client to another world. The token authenticates it there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Portal {
    pub world_id: String,
    pub token: Vec<u8>,
}

impl WireBody for Portal {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            world_id: r.read_string()?,
            token: r.read_bytes()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.world_id);
        w.write_bytes(&self.token);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerTime {
    pub server_time: i64,
}

impl WireBody for ServerTime {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            server_time: r.read_i64()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i64(self.server_time);
    }
}

/// A slash command typed by the player.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub command: String,
}

impl WireBody for Command {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            command: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.command);
    }
}

/// A chat line. The speaker is the message subject.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comm {
    pub channel: i32,
    pub message: String,
}

impl WireBody for Comm {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            channel: r.read_i32()?,
            message: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i32(self.channel);
        w.write_string(&self.message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientParameter {
    pub values: Vec<(String, String)>,
}

impl ClientParameter {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl WireBody for ClientParameter {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            values: read_list(r, |r| Ok((r.read_string()?, r.read_string()?)))?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_list(w, &self.values, |w, (k, v)| {
            w.write_string(k);
            w.write_string(v);
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiTheme {
    pub themes: Vec<String>,
}

impl WireBody for UiTheme {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            themes: read_strings(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_strings(w, &self.themes);
    }
}

/// A free-form message for game-specific features.
///
/// The sub-type travels inside the property map under
/// [`EXTENSION_SUBTYPE_KEY`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extension {
    pub properties: PropertyMap,
}

impl Extension {
    pub fn new(sub_type: &str, properties: PropertyMap) -> Self {
        Self {
            properties: properties.with(EXTENSION_SUBTYPE_KEY, sub_type),
        }
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.properties.get_str(EXTENSION_SUBTYPE_KEY)
    }
}

impl WireBody for Extension {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            properties: PropertyMap::decode(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        self.properties.encode(w);
    }
}
