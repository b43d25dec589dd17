//! World-server TCP code-space: character selection before the session.
//!
//! These messages travel over the length-prefixed TCP stream. Inside each
//! frame the layout is `[type code: i32][body]`. Character records are
//! property maps so servers can add fields without a protocol bump.

use crate::codec::{note_trailing, read_list, write_list, CodeSpace, WireBody, WireMessage};
use crate::{PropertyMap, ProtocolError, WireReader, WireWriter};

/// Type codes of the world-TCP code-space. Fixed wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WorldTcpMessageType {
    CharacterRequest = 1,
    CharacterResponse = 2,
    CharacterDeleteRequest = 3,
    CharacterDeleteResponse = 4,
    CharacterCreateRequest = 5,
    CharacterCreateResponse = 6,
    CharacterSelectRequest = 7,
    CharacterSelectResponse = 8,
}

impl WorldTcpMessageType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Self::CharacterRequest,
            2 => Self::CharacterResponse,
            3 => Self::CharacterDeleteRequest,
            4 => Self::CharacterDeleteResponse,
            5 => Self::CharacterCreateRequest,
            6 => Self::CharacterCreateResponse,
            7 => Self::CharacterSelectRequest,
            8 => Self::CharacterSelectResponse,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Client → world: "list my characters", authenticated by the master's token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterRequest {
    pub version: String,
    pub auth_token: Vec<u8>,
}

impl WireBody for CharacterRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: r.read_string()?,
            auth_token: r.read_bytes()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.version);
        w.write_bytes(&self.auth_token);
    }
}

/// World → client: the character list and the token for the live session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterResponse {
    pub server_version: String,
    pub world_token: Vec<u8>,
    pub error_message: String,
    pub characters: Vec<PropertyMap>,
}

impl CharacterResponse {
    pub fn is_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}

impl WireBody for CharacterResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            server_version: r.read_string()?,
            world_token: r.read_bytes()?,
            error_message: r.read_string()?,
            characters: read_list(r, PropertyMap::decode)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.server_version);
        w.write_bytes(&self.world_token);
        w.write_string(&self.error_message);
        write_list(w, &self.characters, |w, c| c.encode(w));
    }
}

/// Body shared by the create/delete/select request and response messages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharacterProperties {
    pub properties: PropertyMap,
}

impl WireBody for CharacterProperties {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            properties: PropertyMap::decode(r)?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        self.properties.encode(w);
    }
}

/// A message on the world-TCP channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldTcpMessage {
    CharacterRequest(CharacterRequest),
    CharacterResponse(CharacterResponse),
    CharacterDeleteRequest(CharacterProperties),
    CharacterDeleteResponse(CharacterProperties),
    CharacterCreateRequest(CharacterProperties),
    CharacterCreateResponse(CharacterProperties),
    CharacterSelectRequest(CharacterProperties),
    CharacterSelectResponse(CharacterProperties),
}

impl WorldTcpMessage {
    pub fn kind(&self) -> WorldTcpMessageType {
        use WorldTcpMessageType as T;
        match self {
            Self::CharacterRequest(_) => T::CharacterRequest,
            Self::CharacterResponse(_) => T::CharacterResponse,
            Self::CharacterDeleteRequest(_) => T::CharacterDeleteRequest,
            Self::CharacterDeleteResponse(_) => T::CharacterDeleteResponse,
            Self::CharacterCreateRequest(_) => T::CharacterCreateRequest,
            Self::CharacterCreateResponse(_) => T::CharacterCreateResponse,
            Self::CharacterSelectRequest(_) => T::CharacterSelectRequest,
            Self::CharacterSelectResponse(_) => T::CharacterSelectResponse,
        }
    }
}

impl WireMessage for WorldTcpMessage {
    const CODE_SPACE: CodeSpace = CodeSpace::WorldTcp;

    fn type_code(&self) -> i32 {
        self.kind().code()
    }

    fn name(&self) -> &'static str {
        match self {
            Self::CharacterRequest(_) => "CharacterRequest",
            Self::CharacterResponse(_) => "CharacterResponse",
            Self::CharacterDeleteRequest(_) => "CharacterDeleteRequest",
            Self::CharacterDeleteResponse(_) => "CharacterDeleteResponse",
            Self::CharacterCreateRequest(_) => "CharacterCreateRequest",
            Self::CharacterCreateResponse(_) => "CharacterCreateResponse",
            Self::CharacterSelectRequest(_) => "CharacterSelectRequest",
            Self::CharacterSelectResponse(_) => "CharacterSelectResponse",
        }
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i32(self.type_code());
        match self {
            Self::CharacterRequest(body) => body.encode(w),
            Self::CharacterResponse(body) => body.encode(w),
            Self::CharacterDeleteRequest(body)
            | Self::CharacterDeleteResponse(body)
            | Self::CharacterCreateRequest(body)
            | Self::CharacterCreateResponse(body)
            | Self::CharacterSelectRequest(body)
            | Self::CharacterSelectResponse(body) => body.encode(w),
        }
    }

    fn decode(bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
        use WorldTcpMessageType as T;

        let mut r = WireReader::new(bytes);
        let code = r.read_i32()?;
        let Some(kind) = T::from_code(code) else {
            tracing::warn!(code, len = bytes.len(), "unknown world-tcp message type");
            return Ok(None);
        };
        let r = &mut r;
        let message = match kind {
            T::CharacterRequest => Self::CharacterRequest(CharacterRequest::decode(r)?),
            T::CharacterResponse => Self::CharacterResponse(CharacterResponse::decode(r)?),
            T::CharacterDeleteRequest => {
                Self::CharacterDeleteRequest(CharacterProperties::decode(r)?)
            }
            T::CharacterDeleteResponse => {
                Self::CharacterDeleteResponse(CharacterProperties::decode(r)?)
            }
            T::CharacterCreateRequest => {
                Self::CharacterCreateRequest(CharacterProperties::decode(r)?)
            }
            T::CharacterCreateResponse => {
                Self::CharacterCreateResponse(CharacterProperties::decode(r)?)
            }
            T::CharacterSelectRequest => {
                Self::CharacterSelectRequest(CharacterProperties::decode(r)?)
            }
            T::CharacterSelectResponse => {
                Self::CharacterSelectResponse(CharacterProperties::decode(r)?)
            }
        };
        note_trailing(Self::CODE_SPACE, code, r);
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyValue;

    #[test]
    fn test_character_request_roundtrip() {
        let msg = WorldTcpMessage::CharacterRequest(CharacterRequest {
            version: "2.1".into(),
            auth_token: vec![9, 8, 7, 6],
        });
        assert_eq!(WorldTcpMessage::decode(&msg.to_bytes()).unwrap(), Some(msg));
    }

    #[test]
    fn test_character_response_with_records_roundtrip() {
        let hero = PropertyMap::new()
            .with("characterId", 1001_i64)
            .with("characterName", "Aria")
            .with("appearance", PropertyMap::new().with("hair", "red"));
        let msg = WorldTcpMessage::CharacterResponse(CharacterResponse {
            server_version: "2.1".into(),
            world_token: vec![1, 2, 3],
            error_message: String::new(),
            characters: vec![hero, PropertyMap::new()],
        });
        let decoded = WorldTcpMessage::decode(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, Some(msg));
    }

    #[test]
    fn test_property_variants_keep_their_codes() {
        let props = CharacterProperties {
            properties: PropertyMap::new().with("characterId", PropertyValue::Long(5)),
        };
        let cases = [
            (WorldTcpMessage::CharacterDeleteRequest(props.clone()), 3),
            (WorldTcpMessage::CharacterDeleteResponse(props.clone()), 4),
            (WorldTcpMessage::CharacterCreateRequest(props.clone()), 5),
            (WorldTcpMessage::CharacterCreateResponse(props.clone()), 6),
            (WorldTcpMessage::CharacterSelectRequest(props.clone()), 7),
            (WorldTcpMessage::CharacterSelectResponse(props), 8),
        ];
        for (msg, code) in cases {
            let bytes = msg.to_bytes();
            assert_eq!(&bytes[..4], &(code as i32).to_be_bytes());
            assert_eq!(WorldTcpMessage::decode(&bytes).unwrap(), Some(msg));
        }
    }

    #[test]
    fn test_unknown_world_tcp_code_returns_none() {
        for code in [0, 9, 1000, -7] {
            let mut bytes = (code as i32).to_be_bytes().to_vec();
            bytes.extend_from_slice(&[1, 2, 3]);
            assert_eq!(WorldTcpMessage::decode(&bytes).unwrap(), None);
        }
    }

    #[test]
    fn test_error_response_is_flagged() {
        let resp = CharacterResponse {
            error_message: "bad token".into(),
            ..CharacterResponse::default()
        };
        assert!(resp.is_error());
        assert!(!CharacterResponse::default().is_error());
    }
}
