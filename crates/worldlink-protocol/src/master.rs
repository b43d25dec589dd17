//! Master-server code-space: resolving a world name to a server address.
//!
//! Wire layout: `[type code: i32][body]`.

use crate::codec::{note_trailing, CodeSpace, WireBody, WireMessage};
use crate::{ProtocolError, WireReader, WireWriter};

/// Type codes of the master code-space. Fixed wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MasterMessageType {
    ResolveRequest = 1,
    ResolveResponse = 2,
}

impl MasterMessageType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::ResolveRequest),
            2 => Some(Self::ResolveResponse),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Client → master: "where does this world live?"
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolveRequest {
    pub world_id: String,
}

impl WireBody for ResolveRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            world_id: r.read_string()?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.world_id);
    }
}

/// Master → client: the world server's address.
///
/// `patcher_url` and `update_url` were added in a later protocol revision;
/// older masters omit them and they decode as empty strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolveResponse {
    pub world_id: String,
    pub success: bool,
    pub hostname: String,
    pub port: i32,
    pub patcher_url: String,
    pub update_url: String,
}

impl WireBody for ResolveResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let world_id = r.read_string()?;
        let success = r.read_bool()?;
        let hostname = r.read_string()?;
        let port = r.read_i32()?;
        let patcher_url = r.optional(String::new(), |r| r.read_string())?;
        let update_url = r.optional(String::new(), |r| r.read_string())?;
        Ok(Self {
            world_id,
            success,
            hostname,
            port,
            patcher_url,
            update_url,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_string(&self.world_id);
        w.write_bool(self.success);
        w.write_string(&self.hostname);
        w.write_i32(self.port);
        w.write_string(&self.patcher_url);
        w.write_string(&self.update_url);
    }
}

/// A message on the master channel.
#[derive(Debug, Clone, PartialEq)]
pub enum MasterMessage {
    ResolveRequest(ResolveRequest),
    ResolveResponse(ResolveResponse),
}

impl MasterMessage {
    pub fn kind(&self) -> MasterMessageType {
        match self {
            Self::ResolveRequest(_) => MasterMessageType::ResolveRequest,
            Self::ResolveResponse(_) => MasterMessageType::ResolveResponse,
        }
    }
}

impl WireMessage for MasterMessage {
    const CODE_SPACE: CodeSpace = CodeSpace::Master;

    fn type_code(&self) -> i32 {
        self.kind().code()
    }

    fn name(&self) -> &'static str {
        match self {
            Self::ResolveRequest(_) => "ResolveRequest",
            Self::ResolveResponse(_) => "ResolveResponse",
        }
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i32(self.type_code());
        match self {
            Self::ResolveRequest(body) => body.encode(w),
            Self::ResolveResponse(body) => body.encode(w),
        }
    }

    fn decode(bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let mut r = WireReader::new(bytes);
        let code = r.read_i32()?;
        let Some(kind) = MasterMessageType::from_code(code) else {
            tracing::warn!(code, len = bytes.len(), "unknown master message type");
            return Ok(None);
        };
        let message = match kind {
            MasterMessageType::ResolveRequest => {
                Self::ResolveRequest(ResolveRequest::decode(&mut r)?)
            }
            MasterMessageType::ResolveResponse => {
                Self::ResolveResponse(ResolveResponse::decode(&mut r)?)
            }
        };
        note_trailing(Self::CODE_SPACE, code, &r);
        Ok(Some(message))
    }
}
