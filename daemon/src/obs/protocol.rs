/// Message types for the OBS websocket v5 protocol, limited to what the scene
/// feed needs: the Hello/Identify handshake, scene events, and the
/// `GetCurrentProgramScene` request.
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const RPC_VERSION: u32 = 1;

/// Event subscription bits (`EventSubscription` in the OBS protocol docs).
pub const EVENT_SUB_GENERAL: u32 = 1 << 0;
pub const EVENT_SUB_SCENES: u32 = 1 << 2;

pub const SCENE_CHANGED_EVENT: &str = "CurrentProgramSceneChanged";
pub const EXIT_STARTED_EVENT: &str = "ExitStarted";
pub const GET_CURRENT_SCENE_REQUEST: &str = "GetCurrentProgramScene";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Hello = 0,
    Identify = 1,
    Identified = 2,
    Event = 5,
    Request = 6,
    RequestResponse = 7,
}

impl OpCode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Hello),
            1 => Some(Self::Identify),
            2 => Some(Self::Identified),
            5 => Some(Self::Event),
            6 => Some(Self::Request),
            7 => Some(Self::RequestResponse),
            _ => None,
        }
    }
}

/// Every message is `{"op": <opcode>, "d": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    op: u8,
    d: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelloData {
    obs_web_socket_version: String,
    #[serde(default)]
    authentication: Option<AuthChallenge>,
}

/// Present in Hello when OBS has authentication enabled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyData {
    rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    authentication: Option<String>,
    event_subscriptions: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventData {
    event_type: String,
    #[serde(default)]
    event_data: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestData<'a> {
    request_type: &'a str,
    request_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestResponseData {
    request_type: String,
    request_status: RequestStatus,
    #[serde(default)]
    response_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    result: bool,
    code: u32,
    #[serde(default)]
    comment: Option<String>,
}

/// Server messages the feed reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Hello {
        obs_version: String,
        authentication: Option<AuthChallenge>,
    },
    Identified,
    /// Program scene switched, or the answer to `GetCurrentProgramScene`.
    ProgramScene(String),
    /// OBS is shutting down.
    ExitStarted,
    /// A request failed on the OBS side.
    RequestFailed {
        request_type: String,
        code: u32,
        comment: Option<String>,
    },
    Ignored,
}

/// Computes the Identify `authentication` string.
///
/// base64(sha256(base64(sha256(password + salt)) + challenge))
pub fn compute_auth(password: &str, salt: &str, challenge: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let secret = BASE64.encode(hasher.finalize());

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(challenge.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Builds the Identify message, subscribing to general and scene events.
pub fn create_identify(authentication: Option<String>) -> Result<String> {
    let msg = Envelope {
        op: OpCode::Identify as u8,
        d: IdentifyData {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: EVENT_SUB_GENERAL | EVENT_SUB_SCENES,
        },
    };
    serde_json::to_string(&msg).context("Failed to serialize Identify")
}

/// Builds a Request message without request data.
pub fn create_request(request_type: &str, request_id: &str) -> Result<String> {
    let msg = Envelope {
        op: OpCode::Request as u8,
        d: RequestData {
            request_type,
            request_id,
        },
    };
    serde_json::to_string(&msg).context("Failed to serialize Request")
}

/// Parses a text frame from the server.
pub fn parse_server_message(text: &str) -> Result<ServerMessage> {
    let envelope: Envelope<Value> =
        serde_json::from_str(text).context("Malformed OBS message")?;

    let message = match OpCode::from_u8(envelope.op) {
        Some(OpCode::Hello) => {
            let hello: HelloData =
                serde_json::from_value(envelope.d).context("Malformed Hello")?;
            ServerMessage::Hello {
                obs_version: hello.obs_web_socket_version,
                authentication: hello.authentication,
            }
        }
        Some(OpCode::Identified) => ServerMessage::Identified,
        Some(OpCode::Event) => {
            let event: EventData =
                serde_json::from_value(envelope.d).context("Malformed Event")?;
            match event.event_type.as_str() {
                SCENE_CHANGED_EVENT => {
                    match string_field(event.event_data.as_ref(), "sceneName") {
                        Some(name) => ServerMessage::ProgramScene(name),
                        None => anyhow::bail!("{SCENE_CHANGED_EVENT} without sceneName"),
                    }
                }
                EXIT_STARTED_EVENT => ServerMessage::ExitStarted,
                _ => ServerMessage::Ignored,
            }
        }
        Some(OpCode::RequestResponse) => {
            let resp: RequestResponseData =
                serde_json::from_value(envelope.d).context("Malformed RequestResponse")?;
            if !resp.request_status.result {
                ServerMessage::RequestFailed {
                    request_type: resp.request_type,
                    code: resp.request_status.code,
                    comment: resp.request_status.comment,
                }
            } else if resp.request_type == GET_CURRENT_SCENE_REQUEST {
                match string_field(resp.response_data.as_ref(), "currentProgramSceneName") {
                    Some(name) => ServerMessage::ProgramScene(name),
                    None => ServerMessage::Ignored,
                }
            } else {
                ServerMessage::Ignored
            }
        }
        _ => ServerMessage::Ignored,
    };
    Ok(message)
}

fn string_field(data: Option<&Value>, key: &str) -> Option<String> {
    data?.get(key)?.as_str().map(str::to_string)
}
