//! Reasons a host gives when it drops a peer.
//!
//! Each reason travels as a numeric code plus a `;`-separated payload string, so
//! a peer can render a useful message even for codes it does not know.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Bad or out-of-sequence data
    InvalidData,
    /// The peer lacks a mod the host requires
    ModIsMissing(String),
    /// The peer declared a mod the host does not run
    ModIsMissingOnServer(String),
    ModVersionMismatch {
        identifier: String,
        peer_version: String,
        host_version: String,
    },
    GameVersionMismatch { peer_sig: u64, host_sig: u64 },
    /// The peer could not keep up with outbound traffic
    Backpressure,
    /// The session cannot admit another player
    SessionFull,
    /// Anything else, carrying the raw code and payload
    Other { code: u16, payload: String },
}

impl DisconnectReason {
    pub fn code(&self) -> u16 {
        match self {
            DisconnectReason::InvalidData => 1,
            DisconnectReason::ModIsMissing(_) => 2,
            DisconnectReason::ModIsMissingOnServer(_) => 3,
            DisconnectReason::ModVersionMismatch { .. } => 4,
            DisconnectReason::GameVersionMismatch { .. } => 5,
            DisconnectReason::Backpressure => 6,
            DisconnectReason::SessionFull => 7,
            DisconnectReason::Other { code, .. } => *code,
        }
    }

    /// Wire payload, empty when the reason carries nothing
    pub fn payload(&self) -> String {
        match self {
            DisconnectReason::InvalidData
            | DisconnectReason::Backpressure
            | DisconnectReason::SessionFull => String::new(),
            DisconnectReason::ModIsMissing(id) | DisconnectReason::ModIsMissingOnServer(id) => {
                id.clone()
            }
            DisconnectReason::ModVersionMismatch {
                identifier,
                peer_version,
                host_version,
            } => format!("{identifier};{peer_version};{host_version}"),
            DisconnectReason::GameVersionMismatch { peer_sig, host_sig } => {
                format!("{peer_sig};{host_sig}")
            }
            DisconnectReason::Other { payload, .. } => payload.clone(),
        }
    }

    /// Rebuild a reason from its wire form. Unknown or unparsable pairs become `Other`.
    pub fn from_wire(code: u16, payload: String) -> Self {
        let parts: Vec<&str> = payload.split(';').collect();
        match (code, parts.as_slice()) {
            (1, _) => DisconnectReason::InvalidData,
            (2, _) => DisconnectReason::ModIsMissing(payload),
            (3, _) => DisconnectReason::ModIsMissingOnServer(payload),
            (4, [id, peer, host]) => DisconnectReason::ModVersionMismatch {
                identifier: (*id).to_string(),
                peer_version: (*peer).to_string(),
                host_version: (*host).to_string(),
            },
            (5, [peer, host]) => match (peer.parse(), host.parse()) {
                (Ok(peer_sig), Ok(host_sig)) => {
                    DisconnectReason::GameVersionMismatch { peer_sig, host_sig }
                }
                _ => DisconnectReason::Other { code, payload },
            },
            (6, _) => DisconnectReason::Backpressure,
            (7, _) => DisconnectReason::SessionFull,
            _ => DisconnectReason::Other { code, payload },
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::InvalidData => write!(f, "invalid data"),
            DisconnectReason::ModIsMissing(id) => write!(f, "mod {id} is missing on the client"),
            DisconnectReason::ModIsMissingOnServer(id) => {
                write!(f, "mod {id} is missing on the server")
            }
            DisconnectReason::ModVersionMismatch {
                identifier,
                peer_version,
                host_version,
            } => write!(
                f,
                "mod {identifier} version mismatch (client {peer_version}, server {host_version})"
            ),
            DisconnectReason::GameVersionMismatch { peer_sig, host_sig } => write!(
                f,
                "game version mismatch (client {peer_sig}, server {host_sig})"
            ),
            DisconnectReason::Backpressure => write!(f, "outbound queue overflow"),
            DisconnectReason::SessionFull => write!(f, "session is full"),
            DisconnectReason::Other { code, payload } => write!(f, "code {code}: {payload}"),
        }
    }
}
