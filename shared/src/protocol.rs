//! Text wire protocol.
//!
//! Every frame is one UTF-8 line on an ordered, reliable channel.
//! Control frames are dot-delimited (`i.l-u.12`, `s.p.1700000000`);
//! the authoritative snapshot rides as a JSON object on its own line and
//! is recognized by its leading `{`. Float timestamps embedded in a
//! dot-delimited frame have their decimal point replaced by `-`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixed::Vec2;
use crate::player::Role;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame type `{0}`")]
    UnknownType(String),
    #[error("`{0}` frame is missing a field")]
    MissingField(&'static str),
    #[error("unknown direction token `{0}`")]
    UnknownDirection(String),
    #[error("invalid integer field: {0}")]
    InvalidInt(#[from] std::num::ParseIntError),
    #[error("invalid time field: {0}")]
    InvalidTime(#[from] std::num::ParseFloatError),
    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Which movement keys were active when an input command was sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionSet {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl DirectionSet {
    pub fn is_empty(&self) -> bool {
        !(self.left || self.right || self.up || self.down)
    }

    /// Net horizontal contribution of this command: -1, 0 or 1.
    pub fn dir_x(&self) -> i32 {
        self.right as i32 - self.left as i32
    }

    /// Net vertical contribution; positive is down.
    pub fn dir_y(&self) -> i32 {
        self.down as i32 - self.up as i32
    }

    /// Dash-joined token form, e.g. `l-u`.
    pub fn encode(&self) -> String {
        let mut tokens = Vec::new();
        if self.left {
            tokens.push("l");
        }
        if self.right {
            tokens.push("r");
        }
        if self.up {
            tokens.push("u");
        }
        if self.down {
            tokens.push("d");
        }
        tokens.join("-")
    }

    pub fn parse(field: &str) -> Result<Self, ProtocolError> {
        let mut directions = DirectionSet::default();
        for token in field.split('-').filter(|t| !t.is_empty()) {
            match token {
                "l" => directions.left = true,
                "r" => directions.right = true,
                "u" => directions.up = true,
                "d" => directions.down = true,
                other => return Err(ProtocolError::UnknownDirection(other.to_string())),
            }
        }
        Ok(directions)
    }
}

/// One sampled input, immutable once created. Owned by the pending queue
/// of whichever side buffered it, until consumed or acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct InputCommand {
    pub directions: DirectionSet,
    pub sequence: u32,
    /// Sender's local clock when sampled. Informational; ordering is by
    /// `sequence` only.
    pub issued_at: Option<f32>,
}

/// Authoritative state broadcast, produced on every broadcast tick.
/// `server_time` is strictly increasing within one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub host_position: Vec2,
    pub guest_position: Vec2,
    pub host_last_seq: u32,
    pub guest_last_seq: u32,
    pub server_time: f32,
}

impl ServerSnapshot {
    pub fn position_of(&self, role: Role) -> Vec2 {
        match role {
            Role::Host => self.host_position,
            Role::Guest => self.guest_position,
        }
    }

    pub fn last_seq_of(&self, role: Role) -> u32 {
        match role {
            Role::Host => self.host_last_seq,
            Role::Guest => self.guest_last_seq,
        }
    }
}

/// Frames sent client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Input(InputCommand),
    Ping { millis: u64 },
    Color(String),
    Latency { millis: u64 },
}

impl ClientFrame {
    pub fn encode(&self) -> String {
        match self {
            ClientFrame::Input(command) => match command.issued_at {
                Some(time) => format!(
                    "i.{}.{}.{}",
                    command.directions.encode(),
                    encode_time(time),
                    command.sequence
                ),
                None => format!("i.{}.{}", command.directions.encode(), command.sequence),
            },
            ClientFrame::Ping { millis } => format!("p.{}", millis),
            ClientFrame::Color(color) => format!("c.{}", color),
            ClientFrame::Latency { millis } => format!("l.{}", millis),
        }
    }

    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = line.split('.').collect();
        match parts.first() {
            None | Some(&"") => Err(ProtocolError::Empty),
            Some(&"i") => {
                let directions =
                    DirectionSet::parse(parts.get(1).ok_or(ProtocolError::MissingField("i"))?)?;
                match parts.len() {
                    // i.<dirs>.<seq>
                    3 => Ok(ClientFrame::Input(InputCommand {
                        directions,
                        sequence: parts[2].parse()?,
                        issued_at: None,
                    })),
                    // i.<dirs>.<issued_at>.<seq>
                    4 => Ok(ClientFrame::Input(InputCommand {
                        directions,
                        sequence: parts[3].parse()?,
                        issued_at: Some(parse_time(parts[2])?),
                    })),
                    _ => Err(ProtocolError::MissingField("i")),
                }
            }
            Some(&"p") => Ok(ClientFrame::Ping {
                millis: parts.get(1).ok_or(ProtocolError::MissingField("p"))?.parse()?,
            }),
            Some(&"c") => Ok(ClientFrame::Color(
                parts.get(1).ok_or(ProtocolError::MissingField("c"))?.to_string(),
            )),
            Some(&"l") => Ok(ClientFrame::Latency {
                millis: parts.get(1).ok_or(ProtocolError::MissingField("l"))?.parse()?,
            }),
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// Frames sent server to client. All dot-delimited frames carry the `s.`
/// prefix; the snapshot is a JSON line.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// You created this match and play the host slot.
    Hosting { server_time: f32 },
    /// You joined an existing match; identifies the hosting connection.
    Joining { host_id: u32 },
    /// Both participants present; reset positions and play.
    Ready { server_time: f32 },
    /// The match is over.
    End,
    Pong { millis: u64 },
    /// The other participant changed their color.
    ColorChanged(String),
    Snapshot(ServerSnapshot),
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(match self {
            ServerFrame::Hosting { server_time } => format!("s.h.{}", encode_time(*server_time)),
            ServerFrame::Joining { host_id } => format!("s.j.{}", host_id),
            ServerFrame::Ready { server_time } => format!("s.r.{}", encode_time(*server_time)),
            ServerFrame::End => "s.e".to_string(),
            ServerFrame::Pong { millis } => format!("s.p.{}", millis),
            ServerFrame::ColorChanged(color) => format!("s.c.{}", color),
            ServerFrame::Snapshot(snapshot) => serde_json::to_string(snapshot)?,
        })
    }

    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line.starts_with('{') {
            return Ok(ServerFrame::Snapshot(serde_json::from_str(line)?));
        }

        let parts: Vec<&str> = line.split('.').collect();
        match parts.first() {
            None | Some(&"") => Err(ProtocolError::Empty),
            Some(&"s") => match parts.get(1) {
                Some(&"h") => Ok(ServerFrame::Hosting {
                    server_time: parse_time(parts.get(2).ok_or(ProtocolError::MissingField("s.h"))?)?,
                }),
                Some(&"j") => Ok(ServerFrame::Joining {
                    host_id: parts.get(2).ok_or(ProtocolError::MissingField("s.j"))?.parse()?,
                }),
                Some(&"r") => Ok(ServerFrame::Ready {
                    server_time: parse_time(parts.get(2).ok_or(ProtocolError::MissingField("s.r"))?)?,
                }),
                Some(&"e") => Ok(ServerFrame::End),
                Some(&"p") => Ok(ServerFrame::Pong {
                    millis: parts.get(2).ok_or(ProtocolError::MissingField("s.p"))?.parse()?,
                }),
                Some(&"c") => Ok(ServerFrame::ColorChanged(
                    parts.get(2).ok_or(ProtocolError::MissingField("s.c"))?.to_string(),
                )),
                Some(other) => Err(ProtocolError::UnknownType(format!("s.{}", other))),
                None => Err(ProtocolError::MissingField("s")),
            },
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// Float seconds with `.` replaced by `-`, safe inside a dot-delimited
/// frame.
fn encode_time(time: f32) -> String {
    time.to_string().replace('.', "-")
}

fn parse_time(field: &str) -> Result<f32, ProtocolError> {
    Ok(field.replace('-', ".").parse()?)
}
