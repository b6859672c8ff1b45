//! Inbound client commands.
//!
//! One command per line, whitespace separated, first token case-sensitive:
//!
//! | Line                          | Handled by         |
//! |-------------------------------|--------------------|
//! | `GETS`                        | rpc engine         |
//! | `STREAM [freq_hz]`            | connection FSM     |
//! | `STOP`                        | connection FSM     |
//! | `CONTROL <name> <OPEN\|CLOSE>` | rpc engine         |
//! | `STATUS`                      | rpc engine         |

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Gets,
    /// `None` streams as fast as the executor allows.
    Stream { freq_hz: Option<f32> },
    Stop,
    Control { name: String, action: String },
    Status,
}

impl Command {
    /// Token echoed at the start of every reply.
    pub const fn token(&self) -> &'static str {
        match self {
            Self::Gets => "GETS",
            Self::Stream { .. } => "STREAM",
            Self::Stop => "STOP",
            Self::Control { .. } => "CONTROL",
            Self::Status => "STATUS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// First token is not a known command; the line gets no reply.
    Unknown(String),
    /// Known command, unusable arguments; answered as `<token> <reason>`.
    BadArgs { token: &'static str, reason: String },
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut parts = line.split_whitespace();
    let head = parts.next().unwrap_or_default();
    match head {
        "GETS" => Ok(Command::Gets),
        "STOP" => Ok(Command::Stop),
        "STATUS" => Ok(Command::Status),
        "STREAM" => match parts.next() {
            None => Ok(Command::Stream { freq_hz: None }),
            Some(arg) => match arg.parse::<f32>() {
                Ok(f) if f.is_finite() && f > 0.0 => Ok(Command::Stream { freq_hz: Some(f) }),
                _ => Err(ParseError::BadArgs {
                    token: "STREAM",
                    reason: format!("Invalid frequency: {arg}"),
                }),
            },
        },
        "CONTROL" => match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(action), None) => Ok(Command::Control {
                name: name.to_owned(),
                action: action.to_owned(),
            }),
            _ => Err(ParseError::BadArgs {
                token: "CONTROL",
                reason: "Usage: CONTROL <name> <OPEN|CLOSE>".into(),
            }),
        },
        other => Err(ParseError::Unknown(other.to_owned())),
    }
}
