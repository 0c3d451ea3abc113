//! Command and reply grammar carried inside authenticated payloads.
//!
//! | Request | Success reply | Failure reply |
//! |---------|---------------|---------------|
//! | `CHECK;<uid>` | `CHECK;<uid>;OK;<name>` | `CHECK;<uid>;NO` |
//! | `ADD;<uid>;<name>` | `ADD;<uid>;OK` | `FAIL` |
//! | `DEL;<uid>` | `DEL;<uid>;OK` | `FAIL` |
//! | `EDIT;<uid>;<name>` | `EDIT;<uid>;OK` | `FAIL` |
//!
//! Fields beyond those listed are ignored.  The edge device appends
//! `;C=<counter>;S=<session>` to every request for its own bookkeeping.

use std::fmt;

use thiserror::Error;

/// Separator between the fields of a command or reply.
pub const COMMAND_SEPARATOR: char = ';';

const KW_CHECK: &str = "CHECK";
const KW_ADD: &str = "ADD";
const KW_DEL: &str = "DEL";
const KW_EDIT: &str = "EDIT";
const KW_OK: &str = "OK";
const KW_NO: &str = "NO";
const KW_FAIL: &str = "FAIL";

/// Reasons a payload is not a usable command or reply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}")]
    Unknown(String),

    /// A required field is absent or empty.
    #[error("{command} is missing its {field}")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    #[error("unrecognised reply {0:?}")]
    UnknownReply(String),
}

/// A request from the edge device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Is this UID authorized, and to whom does it belong?
    Check { uid: String },
    /// Authorize a new UID for `name`.
    Add { uid: String, name: String },
    /// Revoke a UID.
    Delete { uid: String },
    /// Change the holder name of an existing UID.
    Edit { uid: String, name: String },
}

impl Command {
    /// Parses an authenticated payload.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for an empty payload, an unknown keyword, or
    /// a missing/empty UID or name.  The dispatcher answers all of them with
    /// `FAIL`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gate_core::Command;
    ///
    /// let cmd = Command::parse("ADD;AB12;Alice;C=4;S=1").unwrap();
    /// assert_eq!(cmd, Command::Add { uid: "AB12".into(), name: "Alice".into() });
    /// assert!(Command::parse("ADD;AB12").is_err());
    /// ```
    pub fn parse(payload: &str) -> Result<Self, CommandError> {
        let mut fields = payload.split(COMMAND_SEPARATOR);
        let keyword = fields.next().unwrap_or_default();
        if keyword.is_empty() {
            return Err(CommandError::Empty);
        }

        match keyword {
            KW_CHECK => Ok(Self::Check {
                uid: required(fields.next(), KW_CHECK, "uid")?,
            }),
            KW_ADD => Ok(Self::Add {
                uid: required(fields.next(), KW_ADD, "uid")?,
                name: required(fields.next(), KW_ADD, "name")?,
            }),
            KW_DEL => Ok(Self::Delete {
                uid: required(fields.next(), KW_DEL, "uid")?,
            }),
            KW_EDIT => Ok(Self::Edit {
                uid: required(fields.next(), KW_EDIT, "uid")?,
                name: required(fields.next(), KW_EDIT, "name")?,
            }),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// The wire keyword (`CHECK`, `ADD`, `DEL`, `EDIT`).
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Check { .. } => KW_CHECK,
            Self::Add { .. } => KW_ADD,
            Self::Delete { .. } => KW_DEL,
            Self::Edit { .. } => KW_EDIT,
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            Self::Check { uid }
            | Self::Add { uid, .. }
            | Self::Delete { uid }
            | Self::Edit { uid, .. } => uid,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = COMMAND_SEPARATOR;
        match self {
            Self::Check { uid } | Self::Delete { uid } => write!(f, "{}{sep}{uid}", self.keyword()),
            Self::Add { uid, name } | Self::Edit { uid, name } => {
                write!(f, "{}{sep}{uid}{sep}{name}", self.keyword())
            }
        }
    }
}

fn required(
    field: Option<&str>,
    command: &'static str,
    name: &'static str,
) -> Result<String, CommandError> {
    match field {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(CommandError::MissingField {
            command,
            field: name,
        }),
    }
}

/// The service's answer to one [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `CHECK;<uid>;OK;<name>`
    Authorized { uid: String, name: String },
    /// `CHECK;<uid>;NO`
    Denied { uid: String },
    /// `ADD;<uid>;OK`
    Added { uid: String },
    /// `DEL;<uid>;OK`
    Deleted { uid: String },
    /// `EDIT;<uid>;OK`
    Edited { uid: String },
    /// Generic failure; deliberately carries no detail.
    Fail,
}

impl Reply {
    /// `true` for every reply except [`Reply::Fail`] and [`Reply::Denied`].
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Fail | Self::Denied { .. })
    }

    /// Parses a reply text.  Used by the edge client; everything after
    /// `CHECK;<uid>;OK;` is taken as the name.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownReply`] for text that matches none of
    /// the reply shapes.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        if text == KW_FAIL {
            return Ok(Self::Fail);
        }
        let unknown = || CommandError::UnknownReply(text.to_string());

        let mut fields = text.splitn(4, COMMAND_SEPARATOR);
        let keyword = fields.next().ok_or_else(unknown)?;
        let uid = fields.next().filter(|u| !u.is_empty()).ok_or_else(unknown)?;
        let status = fields.next().ok_or_else(unknown)?;
        let rest = fields.next();
        let uid = uid.to_string();

        match (keyword, status, rest) {
            (KW_CHECK, KW_OK, Some(name)) => Ok(Self::Authorized {
                uid,
                name: name.to_string(),
            }),
            (KW_CHECK, KW_NO, None) => Ok(Self::Denied { uid }),
            (KW_ADD, KW_OK, None) => Ok(Self::Added { uid }),
            (KW_DEL, KW_OK, None) => Ok(Self::Deleted { uid }),
            (KW_EDIT, KW_OK, None) => Ok(Self::Edited { uid }),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = COMMAND_SEPARATOR;
        match self {
            Self::Authorized { uid, name } => write!(f, "{KW_CHECK}{sep}{uid}{sep}{KW_OK}{sep}{name}"),
            Self::Denied { uid } => write!(f, "{KW_CHECK}{sep}{uid}{sep}{KW_NO}"),
            Self::Added { uid } => write!(f, "{KW_ADD}{sep}{uid}{sep}{KW_OK}"),
            Self::Deleted { uid } => write!(f, "{KW_DEL}{sep}{uid}{sep}{KW_OK}"),
            Self::Edited { uid } => write!(f, "{KW_EDIT}{sep}{uid}{sep}{KW_OK}"),
            Self::Fail => f.write_str(KW_FAIL),
        }
    }
}
