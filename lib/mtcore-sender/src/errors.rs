// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use mtcore_proto::{authentication, mtp, transport};
use mtcore_tl as tl;
use std::fmt;
use std::io;

/// An error that breaks the connection as a whole, as opposed to a single request.
#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Transport(transport::Error),
    Deserialize(mtp::DeserializeError),
    /// A new authorization key was needed after reconnecting, but generating it failed.
    AuthKeyGen(authentication::Error),
}

impl std::error::Error for ReadError {}

impl Clone for ReadError {
    fn clone(&self) -> Self {
        match self {
            Self::Io(e) => Self::Io(
                e.raw_os_error()
                    .map(io::Error::from_raw_os_error)
                    .unwrap_or_else(|| io::Error::new(e.kind(), e.to_string())),
            ),
            Self::Transport(e) => Self::Transport(e.clone()),
            Self::Deserialize(e) => Self::Deserialize(e.clone()),
            Self::AuthKeyGen(e) => Self::AuthKeyGen(e.clone()),
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "read error, IO failed: {err}"),
            Self::Transport(err) => write!(f, "read error, transport-level: {err}"),
            Self::Deserialize(err) => write!(f, "read error, bad response: {err}"),
            Self::AuthKeyGen(err) => write!(f, "read error, could not replace auth key: {err}"),
        }
    }
}

impl ReadError {
    /// The server no longer knows the authorization key, so a new one must be generated.
    pub fn is_auth_key_broken(&self) -> bool {
        matches!(
            self,
            Self::Transport(transport::Error::BadStatus { status: 404 })
        )
    }

    /// Reconnecting will not help, either because the server refuses this client
    /// or because a replacement authorization key could not be negotiated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(transport::Error::BadStatus {
                status: 403 | 444
            }) | Self::AuthKeyGen(_)
        )
    }
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<transport::Error> for ReadError {
    fn from(error: transport::Error) -> Self {
        Self::Transport(error)
    }
}

impl From<mtp::DeserializeError> for ReadError {
    fn from(error: mtp::DeserializeError) -> Self {
        match error {
            // A status in place of a packet is reported as the transport error it is.
            mtp::DeserializeError::Transport(error) => Self::Transport(error),
            error => Self::Deserialize(error),
        }
    }
}

impl From<authentication::Error> for ReadError {
    fn from(error: authentication::Error) -> Self {
        Self::AuthKeyGen(error)
    }
}

impl From<tl::deserialize::Error> for ReadError {
    fn from(error: tl::deserialize::Error) -> Self {
        Self::Deserialize(error.into())
    }
}

/// The error type reported by the server when a request is misused.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// A numerical value similar to HTTP status codes.
    pub code: i32,

    /// The ASCII error name, normally in screaming snake case.
    pub name: String,

    /// If the error contained an additional value, it will be present here.
    pub value: Option<u32>,

    /// The constructor identifier of the request that triggered this error.
    /// Won't be present if the error was artificially constructed.
    pub caused_by: Option<u32>,
}

impl std::error::Error for RpcError {}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.name)?;
        if let Some(caused_by) = self.caused_by {
            write!(f, " caused by {}", tl::name_for_id(caused_by))?;
        }
        if let Some(value) = self.value {
            write!(f, " (value: {value})")?;
        }
        Ok(())
    }
}

/// Error names that carry a numeric value, as `(prefix, suffix)` around the digits.
const VALUE_FAMILIES: &[(&str, &str)] = &[
    ("2FA_CONFIRM_WAIT_", ""),
    ("EMAIL_UNCONFIRMED_", ""),
    ("FILE_MIGRATE_", ""),
    ("FILE_PART_", "_MISSING"),
    ("FLOOD_PREMIUM_WAIT_", ""),
    ("FLOOD_TEST_PHONE_WAIT_", ""),
    ("FLOOD_WAIT_", ""),
    ("INTERDC_", "_CALL_ERROR"),
    ("INTERDC_", "_CALL_RICH_ERROR"),
    ("NETWORK_MIGRATE_", ""),
    ("PASSWORD_TOO_FRESH_", ""),
    ("PHONE_MIGRATE_", ""),
    ("SESSION_TOO_FRESH_", ""),
    ("SLOWMODE_WAIT_", ""),
    ("STATS_MIGRATE_", ""),
    ("TAKEOUT_INIT_DELAY_", ""),
    ("USER_MIGRATE_", ""),
];

/// Split `message` into its name and value if it belongs to a known family.
fn split_value(message: &str) -> Option<(String, u32)> {
    VALUE_FAMILIES.iter().find_map(|&(prefix, suffix)| {
        let digits = message.strip_prefix(prefix)?.strip_suffix(suffix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = digits.parse().ok()?;
        Some((format!("{}{suffix}", prefix.trim_end_matches('_')), value))
    })
}

impl From<tl::types::RpcError> for RpcError {
    fn from(error: tl::types::RpcError) -> Self {
        let (name, value) = match split_value(&error.error_message) {
            Some((name, value)) => (name, Some(value)),
            None => (error.error_message, None),
        };
        Self {
            code: error.error_code,
            name,
            value,
            caused_by: None,
        }
    }
}

impl RpcError {
    /// Matches on the name of the RPC error (case-sensitive).
    ///
    /// Useful in `match` arm guards. A single trailing or leading asterisk (`'*'`) is allowed,
    /// and will instead check if the error name starts (or ends with) the input parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// # let request_result = Result::<(), _>::Err(mtcore_sender::RpcError {
    /// #     code: 400, name: "PHONE_CODE_INVALID".to_string(), value: None, caused_by: None });
    /// #
    /// match request_result {
    ///     Err(rpc_err) if rpc_err.is("SESSION_PASSWORD_NEEDED") => panic!(),
    ///     Err(rpc_err) if rpc_err.is("PHONE_CODE_*") => {},
    ///     _ => panic!()
    /// }
    /// ```
    pub fn is(&self, rpc_error: &str) -> bool {
        if let Some(rpc_error) = rpc_error.strip_suffix('*') {
            self.name.starts_with(rpc_error)
        } else if let Some(rpc_error) = rpc_error.strip_prefix('*') {
            self.name.ends_with(rpc_error)
        } else {
            self.name == rpc_error
        }
    }

    pub fn with_caused_by(mut self, constructor_id: u32) -> Self {
        self.caused_by = Some(constructor_id);
        self
    }
}

/// This error occurs when a Remote Procedure call was unsuccessful.
#[derive(Debug)]
pub enum InvocationError {
    /// The request invocation failed because it was invalid or the server
    /// could not process it successfully.
    Rpc(RpcError),

    /// The server refused to process the message for a reason that resending
    /// it as-is would not fix.
    BadMessage {
        /// The code of the `bad_msg_notification`.
        code: i32,
    },

    /// The request was cancelled or dropped, and the results won't arrive.
    Dropped,

    /// The error occured while reading the response.
    Read(ReadError),
}

impl std::error::Error for InvocationError {}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(err) => write!(f, "request error: {err}"),
            Self::BadMessage { code } => write!(f, "request error: bad message (code {code})"),
            Self::Dropped => write!(f, "request error: dropped (cancelled)"),
            Self::Read(err) => write!(f, "request error: {err}"),
        }
    }
}

impl From<ReadError> for InvocationError {
    fn from(error: ReadError) -> Self {
        Self::Read(error)
    }
}

impl From<io::Error> for InvocationError {
    fn from(error: io::Error) -> Self {
        Self::from(ReadError::from(error))
    }
}

impl From<mtp::DeserializeError> for InvocationError {
    fn from(error: mtp::DeserializeError) -> Self {
        Self::from(ReadError::from(error))
    }
}

impl From<tl::deserialize::Error> for InvocationError {
    fn from(error: tl::deserialize::Error) -> Self {
        Self::from(ReadError::from(error))
    }
}

impl InvocationError {
    /// Matches on the name of the RPC error (case-sensitive).
    ///
    /// Useful in `match` arm guards. A single trailing or leading asterisk (`'*'`) is allowed,
    /// and will instead check if the error name starts (or ends with) the input parameter.
    ///
    /// If the error is not a RPC error, returns `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// # let request_result = Result::<(), _>::Err(mtcore_sender::InvocationError::Rpc(
    /// #     mtcore_sender::RpcError { code: 400, name: "PHONE_CODE_INVALID".to_string(), value: None, caused_by: None }));
    /// #
    /// match request_result {
    ///     Err(err) if err.is("SESSION_PASSWORD_NEEDED") => panic!(),
    ///     Err(err) if err.is("PHONE_CODE_*") => {},
    ///     _ => panic!()
    /// }
    /// ```
    #[inline]
    pub fn is(&self, rpc_error: &str) -> bool {
        match self {
            Self::Rpc(rpc) => rpc.is(rpc_error),
            _ => false,
        }
    }
}

/// This error occurs when the process to generate an authorization key fails.
#[derive(Debug)]
pub enum AuthorizationError {
    /// The generation failed because the generation process went wrong.
    Gen(authentication::Error),

    /// The generation failed because invoking a request failed.
    Invoke(InvocationError),
}

impl std::error::Error for AuthorizationError {}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gen(err) => write!(f, "authorization error: {err}"),
            Self::Invoke(err) => write!(f, "authorization error: {err}"),
        }
    }
}

impl From<authentication::Error> for AuthorizationError {
    fn from(error: authentication::Error) -> Self {
        Self::Gen(error)
    }
}

impl From<InvocationError> for AuthorizationError {
    fn from(error: InvocationError) -> Self {
        Self::Invoke(error)
    }
}

impl From<ReadError> for AuthorizationError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::AuthKeyGen(error) => Self::Gen(error),
            error => Self::Invoke(error.into()),
        }
    }
}

impl From<io::Error> for AuthorizationError {
    fn from(error: io::Error) -> Self {
        Self::from(InvocationError::from(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_error(code: i32, message: &str) -> RpcError {
        RpcError::from(tl::types::RpcError {
            error_code: code,
            error_message: message.into(),
        })
    }

    #[test]
    fn check_rpc_error_parsing() {
        assert_eq!(
            rpc_error(400, "CHAT_INVALID"),
            RpcError {
                code: 400,
                name: "CHAT_INVALID".into(),
                value: None,
                caused_by: None,
            }
        );

        assert_eq!(
            rpc_error(420, "FLOOD_WAIT_31"),
            RpcError {
                code: 420,
                name: "FLOOD_WAIT".into(),
                value: Some(31),
                caused_by: None,
            }
        );

        assert_eq!(
            rpc_error(500, "INTERDC_2_CALL_ERROR"),
            RpcError {
                code: 500,
                name: "INTERDC_CALL_ERROR".into(),
                value: Some(2),
                caused_by: None,
            }
        );
    }

    #[test]
    fn digits_inside_words_are_not_values() {
        let error = rpc_error(400, "AUTH_KEY_V2_INVALID");
        assert_eq!(error.name, "AUTH_KEY_V2_INVALID");
        assert_eq!(error.value, None);
    }

    #[test]
    fn only_known_families_carry_values() {
        let error = rpc_error(400, "FILE_PART_3_MISSING");
        assert_eq!((error.name.as_str(), error.value), ("FILE_PART_MISSING", Some(3)));

        let error = rpc_error(303, "PHONE_MIGRATE_4");
        assert_eq!((error.name.as_str(), error.value), ("PHONE_MIGRATE", Some(4)));

        let error = rpc_error(420, "SLOWMODE_WAIT_120");
        assert_eq!((error.name.as_str(), error.value), ("SLOWMODE_WAIT", Some(120)));

        // Numbers that are part of an unrelated name stay put.
        let error = rpc_error(400, "STICKERSET_1_INVALID");
        assert_eq!((error.name.as_str(), error.value), ("STICKERSET_1_INVALID", None));

        let error = rpc_error(420, "FLOOD_WAIT_");
        assert_eq!((error.name.as_str(), error.value), ("FLOOD_WAIT_", None));
    }

    #[test]
    fn wildcards_match_prefix_and_suffix() {
        let error = rpc_error(420, "FLOOD_WAIT_31");
        assert!(error.is("FLOOD_WAIT"));
        assert!(error.is("FLOOD_*"));
        assert!(error.is("*_WAIT"));
        assert!(!error.is("FLOOD"));
        assert!(!error.is("*_FLOOD"));

        let error = InvocationError::Rpc(error);
        assert!(error.is("FLOOD_*"));
        assert!(!InvocationError::Dropped.is("FLOOD_*"));
    }

    #[test]
    fn caused_by_is_shown() {
        let error = rpc_error(400, "CHAT_INVALID").with_caused_by(0x7abe77ec);
        assert_eq!(error.caused_by, Some(0x7abe77ec));
        assert_eq!(error.to_string(), "rpc error 400: CHAT_INVALID caused by ping");
    }

    #[test]
    fn status_codes_are_classified() {
        let broken = ReadError::Transport(transport::Error::BadStatus { status: 404 });
        assert!(broken.is_auth_key_broken());
        assert!(!broken.is_fatal());

        let flood = ReadError::Transport(transport::Error::BadStatus { status: 429 });
        assert!(!flood.is_auth_key_broken());
        assert!(!flood.is_fatal());

        let status = ReadError::from(mtp::DeserializeError::Transport(
            transport::Error::BadStatus { status: 403 },
        ));
        assert!(status.is_fatal());
    }
}
