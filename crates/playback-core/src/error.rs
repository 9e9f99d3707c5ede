//! Error types for Playback Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, Error>;

/// SDK error types
#[derive(Error, Debug)]
pub enum Error {
    // Initialization errors
    #[error("API key is missing or empty")]
    MissingApiKey,

    #[error("Player license missing from player information")]
    MissingLicense,

    #[error("Failed to fetch player license: {0}")]
    LicenseFetch(String),

    // Metadata service errors
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("API error {status}: {message} ({reason})")]
    Api {
        status: u16,
        message: String,
        reason: PlaybackErrorReason,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Entry resolution did not complete: {0}")]
    ResolutionAborted(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Session errors
    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Entry not found in playlist: {entry_id}")]
    EntryNotFound { entry_id: String },

    #[error("No player engine available")]
    NoPlayer,

    #[error("No video player plugin registered")]
    NoPluginSelected,

    #[error("Playback session has been destroyed")]
    SessionDestroyed,

    #[error("Background playback service is not bound")]
    ServiceNotBound,

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::MalformedResponse(err.to_string())
        } else {
            Error::Network(err)
        }
    }
}

impl Error {
    /// Build an API error from a raw reason string
    pub fn api(status: u16, message: impl Into<String>, reason: &str) -> Self {
        Error::Api {
            status,
            message: message.into(),
            reason: PlaybackErrorReason::from_reason(reason),
        }
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Network(_) | Error::LicenseFetch(_) => true,
            Error::Api { status, reason, .. } => {
                *status >= 500 || *reason == PlaybackErrorReason::TooManyRequests
            }
            _ => false,
        }
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingApiKey => "MISSING_API_KEY",
            Error::MissingLicense => "MISSING_LICENSE",
            Error::LicenseFetch(_) => "LICENSE_FETCH",
            Error::Network(_) => "NETWORK",
            Error::Api { .. } => "API",
            Error::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Error::ResolutionAborted(_) => "RESOLUTION_ABORTED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::EmptyPlaylist => "EMPTY_PLAYLIST",
            Error::EntryNotFound { .. } => "ENTRY_NOT_FOUND",
            Error::NoPlayer => "NO_PLAYER",
            Error::NoPluginSelected => "NO_PLUGIN",
            Error::SessionDestroyed => "SESSION_DESTROYED",
            Error::ServiceNotBound => "SERVICE_NOT_BOUND",
            Error::Engine(_) => "ENGINE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
        }
    }
}

/// Machine-readable reason attached to API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackErrorReason {
    HeaderError,
    BadRequestError,
    SiteNotFound,
    ConfigurationError,
    ApiKeyError,
    MpPartnerError,
    TokenError,
    TooManyDevices,
    TooManyRequests,
    NoEntitlement,
    NoSubscription,
    NoActiveSession,
    NotAuthenticated,
    NoEntityExist,
    Unknown,
}

/// Coarse grouping of [`PlaybackErrorReason`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonClass {
    Header,
    Auth,
    Config,
    Quota,
    Entitlement,
    Session,
    Unknown,
}

impl PlaybackErrorReason {
    /// Map a reason string from an error body. Unmapped strings become `Unknown`.
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "HEADER_ERROR" => Self::HeaderError,
            "BAD_REQUEST_ERROR" => Self::BadRequestError,
            "SITE_NOT_FOUND" => Self::SiteNotFound,
            "CONFIGURATION_ERROR" => Self::ConfigurationError,
            "API_KEY_ERROR" => Self::ApiKeyError,
            "MP_PARTNER_ERROR" => Self::MpPartnerError,
            "TOKEN_ERROR" => Self::TokenError,
            "TOO_MANY_DEVICES" => Self::TooManyDevices,
            "TOO_MANY_REQUESTS" => Self::TooManyRequests,
            "NO_ENTITLEMENT" => Self::NoEntitlement,
            "NO_SUBSCRIPTION" => Self::NoSubscription,
            "NO_ACTIVE_SESSION" => Self::NoActiveSession,
            "NOT_AUTHENTICATED" => Self::NotAuthenticated,
            "NO_ENTITY_EXIST" => Self::NoEntityExist,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderError => "HEADER_ERROR",
            Self::BadRequestError => "BAD_REQUEST_ERROR",
            Self::SiteNotFound => "SITE_NOT_FOUND",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::ApiKeyError => "API_KEY_ERROR",
            Self::MpPartnerError => "MP_PARTNER_ERROR",
            Self::TokenError => "TOKEN_ERROR",
            Self::TooManyDevices => "TOO_MANY_DEVICES",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::NoEntitlement => "NO_ENTITLEMENT",
            Self::NoSubscription => "NO_SUBSCRIPTION",
            Self::NoActiveSession => "NO_ACTIVE_SESSION",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::NoEntityExist => "NO_ENTITY_EXIST",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn class(&self) -> ReasonClass {
        match self {
            Self::HeaderError | Self::BadRequestError => ReasonClass::Header,
            Self::ApiKeyError | Self::TokenError | Self::NotAuthenticated => ReasonClass::Auth,
            Self::SiteNotFound
            | Self::ConfigurationError
            | Self::MpPartnerError
            | Self::NoEntityExist => ReasonClass::Config,
            Self::TooManyDevices | Self::TooManyRequests => ReasonClass::Quota,
            Self::NoEntitlement | Self::NoSubscription => ReasonClass::Entitlement,
            Self::NoActiveSession => ReasonClass::Session,
            Self::Unknown => ReasonClass::Unknown,
        }
    }
}

impl std::fmt::Display for PlaybackErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
