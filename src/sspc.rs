use std::{error, fmt, result};

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use oid::ObjectIdentifier;

use crate::provider::{GssCode, GssError};

pub type Result<T> = result::Result<T, Error>;

bitflags! {
    /// Security capabilities negotiated by a context, in the bit positions of
    /// the SPNEGO NegTokenInit context-flags field. The session-setup layer
    /// forwards this value verbatim into the negotiation token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ContextFlags: u32 {
        const DELEGATION = 0x80;
        const MUTUAL_AUTHENTICATION = 0x40;
        const REPLAY_DETECTION = 0x20;
        const SEQUENCE_CHECKING = 0x10;
        const ANONYMITY = 0x08;
        const CONFIDENTIALITY = 0x04;
        const INTEGRITY = 0x02;
    }
}

/// Security context driving the authentication token exchange of an SMB
/// session setup.
///
/// An instance represents a single in-progress handshake and must be owned
/// by a single session-setup task for its lifetime. [`dispose`] has to be
/// called exactly once, on the success path or when the attempt is
/// abandoned; afterwards only [`is_established`] and the `Display`
/// rendering remain usable.
///
/// [`dispose`]: SspContext::dispose
/// [`is_established`]: SspContext::is_established
pub trait SspContext: fmt::Display {
    /// Checks whether this context can handle the given mechanism.
    fn is_supported(&self, mechanism: &ObjectIdentifier) -> bool;

    /// Mechanism identifiers this context accepts, in stable order.
    fn supported_mechs(&self) -> &[ObjectIdentifier];

    /// Capabilities currently in effect, recomputed from the provider on
    /// every call. State can change while the handshake is in progress, so
    /// the result is never cached.
    fn flags(&self) -> Result<ContextFlags>;

    fn is_established(&self) -> bool;

    /// NetBIOS name of the peer, for mechanisms that negotiate one.
    fn netbios_name(&self) -> Option<String>;

    /// Raw negotiated session key, obtained through the extended-context
    /// probe (see [`crate::extensions`]). Fails with
    /// [`ErrorKind::UnsupportedFunction`] when no extension is available or
    /// the provider context does not implement the detected one.
    fn signing_key(&self) -> Result<Vec<u8>>;

    /// Advances the handshake by feeding the peer-supplied token to the
    /// mechanism. Returns the next token to send to the peer, or `None`
    /// when the handshake requires no further output. May block on network
    /// or credential-store I/O inside the provider; timeouts, if needed,
    /// are the caller's business.
    fn init_sec_context(&mut self, token: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Releases the provider context. A no-op when already disposed.
    fn dispose(&mut self) -> Result<()>;
}

/// The kind of a security-context error, using the SSPI status codes.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ErrorKind {
    Unknown = 0,
    InvalidHandle = 0x8009_0301,
    UnsupportedFunction = 0x8009_0302,
    TargetUnknown = 0x8009_0303,
    /// May correspond to any internal error (I/O error, provider error, etc.).
    InternalError = 0x8009_0304,
    /// Used in cases when supplied data is missing or invalid.
    InvalidToken = 0x8009_0308,
    LogonDenied = 0x8009_030C,
    NoCredentials = 0x8009_030E,
    OutOfSequence = 0x8009_0310,
    NoAuthenticatingAuthority = 0x8009_0311,
    ContextExpired = 0x8009_0317,
    WrongPrincipalName = 0x8009_0322,
    TimeSkew = 0x8009_0324,
    BadBindings = 0x8009_0346,
    InvalidParameter = 0x8009_035D,
    MutualAuthFailed = 0x8009_0363,
}

/// Holds the [`ErrorKind`], a description, and the provider-originated cause
/// when one exists.
#[derive(Debug)]
pub struct Error {
    pub error_type: ErrorKind,
    pub description: String,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(error_type: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            error_type,
            description: description.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, keeping it reachable through
    /// [`std::error::Error::source`] for diagnostics.
    pub fn with_source(
        error_type: ErrorKind,
        description: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            error_type,
            description: description.into(),
            source: Some(source.into()),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.description)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

/// Maps a GSS routine error onto the closest SSPI status.
pub(crate) fn gss_error_kind(error: &GssError) -> ErrorKind {
    match error.code {
        GssCode::BadMech | GssCode::BadMic | GssCode::DefectiveToken | GssCode::DuplicateElement => {
            ErrorKind::InvalidToken
        }
        GssCode::BadName | GssCode::BadNameType | GssCode::NameNotMn => ErrorKind::WrongPrincipalName,
        GssCode::NoCred | GssCode::DefectiveCredential | GssCode::CredentialsExpired => ErrorKind::NoCredentials,
        GssCode::ContextExpired => ErrorKind::ContextExpired,
        GssCode::NoContext => ErrorKind::InvalidHandle,
        GssCode::Unavailable => ErrorKind::UnsupportedFunction,
        GssCode::Unauthorized => ErrorKind::LogonDenied,
        GssCode::BadBindings => ErrorKind::BadBindings,
        GssCode::BadStatus | GssCode::BadQop | GssCode::Failure => ErrorKind::InternalError,
    }
}

impl From<GssError> for Error {
    fn from(error: GssError) -> Self {
        let error_type = gss_error_kind(&error);
        let description = error.to_string();
        Error::with_source(error_type, description, error)
    }
}
