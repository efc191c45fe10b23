//! GSS-API-style security-context provider abstraction.
//!
//! The traits here follow the RFC 2743 shape, trimmed to what the SMB
//! session setup consumes: name construction, initiate-only credentials,
//! context creation and the token-exchange loop. An external engine owns
//! all protocol-level work (ticket exchange, encryption); this crate only
//! drives it through these interfaces.

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use oid::ObjectIdentifier;

use crate::extensions::{InquireGssContext, LucidGssContext};

pub type GssResult<T> = std::result::Result<T, GssError>;

/// GSS_C_INDEFINITE: do not bound the lifetime.
pub const INDEFINITE_LIFETIME: u32 = u32::MAX;
/// Mechanism-default lifetime.
pub const DEFAULT_LIFETIME: u32 = 0;

/// Name forms understood by [`GssProvider::create_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameForm {
    /// `service@host` (GSS_C_NT_HOSTBASED_SERVICE).
    HostBasedService,
    /// Plain user name (GSS_C_NT_USER_NAME).
    UserName,
    /// Fully qualified `primary/instance@REALM` under the Kerberos
    /// mechanism's dedicated principal name form.
    KerberosPrincipal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CredentialUse {
    Initiate = 1,
    Accept = 2,
    Both = 3,
}

/// Routine errors of [RFC 2743 §1.2.1](https://www.rfc-editor.org/rfc/rfc2743#section-1.2.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum GssCode {
    BadMech = 1,
    BadName = 2,
    BadNameType = 3,
    BadBindings = 4,
    BadStatus = 5,
    BadMic = 6,
    NoCred = 7,
    NoContext = 8,
    DefectiveToken = 9,
    DefectiveCredential = 10,
    CredentialsExpired = 11,
    ContextExpired = 12,
    Failure = 13,
    BadQop = 14,
    Unauthorized = 15,
    Unavailable = 16,
    DuplicateElement = 17,
    NameNotMn = 18,
}

/// Error reported by the underlying provider.
#[derive(Debug)]
pub struct GssError {
    pub code: GssCode,
    /// Mechanism-specific status, 0 when the mechanism reported none.
    pub minor: u32,
    pub description: String,
}

impl GssError {
    pub fn new(code: GssCode, description: impl Into<String>) -> Self {
        Self {
            code,
            minor: 0,
            description: description.into(),
        }
    }

    pub fn with_minor(code: GssCode, minor: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            minor,
            description: description.into(),
        }
    }
}

impl fmt::Display for GssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (minor {}): {}", self.code, self.minor, self.description)
    }
}

impl std::error::Error for GssError {}

/// A principal name owned by the provider.
pub trait GssName: fmt::Debug + fmt::Display {
    /// Mechanism-independent exported form of this name
    /// (RFC 2743 §3.2 token).
    fn export(&self) -> GssResult<Vec<u8>>;
}

/// An acquired credential handle.
pub trait GssCredential: fmt::Debug {}

/// An in-progress or established security context owned by the provider.
///
/// One instance represents a single handshake; every
/// [`init_sec_context`](GssContext::init_sec_context) call mutates its
/// internal state machine, so callers must serialize all operations.
pub trait GssContext: fmt::Debug {
    fn request_anonymity(&mut self, state: bool);
    fn request_sequence_det(&mut self, state: bool);
    fn request_conf(&mut self, state: bool);
    fn request_integ(&mut self, state: bool);
    fn request_replay_det(&mut self, state: bool);
    fn request_mutual_auth(&mut self, state: bool);
    fn request_cred_deleg(&mut self, state: bool);

    fn anonymity_state(&self) -> bool;
    fn sequence_det_state(&self) -> bool;
    fn conf_state(&self) -> bool;
    fn integ_state(&self) -> bool;
    fn replay_det_state(&self) -> bool;
    fn mutual_auth_state(&self) -> bool;
    fn cred_deleg_state(&self) -> bool;

    fn is_established(&self) -> bool;

    /// Feeds the peer token to the mechanism. Returns the next token to
    /// send, or `None` when no further output is required. May block on KDC
    /// or credential-cache I/O.
    fn init_sec_context(&mut self, token: &[u8]) -> GssResult<Option<Vec<u8>>>;

    /// Source (initiator) name of the established context.
    fn src_name(&self) -> GssResult<Box<dyn GssName>>;
    /// Target (acceptor) name of the established context.
    fn targ_name(&self) -> GssResult<Box<dyn GssName>>;
    /// Mechanism actually negotiated for this context.
    fn mech(&self) -> GssResult<ObjectIdentifier>;

    /// Releases provider-side resources. The context must not be used
    /// afterwards.
    fn dispose(&mut self) -> GssResult<()>;

    /// Upcast hook for the `inquire` vendor extension family. Providers
    /// implementing [`InquireGssContext`] on their context type return
    /// `Some(self)` here.
    fn inquire_ext(&self) -> Option<&dyn InquireGssContext> {
        None
    }

    /// Upcast hook for the `lucid` vendor extension family.
    fn lucid_ext(&self) -> Option<&dyn LucidGssContext> {
        None
    }
}

/// Factory for names, credentials and contexts (the GSS manager).
pub trait GssProvider: fmt::Debug {
    fn create_name(&self, name: &str, form: NameForm, mech: &ObjectIdentifier) -> GssResult<Box<dyn GssName>>;

    fn create_credential(
        &self,
        name: &dyn GssName,
        lifetime: u32,
        mech: &ObjectIdentifier,
        usage: CredentialUse,
    ) -> GssResult<Box<dyn GssCredential>>;

    fn create_context(
        &self,
        target: &dyn GssName,
        mech: &ObjectIdentifier,
        credential: Option<&dyn GssCredential>,
        lifetime: u32,
    ) -> GssResult<Box<dyn GssContext>>;
}
