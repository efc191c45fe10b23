//! Detection of the optional provider extension that exposes the raw
//! session key.
//!
//! The baseline [`GssContext`] interface never reveals negotiated key
//! material. Some providers implement one of two incompatible extension
//! families for it: property inquiry keyed by a selector (the
//! `ExtendedGSSContext` style) or a wholesale export of the context
//! internals (the lucid-context style). The probe below resolves the first
//! usable family once per process and caches the result; every
//! [`Krb5Context`](crate::Krb5Context) reads the same cached value.

use std::sync::LazyLock;

use crate::provider::{GssCode, GssContext, GssError, GssResult};
use crate::secret::Secret;

/// Property selector of the `inquire` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquireType {
    /// The negotiated Kerberos session key.
    SessionKey,
}

/// `inquire`-family extension: property queries keyed by [`InquireType`].
pub trait InquireGssContext {
    /// Returns the encoded bytes of the requested property.
    fn inquire_sec_context(&self, inquire_type: InquireType) -> GssResult<Vec<u8>>;
}

/// Version of the lucid context record this crate understands.
pub const LUCID_VERSION: u32 = 1;

/// Security-context internals exported by the `lucid` family.
#[derive(Debug)]
pub struct LucidContext {
    pub version: u32,
    /// Per-message token protocol: 0 for RFC 1964, 1 for RFC 4121.
    pub protocol: u32,
    pub session_key: Secret<Vec<u8>>,
}

/// `lucid`-family extension: exports the context internals wholesale.
pub trait LucidGssContext {
    fn export_lucid_context(&self, version: u32) -> GssResult<LucidContext>;
}

/// Session-key inquiry resolved against one extension family.
#[derive(Clone, Copy, Debug)]
pub struct SessionKeyInquiry {
    pub family: &'static str,
    pub selector: InquireType,
    /// Runs the family's inquiry against a context. Returns `None` when the
    /// context's concrete implementation does not support the family.
    pub inquire: fn(context: &dyn GssContext, selector: InquireType) -> Option<GssResult<Vec<u8>>>,
}

/// One known extension family and the way to resolve its inquiry.
pub struct ExtensionFamily {
    pub name: &'static str,
    pub resolve: fn() -> GssResult<SessionKeyInquiry>,
}

/// Families this crate knows about, in probe priority order.
pub static KNOWN_FAMILIES: &[ExtensionFamily] = &[
    ExtensionFamily {
        name: "inquire",
        resolve: resolve_inquire_family,
    },
    ExtensionFamily {
        name: "lucid",
        resolve: resolve_lucid_family,
    },
];

fn resolve_inquire_family() -> GssResult<SessionKeyInquiry> {
    fn inquire(context: &dyn GssContext, selector: InquireType) -> Option<GssResult<Vec<u8>>> {
        context.inquire_ext().map(|ext| ext.inquire_sec_context(selector))
    }

    Ok(SessionKeyInquiry {
        family: "inquire",
        selector: InquireType::SessionKey,
        inquire,
    })
}

fn resolve_lucid_family() -> GssResult<SessionKeyInquiry> {
    fn inquire(context: &dyn GssContext, _selector: InquireType) -> Option<GssResult<Vec<u8>>> {
        context.lucid_ext().map(|ext| {
            let lucid = ext.export_lucid_context(LUCID_VERSION)?;
            if lucid.version != LUCID_VERSION {
                return Err(GssError::new(
                    GssCode::Unavailable,
                    format!("unsupported lucid context version {}", lucid.version),
                ));
            }
            Ok(lucid.session_key.as_ref().clone())
        })
    }

    Ok(SessionKeyInquiry {
        family: "lucid",
        selector: InquireType::SessionKey,
        inquire,
    })
}

/// Outcome of the one-time extension probe.
#[derive(Clone, Copy, Debug)]
pub enum ExtendedKeyCapability {
    /// No known family resolved; the signing key cannot be obtained this way.
    Unavailable,
    Available(SessionKeyInquiry),
}

static CAPABILITY: LazyLock<ExtendedKeyCapability> = LazyLock::new(|| detect(KNOWN_FAMILIES));

impl ExtendedKeyCapability {
    /// Process-wide probe result, computed on first use and immutable
    /// afterwards. Safe for unsynchronized concurrent reads.
    pub fn get() -> &'static ExtendedKeyCapability {
        &CAPABILITY
    }
}

/// Tries each family in order; the first that resolves wins. Resolution
/// failures degrade to the next family rather than surfacing an error.
pub fn detect(families: &[ExtensionFamily]) -> ExtendedKeyCapability {
    for family in families {
        match (family.resolve)() {
            Ok(inquiry) => {
                debug!(family = family.name, "found extended security context implementation");
                return ExtendedKeyCapability::Available(inquiry);
            }
            Err(error) => {
                debug!(family = family.name, %error, "extension family not usable");
            }
        }
    }

    debug!("no extended security context implementation available");
    ExtendedKeyCapability::Unavailable
}
