//! Kerberos-backed security context for the authentication handshake of an
//! SMB session, built over a pluggable GSS-API-style provider.
//!
//! The crate does not implement the Kerberos protocol itself. An external
//! engine behind the [`provider`] traits performs all protocol-level work;
//! this crate orchestrates it: it negotiates and reports the capabilities in
//! effect, drives the token exchange to a mutually authenticated session,
//! and locates the session key used to sign subsequent messages.

#[macro_use]
extern crate tracing;

pub mod extensions;
pub mod provider;

mod exported_name;
mod krb5;
mod secret;
mod sspc;
mod ticket;

pub use crate::exported_name::ExportedName;
pub use crate::krb5::{Krb5Context, SUPPORTED_MECHS};
pub use crate::secret::Secret;
pub use crate::sspc::{ContextFlags, Error, ErrorKind, Result, SspContext};
pub use crate::ticket::KerberosTicket;
