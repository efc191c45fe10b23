//! Kerberos implementation of the session-setup security context.

#[cfg(test)]
pub(crate) mod test_data;

use std::fmt;
use std::sync::LazyLock;

use oid::ObjectIdentifier;
use picky::oids;

use crate::exported_name::ExportedName;
use crate::extensions::ExtendedKeyCapability;
use crate::provider::{CredentialUse, GssContext, GssError, GssName, GssProvider, GssResult, NameForm};
use crate::sspc::{gss_error_kind, ContextFlags, Error, ErrorKind, Result, SspContext};
use crate::ticket::KerberosTicket;

/// Mechanisms this context accepts: Kerberos V5 and the Microsoft variant.
pub static SUPPORTED_MECHS: LazyLock<[ObjectIdentifier; 2]> = LazyLock::new(|| [oids::krb5(), oids::ms_krb5()]);

/// Kerberos-backed [`SspContext`] built over an external GSS-API-style
/// provider.
///
/// One instance drives one session-setup attempt: construct it with the
/// target parameters, feed peer tokens through
/// [`init_sec_context`](SspContext::init_sec_context) until
/// [`is_established`](SspContext::is_established), query the negotiated
/// flags and signing key, then [`dispose`](SspContext::dispose).
#[derive(Debug)]
pub struct Krb5Context {
    /// `None` once disposed.
    context: Option<Box<dyn GssContext>>,
    client_name: Option<Box<dyn GssName>>,
    service_name: Box<dyn GssName>,
}

impl Krb5Context {
    /// Builds the client and service identities and creates the provider
    /// context with the request profile SMB session setup needs.
    ///
    /// With a `realm` the service identity is the fully qualified principal
    /// `service/host@REALM`; without one it is the host-based form
    /// `service@host`. With a `client_principal` an initiate-only credential
    /// is acquired for it; otherwise the provider uses its ambient default
    /// credential.
    pub fn new(
        provider: &dyn GssProvider,
        host: &str,
        service: &str,
        client_principal: Option<&str>,
        user_lifetime: u32,
        context_lifetime: u32,
        realm: Option<&str>,
    ) -> Result<Self> {
        let mech = oids::krb5();

        let service_name = match realm {
            Some(realm) => provider.create_name(
                &format!("{}/{}@{}", service, host, realm),
                NameForm::KerberosPrincipal,
                &mech,
            ),
            None => provider.create_name(&format!("{}@{}", service, host), NameForm::HostBasedService, &mech),
        }
        .map_err(|err| setup_error("failed to construct service name", err))?;

        debug!(service_name = %service_name, "service name constructed");

        let mut client_name = None;
        let mut credential = None;
        if let Some(principal) = client_principal {
            let name = provider
                .create_name(principal, NameForm::UserName, &mech)
                .map_err(|err| setup_error("failed to construct client name", err))?;
            credential = Some(
                provider
                    .create_credential(name.as_ref(), user_lifetime, &mech, CredentialUse::Initiate)
                    .map_err(|err| setup_error("failed to acquire client credential", err))?,
            );
            client_name = Some(name);
        }

        let mut context = provider
            .create_context(service_name.as_ref(), &mech, credential.as_deref(), context_lifetime)
            .map_err(|err| setup_error("failed to create security context", err))?;

        // Request profile for SMB session setup: mutual authentication and
        // delegation only. Per-message confidentiality/integrity/replay/
        // sequencing is not negotiated at this layer.
        context.request_anonymity(false);
        context.request_sequence_det(false);
        context.request_conf(false);
        context.request_integ(false);
        context.request_replay_det(false);
        context.request_mutual_auth(true);
        context.request_cred_deleg(true);

        Ok(Self {
            context: Some(context),
            client_name,
            service_name,
        })
    }

    /// Checks a mechanism identifier against the Kerberos OIDs without
    /// needing a context instance.
    pub fn is_mech_supported(mechanism: &ObjectIdentifier) -> bool {
        SUPPORTED_MECHS.iter().any(|mech| mech == mechanism)
    }

    /// Independent session-key retrieval strategy: exports the established
    /// context's source and target identities and scans the credential
    /// store for a ticket binding exactly that principal pair under the
    /// negotiated mechanism.
    ///
    /// The first matching ticket wins. `Ok(None)` means no ticket matched,
    /// which is a normal outcome, not an error.
    pub fn search_session_key(&self, tickets: &[KerberosTicket]) -> Result<Option<Vec<u8>>> {
        let context = self.context()?;

        let src = exported(context.src_name())?;
        let targ = exported(context.targ_name())?;
        let mech = context
            .mech()
            .map_err(|err| setup_error("failed to query negotiated mechanism", err))?;

        for ticket in tickets {
            let client = ExportedName::new(mech.clone(), ticket.client().as_bytes());
            let server = ExportedName::new(mech.clone(), ticket.server().as_bytes());
            if src == client && targ == server {
                return Ok(Some(ticket.session_key().to_vec()));
            }
        }

        Ok(None)
    }

    /// Signing-key lookup against an explicit probe result. The public
    /// [`signing_key`](SspContext::signing_key) uses the process-wide one.
    fn signing_key_with(&self, capability: &ExtendedKeyCapability) -> Result<Vec<u8>> {
        let inquiry = match capability {
            ExtendedKeyCapability::Unavailable => {
                return Err(Error::new(
                    ErrorKind::UnsupportedFunction,
                    "extended security context support not available from the provider",
                ))
            }
            ExtendedKeyCapability::Available(inquiry) => inquiry,
        };

        let context = self.context()?;
        match (inquiry.inquire)(context, inquiry.selector) {
            Some(key) => key.map_err(|err| {
                setup_error("failed to query Kerberos session key from extended context", err)
            }),
            None => Err(Error::new(
                ErrorKind::UnsupportedFunction,
                format!(
                    "`{}` extension is not implemented by the provider context",
                    inquiry.family
                ),
            )),
        }
    }

    fn context(&self) -> Result<&dyn GssContext> {
        self.context.as_deref().ok_or_else(disposed_error)
    }

    fn context_mut(&mut self) -> Result<&mut (dyn GssContext + '_)> {
        match self.context.as_deref_mut() {
            Some(context) => Ok(context),
            None => Err(disposed_error()),
        }
    }
}

impl SspContext for Krb5Context {
    fn is_supported(&self, mechanism: &ObjectIdentifier) -> bool {
        Self::is_mech_supported(mechanism)
    }

    fn supported_mechs(&self) -> &[ObjectIdentifier] {
        SUPPORTED_MECHS.as_slice()
    }

    fn flags(&self) -> Result<ContextFlags> {
        let context = self.context()?;

        let mut flags = ContextFlags::empty();
        if context.cred_deleg_state() {
            flags |= ContextFlags::DELEGATION;
        }
        if context.mutual_auth_state() {
            flags |= ContextFlags::MUTUAL_AUTHENTICATION;
        }
        if context.replay_det_state() {
            flags |= ContextFlags::REPLAY_DETECTION;
        }
        if context.sequence_det_state() {
            flags |= ContextFlags::SEQUENCE_CHECKING;
        }
        if context.anonymity_state() {
            flags |= ContextFlags::ANONYMITY;
        }
        if context.conf_state() {
            flags |= ContextFlags::CONFIDENTIALITY;
        }
        if context.integ_state() {
            flags |= ContextFlags::INTEGRITY;
        }

        Ok(flags)
    }

    fn is_established(&self) -> bool {
        self.context.as_ref().is_some_and(|context| context.is_established())
    }

    fn netbios_name(&self) -> Option<String> {
        None
    }

    fn signing_key(&self) -> Result<Vec<u8>> {
        self.signing_key_with(ExtendedKeyCapability::get())
    }

    #[instrument(level = "debug", skip(self, token), fields(token_len = token.len()))]
    fn init_sec_context(&mut self, token: &[u8]) -> Result<Option<Vec<u8>>> {
        self.context_mut()?
            .init_sec_context(token)
            .map_err(|err| Error::with_source(gss_error_kind(&err), "GSS-API mechanism failed", err))
    }

    fn dispose(&mut self) -> Result<()> {
        if let Some(mut context) = self.context.take() {
            context
                .dispose()
                .map_err(|err| Error::with_source(gss_error_kind(&err), "context disposal failed", err))?;
            debug!("security context disposed");
        }
        Ok(())
    }
}

impl fmt::Display for Krb5Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = match &self.context {
            Some(context) if context.is_established() => context,
            _ => {
                return match &self.client_name {
                    Some(client) => write!(f, "KERB5[src={},targ={}]", client, self.service_name),
                    None => write!(f, "KERB5[src=<default>,targ={}]", self.service_name),
                }
            }
        };

        match (context.src_name(), context.targ_name(), context.mech()) {
            (Ok(src), Ok(targ), Ok(mech)) => write!(f, "KERB5[src={},targ={},mech={:?}]", src, targ, mech),
            _ => write!(f, "KERB5[established]"),
        }
    }
}

fn exported(name: GssResult<Box<dyn GssName>>) -> Result<ExportedName> {
    let name = name.map_err(|err| setup_error("failed to query context name", err))?;
    let token = name
        .export()
        .map_err(|err| setup_error("failed to export context name", err))?;
    ExportedName::from_bytes(&token)
}

fn setup_error(description: &str, err: GssError) -> Error {
    Error::with_source(gss_error_kind(&err), description, err)
}

fn disposed_error() -> Error {
    Error::new(ErrorKind::InvalidHandle, "security context has been disposed")
}
