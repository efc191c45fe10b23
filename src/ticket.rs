use crate::secret::Secret;

/// A Kerberos ticket as surfaced by an external credential store: the bound
/// client and service principals plus the embedded session key.
///
/// Read-only from this crate's perspective; the store owns issuance and
/// expiry.
#[derive(Debug, Clone)]
pub struct KerberosTicket {
    client: String,
    server: String,
    session_key: Secret<Vec<u8>>,
}

impl KerberosTicket {
    pub fn new(client: impl Into<String>, server: impl Into<String>, session_key: impl Into<Vec<u8>>) -> Self {
        Self {
            client: client.into(),
            server: server.into(),
            session_key: Secret::new(session_key.into()),
        }
    }

    /// Client principal name, e.g. `user1@EXAMPLE.COM`.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Service principal name, e.g. `cifs/server1@EXAMPLE.COM`.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn session_key(&self) -> &[u8] {
        self.session_key.as_ref()
    }
}
