use std::fmt;
use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use oid::ObjectIdentifier;
use picky_asn1::wrapper::ObjectIdentifierAsn1;

use crate::{Error, ErrorKind, Result};

/// `GSS_Export_name` token id (RFC 2743 §3.2).
const TOK_ID: [u8; 2] = [0x04, 0x01];

/// Canonical, mechanism-qualified principal identity.
///
/// Names exported by a live context and names rebuilt from ticket principals
/// come out of different provider code paths and may be encoded differently
/// along the way. Reducing both to the `(mechanism, name bytes)` pair is
/// what makes them comparable; the session-key search relies on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedName {
    mech: ObjectIdentifier,
    name: Vec<u8>,
}

impl ExportedName {
    /// Wraps a principal name under an explicit mechanism, e.g. a ticket's
    /// client or server principal.
    pub fn new(mech: ObjectIdentifier, name: impl Into<Vec<u8>>) -> Self {
        Self {
            mech,
            name: name.into(),
        }
    }

    /// Parses an exported-name token produced by
    /// [`GssName::export`](crate::provider::GssName::export):
    /// `TOK_ID || mech OID DER length (2 bytes BE) || mech OID DER ||
    /// name length (4 bytes BE) || name`.
    pub fn from_bytes(token: &[u8]) -> Result<Self> {
        let mut reader = token;

        let mut tok_id = [0u8; 2];
        reader.read_exact(&mut tok_id).map_err(|_| malformed())?;
        if tok_id != TOK_ID {
            return Err(Error::new(
                ErrorKind::InvalidToken,
                format!("unexpected exported name token id: {:02x?}", tok_id),
            ));
        }

        let mech_len = reader.read_u16::<BigEndian>().map_err(|_| malformed())? as usize;
        if reader.len() < mech_len {
            return Err(malformed());
        }
        let (mech_der, rest) = reader.split_at(mech_len);
        let mech: ObjectIdentifierAsn1 = picky_asn1_der::from_bytes(mech_der).map_err(|err| {
            Error::with_source(ErrorKind::InvalidToken, "malformed mechanism oid in exported name", err)
        })?;
        reader = rest;

        let name_len = reader.read_u32::<BigEndian>().map_err(|_| malformed())? as usize;
        // the name must consume the remainder exactly
        if reader.len() != name_len {
            return Err(malformed());
        }

        Ok(Self {
            mech: mech.0,
            name: reader.to_vec(),
        })
    }

    pub fn mech(&self) -> &ObjectIdentifier {
        &self.mech
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }
}

impl fmt::Display for ExportedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.name))
    }
}

fn malformed() -> Error {
    Error::new(ErrorKind::InvalidToken, "malformed exported name token")
}
