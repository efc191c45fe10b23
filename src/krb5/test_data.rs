//! Scripted fake provider used by the unit tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Once;

use oid::ObjectIdentifier;
use picky::oids;
use picky_asn1::wrapper::ObjectIdentifierAsn1;
use tracing_subscriber::EnvFilter;

use crate::extensions::{InquireGssContext, InquireType, LucidContext, LucidGssContext, LUCID_VERSION};
use crate::provider::{
    CredentialUse, GssCode, GssContext, GssCredential, GssError, GssName, GssProvider, GssResult, NameForm,
};

static SETUP: Once = Once::new();

/// Installs a subscriber honoring `RUST_LOG`, so a failing test can be rerun
/// with the handshake and probe traces visible.
pub(crate) fn setup_logger() {
    SETUP.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub(crate) type RequestLog = Rc<RefCell<Vec<(&'static str, bool)>>>;
pub(crate) type NameLog = Rc<RefCell<Vec<(String, NameForm)>>>;
pub(crate) type CredentialLog = Rc<RefCell<Vec<(String, u32, CredentialUse)>>>;

/// Builds an RFC 2743 §3.2 exported-name token.
pub(crate) fn export_name_token(mech: &ObjectIdentifier, name: &[u8]) -> Vec<u8> {
    let der = picky_asn1_der::to_vec(&ObjectIdentifierAsn1::from(mech.clone())).expect("oid to der");

    let mut token = vec![0x04, 0x01];
    token.extend_from_slice(&(der.len() as u16).to_be_bytes());
    token.extend_from_slice(&der);
    token.extend_from_slice(&(name.len() as u32).to_be_bytes());
    token.extend_from_slice(name);
    token
}

#[derive(Debug, Clone)]
pub(crate) struct FakeName {
    pub value: String,
    pub mech: ObjectIdentifier,
}

impl fmt::Display for FakeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl GssName for FakeName {
    fn export(&self) -> GssResult<Vec<u8>> {
        Ok(export_name_token(&self.mech, self.value.as_bytes()))
    }
}

pub(crate) struct FakeCredential {
    pub name: String,
}

impl fmt::Debug for FakeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FakeCredential({})", self.name)
    }
}

impl GssCredential for FakeCredential {}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FlagStates {
    pub anonymity: bool,
    pub sequence_det: bool,
    pub conf: bool,
    pub integ: bool,
    pub replay_det: bool,
    pub mutual_auth: bool,
    pub cred_deleg: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeExtension {
    #[default]
    None,
    Inquire,
    Lucid,
}

/// Scripted context: consumes `rounds_left` tokens, emitting an output
/// token for every round but the last, then reports established.
#[derive(Debug)]
pub(crate) struct FakeContext {
    pub src: String,
    pub target: String,
    pub mech: ObjectIdentifier,
    pub rounds_left: u32,
    pub established: bool,
    pub states: FlagStates,
    pub requests: RequestLog,
    pub session_key: Vec<u8>,
    pub extension: FakeExtension,
    pub reject_tokens: bool,
    pub fail_names: bool,
    pub fail_dispose: bool,
    pub disposed: bool,
}

impl FakeContext {
    pub fn new(src: &str, target: &str) -> Self {
        Self {
            src: src.to_string(),
            target: target.to_string(),
            mech: oids::krb5(),
            rounds_left: 2,
            established: false,
            states: FlagStates::default(),
            requests: Rc::default(),
            session_key: b"0123456789abcdef".to_vec(),
            extension: FakeExtension::None,
            reject_tokens: false,
            fail_names: false,
            fail_dispose: false,
            disposed: false,
        }
    }

    pub fn established(src: &str, target: &str) -> Self {
        Self {
            rounds_left: 0,
            established: true,
            ..Self::new(src, target)
        }
    }

    fn name(&self, value: &str) -> GssResult<Box<dyn GssName>> {
        if !self.established || self.fail_names {
            return Err(GssError::new(GssCode::NoContext, "context is not established"));
        }
        Ok(Box::new(FakeName {
            value: value.to_string(),
            mech: self.mech.clone(),
        }))
    }
}

impl GssContext for FakeContext {
    fn request_anonymity(&mut self, state: bool) {
        self.requests.borrow_mut().push(("anonymity", state));
    }

    fn request_sequence_det(&mut self, state: bool) {
        self.requests.borrow_mut().push(("sequence_det", state));
    }

    fn request_conf(&mut self, state: bool) {
        self.requests.borrow_mut().push(("conf", state));
    }

    fn request_integ(&mut self, state: bool) {
        self.requests.borrow_mut().push(("integ", state));
    }

    fn request_replay_det(&mut self, state: bool) {
        self.requests.borrow_mut().push(("replay_det", state));
    }

    fn request_mutual_auth(&mut self, state: bool) {
        self.requests.borrow_mut().push(("mutual_auth", state));
    }

    fn request_cred_deleg(&mut self, state: bool) {
        self.requests.borrow_mut().push(("cred_deleg", state));
    }

    fn anonymity_state(&self) -> bool {
        self.states.anonymity
    }

    fn sequence_det_state(&self) -> bool {
        self.states.sequence_det
    }

    fn conf_state(&self) -> bool {
        self.states.conf
    }

    fn integ_state(&self) -> bool {
        self.states.integ
    }

    fn replay_det_state(&self) -> bool {
        self.states.replay_det
    }

    fn mutual_auth_state(&self) -> bool {
        self.states.mutual_auth
    }

    fn cred_deleg_state(&self) -> bool {
        self.states.cred_deleg
    }

    fn is_established(&self) -> bool {
        self.established && !self.disposed
    }

    fn init_sec_context(&mut self, token: &[u8]) -> GssResult<Option<Vec<u8>>> {
        if self.reject_tokens {
            return Err(GssError::with_minor(GssCode::DefectiveToken, 31, "token rejected"));
        }
        if self.rounds_left == 0 {
            return Ok(None);
        }

        self.rounds_left -= 1;
        if self.rounds_left == 0 {
            self.established = true;
            return Ok(None);
        }
        Ok(Some([b"out:".as_slice(), token].concat()))
    }

    fn src_name(&self) -> GssResult<Box<dyn GssName>> {
        let src = self.src.clone();
        self.name(&src)
    }

    fn targ_name(&self) -> GssResult<Box<dyn GssName>> {
        let target = self.target.clone();
        self.name(&target)
    }

    fn mech(&self) -> GssResult<ObjectIdentifier> {
        Ok(self.mech.clone())
    }

    fn dispose(&mut self) -> GssResult<()> {
        if self.fail_dispose {
            return Err(GssError::new(GssCode::Failure, "release failed"));
        }
        self.disposed = true;
        Ok(())
    }

    fn inquire_ext(&self) -> Option<&dyn InquireGssContext> {
        (self.extension == FakeExtension::Inquire).then_some(self as _)
    }

    fn lucid_ext(&self) -> Option<&dyn LucidGssContext> {
        (self.extension == FakeExtension::Lucid).then_some(self as _)
    }
}

impl InquireGssContext for FakeContext {
    fn inquire_sec_context(&self, inquire_type: InquireType) -> GssResult<Vec<u8>> {
        match inquire_type {
            InquireType::SessionKey => Ok(self.session_key.clone()),
        }
    }
}

impl LucidGssContext for FakeContext {
    fn export_lucid_context(&self, version: u32) -> GssResult<LucidContext> {
        if version != LUCID_VERSION {
            return Err(GssError::new(
                GssCode::Unavailable,
                format!("unsupported lucid version {}", version),
            ));
        }
        Ok(LucidContext {
            version: LUCID_VERSION,
            protocol: 1,
            session_key: self.session_key.clone().into(),
        })
    }
}

/// Provider producing [`FakeContext`]s, with call logs for the
/// construction-contract tests.
#[derive(Debug, Default)]
pub(crate) struct FakeProvider {
    /// Source principal the produced context reports once established.
    pub client_source: Option<String>,
    pub rounds: Option<u32>,
    pub extension: FakeExtension,
    pub reject_tokens: bool,
    pub fail_create_context: bool,
    pub name_log: NameLog,
    pub credential_log: CredentialLog,
    pub request_log: RequestLog,
}

impl GssProvider for FakeProvider {
    fn create_name(&self, name: &str, form: NameForm, mech: &ObjectIdentifier) -> GssResult<Box<dyn GssName>> {
        self.name_log.borrow_mut().push((name.to_string(), form));
        Ok(Box::new(FakeName {
            value: name.to_string(),
            mech: mech.clone(),
        }))
    }

    fn create_credential(
        &self,
        name: &dyn GssName,
        lifetime: u32,
        _mech: &ObjectIdentifier,
        usage: CredentialUse,
    ) -> GssResult<Box<dyn GssCredential>> {
        self.credential_log.borrow_mut().push((name.to_string(), lifetime, usage));
        Ok(Box::new(FakeCredential { name: name.to_string() }))
    }

    fn create_context(
        &self,
        target: &dyn GssName,
        mech: &ObjectIdentifier,
        _credential: Option<&dyn GssCredential>,
        _lifetime: u32,
    ) -> GssResult<Box<dyn GssContext>> {
        if self.fail_create_context {
            return Err(GssError::new(GssCode::NoCred, "no credentials for target"));
        }

        let src = self
            .client_source
            .clone()
            .unwrap_or_else(|| "user1@EXAMPLE.COM".to_string());
        let mut context = FakeContext::new(&src, &target.to_string());
        context.mech = mech.clone();
        context.requests = Rc::clone(&self.request_log);
        context.extension = self.extension;
        context.reject_tokens = self.reject_tokens;
        if let Some(rounds) = self.rounds {
            context.rounds_left = rounds;
        }
        Ok(Box::new(context))
    }
}
