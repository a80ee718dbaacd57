//! TLS client certificate attachment.
//!
//! # Responsibility
//! - Attach one shared certificate record to a connection.
//! - Replicate it with the compact flag-letter network form.
//!
//! # Invariants
//! - A certificate may be shared by several connections; each attachment
//!   holds one holder on it and releases that holder when detached.
//! - Malformed network input still yields a certificate, with missing
//!   fields left empty.
//!
//! # Network form
//! Five flag letters, a space, then either `<fingerprint> <dn> <issuer>`
//! or the error text:
//! - `v`/`V` invalid / valid
//! - `T`/`t` trusted / untrusted
//! - `R`/`r` revoked / not revoked
//! - `s`/`S` unknown signer / known signer
//! - `E`/`e` error present / no error

use crate::component::ComponentRef;
use crate::extension::{
    BoolExtItem, ExtensionError, ExtensionItem, ExtensionKind, ExtensionManager, Extensible,
    SimpleExtItem, ValueCodec,
};
use crate::lifecycle::{RefCounted, Shared};
use log::debug;
use std::rc::Rc;

pub const CERT_ITEM_NAME: &str = "ssl_cert";
pub const NO_CERT_ITEM_NAME: &str = "no-ssl-cert";

/// Client certificate details as reported by the TLS layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Certificate {
    pub invalid: bool,
    pub trusted: bool,
    pub revoked: bool,
    pub unknown_signer: bool,
    pub error: String,
    pub fingerprint: String,
    pub dn: String,
    pub issuer: String,
}

impl Certificate {
    /// A certificate that passed inspection.
    pub fn verified(
        fingerprint: impl Into<String>,
        dn: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            trusted: true,
            fingerprint: fingerprint.into(),
            dn: dn.into(),
            issuer: issuer.into(),
            ..Self::default()
        }
    }

    /// A certificate the TLS layer could not inspect.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            invalid: true,
            unknown_signer: true,
            error: error.into(),
            ..Self::default()
        }
    }

    /// Usable for identification: valid, trusted, not revoked, no error.
    pub fn is_usable(&self) -> bool {
        !self.invalid && self.trusted && !self.revoked && self.error.is_empty()
    }
}

/// Flag-letter text form for shared certificates.
pub struct CertCodec;

impl ValueCodec<Shared<Certificate>> for CertCodec {
    fn encode_network(value: &Shared<Certificate>) -> String {
        let cert: &Certificate = value;
        let mut out = String::with_capacity(8 + cert.fingerprint.len() + cert.dn.len());
        out.push(if cert.invalid { 'v' } else { 'V' });
        out.push(if cert.trusted { 'T' } else { 't' });
        out.push(if cert.revoked { 'R' } else { 'r' });
        out.push(if cert.unknown_signer { 's' } else { 'S' });
        out.push(if cert.error.is_empty() { 'e' } else { 'E' });
        out.push(' ');
        if cert.error.is_empty() {
            out.push_str(&cert.fingerprint);
            out.push(' ');
            out.push_str(&cert.dn);
            out.push(' ');
            out.push_str(&cert.issuer);
        } else {
            out.push_str(&cert.error);
        }
        out
    }

    fn decode_network(text: &str) -> Option<Shared<Certificate>> {
        let (flags, rest) = text.split_once(' ').unwrap_or((text, ""));
        let rest = rest.lines().next().unwrap_or_default();

        let mut cert = Certificate {
            invalid: flags.contains('v'),
            trusted: flags.contains('T'),
            revoked: flags.contains('R'),
            unknown_signer: flags.contains('s'),
            ..Certificate::default()
        };
        if flags.contains('E') {
            cert.error = rest.to_string();
        } else {
            let mut fields = rest.splitn(3, ' ');
            cert.fingerprint = fields.next().unwrap_or_default().to_string();
            cert.dn = fields.next().unwrap_or_default().to_string();
            cert.issuer = fields.next().unwrap_or_default().to_string();
        }
        Some(RefCounted::new(cert))
    }
}

pub type CertItem = SimpleExtItem<Shared<Certificate>, CertCodec>;

/// Certificate access for other components.
pub struct SslInfo {
    cert_ext: Rc<CertItem>,
    no_cert_ext: Rc<BoolExtItem>,
}

impl SslInfo {
    pub fn new(component: &ComponentRef) -> Result<Self, ExtensionError> {
        Ok(Self {
            cert_ext: CertItem::new(component, CERT_ITEM_NAME, ExtensionKind::Connection)?,
            no_cert_ext: BoolExtItem::new(component, NO_CERT_ITEM_NAME, ExtensionKind::Connection)?,
        })
    }

    /// Registers both descriptors. Fails without side effects on a clash.
    pub fn register(&self, manager: &mut ExtensionManager) -> Result<(), ExtensionError> {
        for name in [CERT_ITEM_NAME, NO_CERT_ITEM_NAME] {
            if manager.get_item(name).is_some() {
                return Err(ExtensionError::DuplicateName(name.to_string()));
            }
        }
        self.cert_ext.register(manager)?;
        self.no_cert_ext.register(manager)
    }

    pub fn cert_item(&self) -> &Rc<CertItem> {
        &self.cert_ext
    }

    /// New holder handle on the connection's certificate.
    pub fn get_certificate(&self, connection: &Extensible) -> Option<Shared<Certificate>> {
        self.cert_ext.get(connection).cloned()
    }

    /// Attaches `cert`, releasing the previously attached one.
    pub fn set_certificate(
        &self,
        connection: &mut Extensible,
        cert: Shared<Certificate>,
    ) -> Result<(), ExtensionError> {
        debug!(
            "event=ssl_cert_set module=sslinfo status=ok fingerprint={} usable={}",
            cert.fingerprint,
            cert.is_usable()
        );
        self.cert_ext.set(connection, cert)?;
        Ok(())
    }

    pub fn clear_certificate(&self, connection: &mut Extensible) -> bool {
        self.cert_ext.unset(connection)
    }

    /// Whether the connection presented a certificate.
    pub fn is_secure(&self, connection: &Extensible) -> bool {
        self.cert_ext.get(connection).is_some()
    }

    /// Marks a connection as having declined to present a certificate.
    pub fn mark_no_certificate(&self, connection: &mut Extensible) -> Result<(), ExtensionError> {
        self.no_cert_ext.set(connection)
    }

    pub fn declined_certificate(&self, connection: &Extensible) -> bool {
        self.no_cert_ext.get(connection)
    }
}
