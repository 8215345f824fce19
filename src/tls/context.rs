//! TLS context loading.
//!
//! Builds a reusable `rustls::ServerConfig` from a PEM bundle holding the
//! certificate chain and private key. Loaded once per server start; every
//! accepted connection gets its own engine instance from the shared context.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig, SupportedProtocolVersion, version};

use crate::config::TlsConfig;

/// Loads the certificate bundle and builds the server context.
///
/// Fails (startup error, never a partial registration) on a missing or
/// malformed bundle, an unsupported protocol name, or a client-auth
/// requirement without a CA to verify against.
pub fn load_context(cfg: &TlsConfig) -> Result<Arc<ServerConfig>> {
    if cfg.passphrase.is_some() {
        bail!(
            "encrypted certificate bundles are not supported; \
             provide an unencrypted PEM bundle"
        );
    }

    let (certs, key) = read_bundle(&cfg.bundle)?;
    let versions = protocol_versions(&cfg.protocols)?;
    let builder = ServerConfig::builder_with_protocol_versions(&versions);

    let config = if cfg.require_client_auth {
        let ca_path = cfg
            .client_ca
            .as_ref()
            .context("require_client_auth is set but no client_ca was given")?;
        let (ca_certs, _) = read_bundle(ca_path)?;
        let mut roots = RootCertStore::empty();
        for ca in ca_certs {
            roots.add(ca).context("invalid certificate in client_ca")?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .context("failed to build client certificate verifier")?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key.context("no private key in bundle")?)?
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(certs, key.context("no private key in bundle")?)?
    };

    Ok(Arc::new(config))
}

fn read_bundle(
    path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, Option<PrivateKeyDer<'static>>)> {
    let pem = std::fs::read(path)
        .with_context(|| format!("failed to read certificate bundle {}", path.display()))?;

    let mut certs = Vec::new();
    let mut key = None;
    let mut cursor = &pem[..];
    for item in rustls_pemfile::read_all(&mut cursor) {
        match item.with_context(|| format!("malformed PEM in {}", path.display()))? {
            rustls_pemfile::Item::X509Certificate(cert) => certs.push(cert),
            rustls_pemfile::Item::Pkcs8Key(k) => key = Some(PrivateKeyDer::Pkcs8(k)),
            rustls_pemfile::Item::Pkcs1Key(k) => key = Some(PrivateKeyDer::Pkcs1(k)),
            rustls_pemfile::Item::Sec1Key(k) => key = Some(PrivateKeyDer::Sec1(k)),
            _ => {}
        }
    }

    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }
    Ok((certs, key))
}

fn protocol_versions(names: &[String]) -> Result<Vec<&'static SupportedProtocolVersion>> {
    let mut versions = Vec::with_capacity(names.len());
    for name in names {
        match name.as_str() {
            "TLSv1.3" => versions.push(&version::TLS13),
            "TLSv1.2" => versions.push(&version::TLS12),
            other => bail!("unsupported protocol version {other:?}"),
        }
    }
    if versions.is_empty() {
        bail!("at least one protocol version must be enabled");
    }
    Ok(versions)
}
