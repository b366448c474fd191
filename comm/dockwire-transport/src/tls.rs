//! rustls client configuration built from PEM material.

use crate::descriptor::TlsMaterial;
use dockwire_error::{Result, TransportError};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

fn tls_error(msg: impl std::fmt::Display) -> dockwire_error::Error {
    TransportError::Tls(msg.to_string()).into()
}

/// Builds a connector that verifies the engine against the configured CA and
/// presents the client certificate when one is supplied.
pub(crate) fn client_connector(material: &TlsMaterial) -> Result<TlsConnector> {
    let ca = material
        .ca
        .as_deref()
        .ok_or_else(|| tls_error("a CA certificate is required for https endpoints"))?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut &ca[..]) {
        let cert = cert.map_err(|e| tls_error(format!("invalid CA certificate: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| tls_error(format!("rejected CA certificate: {e}")))?;
    }
    if roots.is_empty() {
        return Err(tls_error("CA bundle contains no certificates"));
    }

    let builder = rustls::ClientConfig::builder().with_root_certificates(roots);

    let config = match (material.cert.as_deref(), material.key.as_deref()) {
        (Some(cert_pem), Some(key_pem)) => {
            let certs = rustls_pemfile::certs(&mut &cert_pem[..])
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| tls_error(format!("invalid client certificate: {e}")))?;
            let key = rustls_pemfile::private_key(&mut &key_pem[..])
                .map_err(|e| tls_error(format!("invalid client key: {e}")))?
                .ok_or_else(|| tls_error("no private key found"))?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| tls_error(format!("client certificate rejected: {e}")))?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => return Err(tls_error("client certificate and key must be supplied together")),
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Resolves the SNI name for a host.
pub(crate) fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|e| TransportError::InvalidAddress(format!("{host}: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ca_is_rejected() {
        let err = client_connector(&TlsMaterial::default()).err().unwrap();
        assert!(err.to_string().contains("CA certificate"));
    }

    #[test]
    fn empty_ca_bundle_is_rejected() {
        let material = TlsMaterial {
            ca: Some(b"not a pem".to_vec()),
            ..Default::default()
        };
        assert!(client_connector(&material).is_err());
    }

    #[test]
    fn server_name_accepts_ip_and_dns() {
        assert!(server_name("10.0.0.2").is_ok());
        assert!(server_name("engine.local").is_ok());
    }
}
