use std::sync::Arc;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use rustls::ServerConfig;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::info;

pub const CERTIFICATE_ORGANIZATION: &str = "caicloud.io";

const CERTIFICATE_VALIDITY_DAYS: i64 = 365 * 100;

#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("cannot generate certificate: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("cannot build TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
}

/// Self-signed certificate and private key presented by the HTTPS
/// listener. The certificate doubles as the CA bundle handed to the
/// API server.
pub struct TrustMaterial {
    pub cert_pem: String,
    pub key_pem: String,
    pub cert_der: CertificateDer<'static>,
    pub key_der: PrivatePkcs8KeyDer<'static>,
}

impl TrustMaterial {
    /// Generate a fresh key pair and a certificate valid for the in-cluster
    /// DNS names of `service` inside of `namespace`.
    pub fn generate(service: &str, namespace: &str) -> Result<Self, CertificateError> {
        let common_name = format!("{service}.{namespace}.svc");
        let subject_alt_names = vec![
            service.to_owned(),
            format!("{service}.{namespace}"),
            common_name.clone(),
        ];

        let mut params = CertificateParams::new(subject_alt_names)?;

        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, common_name.as_str());
        distinguished_name.push(DnType::OrganizationName, CERTIFICATE_ORGANIZATION);
        params.distinguished_name = distinguished_name;

        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
            KeyUsagePurpose::KeyCertSign,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + Duration::days(CERTIFICATE_VALIDITY_DAYS);

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        info!(common_name = common_name.as_str(), "self-signed certificate generated");

        Ok(TrustMaterial {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            cert_der: cert.der().clone(),
            key_der: PrivatePkcs8KeyDer::from(key_pair.serialize_der()),
        })
    }

    /// PEM encoded certificate, ready to be used as `caBundle`.
    pub fn ca_bundle(&self) -> Vec<u8> {
        self.cert_pem.as_bytes().to_vec()
    }

    pub fn rustls_server_config(&self) -> Result<ServerConfig, CertificateError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let key = PrivateKeyDer::from(self.key_der.clone_key());

        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(vec![self.cert_der.clone()], key)?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(config)
    }
}
