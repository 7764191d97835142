use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::error::{TlsDefaultsError, TlsResult};
use crate::server::cert_manager::Credential;
use crate::utils::crypto_provider::ring_provider;
use crate::utils::logger::warn;

/// 只信任指定证书的客户端配置
///
/// 握手签名仍会用证书中的公钥验证，因此对端必须持有对应私钥。
pub fn pinned_client_config(credential: &Credential) -> TlsResult<ClientConfig> {
    let leaf = credential
        .cert_chain()
        .first()
        .cloned()
        .ok_or_else(|| TlsDefaultsError::Config("证书链为空".to_string()))?;
    pinned_client_config_for(leaf)
}

/// 同 [`pinned_client_config`]，直接给出 DER 证书
pub fn pinned_client_config_for(certificate: CertificateDer<'static>) -> TlsResult<ClientConfig> {
    let provider = ring_provider();
    let verifier = PinnedCertVerification {
        expected: certificate,
        provider: provider.clone(),
    };
    build_client_config(provider, Arc::new(verifier))
}

/// 跳过证书验证（仅用于开发/测试）
pub fn insecure_client_config() -> TlsResult<ClientConfig> {
    warn!("⚠️  客户端已禁用服务端证书验证");
    let provider = ring_provider();
    let verifier = NoVerification {
        provider: provider.clone(),
    };
    build_client_config(provider, Arc::new(verifier))
}

fn build_client_config(provider: Arc<CryptoProvider>, verifier: Arc<dyn ServerCertVerifier>) -> TlsResult<ClientConfig> {
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsDefaultsError::Config(format!("协议版本配置失败: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

#[derive(Debug)]
struct PinnedCertVerification {
    expected: CertificateDer<'static>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedCertVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if end_entity.as_ref() == self.expected.as_ref() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// 跳过证书验证（仅用于开发/测试）
#[derive(Debug)]
struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
