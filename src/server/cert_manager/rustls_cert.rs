//! 基于 rustls 的服务端配置
//!
//! 强制使用 ring 作为加密后端

use std::path::Path;
use std::sync::Arc;

use rustls::server::ServerConfig;

use crate::error::{TlsDefaultsError, TlsResult};
use crate::server::cert_manager::{Credential, CredentialOrigin, ListenerConfig};
use crate::utils::crypto_provider::ring_provider;
use crate::utils::logger::debug;

/// 用单个证书构建 ServerConfig（不要求客户端证书）
pub fn build_server_config(credential: Credential, config: &ListenerConfig) -> TlsResult<Arc<ServerConfig>> {
    let hostnames = credential.info().hostnames.clone();
    let origin = credential.origin();
    let cert_path = credential.cert_path().map(Path::to_path_buf);
    let (cert_chain, private_key) = credential.into_parts();

    let mut server_config = ServerConfig::builder_with_provider(ring_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsDefaultsError::TlsConfig(format!("协议版本配置失败: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| {
            rejected_credential(origin, cert_path.as_deref(), format!("证书与私钥无法用于 TLS: {}", e))
        })?;

    server_config.alpn_protocols = config.alpn_bytes();

    debug!("🔐 ServerConfig 已创建: 主机名={:?}, ALPN={:?}", hostnames, config.alpn_protocols);
    Ok(Arc::new(server_config))
}

/// rustls 拒绝证书时按来源归类：新生成的算生成失败，已有文件算加载失败
fn rejected_credential(origin: CredentialOrigin, cert_path: Option<&Path>, reason: String) -> TlsDefaultsError {
    match (origin, cert_path) {
        (CredentialOrigin::Generated, Some(path)) => TlsDefaultsError::generation(path, reason),
        (CredentialOrigin::Loaded, Some(path)) => TlsDefaultsError::load(path, reason),
        (_, None) => TlsDefaultsError::TlsConfig(reason),
    }
}
