//! 自签名证书的查找或生成
//!
//! 两个文件都存在时原样加载；任意一个缺失时重新生成一对并覆盖写入。
//! 已存在的证书不检查过期时间，也不检查主机名是否匹配。

use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rcgen::{Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use ::time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use x509_parser::prelude::*;

use crate::error::{TlsDefaultsError, TlsResult};
use crate::server::cert_manager::{CertificateInfo, ListenerConfig};
use crate::utils::crypto_provider::ring_provider;
use crate::utils::logger::{debug, info, warn};

/// 证书来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// 从已有文件加载
    Loaded,
    /// 本次新生成并写入磁盘
    Generated,
}

/// PEM 解析失败发生在哪个文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemPart {
    Key,
    Certificate,
}

/// PEM 解析错误
#[derive(Debug, Clone)]
pub struct PemError {
    pub part: PemPart,
    pub reason: String,
}

impl PemError {
    fn key(reason: impl Into<String>) -> Self {
        Self { part: PemPart::Key, reason: reason.into() }
    }

    fn certificate(reason: impl Into<String>) -> Self {
        Self { part: PemPart::Certificate, reason: reason.into() }
    }

    /// 按出错的一侧选择路径
    fn path<'a>(&self, key_path: &'a Path, cert_path: &'a Path) -> &'a Path {
        match self.part {
            PemPart::Key => key_path,
            PemPart::Certificate => cert_path,
        }
    }
}

impl std::fmt::Display for PemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// 私钥 + 证书链
pub struct Credential {
    key_pem: Vec<u8>,
    cert_pem: Vec<u8>,
    cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    info: CertificateInfo,
    origin: CredentialOrigin,
    cert_path: Option<PathBuf>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("subject", &self.info.subject)
            .field("hostnames", &self.info.hostnames)
            .field("chain_len", &self.cert_chain.len())
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// 从 PEM 数据解析证书和私钥
    pub fn from_pem(key_pem: Vec<u8>, cert_pem: Vec<u8>, origin: CredentialOrigin) -> Result<Self, PemError> {
        let cert_chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_pem.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PemError::certificate(format!("解析证书失败: {}", e)))?;
        if cert_chain.is_empty() {
            return Err(PemError::certificate("证书文件中没有 CERTIFICATE 块"));
        }

        let private_key = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|e| PemError::key(format!("解析私钥失败: {}", e)))?
            .ok_or_else(|| PemError::key("私钥文件中没有私钥"))?;

        // rustls 能否用这把私钥签名
        ring_provider()
            .key_provider
            .load_private_key(private_key.clone_key())
            .map_err(|e| PemError::key(format!("不支持的私钥: {}", e)))?;

        let info = CertificateInfo::from_der(&cert_chain[0]).map_err(PemError::certificate)?;
        check_key_matches_certificate(&key_pem, &cert_chain[0])?;

        Ok(Self {
            key_pem,
            cert_pem,
            cert_chain,
            private_key,
            info,
            origin,
            cert_path: None,
        })
    }

    fn with_cert_path(mut self, cert_path: &Path) -> Self {
        self.cert_path = Some(cert_path.to_path_buf());
        self
    }

    /// PEM 编码的私钥
    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }

    /// PEM 编码的证书
    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    /// DER 编码的证书链，第一个为叶子证书
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }

    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }

    /// 证书文件路径（仅从磁盘加载或生成时存在）
    pub fn cert_path(&self) -> Option<&Path> {
        self.cert_path.as_deref()
    }

    /// 拆分为 rustls 需要的证书链和私钥
    pub fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.cert_chain, self.private_key)
    }
}

/// 私钥的公钥部分必须与证书中的公钥一致
///
/// rcgen 无法识别的私钥格式（如 PKCS#1 RSA）跳过检查，交给握手阶段暴露问题。
fn check_key_matches_certificate(key_pem: &[u8], cert_der: &[u8]) -> Result<(), PemError> {
    let Ok(key_pem) = std::str::from_utf8(key_pem) else {
        return Err(PemError::key("私钥文件不是合法的 PEM 文本"));
    };
    let key_pair = match KeyPair::from_pem(key_pem) {
        Ok(key_pair) => key_pair,
        Err(e) => {
            debug!("跳过私钥与证书的匹配检查: {}", e);
            return Ok(());
        }
    };

    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| PemError::certificate(format!("解析 X.509 证书失败: {}", e)))?;
    if cert.public_key().subject_public_key.data.as_ref() != key_pair.public_key_raw() {
        return Err(PemError::key("私钥与证书不匹配"));
    }
    Ok(())
}

/// 查找或创建 host 对应的私钥和自签名证书
pub async fn obtain_credential(
    host: &str,
    key_path: impl AsRef<Path>,
    cert_path: impl AsRef<Path>,
    config: &ListenerConfig,
) -> TlsResult<Credential> {
    let key_path = key_path.as_ref();
    let cert_path = cert_path.as_ref();

    if file_present(key_path).await && file_present(cert_path).await {
        info!("📋 加载现有证书: {} / {}", cert_path.display(), key_path.display());
        load_credential(key_path, cert_path).await
    } else {
        info!("🔧 证书不完整，为 {} 生成新的 {} 自签名证书", host, config.key_algorithm.name());
        generate_credential(host, key_path, cert_path, config).await
    }
}

/// 无法确认文件不存在时（例如权限不足）按存在处理，让加载阶段报告真正的错误
async fn file_present(path: &Path) -> bool {
    !matches!(fs::try_exists(path).await, Ok(false))
}

/// 从已有文件加载证书，不做任何回退
pub async fn load_credential(key_path: impl AsRef<Path>, cert_path: impl AsRef<Path>) -> TlsResult<Credential> {
    let key_path = key_path.as_ref();
    let cert_path = cert_path.as_ref();

    let key_pem = fs::read(key_path)
        .await
        .map_err(|e| TlsDefaultsError::load(key_path, format!("读取私钥文件失败: {}", e)))?;
    let cert_pem = fs::read(cert_path)
        .await
        .map_err(|e| TlsDefaultsError::load(cert_path, format!("读取证书文件失败: {}", e)))?;

    let credential = Credential::from_pem(key_pem, cert_pem, CredentialOrigin::Loaded)
        .map_err(|e| TlsDefaultsError::load(e.path(key_path, cert_path), e.reason))?
        .with_cert_path(cert_path);

    log_certificate_info(&credential.info);
    Ok(credential)
}

/// 生成新的私钥和自签名证书，并成对写入磁盘
pub async fn generate_credential(
    host: &str,
    key_path: impl AsRef<Path>,
    cert_path: impl AsRef<Path>,
    config: &ListenerConfig,
) -> TlsResult<Credential> {
    let key_path = key_path.as_ref();
    let cert_path = cert_path.as_ref();

    let (key_pem, cert_pem) =
        create_self_signed(host, config).map_err(|reason| TlsDefaultsError::generation(cert_path, reason))?;

    ensure_parent_dir(key_path).await?;
    ensure_parent_dir(cert_path).await?;

    persist_pair(key_path, cert_path, key_pem.as_bytes(), cert_pem.as_bytes()).await?;

    info!("💾 自签名证书已保存:");
    info!("   证书: {}", cert_path.display());
    info!("   私钥: {}", key_path.display());

    let credential = Credential::from_pem(key_pem.into_bytes(), cert_pem.into_bytes(), CredentialOrigin::Generated)
        .map_err(|e| TlsDefaultsError::generation(e.path(key_path, cert_path), e.reason))?
        .with_cert_path(cert_path);

    log_certificate_info(&credential.info);
    Ok(credential)
}

/// 返回 (私钥 PEM, 证书 PEM)
pub(crate) fn create_self_signed(host: &str, config: &ListenerConfig) -> Result<(String, String), String> {
    if host.is_empty() {
        return Err("主机名为空".to_string());
    }
    config.validate().map_err(|e| e.to_string())?;

    let algorithm = config.key_algorithm.rcgen_algorithm();
    let key_pair = KeyPair::generate(algorithm).map_err(|e| format!("生成密钥失败: {}", e))?;

    let mut params = CertificateParams::default();
    params.alg = algorithm;
    params.key_pair = Some(key_pair);
    params.subject_alt_names = subject_alt_names(host, &config.extra_hostnames);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, host);
    distinguished_name.push(DnType::OrganizationName, config.organization.as_str());
    params.distinguished_name = distinguished_name;

    let not_before = OffsetDateTime::now_utc();
    let not_after = not_before
        .checked_add(::time::Duration::days(i64::from(config.validity_days)))
        .ok_or_else(|| format!("证书有效期 {} 天超出可表示范围", config.validity_days))?;
    params.not_before = not_before;
    params.not_after = not_after;

    let cert = RcgenCertificate::from_params(params).map_err(|e| format!("签发证书失败: {}", e))?;
    let cert_pem = cert.serialize_pem().map_err(|e| format!("序列化证书失败: {}", e))?;
    let key_pem = cert.serialize_private_key_pem();

    Ok((key_pem, cert_pem))
}

/// IP 写成 IpAddress，其它写成 DnsName；重复项只保留一个
fn subject_alt_names(host: &str, extra: &[String]) -> Vec<SanType> {
    let mut names: Vec<SanType> = Vec::new();
    for name in std::iter::once(host).chain(extra.iter().map(String::as_str)) {
        let san = match name.parse::<IpAddr>() {
            Ok(ip) => SanType::IpAddress(ip),
            Err(_) => SanType::DnsName(name.to_string()),
        };
        if !names.contains(&san) {
            names.push(san);
        }
    }
    names
}

async fn ensure_parent_dir(path: &Path) -> TlsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| TlsDefaultsError::generation(path, format!("创建目录 {} 失败: {}", parent.display(), e)))?;
    }
    Ok(())
}

/// 先写临时文件再依次 rename，任何一步失败都不会留下不成对的文件
///
/// 私钥已替换但证书 rename 失败时删除新私钥，下次启动会重新生成。
async fn persist_pair(key_path: &Path, cert_path: &Path, key_pem: &[u8], cert_pem: &[u8]) -> TlsResult<()> {
    let key_tmp = temp_path(key_path);
    let cert_tmp = temp_path(cert_path);

    let staged = async {
        write_private_key(&key_tmp, key_pem)
            .await
            .map_err(|e| TlsDefaultsError::generation(key_path, format!("写入私钥失败: {}", e)))?;
        fs::write(&cert_tmp, cert_pem)
            .await
            .map_err(|e| TlsDefaultsError::generation(cert_path, format!("写入证书失败: {}", e)))
    }
    .await;
    if let Err(e) = staged {
        discard(&key_tmp).await;
        discard(&cert_tmp).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&key_tmp, key_path).await {
        discard(&key_tmp).await;
        discard(&cert_tmp).await;
        return Err(TlsDefaultsError::generation(key_path, format!("替换私钥失败: {}", e)));
    }

    if let Err(e) = fs::rename(&cert_tmp, cert_path).await {
        discard(&cert_tmp).await;
        discard(key_path).await;
        return Err(TlsDefaultsError::generation(cert_path, format!("替换证书失败: {}", e)));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("⚠️  清理 {} 失败: {}", path.display(), e);
        }
    }
}

/// 私钥文件仅所有者可读写，创建时即带 0600，不存在放宽权限的窗口
async fn write_private_key(path: &Path, pem: &[u8]) -> io::Result<()> {
    discard(path).await;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(pem).await?;
    file.flush().await?;
    Ok(())
}

fn log_certificate_info(info: &CertificateInfo) {
    info!("   主题: {}", info.subject);
    info!("   有效期: {:?} - {:?}", info.not_before, info.not_after);
    info!("   主机名: {:?}", info.hostnames);
    if info.not_after < SystemTime::now() {
        warn!("⚠️  证书已过期，仍按原样使用: {:?}", info.not_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_alt_names_typed_and_deduplicated() {
        let names = subject_alt_names("127.0.0.1", &["localhost".to_string(), "127.0.0.1".to_string()]);
        assert_eq!(
            names,
            vec![
                SanType::IpAddress("127.0.0.1".parse().unwrap()),
                SanType::DnsName("localhost".to_string()),
            ]
        );
    }

    #[test]
    fn test_create_self_signed_binds_host() {
        let (key_pem, cert_pem) = create_self_signed("node.internal", &ListenerConfig::default()).unwrap();
        assert!(key_pem.contains("BEGIN PRIVATE KEY"));
        assert!(cert_pem.contains("BEGIN CERTIFICATE"));

        let credential =
            Credential::from_pem(key_pem.into_bytes(), cert_pem.into_bytes(), CredentialOrigin::Generated).unwrap();
        assert!(credential.info().covers("node.internal"));
        assert!(credential.info().is_self_signed());
        assert_eq!(credential.info().signature_algorithm, "ecdsa-with-SHA384");
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(create_self_signed("", &ListenerConfig::default()).is_err());
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let (key_a, _) = create_self_signed("a.internal", &ListenerConfig::default()).unwrap();
        let (_, cert_b) = create_self_signed("b.internal", &ListenerConfig::default()).unwrap();
        let err = Credential::from_pem(key_a.into_bytes(), cert_b.into_bytes(), CredentialOrigin::Loaded).unwrap_err();
        assert_eq!(err.part, PemPart::Key);
        assert!(err.reason.contains("不匹配"));
    }

    #[test]
    fn test_garbage_pem_rejected() {
        let (key_pem, _) = create_self_signed("a.internal", &ListenerConfig::default()).unwrap();
        let err = Credential::from_pem(key_pem.into_bytes(), b"garbage".to_vec(), CredentialOrigin::Loaded).unwrap_err();
        assert_eq!(err.part, PemPart::Certificate);
        assert!(err.reason.contains("CERTIFICATE"));
    }
}
