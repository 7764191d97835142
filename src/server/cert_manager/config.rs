use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TlsDefaultsError, TlsResult};

/// 证书有效期上限（天）
pub const MAX_VALIDITY_DAYS: u32 = 36500;

/// 自签名证书使用的密钥算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    /// ECDSA + secp256r1 + SHA-256
    EcdsaP256,
    /// ECDSA + secp384r1 + SHA-384
    #[default]
    EcdsaP384,
    /// Ed25519
    Ed25519,
}

impl KeyAlgorithm {
    pub(crate) fn rcgen_algorithm(self) -> &'static rcgen::SignatureAlgorithm {
        match self {
            Self::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            Self::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            Self::Ed25519 => &rcgen::PKCS_ED25519,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::EcdsaP256 => "ECDSA+secp256r1",
            Self::EcdsaP384 => "ECDSA+secp384r1",
            Self::Ed25519 => "Ed25519",
        }
    }
}

/// 监听器配置
///
/// 只影响首次生成证书时的参数和 TLS 握手参数；已存在的证书文件会被原样使用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// 证书有效期（天）
    pub validity_days: u32,
    /// 证书主题中的组织名
    pub organization: String,
    /// 密钥算法
    pub key_algorithm: KeyAlgorithm,
    /// ALPN 协议列表，例如 `["h2", "http/1.1"]`
    pub alpn_protocols: Vec<String>,
    /// 额外写入 SAN 的主机名
    pub extra_hostnames: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            validity_days: 365,
            organization: "RAT Engine".to_string(),
            key_algorithm: KeyAlgorithm::default(),
            alpn_protocols: Vec::new(),
            extra_hostnames: Vec::new(),
        }
    }
}

impl ListenerConfig {
    /// 从 TOML 字符串解析配置，缺省字段使用默认值
    pub fn from_toml_str(s: &str) -> TlsResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| TlsDefaultsError::Config(format!("解析 TOML 失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file(path: impl AsRef<Path>) -> TlsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TlsDefaultsError::Config(format!("读取 {} 失败: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 检查配置是否合法
    pub fn validate(&self) -> TlsResult<()> {
        if self.validity_days == 0 {
            return Err(TlsDefaultsError::Config("validity_days 必须大于 0".to_string()));
        }
        if self.validity_days > MAX_VALIDITY_DAYS {
            return Err(TlsDefaultsError::Config(format!(
                "validity_days 不能超过 {}，当前为 {}",
                MAX_VALIDITY_DAYS, self.validity_days
            )));
        }
        if self.alpn_protocols.iter().any(|p| p.is_empty() || p.len() > 255) {
            return Err(TlsDefaultsError::Config("ALPN 协议名长度必须在 1..=255 之间".to_string()));
        }
        Ok(())
    }

    pub(crate) fn alpn_bytes(&self) -> Vec<Vec<u8>> {
        self.alpn_protocols.iter().map(|p| p.as_bytes().to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.validity_days, 365);
        assert_eq!(config.key_algorithm, KeyAlgorithm::EcdsaP384);
        assert!(config.alpn_protocols.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ListenerConfig::from_toml_str(
            r#"
            key_algorithm = "ed25519"
            alpn_protocols = ["h2", "http/1.1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.key_algorithm, KeyAlgorithm::Ed25519);
        assert_eq!(config.validity_days, 365);
        assert_eq!(config.alpn_bytes(), vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_validity_days_upper_bound() {
        let config = ListenerConfig::from_toml_str(&format!("validity_days = {}", MAX_VALIDITY_DAYS)).unwrap();
        assert_eq!(config.validity_days, MAX_VALIDITY_DAYS);

        assert!(matches!(
            ListenerConfig::from_toml_str("validity_days = 4000000"),
            Err(TlsDefaultsError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(matches!(
            ListenerConfig::from_toml_str("validity_days = 0"),
            Err(TlsDefaultsError::Config(_))
        ));
        assert!(matches!(
            ListenerConfig::from_toml_str("key_algorithm = \"rsa\""),
            Err(TlsDefaultsError::Config(_))
        ));
    }
}
