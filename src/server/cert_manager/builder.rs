use crate::server::cert_manager::{KeyAlgorithm, ListenerConfig};

/// 监听器配置构建器
#[derive(Debug, Clone, Default)]
pub struct ListenerBuilder {
    config: ListenerConfig,
}

impl ListenerBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置证书有效期（天）
    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.config.validity_days = days;
        self
    }

    /// 设置证书组织名
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.config.organization = organization.into();
        self
    }

    /// 设置密钥算法
    pub fn with_key_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.config.key_algorithm = algorithm;
        self
    }

    /// 添加 ALPN 协议
    pub fn add_alpn_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.alpn_protocols.push(protocol.into());
        self
    }

    /// 设置 ALPN 协议列表
    pub fn with_alpn_protocols(mut self, protocols: Vec<String>) -> Self {
        self.config.alpn_protocols = protocols;
        self
    }

    /// 添加额外的 SAN 主机名
    pub fn add_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.extra_hostnames.push(hostname.into());
        self
    }

    /// 构建配置
    pub fn build(self) -> ListenerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = ListenerBuilder::new()
            .with_validity_days(30)
            .with_organization("Peer Node")
            .with_key_algorithm(KeyAlgorithm::EcdsaP256)
            .add_alpn_protocol("h2")
            .add_hostname("localhost")
            .build();

        assert_eq!(config.validity_days, 30);
        assert_eq!(config.organization, "Peer Node");
        assert_eq!(config.key_algorithm, KeyAlgorithm::EcdsaP256);
        assert_eq!(config.alpn_protocols, vec!["h2".to_string()]);
        assert_eq!(config.extra_hostnames, vec!["localhost".to_string()]);
    }
}
