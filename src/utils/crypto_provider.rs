use std::sync::{Arc, Once};

use rustls::crypto::CryptoProvider;

static CRYPTO_PROVIDER_INIT: Once = Once::new();

/// 确保 ring 被安装为进程级默认 CryptoProvider，且只执行一次
///
/// 调用方自己构建 `ClientConfig::builder()` 时依赖进程级默认 provider，
/// 如果已有其它 provider 被安装则保持不变。
pub fn ensure_crypto_provider_installed() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            crate::utils::logger::debug!("🔐 已存在默认 CryptoProvider，跳过安装");
        } else {
            crate::utils::logger::debug!("🔐 ring CryptoProvider 已安装");
        }
    });
}

/// 本 crate 显式使用的 provider（强制 ring 后端）
pub(crate) fn ring_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}
