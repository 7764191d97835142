//! 证书管理模块（基于 rustls + ring）
//!
//! 负责查找或生成自签名证书，并据此构建 rustls 服务端配置

pub mod builder;
pub mod certificate_info;
pub mod config;
pub mod dev_cert;
pub mod rustls_cert;

pub use builder::ListenerBuilder;
pub use certificate_info::CertificateInfo;
pub use config::{KeyAlgorithm, ListenerConfig};
pub use dev_cert::{Credential, CredentialOrigin, PemError, PemPart, generate_credential, load_credential, obtain_credential};
pub use rustls_cert::build_server_config;
