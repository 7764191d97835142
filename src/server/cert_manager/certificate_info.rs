use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use x509_parser::prelude::*;

/// 证书信息
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// 证书主题
    pub subject: String,
    /// 证书颁发者
    pub issuer: String,
    /// 有效期开始时间
    pub not_before: SystemTime,
    /// 有效期结束时间
    pub not_after: SystemTime,
    /// 序列号（十六进制）
    pub serial_number: String,
    /// 签名算法
    pub signature_algorithm: String,
    /// 主机名列表（SAN 中的 DNS/IP，以及 CN）
    pub hostnames: Vec<String>,
}

impl CertificateInfo {
    /// 从 DER 编码的证书中解析信息
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| format!("解析 X.509 证书失败: {}", e))?;

        let mut hostnames = Vec::new();

        // 从 Subject Alternative Name 扩展中提取
        let san = cert
            .subject_alternative_name()
            .map_err(|e| format!("解析 SAN 扩展失败: {}", e))?;
        if let Some(san) = san {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => hostnames.push(dns.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_bytes(bytes) {
                            hostnames.push(ip.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }

        // 从 Common Name 中提取
        for cn in cert.subject().iter_common_name() {
            if let Ok(cn) = cn.as_str() {
                if !hostnames.iter().any(|h| h == cn) {
                    hostnames.push(cn.to_string());
                }
            }
        }

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before: to_system_time(cert.validity().not_before.timestamp()),
            not_after: to_system_time(cert.validity().not_after.timestamp()),
            serial_number: hex::encode(cert.tbs_certificate.raw_serial()),
            signature_algorithm: signature_algorithm_name(&cert.signature_algorithm.algorithm.to_id_string()),
            hostnames,
        })
    }

    /// 是否为自签名证书（颁发者与主题相同）
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// 证书是否覆盖指定主机名
    pub fn covers(&self, host: &str) -> bool {
        self.hostnames.iter().any(|h| h == host)
    }
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes);
            Some(IpAddr::from(octets))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

fn to_system_time(timestamp: i64) -> SystemTime {
    if timestamp >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_secs(timestamp.unsigned_abs())
    }
}

fn signature_algorithm_name(oid: &str) -> String {
    match oid {
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256".to_string(),
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384".to_string(),
        "1.3.101.112" => "ED25519".to_string(),
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption".to_string(),
        other => other.to_string(),
    }
}
