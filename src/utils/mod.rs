pub mod crypto_provider;
pub mod logger;
