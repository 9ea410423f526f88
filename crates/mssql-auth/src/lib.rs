//! # mssql-auth
//!
//! Authentication strategies for SQL Server connections.
//!
//! This crate provides various authentication methods, isolated from
//! connection logic for better modularity and testing.
//!
//! ## Supported Authentication Methods
//!
//! | Method | Feature Flag | Description |
//! |--------|--------------|-------------|
//! | SQL Authentication | default | Username/password |
//! | Azure AD Token | default | Pre-obtained access token |
//! | Azure Managed Identity | `azure-identity` | VM/container identity |
//! | Service Principal | `azure-identity` | App credentials |
//! | Integrated (Kerberos) | `integrated-auth` | GSSAPI/Kerberos |
//! | Certificate | `cert-auth` | Client certificate |
//!
//! ## Always Encrypted
//!
//! The `always-encrypted` feature enables client-side column encryption
//! support: AEAD_AES_256_CBC_HMAC_SHA256 ([`aead`]) and RSA-OAEP CEK
//! unwrapping ([`key_unwrap`]), plus the key store abstractions in
//! [`encryption`] and [`key_store`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod azure_ad;
pub mod credentials;
pub mod error;
pub mod provider;

#[cfg(feature = "azure-identity")]
pub mod azure_identity_auth;

#[cfg(feature = "cert-auth")]
pub mod cert_auth;

#[cfg(feature = "integrated-auth")]
pub mod integrated_auth;

#[cfg(feature = "always-encrypted")]
pub mod aead;
#[cfg(feature = "always-encrypted")]
pub mod encryption;
#[cfg(feature = "always-encrypted")]
pub mod key_store;
#[cfg(feature = "always-encrypted")]
pub mod key_unwrap;

#[cfg(feature = "zeroize")]
pub mod secure;

pub use azure_ad::{AzureAdAuth, FedAuthLibrary, FedAuthWorkflow};
pub use credentials::Credentials;
pub use error::AuthError;
pub use provider::{AsyncAuthProvider, AuthData, AuthMethod, AuthProvider};

#[cfg(feature = "azure-identity")]
pub use azure_identity_auth::{ManagedIdentityAuth, ServicePrincipalAuth};

#[cfg(feature = "cert-auth")]
pub use cert_auth::CertificateAuth;

#[cfg(feature = "integrated-auth")]
pub use integrated_auth::IntegratedAuth;

#[cfg(feature = "always-encrypted")]
pub use aead::AeadEncryptor;
#[cfg(feature = "always-encrypted")]
pub use encryption::{
    ColumnEncryptionConfig, ColumnEncryptionInfo, EncryptionType, KeyStoreProvider,
};
#[cfg(feature = "always-encrypted")]
pub use key_store::{CekCache, InMemoryKeyStore};
#[cfg(feature = "always-encrypted")]
pub use key_unwrap::RsaKeyUnwrapper;

#[cfg(feature = "zeroize")]
pub use secure::{SecretString, SecureCredentials};
