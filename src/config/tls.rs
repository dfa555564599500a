use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TlsConfig {
    /// Serves the gRPC listener over TLS
    /// Default: false (disabled)
    #[serde(default)]
    pub enable_tls: bool,

    /// Generates an in-memory self-signed certificate for `localhost` on
    /// startup instead of reading the files below
    #[serde(default)]
    pub generate_self_signed_certificates: bool,

    /// Server certificate chain path in PEM format
    #[serde(default = "default_server_cert_path")]
    pub server_certificate_path: String,

    /// Server private key path in PEM format
    #[serde(default = "default_server_key_path")]
    pub server_private_key_path: String,

    /// Client CA certificate path for mTLS authentication
    #[serde(default = "default_client_ca_path")]
    pub client_certificate_authority_root_path: String,

    /// Requires clients to present a certificate signed by the client CA
    #[serde(default)]
    pub enable_mtls: bool,
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enable_mtls && !self.enable_tls {
            return Err(Error::InvalidConfig("mTLS requires enable_tls to be true".into()));
        }

        if !self.enable_tls {
            return Ok(());
        }

        if !self.generate_self_signed_certificates {
            validate_readable(&self.server_certificate_path, "server certificate")?;
            validate_readable(&self.server_private_key_path, "server private key")?;
        }

        if self.enable_mtls {
            validate_readable(
                &self.client_certificate_authority_root_path,
                "client CA certificate",
            )?;
        }

        Ok(())
    }
}

fn validate_readable(
    path: &str,
    name: &str,
) -> Result<()> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(Error::InvalidConfig(format!(
            "{} file {} not found",
            name,
            path.display()
        )));
    }
    fs::File::open(path).map_err(|e| {
        Error::InvalidConfig(format!("{} file {} is unreadable: {}", name, path.display(), e))
    })?;
    Ok(())
}

fn default_server_cert_path() -> String {
    "./certs/server.pem".into()
}
fn default_server_key_path() -> String {
    "./certs/server.key".into()
}
fn default_client_ca_path() -> String {
    "/etc/ssl/certs/ca.pem".into()
}
