//! Storage account credentials and SAS signing.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Service version the signatures are computed for
pub const SAS_VERSION: &str = "2021-08-06";

const SAS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Account name, decoded key and blob endpoint parsed from a storage
/// connection string
#[derive(Clone)]
pub struct StorageCredentials {
    pub account_name: String,
    account_key: Vec<u8>,
    pub blob_endpoint: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"[redacted]")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl StorageCredentials {
    /// Parse `AccountName=..;AccountKey=..;EndpointSuffix=..` style strings.
    ///
    /// `BlobEndpoint` overrides the endpoint derived from the account name,
    /// protocol and suffix.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, StorageError> {
        let mut account_name = None;
        let mut account_key = None;
        let mut endpoint_suffix = "core.windows.net";
        let mut protocol = "https";
        let mut blob_endpoint = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(invalid("expected Key=Value segments".to_string()));
            };
            match key {
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "EndpointSuffix" => endpoint_suffix = value,
                "DefaultEndpointsProtocol" => protocol = value,
                "BlobEndpoint" => blob_endpoint = Some(value),
                _ => {}
            }
        }

        let account_name = account_name
            .filter(|v| !v.is_empty())
            .ok_or_else(|| invalid("missing AccountName".to_string()))?;
        let account_key = account_key
            .filter(|v| !v.is_empty())
            .ok_or_else(|| invalid("missing AccountKey".to_string()))?;
        let account_key = STANDARD
            .decode(account_key)
            .map_err(|_| invalid("AccountKey is not valid base64".to_string()))?;

        let blob_endpoint = match blob_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("{protocol}://{account_name}.blob.{endpoint_suffix}"),
        };

        Ok(Self {
            account_name: account_name.to_string(),
            account_key,
            blob_endpoint,
        })
    }

    /// Build the SAS query string granting `permissions` on one blob
    pub fn blob_sas(
        &self,
        container: &str,
        blob_name: &str,
        permissions: &str,
        start: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let start = start.format(SAS_TIME_FORMAT).to_string();
        let expiry = expiry.format(SAS_TIME_FORMAT).to_string();
        let resource = format!("/blob/{}/{}/{}", self.account_name, container, blob_name);

        let signature = self.sign(&string_to_sign(permissions, &start, &expiry, &resource))?;

        Ok(format!(
            "sv={}&sr=b&sp={}&st={}&se={}&spr=https&sig={}",
            SAS_VERSION,
            permissions,
            urlencoding::encode(&start),
            urlencoding::encode(&expiry),
            urlencoding::encode(&signature)
        ))
    }

    /// Build a blob-service account SAS granting `permissions` on the
    /// resource types in `resource_types` (`s`ervice, `c`ontainer, `o`bject).
    ///
    /// Container management needs this form; a blob SAS cannot create its
    /// own container.
    pub fn account_sas(
        &self,
        resource_types: &str,
        permissions: &str,
        start: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let start = start.format(SAS_TIME_FORMAT).to_string();
        let expiry = expiry.format(SAS_TIME_FORMAT).to_string();

        let to_sign = account_string_to_sign(
            &self.account_name,
            permissions,
            resource_types,
            &start,
            &expiry,
        );
        let signature = self.sign(&to_sign)?;

        Ok(format!(
            "sv={}&ss=b&srt={}&sp={}&st={}&se={}&spr=https&sig={}",
            SAS_VERSION,
            resource_types,
            permissions,
            urlencoding::encode(&start),
            urlencoding::encode(&expiry),
            urlencoding::encode(&signature)
        ))
    }

    fn sign(&self, to_sign: &str) -> Result<String, StorageError> {
        let mut mac = HmacSha256::new_from_slice(&self.account_key)
            .map_err(|_| invalid("AccountKey cannot be used as a signing key".to_string()))?;
        mac.update(to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Newline-joined field list signed for a blob service SAS. Unused optional
/// fields (identifier, IP, snapshot, encryption scope, response headers)
/// stay empty.
fn string_to_sign(permissions: &str, start: &str, expiry: &str, resource: &str) -> String {
    [
        permissions,
        start,
        expiry,
        resource,
        "", // signed identifier
        "", // signed IP
        "https",
        SAS_VERSION,
        "b",
        "", // snapshot time
        "", // encryption scope
        "", // rscc
        "", // rscd
        "", // rsce
        "", // rscl
        "", // rsct
    ]
    .join("\n")
}

/// Field list signed for an account SAS. Each field, including the last,
/// is newline-terminated.
fn account_string_to_sign(
    account_name: &str,
    permissions: &str,
    resource_types: &str,
    start: &str,
    expiry: &str,
) -> String {
    [
        account_name,
        permissions,
        "b",
        resource_types,
        start,
        expiry,
        "", // signed IP
        "https",
        SAS_VERSION,
        "", // encryption scope
    ]
    .iter()
    .map(|field| format!("{field}\n"))
    .collect()
}

fn invalid(message: String) -> StorageError {
    StorageError::InvalidConnectionString { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // base64("secret-key")
    const CONNECTION_STRING: &str = "DefaultEndpointsProtocol=https;AccountName=docflow;AccountKey=c2VjcmV0LWtleQ==;EndpointSuffix=core.windows.net";

    fn times() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 3, 1, 11, 55, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_parse_connection_string() {
        let creds = StorageCredentials::from_connection_string(CONNECTION_STRING).unwrap();
        assert_eq!(creds.account_name, "docflow");
        assert_eq!(creds.account_key, b"secret-key");
        assert_eq!(creds.blob_endpoint, "https://docflow.blob.core.windows.net");
    }

    #[test]
    fn test_blob_endpoint_override() {
        let creds = StorageCredentials::from_connection_string(
            "AccountName=dev;AccountKey=a2V5;BlobEndpoint=http://127.0.0.1:10000/dev/",
        )
        .unwrap();
        assert_eq!(creds.blob_endpoint, "http://127.0.0.1:10000/dev");
    }

    #[test]
    fn test_invalid_connection_strings() {
        assert!(StorageCredentials::from_connection_string("AccountKey=a2V5").is_err());
        assert!(StorageCredentials::from_connection_string("AccountName=dev").is_err());
        assert!(
            StorageCredentials::from_connection_string("AccountName=dev;AccountKey=***").is_err()
        );
        assert!(StorageCredentials::from_connection_string("garbage").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = StorageCredentials::from_connection_string(CONNECTION_STRING).unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_string_to_sign_layout() {
        let to_sign = string_to_sign(
            "r",
            "2024-03-01T11:55:00Z",
            "2024-03-01T14:00:00Z",
            "/blob/docflow/uploads/a.pdf",
        );
        let fields: Vec<&str> = to_sign.split('\n').collect();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[0], "r");
        assert_eq!(fields[3], "/blob/docflow/uploads/a.pdf");
        assert_eq!(fields[6], "https");
        assert_eq!(fields[7], SAS_VERSION);
        assert_eq!(fields[8], "b");
        assert_eq!(fields[15], "");
    }

    #[test]
    fn test_blob_sas_fields() {
        let creds = StorageCredentials::from_connection_string(CONNECTION_STRING).unwrap();
        let (start, expiry) = times();
        let sas = creds.blob_sas("uploads", "a.pdf", "r", start, expiry).unwrap();

        assert!(sas.starts_with("sv=2021-08-06&sr=b&sp=r&"));
        assert!(sas.contains("st=2024-03-01T11%3A55%3A00Z"));
        assert!(sas.contains("se=2024-03-01T14%3A00%3A00Z"));
        assert!(sas.contains("spr=https"));
        assert!(sas.contains("&sig="));
    }

    #[test]
    fn test_blob_sas_is_deterministic_and_scoped() {
        let creds = StorageCredentials::from_connection_string(CONNECTION_STRING).unwrap();
        let (start, expiry) = times();

        let first = creds.blob_sas("uploads", "a.pdf", "r", start, expiry).unwrap();
        let second = creds.blob_sas("uploads", "a.pdf", "r", start, expiry).unwrap();
        let other_blob = creds.blob_sas("uploads", "b.pdf", "r", start, expiry).unwrap();
        let write = creds.blob_sas("uploads", "a.pdf", "cw", start, expiry).unwrap();

        let sig = |sas: &str| sas.rsplit_once("sig=").unwrap().1.to_string();
        assert_eq!(sig(&first), sig(&second));
        assert_ne!(sig(&first), sig(&other_blob));
        assert_ne!(sig(&first), sig(&write));
    }

    #[test]
    fn test_account_string_to_sign_layout() {
        let to_sign = account_string_to_sign(
            "docflow",
            "c",
            "c",
            "2024-03-01T11:55:00Z",
            "2024-03-01T14:00:00Z",
        );
        assert!(to_sign.ends_with('\n'));
        let fields: Vec<&str> = to_sign.trim_end_matches('\n').split('\n').collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0], "docflow");
        assert_eq!(fields[2], "b");
        assert_eq!(fields[3], "c");
        assert_eq!(fields[7], "https");
        assert_eq!(fields[8], SAS_VERSION);
    }

    #[test]
    fn test_account_sas_fields() {
        let creds = StorageCredentials::from_connection_string(CONNECTION_STRING).unwrap();
        let (start, expiry) = times();
        let sas = creds.account_sas("c", "c", start, expiry).unwrap();

        assert!(sas.starts_with("sv=2021-08-06&ss=b&srt=c&sp=c&"));
        assert!(sas.contains("st=2024-03-01T11%3A55%3A00Z"));
        assert!(sas.contains("&sig="));

        let blob = creds.blob_sas("uploads", "a.pdf", "c", start, expiry).unwrap();
        let sig = |sas: &str| sas.rsplit_once("sig=").unwrap().1.to_string();
        assert_ne!(sig(&sas), sig(&blob));
    }
}
