//! Password verification against stored hashes.
//!
//! The scheme is fixed per deployment and resolved once from the query
//! configuration:
//!
//! - bcrypt, when the bcrypt flag is set (the hash name is then ignored)
//! - `PBKDF2-SHA256`, stored as `pbkdf2_sha256$<iterations>$<salt>$<base64 key>`
//! - a plain message digest (MD5, SHA-1, SHA-2 family) stored as lowercase hex
//!
//! Comparisons run in constant time. Plaintext passwords are never logged.

use crate::error::{StoreError, StoreResult};
use crate::models::QueryConfig;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// The only credential type this provider can validate.
pub const PASSWORD_CREDENTIAL_TYPE: &str = "password";

/// Length in bytes of a stored PBKDF2-SHA256 key.
const PBKDF2_KEY_LEN: usize = 32;

/// Whether credentials of `credential_type` can be validated.
pub fn supports_credential_type(credential_type: &str) -> bool {
    credential_type == PASSWORD_CREDENTIAL_TYPE
}

/// Plain message digests accepted as hash functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Look a digest up by name. Case and hyphens are ignored; `SHA` is SHA-1.
    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "MD5" => Some(Self::Md5),
            "SHA" | "SHA1" => Some(Self::Sha1),
            "SHA224" => Some(Self::Sha224),
            "SHA256" => Some(Self::Sha256),
            "SHA384" => Some(Self::Sha384),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Lowercase hex digest of `input`.
    pub fn hex_digest(&self, input: &[u8]) -> String {
        use sha2::Digest;

        match self {
            Self::Md5 => hex::encode(md5::Md5::digest(input)),
            Self::Sha1 => hex::encode(sha1::Sha1::digest(input)),
            Self::Sha224 => hex::encode(sha2::Sha224::digest(input)),
            Self::Sha256 => hex::encode(sha2::Sha256::digest(input)),
            Self::Sha384 => hex::encode(sha2::Sha384::digest(input)),
            Self::Sha512 => hex::encode(sha2::Sha512::digest(input)),
        }
    }
}

/// Hashing scheme of the stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Bcrypt,
    Pbkdf2Sha256,
    Digest(DigestAlgorithm),
}

impl HashAlgorithm {
    /// Resolve the configured hash name. The bcrypt flag takes precedence.
    pub fn resolve(name: &str, is_bcrypt: bool) -> StoreResult<Self> {
        if is_bcrypt {
            return Ok(Self::Bcrypt);
        }
        if normalize(name) == "PBKDF2SHA256" {
            return Ok(Self::Pbkdf2Sha256);
        }
        DigestAlgorithm::from_name(name)
            .map(Self::Digest)
            .ok_or_else(|| StoreError::unsupported_algorithm(name))
    }

    /// Check `plaintext` against `stored`.
    ///
    /// An empty stored value means there is no record to compare against
    /// and always fails validation.
    pub fn verify(&self, plaintext: &str, stored: &str) -> StoreResult<bool> {
        if stored.is_empty() {
            return Ok(false);
        }
        match self {
            Self::Bcrypt => bcrypt::verify(plaintext, stored).map_err(|e| {
                StoreError::malformed_credential(format!("invalid bcrypt hash: {}", e))
            }),
            Self::Pbkdf2Sha256 => verify_pbkdf2(plaintext, stored),
            Self::Digest(digest) => {
                let computed = digest.hex_digest(plaintext.as_bytes());
                Ok(computed.as_bytes().ct_eq(stored.as_bytes()).into())
            }
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bcrypt => write!(f, "bcrypt"),
            Self::Pbkdf2Sha256 => write!(f, "PBKDF2-SHA256"),
            Self::Digest(digest) => write!(f, "{}", digest.name()),
        }
    }
}

/// Verifier bound to one deployment's hashing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialVerifier {
    algorithm: HashAlgorithm,
}

impl CredentialVerifier {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn from_config(config: &QueryConfig) -> StoreResult<Self> {
        HashAlgorithm::resolve(config.hash_function(), config.is_bcrypt()).map(Self::new)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn verify(&self, plaintext: &str, stored: &str) -> StoreResult<bool> {
        self.algorithm.verify(plaintext, stored)
    }

    /// Verify on the blocking thread pool; bcrypt and PBKDF2 are CPU-bound.
    pub async fn verify_blocking(&self, plaintext: &str, stored: &str) -> StoreResult<bool> {
        let verifier = *self;
        let plaintext = plaintext.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || verifier.verify(&plaintext, &stored))
            .await
            .map_err(|e| StoreError::internal(format!("Task join error: {}", e)))?
    }
}

/// Validate `plaintext` against `stored_hash` under the named scheme.
pub fn validate(
    plaintext: &str,
    stored_hash: &str,
    algorithm_tag: &str,
    is_bcrypt: bool,
) -> StoreResult<bool> {
    HashAlgorithm::resolve(algorithm_tag, is_bcrypt)?.verify(plaintext, stored_hash)
}

fn verify_pbkdf2(plaintext: &str, stored: &str) -> StoreResult<bool> {
    let record = stored.strip_prefix('$').unwrap_or(stored);
    let fields: Vec<&str> = record.split('$').collect();
    if fields.len() != 4 {
        return Err(StoreError::malformed_credential(format!(
            "PBKDF2 record must have 4 '$'-separated fields, found {}",
            fields.len()
        )));
    }

    let iterations = fields[1]
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            StoreError::malformed_credential(format!(
                "invalid PBKDF2 iteration count '{}'",
                fields[1]
            ))
        })?;
    let salt = fields[2].as_bytes();
    let expected = STANDARD.decode(fields[3]).map_err(|e| {
        StoreError::malformed_credential(format!("PBKDF2 key is not valid base64: {}", e))
    })?;

    let mut derived = [0u8; PBKDF2_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), salt, iterations, &mut derived);
    Ok(derived[..].ct_eq(&expected[..]).into())
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HUNTER2_SHA256: &str =
        "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7";

    #[test]
    fn test_resolve_names() {
        assert_eq!(
            HashAlgorithm::resolve("SHA-256", false).unwrap(),
            HashAlgorithm::Digest(DigestAlgorithm::Sha256)
        );
        assert_eq!(
            HashAlgorithm::resolve("sha256", false).unwrap(),
            HashAlgorithm::Digest(DigestAlgorithm::Sha256)
        );
        assert_eq!(
            HashAlgorithm::resolve("SHA", false).unwrap(),
            HashAlgorithm::Digest(DigestAlgorithm::Sha1)
        );
        assert_eq!(
            HashAlgorithm::resolve("pbkdf2-sha256", false).unwrap(),
            HashAlgorithm::Pbkdf2Sha256
        );
        assert_eq!(
            HashAlgorithm::resolve("MD5", true).unwrap(),
            HashAlgorithm::Bcrypt
        );
        assert!(matches!(
            HashAlgorithm::resolve("WHIRLPOOL", false),
            Err(StoreError::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn test_hex_digests() {
        assert_eq!(
            DigestAlgorithm::Sha256.hex_digest(b"hunter2"),
            HUNTER2_SHA256
        );
        assert_eq!(
            DigestAlgorithm::Md5.hex_digest(b"hunter2"),
            "2ab96390c7dbe3439de74d0c9b0b1767"
        );
        assert_eq!(
            DigestAlgorithm::Sha1.hex_digest(b"hunter2"),
            "f3bbbd66a63d4bf1747940578ec3d0103530e21d"
        );
        assert_eq!(
            DigestAlgorithm::Sha512.hex_digest(b"hunter2"),
            "6b97ed68d14eb3f1aa959ce5d49c7dc612e1eb1dafd73b1e705847483fd6a6c8\
             09f2ceb4e8df6ff9984c6298ff0285cace6614bf8daa9f0070101b6c89899e22"
        );
        assert_eq!(
            DigestAlgorithm::Md5.hex_digest(b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_digest_validation() {
        assert!(validate("hunter2", HUNTER2_SHA256, "SHA-256", false).unwrap());
        assert!(!validate("hunter3", HUNTER2_SHA256, "SHA-256", false).unwrap());
        assert!(
            validate(
                "",
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
                "SHA-256",
                false
            )
            .unwrap()
        );
    }

    #[test]
    fn test_digest_comparison_is_case_sensitive() {
        let upper = HUNTER2_SHA256.to_uppercase();
        assert!(!validate("hunter2", &upper, "SHA-256", false).unwrap());
    }

    #[test]
    fn test_empty_stored_hash_fails_for_every_scheme() {
        assert!(!validate("hunter2", "", "SHA-256", false).unwrap());
        assert!(!validate("hunter2", "", "PBKDF2-SHA256", false).unwrap());
        assert!(!validate("hunter2", "", "", true).unwrap());
    }

    #[test]
    fn test_pbkdf2_validation() {
        let stored = "pbkdf2_sha256$1$salt$VawEblbjCJ/sFpHCJUS2BflBhSFt3gRl5oudV8INrLw=";
        assert!(validate("passwd", stored, "PBKDF2-SHA256", false).unwrap());
        assert!(!validate("password", stored, "PBKDF2-SHA256", false).unwrap());

        let stored = "pbkdf2_sha256$1000$NaCl$54bgy+bu5M0DBzosEHWoC4TFGNBxdB3rYzF91R6CahE=";
        assert!(validate("secret", stored, "PBKDF2-SHA256", false).unwrap());
    }

    #[test]
    fn test_pbkdf2_leading_dollar_tolerated() {
        let stored = "$PBKDF2-SHA256$1$s4lt$VDuM2ejpdn+jxZXNT5dYrY5dUgrHEou2+ivvxf0MzZU=";
        assert!(validate("correct horse", stored, "PBKDF2-SHA256", false).unwrap());
    }

    #[test]
    fn test_pbkdf2_malformed_records() {
        for stored in [
            "pbkdf2_sha256$1$salt",
            "pbkdf2_sha256$1$salt$key$extra",
            "pbkdf2_sha256$zero$salt$VawEblbjCJ/sFpHCJUS2BflBhSFt3gRl5oudV8INrLw=",
            "pbkdf2_sha256$0$salt$VawEblbjCJ/sFpHCJUS2BflBhSFt3gRl5oudV8INrLw=",
            "pbkdf2_sha256$1$salt$***",
        ] {
            assert!(
                matches!(
                    validate("passwd", stored, "PBKDF2-SHA256", false),
                    Err(StoreError::MalformedCredentialRecord { .. })
                ),
                "expected malformed: {}",
                stored
            );
        }
    }

    #[test]
    fn test_bcrypt_validation() {
        let stored = bcrypt::hash("hunter2", 4).unwrap();
        assert!(validate("hunter2", &stored, "ignored", true).unwrap());
        assert!(!validate("hunter3", &stored, "ignored", true).unwrap());
    }

    #[test]
    fn test_bcrypt_malformed_hash() {
        assert!(matches!(
            validate("hunter2", "not-a-bcrypt-hash", "", true),
            Err(StoreError::MalformedCredentialRecord { .. })
        ));
    }

    #[test]
    fn test_supports_credential_type() {
        assert!(supports_credential_type("password"));
        assert!(!supports_credential_type("otp"));
    }

    #[tokio::test]
    async fn test_verify_blocking() {
        let verifier = CredentialVerifier::new(HashAlgorithm::Digest(DigestAlgorithm::Sha256));
        assert!(
            verifier
                .verify_blocking("hunter2", HUNTER2_SHA256)
                .await
                .unwrap()
        );
        assert_eq!(verifier.algorithm().to_string(), "SHA-256");
    }
}
