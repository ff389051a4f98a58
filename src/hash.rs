//! Password and auth-key hashing for the XMO login exchange.
//!
//! The gateway never receives the password itself. Every request carries an
//! `auth-key` derived from the password hash, the server nonce handed out at
//! login, the request counter and a client nonce. Which digest is used is the
//! gateway's choice; most firmware expects SHA-512, older builds MD5.

use std::fmt;

use clap::ValueEnum;
use md5::Md5;
use serde::Deserialize;
use sha2::{Digest, Sha512};

/// Digest used for the credential and auth-key hashes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[serde(alias = "MD5")]
    Md5,
    #[default]
    #[serde(alias = "SHA512")]
    Sha512,
}

impl AuthMethod {
    /// Hash `value` and return lowercase hex.
    pub fn digest(self, value: &str) -> String {
        match self {
            AuthMethod::Md5 => hex::encode(Md5::digest(value.as_bytes())),
            AuthMethod::Sha512 => hex::encode(Sha512::digest(value.as_bytes())),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Md5 => f.write_str("md5"),
            AuthMethod::Sha512 => f.write_str("sha512"),
        }
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <AuthMethod as ValueEnum>::from_str(s, true)
            .map_err(|_| format!("unknown auth method '{s}' (expected md5 or sha512)"))
    }
}

/// Lowercase hex, the form the gateway expects inside auth keys.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().fold(
            String::with_capacity(bytes.as_ref().len() * 2),
            |mut s, b| {
                use std::fmt::Write;
                let _ = write!(s, "{b:02x}");
                s
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_string() {
        assert_eq!(AuthMethod::Md5.digest(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn sha512_of_abc() {
        assert_eq!(
            AuthMethod::Sha512.digest("abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("SHA512".parse::<AuthMethod>(), Ok(AuthMethod::Sha512));
        assert_eq!("md5".parse::<AuthMethod>(), Ok(AuthMethod::Md5));
        assert!("sha1".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn deserialize_accepts_upper_and_lower_case() {
        let m: AuthMethod = serde_yaml::from_str("MD5").unwrap();
        assert_eq!(m, AuthMethod::Md5);
        let m: AuthMethod = serde_yaml::from_str("sha512").unwrap();
        assert_eq!(m, AuthMethod::Sha512);
    }

    #[test]
    fn default_is_sha512() {
        assert_eq!(AuthMethod::default(), AuthMethod::Sha512);
        assert_eq!(AuthMethod::default().to_string(), "sha512");
    }
}
