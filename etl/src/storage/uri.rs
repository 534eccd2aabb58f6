use common::{Error, Result};
use std::fmt;
use std::str::FromStr;

const SCHEME_SEPARATOR: &str = "://";

/// Address of a stored object, rendered as `<scheme>://<bucket>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    scheme: String,
    bucket: String,
    key: String,
}

impl StorageUri {
    pub fn new(scheme: &str, bucket: &str, key: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Whether `reference` looks like a storage URI rather than a local path:
    /// it must open with a scheme name followed by `://`.
    pub fn is_uri(reference: &str) -> bool {
        reference
            .split_once(SCHEME_SEPARATOR)
            .is_some_and(|(scheme, _)| is_scheme(scheme))
    }

    /// Splits on the first `/` after the scheme: everything before is the
    /// bucket, everything after is the key.
    ///
    /// The key must be relative and free of empty, `.` or `..` segments since
    /// it is later mirrored onto the local filesystem.
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| Error::malformed_uri(uri, "missing '://' scheme separator"))?;

        if scheme.is_empty() {
            return Err(Error::malformed_uri(uri, "missing scheme"));
        }
        if !is_scheme(scheme) {
            return Err(Error::malformed_uri(uri, "invalid scheme"));
        }

        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| Error::malformed_uri(uri, "missing object key"))?;

        if bucket.is_empty() {
            return Err(Error::malformed_uri(uri, "missing bucket"));
        }
        if key.is_empty() {
            return Err(Error::malformed_uri(uri, "missing object key"));
        }
        if key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(Error::malformed_uri(
                uri,
                "object key contains an empty or relative path segment",
            ));
        }

        Ok(Self::new(scheme, bucket, key))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A letter followed by letters, digits, `+`, `-` or `.`.
fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

impl FromStr for StorageUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
