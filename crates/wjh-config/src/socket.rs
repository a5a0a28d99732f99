use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const UNIX_SCHEME: &str = "unix://";

/// Filesystem location of a Unix domain socket used by the daemon.
///
/// Accepts either a bare path or a `unix://` URL when parsed from text, and
/// always displays as the bare path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct SocketPath(Utf8PathBuf);

impl SocketPath {
    /// Wraps a filesystem path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    /// Borrows the socket path.
    #[must_use]
    pub fn as_path(&self) -> &Utf8Path {
        self.0.as_path()
    }

    /// Ensures the socket's parent directory exists with restrictive permissions.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(parent) = self
            .0
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
        else {
            return Err(SocketPreparationError::MissingParent {
                path: self.0.clone(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl AsRef<Utf8Path> for SocketPath {
    fn as_ref(&self) -> &Utf8Path {
        self.as_path()
    }
}

impl fmt::Display for SocketPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for SocketPath {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let path = match trimmed.strip_prefix(UNIX_SCHEME) {
            Some(rest) => rest,
            None if trimmed.contains("://") => {
                return Err(SocketParseError::UnsupportedScheme(input.to_owned()));
            }
            None => trimmed,
        };
        if path.is_empty() {
            return Err(SocketParseError::MissingPath(input.to_owned()));
        }
        Ok(Self::new(path))
    }
}

impl TryFrom<String> for SocketPath {
    type Error = SocketParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SocketPath> for String {
    fn from(value: SocketPath) -> Self {
        value.0.into_string()
    }
}

/// Errors encountered while parsing a [`SocketPath`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SocketParseError {
    /// A URL scheme other than `unix://` was supplied.
    #[error("unsupported socket scheme in '{0}'; only unix sockets are served")]
    UnsupportedScheme(String),
    /// The path component was empty.
    #[error("missing Unix socket path in '{0}'")]
    MissingPath(String),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Socket path without a parent.
        path: Utf8PathBuf,
    },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Socket directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/var/run/wjh/wjh.sock", "/var/run/wjh/wjh.sock")]
    #[case("unix:///tmp/wjh.sock", "/tmp/wjh.sock")]
    #[case("  relative.sock ", "relative.sock")]
    fn parses_paths_and_unix_urls(#[case] input: &str, #[case] expected: &str) {
        let socket: SocketPath = input.parse().expect("socket should parse");
        assert_eq!(socket.as_path(), Utf8Path::new(expected));
        assert_eq!(socket.to_string(), expected);
    }

    #[rstest]
    #[case("tcp://127.0.0.1:9000")]
    #[case("unix://")]
    #[case("")]
    fn rejects_unusable_input(#[case] input: &str) {
        assert!(input.parse::<SocketPath>().is_err());
    }

    #[test]
    fn prepare_filesystem_creates_private_parent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let socket = SocketPath::new(root.join("nested/run/wjh.sock"));

        socket.prepare_filesystem().expect("directory should be created");
        socket
            .prepare_filesystem()
            .expect("existing directory should be accepted");

        let metadata = std::fs::metadata(root.join("nested/run")).expect("metadata");
        assert!(metadata.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(metadata.permissions().mode() & 0o777, 0o700);
        }
    }

    #[test]
    fn prepare_filesystem_rejects_bare_file_name() {
        let socket = SocketPath::new("wjh.sock");
        let error = socket
            .prepare_filesystem()
            .expect_err("bare name has no parent");
        assert!(matches!(error, SocketPreparationError::MissingParent { .. }));
    }
}
