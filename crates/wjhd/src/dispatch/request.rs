//! Request line parsing.
//!
//! A request is a single line of whitespace-separated `key=value` tokens:
//!
//! ```text
//! request=pull channel=forwarding channel=acl
//! ```
//!
//! `channel` may repeat; unknown keys are ignored.

use std::collections::BTreeSet;

use thiserror::Error;

const REQUEST_KEY: &str = "request";
const CHANNEL_KEY: &str = "channel";
const PULL: &str = "pull";

/// Reasons a request line is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A token is not a single `key=value` pair with both sides non-empty.
    #[error("malformed token '{token}'")]
    MalformedToken {
        /// The offending token.
        token: String,
    },
    /// The request names no channel.
    #[error("request names no channel")]
    NoChannels,
    /// No `request` key was given.
    #[error("request type missing")]
    MissingRequest,
    /// The `request` value is not understood.
    #[error("unsupported request '{request}'")]
    UnsupportedRequest {
        /// The request type given.
        request: String,
    },
}

/// A request to pull and render the named channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Channel names in lexical order, without duplicates.
    pub channels: BTreeSet<String>,
}

/// Parses one request line. Surrounding whitespace, including the trailing
/// newline, is ignored.
pub fn parse_request(line: &str) -> Result<PullRequest, RequestError> {
    let mut request = None;
    let mut channels = BTreeSet::new();
    for token in line.split_whitespace() {
        let (key, value) = split_token(token)?;
        match key {
            REQUEST_KEY => request = Some(value),
            CHANNEL_KEY => {
                channels.insert(value.to_owned());
            }
            _ => {}
        }
    }
    if channels.is_empty() {
        return Err(RequestError::NoChannels);
    }
    match request {
        Some(PULL) => Ok(PullRequest { channels }),
        Some(other) => Err(RequestError::UnsupportedRequest {
            request: other.to_owned(),
        }),
        None => Err(RequestError::MissingRequest),
    }
}

fn split_token(token: &str) -> Result<(&str, &str), RequestError> {
    let malformed = || RequestError::MalformedToken {
        token: token.to_owned(),
    };
    let (key, value) = token.split_once('=').ok_or_else(malformed)?;
    if key.is_empty() || value.is_empty() || value.contains('=') {
        return Err(malformed());
    }
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("request=pull channel=forwarding\n", &["forwarding"])]
    #[case("channel=l1 request=pull channel=acl", &["acl", "l1"])]
    #[case("request=pull channel=acl channel=acl", &["acl"])]
    #[case("request=pull channel=acl format=table", &["acl"])]
    fn parses_pull_requests(#[case] line: &str, #[case] expected: &[&str]) {
        let request = parse_request(line).expect("valid request");
        assert_eq!(
            request.channels.iter().map(String::as_str).collect::<Vec<_>>(),
            expected
        );
    }

    #[rstest]
    #[case("request=pull channel", RequestError::MalformedToken { token: "channel".to_owned() })]
    #[case("request=pull =acl", RequestError::MalformedToken { token: "=acl".to_owned() })]
    #[case("request=pull channel=", RequestError::MalformedToken { token: "channel=".to_owned() })]
    #[case("request=pull channel=a=b", RequestError::MalformedToken { token: "channel=a=b".to_owned() })]
    #[case("request=pull", RequestError::NoChannels)]
    #[case("", RequestError::NoChannels)]
    #[case("channel=acl", RequestError::MissingRequest)]
    #[case("request=push channel=acl", RequestError::UnsupportedRequest { request: "push".to_owned() })]
    fn rejects_malformed_requests(#[case] line: &str, #[case] expected: RequestError) {
        assert_eq!(parse_request(line), Err(expected));
    }
}
