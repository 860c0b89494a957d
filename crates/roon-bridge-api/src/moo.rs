//! MOO/1 message framing.
//!
//! Every WebSocket frame exchanged with a Roon core carries exactly one MOO
//! message: a first line `MOO/1 <VERB> <name>`, `Key: value` header lines,
//! a blank line, then an optional body whose length is given by
//! `Content-Length`.
//!
//! ```text
//! MOO/1 REQUEST com.roonlabs.transport:2/mute
//! Request-Id: 7
//! Content-Length: 37
//! Content-Type: application/json
//!
//! {"output_id":"1701b9ea","how":"mute"}
//! ```

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

const MOO_VERSION: &str = "MOO/1";
const JSON_CONTENT_TYPE: &str = "application/json";

// ── Verb ─────────────────────────────────────────────────────────────

/// The three MOO verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// A call; expects one `COMPLETE` or a series of `CONTINUE` replies.
    Request,
    /// An intermediate reply on a subscription-style request.
    Continue,
    /// The final reply to a request.
    Complete,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Continue => "CONTINUE",
            Self::Complete => "COMPLETE",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "REQUEST" => Some(Self::Request),
            "CONTINUE" => Some(Self::Continue),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── MooMessage ───────────────────────────────────────────────────────

/// One decoded MOO message.
///
/// For requests `name` is the endpoint (`service/method`); for replies it
/// is the reply name (`Success`, `Subscribed`, `Changed`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct MooMessage {
    pub verb: Verb,
    pub name: String,
    pub request_id: u64,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl MooMessage {
    /// A bodyless request to `endpoint`.
    pub fn request(request_id: u64, endpoint: impl Into<String>) -> Self {
        Self {
            verb: Verb::Request,
            name: endpoint.into(),
            request_id,
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// A bodyless reply to the request with `request_id`.
    pub fn reply(verb: Verb, name: impl Into<String>, request_id: u64) -> Self {
        Self {
            verb,
            name: name.into(),
            request_id,
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        let encoded = serde_json::to_vec(body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        self.content_type = Some(JSON_CONTENT_TYPE.to_owned());
        self.body = Bytes::from(encoded);
        Ok(self)
    }

    /// Serialize to the wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut head = format!(
            "{MOO_VERSION} {} {}\nRequest-Id: {}\n",
            self.verb, self.name, self.request_id
        );
        if !self.body.is_empty() {
            let content_type = self.content_type.as_deref().unwrap_or(JSON_CONTENT_TYPE);
            head.push_str(&format!(
                "Content-Length: {}\nContent-Type: {content_type}\n",
                self.body.len()
            ));
        }
        head.push('\n');

        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse one frame.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        let header_end = data
            .windows(2)
            .position(|w| w == b"\n\n")
            .ok_or_else(|| Error::Protocol("missing header terminator".into()))?;
        let header = std::str::from_utf8(&data[..header_end])
            .map_err(|_| Error::Protocol("header is not valid UTF-8".into()))?;

        let mut lines = header.lines();
        let first = lines
            .next()
            .ok_or_else(|| Error::Protocol("empty message".into()))?;
        let mut parts = first.splitn(3, ' ');
        if parts.next() != Some(MOO_VERSION) {
            return Err(Error::Protocol(format!("bad first line: {first:?}")));
        }
        let verb = parts
            .next()
            .and_then(Verb::parse)
            .ok_or_else(|| Error::Protocol(format!("bad verb in {first:?}")))?;
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Protocol(format!("missing name in {first:?}")))?
            .to_owned();

        let mut request_id = None;
        let mut content_length = None;
        let mut content_type = None;
        for line in lines {
            let Some((key, value)) = line.split_once(':') else {
                return Err(Error::Protocol(format!("bad header line: {line:?}")));
            };
            let value = value.trim();
            match key {
                "Request-Id" => {
                    request_id = Some(value.parse::<u64>().map_err(|_| {
                        Error::Protocol(format!("bad Request-Id: {value:?}"))
                    })?);
                }
                "Content-Length" => {
                    content_length = Some(value.parse::<usize>().map_err(|_| {
                        Error::Protocol(format!("bad Content-Length: {value:?}"))
                    })?);
                }
                "Content-Type" => content_type = Some(value.to_owned()),
                _ => {}
            }
        }

        let request_id =
            request_id.ok_or_else(|| Error::Protocol("missing Request-Id header".into()))?;

        let rest = &data[header_end + 2..];
        let body = match content_length {
            Some(len) => {
                let slice = rest.get(..len).ok_or_else(|| {
                    Error::Protocol(format!(
                        "body shorter than Content-Length ({} < {len})",
                        rest.len()
                    ))
                })?;
                Bytes::copy_from_slice(slice)
            }
            None => Bytes::new(),
        };

        Ok(Self {
            verb,
            name,
            request_id,
            content_type,
            body,
        })
    }

    /// Deserialize the body as JSON. An absent body reads as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let raw: &[u8] = if self.body.is_empty() { b"{}" } else { &self.body };
        serde_json::from_slice(raw).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::from_utf8_lossy(raw).into_owned(),
        })
    }

    /// Split a request name into `(service, method)`.
    pub fn endpoint(&self) -> Option<(&str, &str)> {
        self.name.rsplit_once('/')
    }
}

// ── Tests ────────────────────────────────────────────────────────────
