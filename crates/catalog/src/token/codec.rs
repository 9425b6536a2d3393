//! Resumption token wire format.
//!
//! A token is nine `!`-separated fields:
//!
//! ```text
//! {id}!{kind}!{position}!{returned}!{total}!{prefix}!{set}!{from}!{until}
//! ```
//!
//! Numeric fields are decimal. String fields are base64url without padding,
//! so set names may contain any character. An absent value is written as
//! `~`, which is outside the base64url alphabet and therefore never collides
//! with an encoded string (including the empty string, which encodes to an
//! empty field).

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::error::{OaiError, OaiResult};
use crate::types::HarvestQuery;

const SEPARATOR: char = '!';
const ABSENT: &str = "~";
const FIELD_COUNT: usize = 9;

/// What a token continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A record listing that can be rebuilt from the embedded query.
    Replay,
    /// A record listing backed by a held server-side cursor.
    Live,
    /// A set listing.
    Sets,
}

impl TokenKind {
    fn as_char(self) -> char {
        match self {
            TokenKind::Replay => 'r',
            TokenKind::Live => 'l',
            TokenKind::Sets => 's',
        }
    }

    fn parse(field: &str) -> Option<Self> {
        match field {
            "r" => Some(TokenKind::Replay),
            "l" => Some(TokenKind::Live),
            "s" => Some(TokenKind::Sets),
            _ => None,
        }
    }
}

/// The decoded contents of a resumption token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionToken {
    /// Unique id; the token table key.
    pub id: u64,
    /// What the token continues.
    pub kind: TokenKind,
    /// Where the listing continues in the catalog's natural order.
    pub position: usize,
    /// Items returned by all earlier pages.
    pub returned: usize,
    /// Size of the complete list, when known.
    pub total: Option<usize>,
    /// Requested format; absent for set listings.
    pub metadata_prefix: Option<String>,
    /// Set filter.
    pub set: Option<String>,
    /// Normalized lower datestamp bound.
    pub from: Option<String>,
    /// Normalized upper datestamp bound.
    pub until: Option<String>,
}

impl ResumptionToken {
    /// Creates a record-listing token for a query.
    pub fn for_query(
        kind: TokenKind,
        query: &HarvestQuery,
        position: usize,
        returned: usize,
        total: Option<usize>,
    ) -> Self {
        Self {
            id: 0,
            kind,
            position,
            returned,
            total,
            metadata_prefix: Some(query.metadata_prefix.clone()),
            set: query.set.clone(),
            from: Some(query.from.clone()),
            until: Some(query.until.clone()),
        }
    }

    /// Creates a set-listing token.
    pub fn for_sets(position: usize, returned: usize, total: usize) -> Self {
        Self {
            id: 0,
            kind: TokenKind::Sets,
            position,
            returned,
            total: Some(total),
            metadata_prefix: None,
            set: None,
            from: None,
            until: None,
        }
    }

    /// Sets the id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Rebuilds the query embedded in a record-listing token.
    pub fn query(&self) -> OaiResult<HarvestQuery> {
        match (&self.metadata_prefix, &self.from, &self.until) {
            (Some(prefix), Some(from), Some(until)) => Ok(HarvestQuery {
                from: from.clone(),
                until: until.clone(),
                set: self.set.clone(),
                metadata_prefix: prefix.clone(),
            }),
            _ => Err(OaiError::bad_token("token carries no query")),
        }
    }

    /// Encodes the token as an opaque string.
    pub fn encode(&self) -> String {
        let total = self
            .total
            .map_or_else(|| ABSENT.to_string(), |t| t.to_string());
        [
            self.id.to_string(),
            self.kind.as_char().to_string(),
            self.position.to_string(),
            self.returned.to_string(),
            total,
            encode_text(self.metadata_prefix.as_deref()),
            encode_text(self.set.as_deref()),
            encode_text(self.from.as_deref()),
            encode_text(self.until.as_deref()),
        ]
        .join(&SEPARATOR.to_string())
    }

    /// Decodes a token string.
    ///
    /// Any structural problem is reported as [`OaiError::BadResumptionToken`].
    pub fn decode(token: &str) -> OaiResult<Self> {
        let fields: Vec<&str> = token.split(SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(OaiError::bad_token("wrong number of fields"));
        }

        let kind = TokenKind::parse(fields[1])
            .ok_or_else(|| OaiError::bad_token(format!("unknown kind '{}'", fields[1])))?;
        let total = match fields[4] {
            ABSENT => None,
            field => Some(decode_number(field)?),
        };

        Ok(Self {
            id: decode_number(fields[0])?,
            kind,
            position: decode_number(fields[2])?,
            returned: decode_number(fields[3])?,
            total,
            metadata_prefix: decode_text(fields[5])?,
            set: decode_text(fields[6])?,
            from: decode_text(fields[7])?,
            until: decode_text(fields[8])?,
        })
    }
}

impl fmt::Display for ResumptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn encode_text(value: Option<&str>) -> String {
    match value {
        Some(text) => URL_SAFE_NO_PAD.encode(text.as_bytes()),
        None => ABSENT.to_string(),
    }
}

fn decode_text(field: &str) -> OaiResult<Option<String>> {
    if field == ABSENT {
        return Ok(None);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(field)
        .map_err(|e| OaiError::bad_token(format!("invalid encoding: {e}")))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| OaiError::bad_token("invalid utf-8"))
}

fn decode_number<T: std::str::FromStr>(field: &str) -> OaiResult<T> {
    field
        .parse()
        .map_err(|_| OaiError::bad_token(format!("invalid number '{field}'")))
}
