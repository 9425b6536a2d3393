//! The token table.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::ResumeCursor;
use crate::error::{OaiError, OaiResult};

use super::codec::{ResumptionToken, TokenKind};
use super::id::TokenIdGenerator;

struct StoredToken {
    encoded: String,
    cursor: Option<ResumeCursor>,
    issued: Instant,
}

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// The opaque token string.
    pub token: String,
    /// When the server-side entry expires; `None` with unlimited TTL.
    pub expiration_date: Option<DateTime<Utc>>,
}

/// The outcome of resolving a token string.
#[derive(Debug)]
pub struct ResolvedToken {
    /// The decoded token.
    pub token: ResumptionToken,
    /// The cursor to continue from; `None` for set listings.
    pub cursor: Option<ResumeCursor>,
}

/// A TTL-aware table of outstanding resumption tokens.
///
/// Each entry is single use: [`TokenStore::resolve`] removes it under the
/// table lock, so of several concurrent resolvers exactly one receives the
/// stored cursor. Purging takes the same lock, so an entry is never both
/// purged and returned.
pub struct TokenStore {
    ttl: Option<Duration>,
    ids: TokenIdGenerator,
    entries: Mutex<HashMap<u64, StoredToken>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("ttl", &self.ttl)
            .field("live_tokens", &self.len())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Creates a table; `None` keeps tokens until used.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            ids: TokenIdGenerator::new(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The configured time to live.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no tokens are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Assigns an id to `token`, stores `cursor` under it and returns the token string.
    pub fn issue(&self, token: ResumptionToken, cursor: Option<ResumeCursor>) -> IssuedToken {
        let token = token.with_id(self.ids.next_id());
        let encoded = token.encode();
        let issued = Instant::now();
        let expiration_date = self.ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        });

        self.entries.lock().insert(
            token.id,
            StoredToken {
                encoded: encoded.clone(),
                cursor,
                issued,
            },
        );
        debug!(id = token.id, kind = ?token.kind, position = token.position, "Issued resumption token");

        IssuedToken {
            token: encoded,
            expiration_date,
        }
    }

    /// Resolves a token string into the state it continues.
    ///
    /// A stored entry is removed and its cursor returned. When no usable entry
    /// exists (already used, expired, purged, or issued by another process),
    /// a replayable token is rebuilt from its embedded query if `replayable`
    /// is true; anything else fails with [`OaiError::BadResumptionToken`].
    pub fn resolve(&self, token: &str, replayable: bool) -> OaiResult<ResolvedToken> {
        let decoded = ResumptionToken::decode(token)?;

        if let Some(cursor) = self.take(decoded.id, token) {
            return Ok(ResolvedToken {
                token: decoded,
                cursor,
            });
        }

        match decoded.kind {
            TokenKind::Sets => Ok(ResolvedToken {
                token: decoded,
                cursor: None,
            }),
            TokenKind::Replay if replayable => {
                let query = decoded.query()?;
                warn!(id = decoded.id, position = decoded.position, "Replaying resumption token from its parameters");
                let cursor = ResumeCursor::Replay {
                    query,
                    position: decoded.position,
                };
                Ok(ResolvedToken {
                    token: decoded,
                    cursor: Some(cursor),
                })
            }
            TokenKind::Replay | TokenKind::Live => {
                warn!(id = decoded.id, kind = ?decoded.kind, "Resumption token is not held and cannot be replayed");
                Err(OaiError::bad_token(
                    "token has expired or was already used",
                ))
            }
        }
    }

    /// Removes the entry for `id` if it matches `encoded` and has not expired.
    ///
    /// The outer option is the presence of a usable entry; the inner one is
    /// its cursor.
    fn take(&self, id: u64, encoded: &str) -> Option<Option<ResumeCursor>> {
        let mut entries = self.entries.lock();
        let matches = entries.get(&id).is_some_and(|e| e.encoded == encoded);
        if !matches {
            return None;
        }
        let entry = entries.remove(&id)?;
        if self.is_expired(&entry, Instant::now()) {
            debug!(id, "Resumption token expired before use");
            return None;
        }
        Some(entry.cursor)
    }

    /// Evicts every entry whose age exceeds the TTL; returns how many were evicted.
    pub fn purge_expired(&self, now: Instant) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "Purged expired resumption tokens");
        }
        purged
    }

    fn is_expired(&self, entry: &StoredToken, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.issued) >= ttl)
    }
}
