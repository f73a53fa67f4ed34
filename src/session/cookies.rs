//! In-memory session cookie table backed by the credential store.
//!
//! The cache is the authoritative cookie table for the lifetime of the
//! process. Every mutation (recording response cookies, lazy eviction on
//! read, clearing) writes the full table back to the store, so the durable
//! state never diverges from what a subsequent read observes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::store::{CredentialStore, StoredCookies};

/// A single session cookie scoped to a host.
///
/// A cookie is either session-only (`persistent == false`, valid until
/// cleared) or persistent with an expiry. A persistent cookie missing its
/// expiry is never considered valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub persistent: bool,
}

impl SessionCookie {
    /// Build a session-only cookie (no expiry, always valid until cleared).
    pub fn session(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            expires_at: None,
            persistent: false,
        }
    }

    /// Build a persistent cookie with an explicit expiry.
    pub fn persistent(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            expires_at: Some(expires_at),
            persistent: true,
        }
    }

    /// Whether the cookie may still be sent at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.persistent || self.expires_at.is_some_and(|t| t > now)
    }

    /// The `"name=value"` form used on the wire and in the store.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Parse a `Set-Cookie` response header value into a cookie for `host`.
    ///
    /// Only the name/value pair and the `Max-Age`/`Expires` attributes are
    /// interpreted; `Max-Age` wins when both are present. Returns `None`
    /// when the header has no parseable name/value pair.
    pub fn parse_set_cookie(host: &str, header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut max_age: Option<i64> = None;
        let mut expires: Option<DateTime<Utc>> = None;

        for attr in parts {
            let attr = attr.trim();
            let (key, attr_value) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => continue,
            };
            if key.eq_ignore_ascii_case("max-age") {
                max_age = attr_value.parse().ok();
            } else if key.eq_ignore_ascii_case("expires") {
                expires = httpdate::parse_http_date(attr_value)
                    .ok()
                    .map(DateTime::<Utc>::from);
            }
        }

        // An out-of-range Max-Age cannot produce a timestamp; fall back to
        // Expires (or session-only) instead of failing the whole header.
        let expires_at = max_age
            .and_then(Duration::try_seconds)
            .and_then(|age| Utc::now().checked_add_signed(age))
            .or(expires);

        Some(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain: host.to_string(),
            expires_at,
            persistent: expires_at.is_some(),
        })
    }
}

/// Expiry-aware cookie table synchronized with a [`CredentialStore`].
///
/// Mutations are serialized by an internal mutex; the lock is never held
/// across an await point since all store I/O is synchronous.
pub struct SessionCookieCache {
    store: CredentialStore,
    table: Mutex<BTreeMap<String, Vec<SessionCookie>>>,
}

impl SessionCookieCache {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            table: Mutex::new(BTreeMap::new()),
        }
    }

    /// Populate the table from the store.
    ///
    /// Each persisted entry is split on the first `=`; entries without one
    /// are dropped. Rehydrated cookies carry no expiry, so a stored cookie
    /// is valid until the next response replaces it or the table is cleared.
    pub fn initialize(&self) {
        let persisted = self.store.load_all();
        let mut table = self.table.lock().unwrap();
        table.clear();

        let mut dropped = 0usize;
        for (host, entries) in persisted {
            let cookies: Vec<SessionCookie> = entries
                .iter()
                .filter_map(|entry| match entry.split_once('=') {
                    Some((name, value)) => {
                        Some(SessionCookie::session(name, value, host.clone()))
                    }
                    None => {
                        dropped += 1;
                        None
                    }
                })
                .collect();
            if !cookies.is_empty() {
                table.insert(host, cookies);
            }
        }

        if dropped > 0 {
            warn!(dropped, "Dropped malformed persisted cookie entries");
        }
        debug!(hosts = table.len(), "Cookie table initialized from store");
    }

    /// Record cookies received on a response for `host`.
    ///
    /// An incoming cookie always displaces an existing same-name cookie,
    /// then is admitted only if it is still valid. The full table is
    /// persisted afterward; the server may rotate session cookies even on
    /// failed auth attempts, so callers invoke this unconditionally.
    pub fn record_response_cookies(&self, host: &str, cookies: Vec<SessionCookie>) {
        if cookies.is_empty() {
            return;
        }

        let now = Utc::now();
        {
            let mut table = self.table.lock().unwrap();
            let host_cookies = table.entry(host.to_string()).or_default();
            for cookie in cookies {
                host_cookies.retain(|existing| existing.name != cookie.name);
                if cookie.is_valid_at(now) {
                    host_cookies.push(cookie);
                } else {
                    debug!(name = %cookie.name, host, "Rejected expired response cookie");
                }
            }
            if host_cookies.is_empty() {
                table.remove(host);
            }
            self.persist(&table);
        }
    }

    /// Cookies to attach to an outgoing request for `host`.
    ///
    /// Expired cookies are evicted lazily: if filtering removed anything,
    /// the shrunk table is persisted before returning.
    pub fn cookies_for_request(&self, host: &str) -> Vec<SessionCookie> {
        let now = Utc::now();
        let mut table = self.table.lock().unwrap();

        let Some(host_cookies) = table.get(host) else {
            return Vec::new();
        };

        let valid: Vec<SessionCookie> = host_cookies
            .iter()
            .filter(|c| c.is_valid_at(now))
            .cloned()
            .collect();

        if valid.len() != host_cookies.len() {
            debug!(
                host,
                evicted = host_cookies.len() - valid.len(),
                "Evicted expired cookies on read"
            );
            if valid.is_empty() {
                table.remove(host);
            } else {
                table.insert(host.to_string(), valid.clone());
            }
            self.persist(&table);
        }

        valid
    }

    /// True iff at least one host has at least one valid cookie.
    ///
    /// This is the sole signal used to derive "is logged in".
    pub fn has_any_cookies(&self) -> bool {
        let now = Utc::now();
        let table = self.table.lock().unwrap();
        table
            .values()
            .any(|cookies| cookies.iter().any(|c| c.is_valid_at(now)))
    }

    /// Empty the table and the durable store (used on logout).
    pub fn clear(&self) -> Result<()> {
        let mut table = self.table.lock().unwrap();
        table.clear();
        self.store.clear()
    }

    fn persist(&self, table: &BTreeMap<String, Vec<SessionCookie>>) {
        let mut entries = StoredCookies::new();
        for (host, cookies) in table {
            let pairs: BTreeSet<String> = cookies.iter().map(|c| c.pair()).collect();
            if !pairs.is_empty() {
                entries.insert(host.clone(), pairs);
            }
        }
        if let Err(e) = self.store.save(&entries) {
            warn!(error = %e, "Failed to persist cookie table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "www.wanandroid.com";

    fn cache_in(dir: &std::path::Path) -> SessionCookieCache {
        let cache = SessionCookieCache::new(CredentialStore::new(dir.to_path_buf()));
        cache.initialize();
        cache
    }

    fn expired(name: &str, value: &str) -> SessionCookie {
        SessionCookie::persistent(name, value, HOST, Utc::now() - Duration::hours(1))
    }

    fn unexpired(name: &str, value: &str) -> SessionCookie {
        SessionCookie::persistent(name, value, HOST, Utc::now() + Duration::hours(1))
    }

    #[test]
    fn records_and_returns_cookies_unique_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(
            HOST,
            vec![
                SessionCookie::session("JSESSIONID", "first", HOST),
                SessionCookie::session("token_pass", "tok", HOST),
            ],
        );
        cache.record_response_cookies(
            HOST,
            vec![SessionCookie::session("JSESSIONID", "second", HOST)],
        );

        let cookies = cache.cookies_for_request(HOST);
        assert_eq!(cookies.len(), 2);
        let session = cookies.iter().find(|c| c.name == "JSESSIONID").unwrap();
        assert_eq!(session.value, "second");
    }

    #[test]
    fn expired_persistent_cookie_is_never_returned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(HOST, vec![expired("stale", "v")]);
        assert!(cache.cookies_for_request(HOST).is_empty());
        assert!(!cache.has_any_cookies());
    }

    #[test]
    fn replacement_cookie_can_expire_the_old_one() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(HOST, vec![unexpired("JSESSIONID", "live")]);
        // Server rotates the cookie to an already-expired one: the old value
        // must be displaced and the new one rejected.
        cache.record_response_cookies(HOST, vec![expired("JSESSIONID", "dead")]);

        assert!(cache.cookies_for_request(HOST).is_empty());
    }

    #[test]
    fn lazy_eviction_persists_the_shrunk_table() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(
            HOST,
            vec![
                SessionCookie::session("keep", "1", HOST),
                // Valid for a moment, then expired by the time we read.
                SessionCookie::persistent("doomed", "2", HOST, Utc::now() + Duration::milliseconds(1)),
            ],
        );

        std::thread::sleep(std::time::Duration::from_millis(10));
        let cookies = cache.cookies_for_request(HOST);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "keep");

        // A fresh cache over the same store must not resurrect the evicted cookie.
        let reloaded = cache_in(dir.path());
        let names: Vec<String> = reloaded
            .cookies_for_request(HOST)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["keep".to_string()]);
    }

    #[test]
    fn restart_reproduces_the_persisted_table() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(
            HOST,
            vec![
                SessionCookie::session("JSESSIONID", "abc", HOST),
                unexpired("token_pass", "xyz"),
            ],
        );

        // Process restart simulation
        let reloaded = cache_in(dir.path());
        assert!(reloaded.has_any_cookies());

        let mut pairs: Vec<String> = reloaded
            .cookies_for_request(HOST)
            .iter()
            .map(|c| c.pair())
            .collect();
        pairs.sort();
        assert_eq!(pairs, vec!["JSESSIONID=abc", "token_pass=xyz"]);
    }

    #[test]
    fn malformed_persisted_entries_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().to_path_buf());
        let mut entries = StoredCookies::new();
        entries.insert(
            HOST.to_string(),
            ["JSESSIONID=ok", "garbage-without-separator"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        store.save(&entries).unwrap();

        let cache = cache_in(dir.path());
        let cookies = cache.cookies_for_request(HOST);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].pair(), "JSESSIONID=ok");
    }

    #[test]
    fn value_may_contain_equals_signs() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(
            HOST,
            vec![SessionCookie::session("token", "a=b=c", HOST)],
        );

        let reloaded = cache_in(dir.path());
        let cookies = reloaded.cookies_for_request(HOST);
        assert_eq!(cookies[0].name, "token");
        assert_eq!(cookies[0].value, "a=b=c");
    }

    #[test]
    fn clear_empties_table_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.record_response_cookies(HOST, vec![SessionCookie::session("k", "v", HOST)]);
        assert!(cache.has_any_cookies());

        cache.clear().unwrap();
        assert!(!cache.has_any_cookies());
        assert!(cache.cookies_for_request(HOST).is_empty());

        let reloaded = cache_in(dir.path());
        assert!(!reloaded.has_any_cookies());
    }

    #[test]
    fn parse_set_cookie_session_only() {
        let cookie = SessionCookie::parse_set_cookie(HOST, "JSESSIONID=abc123; Path=/; HttpOnly").unwrap();
        assert_eq!(cookie.name, "JSESSIONID");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.domain, HOST);
        assert!(!cookie.persistent);
        assert!(cookie.is_valid_at(Utc::now()));
    }

    #[test]
    fn parse_set_cookie_max_age_wins_over_expires() {
        let cookie = SessionCookie::parse_set_cookie(
            HOST,
            "token=tok; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Max-Age=3600",
        )
        .unwrap();
        assert!(cookie.persistent);
        // Max-Age is relative to now, so the 2015 Expires date must be ignored
        assert!(cookie.is_valid_at(Utc::now()));
    }

    #[test]
    fn parse_set_cookie_expires_in_the_past() {
        let cookie = SessionCookie::parse_set_cookie(
            HOST,
            "token=tok; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
        )
        .unwrap();
        assert!(cookie.persistent);
        assert!(!cookie.is_valid_at(Utc::now()));
    }

    #[test]
    fn parse_set_cookie_out_of_range_max_age_yields_no_expiry() {
        let cookie = SessionCookie::parse_set_cookie(
            HOST,
            "token=tok; Max-Age=9223372036854775807",
        )
        .unwrap();
        assert!(cookie.expires_at.is_none());
        assert!(!cookie.persistent);
        assert!(cookie.is_valid_at(Utc::now()));

        // With a parseable Expires alongside, the fallback applies
        let cookie = SessionCookie::parse_set_cookie(
            HOST,
            "token=tok; Max-Age=9223372036854775807; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
        )
        .unwrap();
        assert!(cookie.persistent);
        assert!(!cookie.is_valid_at(Utc::now()));
    }

    #[test]
    fn parse_set_cookie_rejects_garbage() {
        assert!(SessionCookie::parse_set_cookie(HOST, "no-separator-here").is_none());
        assert!(SessionCookie::parse_set_cookie(HOST, "=value-without-name").is_none());
        assert!(SessionCookie::parse_set_cookie(HOST, "").is_none());
    }
}
