//! Redis-backed cookie sessions.
//!
//! [`SessionPolicy`] fixes the cookie contract shared with clients:
//! persistent cookie, `SameSite=Lax`, `Secure`, 24 hour lifetime. Callers
//! choose the backing store, never the cookie attributes.

use async_trait::async_trait;
use database::common::{DatabaseResult, RetryConfig, Sleeper};
use database::redis::{create_pool, verify_with_retry, RedisConfig, RedisPool};
use std::fmt;
use std::sync::Arc;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::cookie::SameSite;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, SessionManagerLayer};
use tracing::{debug, info};

/// How long a session lives
pub const SESSION_LIFETIME: Duration = Duration::hours(24);

/// Name of the session cookie
pub const SESSION_COOKIE_NAME: &str = "session";

/// Immutable session and cookie policy
#[derive(Clone, Debug)]
pub struct SessionPolicy {
    lifetime: Duration,
    persist: bool,
    same_site: SameSite,
    secure: bool,
    cookie_name: &'static str,
    store: RedisConfig,
}

impl SessionPolicy {
    /// The policy for a given backing store. Cookie attributes are fixed.
    pub fn new(store: RedisConfig) -> Self {
        Self {
            lifetime: SESSION_LIFETIME,
            persist: true,
            same_site: SameSite::Lax,
            secure: true,
            cookie_name: SESSION_COOKIE_NAME,
            store,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Whether the cookie survives a browser restart
    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    /// Whether the cookie is only sent over encrypted transport
    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn cookie_name(&self) -> &'static str {
        self.cookie_name
    }

    /// Pool descriptor of the backing store
    pub fn store(&self) -> &RedisConfig {
        &self.store
    }

    /// Persistent cookies carry a `Max-Age`; otherwise the cookie ends with the browser session.
    pub fn expiry(&self) -> Expiry {
        if self.persist {
            Expiry::OnInactivity(self.lifetime)
        } else {
            Expiry::OnSessionEnd
        }
    }

    /// Session layer enforcing this policy over any store
    pub fn layer<S>(&self, store: S) -> SessionManagerLayer<S>
    where
        S: SessionStore + Clone,
    {
        SessionManagerLayer::new(store)
            .with_name(self.cookie_name)
            .with_secure(self.secure)
            .with_same_site(self.same_site)
            .with_http_only(true)
            .with_expiry(self.expiry())
    }
}

/// Session store keeping JSON-encoded records in Redis
///
/// Keys are `session:<id>` and expire together with the record.
#[derive(Clone)]
pub struct RedisSessionStore {
    pool: RedisPool,
    key_prefix: &'static str,
}

impl RedisSessionStore {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            key_prefix: "session:",
        }
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    fn key(&self, id: &Id) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Run a blocking command on a pooled connection
    async fn run<T, F>(&self, command: F) -> session_store::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut redis::Connection) -> redis::RedisResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| session_store::Error::Backend(e.to_string()))?;
            command(&mut *conn).map_err(|e| session_store::Error::Backend(e.to_string()))
        })
        .await
        .map_err(|e| session_store::Error::Backend(e.to_string()))?
    }
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("key_prefix", &self.key_prefix)
            .field("pool_size", &self.pool.max_size())
            .finish()
    }
}

/// JSON payload and remaining lifetime in seconds (at least one)
fn encode(record: &Record) -> session_store::Result<(Vec<u8>, i64)> {
    let payload =
        serde_json::to_vec(record).map_err(|e| session_store::Error::Encode(e.to_string()))?;
    let ttl = (record.expiry_date - OffsetDateTime::now_utc())
        .whole_seconds()
        .max(1);
    Ok((payload, ttl))
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    /// Insert a new record without touching existing ones.
    ///
    /// `SET .. NX` refuses to overwrite; on a taken ID a fresh one is drawn
    /// and the insert repeated.
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        loop {
            let key = self.key(&record.id);
            let (payload, ttl) = encode(record)?;

            let inserted: Option<String> = self
                .run(move |conn| {
                    redis::cmd("SET")
                        .arg(&key)
                        .arg(payload)
                        .arg("NX")
                        .arg("EX")
                        .arg(ttl)
                        .query(conn)
                })
                .await?;

            if inserted.is_some() {
                return Ok(());
            }
            debug!("Session id already taken, drawing a new one");
            record.id = Id::default();
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let key = self.key(&record.id);
        let (payload, ttl) = encode(record)?;

        self.run(move |conn| {
            redis::cmd("SET")
                .arg(&key)
                .arg(payload)
                .arg("EX")
                .arg(ttl)
                .query::<()>(conn)
        })
        .await
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        let key = self.key(id);
        let payload: Option<Vec<u8>> = self
            .run(move |conn| redis::cmd("GET").arg(&key).query(conn))
            .await?;

        payload
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| session_store::Error::Decode(e.to_string()))
            })
            .transpose()
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        let key = self.key(id);
        self.run(move |conn| redis::cmd("DEL").arg(&key).query::<()>(conn))
            .await
    }
}

/// Shared, read-only session manager
///
/// Cloning is cheap and every clone refers to the same policy and pool.
#[derive(Clone, Debug)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

#[derive(Debug)]
struct SessionManagerInner {
    policy: SessionPolicy,
    store: RedisSessionStore,
}

impl SessionManager {
    /// Build the pool (lazily, no dial) and wrap it with the policy.
    ///
    /// Fails only when the store address cannot be parsed.
    pub fn new(policy: SessionPolicy) -> DatabaseResult<Self> {
        let pool = create_pool(policy.store())?;
        info!(
            lifetime_hours = policy.lifetime().whole_hours(),
            secure = policy.secure(),
            "Session manager configured"
        );

        Ok(Self {
            inner: Arc::new(SessionManagerInner {
                policy,
                store: RedisSessionStore::new(pool),
            }),
        })
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.inner.policy
    }

    pub fn store(&self) -> &RedisSessionStore {
        &self.inner.store
    }

    /// Layer to put on the router so handlers can extract `tower_sessions::Session`
    pub fn layer(&self) -> SessionManagerLayer<RedisSessionStore> {
        self.inner.policy.layer(self.inner.store.clone())
    }

    /// Eagerly PING the backing store under `retry`
    pub async fn verify<S>(&self, retry: &RetryConfig, sleeper: &S) -> DatabaseResult<()>
    where
        S: Sleeper + ?Sized,
    {
        verify_with_retry(self.inner.store.pool(), retry, sleeper).await
    }

    pub fn ptr_eq(&self, other: &SessionManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
