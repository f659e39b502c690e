use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Default session lifetime: 24 hours in seconds
pub const SESSION_DURATION: u64 = 24 * 60 * 60;

/// Name of the cookie holding the session id
pub const SESSION_COOKIE: &str = "session";

/// An authenticated user session
///
/// Carries the bearer token issued by the identity provider, so every call to
/// the calculation and history services is made with explicit credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Email the user signed in with
    pub user_email: String,

    /// Access token from the identity provider
    pub access_token: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

impl Session {
    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= SystemTime::now()
    }
}

/// Active sessions keyed by session id
///
/// Owned by the application state and handed to whoever needs it; there is no
/// process-wide session table.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    lifetime: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(SESSION_DURATION))
    }
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lifetime,
        }
    }

    /// Create a new user session
    ///
    /// # Returns
    /// * `String` - A unique session ID
    pub fn create(&self, user_email: &str, access_token: &str) -> String {
        self.create_for_token(user_email, access_token, None)
    }

    /// Create a session that ends no later than its access token
    ///
    /// Expired sessions left behind by abandoned cookies are pruned here.
    ///
    /// # Arguments
    /// * `token_lifetime` - Validity of the access token, if the identity
    ///   provider reported one
    pub fn create_for_token(
        &self,
        user_email: &str,
        access_token: &str,
        token_lifetime: Option<Duration>,
    ) -> String {
        let lifetime = token_lifetime.map_or(self.lifetime, |token| token.min(self.lifetime));
        let now = SystemTime::now();

        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            user_email: user_email.to_string(),
            access_token: access_token.to_string(),
            expires_at: now + lifetime,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, existing| existing.expires_at > now);
        if sessions.len() < before {
            log::debug!("pruned {} expired sessions", before - sessions.len());
        }
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// Look up a session that has not expired yet
    ///
    /// Expired sessions are dropped on the way.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(session_id) {
                Some(session) if !session.is_expired() => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        log::debug!("evicting expired session");
        self.remove(session_id);
        None
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
