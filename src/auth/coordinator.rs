//! Login/register/logout orchestration over the API client and cookie cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::AuthApiClient;
use crate::models::{ApiReply, UserProfile};
use crate::session::SessionCookieCache;

// ============================================================================
// Messages
// ============================================================================

/// Shown when login is attempted with a blank username or password
const MSG_CREDENTIALS_REQUIRED: &str = "Username and password are required";

/// Shown after a successful login
const MSG_LOGIN_SUCCESS: &str = "Login successful";

/// Shown when registration is attempted with any blank field
const MSG_ALL_FIELDS_REQUIRED: &str = "All fields are required";

/// Shown when the two registration passwords differ
const MSG_PASSWORD_MISMATCH: &str = "Passwords do not match";

/// Shown when the registration password is shorter than [`MIN_PASSWORD_LENGTH`]
const MSG_PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters";

/// Shown after a successful registration
const MSG_REGISTER_SUCCESS: &str = "Registration successful";

/// Minimum accepted password length for registration
const MIN_PASSWORD_LENGTH: usize = 6;

/// Observable authentication state, the single source of truth for
/// presentation layers. Cloned as an immutable snapshot on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_logged_in: bool,
    pub is_loading: bool,
    pub login_message: Option<String>,
    pub register_message: Option<String>,
}

/// Which result field a network operation reports into.
#[derive(Clone, Copy)]
enum Operation {
    Login,
    Register,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Register => "register",
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            Operation::Login => MSG_LOGIN_SUCCESS,
            Operation::Register => MSG_REGISTER_SUCCESS,
        }
    }

    fn message_field(self, state: &mut AuthState) -> &mut Option<String> {
        match self {
            Operation::Login => &mut state.login_message,
            Operation::Register => &mut state.register_message,
        }
    }
}

/// Coordinates authentication operations and owns the [`AuthState`].
///
/// Operations are meant to be invoked from one logical caller at a time;
/// concurrent login and register calls on the same instance have undefined
/// precedence over the loading flag and result messages. Completions of
/// operations started before a `logout()` are discarded.
pub struct AuthCoordinator {
    api: AuthApiClient,
    cookies: Arc<SessionCookieCache>,
    state: Mutex<AuthState>,
    state_tx: watch::Sender<AuthState>,
    // Bumped on logout; in-flight operations compare against their captured
    // value and drop late responses instead of mutating state.
    epoch: AtomicU64,
}

impl AuthCoordinator {
    /// Create a coordinator over an API client and its cookie cache.
    ///
    /// The initial logged-in status is derived from the presence of any
    /// valid stored cookie; the session is not validated against the server.
    pub fn new(api: AuthApiClient, cookies: Arc<SessionCookieCache>) -> Self {
        let initial = AuthState {
            is_logged_in: cookies.has_any_cookies(),
            ..AuthState::default()
        };
        debug!(is_logged_in = initial.is_logged_in, "Coordinator created");
        let (state_tx, _) = watch::channel(initial.clone());

        Self {
            api,
            cookies,
            state: Mutex::new(initial),
            state_tx,
            epoch: AtomicU64::new(0),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AuthState {
        self.state.lock().unwrap().clone()
    }

    /// Watch channel receiving a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Attempt a login. Blank credentials short-circuit without a network
    /// call; otherwise the outcome of the API call decides the transition.
    pub async fn login(&self, username: &str, password: &str) {
        if username.trim().is_empty() || password.trim().is_empty() {
            self.update(|state| {
                state.login_message = Some(MSG_CREDENTIALS_REQUIRED.to_string());
            });
            return;
        }

        self.begin(Operation::Login);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let result = self.api.login(username, password).await;
        self.finish(Operation::Login, epoch, result);
    }

    /// Attempt a registration. Validations run in order and each
    /// short-circuits before any network call.
    pub async fn register(&self, username: &str, password: &str, repassword: &str) {
        let validation_error = if username.trim().is_empty()
            || password.trim().is_empty()
            || repassword.trim().is_empty()
        {
            Some(MSG_ALL_FIELDS_REQUIRED)
        } else if password != repassword {
            Some(MSG_PASSWORD_MISMATCH)
        } else if password.chars().count() < MIN_PASSWORD_LENGTH {
            Some(MSG_PASSWORD_TOO_SHORT)
        } else {
            None
        };

        if let Some(message) = validation_error {
            self.update(|state| {
                state.register_message = Some(message.to_string());
            });
            return;
        }

        self.begin(Operation::Register);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let result = self.api.register(username, password, repassword).await;
        self.finish(Operation::Register, epoch, result);
    }

    /// Log out: clear the cookie table (and its durable copy) and reset the
    /// state synchronously. Pending operations are cancelled; no network
    /// call is made.
    pub fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.cookies.clear() {
            warn!(error = %e, "Failed to clear persisted cookies on logout");
        }

        self.update(|state| {
            state.is_logged_in = false;
            state.is_loading = false;
            state.login_message = None;
            state.register_message = None;
        });
        info!("Logged out");
    }

    /// Reset both result messages, used before retrying an operation.
    pub fn clear_messages(&self) {
        self.update(|state| {
            state.login_message = None;
            state.register_message = None;
        });
    }

    /// Mark the operation in flight and clear its previous message.
    fn begin(&self, op: Operation) {
        self.update(|state| {
            state.is_loading = true;
            *op.message_field(state) = None;
        });
    }

    /// Apply an API outcome, unless a logout happened since `epoch`.
    fn finish(
        &self,
        op: Operation,
        epoch: u64,
        result: Result<ApiReply<UserProfile>, crate::api::ApiError>,
    ) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(operation = op.name(), "Discarding response completed after logout");
            return;
        }

        match result {
            Ok(reply) if reply.is_success() => {
                info!(operation = op.name(), "Authentication succeeded");
                self.update(|state| {
                    state.is_loading = false;
                    state.is_logged_in = true;
                    *op.message_field(state) = Some(op.success_message().to_string());
                });
            }
            Ok(reply) => {
                info!(
                    operation = op.name(),
                    error_code = reply.error_code,
                    "Server rejected authentication"
                );
                self.update(|state| {
                    state.is_loading = false;
                    *op.message_field(state) = Some(reply.error_msg);
                });
            }
            Err(e) => {
                error!(operation = op.name(), error = %e, "Authentication request failed");
                self.update(|state| {
                    state.is_loading = false;
                    *op.message_field(state) = Some(format!("Network error: {}", e));
                });
            }
        }
    }

    fn update(&self, mutate: impl FnOnce(&mut AuthState)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            mutate(&mut state);
            state.clone()
        };
        // send_replace never fails, even with no subscribers
        self.state_tx.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CredentialStore;

    fn coordinator_in(dir: &std::path::Path) -> AuthCoordinator {
        let cache = SessionCookieCache::new(CredentialStore::new(dir.to_path_buf()));
        cache.initialize();
        let cookies = Arc::new(cache);
        // Reserved port on localhost: any accidental network call fails fast
        let api = AuthApiClient::new("http://127.0.0.1:9", Arc::clone(&cookies)).unwrap();
        AuthCoordinator::new(api, cookies)
    }

    #[tokio::test]
    async fn blank_login_fields_set_message_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator_in(dir.path());

        coordinator.login("", "secret").await;
        let state = coordinator.state();
        assert_eq!(state.login_message.as_deref(), Some(MSG_CREDENTIALS_REQUIRED));
        assert!(!state.is_loading);
        assert!(!state.is_logged_in);

        coordinator.login("alice", "   ").await;
        assert_eq!(
            coordinator.state().login_message.as_deref(),
            Some(MSG_CREDENTIALS_REQUIRED)
        );
    }

    #[tokio::test]
    async fn register_validations_short_circuit_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator_in(dir.path());

        coordinator.register("u", "", "").await;
        assert_eq!(
            coordinator.state().register_message.as_deref(),
            Some(MSG_ALL_FIELDS_REQUIRED)
        );

        coordinator.register("u", "abc123", "xyz999").await;
        assert_eq!(
            coordinator.state().register_message.as_deref(),
            Some(MSG_PASSWORD_MISMATCH)
        );

        coordinator.register("u", "abc", "abc").await;
        assert_eq!(
            coordinator.state().register_message.as_deref(),
            Some(MSG_PASSWORD_TOO_SHORT)
        );

        // Mismatch is reported before length when both apply
        coordinator.register("u", "abc", "abcd").await;
        assert_eq!(
            coordinator.state().register_message.as_deref(),
            Some(MSG_PASSWORD_MISMATCH)
        );

        // Length is counted in characters, not bytes: four CJK characters
        // (12 UTF-8 bytes) are still too short
        coordinator.register("u", "四字密码", "四字密码").await;
        assert_eq!(
            coordinator.state().register_message.as_deref(),
            Some(MSG_PASSWORD_TOO_SHORT)
        );

        assert!(!coordinator.state().is_loading);
    }

    #[tokio::test]
    async fn clear_messages_resets_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator_in(dir.path());

        coordinator.login("", "").await;
        coordinator.register("u", "", "").await;
        let state = coordinator.state();
        assert!(state.login_message.is_some());
        assert!(state.register_message.is_some());

        coordinator.clear_messages();
        let state = coordinator.state();
        assert!(state.login_message.is_none());
        assert!(state.register_message.is_none());
    }

    #[tokio::test]
    async fn logout_resets_state_without_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator_in(dir.path());

        coordinator.logout();
        let state = coordinator.state();
        assert!(!state.is_logged_in);
        assert!(!state.is_loading);
        assert!(state.login_message.is_none());
        assert!(state.register_message.is_none());
    }

    #[tokio::test]
    async fn subscribers_observe_state_changes() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator_in(dir.path());
        let mut rx = coordinator.subscribe();

        coordinator.login("", "").await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().login_message.as_deref(),
            Some(MSG_CREDENTIALS_REQUIRED)
        );
    }
}
