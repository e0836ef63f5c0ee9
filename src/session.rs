//! Process-lifetime session state shared by every gateway component.
//!
//! [`SessionStore`] is a plain shared cell: it performs no coordination of its own and
//! relies on the single-flight coordinators in [`flows`](crate::flows) to serialize the
//! writes that matter. Only [`SessionStore::set_credentials`],
//! [`SessionStore::set_csrf_token`], and [`SessionStore::clear`] mutate it, and each
//! mutation is broadcast to registered [`SessionObserver`]s after the write lock is
//! released.

pub mod secret;

pub use secret::TokenSecret;

// self
use crate::_prelude::*;

/// Authentication status derived from the session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
	/// An access token is held.
	Authenticated,
	/// No access token is held but a refresh exchange is pending.
	Checking,
	/// No access token is held.
	Unauthenticated,
}

/// Change notification delivered to [`SessionObserver`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// Credentials were written by a login or refresh.
	Authenticated {
		/// User identifier reported by the server, if any.
		user_id: Option<String>,
	},
	/// The CSRF token was replaced (`present == false` when it was dropped).
	CsrfChanged {
		/// Whether a token is held after the change.
		present: bool,
	},
	/// Both tokens were dropped; the session is over.
	Cleared,
}

/// Callback hook for collaborators that mirror session state (UI, caches).
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// Invoked after every session mutation, outside the store's lock.
	fn session_changed(&self, event: &SessionEvent);
}

/// Point-in-time copy of the session state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
	/// Bearer credential, when authenticated.
	pub access_token: Option<TokenSecret>,
	/// Anti-forgery token, when provisioned.
	pub csrf_token: Option<TokenSecret>,
	/// User identifier returned alongside the access token.
	pub user_id: Option<String>,
	/// Instant of the most recent mutation.
	pub updated_at: Option<OffsetDateTime>,
}
impl SessionSnapshot {
	/// Returns the status implied by this snapshot alone.
	pub fn status(&self) -> SessionStatus {
		if self.access_token.is_some() {
			SessionStatus::Authenticated
		} else {
			SessionStatus::Unauthenticated
		}
	}
}

/// Shared mutable session cell.
#[derive(Default)]
pub struct SessionStore {
	state: RwLock<SessionSnapshot>,
	observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
}
impl SessionStore {
	/// Creates an empty store wrapped in an [`Arc`] for sharing.
	pub fn shared() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Returns the current access token.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.state.read().access_token.clone()
	}

	/// Returns the current CSRF token.
	pub fn csrf_token(&self) -> Option<TokenSecret> {
		self.state.read().csrf_token.clone()
	}

	/// Returns the user identifier of the current session.
	pub fn user_id(&self) -> Option<String> {
		self.state.read().user_id.clone()
	}

	/// Returns a copy of the full state.
	pub fn snapshot(&self) -> SessionSnapshot {
		self.state.read().clone()
	}

	/// Stores a freshly issued access token.
	pub fn set_credentials(&self, access_token: TokenSecret, user_id: Option<String>) {
		{
			let mut state = self.state.write();

			state.access_token = Some(access_token);
			// A refresh response without a user id keeps the one from login.
			if user_id.is_some() {
				state.user_id = user_id.clone();
			}
			state.updated_at = Some(OffsetDateTime::now_utc());
		}

		self.notify(&SessionEvent::Authenticated { user_id });
	}

	/// Replaces the CSRF token; `None` drops it after a confirmed mismatch.
	pub fn set_csrf_token(&self, csrf_token: Option<TokenSecret>) {
		let present = csrf_token.is_some();

		{
			let mut state = self.state.write();

			state.csrf_token = csrf_token;
			state.updated_at = Some(OffsetDateTime::now_utc());
		}

		self.notify(&SessionEvent::CsrfChanged { present });
	}

	/// Drops both tokens and the user identifier.
	pub fn clear(&self) {
		{
			let mut state = self.state.write();

			*state = SessionSnapshot {
				updated_at: Some(OffsetDateTime::now_utc()),
				..SessionSnapshot::default()
			};
		}

		self.notify(&SessionEvent::Cleared);
	}

	/// Registers an observer for subsequent mutations.
	pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
		self.observers.write().push(observer);
	}

	fn notify(&self, event: &SessionEvent) {
		let observers = self.observers.read().clone();

		for observer in observers {
			observer.session_changed(event);
		}
	}
}
impl Debug for SessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("SessionStore")
			.field("access_token_set", &state.access_token.is_some())
			.field("csrf_token_set", &state.csrf_token.is_some())
			.field("user_id", &state.user_id)
			.field("observers", &self.observers.read().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Default)]
	struct RecordingObserver(Mutex<Vec<SessionEvent>>);
	impl SessionObserver for RecordingObserver {
		fn session_changed(&self, event: &SessionEvent) {
			self.0.lock().push(event.clone());
		}
	}

	#[test]
	fn reads_return_latest_write() {
		let store = SessionStore::default();

		assert_eq!(store.snapshot().status(), SessionStatus::Unauthenticated);

		store.set_credentials("access-1".into(), Some("user-1".into()));
		store.set_csrf_token(Some("csrf-1".into()));

		assert_eq!(store.access_token().as_ref().map(TokenSecret::expose), Some("access-1"));
		assert_eq!(store.csrf_token().as_ref().map(TokenSecret::expose), Some("csrf-1"));
		assert_eq!(store.user_id().as_deref(), Some("user-1"));

		store.set_credentials("access-2".into(), None);

		assert_eq!(store.access_token().as_ref().map(TokenSecret::expose), Some("access-2"));
		assert_eq!(store.user_id().as_deref(), Some("user-1"));
		assert_eq!(store.snapshot().status(), SessionStatus::Authenticated);
	}

	#[test]
	fn clear_resets_every_field_and_notifies() {
		let store = SessionStore::default();
		let observer = Arc::new(RecordingObserver::default());

		store.subscribe(observer.clone());
		store.set_credentials("access-1".into(), Some("user-1".into()));
		store.set_csrf_token(Some("csrf-1".into()));
		store.clear();

		let snapshot = store.snapshot();

		assert!(snapshot.access_token.is_none());
		assert!(snapshot.csrf_token.is_none());
		assert!(snapshot.user_id.is_none());
		assert!(snapshot.updated_at.is_some());
		assert_eq!(
			*observer.0.lock(),
			vec![
				SessionEvent::Authenticated { user_id: Some("user-1".into()) },
				SessionEvent::CsrfChanged { present: true },
				SessionEvent::Cleared,
			]
		);
	}

	#[test]
	fn debug_output_hides_tokens() {
		let store = SessionStore::default();

		store.set_credentials("very-secret".into(), None);

		let rendered = format!("{store:?}");

		assert!(rendered.contains("access_token_set: true"));
		assert!(!rendered.contains("very-secret"));
	}
}
