//! Sign-in and sign-out: ties the realtime session and dispatcher to one
//! user's credentials.
//!
//! Changing identity always tears the old session and connection down
//! before anything is created for the new one.

use std::sync::Arc;

use los_api::{ApiClient, ApiError};
use los_common::{Toast, ToastSink, UserId};
use los_platform::SoundPlayer;
use los_realtime::{ChannelSession, ConnectionState, DomainEvent, EchoManager, PresenceCallbacks};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatch::EventDispatcher;
use super::store::SharedStore;

struct ActiveIdentity {
    user_id: UserId,
    session: ChannelSession,
    dispatcher: JoinHandle<()>,
}

pub struct IdentityController {
    manager: EchoManager,
    api: ApiClient,
    store: SharedStore,
    toasts: Arc<dyn ToastSink>,
    sound: Arc<dyn SoundPlayer>,
    sound_enabled: bool,
    /// Raised by the dispatcher when the API answers 401.
    unauthorized: Arc<watch::Sender<bool>>,
    active: Option<ActiveIdentity>,
}

impl IdentityController {
    pub fn new(
        manager: EchoManager,
        api: ApiClient,
        store: SharedStore,
        toasts: Arc<dyn ToastSink>,
        sound: Arc<dyn SoundPlayer>,
        sound_enabled: bool,
    ) -> Self {
        Self {
            manager,
            api,
            store,
            toasts,
            sound,
            sound_enabled,
            unauthorized: Arc::new(watch::channel(false).0),
            active: None,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.active.as_ref().map(|a| &a.user_id)
    }

    pub fn realtime_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Sign in as `user_id`: load the dashboard, connect, and start
    /// dispatching notifications.
    ///
    /// Fails only when the token is rejected; other API failures leave the
    /// dashboard empty but realtime still starts.
    pub async fn sign_in(&mut self, token: &str, user_id: UserId) -> Result<(), ApiError> {
        self.sign_out().await;

        let api = self.api.with_token(token);
        self.refresh(&api).await?;
        self.unauthorized.send_replace(false);

        let connection = self.manager.initialize(token).await;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = connection.join(&user_id, presence_callbacks(event_tx));

        let dispatcher = tokio::spawn(self.dispatcher(api).run(event_rx));

        info!(user = %user_id, channel = %session.name(), "Signed in");
        self.active = Some(ActiveIdentity {
            user_id,
            session,
            dispatcher,
        });
        Ok(())
    }

    /// Release the session, close the connection and wait for the
    /// dispatcher to drain. No-op when signed out.
    pub async fn sign_out(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        info!(user = %active.user_id, "Signing out");

        // Releasing the hooks drops the event sender, ending the dispatcher.
        active.session.unsubscribe();
        self.manager.disconnect().await;
        if let Err(e) = active.dispatcher.await {
            warn!(error = %e, "Dispatcher task failed");
        }
    }

    /// Wait until the API rejects the signed-in token, then sign out.
    ///
    /// Pends forever while the token stays valid.
    pub async fn expire_on_unauthorized(&mut self) {
        let mut rejected = self.unauthorized.subscribe();
        let expired = rejected.wait_for(|rejected| *rejected).await.is_ok();
        if expired {
            warn!("Token rejected by the API, signing out");
            self.toasts
                .show(Toast::error("Session Expired", "Please sign in again"));
            self.sign_out().await;
        }
    }

    fn dispatcher(&self, api: ApiClient) -> EventDispatcher {
        EventDispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.toasts),
            Arc::clone(&self.sound),
            Arc::new(api),
        )
        .with_sound_enabled(self.sound_enabled)
        .with_unauthorized_signal(Arc::clone(&self.unauthorized))
    }

    /// Load the query list and counters into the store.
    async fn refresh(&self, api: &ApiClient) -> Result<(), ApiError> {
        match api.queries(None, None).await {
            Ok(queries) => {
                debug!(count = queries.len(), "Loaded queries");
                self.store.write().await.set_queries(queries);
            }
            Err(ApiError::Unauthorized) => {
                warn!("Token rejected by the API");
                return Err(ApiError::Unauthorized);
            }
            Err(e) => warn!(error = %e, "Failed to load queries"),
        }

        match api.query_counts().await {
            Ok(counts) => self.store.write().await.set_counts(counts),
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized),
            Err(e) => warn!(error = %e, "Failed to load query counts"),
        }
        Ok(())
    }
}

fn presence_callbacks(events: mpsc::UnboundedSender<DomainEvent>) -> PresenceCallbacks {
    PresenceCallbacks::new()
        .here(|members| info!(members = members.len(), "Realtime channel ready"))
        .joining(|member| debug!(member = %member.id, "Member joined"))
        .leaving(|member| debug!(member = %member.id, "Member left"))
        .error(|err| warn!(error = %err, "Realtime channel error"))
        .on_update(move |event| {
            if events.send(event).is_err() {
                debug!("Dispatcher gone; dropping event");
            }
        })
}
