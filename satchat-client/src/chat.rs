use std::sync::Arc;
use std::time::Duration;

use shared::config::Config;
use shared::models::{HistoryPage, RoomId, ServerEvent, Turn};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::ClientError;
use crate::history::HistoryApi;
use crate::session::{ConversationSession, FetchTicket};

/// Tunables for a chat client, usually taken from the loaded [`Config`].
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// History messages requested per page.
    pub page_size: u32,
    /// Maximum outbound message length, in characters.
    pub message_limit: usize,
    /// Bounded wait for an assistant reply.
    pub response_timeout: Duration,
}

impl From<&Config> for ChatOptions {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            message_limit: shared::models::MESSAGE_LIMIT,
            response_timeout: config.response_timeout(),
        }
    }
}

/// A resolved history fetch, delivered back to the owning loop.
#[derive(Debug)]
pub struct FetchOutcome {
    ticket: FetchTicket,
    result: Result<HistoryPage, ClientError>,
}

/// Receiving half for resolved history fetches; owned by the loop that owns
/// the [`ChatClient`] so fetch completions are applied from one place.
#[derive(Debug)]
pub struct FetchResults {
    rx: mpsc::UnboundedReceiver<FetchOutcome>,
}

impl FetchResults {
    /// Next resolved fetch. Pends while none is outstanding.
    pub async fn recv(&mut self) -> Option<FetchOutcome> {
        self.rx.recv().await
    }
}

/// What applying a live event did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    /// An assistant turn was appended to the active room's transcript.
    AiTurn(Turn),
    /// The backend allocated a room for the room-less first message; the
    /// session has switched into it.
    RoomCreated(RoomId),
    /// The event did not apply to the active room and was discarded.
    Ignored,
}

/// The owner of the active conversation: wires the session state machine to
/// the history boundary and the socket, one room at a time.
///
/// All mutation happens through `&mut self` from the single owning loop;
/// fetches run on background tasks but their results come back as
/// [`FetchOutcome`] values applied by that same owner.
#[derive(Debug)]
pub struct ChatClient {
    session: ConversationSession,
    history: Arc<dyn HistoryApi>,
    connection: Connection,
    page_size: u32,
    fetch_tx: mpsc::UnboundedSender<FetchOutcome>,
    seed: Option<String>,
}

impl ChatClient {
    /// Builds a chat client plus the fetch-result stream its owner drives.
    #[must_use]
    pub fn new(
        history: Arc<dyn HistoryApi>,
        connection: Connection,
        options: &ChatOptions,
    ) -> (Self, FetchResults) {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        (
            Self {
                session: ConversationSession::new(options.message_limit, options.response_timeout),
                history,
                connection,
                page_size: options.page_size,
                fetch_tx,
                seed: None,
            },
            FetchResults { rx: fetch_rx },
        )
    }

    #[must_use]
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Switches into `room`: discards all previous room-scoped state and
    /// kicks off the page-1 history fetch.
    pub fn enter_room(&mut self, room: RoomId) {
        self.session.set_active_room(room);
        if let Some(ticket) = self.session.begin_initial_fetch() {
            self.spawn_fetch(ticket);
        }
    }

    /// Returns to the room-less composer, discarding room-scoped state.
    pub fn leave_room(&mut self) {
        self.session.clear_active_room();
        self.seed = None;
    }

    /// Re-attempts the initial history fetch after a failure.
    pub fn retry_initial_fetch(&mut self) {
        if let Some(ticket) = self.session.begin_initial_fetch() {
            self.spawn_fetch(ticket);
        }
    }

    /// The scrolled-to-top signal: requests the next older page unless
    /// exhausted or a fetch is already in flight. Returns whether a fetch
    /// was actually started.
    pub fn scrolled_to_top(&mut self) -> bool {
        match self.session.request_next_page() {
            Some(ticket) => {
                self.spawn_fetch(ticket);
                true
            }
            None => false,
        }
    }

    /// Sends a user message: into the active room via `query:send`, or as a
    /// `room:create` request from the room-less state.
    ///
    /// The optimistic `User` turn (active-room path) is appended before the
    /// emit and is not retracted when the emit fails.
    ///
    /// # Errors
    /// Validation errors, and `ConnectionUnavailable` when the socket cannot
    /// take the event right now (the user may simply resend).
    pub fn send(&mut self, text: &str, now: Instant) -> Result<(), ClientError> {
        if self.session.active_room().is_some() {
            let event = self.session.compose_query(text, now)?;
            if let Err(error) = self.connection.send(&event) {
                self.session.clear_pending();
                return Err(error);
            }
            Ok(())
        } else {
            let event = self.session.compose_room_create(text, now)?;
            if let Err(error) = self.connection.send(&event) {
                self.session.clear_pending();
                return Err(error);
            }
            self.seed = Some(text.to_string());
            Ok(())
        }
    }

    /// Applies one pushed event to the session.
    pub fn handle_event(&mut self, event: ServerEvent, now: Instant) -> ChatUpdate {
        match event {
            ServerEvent::QueryResponse(payload) => self
                .session
                .apply_response(payload)
                .map_or(ChatUpdate::Ignored, ChatUpdate::AiTurn),
            ServerEvent::RoomCreated(payload) => {
                if self.session.active_room().is_some() {
                    debug!(room = %payload.room_id, "ignoring room:created while a room is active");
                    return ChatUpdate::Ignored;
                }
                let room = payload.room_id;
                self.session.set_active_room(room.clone());
                if let Some(ticket) = self.session.begin_initial_fetch() {
                    self.spawn_fetch(ticket);
                }
                if let Some(seed) = self.seed.take() {
                    match self.session.compose_query(&seed, now) {
                        Ok(event) => {
                            if let Err(error) = self.connection.send(&event) {
                                warn!(%error, "failed to send first message into new room");
                                self.session.clear_pending();
                            }
                        }
                        Err(error) => warn!(%error, "first message rejected"),
                    }
                }
                ChatUpdate::RoomCreated(room)
            }
        }
    }

    /// Applies one resolved history fetch.
    ///
    /// Returns the number of prepended turns, or `None` when the result was
    /// stale (issued before a room switch) and discarded.
    ///
    /// # Errors
    /// Propagates the fetch failure when it belonged to the current session;
    /// stale failures are swallowed.
    pub fn handle_fetch(&mut self, outcome: FetchOutcome) -> Result<Option<usize>, ClientError> {
        let FetchOutcome { ticket, result } = outcome;
        match result {
            Ok(page) => {
                let count = page.turns.len();
                if self.session.complete_fetch(&ticket, page) {
                    Ok(Some(count))
                } else {
                    Ok(None)
                }
            }
            Err(error) => {
                if self.session.fail_fetch(&ticket) {
                    Err(error)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Deadline of the pending outbound, if any, for the owner's timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.next_deadline()
    }

    /// Expires an overdue pending outbound, returning the timeout error to
    /// surface inline.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<ClientError> {
        self.session.poll_deadline(now)
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        let history = Arc::clone(&self.history);
        let tx = self.fetch_tx.clone();
        let limit = self.page_size;
        tokio::spawn(async move {
            let result = history.fetch_page(ticket.room(), ticket.page(), limit).await;
            // The owner may already have moved on; it decides staleness.
            let _ = tx.send(FetchOutcome { ticket, result });
        });
    }
}
