use std::time::Duration;

use shared::models::{
    ClientEvent, HistoryPage, QueryResponseEvent, QuerySendRequest, RoomCreateRequest, RoomId,
    Turn,
};
use tokio::time::Instant;
use tracing::debug;

use crate::error::ClientError;
use crate::transcript::Transcript;

/// Generation token identifying one incarnation of the session.
///
/// Every room switch bumps the epoch, so an asynchronous completion carrying
/// a token from before the switch can be rejected at resolution time instead
/// of mutating state that now belongs to a different room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken {
    epoch: u64,
}

/// Permission to run exactly one history fetch, capturing the room, the page
/// to request, and the session token at issue time.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    room: RoomId,
    page: u32,
    token: SessionToken,
}

impl FetchTicket {
    #[must_use]
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }
}

#[derive(Debug)]
struct PendingOutbound {
    deadline: Instant,
}

/// Room-scoped conversation state: the active room, the transcript, the
/// history page cursor, and the single pending outbound marker.
///
/// The session is a plain state machine with no I/O of its own. Callers issue
/// [`FetchTicket`]s before fetching and hand results back through
/// [`ConversationSession::complete_fetch`]; the token carried by the ticket
/// decides whether a completion still applies.
#[derive(Debug)]
pub struct ConversationSession {
    room: Option<RoomId>,
    epoch: u64,
    transcript: Transcript,
    page_cursor: u32,
    total_pages: Option<u32>,
    exhausted: bool,
    fetch_in_flight: bool,
    pending: Option<PendingOutbound>,
    message_limit: usize,
    response_timeout: Duration,
}

impl ConversationSession {
    #[must_use]
    pub fn new(message_limit: usize, response_timeout: Duration) -> Self {
        Self {
            room: None,
            epoch: 0,
            transcript: Transcript::new(),
            page_cursor: 1,
            total_pages: None,
            exhausted: false,
            fetch_in_flight: false,
            pending: None,
            message_limit,
            response_timeout,
        }
    }

    #[must_use]
    pub fn active_room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    #[must_use]
    pub const fn token(&self) -> SessionToken {
        SessionToken { epoch: self.epoch }
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub const fn page_cursor(&self) -> u32 {
        self.page_cursor
    }

    #[must_use]
    pub const fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub const fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    /// True while an outbound message awaits its reply (or, in the room-less
    /// state, while a room allocation is outstanding).
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Makes `room` the active room, atomically discarding all room-scoped
    /// state of the previous session and invalidating outstanding tokens.
    pub fn set_active_room(&mut self, room: RoomId) {
        self.room = Some(room);
        self.invalidate();
    }

    /// Returns to the room-less state, discarding all room-scoped state.
    pub fn clear_active_room(&mut self) {
        self.room = None;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.epoch += 1;
        self.transcript.clear();
        self.page_cursor = 1;
        self.total_pages = None;
        self.exhausted = false;
        self.fetch_in_flight = false;
        self.pending = None;
    }

    /// Issues a ticket for the first history page of the active room.
    ///
    /// Returns `None` without a room, while a fetch is in flight, or once a
    /// first page has already resolved (use [`Self::request_next_page`] then).
    pub fn begin_initial_fetch(&mut self) -> Option<FetchTicket> {
        if self.fetch_in_flight || self.total_pages.is_some() {
            return None;
        }
        let room = self.room.clone()?;
        self.fetch_in_flight = true;
        Some(FetchTicket {
            room,
            page: self.page_cursor,
            token: self.token(),
        })
    }

    /// Advances the page cursor and issues a ticket for the next older page.
    ///
    /// Gated on the scrolled-to-top signal by the caller; a no-op (`None`)
    /// when exhausted, while another fetch is in flight, before the first
    /// page has resolved, or without an active room.
    pub fn request_next_page(&mut self) -> Option<FetchTicket> {
        if self.fetch_in_flight || self.exhausted {
            return None;
        }
        let total = self.total_pages?;
        if self.page_cursor >= total {
            return None;
        }
        let room = self.room.clone()?;
        self.page_cursor += 1;
        self.fetch_in_flight = true;
        Some(FetchTicket {
            room,
            page: self.page_cursor,
            token: self.token(),
        })
    }

    /// Applies a resolved history page, unless the ticket's token no longer
    /// matches (the room changed while the fetch was in flight).
    ///
    /// Returns whether the page was applied.
    pub fn complete_fetch(&mut self, ticket: &FetchTicket, page: HistoryPage) -> bool {
        if ticket.token != self.token() {
            debug!(room = %ticket.room, page = ticket.page, "discarding stale history page");
            return false;
        }
        self.fetch_in_flight = false;
        self.total_pages = Some(page.total_pages);
        self.exhausted = self.page_cursor >= page.total_pages;
        self.transcript.prepend_page(page.turns);
        true
    }

    /// Releases the in-flight gate after a failed fetch so the page can be
    /// requested again. Stale failures are ignored.
    ///
    /// Returns whether the failure belonged to the current session.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket) -> bool {
        if ticket.token != self.token() {
            debug!(room = %ticket.room, page = ticket.page, "discarding stale fetch failure");
            return false;
        }
        self.fetch_in_flight = false;
        // Rewind the advance so the next scrolled-to-top signal retries the
        // same page. Page 1 retries through begin_initial_fetch instead.
        if ticket.page > 1 {
            self.page_cursor -= 1;
        }
        true
    }

    /// Validates and stages an outbound user message for the active room:
    /// appends the optimistic `User` turn, arms the pending marker, and
    /// returns the `query:send` event to emit.
    ///
    /// The transcript snapshot captured *before* the optimistic append rides
    /// along as conversational context.
    ///
    /// # Errors
    /// Validation failures (`EmptyMessage`, `MessageTooLong`) and
    /// `NoActiveRoom`; nothing is staged on error.
    pub fn compose_query(&mut self, message: &str, now: Instant) -> Result<ClientEvent, ClientError> {
        self.validate_message(message)?;
        let room = self.room.clone().ok_or(ClientError::NoActiveRoom)?;
        let context = self.transcript.to_vec();
        self.transcript.append(Turn::user(message));
        self.pending = Some(PendingOutbound {
            deadline: now + self.response_timeout,
        });
        Ok(ClientEvent::QuerySend(QuerySendRequest {
            message: message.to_string(),
            room_id: room,
            messages: context,
        }))
    }

    /// Validates and stages the first message from the room-less state,
    /// returning the `room:create` event to emit. The pending marker is
    /// armed so the wait for `room:created` is bounded too.
    ///
    /// # Errors
    /// Validation failures; nothing is staged on error.
    pub fn compose_room_create(
        &mut self,
        message: &str,
        now: Instant,
    ) -> Result<ClientEvent, ClientError> {
        self.validate_message(message)?;
        self.pending = Some(PendingOutbound {
            deadline: now + self.response_timeout,
        });
        Ok(ClientEvent::RoomCreate(RoomCreateRequest {
            message: message.to_string(),
        }))
    }

    fn validate_message(&self, message: &str) -> Result<(), ClientError> {
        if message.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if message.chars().count() > self.message_limit {
            return Err(ClientError::MessageTooLong {
                limit: self.message_limit,
            });
        }
        Ok(())
    }

    /// Disarms the pending marker (e.g. after a failed emit).
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Accepts an assistant reply: appends the `AI` turn and clears the
    /// pending marker, but only when the event belongs to the active room.
    /// Replies for any other room are discarded without touching state.
    pub fn apply_response(&mut self, event: QueryResponseEvent) -> Option<Turn> {
        if self.room.as_ref() != Some(&event.room_id) {
            debug!(room = %event.room_id, "discarding reply for inactive room");
            return None;
        }
        self.pending = None;
        let turn = event.into_turn();
        self.transcript.append(turn.clone());
        Some(turn)
    }

    /// Deadline of the pending outbound, if one is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Expires the pending marker once its deadline has passed, returning the
    /// timeout error to surface to the user. The optimistic turn stays in the
    /// transcript.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<ClientError> {
        let deadline = self.pending.as_ref()?.deadline;
        if now < deadline {
            return None;
        }
        self.pending = None;
        Some(ClientError::ResponseTimeout(self.response_timeout))
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(shared::models::MESSAGE_LIMIT, Duration::from_secs(45))
    }
}
