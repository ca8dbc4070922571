use shared::models::Turn;

/// The ordered, room-scoped log of chat turns, oldest first.
///
/// Two independent streams feed it: live events append at the tail, resolved
/// history pages are inserted before everything loaded so far. With at most
/// one history fetch in flight at a time, inserting a page at the head is
/// exactly the snapshot rule `page ++ snapshot ++ live-arrivals-since`: the
/// turns that arrived while the fetch was in flight all sit behind the
/// snapshot, so the page can never re-interleave with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one live turn at the tail.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Inserts a resolved history page before all currently-loaded turns.
    ///
    /// `page` must already be in chronological order (oldest first).
    pub fn prepend_page(&mut self, page: Vec<Turn>) {
        if page.is_empty() {
            return;
        }
        self.turns.splice(0..0, page);
    }

    /// Discards every turn. Used on room switch and teardown.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Snapshot of the transcript, used as conversational context for sends.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}
