use serde::{Deserialize, Serialize};

use super::Turn;

/// Pagination bound reported alongside each history page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_pages: u32,
}

/// Inner payload of a history response.
///
/// `messages` arrive newest-first from the backend; use
/// [`HistoryResponse::into_page`] to obtain them in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryData {
    #[serde(default)]
    pub messages: Vec<Turn>,
    pub pagination: Pagination,
}

/// Response envelope for one page of room history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    pub data: HistoryData,
}

/// One page of history, already reversed into chronological order and ready
/// to be prepended to a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// Turns in chronological order, oldest first.
    pub turns: Vec<Turn>,
    /// Total number of pages the backend reports for this room.
    pub total_pages: u32,
}

impl HistoryResponse {
    /// Converts the raw response into a [`HistoryPage`], reversing the
    /// newest-first wire order into oldest-first.
    #[must_use]
    pub fn into_page(self) -> HistoryPage {
        let mut turns = self.data.messages;
        turns.reverse();
        HistoryPage {
            turns,
            total_pages: self.data.pagination.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_response_parses_envelope() {
        let json = json!({
            "data": {
                "messages": [
                    {"sender": "AI", "message": "second"},
                    {"sender": "User", "message": "first"}
                ],
                "pagination": {"totalPages": 3}
            }
        });
        let response: HistoryResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.data.messages.len(), 2);
        assert_eq!(response.data.pagination.total_pages, 3);
    }

    #[test]
    fn test_into_page_reverses_into_chronological_order() {
        let json = json!({
            "data": {
                "messages": [
                    {"sender": "AI", "message": "newest"},
                    {"sender": "User", "message": "middle"},
                    {"sender": "AI", "message": "oldest"}
                ],
                "pagination": {"totalPages": 1}
            }
        });
        let page = serde_json::from_value::<HistoryResponse>(json)
            .unwrap()
            .into_page();
        let order: Vec<&str> = page.turns.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(order, ["oldest", "middle", "newest"]);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_history_tolerates_empty_message_list() {
        let json = json!({"data": {"pagination": {"totalPages": 0}}});
        let page = serde_json::from_value::<HistoryResponse>(json)
            .unwrap()
            .into_page();
        assert!(page.turns.is_empty());
        assert_eq!(page.total_pages, 0);
    }
}
