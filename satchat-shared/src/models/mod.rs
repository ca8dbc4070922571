pub mod errors;
pub mod events;
pub mod history;
pub mod room;
pub mod turn;
pub mod user;

pub use errors::ErrorResponse;
pub use events::{
    ClientEvent, QueryResponseEvent, QuerySendRequest, RoomCreateRequest, RoomCreatedEvent,
    ServerEvent,
};
pub use history::{HistoryData, HistoryPage, HistoryResponse, Pagination};
pub use room::{DeleteRoomRequest, RenameRoomRequest, RoomId, RoomListResponse, RoomSummary, SortOrder};
pub use turn::{Sender, Turn};
pub use user::{LoginData, LoginRequest, LoginResponse, User};

/// Maximum length of a single outbound message, in characters.
///
/// Messages longer than this are rejected client-side before any network
/// call is made.
pub const MESSAGE_LIMIT: usize = 200;

/// Number of history messages requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
