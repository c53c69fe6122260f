pub mod cache;
pub mod state;

pub use cache::{EnsureOutcome, FetchResult, HistoryFetch, TrustHistoryCache};
pub use state::{
    empty_history, EnsureDecision, EntryState, History, HistoryEvent, HistorySnapshot,
    HistoryState, HistoryStatus,
};
