pub mod cache;
pub mod changes;
pub mod client;
pub mod sync;

pub use cache::{ListCache, TodoCache};
pub use changes::{TodoChange, diff_todos, summarize_changes};
pub use clarydo_api;
pub use client::{ApiClient, ClientError};
pub use sync::{ListSync, TodoSync};
