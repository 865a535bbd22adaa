mod thread_id;
pub use thread_id::ThreadId;
pub mod models;
pub mod outgoing;
pub mod protocol;
