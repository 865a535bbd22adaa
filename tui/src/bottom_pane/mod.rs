//! The input area under the timeline: the chat composer and its footer.

mod attachments;
mod chat_composer;
mod chat_composer_history;
mod footer;
mod input_surface;
mod word_boundary;

pub use chat_composer::ChatComposer;
pub use chat_composer::InputResult;
