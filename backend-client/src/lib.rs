pub mod cache;
pub mod chat;
pub mod error;
pub mod grammar;
pub mod retry;

pub use cache::ResponseCache;
pub use chat::{ChatMessage, ChatModel, OpenAiChatClient};
pub use error::ClientError;
pub use grammar::GrammarClient;
pub use retry::{RetryConfig, with_retry, with_timeout};
