pub mod chat;
pub mod npc;
pub mod student;

pub use chat::{ChatCompletion, ChatMessage, HttpChatClient};
pub use npc::{NpcAgent, NpcReply};
pub use student::{LlmStudent, ManualStudent, StudentAgent};
