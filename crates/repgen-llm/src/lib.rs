pub mod generator;
pub mod mock;
pub mod openai;

pub use generator::{ChatGenerator, TextGenerator};
pub use mock::{ScriptedChatModel, ScriptedReply};
pub use openai::OpenAIChatModel;
