//! Chat Host - turns chat history into a resolved, prompted model call
//!
//! This crate provides:
//! - Message preprocessing (model/provider directives, thought markup cleanup)
//! - The prompt library and per-mode system prompt assembly
//! - File context serialization for the context buffer
//! - The request dispatcher that resolves a model and streams its reply

pub mod assembler;
pub mod context;
pub mod dispatcher;
pub mod preprocess;
pub mod prompts;

pub use assembler::{assemble, AssembledPrompt, ChatMode, PromptContext};
pub use context::{create_files_context, FileEntry, FileMap, WORK_DIR};
pub use dispatcher::{ChatHost, ChatRequest, PreparedRequest, StreamText};
pub use preprocess::{preprocess_messages, Preprocessed};
pub use prompts::{DesignScheme, PromptLibrary, PromptOptions, SupabaseContext};
