pub mod settings;
pub mod shortcuts;
pub mod store;
pub mod tabs;

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        System,
        User,
        Assistant,
    }

    impl Role {
        pub fn as_str(&self) -> &'static str {
            match self {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
        pub role: Role,
        pub content: String,
    }

    impl ChatMessage {
        pub fn new(role: Role, content: impl Into<String>) -> Self {
            Self {
                id: None,
                role,
                content: content.into(),
            }
        }

        pub fn user(content: impl Into<String>) -> Self {
            Self::new(Role::User, content)
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self::new(Role::Assistant, content)
        }

        pub fn with_id(mut self, id: impl Into<String>) -> Self {
            self.id = Some(id.into());
            self
        }
    }

    /// A piece of a streamed model response.
    #[derive(Debug, Clone, PartialEq)]
    pub enum StreamChunk {
        Text(String),
        Done { stop_reason: Option<String> },
        Error(String),
    }

    /// Chat modes offered by the selector.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum ChatModeKind {
        #[default]
        Build,
        Discuss,
        Patch,
    }

    impl ChatModeKind {
        pub const ALL: [ChatModeKind; 3] =
            [ChatModeKind::Build, ChatModeKind::Discuss, ChatModeKind::Patch];

        pub fn as_str(&self) -> &'static str {
            match self {
                ChatModeKind::Build => "build",
                ChatModeKind::Discuss => "discuss",
                ChatModeKind::Patch => "patch",
            }
        }

        pub fn display_name(&self) -> &'static str {
            match self {
                ChatModeKind::Build => "Build",
                ChatModeKind::Discuss => "Discuss",
                ChatModeKind::Patch => "Patch",
            }
        }
    }
}
