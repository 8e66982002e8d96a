//! System prompt assembly per chat mode.

use crate::context::{create_files_context, locked_paths, FileMap, WORK_DIR};
use crate::prompts::{
    discuss_prompt, patch_prompt, DesignScheme, PromptLibrary, PromptOptions, SupabaseContext,
    MODIFICATIONS_TAG_NAME,
};
use shared::agent_api::{ChatMessage, ChatModeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMode {
    Build {
        prompt_id: String,
        design_scheme: Option<DesignScheme>,
        database: Option<SupabaseContext>,
    },
    Discuss,
    Patch {
        cwd: String,
    },
}

impl Default for ChatMode {
    fn default() -> Self {
        ChatMode::Build {
            prompt_id: PromptLibrary::DEFAULT_ID.to_string(),
            design_scheme: None,
            database: None,
        }
    }
}

impl ChatMode {
    pub fn kind(&self) -> ChatModeKind {
        match self {
            ChatMode::Build { .. } => ChatModeKind::Build,
            ChatMode::Discuss => ChatModeKind::Discuss,
            ChatMode::Patch { .. } => ChatModeKind::Patch,
        }
    }

    /// Only build and patch responses edit files, so only they get file context.
    fn takes_file_context(&self) -> bool {
        !matches!(self, ChatMode::Discuss)
    }
}

#[derive(Debug, Clone)]
pub struct PromptContext {
    pub cwd: String,
    /// Every known file; locked entries produce the do-not-modify notice.
    pub files: FileMap,
    /// Files selected for the context buffer.
    pub context_files: FileMap,
    pub summary: Option<String>,
    pub message_slice_id: Option<usize>,
    pub context_optimization: bool,
}

impl Default for PromptContext {
    fn default() -> Self {
        Self {
            cwd: WORK_DIR.to_string(),
            files: FileMap::new(),
            context_files: FileMap::new(),
            summary: None,
            message_slice_id: None,
            context_optimization: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

fn context_buffer(context_files: &FileMap) -> String {
    format!(
        "\nBelow is the artifact containing the context loaded into context buffer for you to have knowledge of and might need changes to fullfill current user request.\nCONTEXT BUFFER:\n---\n{}\n---\n",
        create_files_context(context_files, true)
    )
}

fn summary_block(summary: &str) -> String {
    format!(
        "\nBelow is the chat history till now.\nCHAT SUMMARY:\n---\n{}\n---\n",
        summary
    )
}

fn locked_files_notice(paths: &[&str]) -> String {
    let list: String = paths.iter().map(|p| format!("- {}\n", p)).collect();
    format!(
        "\n\nIMPORTANT: The following files are locked and MUST NOT be modified in any way. Do not suggest or make any changes to these files. You can proceed with the request but DO NOT make any changes to these files specifically:\n{}---\n",
        list
    )
}

/// Keep `messages[slice..]` when a positive slice id is given, else only the last message.
fn truncate_history(mut messages: Vec<ChatMessage>, slice: Option<usize>) -> Vec<ChatMessage> {
    match slice {
        Some(start) if start > 0 => {
            let start = start.min(messages.len());
            messages.split_off(start)
        }
        _ => messages.pop().into_iter().collect(),
    }
}

pub fn base_prompt(library: &PromptLibrary, mode: &ChatMode, cwd: &str) -> String {
    match mode {
        ChatMode::Build {
            prompt_id,
            design_scheme,
            database,
        } => {
            let mut options = PromptOptions::new(cwd);
            options.design_scheme = design_scheme.clone();
            options.database = database.clone();
            library.prompt_or_default(prompt_id, &options)
        }
        ChatMode::Discuss => discuss_prompt(),
        ChatMode::Patch { cwd } => patch_prompt(cwd, MODIFICATIONS_TAG_NAME),
    }
}

pub fn assemble(
    library: &PromptLibrary,
    mode: &ChatMode,
    ctx: &PromptContext,
    messages: Vec<ChatMessage>,
) -> AssembledPrompt {
    let mut system = base_prompt(library, mode, &ctx.cwd);
    let mut messages = messages;

    if mode.takes_file_context() && ctx.context_optimization && !ctx.context_files.is_empty() {
        system.push_str(&context_buffer(&ctx.context_files));

        if let Some(summary) = ctx.summary.as_deref().filter(|s| !s.is_empty()) {
            system.push_str(&summary_block(summary));
            let before = messages.len();
            messages = truncate_history(messages, ctx.message_slice_id);
            tracing::debug!(before, after = messages.len(), "truncated chat history");
        }
    }

    let locked = locked_paths(&ctx.files);
    if !locked.is_empty() {
        system.push_str(&locked_files_notice(&locked));
    }

    AssembledPrompt { system, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileEntry;

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
            ChatMessage::assistant("four"),
            ChatMessage::user("five"),
        ]
    }

    fn context_files() -> FileMap {
        let mut files = FileMap::new();
        files.insert("/home/project/src/app.ts".into(), FileEntry::file("export {}"));
        files
    }

    #[test]
    fn test_build_without_context_files_is_library_prompt() {
        let library = PromptLibrary::new();
        let ctx = PromptContext {
            context_optimization: true,
            ..Default::default()
        };
        let out = assemble(&library, &ChatMode::default(), &ctx, history());
        let expected = library
            .get_prompt_from_library("default", &PromptOptions::new(WORK_DIR))
            .unwrap();
        assert_eq!(out.system, expected);
        assert_eq!(out.messages.len(), 5);
    }

    #[test]
    fn test_unknown_prompt_id_falls_back_to_default() {
        let library = PromptLibrary::new();
        let mode = ChatMode::Build {
            prompt_id: "does-not-exist".into(),
            design_scheme: None,
            database: None,
        };
        let out = assemble(&library, &mode, &PromptContext::default(), history());
        assert_eq!(
            out.system,
            base_prompt(&library, &ChatMode::default(), WORK_DIR)
        );
    }

    #[test]
    fn test_patch_prompt_names_directory() {
        let mode = ChatMode::Patch {
            cwd: "/home/project".into(),
        };
        let out = assemble(&PromptLibrary::new(), &mode, &PromptContext::default(), history());
        assert!(out.system.contains("the '/home/project' directory"));
        assert!(!out.system.contains("claude-3-5-sonnet"));
        assert!(!out.system.contains("gpt-4o"));
        assert_eq!(mode.kind(), ChatModeKind::Patch);
    }

    #[test]
    fn test_context_buffer_and_summary_truncate_history() {
        let ctx = PromptContext {
            context_files: context_files(),
            summary: Some("user is building a todo app".into()),
            context_optimization: true,
            ..Default::default()
        };
        let out = assemble(&PromptLibrary::new(), &ChatMode::default(), &ctx, history());
        assert!(out.system.contains("CONTEXT BUFFER:\n---\n<codesmithArtifact"));
        assert!(out.system.contains("filePath=\"src/app.ts\""));
        assert!(out
            .system
            .contains("CHAT SUMMARY:\n---\nuser is building a todo app\n---\n"));
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].content, "five");

        let ctx = PromptContext {
            message_slice_id: Some(3),
            ..ctx
        };
        let out = assemble(&PromptLibrary::new(), &ChatMode::default(), &ctx, history());
        let contents: Vec<_> = out.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["four", "five"]);
    }

    #[test]
    fn test_context_without_summary_keeps_history() {
        let ctx = PromptContext {
            context_files: context_files(),
            context_optimization: true,
            ..Default::default()
        };
        let out = assemble(&PromptLibrary::new(), &ChatMode::default(), &ctx, history());
        assert!(out.system.contains("CONTEXT BUFFER:"));
        assert_eq!(out.messages.len(), 5);
    }

    #[test]
    fn test_discuss_and_disabled_optimization_skip_context() {
        let ctx = PromptContext {
            context_files: context_files(),
            summary: Some("s".into()),
            context_optimization: true,
            ..Default::default()
        };
        let out = assemble(&PromptLibrary::new(), &ChatMode::Discuss, &ctx, history());
        assert_eq!(out.system, discuss_prompt());
        assert_eq!(out.messages.len(), 5);

        let ctx = PromptContext {
            context_optimization: false,
            ..ctx
        };
        let out = assemble(&PromptLibrary::new(), &ChatMode::default(), &ctx, history());
        assert!(!out.system.contains("CONTEXT BUFFER:"));
    }

    #[test]
    fn test_locked_notice_is_last_block() {
        let mut files = context_files();
        files.insert("/home/project/src/z.ts".into(), FileEntry::locked_file("z"));
        files.insert("/home/project/src/b.ts".into(), FileEntry::locked_file("b"));
        let ctx = PromptContext {
            files,
            context_files: context_files(),
            summary: Some("summary".into()),
            context_optimization: true,
            ..Default::default()
        };

        for mode in [
            ChatMode::default(),
            ChatMode::Discuss,
            ChatMode::Patch {
                cwd: WORK_DIR.into(),
            },
        ] {
            let out = assemble(&PromptLibrary::new(), &mode, &ctx, history());
            let tail = "- /home/project/src/b.ts\n- /home/project/src/z.ts\n---\n";
            assert!(out.system.ends_with(tail), "mode {:?}", mode.kind());
            assert_eq!(out.system.matches("/home/project/src/b.ts").count(), 1);
            let notice = out.system.rfind("IMPORTANT: The following files are locked").unwrap();
            if let Some(summary) = out.system.find("CHAT SUMMARY") {
                assert!(summary < notice);
            }
        }
    }
}
