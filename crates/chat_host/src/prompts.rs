//! Prompt library and fixed mode templates.
//!
//! Build mode looks up a named template by id; discuss and patch modes use
//! fixed templates. Every template is a pure function of its options.

use crate::context::{ACTION_TAG, ARTIFACT_TAG, WORK_DIR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag wrapping user-made file modifications and patch-mode responses.
pub const MODIFICATIONS_TAG_NAME: &str = "codesmith_file_modifications";

/// HTML elements the model may use to format chat replies.
pub const ALLOWED_HTML_ELEMENTS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "dd", "del", "details", "div", "dl", "dt", "em", "h1",
    "h2", "h3", "h4", "h5", "h6", "hr", "i", "ins", "kbd", "li", "ol", "p", "pre", "q", "rp",
    "rt", "ruby", "s", "samp", "source", "span", "strike", "strong", "sub", "summary", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul", "var", "think",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignScheme {
    #[serde(default)]
    pub palette: BTreeMap<String, String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub font: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseCredentials {
    pub anon_key: Option<String>,
    pub supabase_url: Option<String>,
}

/// Database connection state shown to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseContext {
    pub is_connected: bool,
    pub has_selected_project: bool,
    pub credentials: Option<SupabaseCredentials>,
}

#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub cwd: String,
    pub allowed_html_elements: Vec<String>,
    pub modification_tag_name: String,
    pub design_scheme: Option<DesignScheme>,
    pub database: Option<SupabaseContext>,
}

impl PromptOptions {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            allowed_html_elements: ALLOWED_HTML_ELEMENTS.iter().map(|s| s.to_string()).collect(),
            modification_tag_name: MODIFICATIONS_TAG_NAME.to_string(),
            design_scheme: None,
            database: None,
        }
    }
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self::new(WORK_DIR)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PromptEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    render: fn(&PromptOptions) -> String,
}

pub struct PromptLibrary {
    entries: Vec<PromptEntry>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptLibrary {
    pub const DEFAULT_ID: &'static str = "default";

    pub fn new() -> Self {
        Self {
            entries: vec![
                PromptEntry {
                    id: "default",
                    label: "Default Prompt",
                    description: "Full build instructions with artifact and design guidance",
                    render: default_prompt,
                },
                PromptEntry {
                    id: "optimized",
                    label: "Optimized Prompt",
                    description: "Shorter build prompt for smaller context windows",
                    render: optimized_prompt,
                },
            ],
        }
    }

    pub fn list(&self) -> &[PromptEntry] {
        &self.entries
    }

    pub fn get_prompt_from_library(&self, id: &str, options: &PromptOptions) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.render)(options))
    }

    /// Named prompt, else the default one.
    pub fn prompt_or_default(&self, id: &str, options: &PromptOptions) -> String {
        self.get_prompt_from_library(id, options).unwrap_or_else(|| {
            tracing::debug!(prompt_id = id, "unknown prompt id, using default");
            default_prompt(options)
        })
    }
}

fn allowed_elements(options: &PromptOptions) -> String {
    options
        .allowed_html_elements
        .iter()
        .map(|e| format!("<{}>", e))
        .collect::<Vec<_>>()
        .join(", ")
}

fn design_section(scheme: Option<&DesignScheme>) -> String {
    let Some(scheme) = scheme else {
        return "  No design scheme was provided. Choose a cohesive palette, readable typography and consistent spacing.".to_string();
    };
    let mut out = Vec::new();
    if !scheme.palette.is_empty() {
        out.push("  Color palette (use these exact values):".to_string());
        for (name, value) in &scheme.palette {
            out.push(format!("    - {}: {}", name, value));
        }
    }
    if !scheme.font.is_empty() {
        out.push(format!("  Fonts: {}", scheme.font.join(", ")));
    }
    if !scheme.features.is_empty() {
        out.push(format!("  Design features: {}", scheme.features.join(", ")));
    }
    if out.is_empty() {
        out.push("  The design scheme is empty; follow the existing look of the project.".to_string());
    }
    out.join("\n")
}

fn database_section(supabase: Option<&SupabaseContext>) -> String {
    match supabase {
        Some(SupabaseContext {
            is_connected: true,
            has_selected_project: true,
            credentials,
        }) => {
            let mut out = vec![
                "  A Supabase project is connected. Use it for all data persistence.".to_string(),
            ];
            if let Some(creds) = credentials {
                out.push("  Create a .env file with:".to_string());
                if let Some(url) = &creds.supabase_url {
                    out.push(format!("    VITE_SUPABASE_URL={}", url));
                }
                if let Some(key) = &creds.anon_key {
                    out.push(format!("    VITE_SUPABASE_ANON_KEY={}", key));
                }
            }
            out.push("  Write every schema change as a new SQL migration file; never edit an existing migration.".to_string());
            out.push("  Enable row level security on every new table.".to_string());
            out.join("\n")
        }
        Some(SupabaseContext {
            is_connected: true, ..
        }) => "  Supabase is connected but no project is selected. Remind the user to select a project before any database work.".to_string(),
        _ => "  No database is connected. If the request needs persistence, remind the user to connect Supabase first; do not invent credentials.".to_string(),
    }
}

fn default_prompt(options: &PromptOptions) -> String {
    format!(
        r#"You are Codesmith, an expert AI assistant and exceptional senior software developer with vast knowledge across programming languages, frameworks, and best practices.

<system_constraints>
  You are operating in an in-browser Node.js runtime. All project files live in the '{cwd}' directory.
  - Native binaries cannot be compiled or executed. Only JavaScript, WebAssembly and other browser-native code run.
  - Python is available but limited to the standard library; there is no pip.
  - There is no git.
  - Prefer Vite for web servers and Node.js scripts over shell scripts.
  - Prefer dependencies that do not need native bindings.
  - Available shell commands: cat, cp, ls, mkdir, mv, rm, rmdir, touch, hostname, ps, pwd, uptime, env, node, python3, code, jq, curl, head, sort, tail, clear, which, export, chmod, kill, ln, alias, getconf, loadenv, wasm, xdg-open, command, exit, source
</system_constraints>

<database_instructions>
{database}
</database_instructions>

<code_formatting_info>
  Use 2 spaces for code indentation.
</code_formatting_info>

<message_formatting_info>
  You can make the output pretty by using only the following available HTML elements: {allowed}
</message_formatting_info>

<diff_spec>
  For user-made file modifications, a `<{tag}>` section will appear at the start of the user message. It contains either `<diff>` or `<file>` elements for each modified file:
    - `<diff path="/some/file/path.ext">`: GNU unified diff changes
    - `<file path="/some/file/path.ext">`: the full new content of the file
  The system uses `<file>` when the diff would exceed the new content size. Always build on the latest user modifications.
</diff_spec>

<design_instructions>
{design}
  Build polished, production-ready interfaces: responsive layouts, accessible contrast, clear visual hierarchy and purposeful motion.
</design_instructions>

<artifact_info>
  Create a single, comprehensive artifact for each project. It contains every step: shell commands, files to create and their contents, and folders to create.

  <artifact_instructions>
    1. Think holistically before creating an artifact: consider all relevant files, previous file changes and dependencies.
    2. The current working directory is `{cwd}`.
    3. Wrap the content in opening and closing `<{artifact}>` tags with a `title` and a kebab-case `id` attribute. Reuse the id when updating an artifact.
    4. Use `<{action}>` tags for each step with a `type` attribute:
      - shell: run shell commands. Chain commands with `&&`, and pass `--yes` to npx.
      - file: write a file. Add a `filePath` attribute relative to the working directory. The content is the full file content.
      - start: start the dev server. Use it only when the application is not running yet or new dependencies were added.
    5. Order matters: create a file before a shell command uses it.
    6. Install dependencies first: add them to package.json, then run `npm install`.
    7. Always provide the FULL, updated content of a file. Never use placeholders such as "// rest of the code remains the same".
    8. Split functionality into small modules instead of one large file.
  </artifact_instructions>
</artifact_info>

NEVER use the word "artifact" when talking to the user. Do not explain the artifact unless asked. Be concise: answer first, then create the artifact with all necessary steps."#,
        cwd = options.cwd,
        database = database_section(options.database.as_ref()),
        allowed = allowed_elements(options),
        tag = options.modification_tag_name,
        design = design_section(options.design_scheme.as_ref()),
        artifact = ARTIFACT_TAG,
        action = ACTION_TAG,
    )
}

fn optimized_prompt(options: &PromptOptions) -> String {
    format!(
        r#"You are Codesmith, a senior software engineer working in the '{cwd}' directory of an in-browser Node.js runtime (no native binaries, no pip, no git).

<database_instructions>
{database}
</database_instructions>

<response_requirements>
  - Format replies with these HTML elements only: {allowed}
  - User edits arrive inside `<{tag}>` as `<diff>` or `<file>` elements; treat them as the latest state.
  - Be brief. Do not say "artifact" to the user.
</response_requirements>

<design_instructions>
{design}
</design_instructions>

<artifact_instructions>
  Put all work in one `<{artifact} id="kebab-id" title="...">` block containing ordered `<{action}>` steps:
  - type="file" filePath="relative/path": full file content, never partial
  - type="shell": commands chained with `&&`
  - type="start": start the dev server once
  Update package.json before installing dependencies.
</artifact_instructions>"#,
        cwd = options.cwd,
        database = database_section(options.database.as_ref()),
        allowed = allowed_elements(options),
        tag = options.modification_tag_name,
        design = design_section(options.design_scheme.as_ref()),
        artifact = ARTIFACT_TAG,
        action = ACTION_TAG,
    )
}

/// Planning and explanation mode; never emits file changes.
pub fn discuss_prompt() -> String {
    r#"You are a technical advisor helping a developer reason about their project. You plan, explain and review; you do not write files or run commands.

<response_guidelines>
  - Start by restating the user's goal in one sentence.
  - Reference the files and functions involved by name.
  - When proposing changes, describe them as a numbered plan with the affected files and what changes in each.
  - Point out risks, edge cases and missing information, and ask clarifying questions when the request is ambiguous.
  - Keep code snippets short and only use them to illustrate a point.
  - Never claim that a change has been applied.
</response_guidelines>

<quick_actions>
  End substantial answers with suggested next steps the user can take, such as "Implement this plan" or "Show an example".
</quick_actions>"#
        .to_string()
}

/// Diff-only mode. The response must be a single modification block.
pub fn patch_prompt(cwd: &str, tag: &str) -> String {
    format!(
        r#"You are a code patch generator for a project in the '{cwd}' directory. Turn the user's request into the minimal set of file changes.

<response_format>
<{tag}>
<diff path="src/example.ts">
@@ -1,3 +1,4 @@
 unchanged line
-removed line
+added line
+another added line
</diff>
</{tag}>
</response_format>

<rules>
  1. The response consists of the modification block shown in response_format and nothing else.
  2. Emit one `<diff path="...">` element per modified file. Paths are relative to the '{cwd}' directory.
  3. Diff bodies use unified diff hunks starting at `@@`. Omit the `---` and `+++` file header lines.
  4. Include three lines of unchanged context around every change where available.
  5. For a new file, use a single hunk starting with `@@ -0,0 +1,N @@`.
  6. Never change files that are not needed for the request.
  7. Do not add explanations, greetings, summaries, or markdown code fences.
</rules>"#,
        cwd = cwd,
        tag = tag,
    )
}
