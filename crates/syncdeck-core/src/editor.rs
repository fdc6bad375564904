use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

pub const GUI_OVERRIDE_VAR: &str = "SYNCDECK_EDITOR_IS_GUI";

const GUI_EDITORS: &[&str] = &[
    "code",
    "code-insiders",
    "zed",
    "subl",
    "sublime",
    "sublime_text",
    "atom",
    "gedit",
    "gnome-text-editor",
    "kwrite",
    "kate",
    "mousepad",
    "xed",
    "pluma",
    "bbedit",
    "textmate",
    "textedit",
    "xcode",
    "macvim",
    "gvim",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("invalid editor command {0:?}")]
    Invalid(String),
}

/// Environment lookups, so classification can be tested without touching
/// the process environment.
pub trait EditorEnv {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EditorEnv for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

impl EditorEnv for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    /// Spawned detached; never blocks the UI.
    Gui,
    /// Runs in the foreground with the terminal UI suspended.
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    pub program: String,
    pub args: Vec<String>,
    pub kind: EditorKind,
}

impl EditorCommand {
    /// `$VISUAL`, then `$EDITOR`, then `vim`, with `file` appended.
    pub fn resolve(env: &dyn EditorEnv, file: &Path) -> Result<Self, EditorError> {
        let raw = env
            .var("VISUAL")
            .or_else(|| env.var("EDITOR"))
            .unwrap_or_else(|| "vim".to_string());

        let mut parts = split_command(&raw).into_iter();
        let program = parts.next().ok_or_else(|| EditorError::Invalid(raw.clone()))?;
        let mut args: Vec<String> = parts.collect();
        args.push(file.display().to_string());

        let kind = classify(env, &program);
        Ok(Self {
            program,
            args,
            kind,
        })
    }
}

pub fn classify(env: &dyn EditorEnv, program: &str) -> EditorKind {
    if matches!(env.var(GUI_OVERRIDE_VAR).as_deref(), Some("1" | "true")) {
        return EditorKind::Gui;
    }
    if env.var("SSH_CLIENT").is_some() || env.var("SSH_TTY").is_some() {
        return EditorKind::Terminal;
    }

    let name = program
        .rsplit('/')
        .next()
        .unwrap_or(program)
        .to_lowercase();
    if GUI_EDITORS.iter().any(|gui| name.contains(gui)) {
        return EditorKind::Gui;
    }
    EditorKind::Terminal
}

/// Splits on spaces outside single or double quotes. Quotes are dropped.
pub fn split_command(command: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in command.chars() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ' ' if !in_single && !in_double => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
