//! User-facing messages and path prompts.

use camkit_dialog::{Dialog, DialogType, FileDialog};
use std::path::PathBuf;

const TITLE: &str = "camkit";

/// Severity of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A save-file prompt.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub title: &'static str,
    pub directory: PathBuf,
    pub file_name: String,
    pub filters: &'static [(&'static str, &'static [&'static str])],
}

/// Modal interaction with the user.
pub trait Prompter {
    /// Show `text` and return once the user has dismissed it.
    fn message(&self, level: Level, text: &str);

    /// Ask where to save a file. `None` when the user cancels.
    fn save_path(&self, request: &SaveRequest) -> Option<PathBuf>;
}

/// Native message boxes and save dialogs.
#[derive(Debug, Default)]
pub struct NativePrompter;

impl Prompter for NativePrompter {
    fn message(&self, level: Level, text: &str) {
        let type_ = match level {
            Level::Info => DialogType::Info,
            Level::Warning => DialogType::Warning,
            Level::Error => DialogType::Error,
        };
        let dialog = Dialog::new(TITLE, text).with_type(type_);
        if let Err(e) = pollster::block_on(dialog.show()) {
            log::error!("Failed to show dialog ({e}): {text}");
        }
    }

    fn save_path(&self, request: &SaveRequest) -> Option<PathBuf> {
        let dialog = request.filters.iter().fold(
            FileDialog::new()
                .with_title(request.title)
                .set_location(&request.directory)
                .set_file_name(&request.file_name),
            |dialog, (name, extensions)| dialog.add_filter(*name, extensions),
        );
        match pollster::block_on(dialog.show_save_file()) {
            Ok(path) => path,
            Err(e) => {
                log::error!("Failed to show save dialog: {e}");
                None
            }
        }
    }
}
