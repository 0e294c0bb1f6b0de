//! Native message boxes and file dialogs.
//!
//! Every dialog is async and modal; block on it with any executor
//! (`pollster::block_on` is enough).

#![warn(missing_docs)]

mod error;
mod sys;

pub use error::DialogError;
use std::path::PathBuf;

/// Types of dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogType {
    /// Information dialog.
    #[default]
    Info,
    /// Warning dialog.
    Warning,
    /// Error dialog.
    Error,
}

/// A native dialog.
#[derive(Debug, Clone)]
pub struct Dialog {
    /// Title of the dialog.
    pub title: String,
    /// Message content of the dialog.
    pub message: String,
    /// Type/Icon of the dialog.
    pub type_: DialogType,
}

impl Dialog {
    /// Create a new dialog with default Info type.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            type_: DialogType::Info,
        }
    }

    /// Set the dialog type.
    #[must_use]
    pub const fn with_type(mut self, type_: DialogType) -> Self {
        self.type_ = type_;
        self
    }

    /// Show the dialog.
    /// Returns when the user dismisses the dialog.
    ///
    /// # Errors
    /// Returns an error if the native dialog cannot be shown.
    pub async fn show(self) -> Result<(), DialogError> {
        sys::show_alert(self).await
    }

    /// Show a confirmation dialog (OK/Cancel).
    /// Returns true if confirmed, false otherwise.
    ///
    /// # Errors
    /// Returns an error if the native dialog cannot be shown.
    pub async fn show_confirm(self) -> Result<bool, DialogError> {
        sys::show_confirm(self).await
    }
}

/// A native file dialog (open/save).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDialog {
    /// Title of the dialog
    pub title: Option<String>,
    /// Starting directory
    pub location: Option<PathBuf>,
    /// Suggested file name
    pub file_name: Option<String>,
    /// File filters name -> [extensions]
    pub filters: Vec<(String, Vec<String>)>,
}

impl FileDialog {
    /// Create a new file dialog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title of the dialog.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the starting location.
    #[must_use]
    pub fn set_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Set the suggested file name.
    #[must_use]
    pub fn set_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Add a file extension filter.
    /// Usage: `.add_filter("JPEG Image", &["jpg", "jpeg"])`
    #[must_use]
    pub fn add_filter(mut self, name: impl Into<String>, extensions: &[&str]) -> Self {
        self.filters.push((
            name.into(),
            extensions.iter().map(ToString::to_string).collect(),
        ));
        self
    }

    /// Show the dialog to select a single file to open.
    ///
    /// Returns `None` if the user cancels.
    ///
    /// # Errors
    /// Returns an error if the native dialog cannot be shown.
    pub async fn show_open_single_file(self) -> Result<Option<PathBuf>, DialogError> {
        sys::show_open_single_file(self).await
    }

    /// Show the dialog to choose where to save a file.
    ///
    /// Returns `None` if the user cancels.
    ///
    /// # Errors
    /// Returns an error if the native dialog cannot be shown.
    pub async fn show_save_file(self) -> Result<Option<PathBuf>, DialogError> {
        sys::show_save_file(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_dialog_builder_collects_options() {
        let dialog = FileDialog::new()
            .with_title("Save Video")
            .set_location("/tmp")
            .set_file_name("clip.avi")
            .add_filter("AVI Video", &["avi"])
            .add_filter("MP4 Video", &["mp4"]);

        assert_eq!(dialog.title.as_deref(), Some("Save Video"));
        assert_eq!(dialog.location, Some(PathBuf::from("/tmp")));
        assert_eq!(dialog.file_name.as_deref(), Some("clip.avi"));
        assert_eq!(
            dialog.filters,
            vec![
                ("AVI Video".to_string(), vec!["avi".to_string()]),
                ("MP4 Video".to_string(), vec!["mp4".to_string()]),
            ]
        );
    }

    #[test]
    fn dialogs_default_to_info() {
        let dialog = Dialog::new("Title", "Message");
        assert_eq!(dialog.type_, DialogType::Info);
        assert_eq!(dialog.with_type(DialogType::Error).type_, DialogType::Error);
    }
}
