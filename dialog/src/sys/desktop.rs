use crate::{Dialog, DialogError, DialogType, FileDialog};
use futures::channel::oneshot;
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use std::path::PathBuf;

const fn level(type_: DialogType) -> MessageLevel {
    match type_ {
        DialogType::Info => MessageLevel::Info,
        DialogType::Warning => MessageLevel::Warning,
        DialogType::Error => MessageLevel::Error,
    }
}

/// Show an alert dialog.
///
/// # Errors
/// Returns an error if the native dialog fails to show.
pub async fn show_alert(dialog: Dialog) -> Result<(), DialogError> {
    let (tx, rx) = oneshot::channel();

    std::thread::spawn(move || {
        MessageDialog::new()
            .set_level(level(dialog.type_))
            .set_title(&dialog.title)
            .set_description(&dialog.message)
            .set_buttons(MessageButtons::Ok)
            .show();

        let _ = tx.send(());
    });

    rx.await
        .map_err(|_| DialogError::PlatformError("Dialog panicked or channel closed".into()))
}

/// Show a confirmation dialog.
///
/// # Errors
/// Returns an error if the native dialog fails to show.
pub async fn show_confirm(dialog: Dialog) -> Result<bool, DialogError> {
    let (tx, rx) = oneshot::channel();

    std::thread::spawn(move || {
        let result = MessageDialog::new()
            .set_level(level(dialog.type_))
            .set_title(&dialog.title)
            .set_description(&dialog.message)
            .set_buttons(MessageButtons::OkCancel)
            .show();

        let confirmed = matches!(result, MessageDialogResult::Ok | MessageDialogResult::Yes);

        let _ = tx.send(confirmed);
    });

    rx.await
        .map_err(|_| DialogError::PlatformError("Dialog panicked or channel closed".into()))
}

fn builder(dialog: &FileDialog) -> rfd::AsyncFileDialog {
    let mut builder = rfd::AsyncFileDialog::new();

    if let Some(location) = &dialog.location {
        builder = builder.set_directory(location);
    }

    if let Some(title) = &dialog.title {
        builder = builder.set_title(title);
    }

    if let Some(name) = &dialog.file_name {
        builder = builder.set_file_name(name);
    }

    for (name, extensions) in &dialog.filters {
        let exts: Vec<&str> = extensions.iter().map(String::as_str).collect();
        builder = builder.add_filter(name, &exts);
    }

    builder
}

/// Show a file dialog to open a single file.
///
/// # Errors
/// Returns an error if the native dialog fails to show.
pub async fn show_open_single_file(dialog: FileDialog) -> Result<Option<PathBuf>, DialogError> {
    let result = builder(&dialog).pick_file().await;
    Ok(result.map(|f| f.path().to_path_buf()))
}

/// Show a file dialog to choose a path to save to.
///
/// # Errors
/// Returns an error if the native dialog fails to show.
pub async fn show_save_file(dialog: FileDialog) -> Result<Option<PathBuf>, DialogError> {
    let result = builder(&dialog).save_file().await;
    Ok(result.map(|f| f.path().to_path_buf()))
}
