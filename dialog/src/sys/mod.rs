#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
mod desktop;
#[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
pub use desktop::{show_alert, show_confirm, show_open_single_file, show_save_file};

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
mod fallback {
    use crate::{Dialog, DialogError, FileDialog};
    use std::path::PathBuf;

    fn unsupported() -> DialogError {
        DialogError::NotSupported("native dialogs need a desktop platform".into())
    }

    pub async fn show_alert(_: Dialog) -> Result<(), DialogError> {
        Err(unsupported())
    }

    pub async fn show_confirm(_: Dialog) -> Result<bool, DialogError> {
        Err(unsupported())
    }

    pub async fn show_open_single_file(_: FileDialog) -> Result<Option<PathBuf>, DialogError> {
        Err(unsupported())
    }

    pub async fn show_save_file(_: FileDialog) -> Result<Option<PathBuf>, DialogError> {
        Err(unsupported())
    }
}
#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
pub use fallback::{show_alert, show_confirm, show_open_single_file, show_save_file};
