use std::path::PathBuf;

/// Errors that stop the file watcher from starting. Problems with
/// individual files after start are logged and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watched root {} does not exist or is not a directory", path.display())]
    MissingRoot { path: PathBuf },

    #[error("cannot create filesystem watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("cannot watch {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
