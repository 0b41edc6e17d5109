use std::path::{Path, PathBuf};

pub use pickup_core::config::pickup_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn run_dir(home: &Path) -> PathBuf {
    pickup_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    pickup_root(home).join(DAEMON_SOCKET)
}
