//! Helpers for external executables.

use std::path::Path;

/// Whether `binary` can be executed: an existing path, or a bare name found
/// in one of the `PATH` directories. The value is never handed to a shell.
pub fn command_exists(binary: &str) -> bool {
    if binary.trim().is_empty() {
        return false;
    }

    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return is_executable(candidate);
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(binary))))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        assert!(!command_exists("shaderloop-no-such-binary-4242"));
        assert!(!command_exists("/no/such/dir/ffmpeg"));
        assert!(!command_exists(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_is_found() {
        assert!(command_exists("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_metacharacters_are_not_executed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let hostile = format!("sh; touch {}", marker.display());

        assert!(!command_exists(&hostile));
        assert!(!command_exists("sh && true"));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_path_with_spaces() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool_dir = dir.path().join("my tools");
        std::fs::create_dir_all(&tool_dir).unwrap();
        let tool = tool_dir.join("ffmpeg wrapper");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        assert!(!command_exists(tool.to_str().unwrap()), "not executable yet");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(command_exists(tool.to_str().unwrap()));
    }
}
