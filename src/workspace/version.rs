use std::io::Write;
use std::path::Path;

use crate::error::{AppError, Precondition, Result};

/// Trim the input and drop a leading `v`/`V`.
pub fn normalize_version(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    stripped.trim().to_string()
}

/// Read the version file, trimmed. A missing or unreadable file reads as empty.
pub fn read_version(root: &Path, file_name: &str) -> String {
    match std::fs::read_to_string(root.join(file_name)) {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            tracing::debug!(error = %e, file = file_name, "Version file not readable");
            String::new()
        }
    }
}

/// Atomically replace the version file with the normalized version.
///
/// Returns the version as stored.
pub fn write_version(root: &Path, file_name: &str, raw: &str) -> Result<String> {
    let version = normalize_version(raw);
    if version.is_empty() {
        return Err(Precondition::VersionEmpty.into());
    }

    let target = root.join(file_name);
    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(format!("{version}\n").as_bytes())?;
    match_permissions(tmp.as_file(), &target)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&target)
        .map_err(|e| AppError::Io(e.error))?;

    tracing::info!(version = %version, path = %target.display(), "Wrote version file");
    Ok(version)
}

/// Give the temp file the target's permissions, or `0644` for a new file.
/// Temp files start owner-only and would otherwise land as `0600`.
fn match_permissions(file: &std::fs::File, target: &Path) -> Result<()> {
    match std::fs::metadata(target) {
        Ok(meta) => file.set_permissions(meta.permissions())?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => set_new_file_mode(file)?,
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(unix)]
fn set_new_file_mode(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_new_file_mode(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

/// `v<version>` equals the latest tag. False when either side is empty.
pub fn version_matches_tag(version: &str, latest_tag: &str) -> bool {
    !version.is_empty() && !latest_tag.is_empty() && format!("v{version}") == latest_tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("1.4.0"), "1.4.0");
        assert_eq!(normalize_version("  v1.4.0 \n"), "1.4.0");
        assert_eq!(normalize_version("V2.0.0"), "2.0.0");
        assert_eq!(normalize_version("v"), "");
        assert_eq!(normalize_version("   "), "");
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let stored = write_version(tmp.path(), "VERSION", "1.4.0").unwrap();
        assert_eq!(stored, "1.4.0");
        assert_eq!(read_version(tmp.path(), "VERSION"), "1.4.0");

        let raw = std::fs::read_to_string(tmp.path().join("VERSION")).unwrap();
        assert_eq!(raw, "1.4.0\n");
    }

    #[test]
    fn test_write_strips_leading_v() {
        let tmp = tempfile::tempdir().unwrap();
        write_version(tmp.path(), "VERSION", "v1.4.0").unwrap();
        assert_eq!(read_version(tmp.path(), "VERSION"), "1.4.0");
    }

    #[test]
    fn test_write_overwrites_existing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("VERSION"), "0.9.0\n").unwrap();
        write_version(tmp.path(), "VERSION", "1.0.0").unwrap();
        assert_eq!(read_version(tmp.path(), "VERSION"), "1.0.0");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("VERSION");
        std::fs::write(&path, "1.3.0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o664)).unwrap();

        write_version(tmp.path(), "VERSION", "1.4.0").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        write_version(tmp.path(), "VERSION", "1.4.0").unwrap();
        let mode = std::fs::metadata(tmp.path().join("VERSION"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_write_empty_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = write_version(tmp.path(), "VERSION", " v ").unwrap_err();
        assert_eq!(err.to_string(), "VERSION is empty.");
        assert!(!tmp.path().join("VERSION").exists());
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(read_version(tmp.path(), "VERSION"), "");
    }

    #[test]
    fn test_version_matches_tag() {
        assert!(version_matches_tag("2.0.0", "v2.0.0"));
        assert!(!version_matches_tag("2.0.0", "v1.9.9"));
        assert!(!version_matches_tag("", "v2.0.0"));
        assert!(!version_matches_tag("2.0.0", ""));
        assert!(!version_matches_tag("2.0.0", "2.0.0"));
    }
}
