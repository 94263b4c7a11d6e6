//! Resolves an `include` entry to a parsed [`Conf`], optionally
//! interpolating `${VAR}` against the process environment (spec §4.1 step
//! 4: "Resolve the file via the configured reader (which may interpolate
//! `${VAR}` against a process-wide environment)").

use super::{interpolate::interpolate, Conf};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Abstracts how a stack file's `include` entries are turned into parsed
/// [`Conf`] trees, so tests can substitute an in-memory reader instead of
/// touching the filesystem.
pub trait ConfReader {
    fn read(&self, path: &Path, from_file: Option<&Path>) -> Result<Conf>;
}

/// The engine's real reader: resolves relative include paths against the
/// including file's directory, reads from disk, and interpolates
/// `${VAR}`/`${VAR-default}` when enabled.
pub struct FileConfReader {
    pub interpolate: bool,
    pub interpolate_undefined_ok: bool,
}

impl FileConfReader {
    pub fn new(interpolate: bool, interpolate_undefined_ok: bool) -> FileConfReader {
        FileConfReader {
            interpolate,
            interpolate_undefined_ok,
        }
    }

    fn resolve_path(&self, path: &Path, from_file: Option<&Path>) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match from_file.and_then(|f| f.parent()) {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl ConfReader for FileConfReader {
    fn read(&self, path: &Path, from_file: Option<&Path>) -> Result<Conf> {
        let resolved = self.resolve_path(path, from_file);
        let text = std::fs::read_to_string(&resolved)?;
        let text = if self.interpolate {
            interpolate(&text, &resolved, self.interpolate_undefined_ok, |name| {
                std::env::var(name).ok()
            })?
        } else {
            text
        };
        let value = serde_json::from_str(&text)?;
        Ok(Conf::from_file(value, resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_and_parses_relative_include() {
        let dir = tempfile::tempdir().unwrap();
        let included = dir.path().join("child.json");
        std::fs::write(&included, r#"{"version": "4.1"}"#).unwrap();
        let root = dir.path().join("root.json");
        std::fs::File::create(&root).unwrap();

        let reader = FileConfReader::new(false, false);
        let conf = reader.read(Path::new("child.json"), Some(&root)).unwrap();
        assert_eq!(conf.at("version").unwrap().value(), &serde_json::json!("4.1"));
    }

    #[test]
    fn interpolates_environment_variables_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("child.json");
        let mut f = std::fs::File::create(&file).unwrap();
        write!(f, r#"{{"version": "${{STACK_VERSION-4.1}}"}}"#).unwrap();

        let reader = FileConfReader::new(true, false);
        let conf = reader.read(&file, None).unwrap();
        assert_eq!(conf.at("version").unwrap().value(), &serde_json::json!("4.1"));
    }
}
