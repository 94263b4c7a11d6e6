//! `${VAR}`/`${VAR-default}` interpolation of string values read from a
//! stack file (spec §6 "Configuration file format").
//!
//! Grounded on the Stack's "reader (which may interpolate `${VAR}` against
//! a process-wide environment)" (spec §4.1 step 4). Two special variables
//! are always available while a given file is being parsed:
//! `THIS_STACKFILE_FILE` (the file's path) and `THIS_STACKFILE_DIR` (its
//! parent directory).

use crate::error::{inv_arg, Result};
use std::path::Path;

/// Substitutes every `${NAME}`/`${NAME-default}` occurrence in `text`
/// against `getenv`, plus the two stackfile-relative variables derived
/// from `file`. `${NAME}` with no default and no value in `getenv` is an
/// error unless `undefined_ok` is set, in which case it is replaced with
/// the empty string.
pub fn interpolate(
    text: &str,
    file: &Path,
    undefined_ok: bool,
    getenv: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let this_file = file.display().to_string();
    let this_dir = file
        .parent()
        .map(|d| d.display().to_string())
        .unwrap_or_default();

    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
            let close = chars[i + 2..]
                .iter()
                .position(|c| *c == '}')
                .map(|idx| i + 2 + idx)
                .ok_or_else(|| inv_arg::<()>("unterminated ${...} interpolation").unwrap_err())?;
            let inner: String = chars[i + 2..close].iter().collect();
            let (name, default) = match inner.find('-') {
                Some(idx) => (inner[..idx].to_owned(), Some(inner[idx + 1..].to_owned())),
                None => (inner.clone(), None),
            };
            let value = match name.as_str() {
                "THIS_STACKFILE_FILE" => Some(this_file.clone()),
                "THIS_STACKFILE_DIR" => Some(this_dir.clone()),
                _ => getenv(&name),
            };
            match value.or(default) {
                Some(resolved) => out.push_str(&resolved),
                None if undefined_ok => {}
                None => {
                    return inv_arg(format!(
                        "interpolation variable '{}' is undefined and has no default",
                        name
                    ))
                }
            }
            i = close + 1;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file() -> PathBuf {
        PathBuf::from("/tmp/stacks/base.json")
    }

    #[test]
    fn substitutes_environment_variable() {
        let result = interpolate("${FOO}", &file(), false, |name| {
            if name == "FOO" {
                Some("bar".to_owned())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(result, "bar");
    }

    #[test]
    fn falls_back_to_default_when_undefined() {
        let result = interpolate("${MISSING-fallback}", &file(), false, |_| None).unwrap();
        assert_eq!(result, "fallback");
    }

    #[test]
    fn undefined_without_default_errors_unless_allowed() {
        assert!(interpolate("${MISSING}", &file(), false, |_| None).is_err());
        assert_eq!(
            interpolate("${MISSING}", &file(), true, |_| None).unwrap(),
            ""
        );
    }

    #[test]
    fn stackfile_variables_resolve_to_the_parsed_file() {
        let result = interpolate(
            "${THIS_STACKFILE_DIR}/plugins",
            &file(),
            false,
            |_| None,
        )
        .unwrap();
        assert_eq!(result, "/tmp/stacks/plugins");
    }
}
