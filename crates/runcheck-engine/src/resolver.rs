//! Command resolution: positional placeholders and magic tokens.
//!
//! A step's `command` is a format string with positional placeholders
//! (`{0}`, `{1}`, …) filled from the step's `args`. The result, and the
//! step's `runtime`, then go through a textual magic-token substitution
//! pass that injects path and working-directory context:
//!
//! - `ALL_FILES_IN_DIR` — space-joined absolute paths of every file in the
//!   candidate's parent directory
//! - `FILE_NAME_WEX` — the candidate's filename without its extension
//! - `FILE_PATH` — the candidate's path as given
//! - `WORKING_DIR_FULL` — absolute path of the working directory
//! - `WORKING_DIR` — the working directory exactly as configured
//!
//! Unknown tokens pass through verbatim. The two passes are deliberately
//! ordered: placeholders first, then tokens, so args may themselves be
//! magic tokens.

use std::path::{Path, PathBuf};

use runcheck_types::StepConfig;

/// A positional placeholder with no matching argument (or a malformed
/// placeholder). Recovered locally as a failed step, never a crash.
#[derive(Debug, thiserror::Error)]
#[error("could not resolve command template: {0}")]
pub struct TemplateError(pub String);

/// A fully substituted `(runtime, arguments)` pair ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub runtime: String,
    pub arguments: String,
}

/// Resolves step templates against a candidate file and the configured
/// working directory.
pub struct CommandResolver {
    working_dir: String,
    working_dir_full: String,
}

impl CommandResolver {
    pub fn new(working_dir: &Path) -> Self {
        let as_given = working_dir
            .to_string_lossy()
            .trim_end_matches(std::path::MAIN_SEPARATOR)
            .to_string();
        let full = absolute(working_dir).to_string_lossy().into_owned();
        Self {
            working_dir: as_given,
            working_dir_full: full,
        }
    }

    /// Resolve one step against a candidate file: placeholders into the
    /// command string, then magic tokens into both strings.
    pub fn resolve_step(
        &self,
        step: &StepConfig,
        file: &Path,
    ) -> Result<ResolvedStep, TemplateError> {
        let formatted = fill_placeholders(&step.command, &step.args)?;
        Ok(ResolvedStep {
            runtime: self.substitute_tokens(&step.runtime, file),
            arguments: self.substitute_tokens(&formatted, file),
        })
    }

    /// Single left-to-right, non-overlapping replacement pass per token.
    /// `WORKING_DIR_FULL` is handled before `WORKING_DIR`, its prefix.
    pub fn substitute_tokens(&self, template: &str, file: &Path) -> String {
        let mut out = template.to_string();

        if out.contains("ALL_FILES_IN_DIR") {
            out = out.replace("ALL_FILES_IN_DIR", &all_files_in_dir(file));
        }

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        out.replace("FILE_NAME_WEX", &stem)
            .replace("FILE_PATH", &file.to_string_lossy())
            .replace("WORKING_DIR_FULL", &self.working_dir_full)
            .replace("WORKING_DIR", &self.working_dir)
    }
}

/// Fill `{0}`, `{1}`, … from `args`. `{{` and `}}` are literal braces. An
/// index past the end of `args`, or a malformed placeholder, is an error.
pub fn fill_placeholders(command: &str, args: &[String]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(command.len());
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        Some('}') => break,
                        _ => {
                            return Err(TemplateError(format!(
                                "malformed placeholder in command '{command}'"
                            )))
                        }
                    }
                }
                let index: usize = digits.parse().map_err(|_| {
                    TemplateError(format!("malformed placeholder in command '{command}'"))
                })?;
                let arg = args.get(index).ok_or_else(|| {
                    TemplateError(format!(
                        "placeholder {{{index}}} has no matching argument (command '{command}', {} args)",
                        args.len()
                    ))
                })?;
                out.push_str(arg);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Space-joined absolute paths of every file in the candidate's parent
/// directory, each followed by a space. Entries are sorted so resolution is
/// deterministic across platforms.
fn all_files_in_dir(file: &Path) -> String {
    let parent = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut paths: Vec<PathBuf> = match std::fs::read_dir(&parent) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .map(|p| absolute(&p))
            .collect(),
        Err(e) => {
            tracing::warn!(dir = %parent.display(), error = %e, "could not enumerate sibling files");
            Vec::new()
        }
    };
    paths.sort();

    let mut joined = String::new();
    for path in paths {
        joined.push_str(&path.to_string_lossy());
        joined.push(' ');
    }
    joined
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(working_dir: &Path) -> CommandResolver {
        CommandResolver::new(working_dir)
    }

    // --- fill_placeholders ---

    #[test]
    fn placeholders_filled_in_order() {
        let args = vec!["one".to_string(), "two".to_string()];
        assert_eq!(
            fill_placeholders("-o {0} {1} -lm", &args).unwrap(),
            "-o one two -lm"
        );
    }

    #[test]
    fn placeholder_reuse_and_no_placeholders() {
        let args = vec!["x".to_string()];
        assert_eq!(fill_placeholders("{0} {0}", &args).unwrap(), "x x");
        assert_eq!(fill_placeholders("plain", &args).unwrap(), "plain");
        assert_eq!(fill_placeholders("", &[]).unwrap(), "");
    }

    #[test]
    fn placeholder_without_argument_is_an_error() {
        let args = vec!["only".to_string()];
        let err = fill_placeholders("-o {0} {1}", &args).unwrap_err();
        assert!(err.to_string().contains("{1}"));
    }

    #[test]
    fn malformed_placeholder_is_an_error() {
        assert!(fill_placeholders("{x}", &[]).is_err());
        assert!(fill_placeholders("{0", &[]).is_err());
    }

    #[test]
    fn doubled_braces_are_literal() {
        assert_eq!(fill_placeholders("{{0}}", &[]).unwrap(), "{0}");
    }

    // --- magic tokens ---

    #[test]
    fn file_tokens_substituted() {
        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let file = Path::new("/x/code/impl.s");

        assert_eq!(r.substitute_tokens("FILE_NAME_WEX", file), "impl");
        assert_eq!(r.substitute_tokens("FILE_PATH", file), "/x/code/impl.s");
        assert_eq!(
            r.substitute_tokens("run FILE_NAME_WEX now", file),
            "run impl now"
        );
    }

    #[test]
    fn working_dir_full_replaced_before_its_prefix() {
        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let file = Path::new("a.c");

        let resolved = r.substitute_tokens("WORKING_DIR_FULL|WORKING_DIR", file);
        let full = work.path().canonicalize().unwrap();
        let expected = format!(
            "{}|{}",
            full.display(),
            work.path()
                .to_string_lossy()
                .trim_end_matches(std::path::MAIN_SEPARATOR)
        );
        assert_eq!(resolved, expected);
    }

    #[test]
    fn unknown_tokens_left_verbatim() {
        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        assert_eq!(
            r.substitute_tokens("SOME_OTHER_TOKEN", Path::new("a.c")),
            "SOME_OTHER_TOKEN"
        );
    }

    #[test]
    fn all_files_in_dir_joins_sorted_siblings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("impl.s"), "").unwrap();
        std::fs::write(dir.path().join("helper.s"), "").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let candidate = dir.path().join("impl.s");
        let resolved = r.substitute_tokens("ALL_FILES_IN_DIR", &candidate);

        let base = dir.path().canonicalize().unwrap();
        assert_eq!(
            resolved,
            format!(
                "{} {} ",
                base.join("helper.s").display(),
                base.join("impl.s").display()
            )
        );
    }

    #[test]
    fn substitution_is_idempotent() {
        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let file = Path::new("/x/code/impl.s");

        let once = r.substitute_tokens("FILE_NAME_WEX FILE_PATH", file);
        let twice = r.substitute_tokens(&once, file);
        assert_eq!(once, twice);
    }

    // --- resolve_step ---

    #[test]
    fn resolve_step_placeholders_then_tokens() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("impl.s"), "").unwrap();
        std::fs::write(dir.path().join("helper.s"), "").unwrap();

        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let step = StepConfig {
            runtime: "gcc".into(),
            command: "-o {0} {1}".into(),
            args: vec!["FILE_NAME_WEX".into(), "ALL_FILES_IN_DIR".into()],
        };
        let resolved = r.resolve_step(&step, &dir.path().join("impl.s")).unwrap();

        let base = dir.path().canonicalize().unwrap();
        assert_eq!(resolved.runtime, "gcc");
        assert_eq!(
            resolved.arguments,
            format!(
                "-o impl {} {} ",
                base.join("helper.s").display(),
                base.join("impl.s").display()
            )
        );
    }

    #[test]
    fn resolve_step_runtime_tokens_substituted() {
        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let step = StepConfig {
            runtime: "WORKING_DIR/FILE_NAME_WEX".into(),
            command: "".into(),
            args: vec![],
        };
        let resolved = r.resolve_step(&step, Path::new("/x/code/verlet.c")).unwrap();
        assert_eq!(
            resolved.runtime,
            format!(
                "{}/verlet",
                work.path()
                    .to_string_lossy()
                    .trim_end_matches(std::path::MAIN_SEPARATOR)
            )
        );
        assert!(resolved.arguments.is_empty());
    }

    #[test]
    fn resolve_step_missing_arg_is_template_error() {
        let work = TempDir::new().unwrap();
        let r = resolver(work.path());
        let step = StepConfig {
            runtime: "gcc".into(),
            command: "-o {0} {1}".into(),
            args: vec!["FILE_NAME_WEX".into()],
        };
        assert!(r.resolve_step(&step, Path::new("a.c")).is_err());
    }
}
