//! Processor that delegates each file to an external program.
//!
//! Exit status mapping:
//! - `0` is success; stdout is parsed as a JSON object for metadata when
//!   possible.
//! - codes listed in `transient_exit_codes`, or termination by a signal,
//!   are transient failures.
//! - anything else is a permanent failure carrying the tail of stderr.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;

use super::{
    ContentProcessor, Metadata, Outcome, ProcessorError, ProcessorResult, extension_allowed,
};
use crate::config::ProcessorConfig;

/// Placeholder replaced by the file path inside configured arguments.
const PATH_PLACEHOLDER: &str = "{path}";

/// Bytes of stderr/stdout kept in failure reasons and metadata.
const OUTPUT_TAIL_BYTES: usize = 2_000;

#[derive(Debug, Default)]
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
    extensions: Vec<String>,
    transient_exit_codes: Vec<i32>,
    initialized: bool,
}

impl CommandProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_args(&self, path: &Path) -> Vec<String> {
        let path_str = path.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(PATH_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(PATH_PLACEHOLDER, &path_str)
                } else {
                    arg.clone()
                }
            })
            .collect();

        if !substituted {
            args.push(path_str.into_owned());
        }
        args
    }
}

#[async_trait]
impl ContentProcessor for CommandProcessor {
    fn name(&self) -> &str {
        "command"
    }

    async fn initialize(&mut self, config: &ProcessorConfig) -> ProcessorResult<()> {
        let program = config.command.trim();
        if program.is_empty() {
            return Err(ProcessorError::Config {
                reason: "processor.command must be set for the command processor".to_string(),
            });
        }

        self.program = program.to_string();
        self.args = config.args.clone();
        self.extensions = config.extensions.clone();
        self.transient_exit_codes = config.transient_exit_codes.clone();
        self.initialized = true;

        crate::debug_event!("processor", "command ready", "{} {:?}", self.program, self.args);
        Ok(())
    }

    fn supports(&self, path: &Path) -> bool {
        extension_allowed(&self.extensions, path)
    }

    async fn process(&self, path: &Path) -> ProcessorResult<Outcome> {
        if !self.initialized {
            return Err(ProcessorError::NotInitialized {
                name: self.name().to_string(),
            });
        }

        // kill_on_drop lets the orchestrator's timeout terminate the child
        let output = Command::new(&self.program)
            .args(self.build_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProcessorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr = tail(&String::from_utf8_lossy(&output.stderr));

        let Some(code) = output.status.code() else {
            return Ok(Outcome::TransientFailure(format!(
                "'{}' was terminated by a signal",
                self.program
            )));
        };

        if code == 0 {
            return Ok(Outcome::Success(parse_metadata(&output.stdout, code)));
        }

        let reason = if stderr.is_empty() {
            format!("'{}' exited with status {code}", self.program)
        } else {
            format!("'{}' exited with status {code}: {stderr}", self.program)
        };

        if self.transient_exit_codes.contains(&code) {
            Ok(Outcome::TransientFailure(reason))
        } else {
            Ok(Outcome::PermanentFailure(reason))
        }
    }
}

fn parse_metadata(stdout: &[u8], code: i32) -> Metadata {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(stdout) {
        return map;
    }

    let mut metadata = Metadata::new();
    metadata.insert("exit_code".into(), json!(code));
    let text = tail(&String::from_utf8_lossy(stdout));
    if !text.is_empty() {
        metadata.insert("stdout".into(), json!(text));
    }
    metadata
}

/// Last `OUTPUT_TAIL_BYTES` of trimmed output, cut on a char boundary.
fn tail(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= OUTPUT_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - OUTPUT_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(command: &str, args: &[&str]) -> ProcessorConfig {
        ProcessorConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            extensions: Vec::new(),
            ..ProcessorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_initialize_requires_command() {
        let mut processor = CommandProcessor::new();
        let err = processor.initialize(&config("  ", &[])).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Config { .. }));
    }

    #[tokio::test]
    async fn test_args_substitute_or_append_path() {
        let mut processor = CommandProcessor::new();
        processor
            .initialize(&config("ingest", &["--file={path}", "-v"]))
            .await
            .unwrap();
        assert_eq!(
            processor.build_args(Path::new("/src/a.txt")),
            vec!["--file=/src/a.txt", "-v"]
        );

        processor.args = vec!["-v".to_string()];
        assert_eq!(
            processor.build_args(Path::new("/src/a.txt")),
            vec!["-v", "/src/a.txt"]
        );
    }

    #[test]
    fn test_parse_metadata_prefers_json_object() {
        let meta = parse_metadata(br#"{"chunks": 4, "collection": "docs"}"#, 0);
        assert_eq!(meta["chunks"], json!(4));
        assert_eq!(meta["collection"], json!("docs"));

        let meta = parse_metadata(b"indexed ok\n", 0);
        assert_eq!(meta["stdout"], json!("indexed ok"));
        assert_eq!(meta["exit_code"], json!(0));
    }

    #[test]
    fn test_tail_keeps_end_of_long_output() {
        let long = format!("{}END", "é".repeat(OUTPUT_TAIL_BYTES));
        let cut = tail(&long);
        assert!(cut.len() <= OUTPUT_TAIL_BYTES);
        assert!(cut.ends_with("END"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_codes_map_to_outcomes() {
        let mut ok = CommandProcessor::new();
        ok.initialize(&config("sh", &["-c", "echo '{\"n\": 1}'", "{path}"]))
            .await
            .unwrap();
        let outcome = ok.process(Path::new("/tmp/x.txt")).await.unwrap();
        assert_eq!(outcome, Outcome::Success(parse_metadata(b"{\"n\": 1}", 0)));

        let mut transient = CommandProcessor::new();
        transient
            .initialize(&config("sh", &["-c", "echo busy >&2; exit 75", "{path}"]))
            .await
            .unwrap();
        let outcome = transient.process(Path::new("/tmp/x.txt")).await.unwrap();
        assert!(matches!(outcome, Outcome::TransientFailure(ref r) if r.contains("busy")));

        let mut permanent = CommandProcessor::new();
        permanent
            .initialize(&config("sh", &["-c", "echo 'bad format' >&2; exit 2", "{path}"]))
            .await
            .unwrap();
        let outcome = permanent.process(Path::new("/tmp/x.txt")).await.unwrap();
        assert!(matches!(outcome, Outcome::PermanentFailure(ref r) if r.contains("bad format")));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let mut processor = CommandProcessor::new();
        processor
            .initialize(&config("/nonexistent/docflow-ingest", &[]))
            .await
            .unwrap();
        let err = processor
            .process(&PathBuf::from("/tmp/x.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Spawn { .. }));
        assert!(!err.is_transient());
    }
}
