//! Idempotent step implementations.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use plinth_blocks::CommentStyle;
use plinth_manifest::{AppendFile, CopyFile, EnsureDirectory, Manifest, Plugin, RunCommand, Step};

use super::command::{self, Exit};
use crate::layout::TargetLayout;
use crate::render;
use crate::{Error, Result};

/// Everything a step needs to run.
pub(crate) struct StepContext<'a> {
    pub layout: &'a TargetLayout,
    pub manifest: &'a Manifest,
    pub plugin: &'a Plugin,
    pub options: &'a BTreeMap<String, String>,
    pub values: BTreeMap<String, String>,
    pub default_timeout: Duration,
}

/// Observable effect of one step.
#[derive(Debug, Default)]
pub(crate) struct StepEffect {
    /// The step changed the filesystem.
    pub mutated: bool,
    pub warning: Option<String>,
    /// (destination, checksum) written by copy-file.
    pub checksum: Option<(String, String)>,
}

impl StepContext<'_> {
    fn failure(&self, step: usize, message: impl Into<String>) -> Error {
        Error::Step {
            plugin: self.plugin.id.clone(),
            step,
            message: message.into(),
        }
    }

    fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Run step `index`. `recorded` is the checksum copy-file last wrote to
    /// the step's destination, if any.
    pub fn apply(&self, index: usize, step: &Step, recorded: Option<&str>) -> Result<StepEffect> {
        tracing::debug!(plugin = %self.plugin.id, step = index, what = %step.describe(), "running step");
        match step {
            Step::CopyFile(copy) => self.copy_file(index, step, copy, recorded),
            Step::AppendFile(append) => self.append_file(index, step, append),
            Step::RunCommand(run) => self.run_command(index, run),
            Step::EnsureDirectory(dir) => self.ensure_directory(dir),
        }
    }

    fn payload(&self, index: usize, step: &Step) -> Result<String> {
        render::payload(self.manifest, self.plugin, step, &self.values)?
            .ok_or_else(|| self.failure(index, "step has no payload"))
    }

    fn copy_file(
        &self,
        index: usize,
        step: &Step,
        copy: &CopyFile,
        recorded: Option<&str>,
    ) -> Result<StepEffect> {
        let desired = self.payload(index, step)?;
        let destination = plinth_fs::confine(self.root(), &copy.destination)?;
        let desired_checksum = plinth_fs::compute_content_checksum(&desired);
        let mut effect = StepEffect {
            checksum: Some((copy.destination.clone(), desired_checksum)),
            ..Default::default()
        };

        let current = match std::fs::read(&destination) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(plinth_fs::Error::io(&destination, e).into()),
        };

        match current {
            Some(bytes) if bytes == desired.as_bytes() => {
                tracing::debug!(path = %copy.destination, "content already up to date");
                return Ok(effect);
            }
            Some(bytes) => {
                let previous = plinth_fs::compute_bytes_checksum(&bytes);
                if recorded != Some(previous.as_str()) {
                    let backup = self.back_up(&copy.destination, &bytes)?;
                    let warning = format!(
                        "plugin '{}' replaced modified file '{}' (previous {previous}); backup at {}",
                        self.plugin.id,
                        copy.destination,
                        backup.display()
                    );
                    tracing::warn!("{warning}");
                    effect.warning = Some(warning);
                }
            }
            None => {}
        }

        plinth_fs::io::write_text(&destination, &desired)?;
        effect.mutated = true;
        Ok(effect)
    }

    fn back_up(&self, relative: &str, bytes: &[u8]) -> Result<std::path::PathBuf> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let dir = self.layout.backups_dir(&self.plugin.id).join(stamp);
        let backup = plinth_fs::confine(&dir, relative)?;
        plinth_fs::io::write_atomic(&backup, bytes)?;
        Ok(backup)
    }

    fn append_file(&self, index: usize, step: &Step, append: &AppendFile) -> Result<StepEffect> {
        let body = self.payload(index, step)?;
        let style = CommentStyle::for_path(&append.destination).ok_or_else(|| {
            self.failure(
                index,
                format!("'{}' has no comment syntax", append.destination),
            )
        })?;
        let destination = plinth_fs::confine(self.root(), &append.destination)?;
        let current = plinth_fs::io::read_text_optional(&destination)?.unwrap_or_default();

        let upsert = plinth_blocks::upsert_block(
            &current,
            style,
            &append.block_id(&self.plugin.id),
            &body,
        )?;
        if !upsert.changed {
            return Ok(StepEffect::default());
        }
        plinth_fs::io::write_text(&destination, &upsert.content)?;
        Ok(StepEffect {
            mutated: true,
            ..Default::default()
        })
    }

    fn ensure_directory(&self, dir: &EnsureDirectory) -> Result<StepEffect> {
        let path = plinth_fs::confine(self.root(), &dir.path)?;
        let created = plinth_fs::io::ensure_dir(&path)?;
        Ok(StepEffect {
            mutated: created,
            ..Default::default()
        })
    }

    fn run_command(&self, index: usize, run: &RunCommand) -> Result<StepEffect> {
        let line = render::command(run, &self.values);
        let cwd = match &run.cwd {
            Some(cwd) => plinth_fs::confine(self.root(), cwd)?,
            None => self.root().to_path_buf(),
        };
        let timeout = run
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);
        let log = self.layout.step_log(&self.plugin.id, index);

        let mut cmd = command::shell_command(&line);
        cmd.current_dir(&cwd)
            .env("PLINTH_PLUGIN_ID", &self.plugin.id)
            .env("PLINTH_REPO_ROOT", self.root());
        for (name, value) in self.options {
            cmd.env(option_env_name(name), value);
        }

        tracing::info!(plugin = %self.plugin.id, step = index, command = %line, "running command");
        let exit = command::run_logged(cmd, &log, timeout)
            .map_err(|e| self.failure(index, format!("failed to start `{line}`: {e}")))?;

        match exit {
            Exit::Exited(status) if status.success() => Ok(StepEffect::default()),
            Exit::Exited(status) => Err(self.failure(
                index,
                format!(
                    "`{line}` exited with {}; see {}",
                    status
                        .code()
                        .map(|c| format!("code {c}"))
                        .unwrap_or_else(|| "a signal".to_string()),
                    log.display()
                ),
            )),
            Exit::TimedOut => Err(self.failure(
                index,
                format!(
                    "`{line}` timed out after {}s; see {}",
                    timeout.as_secs(),
                    log.display()
                ),
            )),
        }
    }
}

/// `PLINTH_OPTION_<NAME>` with the name upper-cased and `-` mapped to `_`.
pub(crate) fn option_env_name(name: &str) -> String {
    format!(
        "PLINTH_OPTION_{}",
        name.to_ascii_uppercase().replace('-', "_")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_env_names() {
        assert_eq!(option_env_name("python_version"), "PLINTH_OPTION_PYTHON_VERSION");
        assert_eq!(option_env_name("ci-provider"), "PLINTH_OPTION_CI_PROVIDER");
    }
}
