//! Child command resolution and the external programs lapse hands off
//! to (interactive shell, pager).

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

/// What will actually be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Resolve the user's argv into a spawnable program.
    ///
    /// With an interactive shell configured the argv is re-joined with
    /// shell quoting and run as `$SHELL -ic <joined>`, so aliases and
    /// shell functions keep working. Otherwise argv[0] is spawned
    /// directly.
    pub fn resolve(argv: &[String], shell: Option<&str>) -> Self {
        match shell {
            Some(shell) if !shell.is_empty() => {
                let joined = shlex::try_join(argv.iter().map(String::as_str))
                    .unwrap_or_else(|_| argv.join(" "));
                Self {
                    program: shell.to_string(),
                    args: vec!["-ic".to_string(), joined],
                }
            }
            _ => Self {
                program: argv[0].clone(),
                args: argv[1..].to_vec(),
            },
        }
    }

    /// Build the process builder; stdio wiring is the runner's job.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Hand the terminal to `$PAGER` on the captured log.
pub fn launch_pager(pager: &str, log_path: &Path) -> Result<()> {
    debug!(pager = %pager, log = %log_path.display(), "launching pager");
    let status = Command::new(pager)
        .arg(log_path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to launch pager: {pager}"))?;

    if !status.success() {
        anyhow::bail!("pager exited with non-zero status");
    }
    Ok(())
}
