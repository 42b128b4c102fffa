//! First-run project setup.

use std::io::{self, Write};
use std::path::Path;

pub const ENV_FILE: &str = ".env";
pub const ENV_EXAMPLE_FILE: &str = "env.example";

/// Outcome of [`ensure_env_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFileStatus {
    AlreadyPresent,
    Created,
}

/// Copies `env.example` to `.env` in `dir` unless `.env` already exists.
pub fn ensure_env_file(dir: &Path) -> anyhow::Result<EnvFileStatus> {
    let env_file = dir.join(ENV_FILE);
    if env_file.exists() {
        return Ok(EnvFileStatus::AlreadyPresent);
    }

    let example = dir.join(ENV_EXAMPLE_FILE);
    if !example.exists() {
        anyhow::bail!("{} not found", example.display());
    }
    std::fs::copy(&example, &env_file)?;
    tracing::info!(path = %env_file.display(), "created env file");
    Ok(EnvFileStatus::Created)
}

pub fn report_env_file<W: Write>(status: EnvFileStatus, out: &mut W) -> io::Result<()> {
    match status {
        EnvFileStatus::AlreadyPresent => writeln!(out, ".env file already exists"),
        EnvFileStatus::Created => {
            writeln!(out, "Created .env file from env.example")?;
            writeln!(out, "Please edit .env with your configuration")
        }
    }
}

pub fn write_next_steps<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\nSetup completed successfully!")?;
    writeln!(out, "\nNext steps:")?;
    writeln!(out, "1. Edit .env with your configuration")?;
    writeln!(out, "2. Run the server:")?;
    writeln!(out, "   cargo run --bin plinth-server")?;
    writeln!(out, "3. Try the API:")?;
    writeln!(out, "   plinth-manage demo")
}
