//! Shell completion scripts for `civic`.

use std::{fs, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::{AppContext, Cli, CompletionsArgs};

const BIN_NAME: &str = "civic";

/// Write the completion script for `shell` into `out`
pub fn render<W: Write>(
    shell: Shell,
    out: &mut W,
)
{
    generate(shell, &mut Cli::command(), BIN_NAME, out);
}

pub fn run(
    args: CompletionsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let Some(dir) = args
        .out_dir
        .filter(|_| !args.stdout)
    else
    {
        render(args.shell, &mut std::io::stdout().lock());
        return Ok(());
    };

    let path = script_path(args.shell, dir);
    if let Some(parent) = path.parent()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut script = Vec::new();
    render(args.shell, &mut script);
    fs::write(&path, script).with_context(|| format!("Failed to write {}", path.display()))?;

    if !ctx.quiet
    {
        eprintln!("Wrote completion to {}", path.display());
    }
    Ok(())
}

/// Conventional file name each shell loads completions from
fn script_path(
    shell: Shell,
    dir: PathBuf,
) -> PathBuf
{
    let name = match shell
    {
        Shell::Bash => format!("{BIN_NAME}.bash"),
        Shell::Zsh => format!("_{BIN_NAME}"),
        Shell::Fish => format!("{BIN_NAME}.fish"),
        Shell::PowerShell => format!("_{BIN_NAME}.ps1"),
        Shell::Elvish => format!("{BIN_NAME}.elv"),
        _ => BIN_NAME.to_string(),
    };
    dir.join(name)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn scripts_mention_every_subcommand()
    {
        let mut out = Vec::new();
        render(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();

        for sub in ["ask", "chat", "demo", "topic", "related", "stats", "init"]
        {
            assert!(script.contains(sub), "missing {sub}");
        }
    }

    #[test]
    fn file_names_follow_shell_conventions()
    {
        let dir = PathBuf::from("out");
        assert_eq!(script_path(Shell::Zsh, dir.clone()), dir.join("_civic"));
        assert_eq!(script_path(Shell::Fish, dir.clone()), dir.join("civic.fish"));
    }
}
