mod cli;

use anyhow::{Context as _, Result};
use clap::Parser;

use accesslog_fmt::config::read_config;
use accesslog_fmt::testing::ContextFixture;

use cli::{Cli, Command, CompileCmd, RenderCmd};

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Compile(cmd) => compile(cmd),
        Command::Render(cmd) => render(cmd),
    }
}

fn compile(cmd: CompileCmd) -> Result<()> {
    let config = read_config(&cmd.config)?;
    config.compile().context("format failed to compile")?;
    println!("ok: {} compiles cleanly", cmd.config.display());
    Ok(())
}

fn render(cmd: RenderCmd) -> Result<()> {
    let config = read_config(&cmd.config)?;
    let (format, masks) = config.compile().context("format failed to compile")?;

    let fixture_json = std::fs::read_to_string(&cmd.context).context("failed to read context fixture")?;
    let fixture: ContextFixture =
        serde_json::from_str(&fixture_json).context("invalid context fixture")?;
    let ctx = fixture.into_context();

    let line = masks.apply(&format.evaluate(&ctx));
    print!("{line}");
    Ok(())
}
