use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Access-log format template compiler and evaluator.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate that a config's format template(s) compile.
    Compile(CompileCmd),
    /// Compile a config and evaluate it against a sample request fixture.
    Render(RenderCmd),
}

#[derive(Args, Debug)]
pub struct CompileCmd {
    /// Path of the access-log configuration to validate.
    #[clap(short, long, default_value = "./accesslog.yaml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct RenderCmd {
    /// Path of the access-log configuration to compile.
    #[clap(short, long, default_value = "./accesslog.yaml")]
    pub config: PathBuf,
    /// Path of a JSON request fixture (see [`crate::testing::ContextFixture`]).
    #[clap(short = 'x', long)]
    pub context: PathBuf,
}
