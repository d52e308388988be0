use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "psv",
    author,
    version,
    about = "Re-run Python scripts inside a managed virtual environment",
    disable_help_subcommand = true
)]
pub struct PsvCli {
    #[arg(
        short,
        long,
        help = "Only print errors to the console",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase console logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(
        long,
        env = "PSV_LOG_FILE",
        value_parser = value_parser!(PathBuf),
        help = "Write the debug log here instead of <work-dir>/pyshell_venv.log",
        global = true
    )]
    pub log_file: Option<PathBuf>,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Provision the environment and run a script inside it")]
    Run(RunArgs),
    #[command(about = "Show where the environment lives")]
    Where(WhereArgs),
    #[command(about = "Exit 0 inside a managed environment, 1 outside")]
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct EnvSelection {
    #[arg(
        long,
        default_value = "",
        hide_default_value = true,
        help = "Named environment under the data directory (default: \"default\")"
    )]
    pub env_name: String,
    #[arg(
        long,
        value_parser = value_parser!(PathBuf),
        help = "Directory used for resolution and as the children's cwd"
    )]
    pub work_dir: Option<PathBuf>,
    #[arg(long, help = "Use <work-dir>/.venv instead of a named environment")]
    pub local_project: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub env: EnvSelection,
    #[arg(
        long = "require",
        value_name = "TEXT",
        default_value = "",
        hide_default_value = true,
        help = "Passed to `pip install` as a single argument; empty skips installation"
    )]
    pub require: String,
    #[arg(long = "async", help = "Drive child processes on the tokio runtime")]
    pub cooperative: bool,
    #[arg(value_name = "SCRIPT")]
    pub script: String,
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct WhereArgs {
    #[command(flatten)]
    pub env: EnvSelection,
    #[arg(long, help = "Emit the layout as JSON")]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        PsvCli::command().debug_assert();
    }

    #[test]
    fn script_arguments_keep_their_dashes() {
        let cli = PsvCli::parse_from([
            "psv", "run", "--require", "numpy aiohttp", "app.py", "--count", "-x",
        ]);
        let CommandGroupCli::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.require, "numpy aiohttp");
        assert_eq!(args.script, "app.py");
        assert_eq!(args.args, vec!["--count", "-x"]);
        assert!(!args.cooperative);
    }
}
