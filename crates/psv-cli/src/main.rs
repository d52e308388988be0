use std::path::Path;

use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use psv_core::logging::{self, LogConfig};
use psv_core::{
    describe, execute_with, execute_with_async, is_in_venv, Config, EnvSnapshot, EnvironmentLayout,
    ScriptInvocation, SystemRunner, TokioRunner, VenvError, VenvRequest,
};
use serde_json::Value;
use tracing::debug;

mod cli;
mod style;

use cli::{CommandGroupCli, EnvSelection, PsvCli, RunArgs, WhereArgs};
use style::Style;

const EXIT_INTERNAL: i32 = 2;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PsvCli::parse();
    let style = Style::new(cli.no_color, atty::is(Stream::Stderr));

    let code = match dispatch(&cli, &style) {
        Ok(code) => code,
        Err(err) => {
            report(&style, &err);
            EXIT_INTERNAL
        }
    };

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn dispatch(cli: &PsvCli, style: &Style) -> anyhow::Result<i32> {
    match &cli.command {
        CommandGroupCli::Check => Ok(i32::from(!is_in_venv())),
        CommandGroupCli::Where(args) => show_layout(cli, style, args),
        CommandGroupCli::Run(args) => run(cli, style, args),
    }
}

fn run(cli: &PsvCli, style: &Style, args: &RunArgs) -> anyhow::Result<i32> {
    if is_in_venv() {
        eprintln!(
            "{}",
            style.error(None, "already running inside a managed environment")
        );
        eprintln!(
            "{}",
            style.hint(&format!(
                "unset {} to provision again",
                psv_core::SENTINEL_ENV
            ))
        );
        return Ok(EXIT_INTERNAL);
    }

    let script = ScriptInvocation::new(&args.script, &args.args);
    let request = build_request(&args.env, script).require_package_text(args.require.clone());
    let work_dir = request.resolved_work_dir()?;
    let _guard = init_logging(cli, style, &work_dir)?;

    let snapshot = EnvSnapshot::capture();
    let config = Config::from_snapshot(&snapshot);
    debug!(cooperative = args.cooperative, "starting pipeline");
    if args.cooperative {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let runner = TokioRunner::new(config.max_capture_bytes());
        runtime.block_on(execute_with_async(&request, &snapshot, &config, &runner))
    } else {
        let runner = SystemRunner::new(config.max_capture_bytes());
        execute_with(&request, &snapshot, &config, &runner)
    }
}

fn show_layout(cli: &PsvCli, style: &Style, args: &WhereArgs) -> anyhow::Result<i32> {
    let request = build_request(&args.env, ScriptInvocation::default());
    let work_dir = request.resolved_work_dir()?;
    let _guard = init_logging(cli, style, &work_dir)?;

    let snapshot = EnvSnapshot::capture();
    let config = Config::from_snapshot(&snapshot);
    let layout = describe(&request, &snapshot, &config)?;
    let in_venv = is_in_venv();

    if args.json {
        let mut payload = serde_json::to_value(&layout)?;
        if let Value::Object(map) = &mut payload {
            map.insert("sentinel".to_string(), Value::Bool(in_venv));
        }
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        print_layout(style, &layout, in_venv);
    }
    Ok(0)
}

fn print_layout(style: &Style, layout: &EnvironmentLayout, in_venv: bool) {
    let rows = [
        ("venv", layout.venv_dir.display().to_string()),
        ("python", layout.python.display().to_string()),
        ("activate", layout.activate.display().to_string()),
        ("exists", style.present(layout.exists)),
        ("sentinel", style.present(in_venv)),
    ];
    for (label, value) in rows {
        println!("{:<9} {value}", style.label(label));
    }
}

fn build_request(env: &EnvSelection, script: ScriptInvocation) -> VenvRequest {
    let mut request = VenvRequest::new(script)
        .env_name(env.env_name.clone())
        .local_project(env.local_project);
    if let Some(dir) = &env.work_dir {
        request = request.work_directory(dir);
    }
    request
}

fn init_logging(
    cli: &PsvCli,
    style: &Style,
    work_dir: &Path,
) -> anyhow::Result<logging::WorkerGuard> {
    let config = LogConfig {
        verbose: cli.verbose,
        quiet: cli.quiet,
        ansi: style.enabled(),
        log_file: cli.log_file.clone(),
    };
    logging::init(&config, work_dir)
}

fn report(style: &Style, err: &anyhow::Error) {
    match err.downcast_ref::<VenvError>() {
        Some(venv) => {
            eprintln!("{}", style.error(Some(venv.code()), &venv.to_string()));
            if let Some(hint) = venv.hint() {
                eprintln!("{}", style.hint(hint));
            }
            debug!(details = %venv.details(), reason = venv.reason(), "pipeline error");
        }
        None => eprintln!("{}", style.error(None, &format!("{err:#}"))),
    }
}
