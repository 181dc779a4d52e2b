use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;
use just_cmd::config::ShellConfig;
use just_cmd::{ExecResult, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "just-cmd")]
#[command(about = "A CMD-style command interpreter")]
#[command(version)]
struct Cli {
    /// Run one command line and exit with its status
    #[arg(short = 'c', conflicts_with = "script")]
    command: Option<String>,

    /// Batch file to run
    #[arg()]
    script: Option<PathBuf>,

    /// Arguments passed to the batch file as %1, %2, ...
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Working directory
    #[arg(long = "cwd")]
    cwd: Option<PathBuf>,

    /// Configuration file (defaults to $JUST_CMD_CONFIG)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// Log filter, e.g. "debug" or "just_cmd=trace" (defaults to $RUST_LOG)
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

enum Mode {
    Command(String),
    Script(PathBuf, Vec<String>),
    Session,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = match ShellConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let mut options = config.into_options();
    options.cwd = cli.cwd;
    let shell = Shell::new(options);

    // Ctrl-C stops the running command instead of the interpreter
    let interrupt = shell.interrupt_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupt.set();
        }
    });

    let mode = match (cli.command, cli.script) {
        (Some(command), _) => Mode::Command(command),
        (None, Some(script)) => Mode::Script(script, cli.args),
        (None, None) => Mode::Session,
    };
    let json = cli.json;

    let exit_code = match tokio::task::spawn_blocking(move || run(shell, mode, json)).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: interpreter thread failed: {}", e);
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(mut shell: Shell, mode: Mode, json: bool) -> i32 {
    match mode {
        Mode::Command(command) => {
            let result = shell.exec(&command);
            report(&result, json);
            result.exit_code
        }
        Mode::Script(path, args) => {
            let result = shell.exec_file(&path, &args);
            report(&result, json);
            result.exit_code
        }
        Mode::Session => session(&mut shell, json),
    }
}

/// Read and run lines from stdin until EOF or `EXIT`.
fn session(shell: &mut Shell, json: bool) -> i32 {
    let interactive = std::io::stdin().is_terminal();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            print!("{}", shell.prompt());
            let _ = std::io::stdout().flush();
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error: cannot read input: {}", e);
                return 1;
            }
            None => break,
        };

        // A Ctrl-C at the prompt must not cancel the next command
        shell.interrupt_handle().clear();
        let result = shell.exec(&line);
        report(&result, json);
        if interactive && !json {
            println!();
        }
        if shell.is_terminated() {
            break;
        }
    }
    shell.last_exit_code()
}

fn report(result: &ExecResult, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "stdout": result.stdout,
                "stderr": result.stderr,
                "exitCode": result.exit_code,
            })
        );
    } else {
        if !result.stdout.is_empty() {
            print!("{}", result.stdout);
        }
        if !result.stderr.is_empty() {
            eprint!("{}", result.stderr);
        }
        let _ = std::io::stdout().flush();
    }
}
