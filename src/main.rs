//! titanscript - run scripts with pipelines, aliases and conditional lines
//!
//! Usage:
//!   titanscript script.tsh       Execute script file
//!   titanscript -c "line"        Execute a single line
//!   titanscript -t "expr"        Evaluate a conditional expression

use std::env;
use std::fs;
use std::process;

use anyhow::{Context, Result};
use colored::Colorize;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use titan_script::shell::stream::InputStream;
use titan_script::Session;

const LOG_ENV: &str = "TITANSCRIPT_LOG";

fn init_logging() {
    let level = env::var(LOG_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_help();
        process::exit(1);
    }

    let code = match args[1].as_str() {
        "-c" => {
            if args.len() < 3 {
                eprintln!("titanscript: -c requires an argument");
                process::exit(1);
            }
            run(&args[2..].join(" "))?
        }
        "-t" => {
            if args.len() < 3 {
                eprintln!("titanscript: -t requires an argument");
                process::exit(1);
            }
            test(&args[2..].join(" "))?
        }
        "-h" | "--help" => {
            print_help();
            0
        }
        "-v" | "--version" => {
            println!("titanscript v{}", env!("CARGO_PKG_VERSION"));
            0
        }
        path if !path.starts_with('-') => {
            let script = fs::read_to_string(path)
                .with_context(|| format!("cannot read script {}", path))?;
            run(&script)?
        }
        other => {
            eprintln!("titanscript: unknown option: {}", other);
            1
        }
    };
    process::exit(code);
}

fn print_help() {
    println!("{}", "titanscript - scripting engine".bold());
    println!();
    println!("Usage:");
    println!("  titanscript FILE            Execute script file");
    println!("  titanscript -c \"line\"       Execute a single line");
    println!("  titanscript -t \"expr\"       Test an expression (exit 0 if true)");
    println!("  titanscript -h, --help      Show this help");
    println!("  titanscript -v, --version   Show version");
    println!();
    println!("Environment:");
    println!("  {}    log level: error, warn, info, debug, trace", LOG_ENV);
}

fn session() -> Result<Session> {
    let session = Session::new().context("failed to start session")?;
    Ok(session.with_stdin(InputStream::Inherit))
}

fn run(script: &str) -> Result<i32> {
    let mut session = session()?;
    match session.run_script(script) {
        Ok(()) => Ok(0),
        Err(e) => {
            eprintln!("{}: {}", "error".red(), e);
            Ok(1)
        }
    }
}

fn test(expr: &str) -> Result<i32> {
    let mut session = session()?;
    match session.test(expr) {
        Ok(true) => Ok(0),
        Ok(false) => Ok(1),
        Err(e) => {
            eprintln!("{}: {}", "error".red(), e);
            Ok(2)
        }
    }
}
