use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use bufpool::shell::{Command, Shell};
use bufpool::{BufferManager, PagedDiskManager, PoolConfig, ReplacementPolicy};

/// Interactive shell over a file-backed buffer pool
#[derive(Debug, Parser)]
#[command(name = "bufpool", version)]
struct Args {
    /// Database file (created if missing)
    #[arg(short, long, default_value = "bufpool.db")]
    file: PathBuf,

    /// Pool configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames, overrides the configuration file
    #[arg(long)]
    frames: Option<usize>,

    /// Replacement policy, overrides the configuration file
    #[arg(long, value_enum)]
    policy: Option<ReplacementPolicy>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.capacity = frames;
    }
    if let Some(policy) = args.policy {
        config.replacement_policy = policy;
    }
    config.validate()?;

    let disk = PagedDiskManager::open_or_create(&args.file)?;
    let buffer_manager = BufferManager::from_config(disk, &config)?;
    let mut shell = Shell::new(buffer_manager);

    println!(
        "bufpool: {} ({} frames); type 'help' for commands",
        args.file.display(),
        config.capacity
    );

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("bufpool> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        editor.add_history_entry(line.as_str())?;

        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{}", err);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        match shell.execute(&command) {
            Ok(output) => println!("{}", output),
            Err(err) => eprintln!("{}", err),
        }
    }

    let mut buffer_manager = shell.into_buffer_manager();
    buffer_manager.flush_all_pages()?;
    buffer_manager.disk_mut().sync()?;

    Ok(())
}
