//! statusblocks - status line for dwm-style window managers
//!
//! Each block is a shell command. Its first output line is refreshed:
//! - on its own interval
//! - when the real-time signal `SIGRTMIN + <signal>` arrives
//! - when a bar click (`SIGUSR1` with a queued value) re-runs it

use anyhow::{Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use statusblocks::click::ShellLauncher;
use statusblocks::executor::Executor;
use statusblocks::signals::{self, SignalQueue};
use statusblocks::sink::{OutputSink, RootWindowSink, StdoutSink};
use statusblocks::{BlockRegistry, Config, Scheduler, StatusBar};

/// statusblocks - modular status line
#[derive(Parser, Debug)]
#[command(name = "statusblocks", about = "Modular status line for dwm")]
struct Args {
    /// Delimiter placed between blocks
    #[arg(short = 'd', allow_hyphen_values = true)]
    delimiter: Option<String>,

    /// Print the status line to stdout instead of setting the root window name
    #[arg(short = 'p')]
    print: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/statusblocks/blocks.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Flags that consume the following argument
const VALUE_FLAGS: &[&str] = &["-d", "-c", "--config"];
/// Flags without a value
const SWITCHES: &[&str] = &["-p", "-v", "--verbose", "-h", "--help"];

/// Split the command line into arguments `Args` understands and the rest
///
/// Unknown arguments are skipped wherever they appear, so flags after them
/// still take effect.
fn known_args(raw: impl IntoIterator<Item = OsString>) -> (Vec<OsString>, Vec<OsString>) {
    let mut raw = raw.into_iter();
    let mut known: Vec<OsString> = raw.next().into_iter().collect();
    let mut ignored = Vec::new();

    while let Some(arg) = raw.next() {
        let Some(text) = arg.to_str() else {
            ignored.push(arg);
            continue;
        };

        if VALUE_FLAGS.contains(&text) {
            known.push(arg);
            known.extend(raw.next());
        } else if SWITCHES.contains(&text) || is_known_cluster(text) {
            known.push(arg);
        } else {
            ignored.push(arg);
        }
    }

    (known, ignored)
}

/// `-pv` style switch groups and values glued to their flag (`-d|`, `--config=x`)
fn is_known_cluster(text: &str) -> bool {
    if text.starts_with("--config=") {
        return true;
    }
    let Some(short) = text.strip_prefix('-') else {
        return false;
    };
    if short.starts_with('-') || short.is_empty() {
        return false;
    }
    short.starts_with(['d', 'c']) || short.chars().all(|ch| matches!(ch, 'p' | 'v' | 'h'))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn run() -> Result<()> {
    let (known, ignored) = known_args(std::env::args_os());
    let args = Args::parse_from(known);
    init_logging(args.verbose);
    for arg in &ignored {
        log::warn!("ignoring unknown argument {:?}", arg);
    }

    log::info!("Starting statusblocks v{}", env!("CARGO_PKG_VERSION"));

    let (mut config, path) =
        Config::discover(args.config.as_deref()).context("Failed to load configuration")?;
    match &path {
        Some(path) => log::info!("Config loaded from {}", path.display()),
        None => log::info!("No config file, using built-in blocks"),
    }
    if let Some(delimiter) = args.delimiter {
        config.delimiter = delimiter;
    }

    let signal_base = config.signal_base.unwrap_or_else(signals::default_signal_base);
    signals::check_signal_base(signal_base).context("Invalid signal_base")?;
    let registry = BlockRegistry::new(config.blocks, signals::max_signal(signal_base))
        .context("Invalid block configuration")?;
    log::info!("{} blocks configured", registry.len());

    let mut queue = SignalQueue::new().context("Failed to create signal queue")?;
    let running = Arc::new(AtomicBool::new(true));
    signals::install(&registry, signal_base, &queue.notifier(), &running)
        .context("Failed to install signal handlers")?;

    let limit = Executor::read_limit_for(config.command_length, &config.delimiter);
    let bar = StatusBar::new(
        registry,
        Executor::new(config.shell.clone(), limit),
        config.delimiter,
    );

    let sink: Box<dyn OutputSink> = if args.print {
        Box::new(StdoutSink::stdout())
    } else {
        Box::new(RootWindowSink::new())
    };
    let launcher = Box::new(ShellLauncher::new(config.shell, signal_base));

    let mut scheduler = Scheduler::new(bar, sink, launcher, running);
    scheduler.run(&mut queue).context("Status loop failed")?;

    log::info!("Terminated, exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from(["statusblocks", "-d", " | ", "-p"]).unwrap();
        assert_eq!(args.delimiter.as_deref(), Some(" | "));
        assert!(args.print);
        assert!(args.config.is_none());
    }

    fn parse(raw: &[&str]) -> (Args, Vec<OsString>) {
        let (known, ignored) = known_args(raw.iter().map(OsString::from));
        (Args::try_parse_from(known).unwrap(), ignored)
    }

    #[test]
    fn test_unknown_flag_does_not_hide_later_flags() {
        let (args, ignored) = parse(&["statusblocks", "-x", "-p", "-d", "|"]);
        assert!(args.print);
        assert_eq!(args.delimiter.as_deref(), Some("|"));
        assert_eq!(ignored, vec![OsString::from("-x")]);

        let (args, ignored) = parse(&["statusblocks", "--foo", "stray", "-d", "|"]);
        assert_eq!(args.delimiter.as_deref(), Some("|"));
        assert!(!args.print);
        assert_eq!(ignored.len(), 2);
    }

    #[test]
    fn test_flag_values_are_taken_verbatim() {
        let (args, ignored) = parse(&["statusblocks", "-d", "-", "-c", "/tmp/b.toml", "-pv"]);
        assert_eq!(args.delimiter.as_deref(), Some("-"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/b.toml")));
        assert!(args.print && args.verbose);
        assert!(ignored.is_empty());

        let (args, _) = parse(&["statusblocks", "-d|", "--config=/etc/b.toml"]);
        assert_eq!(args.delimiter.as_deref(), Some("|"));
        assert_eq!(args.config, Some(PathBuf::from("/etc/b.toml")));
    }

    #[test]
    fn test_defaults_to_root_window() {
        let args = Args::try_parse_from(["statusblocks"]).unwrap();
        assert!(!args.print);
        assert!(args.delimiter.is_none());
    }
}
