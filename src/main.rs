use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use callprof::error::Error;
use callprof::replay::{replay, ReplayOptions};
use callprof::report::{diff_dumps, format_info, format_table, load_dump, write_dump, Dump};
use callprof::trace::load_trace;
use callprof_runtime::{Config, FunctionId};

#[derive(Parser)]
#[command(
    name = "callprof",
    about = "Call-level profiling for coroutine runtimes, driven from recorded traces",
    version,
    after_help = "Workflow: callprof replay TRACE --out run.json, then callprof report run.json"
)]
struct Cli {
    /// Log engine activity to stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON Lines trace through the profiler and print the results.
    Replay {
        /// Trace file, one event or command per line.
        trace: PathBuf,

        /// Materialize tail calls so every link of a chain is recorded.
        #[arg(long)]
        trace_tailcall: bool,

        /// Function identity whose self time counts as coroutine suspension.
        #[arg(long, value_name = "ID")]
        yield_marker: Option<u64>,

        /// Write the dump as JSON to FILE.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Print the dump as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show a dump written by `replay --out`.
    Report {
        /// Dump file.
        dump: PathBuf,
    },
    /// Compare self time between two dumps.
    Diff {
        /// Baseline dump.
        a: PathBuf,
        /// Dump to compare against the baseline.
        b: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Replay {
            trace,
            trace_tailcall,
            yield_marker,
            out,
            json,
        } => cmd_replay(trace, trace_tailcall, yield_marker, out, json),
        Commands::Report { dump } => cmd_report(dump),
        Commands::Diff { a, b } => cmd_diff(a, b),
    }
}

fn cmd_replay(
    trace: PathBuf,
    trace_tailcall: bool,
    yield_marker: Option<u64>,
    out: Option<PathBuf>,
    json: bool,
) -> Result<(), Error> {
    let lines = load_trace(&trace)?;
    let mut config = Config::from_env();
    config.trace_tailcall |= trace_tailcall;
    let options = ReplayOptions {
        config,
        yield_marker: yield_marker.map(FunctionId),
    };

    let outcome = replay(&lines, &options)?;
    if outcome.skipped_events > 0 {
        eprintln!(
            "warning: skipped {} event(s) on contexts without a session",
            outcome.skipped_events
        );
    }

    let dump = Dump::new(outcome.info, outcome.functions);
    if let Some(path) = &out {
        write_dump(&dump, path)?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        anstream::println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        anstream::print!("{}", format_table(&dump.functions));
        eprint!("{}", format_info(&dump.info));
    }
    Ok(())
}

fn cmd_report(path: PathBuf) -> Result<(), Error> {
    let dump = load_dump(&path)?;
    anstream::print!("{}", format_table(&dump.functions));
    anstream::print!("{}", format_info(&dump.info));
    Ok(())
}

fn cmd_diff(a: PathBuf, b: PathBuf) -> Result<(), Error> {
    let dump_a = load_dump(&a)?;
    let dump_b = load_dump(&b)?;
    anstream::print!("{}", diff_dumps(&dump_a, &dump_b));
    Ok(())
}
