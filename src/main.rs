use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use heroic_datasource::{Config, HeroicExecutor, QueryCompiler, QueryRequest};
use ringlog::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    let matches = Command::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile dashboard queries for Heroic and run them")
        .subcommand_required(true)
        .arg(
            Arg::new("VERBOSE")
                .long("verbose")
                .short('v')
                .help("Increase verbosity")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("compile")
                .about("Print the batch request a query would send, without sending it")
                .arg(request_arg())
                .arg(config_arg().required(false)),
        )
        .subcommand(
            Command::new("query")
                .about("Send a query and print the decoded series")
                .arg(request_arg())
                .arg(config_arg().required(true)),
        )
        .get_matches();

    let verbose = *matches.get_one::<u8>("VERBOSE").unwrap_or(&0);

    let running = Arc::new(AtomicBool::new(true));
    let mut log = start_log(verbose);

    let flushing = running.clone();
    let log_thread = std::thread::spawn(move || {
        while flushing.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(1));
            let _ = log.flush();
        }
        let _ = log.flush();
    });

    let result = match matches.subcommand() {
        Some(("compile", args)) => compile(args),
        Some(("query", args)) => query(args),
        _ => unreachable!("subcommand is required"),
    };

    running.store(false, Ordering::Relaxed);
    let _ = log_thread.join();

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn request_arg() -> Arg {
    Arg::new("REQUEST")
        .help("Query request JSON file, or - for stdin")
        .value_parser(clap::value_parser!(PathBuf))
        .required(true)
}

fn config_arg() -> Arg {
    Arg::new("CONFIG")
        .long("config")
        .short('c')
        .help("Datasource configuration file (TOML)")
        .value_parser(clap::value_parser!(PathBuf))
}

fn read_request(path: &Path) -> anyhow::Result<QueryRequest> {
    let mut content = String::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read request from stdin")?;
    } else {
        content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?;
    }

    Ok(QueryRequest::from_json(&content)?)
}

fn compile(args: &ArgMatches) -> anyhow::Result<()> {
    let request = read_request(args.get_one::<PathBuf>("REQUEST").unwrap())?;

    let compiler = match args.get_one::<PathBuf>("CONFIG") {
        Some(path) => {
            let config = Config::load(path)?;
            QueryCompiler::new(&config.query.distributed_aggregation_feature)
        }
        None => QueryCompiler::default(),
    };

    let batch = compiler.compile_batch(&request, chrono::Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&batch)?);

    Ok(())
}

fn query(args: &ArgMatches) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(1)
        .build()
        .context("failed to launch async runtime")?;

    rt.block_on(async {
        let request = read_request(args.get_one::<PathBuf>("REQUEST").unwrap())?;
        let config = Config::load(args.get_one::<PathBuf>("CONFIG").unwrap())?;
        let executor = HeroicExecutor::new(config)?;

        let cancel = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling query");
            } else {
                std::future::pending::<()>().await
            }
        };

        let results = executor.query_with_cancel(&request, cancel).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);

        Ok::<_, anyhow::Error>(())
    })
}

fn start_log(verbose: u8) -> Box<dyn Drain> {
    let debug_output: Box<dyn Output> = Box::new(Stderr::new());

    let level = match verbose {
        0 => Level::Info,
        1 => Level::Debug,
        _ => Level::Trace,
    };

    let debug_log = if level <= Level::Info {
        LogBuilder::new().format(ringlog::default_format)
    } else {
        LogBuilder::new()
    }
    .output(debug_output)
    .build()
    .expect("failed to initialize debug log");

    MultiLogBuilder::new()
        .level_filter(level.to_level_filter())
        .default(debug_log)
        .build()
        .start()
}
