use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use drip_core::batch::{run_batch, WORKER_FLAG};
use drip_core::config::Config;
use drip_core::logging;
use drip_core::worker::run_worker;

fn print_help() {
    println!("drip — stream an LLM answer into the terminal");
    println!();
    println!("Usage:");
    println!("  drip \"prompt\"               Ask once and stream the answer");
    println!("  echo \"prompt\" | drip        Prompt via stdin pipe");
    println!();
    println!("Options:");
    println!("  --config <path>   Use this config file instead of ~/.config/drip/config.toml");
    println!("  --worker          Run as a worker: request JSON on stdin, stream on stdout");
    println!("  --version         Print version");
    println!("  --help            Print this help");
    println!();
    println!("Set DRIP_LOG (e.g. DRIP_LOG=debug) for diagnostics on stderr.");
}

#[derive(Debug, Default, PartialEq)]
struct Cli {
    help: bool,
    version: bool,
    worker: bool,
    config: Option<PathBuf>,
    prompt: Option<String>,
}

impl Cli {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut cli = Cli::default();
        let mut words = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => cli.help = true,
                "--version" | "-V" => cli.version = true,
                a if a == WORKER_FLAG => cli.worker = true,
                "--config" => match iter.next() {
                    Some(path) => cli.config = Some(PathBuf::from(path)),
                    None => return Err("--config needs a path".to_string()),
                },
                a if a.starts_with('-') => return Err(format!("unknown option {a}")),
                word => words.push(word),
            }
        }
        if !words.is_empty() {
            cli.prompt = Some(words.join(" "));
        }
        Ok(cli)
    }
}

fn current_thread_runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("drip: error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match Cli::parse(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("drip: {e}");
            eprintln!("try 'drip --help'");
            std::process::exit(2);
        }
    };

    if cli.help {
        print_help();
        return;
    }

    if cli.version {
        println!("drip {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if cli.worker {
        let runtime = current_thread_runtime();
        let code = runtime.block_on(async {
            let mut stdout = tokio::io::stdout();
            run_worker(tokio::io::stdin(), &mut stdout).await
        });
        drop(runtime);
        std::process::exit(code);
    }

    let config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("drip: error: {e}");
                std::process::exit(1);
            }
        },
        None => Config::load_or_default(),
    };

    // Positional words, or piped stdin
    let prompt = match cli.prompt {
        Some(p) => Some(p),
        None if !io::stdin().is_terminal() => {
            let mut buf = String::new();
            if io::stdin().read_to_string(&mut buf).is_ok() && !buf.trim().is_empty() {
                Some(buf.trim().to_string())
            } else {
                None
            }
        }
        None => None,
    };

    let Some(prompt) = prompt else {
        print_help();
        std::process::exit(2);
    };

    let runtime = current_thread_runtime();
    let code = runtime.block_on(run_batch(&config, &prompt));
    // Dropping the runtime kills any worker still being reaped.
    drop(runtime);
    std::process::exit(code);
}
