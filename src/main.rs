use clap::Parser;
use qgis_console::config::ConsoleConfig;
use qgis_console::console::Console;
use qgis_console::error::Result;
use qgis_console::status::MergePolicy;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "qgis-console")]
#[command(about = "Terminal console for the QGIS command bridge")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("QGIS_CONSOLE_GIT_SHA"), ")"))]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long, env = "QGIS_CONSOLE_CONFIG")]
    config: Option<String>,

    #[arg(long, env = "QGIS_CONSOLE_URL")]
    base_url: Option<String>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long, value_parser = parse_policy)]
    merge_policy: Option<MergePolicy>,
}

fn parse_policy(raw: &str) -> std::result::Result<MergePolicy, String> {
    match raw {
        "per_source" | "per-source" => Ok(MergePolicy::PerSource),
        "joint_only" | "joint-only" => Ok(MergePolicy::JointOnly),
        other => Err(format!("unknown merge policy: {other}")),
    }
}

fn load_config(cli: &Cli) -> Result<ConsoleConfig> {
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::from_file(path)?,
        None => ConsoleConfig::convention_defaults(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(interval) = cli.poll_interval_ms {
        config.poll_interval_ms = interval;
    }
    if let Some(policy) = cli.merge_policy {
        config.merge_policy = policy;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    qgis_console::logging::init_tracing("qgis_console");
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let console = Console::from_config(&config)?;

    let mut status_rx = console.subscribe();
    let printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let line = status_rx.borrow_and_update().summary_line();
            println!("[status] {line}");
        }
    });

    println!("Tell QGIS what to do (:status, :refresh, :reconnect, :quit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("stdin error: {err}");
                break;
            }
        };
        match line.trim() {
            "" => continue,
            ":quit" => break,
            ":status" => println!("{}", console.status().summary_line()),
            ":refresh" => {
                if console.refresh().await.is_none() {
                    println!("console is closed");
                }
            }
            ":reconnect" => match console.reconnect().await {
                Ok(connected) => println!("QGIS connected: {connected}"),
                Err(err) => println!("Error: {}", err.detail()),
            },
            prompt => match console.submit(prompt).await {
                Ok(result) => println!("{}", result.render()),
                Err(err) => match err.rejection() {
                    Some(rejection) => println!("(not sent: {rejection})"),
                    None => println!("Error: {}", err.detail()),
                },
            },
        }
    }

    console.teardown().await;
    printer.abort();
    Ok(())
}
