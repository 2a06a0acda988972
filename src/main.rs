use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use obd2_rs::{commands, init_logger, scan_ports, Command, ConnectOptions, Obd2, Response};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "obd2-cli")]
#[command(about = "CLI tool for OBD-II diagnostics over ELM327 adapters")]
struct Cli {
    /// Serial port of the adapter; scans for one when omitted
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baudrate: Option<u32>,

    /// Disable the fast-mode request optimizations
    #[arg(long)]
    no_fast: bool,

    /// Print responses as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate adapter ports
    Scan,
    /// Query one command by registry name (e.g. RPM, SPEED, COOLANT_TEMP)
    Query { name: String },
    /// Batch several same-mode commands into one CAN request
    Multi { names: Vec<String> },
    /// Repeatedly query one command, exercising fast mode
    Watch {
        name: String,
        /// Delay between queries in milliseconds
        #[arg(short, long, default_value = "500")]
        interval_ms: u64,
        /// Number of queries to run
        #[arg(short, long, default_value = "20")]
        count: u32,
    },
    /// Read stored diagnostic trouble codes
    Dtc,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    if let Commands::Scan = cli.command {
        for port in scan_ports() {
            println!("{port}");
        }
        return Ok(());
    }

    let mut session = Obd2::connect(ConnectOptions {
        port: cli.port.clone(),
        baudrate: cli.baudrate,
        protocol: None,
        fast: !cli.no_fast,
    })
    .await;

    if !session.is_connected() {
        session.close().await;
        bail!("no vehicle connection ({})", session.status().as_str());
    }
    println!(
        "Connected to {} on {}",
        session.protocol_name(),
        session.port_name()
    );

    let result = run_command(&cli, &mut session).await;
    session.close().await;
    result
}

async fn run_command(cli: &Cli, session: &mut Obd2) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Scan => unreachable!("handled before connecting"),
        Commands::Query { name } => {
            let cmd = lookup(name)?;
            let response = session.query(cmd, false).await;
            print_response(cli, &response)?;
        }
        Commands::Multi { names } => {
            let cmds = names
                .iter()
                .map(|name| lookup(name))
                .collect::<anyhow::Result<Vec<&Command>>>()?;
            let responses = session.query_multi(&cmds, false).await;
            let mut entries: Vec<_> = responses.iter().collect();
            entries.sort_by_key(|(cmd, _)| (cmd.mode, cmd.pid));
            for (cmd, response) in entries {
                print!("{}: ", cmd.name);
                print_response(cli, response)?;
            }
        }
        Commands::Watch {
            name,
            interval_ms,
            count,
        } => {
            let cmd = lookup(name)?;
            for _ in 0..*count {
                let response = session.query(cmd, false).await;
                print_response(cli, &response)?;
                tokio::time::sleep(Duration::from_millis(*interval_ms)).await;
            }
        }
        Commands::Dtc => {
            let cmd = commands::registry()
                .by_name("GET_DTC")
                .context("GET_DTC missing from registry")?;
            let response = session.query(cmd, false).await;
            print_response(cli, &response)?;
        }
    }
    Ok(())
}

fn lookup(name: &str) -> anyhow::Result<&'static Command> {
    commands::registry()
        .by_name(&name.to_uppercase())
        .with_context(|| format!("unknown command {name:?}"))
}

fn print_response(cli: &Cli, response: &Response) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string(response)?);
    } else if response.is_null() {
        println!("no data");
    } else {
        println!("{:?} {}", response.value.as_ref().unwrap(), response.unit);
    }
    Ok(())
}
