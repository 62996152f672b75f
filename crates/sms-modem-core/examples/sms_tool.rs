//! SMS Modem Tool
//!
//! A small command-line front end for listing, deleting and sending SMS
//! through a GSM modem.
//!
//! Usage:
//!   cargo run --example sms_tool -- [OPTIONS] <COMMAND>
//!
//! Commands:
//!   ports                  List serial ports
//!   list                   Print stored messages as JSON
//!   delete INDEX...        Delete messages by slot index (stops at first failure)
//!   send NUMBER TEXT       Send a message
//!
//! Options:
//!   --config PATH     Configuration file (default: <config dir>/sms-modem/config.json)
//!   --device PATH     Serial device, overrides the config file
//!   --baud RATE       Baud rate, overrides the config file
//!
//! Logging follows RUST_LOG (e.g. RUST_LOG=sms_modem_core=debug).

use anyhow::{bail, Context, Result};
use sms_modem_core::config::ModemConfig;
use sms_modem_core::protocol::{list_ports, ModemSession};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut device: Option<String> = None;
    let mut baud: Option<u32> = None;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = Some(PathBuf::from(args.get(i).context("--config needs a path")?));
            }
            "--device" | "-d" => {
                i += 1;
                device = Some(args.get(i).context("--device needs a path")?.clone());
            }
            "--baud" | "-b" => {
                i += 1;
                let raw = args.get(i).context("--baud needs a rate")?;
                baud = Some(raw.parse().with_context(|| format!("invalid baud rate {:?}", raw))?);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((command, operands)) = rest.split_first() else {
        print_help();
        bail!("no command given");
    };

    if command == "ports" {
        for port in list_ports() {
            println!("{}\t{}", port.name, port.describe());
        }
        return Ok(());
    }

    let mut config = ModemConfig::load_or_default(config_path.as_deref())
        .context("loading configuration")?;
    if let Some(device) = device {
        config.device = device;
    }
    if let Some(baud) = baud {
        config.baud_rate = baud;
    }

    let mut session = ModemSession::open(&config)
        .with_context(|| format!("initializing modem on {}", config.device))?;

    match (command.as_str(), operands) {
        ("list", []) => {
            let records = session.list_messages().context("listing messages")?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        ("delete", indices) if !indices.is_empty() => {
            for raw in indices {
                let index: u32 = raw
                    .parse()
                    .with_context(|| format!("invalid message index {:?}", raw))?;
                session.delete_message(index)?;
                println!("deleted {}", index);
            }
        }
        ("send", [number, text]) => {
            match session.send_message(number, text)? {
                Some(reference) => println!("sent (reference {})", reference),
                None => println!("sent"),
            }
        }
        _ => {
            print_help();
            bail!("unrecognized command {:?}", rest.join(" "));
        }
    }

    Ok(())
}

fn print_help() {
    println!("Usage: sms_tool [--config PATH] [--device PATH] [--baud RATE] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  ports                List serial ports");
    println!("  list                 Print stored messages as JSON");
    println!("  delete INDEX...      Delete messages by index");
    println!("  send NUMBER TEXT     Send a message");
}
