//! # Console Module
//!
//! Line-oriented operator console: reads commands from stdin, drives the
//! [`Controller`], and prints status changes and device readings as they
//! arrive.

use crate::controller::Controller;
use crate::error::Result;
use crate::serial::Notice;
use crate::store::{export_csv, write_csv};
use log::{info, warn};
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "\
commands:
  start [port]   start logging (defaults to the configured port)
  stop           stop logging
  status         show the session status
  events         list events logged this session
  dump [path]    export this session's events as CSV (stdout if no path)
  help           show this help
  quit           stop logging and exit";

/// Operator command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start(Option<String>),
    Stop,
    Status,
    Events,
    Dump(Option<PathBuf>),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = input.split_whitespace();
        let name = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for '{name}'"));
        }
        let name = name.to_ascii_lowercase();
        let command = match name.as_str() {
            "start" => return Ok(Command::Start(arg.map(str::to_string))),
            "dump" | "export" => return Ok(Command::Dump(arg.map(PathBuf::from))),
            "stop" => Command::Stop,
            "status" => Command::Status,
            "events" | "list" => Command::Events,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err(format!("unknown command '{name}', try 'help'")),
        };
        if arg.is_some() {
            return Err(format!("'{name}' takes no arguments"));
        }
        Ok(command)
    }
}

/// Applies one command. Returns `false` once the console should exit.
pub fn execute(controller: &mut Controller, command: Command) -> Result<bool> {
    match command {
        Command::Start(port) => {
            let port = port.unwrap_or_else(|| controller.config().port_name.clone());
            if !controller.start(&port) {
                println!("already logging ({})", controller.status());
            }
        }
        Command::Stop => {
            if !controller.stop() {
                println!("not logging ({})", controller.status());
            }
        }
        Command::Status => {
            println!("{}", controller.status());
            if let Some(info) = controller.latest_info() {
                println!("last reading: {info}");
            }
        }
        Command::Events => {
            let events = controller.current_events();
            if events.is_empty() {
                println!("no events logged this session");
            }
            for event in &events {
                println!("{event}");
            }
        }
        Command::Dump(path) => {
            let events = controller.current_events();
            match path {
                Some(path) => {
                    export_csv(&path, &events)?;
                    println!("wrote {} events to {}", events.len(), path.display());
                }
                None => write_csv(std::io::stdout().lock(), &events)?,
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn print_notice(notice: Notice) {
    match notice {
        Notice::Status(message) => println!("[status] {message}"),
        Notice::Info(line) => println!("[sensor] {line}"),
        Notice::Event(event) => println!("[logged] {event}"),
    }
}

/// Runs the console until `quit`, end of input, or Ctrl-C, then stops the
/// session and waits for it to release the port.
pub async fn run(controller: &mut Controller) -> Result<()> {
    let mut notices = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => match execute(controller, command) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => println!("error: {e}"),
                    },
                    Err(message) => println!("{message}"),
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => print_notice(notice),
                Err(RecvError::Lagged(skipped)) => warn!("console skipped {skipped} notices"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    controller.stop();
    if let Some(outcome) = controller.wait_stopped().await {
        info!(
            "session closed: {} logged, {} informational, {} ignored",
            outcome.stats.events, outcome.stats.informational, outcome.stats.ignored
        );
    }
    Ok(())
}
