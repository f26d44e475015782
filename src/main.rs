use attendance_logger::config::{
    DEFAULT_BAUD_RATE, DEFAULT_LOG_FILE, DEFAULT_PORT, LoggerConfig,
};
use attendance_logger::console;
use attendance_logger::controller::Controller;
use attendance_logger::error::Result;
use attendance_logger::serial::list_ports;
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};

#[derive(Parser)]
#[command(name = "attendance-logger")]
#[command(about = "Log attendance records from a serial reader board", long_about = None)]
#[command(version)]
struct Cli {
    /// Serial port of the reader board (e.g. COM3 or /dev/ttyUSB0)
    #[arg(long, default_value = DEFAULT_PORT, global = true)]
    port: String,

    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, global = true)]
    baud: u32,

    /// Durable CSV log, appended across runs
    #[arg(long, default_value = DEFAULT_LOG_FILE, global = true)]
    log_file: PathBuf,

    #[arg(long, default_value_t = 1000, global = true)]
    read_timeout_ms: u64,

    /// Wait after opening the port before reading
    #[arg(long, default_value_t = 2000, global = true)]
    settle_ms: u64,

    #[arg(long, value_parser = ["error", "warn", "info", "debug", "trace"], default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (default)
    Run {
        /// Start logging immediately
        #[arg(long)]
        start: bool,
    },
    /// List serial ports
    Ports,
}

impl Cli {
    fn config(&self) -> LoggerConfig {
        LoggerConfig::default()
            .with_port(self.port.clone())
            .with_baud_rate(self.baud)
            .with_log_path(&self.log_file)
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_settle_delay(Duration::from_millis(self.settle_ms))
    }
}

/// Grace period for runtime shutdown after the console exits. A stdin read
/// still parked on the blocking pool is abandoned after this.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    shutdown(runtime);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn shutdown(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run { start: false }) {
        Commands::Ports => {
            let ports = list_ports()?;
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in ports {
                println!("{}", port.port_name);
            }
            Ok(())
        }
        Commands::Run { start } => {
            let port = config.port_name.clone();
            let mut controller = Controller::new(config, Handle::current());
            if start {
                controller.start(&port);
            }
            console::run(&mut controller).await
        }
    }
}
