mod cli;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use af_av::ToolRegistry;
use af_core::config::Config;
use af_core::AudioFormat;
use af_desktop::state::STATUS_SUCCESS;
use af_desktop::{AppState, ConverterController, FailureNotice, StateObserver};
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "audioforge=trace,af_core=debug,af_av=trace,af_server=debug,af_desktop=debug,tower_http=debug".to_string()
        } else {
            "audioforge=info,af_core=info,af_av=info,af_server=info,af_desktop=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = load_config(cli.config.as_deref());
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            tracing::info!("Starting audioforge server");
            tracing::info!(
                "Server will listen on {}:{}",
                config.server.host,
                config.server.port
            );

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(af_server::start(config))?;
            Ok(())
        }
        Commands::Convert {
            input,
            format,
            output,
        } => convert_file(&input, format.as_deref(), output, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("audioforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let mut config = Config::load_or_default(path);
    config.apply_env();
    config
}

/// Prints status changes to stderr the way the desktop window shows them.
struct ConsoleObserver {
    last_status: String,
}

impl StateObserver for ConsoleObserver {
    fn state_changed(&mut self, state: &AppState) {
        if state.status == self.last_status {
            return;
        }
        self.last_status = state.status.clone();
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[2K{}", state.status);
        if !state.converting {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }

    fn conversion_succeeded(&mut self, output: &Path) {
        println!("File saved to: {}", output.display());
    }

    fn conversion_failed(&mut self, reason: &str) {
        eprintln!("Conversion failed: {reason}");
    }
}

fn convert_file(
    input: &Path,
    format: Option<&str>,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path);

    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let format = match format {
        Some(raw) => raw.parse::<AudioFormat>()?,
        None => config.conversion.default_format.clone(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let observer = ConsoleObserver {
        last_status: String::new(),
    };
    let mut controller = ConverterController::new(rt.handle().clone(), tools, Box::new(observer))
        .with_failure_notice(FailureNotice::Dialog)
        .with_timeout(Duration::from_secs(config.conversion.timeout_secs));

    controller.select_input(input);
    controller.set_format(format);

    let output = match output {
        Some(path) => path,
        None => {
            let name = controller
                .suggested_save_name()
                .context("input path has no file name")?;
            input.with_file_name(name)
        }
    };
    if output == input {
        anyhow::bail!(
            "Output {:?} would overwrite the input; pass --output or another --format",
            output
        );
    }

    controller.start(&output)?;
    while controller.state().converting {
        controller.wait_event(Duration::from_millis(100));
    }

    if controller.state().status != STATUS_SUCCESS {
        anyhow::bail!("{}", controller.state().status);
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg or place it next to the binary.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Upload dir: {}", config.server.upload_dir.display());
    println!("  Max upload: {} bytes", config.server.max_upload_bytes);
    match config.server.max_concurrent_conversions {
        Some(n) if n > 0 => println!("  Concurrent conversions: {n}"),
        _ => println!("  Concurrent conversions: unlimited"),
    }
    println!("  Default format: {}", config.conversion.default_format);

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ! {warning}");
    }

    Ok(())
}
