mod app_config;

use pcb_inference::*;

use app_config::AppConfig;
use clap::{Parser, Subcommand};
use std::{error::Error, path::PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Serves the PCB layout regression model")]
struct Cli {
  /// YAML config file; command line flags override it
  #[arg(long, global = true, value_name = "PATH")]
  config: Option<PathBuf>,
  /// trace, debug, info, warn or error
  #[arg(long, global = true, value_name = "LEVEL")]
  log_level: Option<String>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve predictions over HTTP
  Serve {
    /// Parameter artifact (JSON state dict)
    #[arg(long, value_name = "PATH")]
    params: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// Reply 200 to failed requests too
    #[arg(long)]
    uniform_error_status: bool,
  },
  /// Run a payload file through the model without a server
  Predict {
    #[arg(long, value_name = "PATH")]
    params: Option<PathBuf>,
    /// JSON table to predict on
    #[arg(long, value_name = "PATH")]
    input_file: PathBuf,
  },
  /// Send a payload file to a running server
  Client {
    /// JSON table to predict on
    #[arg(long, value_name = "PATH")]
    input_file: PathBuf,
    /// Host of the model server
    #[arg(long)]
    url: String,
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
  },
  /// Write an untrained, seeded parameter artifact
  Setup {
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,
    #[arg(long, default_value_t = 1)]
    seed: u64,
  },
}

impl Command {
  /// A panic ends every command but `serve`, which answers the request and keeps going.
  fn reports_crashes(&self) -> bool {
    !matches!(self, Command::Serve { .. })
  }
}

fn required_params(config: &AppConfig) -> Result<PathBuf, Box<dyn Error>> {
  config
    .params
    .clone()
    .ok_or_else(|| "no parameter artifact given (--params or `params` in the config file)".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  let args = Cli::parse();

  let file_config = match &args.config {
    Some(path) => AppConfig::from_file(path)?,
    None => AppConfig::default(),
  };
  let mut cli_config = AppConfig {
    log_level: args.log_level.clone(),
    ..Default::default()
  };
  match &args.command {
    Command::Serve {
      params,
      host,
      port,
      uniform_error_status,
    } => {
      cli_config.params = params.clone();
      cli_config.host = host.clone();
      cli_config.port = *port;
      cli_config.uniform_error_status = uniform_error_status.then_some(true);
    }
    Command::Predict { params, .. } => cli_config.params = params.clone(),
    Command::Client { .. } | Command::Setup { .. } => {}
  }
  let config = file_config.merge(cli_config);

  utils::init_logging(config.log_level()?, args.command.reports_crashes())?;

  match args.command {
    Command::Serve { .. } => {
      let params = required_params(&config)?;
      // fail fast: nothing is served until the artifact has been read and checked
      let model = PcbModel::load(&params)?;
      let server_config = config.server_config();
      info!(?server_config, "starting server");
      let app = subcommands::Server::new(server_config, model);
      app.run().await?;
    }
    Command::Predict { input_file, .. } => {
      let params = required_params(&config)?;
      let app = subcommands::Predict::new(&params, &input_file)?;
      println!("{}", serde_json::to_string(&app.run())?);
    }
    Command::Client {
      input_file,
      url,
      port,
    } => {
      let true_url = format!("http://{}:{}/predict", url, port);
      let app = subcommands::Client::new(&input_file, true_url)?;
      println!("{}", serde_json::to_string(&app.run().await?)?);
    }
    Command::Setup { output, seed } => {
      let app = subcommands::Setup::new(&output, seed);
      app.run()?;
    }
  }
  Ok(())
}
