use std::io::{self, BufRead};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dmx_controller::config;
use dmx_controller::parser::{self, Command};
use dmx_controller::{Controller, Error};

fn main() -> dmx_controller::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "./config.yaml".to_string());
    let config_root = if path.ends_with(".json") {
        config::read_config_json(&path)?
    } else {
        config::read_config_yaml(&path)?
    };

    let mut controller = Controller::from_config(&config_root);
    info!(
        "Controlling universe {} with {} fixtures via `{}`",
        controller.universe(),
        controller.fixtures().len(),
        controller.cmd()
    );

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let cmd = match parser::parse_line(&line?) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(err) => {
                error!("parse fail: {}", err);
                continue;
            }
        };

        let result = match cmd {
            Command::Call { name, value } => controller.call(&name, value),
            Command::Animate { seconds, targets } => controller.animate_commands(seconds, &targets),
            Command::Write => controller.write(),
        };

        match result {
            Ok(_) => {}
            // The bus process is gone, nothing more can be sent.
            Err(err @ Error::TransportFailure(_)) => return Err(err),
            Err(err) => error!("command fail: {}", err),
        }
    }

    controller.close()
}
