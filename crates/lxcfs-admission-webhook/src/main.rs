use anyhow::Result;
use tokio::runtime::Runtime;
use tracing::debug;

use lxcfs_admission_webhook::{
    cli, config::Config, fatal_error, mark_tracing_initialized, tracing::setup_tracing,
};

fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = match Config::from_args(&matches) {
        Ok(config) => config,
        Err(e) => {
            fatal_error(e.to_string());
            unreachable!();
        }
    };

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        fatal_error("cannot install the default rustls crypto provider".to_string());
    }

    let rt = match Runtime::new() {
        Ok(r) => r,
        Err(error) => {
            fatal_error(format!("error initializing tokio runtime: {error}"));
            unreachable!();
        }
    };

    rt.block_on(async {
        match setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color) {
            Err(err) => {
                fatal_error(err.to_string());
                unreachable!();
            }
            Ok(_) => {
                debug!("tracing system ready");
                mark_tracing_initialized();
            }
        };

        if let Err(e) = lxcfs_admission_webhook::run(config).await {
            fatal_error(e.to_string());
        }
    });

    Ok(())
}
