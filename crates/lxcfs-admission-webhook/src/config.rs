use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;
use lxcfs_mutator::InjectionTable;

use crate::registrar::RegistrationSpec;

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

pub struct Config {
    pub addr: SocketAddr,
    pub path: String,
    pub kubeconfig: Option<PathBuf>,
    pub service_name: String,
    pub service_namespace: String,
    pub webhook_config_name: String,
    pub webhook_name: String,
    pub ignored_namespaces: Vec<String>,
    pub injection_table: InjectionTable,
    pub shutdown_timeout: Duration,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let addr = api_bind_address(matches)?;
        let path = webhook_path(matches)?;
        let kubeconfig = matches.get_one::<String>("kubeconfig").map(PathBuf::from);

        let service_name = required_string(matches, "service-name")?;
        let service_namespace = required_string(matches, "service-namespace")?;
        let webhook_config_name = required_string(matches, "webhook-config-name")?;
        let webhook_name = required_string(matches, "webhook-name")?;

        let ignored_namespaces = matches
            .get_many::<String>("ignored-namespaces")
            .map(|values| {
                values
                    .map(|ns| ns.trim().to_owned())
                    .filter(|ns| !ns.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let injection_table = injection_table(matches)?;

        let shutdown_timeout = matches
            .get_one::<String>("shutdown-timeout")
            .expect("This should not happen, there's a default value for shutdown-timeout")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| anyhow!("error parsing shutdown-timeout: {}", e))?;

        let log_level = matches
            .get_one::<String>("log-level")
            .expect("This should not happen, there's a default value for log-level")
            .to_owned();
        let log_fmt = matches
            .get_one::<String>("log-fmt")
            .expect("This should not happen, there's a default value for log-fmt")
            .to_owned();
        let log_no_color = matches
            .get_one::<bool>("log-no-color")
            .expect("clap should have assigned a default value")
            .to_owned();

        Ok(Self {
            addr,
            path,
            kubeconfig,
            service_name,
            service_namespace,
            webhook_config_name,
            webhook_name,
            ignored_namespaces,
            injection_table,
            shutdown_timeout,
            log_level,
            log_fmt,
            log_no_color,
        })
    }

    /// Describe the MutatingWebhookConfiguration pointing at this instance
    pub fn registration_spec(&self) -> RegistrationSpec {
        RegistrationSpec {
            configuration_name: self.webhook_config_name.clone(),
            webhook_name: self.webhook_name.clone(),
            service_name: self.service_name.clone(),
            service_namespace: self.service_namespace.clone(),
            path: self.path.clone(),
        }
    }
}

fn api_bind_address(matches: &ArgMatches) -> Result<SocketAddr> {
    format!(
        "{}:{}",
        matches.get_one::<String>("address").unwrap(),
        matches.get_one::<String>("port").unwrap()
    )
    .parse()
    .map_err(|e| anyhow!("error parsing arguments: {}", e))
}

fn webhook_path(matches: &ArgMatches) -> Result<String> {
    let path = matches.get_one::<String>("path").unwrap().trim();
    if !path.starts_with('/') || path.len() < 2 {
        return Err(anyhow!(
            "error parsing arguments: --path must be an absolute path, got {:?}",
            path
        ));
    }
    Ok(path.to_owned())
}

fn required_string(matches: &ArgMatches, id: &str) -> Result<String> {
    match matches.get_one::<String>(id).map(|value| value.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(anyhow!("error parsing arguments: --{} cannot be empty", id)),
    }
}

fn injection_table(matches: &ArgMatches) -> Result<InjectionTable> {
    match matches.get_one::<String>("injection-table") {
        None => Ok(InjectionTable::lxcfs()),
        Some(path) => InjectionTable::from_file(Path::new(path))
            .map_err(|e| anyhow!("error while loading injection table: {}", e)),
    }
}
