use std::{net::SocketAddr, time::Duration};

use axum::Router;
use lxcfs_admission_webhook::{config::Config, AdmissionWebhook};
use lxcfs_mutator::{mutation_policy::DEFAULT_IGNORED_NAMESPACES, InjectionTable};

pub(crate) fn default_test_config() -> Config {
    Config {
        addr: SocketAddr::from(([127, 0, 0, 1], 8443)),
        path: "/mutate".to_owned(),
        kubeconfig: None,
        service_name: "lxcfs-admission-webhook".to_owned(),
        service_namespace: "kube-system".to_owned(),
        webhook_config_name: "lxcfs-admission-webhook".to_owned(),
        webhook_name: "lxcfs-admission-webhook.caicloud.io".to_owned(),
        ignored_namespaces: DEFAULT_IGNORED_NAMESPACES
            .iter()
            .map(|ns| ns.to_string())
            .collect(),
        injection_table: InjectionTable::lxcfs(),
        shutdown_timeout: Duration::from_secs(1),
        log_level: "info".to_owned(),
        log_fmt: "json".to_owned(),
        log_no_color: false,
    }
}

pub(crate) fn app(config: Config) -> Router {
    AdmissionWebhook::new_from_config(config).router()
}
