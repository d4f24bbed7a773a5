use clap::builder::PossibleValue;
use clap::{crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("LXCFS_WEBHOOK_LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("LXCFS_WEBHOOK_LOG_FMT")
            .default_value("text")
            .value_parser([PossibleValue::new("text"), PossibleValue::new("json")])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
        Arg::new("kubeconfig")
            .long("kubeconfig")
            .value_name("KUBECONFIG")
            .env("KUBECONFIG_PATH")
            .help("Path to a kubeconfig file. When omitted the in-cluster configuration is used"),
        Arg::new("address")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .default_value("0.0.0.0")
            .env("LXCFS_WEBHOOK_BIND_ADDRESS")
            .help("Bind against ADDRESS"),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .default_value("443")
            .env("LXCFS_WEBHOOK_PORT")
            .help("Listen on PORT"),
        Arg::new("path")
            .long("path")
            .value_name("PATH")
            .default_value("/mutate")
            .env("LXCFS_WEBHOOK_PATH")
            .help("HTTP path serving the admission reviews"),
        Arg::new("service-name")
            .long("service-name")
            .value_name("SERVICE_NAME")
            .default_value("lxcfs-admission-webhook")
            .env("LXCFS_WEBHOOK_SERVICE_NAME")
            .help("Name of the Service exposing the webhook"),
        Arg::new("service-namespace")
            .long("service-namespace")
            .value_name("SERVICE_NAMESPACE")
            .default_value("kube-system")
            .env("LXCFS_WEBHOOK_SERVICE_NAMESPACE")
            .help("Namespace of the Service exposing the webhook"),
        Arg::new("webhook-config-name")
            .long("webhook-config-name")
            .value_name("NAME")
            .default_value("lxcfs-admission-webhook")
            .env("LXCFS_WEBHOOK_CONFIG_NAME")
            .help("Name of the MutatingWebhookConfiguration to create or update"),
        Arg::new("webhook-name")
            .long("webhook-name")
            .value_name("NAME")
            .default_value("lxcfs-admission-webhook.caicloud.io")
            .env("LXCFS_WEBHOOK_NAME")
            .help("Fully qualified name of the webhook inside of the MutatingWebhookConfiguration"),
        Arg::new("ignored-namespaces")
            .long("ignored-namespaces")
            .value_name("NAMESPACES")
            .action(ArgAction::Append)
            .value_delimiter(',')
            .default_values(["kube-system", "kube-public"])
            .env("LXCFS_WEBHOOK_IGNORED_NAMESPACES")
            .help("Comma separated list of namespaces whose pods are never mutated"),
        Arg::new("injection-table")
            .long("injection-table")
            .value_name("INJECTION_TABLE_FILE")
            .env("LXCFS_WEBHOOK_INJECTION_TABLE")
            .help("YAML file listing the volumes to inject. Defaults to the lxcfs files"),
        Arg::new("shutdown-timeout")
            .long("shutdown-timeout")
            .value_name("SECONDS")
            .default_value("10")
            .env("LXCFS_WEBHOOK_SHUTDOWN_TIMEOUT")
            .help("Time given to in-flight requests once a termination signal is received"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .author(crate_authors!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
