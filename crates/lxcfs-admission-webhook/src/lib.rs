mod api;
pub mod certs;
pub mod cli;
pub mod config;
pub mod registrar;
pub mod tracing;

use std::{net::SocketAddr, sync::Arc, sync::RwLock, time::Duration};

use ::tracing::{error, info, warn};
use anyhow::{anyhow, Result};
use axum::{
    routing::{get, post},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use lazy_static::lazy_static;
use lxcfs_mutator::{AdmissionDecisionEngine, MutationPolicy, Scheme};
use tokio::signal::unix::{signal, SignalKind};
use tower_http::trace::{self, TraceLayer};

use crate::api::{
    handlers::{mutate_handler, readiness_handler},
    state::ApiServerState,
};
use crate::certs::TrustMaterial;
use crate::config::Config;

lazy_static! {
    static ref TRACE_SYSTEM_INITIALIZED: RwLock<bool> = RwLock::new(false);
}

pub struct AdmissionWebhook {
    router: Router,
    addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl AdmissionWebhook {
    pub fn new_from_config(config: Config) -> Self {
        Self::new_with_scheme(config, Scheme::default())
    }

    /// Same as `new_from_config`, decoding the envelopes with `scheme`
    pub fn new_with_scheme(config: Config, scheme: Scheme) -> Self {
        let policy = MutationPolicy::new(config.ignored_namespaces);
        let engine = AdmissionDecisionEngine::new(policy, config.injection_table);

        let state = Arc::new(ApiServerState { engine, scheme });

        let router = Router::new()
            .route(config.path.as_str(), post(mutate_handler))
            .route("/readiness", get(readiness_handler))
            .with_state(state)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace::DefaultMakeSpan::new().level(::tracing::Level::INFO))
                    .on_response(trace::DefaultOnResponse::new().level(::tracing::Level::INFO)),
            );

        AdmissionWebhook {
            router,
            addr: config.addr,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve HTTPS until SIGINT or SIGTERM is received. In-flight requests
    /// are then given `shutdown_timeout` to complete.
    pub async fn run(self, server_config: rustls::ServerConfig) -> Result<()> {
        let tls_config = RustlsConfig::from_config(Arc::new(server_config));

        let handle = Handle::new();
        let shutdown_timeout = self.shutdown_timeout;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!(signal = "SIGINT", "shutting down"),
                _ = sigterm.recv() => info!(signal = "SIGTERM", "shutting down"),
            }
            signal_handle.graceful_shutdown(Some(shutdown_timeout));
        });

        info!(address = self.addr.to_string().as_str(), "started HTTPS server");
        axum_server::bind_rustls(self.addr, tls_config)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
            .map_err(|e| anyhow!("HTTPS server error: {}", e))?;

        info!("server stopped");
        Ok(())
    }
}

/// Generate the trust material, register the webhook and serve requests
pub async fn run(config: Config) -> Result<()> {
    let trust_material = TrustMaterial::generate(&config.service_name, &config.service_namespace)?;
    let server_config = trust_material.rustls_server_config()?;

    let client = kube_client(&config).await?;
    let registrar = registrar::WebhookRegistrar::new(client, config.registration_spec());
    registrar.ensure(&trust_material.ca_bundle()).await?;

    let ignored: Vec<&str> = config.ignored_namespaces.iter().map(String::as_str).collect();
    if ignored.is_empty() {
        warn!("no namespace is excluded from mutation");
    } else {
        info!(namespaces = ?ignored, "namespaces excluded from mutation");
    }

    AdmissionWebhook::new_from_config(config)
        .run(server_config)
        .await
}

async fn kube_client(config: &Config) -> Result<kube::Client> {
    let kube_config = match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default()).await?
        }
        None => kube::Config::infer().await?,
    };

    Ok(kube::Client::try_from(kube_config)?)
}

pub fn mark_tracing_initialized() {
    if let Ok(mut initialized) = TRACE_SYSTEM_INITIALIZED.write() {
        *initialized = true;
    }
}

pub fn fatal_error(msg: String) {
    let trace_system_ready = TRACE_SYSTEM_INITIALIZED
        .read()
        .map(|ready| *ready)
        .unwrap_or(false);
    if trace_system_ready {
        error!("{}", msg);
    } else {
        eprintln!("{msg}");
    }

    std::process::exit(1);
}
