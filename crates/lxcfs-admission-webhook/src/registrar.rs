use std::collections::BTreeMap;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::ByteString;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::Client;
use thiserror::Error;
use tracing::{info, warn};

/// Upper bound of get/replace rounds once the configuration is known to exist.
pub const MAX_UPDATE_ATTEMPTS: usize = 5;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("cannot create MutatingWebhookConfiguration: {0}")]
    Create(#[source] kube::Error),

    #[error("cannot get MutatingWebhookConfiguration: {0}")]
    Get(#[source] kube::Error),

    #[error("cannot update MutatingWebhookConfiguration: {0}")]
    Update(#[source] kube::Error),

    #[error("MutatingWebhookConfiguration changed while being updated: {0}")]
    Conflict(String),
}

impl RegistrationError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistrationError::Conflict(_))
    }
}

/// Where the API server has to send the admission reviews.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationSpec {
    pub configuration_name: String,
    pub webhook_name: String,
    pub service_name: String,
    pub service_namespace: String,
    pub path: String,
}

pub struct WebhookRegistrar {
    client: Client,
    spec: RegistrationSpec,
    retry_delay: Duration,
}

impl WebhookRegistrar {
    pub fn new(client: Client, spec: RegistrationSpec) -> Self {
        WebhookRegistrar {
            client,
            spec,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Minimum pause between two update attempts. The pause grows
    /// exponentially and is jittered.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn desired_configuration(&self, ca_bundle: &[u8]) -> MutatingWebhookConfiguration {
        let webhook = MutatingWebhook {
            name: self.spec.webhook_name.clone(),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    name: self.spec.service_name.clone(),
                    namespace: self.spec.service_namespace.clone(),
                    path: Some(self.spec.path.clone()),
                    port: None,
                }),
                ca_bundle: Some(ByteString(ca_bundle.to_vec())),
                url: None,
            },
            rules: Some(vec![RuleWithOperations {
                operations: Some(vec!["CREATE".to_owned()]),
                api_groups: Some(vec!["".to_owned(), "core".to_owned()]),
                api_versions: Some(vec!["v1".to_owned()]),
                resources: Some(vec!["pods".to_owned()]),
                scope: None,
            }]),
            failure_policy: Some("Fail".to_owned()),
            side_effects: "None".to_owned(),
            admission_review_versions: vec!["v1".to_owned(), "v1beta1".to_owned()],
            ..Default::default()
        };

        MutatingWebhookConfiguration {
            metadata: ObjectMeta {
                name: Some(self.spec.configuration_name.clone()),
                labels: Some(BTreeMap::from([(
                    "app".to_owned(),
                    self.spec.service_name.clone(),
                )])),
                ..Default::default()
            },
            webhooks: Some(vec![webhook]),
        }
    }

    /// Create the MutatingWebhookConfiguration, or overwrite the webhooks
    /// of the existing one.
    pub async fn ensure(&self, ca_bundle: &[u8]) -> Result<(), RegistrationError> {
        let api: Api<MutatingWebhookConfiguration> = Api::all(self.client.clone());
        let desired = self.desired_configuration(ca_bundle);
        let name = self.spec.configuration_name.as_str();

        match api.create(&PostParams::default(), &desired).await {
            Ok(_) => {
                info!(name, "MutatingWebhookConfiguration created");
                return Ok(());
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                info!(name, "MutatingWebhookConfiguration already exists, updating it");
            }
            Err(e) => return Err(RegistrationError::Create(e)),
        }

        let api = &api;
        let desired = &desired;
        let backoff = ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(self.retry_delay)
            .with_max_times(MAX_UPDATE_ATTEMPTS - 1);

        (|| self.update(api, desired))
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(RegistrationError::is_conflict)
            .notify(|err, delay| {
                warn!(name, error = %err, ?delay, "update conflict, retrying");
            })
            .await?;

        info!(name, "MutatingWebhookConfiguration updated");
        Ok(())
    }

    async fn update(
        &self,
        api: &Api<MutatingWebhookConfiguration>,
        desired: &MutatingWebhookConfiguration,
    ) -> Result<(), RegistrationError> {
        let name = self.spec.configuration_name.as_str();
        let mut current = api.get(name).await.map_err(RegistrationError::Get)?;
        current.webhooks = desired.webhooks.clone();

        match api.replace(name, &PostParams::default(), &current).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                Err(RegistrationError::Conflict(ae.message))
            }
            Err(e) => Err(RegistrationError::Update(e)),
        }
    }
}
