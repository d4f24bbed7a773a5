use lxcfs_mutator::{AdmissionDecisionEngine, Scheme};

pub(crate) struct ApiServerState {
    pub(crate) engine: AdmissionDecisionEngine,
    pub(crate) scheme: Scheme,
}
