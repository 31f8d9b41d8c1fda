use crate::network::GatewayConfig;
use crate::session::SessionConfig;

/// Dispatcher behaviour.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Reported in logs and metrics labels.
    pub service_name: String,
    /// When false, 5xx REST responses carry the canonical reason phrase
    /// instead of the underlying error text.
    pub expose_internal_errors: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            service_name: "roster".to_string(),
            expose_internal_errors: false,
        }
    }
}

/// Everything an entry point needs to assemble the runtime.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub session: SessionConfig,
    pub dispatch: DispatchConfig,
    pub gateway: GatewayConfig,
    /// Emit JSON log lines instead of human-readable output.
    pub log_json: bool,
}
