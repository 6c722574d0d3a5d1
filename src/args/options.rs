use crate::context::EndpointKind;
use crate::runtime_config::ArgsConfig;
use crate::validator_cache::ValidatorCache;

/// Registration-time settings for building an endpoint's argument model.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub endpoint: EndpointKind,
    /// Allow body fields on WebSocket endpoints
    pub ws_extra_handlers: bool,
    /// Shared between every model built with these options
    pub validator_cache: ValidatorCache,
}

impl BuildOptions {
    /// HTTP endpoint options from loaded configuration.
    pub fn from_config(config: &ArgsConfig) -> Self {
        BuildOptions {
            endpoint: EndpointKind::Http,
            ws_extra_handlers: config.ws_extra_handlers,
            validator_cache: ValidatorCache::new(config.schema_cache),
        }
    }

    /// Same settings, for a WebSocket endpoint.
    pub fn websocket(mut self) -> Self {
        self.endpoint = EndpointKind::WebSocket;
        self
    }

    pub fn with_ws_extra_handlers(mut self, enabled: bool) -> Self {
        self.ws_extra_handlers = enabled;
        self
    }

    pub fn with_validator_cache(mut self, cache: ValidatorCache) -> Self {
        self.validator_cache = cache;
        self
    }
}
