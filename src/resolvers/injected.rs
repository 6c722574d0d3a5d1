use crate::args::ArgValue;
use crate::context::{RequestContext, ServiceKey};
use crate::error::ResolveError;
use tracing::error;

/// Fills a parameter from the request's service provider.
///
/// Not a [`Resolver`](super::Resolver): an unavailable service is a server fault, not
/// a client issue, so it surfaces as [`ResolveError::Service`] instead of a 422.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedResolver {
    name: String,
    key: ServiceKey,
}

impl InjectedResolver {
    pub fn new(name: impl Into<String>, key: ServiceKey) -> Self {
        InjectedResolver {
            name: name.into(),
            key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    pub fn resolve(&self, ctx: &dyn RequestContext) -> Result<ArgValue, ResolveError> {
        match ctx.services().and_then(|p| p.get(&self.key)) {
            Some(service) => Ok(ArgValue::Service(service)),
            None => {
                error!(
                    param = %self.name,
                    service = self.key.type_name(),
                    "Injected service unavailable"
                );
                Err(ResolveError::Service {
                    param: self.name.clone(),
                    type_name: self.key.type_name().to_string(),
                })
            }
        }
    }
}
