use super::{
    BodyParameterResolver, BodyResolver, BulkParameterResolver, CookieParameterResolver,
    FileParameterResolver, FormParameterResolver, HeaderParameterResolver,
    PathParameterResolver, QueryParameterResolver, Resolver, WsBodyParameterResolver,
};
use crate::args::BuildOptions;
use crate::context::EndpointKind;
use crate::error::ConfigError;
use crate::model::{FieldShape, ModelField};
use crate::params::ParamSource;
use std::sync::Arc;
use tracing::debug;

/// Maps a compiled field to the resolver for its source.
///
/// Every shape check happens here, at registration, so a route that would fail per
/// request is never registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverFactory;

impl ResolverFactory {
    /// Resolver for one field of any source.
    ///
    /// # Errors
    ///
    /// - `NonScalarParam` for a sequence or object on a path or cookie parameter
    /// - `WebSocketBodyDisabled` / `UnsupportedSource` for body-like fields a WebSocket
    ///   endpoint cannot serve
    pub fn create(field: ModelField, options: &BuildOptions) -> Result<Arc<dyn Resolver>, ConfigError> {
        let source = field.source();
        debug!(param = %field.name(), source = %source, shape = ?field.shape(), "Creating resolver");
        let resolver: Arc<dyn Resolver> = match source {
            ParamSource::Path => {
                Self::require_scalar(&field)?;
                Arc::new(PathParameterResolver::new(field))
            }
            ParamSource::Cookie => {
                Self::require_scalar(&field)?;
                Arc::new(CookieParameterResolver::new(field))
            }
            ParamSource::Header => Arc::new(HeaderParameterResolver::new(field)),
            ParamSource::Query => Arc::new(QueryParameterResolver::new(field)),
            ParamSource::Body | ParamSource::Form | ParamSource::File => {
                Self::create_body(field, options)?.as_resolver()
            }
        };
        Ok(resolver)
    }

    /// Resolver for a body-like field, usable on its own or inside a composite.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create); non-body sources are `UnsupportedSource`.
    pub fn create_body(
        field: ModelField,
        options: &BuildOptions,
    ) -> Result<Arc<dyn BodyResolver>, ConfigError> {
        let unsupported = |field: &ModelField| ConfigError::UnsupportedSource {
            param: field.name().to_string(),
            source: field.source().to_string(),
        };
        match (options.endpoint, field.source()) {
            (EndpointKind::Http, ParamSource::Body) => Ok(Arc::new(BodyParameterResolver::new(field))),
            (EndpointKind::Http, ParamSource::Form) => Ok(Arc::new(FormParameterResolver::new(field))),
            (EndpointKind::Http, ParamSource::File) => Ok(Arc::new(FileParameterResolver::new(field))),
            (EndpointKind::WebSocket, ParamSource::Body) => {
                if !options.ws_extra_handlers {
                    return Err(ConfigError::WebSocketBodyDisabled {
                        param: field.name().to_string(),
                    });
                }
                Ok(Arc::new(WsBodyParameterResolver::new(field)))
            }
            _ => Err(unsupported(&field)),
        }
    }

    /// Bulk resolver for an expanded composite: one child resolver per property.
    ///
    /// # Errors
    ///
    /// Whatever creating a child returns.
    pub fn create_bulk(
        parent: ModelField,
        children: Vec<ModelField>,
        options: &BuildOptions,
    ) -> Result<Arc<dyn Resolver>, ConfigError> {
        let children = children
            .into_iter()
            .map(|c| Self::create(c, options))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(BulkParameterResolver::new(parent, children)))
    }

    fn require_scalar(field: &ModelField) -> Result<(), ConfigError> {
        match field.shape() {
            FieldShape::Sequence | FieldShape::Object => Err(ConfigError::NonScalarParam {
                param: field.name().to_string(),
                source: field.source().to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FieldSpec;
    use crate::validator_cache::ValidatorCache;
    use serde_json::json;

    fn field(name: &str, spec: FieldSpec, schema: serde_json::Value) -> ModelField {
        ModelField::compile(name, spec, &schema, &ValidatorCache::new(false)).unwrap()
    }

    #[test]
    fn test_sequence_path_param_rejected() {
        let f = field("ids", FieldSpec::path(), json!({"type": "array", "items": {"type": "integer"}}));
        let err = ResolverFactory::create(f, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NonScalarParam { .. }));
    }

    #[test]
    fn test_websocket_body_requires_extra_handlers() {
        let f = field("msg", FieldSpec::body(), json!({"type": "object"}));
        let opts = BuildOptions::default().websocket();
        assert_eq!(
            ResolverFactory::create(f.clone(), &opts).unwrap_err(),
            ConfigError::WebSocketBodyDisabled { param: "msg".into() }
        );
        let r = ResolverFactory::create(f, &opts.with_ws_extra_handlers(true)).unwrap();
        assert_eq!(r.model_field().name(), "msg");
    }

    #[test]
    fn test_websocket_form_unsupported() {
        let f = field("name", FieldSpec::form(), json!({"type": "string"}));
        let err = ResolverFactory::create(f, &BuildOptions::default().websocket()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedSource { .. }));
    }
}
