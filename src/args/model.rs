use super::{compose_body, ArgValue, BuildOptions, Kwargs};
use crate::context::{ContextKind, RequestContext};
use crate::error::{ConfigError, ErrorAggregator, ResolveError};
use crate::model::ModelField;
use crate::params::ParamSource;
use crate::resolvers::{InjectedResolver, Resolver, ResolverFactory};
use crate::signature::{inspect, HandlerSignature, ParamDescriptor, RouteTemplate};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolvers built for one handler.
struct BuiltModel {
    /// Non-body resolvers, grouped header, path, query, cookie
    resolvers: Vec<Arc<dyn Resolver>>,
    body: Option<Arc<dyn Resolver>>,
    injected: Vec<InjectedResolver>,
    contexts: Vec<(String, ContextKind)>,
}

/// Order in which non-body issues are reported.
fn source_rank(source: ParamSource) -> u8 {
    match source {
        ParamSource::Header => 0,
        ParamSource::Path => 1,
        ParamSource::Query => 2,
        ParamSource::Cookie => 3,
        ParamSource::Body | ParamSource::Form | ParamSource::File => 4,
    }
}

/// Build-once, resolve-many argument model of one handler.
///
/// ```rust
/// use brrtrouter_args::args::{BuildOptions, EndpointArgsModel};
/// use brrtrouter_args::context::HttpConnection;
/// use brrtrouter_args::signature::{DeclaredParam, HandlerSignature};
/// use serde_json::json;
///
/// # tokio_test_block(async {
/// let sig = HandlerSignature::new("get_item")
///     .param(DeclaredParam::new("id", json!({"type": "integer"})))
///     .param(DeclaredParam::new("q", json!({"type": "string"})).literal(json!("x")));
/// let model = EndpointArgsModel::build(sig, "/items/{id}", BuildOptions::default()).unwrap();
///
/// let conn = HttpConnection::builder().path("/items/42?q=hi").route(model.route()).build();
/// let kwargs = model.resolve_dependencies(&conn).await.unwrap();
/// assert_eq!(kwargs.get::<i64>("id").unwrap(), 42);
/// assert_eq!(kwargs.get::<String>("q").unwrap(), "hi");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct EndpointArgsModel {
    signature: HandlerSignature,
    template: RouteTemplate,
    options: BuildOptions,
    built: Option<BuiltModel>,
}

impl fmt::Debug for EndpointArgsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointArgsModel")
            .field("handler", &self.signature.name())
            .field("route", &self.template.path())
            .field("endpoint", &self.options.endpoint)
            .field("built", &self.built.is_some())
            .finish()
    }
}

impl EndpointArgsModel {
    /// Unbuilt model; call [`build_model`](Self::build_model) before resolving.
    pub fn new(signature: HandlerSignature, route_path: &str, options: BuildOptions) -> Self {
        EndpointArgsModel {
            signature,
            template: RouteTemplate::parse(route_path),
            options,
            built: None,
        }
    }

    /// `new` followed by `build_model`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised while building.
    pub fn build(
        signature: HandlerSignature,
        route_path: &str,
        options: BuildOptions,
    ) -> Result<Self, ConfigError> {
        let mut model = EndpointArgsModel::new(signature, route_path, options);
        model.build_model()?;
        Ok(model)
    }

    /// Inspect the signature and create every resolver. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from inspection, schema compilation or resolver creation.
    /// The model stays unbuilt when this fails.
    pub fn build_model(&mut self) -> Result<(), ConfigError> {
        if self.built.is_some() {
            return Ok(());
        }
        let handler = self.signature.name().to_string();
        let cache = &self.options.validator_cache;

        let mut resolvers = Vec::new();
        let mut body_fields = Vec::new();
        let mut injected = Vec::new();
        let mut contexts = Vec::new();

        for descriptor in inspect(&self.signature, &self.template)? {
            match descriptor {
                ParamDescriptor::Field { name, spec, schema } => {
                    let field = ModelField::compile(&name, spec, &schema, cache)?;
                    if field.source().is_body_like() {
                        body_fields.push(field);
                    } else {
                        resolvers.push(ResolverFactory::create(field, &self.options)?);
                    }
                }
                ParamDescriptor::Composite {
                    name,
                    spec,
                    schema,
                    children,
                } => {
                    let parent = ModelField::compile(&name, spec, &schema, cache)?;
                    let children = children
                        .into_iter()
                        .map(|(spec, schema)| {
                            let child = spec.name().unwrap_or(name.as_str()).to_string();
                            ModelField::compile(&child, spec, &schema, cache)
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    resolvers.push(ResolverFactory::create_bulk(parent, children, &self.options)?);
                }
                ParamDescriptor::Injected { name, key } => {
                    injected.push(InjectedResolver::new(name, key));
                }
                ParamDescriptor::Context { name, kind } => contexts.push((name, kind)),
            }
        }

        resolvers.sort_by_key(|r| source_rank(r.model_field().source()));
        let body = compose_body(&handler, body_fields, &self.options)?;

        info!(
            handler = %handler,
            route = %self.template.path(),
            resolver_count = resolvers.len(),
            has_body = body.is_some(),
            injected_count = injected.len(),
            "Endpoint argument model built"
        );
        self.built = Some(BuiltModel {
            resolvers,
            body,
            injected,
            contexts,
        });
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Resolve every handler argument from one request.
    ///
    /// The body is resolved first. If it cannot be decoded at all, its issue is
    /// returned alone; otherwise every other resolver runs concurrently and all issues
    /// are returned together, body issues first.
    ///
    /// # Errors
    ///
    /// - `ResolveError::Invalid` with every issue found
    /// - `ResolveError::Service` when an injected service is unavailable
    /// - `ResolveError::Config` when the model was never built
    pub async fn resolve_dependencies(&self, ctx: &dyn RequestContext) -> Result<Kwargs, ResolveError> {
        let handler = self.signature.name();
        let built = self.built.as_ref().ok_or_else(|| ConfigError::NotBuilt {
            handler: handler.to_string(),
        })?;

        let mut kwargs = Kwargs::new();
        let mut errors = ErrorAggregator::new();

        if let Some(body) = &built.body {
            match body.resolve(ctx).await {
                Ok(values) => kwargs.extend(values),
                Err(issues) => {
                    debug!(
                        handler = handler,
                        param = body.model_field().name(),
                        source = "body",
                        issue_count = issues.len(),
                        "Body resolution failed"
                    );
                    errors.extend(issues);
                }
            }
            if errors.has_body_parse_failure() {
                warn!(handler = handler, "Request body could not be decoded; skipping other parameters");
                return errors.finish(kwargs).map_err(ResolveError::from);
            }
        }

        let results = join_all(built.resolvers.iter().map(|r| r.resolve(ctx))).await;
        for (resolver, result) in built.resolvers.iter().zip(results) {
            match result {
                Ok(values) => kwargs.extend(values),
                Err(issues) => {
                    let field = resolver.model_field();
                    debug!(
                        handler = handler,
                        param = field.name(),
                        source = %field.source(),
                        issue_count = issues.len(),
                        "Parameter resolution failed"
                    );
                    errors.extend(issues);
                }
            }
        }

        for injected in &built.injected {
            kwargs.insert(injected.name(), injected.resolve(ctx)?);
        }
        for (name, kind) in &built.contexts {
            kwargs.insert(name.clone(), ArgValue::Context(*kind));
        }

        errors.finish(kwargs).map_err(ResolveError::from)
    }

    /// Every wire-level model: non-body fields (composites by property) then body fields.
    pub fn get_all_models(&self) -> Vec<&ModelField> {
        let Some(built) = &self.built else {
            return Vec::new();
        };
        built
            .resolvers
            .iter()
            .chain(built.body.iter())
            .flat_map(|r| r.models())
            .collect()
    }

    /// The body model: the only body field, or the synthesized composite.
    pub fn body_model(&self) -> Option<&ModelField> {
        self.built
            .as_ref()
            .and_then(|b| b.body.as_ref())
            .map(|r| r.model_field())
    }

    pub fn path_param_names(&self) -> Vec<&str> {
        self.template.param_names()
    }

    pub fn signature(&self) -> &HandlerSignature {
        &self.signature
    }

    pub fn route(&self) -> &RouteTemplate {
        &self.template
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }
}
