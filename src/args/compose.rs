use super::BuildOptions;
use crate::context::EndpointKind;
use crate::error::ConfigError;
use crate::model::ModelField;
use crate::params::FieldSpec;
use crate::resolvers::{BulkBodyResolver, PayloadKind, Resolver, ResolverFactory};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Fold every body-like field of a handler into the one resolver that reads the body.
///
/// - no fields: `None`
/// - one field: its own resolver, unchanged
/// - several: each field is embedded under its alias and a composite `Body_{handler}`
///   object model is synthesized over them. The composite's media type is the shared
///   one when all fields agree, otherwise the media type of the field with the
///   highest alias. A form or multipart media type decodes the body as a form, anything
///   else as JSON.
///
/// # Errors
///
/// - `ConfigError::DuplicateParam` when two fields share an alias
/// - whatever creating a child resolver or compiling the composite returns
pub fn compose_body(
    handler: &str,
    fields: Vec<ModelField>,
    options: &BuildOptions,
) -> Result<Option<Arc<dyn Resolver>>, ConfigError> {
    if fields.len() <= 1 {
        return fields
            .into_iter()
            .next()
            .map(|f| ResolverFactory::create(f, options))
            .transpose();
    }

    let mut aliases = HashSet::new();
    if let Some(dup) = fields.iter().find(|f| !aliases.insert(f.alias())) {
        return Err(ConfigError::DuplicateParam {
            param: dup.alias().to_string(),
        });
    }

    let fields: Vec<ModelField> = fields.iter().map(ModelField::embedded).collect();
    let media_type = select_media_type(&fields);
    let kind = match (options.endpoint, media_type.as_deref()) {
        (EndpointKind::WebSocket, _) => PayloadKind::Message,
        (_, Some(mt)) if is_form_media_type(mt) => PayloadKind::Form,
        _ => PayloadKind::Json,
    };

    let name = format!("Body_{}", handler);
    let mut spec = match kind {
        PayloadKind::Form => FieldSpec::form(),
        PayloadKind::Json | PayloadKind::Message => FieldSpec::body(),
    };
    if let Some(mt) = &media_type {
        spec = spec.media_type(mt.clone());
    }
    let refs: Vec<&ModelField> = fields.iter().collect();
    let composite = ModelField::composite(&name, spec, &refs, &options.validator_cache)?;

    let children = fields
        .into_iter()
        .map(|f| ResolverFactory::create_body(f, options))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        handler = handler,
        media_type = ?media_type,
        payload = ?kind,
        field_count = children.len(),
        "Composed body model"
    );
    Ok(Some(Arc::new(BulkBodyResolver::new(composite, children, kind))))
}

fn select_media_type(fields: &[ModelField]) -> Option<String> {
    let first = fields.first()?.media_type();
    if fields.iter().all(|f| f.media_type() == first) {
        return first.map(str::to_string);
    }
    fields
        .iter()
        .max_by(|a, b| a.alias().cmp(b.alias()))
        .and_then(|f| f.media_type())
        .map(str::to_string)
}

fn is_form_media_type(media_type: &str) -> bool {
    let mt = media_type.to_ascii_lowercase();
    mt.starts_with("application/x-www-form-urlencoded") || mt.starts_with("multipart/form-data")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator_cache::ValidatorCache;
    use serde_json::json;

    fn field(name: &str, spec: FieldSpec) -> ModelField {
        ModelField::compile(name, spec, &json!({"type": "string"}), &ValidatorCache::new(false))
            .unwrap()
    }

    #[test]
    fn test_single_field_not_composed() {
        let r = compose_body("h", vec![field("item", FieldSpec::body())], &BuildOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(r.model_field().name(), "item");
        assert!(!r.model_field().spec().is_embedded());
    }

    #[test]
    fn test_media_type_tie_break_takes_highest_alias() {
        let fields = vec![
            field("alpha", FieldSpec::body()),
            field("zeta", FieldSpec::form()),
        ];
        assert_eq!(
            select_media_type(&fields).as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        let r = compose_body("create", fields, &BuildOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(r.model_field().name(), "Body_create");
        assert_eq!(r.models().len(), 2);
        assert!(r.models().iter().all(|m| m.spec().is_embedded()));
    }

    #[test]
    fn test_shared_alias_is_rejected() {
        let fields = vec![
            field("a", FieldSpec::body().alias("item")),
            field("b", FieldSpec::body().alias("item")),
        ];
        let err = compose_body("h", fields, &BuildOptions::default()).err();
        assert_eq!(err, Some(ConfigError::DuplicateParam { param: "item".into() }));
    }

    #[test]
    fn test_composite_schema_lists_required_aliases() {
        let fields = vec![
            field("x", FieldSpec::body()),
            field("y", FieldSpec::body().optional()),
        ];
        let r = compose_body("h", fields, &BuildOptions::default()).unwrap().unwrap();
        let schema = r.model_field().schema();
        assert_eq!(schema["required"], json!(["x"]));
        assert!(schema["properties"].get("y").is_some());
        assert!(r.model_field().required());
    }
}
