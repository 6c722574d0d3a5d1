use super::{single, Resolver};
use crate::args::{ArgValue, ValueMap};
use crate::context::RequestContext;
use crate::error::{Issue, LocItem};
use crate::model::{decode_param_value, decode_param_values, ModelField};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Which occurrence a scalar field takes when the key repeats.
#[derive(Debug, Clone, Copy)]
enum Pick {
    First,
    Last,
}

/// Decode and validate the string occurrences found for `field`.
fn resolve_strings(field: &ModelField, values: &[&str], pick: Pick) -> Result<Value, Vec<Issue>> {
    let loc = field.loc();
    if field.shape().is_sequence() {
        if values.is_empty() {
            return field.resolve_missing(&loc);
        }
        return field.validate(&decode_param_values(values, field.schema()), &loc);
    }
    let raw = match pick {
        Pick::First => values.first(),
        Pick::Last => values.last(),
    };
    match raw {
        Some(s) => field.validate(&decode_param_value(s, field.schema()), &loc),
        None => field.resolve_missing(&loc),
    }
}

/// Reads a header by alias; names are case-insensitive.
#[derive(Debug)]
pub struct HeaderParameterResolver {
    field: ModelField,
}

impl HeaderParameterResolver {
    pub fn new(field: ModelField) -> Self {
        HeaderParameterResolver { field }
    }
}

#[async_trait]
impl Resolver for HeaderParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let values = ctx.header_values(self.field.alias());
        let v = resolve_strings(&self.field, &values, Pick::First)?;
        Ok(single(&self.field, ArgValue::Json(v)))
    }
}

#[derive(Debug)]
pub struct QueryParameterResolver {
    field: ModelField,
}

impl QueryParameterResolver {
    pub fn new(field: ModelField) -> Self {
        QueryParameterResolver { field }
    }
}

#[async_trait]
impl Resolver for QueryParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let values = ctx.query_values(self.field.alias());
        let v = resolve_strings(&self.field, &values, Pick::Last)?;
        Ok(single(&self.field, ArgValue::Json(v)))
    }
}

/// Reads a matched path segment. Path fields are always required, so a missing
/// segment is an issue even when the handler declared a default.
#[derive(Debug)]
pub struct PathParameterResolver {
    field: ModelField,
}

impl PathParameterResolver {
    pub fn new(field: ModelField) -> Self {
        PathParameterResolver { field }
    }
}

#[async_trait]
impl Resolver for PathParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let loc = self.field.loc();
        let v = match ctx.path_param(self.field.alias()) {
            Some(raw) => self
                .field
                .validate(&decode_param_value(raw, self.field.schema()), &loc)?,
            None => return Err(vec![Issue::missing(loc)]),
        };
        Ok(single(&self.field, ArgValue::Json(v)))
    }
}

#[derive(Debug)]
pub struct CookieParameterResolver {
    field: ModelField,
}

impl CookieParameterResolver {
    pub fn new(field: ModelField) -> Self {
        CookieParameterResolver { field }
    }
}

#[async_trait]
impl Resolver for CookieParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let values: Vec<&str> = ctx.cookie(self.field.alias()).into_iter().collect();
        let v = resolve_strings(&self.field, &values, Pick::First)?;
        Ok(single(&self.field, ArgValue::Json(v)))
    }
}

/// One object-typed parameter spread over several query, header or cookie fields.
///
/// Children run independently. If any of them reports an issue, only the child issues
/// are returned; otherwise the assembled object is validated against the parent model.
#[derive(Debug)]
pub struct BulkParameterResolver {
    parent: ModelField,
    children: Vec<Arc<dyn Resolver>>,
}

impl BulkParameterResolver {
    pub fn new(parent: ModelField, children: Vec<Arc<dyn Resolver>>) -> Self {
        BulkParameterResolver { parent, children }
    }

    pub fn children(&self) -> &[Arc<dyn Resolver>] {
        &self.children
    }
}

#[async_trait]
impl Resolver for BulkParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.parent
    }

    fn models(&self) -> Vec<&ModelField> {
        self.children.iter().map(|c| c.model_field()).collect()
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let results = join_all(self.children.iter().map(|c| c.resolve(ctx))).await;

        let mut issues = Vec::new();
        let mut object = Map::new();
        for result in results {
            match result {
                Ok(values) => {
                    for (name, value) in values {
                        // absent optional properties are left out, not sent as null
                        if let ArgValue::Json(v) = value {
                            if !v.is_null() {
                                object.insert(name, v);
                            }
                        }
                    }
                }
                Err(e) => issues.extend(e),
            }
        }
        if !issues.is_empty() {
            return Err(issues);
        }

        let loc = [LocItem::field(self.parent.source().loc_tag())];
        let v = self.parent.validate(&Value::Object(object), &loc)?;
        Ok(single(&self.parent, ArgValue::Json(v)))
    }
}
