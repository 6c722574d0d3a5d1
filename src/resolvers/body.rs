use super::{single, BodyPayload, BodyResolver, Resolver};
use crate::args::{ArgValue, ValueMap};
use crate::context::{FormData, FormValue, RequestContext, UploadFile};
use crate::error::{Issue, LocItem};
use crate::model::{
    decode_param_value, decode_param_values, is_object, is_sequence, FieldShape, ModelField,
};
use async_trait::async_trait;
use futures::future::join_all;
use http::header::CONTENT_TYPE;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// `application/json`, `application/problem+json`, `text/json`, ...
static JSON_MEDIA_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9.!#$&^_-]+/([a-z0-9.!#$&^_+-]+\+)?json$")
        .expect("JSON media type regex should be valid")
});

/// How a body resolver wants the request body decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Json,
    Form,
    Message,
}

fn body_loc() -> Vec<LocItem> {
    vec![LocItem::field("body")]
}

/// Read and decode the JSON body.
///
/// An empty body is `None`. Bodies without a content type or with a JSON one
/// (`application/json`, `*/*+json`) are parsed; a parse error becomes one
/// `BodyParseFailure` located at the byte offset of the error. Any other content type
/// yields the body as a string.
pub async fn load_json_body(ctx: &dyn RequestContext) -> Result<Option<Value>, Issue> {
    let body = ctx.body().await.map_err(|e| e.to_issue())?;
    if body.is_empty() {
        return Ok(None);
    }
    let content_type = ctx
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        });
    let is_json = match &content_type {
        None => true,
        Some(ct) => JSON_MEDIA_TYPE.is_match(ct),
    };
    if !is_json {
        return Ok(Some(Value::String(String::from_utf8_lossy(&body).into_owned())));
    }
    serde_json::from_slice(&body).map(Some).map_err(|e| {
        let offset = byte_offset(&body, e.line(), e.column());
        warn!(offset = offset, error = %e, "Malformed JSON request body");
        Issue::body_parse(
            vec![LocItem::field("body"), LocItem::index(offset)],
            format!("JSON decode error: {}", e),
        )
    })
}

/// serde_json reports 1-based line/column; convert to a byte offset into `body`.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in body.split(|b| *b == b'\n').enumerate() {
        if i + 1 == line {
            return (offset + column.saturating_sub(1)).min(body.len());
        }
        offset += l.len() + 1;
    }
    body.len()
}

async fn load_payload(kind: PayloadKind, ctx: &dyn RequestContext) -> Result<BodyPayload, Issue> {
    match kind {
        PayloadKind::Json => load_json_body(ctx).await.map(BodyPayload::Json),
        PayloadKind::Form => ctx
            .form()
            .await
            .map(BodyPayload::Form)
            .map_err(|e| {
                warn!(error = %e, "Undecodable form body");
                e.to_issue()
            }),
        PayloadKind::Message => Ok(BodyPayload::Message(ctx.message().cloned())),
    }
}

/// Whole body or, when embedded, the member named by the alias.
fn resolve_json(field: &ModelField, body: Option<&Value>) -> Result<Value, Vec<Issue>> {
    if field.spec().is_embedded() {
        let loc = field.loc();
        match body.and_then(|b| b.get(field.alias())) {
            Some(v) => field.validate(v, &loc),
            None => field.resolve_missing(&loc),
        }
    } else {
        match body {
            Some(v) => field.validate(v, &body_loc()),
            None => field.resolve_missing(&body_loc()),
        }
    }
}

fn form_as_json(form: &FormData) -> Option<Value> {
    if form.is_empty() {
        None
    } else {
        Some(form.to_json())
    }
}

/// JSON `body`, whole or embedded.
#[derive(Debug)]
pub struct BodyParameterResolver {
    field: ModelField,
}

impl BodyParameterResolver {
    pub fn new(field: ModelField) -> Self {
        BodyParameterResolver { field }
    }
}

#[async_trait]
impl Resolver for BodyParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let payload = load_payload(self.payload_kind(), ctx)
            .await
            .map_err(|i| vec![i])?;
        self.resolve_payload(&payload).await
    }
}

#[async_trait]
impl BodyResolver for BodyParameterResolver {
    async fn resolve_payload(&self, payload: &BodyPayload) -> Result<ValueMap, Vec<Issue>> {
        let v = match payload {
            BodyPayload::Json(b) | BodyPayload::Message(b) => resolve_json(&self.field, b.as_ref())?,
            BodyPayload::Form(form) => resolve_json(&self.field, form_as_json(form).as_ref())?,
        };
        Ok(single(&self.field, ArgValue::Json(v)))
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Json
    }

    fn as_resolver(self: Arc<Self>) -> Arc<dyn Resolver> {
        self
    }
}

/// The message of a WebSocket dispatch, with Body's embed rules.
#[derive(Debug)]
pub struct WsBodyParameterResolver {
    field: ModelField,
}

impl WsBodyParameterResolver {
    pub fn new(field: ModelField) -> Self {
        WsBodyParameterResolver { field }
    }
}

#[async_trait]
impl Resolver for WsBodyParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        self.resolve_payload(&BodyPayload::Message(ctx.message().cloned()))
            .await
    }
}

#[async_trait]
impl BodyResolver for WsBodyParameterResolver {
    async fn resolve_payload(&self, payload: &BodyPayload) -> Result<ValueMap, Vec<Issue>> {
        let v = match payload {
            BodyPayload::Json(b) | BodyPayload::Message(b) => resolve_json(&self.field, b.as_ref())?,
            BodyPayload::Form(form) => resolve_json(&self.field, form_as_json(form).as_ref())?,
        };
        Ok(single(&self.field, ArgValue::Json(v)))
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Message
    }

    fn as_resolver(self: Arc<Self>) -> Arc<dyn Resolver> {
        self
    }
}

/// Decode the form entries named by an object schema's properties.
fn decode_form_object(form: &FormData, schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return form.to_json();
    };
    let mut out = Map::new();
    for (name, prop) in properties {
        let texts: Vec<&str> = form
            .get_all(name)
            .into_iter()
            .filter(|v| !v.is_blank())
            .filter_map(FormValue::as_text)
            .collect();
        if texts.is_empty() {
            continue;
        }
        let v = if is_sequence(prop) {
            decode_param_values(&texts, prop)
        } else {
            texts
                .last()
                .map(|t| decode_param_value(t, prop))
                .unwrap_or(Value::Null)
        };
        out.insert(name.clone(), v);
    }
    Value::Object(out)
}

/// A field of a urlencoded or multipart form.
///
/// When a required field is absent and its type is an object, the whole form is
/// validated as that object, so one parameter can stand for the entire submission.
#[derive(Debug)]
pub struct FormParameterResolver {
    field: ModelField,
}

impl FormParameterResolver {
    pub fn new(field: ModelField) -> Self {
        FormParameterResolver { field }
    }

    fn missing(&self, whole: impl FnOnce() -> Value) -> Result<Value, Vec<Issue>> {
        if self.field.required() && is_object(self.field.schema()) {
            return self.field.validate(&whole(), &body_loc());
        }
        self.field.resolve_missing(&self.field.loc())
    }

    fn from_form(&self, form: &FormData) -> Result<Value, Vec<Issue>> {
        let field = &self.field;
        let loc = field.loc();
        let texts: Vec<&str> = form
            .get_all(field.alias())
            .into_iter()
            .filter(|v| !v.is_blank())
            .filter_map(FormValue::as_text)
            .collect();
        if field.shape().is_sequence() {
            if !texts.is_empty() {
                return field.validate(&decode_param_values(&texts, field.schema()), &loc);
            }
        } else if let Some(t) = texts.last() {
            return field.validate(&decode_param_value(t, field.schema()), &loc);
        }
        self.missing(|| decode_form_object(form, field.schema()))
    }

    fn from_json(&self, body: Option<&Value>) -> Result<Value, Vec<Issue>> {
        let field = &self.field;
        match body.and_then(|b| b.get(field.alias())) {
            Some(Value::String(s)) => {
                field.validate(&decode_param_value(s, field.schema()), &field.loc())
            }
            Some(v) => field.validate(v, &field.loc()),
            None => self.missing(|| body.cloned().unwrap_or_else(|| Value::Object(Map::new()))),
        }
    }
}

#[async_trait]
impl Resolver for FormParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let payload = load_payload(self.payload_kind(), ctx)
            .await
            .map_err(|i| vec![i])?;
        self.resolve_payload(&payload).await
    }
}

#[async_trait]
impl BodyResolver for FormParameterResolver {
    async fn resolve_payload(&self, payload: &BodyPayload) -> Result<ValueMap, Vec<Issue>> {
        let v = match payload {
            BodyPayload::Form(form) => self.from_form(form)?,
            BodyPayload::Json(b) | BodyPayload::Message(b) => self.from_json(b.as_ref())?,
        };
        Ok(single(&self.field, ArgValue::Json(v)))
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Form
    }

    fn as_resolver(self: Arc<Self>) -> Arc<dyn Resolver> {
        self
    }
}

/// Uploaded files. Byte-typed fields read every file concurrently and join before the
/// size checks run.
#[derive(Debug)]
pub struct FileParameterResolver {
    field: ModelField,
}

impl FileParameterResolver {
    pub fn new(field: ModelField) -> Self {
        FileParameterResolver { field }
    }

    /// Count and size constraints. Sizes are checked against `min_length`/`max_length`
    /// in bytes.
    fn check(&self, sizes: &[usize]) -> Result<(), Vec<Issue>> {
        let c = self.field.spec().constraints();
        let loc = self.field.loc();
        let mut issues = Vec::new();
        let count = sizes.len() as u64;
        if let Some(min) = c.min_items.filter(|m| count < *m) {
            issues.push(Issue::validation(
                loc.clone(),
                format!("expected at least {} files, got {}", min, count),
            ));
        }
        if let Some(max) = c.max_items.filter(|m| count > *m) {
            issues.push(Issue::validation(
                loc.clone(),
                format!("expected at most {} files, got {}", max, count),
            ));
        }
        let sequence = self.field.shape().is_sequence();
        for (i, size) in sizes.iter().enumerate() {
            let size = *size as u64;
            let mut at = loc.clone();
            if sequence {
                at.push(LocItem::index(i));
            }
            if let Some(max) = c.max_length.filter(|m| size > *m) {
                issues.push(
                    Issue::validation(at.clone(), format!("file is {} bytes, limit is {}", size, max))
                        .with_input(Value::from(size)),
                );
            }
            if let Some(min) = c.min_length.filter(|m| size < *m) {
                issues.push(
                    Issue::validation(at, format!("file is {} bytes, minimum is {}", size, min))
                        .with_input(Value::from(size)),
                );
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    fn missing(&self) -> Result<ValueMap, Vec<Issue>> {
        let v = self.field.resolve_missing(&self.field.loc())?;
        Ok(single(&self.field, ArgValue::Json(v)))
    }

    async fn from_form(&self, form: &FormData) -> Result<ValueMap, Vec<Issue>> {
        let entries = form.get_all(self.field.alias());
        let files: Vec<&UploadFile> = entries.iter().filter_map(|v| v.as_file()).collect();
        if files.is_empty() {
            if let Some(text) = entries.iter().filter(|v| !v.is_blank()).find_map(|v| v.as_text()) {
                return Err(vec![Issue::validation(
                    self.field.loc(),
                    "Expected an uploaded file, received a text value",
                )
                .with_input(Value::String(text.to_string()))]);
            }
            return self.missing();
        }

        let value = match self.field.shape() {
            FieldShape::Binary | FieldShape::BinarySequence => {
                let reads: Vec<_> = if self.field.shape() == FieldShape::Binary {
                    files.iter().rev().take(1).map(|f| f.read()).collect()
                } else {
                    files.iter().map(|f| f.read()).collect()
                };
                let contents = join_all(reads).await;
                let sizes: Vec<usize> = contents.iter().map(|b| b.len()).collect();
                self.check(&sizes)?;
                if self.field.shape() == FieldShape::Binary {
                    ArgValue::Bytes(contents.into_iter().next().unwrap_or_default())
                } else {
                    ArgValue::BytesList(contents)
                }
            }
            FieldShape::UploadSequence => {
                let sizes: Vec<usize> = files.iter().map(|f| f.size()).collect();
                self.check(&sizes)?;
                ArgValue::Uploads(files.into_iter().cloned().collect())
            }
            _ => {
                let Some(last) = files.last().copied() else {
                    return self.missing();
                };
                self.check(&[last.size()])?;
                ArgValue::Upload(last.clone())
            }
        };
        Ok(single(&self.field, value))
    }
}

#[async_trait]
impl Resolver for FileParameterResolver {
    fn model_field(&self) -> &ModelField {
        &self.field
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let payload = load_payload(self.payload_kind(), ctx)
            .await
            .map_err(|i| vec![i])?;
        self.resolve_payload(&payload).await
    }
}

#[async_trait]
impl BodyResolver for FileParameterResolver {
    async fn resolve_payload(&self, payload: &BodyPayload) -> Result<ValueMap, Vec<Issue>> {
        match payload {
            BodyPayload::Form(form) => self.from_form(form).await,
            // files never arrive inside a JSON document
            BodyPayload::Json(_) | BodyPayload::Message(_) => self.missing(),
        }
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Form
    }

    fn as_resolver(self: Arc<Self>) -> Arc<dyn Resolver> {
        self
    }
}

/// Every body-like field of one handler, fed from a single read of the body.
///
/// The composite model describes the merged body for the OpenAPI builder; each child
/// validates its own embedded member.
#[derive(Debug)]
pub struct BulkBodyResolver {
    composite: ModelField,
    children: Vec<Arc<dyn BodyResolver>>,
    kind: PayloadKind,
}

impl BulkBodyResolver {
    pub fn new(composite: ModelField, children: Vec<Arc<dyn BodyResolver>>, kind: PayloadKind) -> Self {
        BulkBodyResolver {
            composite,
            children,
            kind,
        }
    }

    pub fn children(&self) -> &[Arc<dyn BodyResolver>] {
        &self.children
    }
}

#[async_trait]
impl Resolver for BulkBodyResolver {
    fn model_field(&self) -> &ModelField {
        &self.composite
    }

    fn models(&self) -> Vec<&ModelField> {
        self.children.iter().map(|c| c.model_field()).collect()
    }

    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>> {
        let payload = load_payload(self.kind, ctx).await.map_err(|i| vec![i])?;
        self.resolve_payload(&payload).await
    }
}

#[async_trait]
impl BodyResolver for BulkBodyResolver {
    async fn resolve_payload(&self, payload: &BodyPayload) -> Result<ValueMap, Vec<Issue>> {
        let results = join_all(self.children.iter().map(|c| c.resolve_payload(payload))).await;
        let mut values = ValueMap::new();
        let mut issues = Vec::new();
        for result in results {
            match result {
                Ok(v) => values.extend(v),
                Err(e) => issues.extend(e),
            }
        }
        if issues.is_empty() {
            Ok(values)
        } else {
            Err(issues)
        }
    }

    fn payload_kind(&self) -> PayloadKind {
        self.kind
    }

    fn as_resolver(self: Arc<Self>) -> Arc<dyn Resolver> {
        self
    }
}
