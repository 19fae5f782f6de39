//! Declarative request-parameter decoding.
//!
//! Each endpoint owns a static [`ParamSchema`] built once at registration.
//! Decoding pulls values from path variables, the query string, and the
//! request body (JSON, urlencoded, or multipart keyed on Content-Type),
//! then applies each field's rules in order: trim, required, format.
//! Validation is fail-fast: the first offending field aborts the request
//! with a 400 naming that field.

use std::collections::HashMap;
use std::io::Write;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::dispatch::context::{RequestContext, UploadBody, UploadedFile};
use crate::error::ApiError;

/// Where a field's raw value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// URL path variable.
    Url,
    /// Query-string parameter.
    Query,
    /// Request body (JSON key, urlencoded pair, or multipart text part).
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    Text,
    Uuid,
    Bool,
}

/// One declarative field rule. Built with the source constructors plus
/// chainable modifiers, e.g. `Field::form("title").trim().required()`.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    source: ParamSource,
    /// Name in the source when it differs from `name`.
    rename: Option<&'static str>,
    format: ParamFormat,
    required: bool,
    trim: bool,
}

impl Field {
    fn new(name: &'static str, source: ParamSource) -> Self {
        Self {
            name,
            source,
            rename: None,
            format: ParamFormat::Text,
            required: false,
            trim: false,
        }
    }

    pub fn url(name: &'static str) -> Self {
        Self::new(name, ParamSource::Url)
    }

    pub fn query(name: &'static str) -> Self {
        Self::new(name, ParamSource::Query)
    }

    pub fn form(name: &'static str) -> Self {
        Self::new(name, ParamSource::Form)
    }

    pub fn named(mut self, source_name: &'static str) -> Self {
        self.rename = Some(source_name);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn uuid(mut self) -> Self {
        self.format = ParamFormat::Uuid;
        self
    }

    pub fn boolean(mut self) -> Self {
        self.format = ParamFormat::Bool;
        self
    }

    fn source_name(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Uuid(Uuid),
    Bool(bool),
}

/// Decoded, validated parameters. Fields declared `required` are guaranteed
/// present under their declared (not renamed) names.
#[derive(Debug, Default)]
pub struct Params(HashMap<&'static str, ParamValue>);

impl Params {
    /// Text value, or `""` when absent.
    pub fn text(&self, name: &str) -> &str {
        match self.0.get(name) {
            Some(ParamValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn opt_text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ParamValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn uuid(&self, name: &str) -> Option<Uuid> {
        match self.0.get(name) {
            Some(ParamValue::Uuid(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(ParamValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ParamSchema {
    fields: Vec<Field>,
}

impl ParamSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Decode and validate the request against this schema.
    ///
    /// Multipart file parts are not parameters; they are buffered up to
    /// `max_in_memory` bytes, spilled to temp files past that, and attached
    /// to the context for guaranteed release at Finalize.
    pub async fn decode(
        &self,
        path_vars: &[(String, String)],
        req: Request,
        ctx: &mut RequestContext,
        max_in_memory: usize,
    ) -> Result<Params, ApiError> {
        let url: HashMap<String, String> = path_vars.iter().cloned().collect();

        let query: HashMap<String, String> = req
            .uri()
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let form = if content_type.starts_with("application/json") {
            let bytes = read_body(req, max_in_memory).await?;
            parse_json_body(&bytes)?
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let bytes = read_body(req, max_in_memory).await?;
            url::form_urlencoded::parse(&bytes)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        } else if content_type.starts_with("multipart/form-data") {
            read_multipart(req, ctx, max_in_memory).await?
        } else {
            HashMap::new()
        };

        self.apply(&url, &query, &form)
    }

    /// Pure rule evaluation over the three source maps, in declaration order.
    fn apply(
        &self,
        url: &HashMap<String, String>,
        query: &HashMap<String, String>,
        form: &HashMap<String, String>,
    ) -> Result<Params, ApiError> {
        let mut params = Params::default();

        for field in &self.fields {
            let source = match field.source {
                ParamSource::Url => url,
                ParamSource::Query => query,
                ParamSource::Form => form,
            };
            let mut raw = source.get(field.source_name()).cloned();

            // Trim runs before the required check so whitespace-only input
            // counts as missing.
            if field.trim {
                raw = raw.map(|s| s.trim().to_string());
            }

            let present = raw.as_deref().map(|s| !s.is_empty()).unwrap_or(false);
            if field.required && !present {
                return Err(ApiError::bad_request(format!(
                    "{} is required",
                    field.name
                )));
            }
            if !present {
                continue;
            }
            let value = raw.unwrap_or_default();

            let parsed = match field.format {
                ParamFormat::Text => ParamValue::Text(value),
                ParamFormat::Uuid => Uuid::parse_str(&value).map(ParamValue::Uuid).map_err(
                    |_| ApiError::bad_request(format!("{} must be a valid uuid", field.name)),
                )?,
                ParamFormat::Bool => parse_bool(&value).map(ParamValue::Bool).ok_or_else(
                    || ApiError::bad_request(format!("{} must be a boolean", field.name)),
                )?,
            };

            // Required also rejects the type's zero value: false for bools,
            // the nil uuid. (Empty text is already caught above.)
            if field.required && is_zero(&parsed) {
                return Err(ApiError::bad_request(format!(
                    "{} is required",
                    field.name
                )));
            }
            params.0.insert(field.name, parsed);
        }

        Ok(params)
    }
}

fn is_zero(value: &ParamValue) -> bool {
    match value {
        ParamValue::Text(s) => s.is_empty(),
        ParamValue::Bool(b) => !b,
        ParamValue::Uuid(u) => u.is_nil(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

async fn read_body(req: Request, limit: usize) -> Result<Vec<u8>, ApiError> {
    let bytes = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|_| ApiError::bad_request("failed to read request body"))?;
    Ok(bytes.to_vec())
}

/// Flatten a top-level JSON object into string values; nested structures are
/// not addressable by field rules and are ignored.
fn parse_json_body(bytes: &[u8]) -> Result<HashMap<String, String>, ApiError> {
    if bytes.is_empty() {
        return Ok(HashMap::new());
    }

    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|_| ApiError::bad_request("request body is not valid JSON"))?;

    let object = match value {
        serde_json::Value::Object(map) => map,
        _ => return Err(ApiError::bad_request("request body must be a JSON object")),
    };

    let mut form = HashMap::new();
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                form.insert(key, s);
            }
            serde_json::Value::Bool(b) => {
                form.insert(key, b.to_string());
            }
            serde_json::Value::Number(n) => {
                form.insert(key, n.to_string());
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn read_multipart(
    req: Request,
    ctx: &mut RequestContext,
    max_in_memory: usize,
) -> Result<HashMap<String, String>, ApiError> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?;

    let mut form = HashMap::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?
    {
        let name = match field.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        if field.file_name().is_some() {
            let file_name = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().map(|s| s.to_string());

            let mut buffer: Vec<u8> = Vec::new();
            let mut spill: Option<NamedTempFile> = None;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|_| ApiError::bad_request("malformed multipart body"))?
            {
                match &mut spill {
                    Some(file) => {
                        file.write_all(&chunk).map_err(|e| {
                            ApiError::server_error(format!("upload spill failed: {}", e))
                        })?;
                    }
                    None if buffer.len() + chunk.len() > max_in_memory => {
                        let mut file = NamedTempFile::new().map_err(|e| {
                            ApiError::server_error(format!("upload spill failed: {}", e))
                        })?;
                        file.write_all(&buffer).and_then(|_| file.write_all(&chunk)).map_err(
                            |e| ApiError::server_error(format!("upload spill failed: {}", e)),
                        )?;
                        buffer = Vec::new();
                        spill = Some(file);
                    }
                    None => buffer.extend_from_slice(&chunk),
                }
            }

            let body = match spill {
                Some(file) => {
                    let path = file.path().to_path_buf();
                    ctx.register_temp_file(file);
                    UploadBody::Spilled(path)
                }
                None => UploadBody::Memory(buffer),
            };
            ctx.uploads.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                body,
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|_| ApiError::bad_request("malformed multipart body"))?;
            form.insert(name, text);
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps(
        pairs: &[(&str, &str)],
    ) -> (
        HashMap<String, String>,
        HashMap<String, String>,
        HashMap<String, String>,
    ) {
        let form = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (HashMap::new(), HashMap::new(), form)
    }

    #[test]
    fn required_field_missing_names_the_field() {
        let schema = ParamSchema::new(vec![Field::form("title").required()]);
        let (url, query, form) = maps(&[]);
        let err = schema.apply(&url, &query, &form).unwrap_err();
        assert_eq!(err.message(), "title is required");
    }

    #[test]
    fn trim_runs_before_required() {
        let schema = ParamSchema::new(vec![Field::form("title").trim().required()]);
        let (url, query, form) = maps(&[("title", "   ")]);
        let err = schema.apply(&url, &query, &form).unwrap_err();
        assert_eq!(err.message(), "title is required");
    }

    #[test]
    fn untrimmed_whitespace_passes_required() {
        let schema = ParamSchema::new(vec![Field::form("title").required()]);
        let (url, query, form) = maps(&[("title", "   ")]);
        let params = schema.apply(&url, &query, &form).unwrap();
        assert_eq!(params.text("title"), "   ");
    }

    #[test]
    fn validation_is_fail_fast_in_declaration_order() {
        let schema = ParamSchema::new(vec![
            Field::form("first").required(),
            Field::form("second").required(),
        ]);
        let (url, query, form) = maps(&[]);
        let err = schema.apply(&url, &query, &form).unwrap_err();
        assert_eq!(err.message(), "first is required");
    }

    #[test]
    fn uuid_format_is_enforced() {
        let schema = ParamSchema::new(vec![Field::url("id").uuid().required()]);
        let url: HashMap<String, String> =
            [("id".to_string(), "not-a-uuid".to_string())].into_iter().collect();
        let err = schema
            .apply(&url, &HashMap::new(), &HashMap::new())
            .unwrap_err();
        assert_eq!(err.message(), "id must be a valid uuid");

        let id = Uuid::new_v4();
        let url: HashMap<String, String> =
            [("id".to_string(), id.to_string())].into_iter().collect();
        let params = schema.apply(&url, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(params.uuid("id"), Some(id));
    }

    #[test]
    fn bool_format_accepts_common_spellings() {
        let schema = ParamSchema::new(vec![Field::form("published").boolean()]);
        for (raw, expected) in [("true", true), ("1", true), ("False", false), ("0", false)] {
            let (url, query, form) = maps(&[("published", raw)]);
            let params = schema.apply(&url, &query, &form).unwrap();
            assert_eq!(params.flag("published"), Some(expected), "raw={}", raw);
        }

        let (url, query, form) = maps(&[("published", "yes")]);
        let err = schema.apply(&url, &query, &form).unwrap_err();
        assert_eq!(err.message(), "published must be a boolean");
    }

    #[test]
    fn required_bool_rejects_the_zero_value() {
        let schema = ParamSchema::new(vec![Field::form("confirm").boolean().required()]);

        let (url, query, form) = maps(&[("confirm", "false")]);
        let err = schema.apply(&url, &query, &form).unwrap_err();
        assert_eq!(err.message(), "confirm is required");

        let (url, query, form) = maps(&[("confirm", "true")]);
        let params = schema.apply(&url, &query, &form).unwrap();
        assert_eq!(params.flag("confirm"), Some(true));
    }

    #[test]
    fn required_uuid_rejects_the_nil_uuid() {
        let schema = ParamSchema::new(vec![Field::url("id").uuid().required()]);
        let url: HashMap<String, String> =
            [("id".to_string(), Uuid::nil().to_string())].into_iter().collect();
        let err = schema
            .apply(&url, &HashMap::new(), &HashMap::new())
            .unwrap_err();
        assert_eq!(err.message(), "id is required");
    }

    #[test]
    fn renamed_field_reads_source_name_but_stores_declared_name() {
        let schema = ParamSchema::new(vec![Field::form("page").named("p").required()]);
        let (url, query, form) = maps(&[("p", "5")]);
        let params = schema.apply(&url, &query, &form).unwrap();
        assert_eq!(params.text("page"), "5");
    }

    #[test]
    fn optional_absent_fields_are_skipped() {
        let schema = ParamSchema::new(vec![Field::query("published").boolean()]);
        let params = schema
            .apply(&HashMap::new(), &HashMap::new(), &HashMap::new())
            .unwrap();
        assert_eq!(params.flag("published"), None);
    }

    #[test]
    fn json_body_flattens_scalars_only() {
        let form =
            parse_json_body(br#"{"title":"Hi","published":true,"n":3,"tags":["a"]}"#).unwrap();
        assert_eq!(form.get("title").map(String::as_str), Some("Hi"));
        assert_eq!(form.get("published").map(String::as_str), Some("true"));
        assert_eq!(form.get("n").map(String::as_str), Some("3"));
        assert!(!form.contains_key("tags"));
    }

    #[test]
    fn json_body_must_be_an_object() {
        assert!(parse_json_body(b"[1,2,3]").is_err());
        assert!(parse_json_body(b"not json").is_err());
        assert!(parse_json_body(b"").unwrap().is_empty());
    }
}
