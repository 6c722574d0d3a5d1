#![allow(dead_code)]

pub mod fixtures {
    use brrtrouter_args::args::{BuildOptions, EndpointArgsModel};
    use brrtrouter_args::params::FieldSpec;
    use brrtrouter_args::signature::{DeclaredParam, HandlerSignature, SchemaNamespace};
    use serde_json::{json, Value};

    pub fn string() -> Value {
        json!({"type": "string"})
    }

    pub fn integer() -> Value {
        json!({"type": "integer"})
    }

    pub fn string_list() -> Value {
        json!({"type": "array", "items": {"type": "string"}})
    }

    /// `Item { name: str, price?: number }`
    pub fn item_namespace() -> SchemaNamespace {
        SchemaNamespace::new().with(
            "Item",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "price": {"type": "number", "minimum": 0}
                },
                "required": ["name"]
            }),
        )
    }

    /// `update_item(id: int = Path(), q: str = "x", body: Item = Body())` on `/items/{id}`
    pub fn update_item_model() -> EndpointArgsModel {
        let sig = HandlerSignature::new("update_item")
            .namespace(item_namespace())
            .param(DeclaredParam::new("id", integer()).field(FieldSpec::path()))
            .param(DeclaredParam::new("q", string()).literal(json!("x")))
            .param(DeclaredParam::named("body", "Item").field(FieldSpec::body()));
        build(sig, "/items/{id}")
    }

    pub fn build(sig: HandlerSignature, route: &str) -> EndpointArgsModel {
        EndpointArgsModel::build(sig, route, BuildOptions::default()).unwrap()
    }
}

pub mod multipart {
    pub const BOUNDARY: &str = "XBOUNDARYX";

    /// A `(name, filename, content)` part; `filename: None` is a text field.
    pub type PartSpec<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    pub fn body(parts: &[PartSpec<'_>]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, filename, content) in parts {
            out.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(f) => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            name, f
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    out.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                }
            }
            out.extend_from_slice(content);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        out
    }
}
