//! Extension merge handlers.

use launcher_model::{Extension, ExtensionKind, ExtensionPayload};
use serde_json::Value;

/// Combines two same-named extensions during merge.
///
/// Handlers are consulted in chain order and the first one whose [`claims`]
/// returns true wins. The built-in handlers sit at the end of the chain and
/// claim purely by payload kind, so every extension finds a handler.
///
/// [`claims`]: ExtensionMergeHandler::claims
pub trait ExtensionMergeHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn claims(&self, extension: &Extension) -> bool;

    /// Produces the merged extension. `base` is the accumulated state,
    /// `incoming` the later declaration.
    fn combine(&self, base: &Extension, incoming: &Extension) -> Extension;
}

pub(crate) fn default_merge_handlers() -> Vec<Box<dyn ExtensionMergeHandler>> {
    vec![
        Box::new(ArtifactsUnionHandler),
        Box::new(JsonMergeHandler),
        Box::new(TextConcatHandler),
    ]
}

/// The required flag survives merging: one required declaration makes the
/// merged extension required.
fn with_carried_flags(base: &Extension, incoming: &Extension, payload: ExtensionPayload) -> Extension {
    Extension {
        name: base.name.clone(),
        required: base.required || incoming.required,
        payload,
    }
}

/// Unions artifact lists, keeping base order and dropping ids the base
/// already carries.
pub struct ArtifactsUnionHandler;

impl ExtensionMergeHandler for ArtifactsUnionHandler {
    fn name(&self) -> &'static str {
        "artifacts-union"
    }

    fn claims(&self, extension: &Extension) -> bool {
        extension.kind() == ExtensionKind::Artifacts
    }

    fn combine(&self, base: &Extension, incoming: &Extension) -> Extension {
        let payload = match (&base.payload, &incoming.payload) {
            (ExtensionPayload::Artifacts(first), ExtensionPayload::Artifacts(second)) => {
                let mut union = first.clone();
                for id in second {
                    if !union.contains(id) {
                        union.push(id.clone());
                    }
                }
                ExtensionPayload::Artifacts(union)
            }
            // Kind changed between declarations: the later payload stands.
            _ => incoming.payload.clone(),
        };
        with_carried_flags(base, incoming, payload)
    }
}

/// Deep-merges JSON payloads: objects merge per key, arrays concatenate,
/// scalars take the incoming value.
pub struct JsonMergeHandler;

impl ExtensionMergeHandler for JsonMergeHandler {
    fn name(&self) -> &'static str {
        "json-merge"
    }

    fn claims(&self, extension: &Extension) -> bool {
        extension.kind() == ExtensionKind::Json
    }

    fn combine(&self, base: &Extension, incoming: &Extension) -> Extension {
        let payload = match (&base.payload, &incoming.payload) {
            (ExtensionPayload::Json(first), ExtensionPayload::Json(second)) => {
                ExtensionPayload::Json(deep_merge(first, second))
            }
            _ => incoming.payload.clone(),
        };
        with_carried_flags(base, incoming, payload)
    }
}

fn deep_merge(base: &Value, incoming: &Value) -> Value {
    match (base, incoming) {
        (Value::Object(first), Value::Object(second)) => {
            let mut out = first.clone();
            for (key, value) in second {
                let merged = match out.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(first), Value::Array(second)) => {
            let mut out = first.clone();
            out.extend(second.iter().cloned());
            Value::Array(out)
        }
        (_, other) => other.clone(),
    }
}

/// Concatenates text payloads with a newline between declarations.
pub struct TextConcatHandler;

impl ExtensionMergeHandler for TextConcatHandler {
    fn name(&self) -> &'static str {
        "text-concat"
    }

    fn claims(&self, extension: &Extension) -> bool {
        extension.kind() == ExtensionKind::Text
    }

    fn combine(&self, base: &Extension, incoming: &Extension) -> Extension {
        let payload = match (&base.payload, &incoming.payload) {
            (ExtensionPayload::Text(first), ExtensionPayload::Text(second)) => {
                ExtensionPayload::Text(format!("{first}\n{second}"))
            }
            _ => incoming.payload.clone(),
        };
        with_carried_flags(base, incoming, payload)
    }
}
