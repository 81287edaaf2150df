//! Turning bound views and layouts into response bodies.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::controller::{Layout, View};

#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        Self(e.to_string())
    }
}

/// What the dispatcher asks to be rendered.
#[derive(Debug, Clone, Copy)]
pub enum RenderTarget<'a> {
    /// A view on its own.
    View(&'a View),
    /// A layout, wrapping the action's view or, after a script, whatever the
    /// script already wrote.
    Layout {
        layout: &'a Layout,
        view: Option<&'a View>,
    },
}

pub trait Renderer: Send + Sync {
    /// Render `target`, appending to `out`. `out` may already hold script output.
    fn render(&self, target: RenderTarget<'_>, out: &mut String) -> Result<(), RenderError>;

    /// Media type of the rendered output.
    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }
}

/// Renders views as JSON documents.
///
/// ```text
/// {"view":"blog/show","data":{...}}
/// {"layout":"main","view":"blog/show","data":{...}}
/// {"layout":"main","content":"<script output>"}
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    fn view_fields(view: &View, doc: &mut Map<String, Value>) {
        doc.insert(
            "view".into(),
            Value::String(format!("{}/{}", view.controller(), view.name())),
        );
        doc.insert(
            "data".into(),
            Value::Object(view.data().iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        );
    }
}

impl Renderer for JsonRenderer {
    fn render(&self, target: RenderTarget<'_>, out: &mut String) -> Result<(), RenderError> {
        let mut doc = Map::new();
        match target {
            RenderTarget::View(view) => Self::view_fields(view, &mut doc),
            RenderTarget::Layout { layout, view } => {
                doc.insert("layout".into(), json!(layout.name()));
                match view {
                    Some(view) => Self::view_fields(view, &mut doc),
                    None => {
                        doc.insert("content".into(), Value::String(std::mem::take(out)));
                    }
                }
            }
        }
        out.push_str(&serde_json::to_string(&Value::Object(doc))?);
        Ok(())
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> View {
        let mut view = View::default();
        view.bind("blog", "show");
        view.assign("id", 5);
        view
    }

    #[test]
    fn test_view_document() {
        let mut out = String::new();
        JsonRenderer.render(RenderTarget::View(&view()), &mut out).unwrap();
        let doc: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc, json!({ "view": "blog/show", "data": { "id": 5 } }));
    }

    #[test]
    fn test_layout_wraps_script_output() {
        let mut out = String::from("hello");
        let layout = Layout::new("main");
        JsonRenderer
            .render(RenderTarget::Layout { layout: &layout, view: None }, &mut out)
            .unwrap();
        let doc: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc, json!({ "layout": "main", "content": "hello" }));
    }
}
