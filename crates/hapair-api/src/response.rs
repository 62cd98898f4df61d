// Response envelope decoding
//
// Every reply is `<response status="success|error" code="..">` wrapping a
// `<result>` and/or a `<msg>`. The envelope is checked once here; typed
// models re-read the retained body with the `find_*` helpers.

use roxmltree::{Document, Node};

use crate::error::Error;

/// Error code the device returns when an addressed object is absent.
const CODE_OBJECT_NOT_PRESENT: &str = "7";

/// A decoded response envelope.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    body: String,
    status: ResponseStatus,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ApiResponse {
    /// Decode an envelope from a response body.
    pub fn parse(body: String) -> Result<Self, Error> {
        let (status, code, message) = {
            let doc = Document::parse(&body).map_err(|e| Error::Malformed {
                message: format!("invalid XML: {e}"),
                body: preview(&body),
            })?;
            let root = doc.root_element();
            if !root.has_tag_name("response") {
                return Err(Error::Malformed {
                    message: format!("unexpected root element <{}>", root.tag_name().name()),
                    body: preview(&body),
                });
            }
            let status = match root.attribute("status") {
                Some("success") => ResponseStatus::Success,
                Some("error") => ResponseStatus::Error,
                other => {
                    return Err(Error::Malformed {
                        message: format!("unexpected response status {other:?}"),
                        body: preview(&body),
                    });
                }
            };
            let code = root.attribute("code").map(str::to_owned);
            let message = find_node(root, "msg").map(message_text);
            (status, code, message)
        };

        Ok(Self {
            body,
            status,
            code,
            message,
        })
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// The envelope's `code` attribute, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The `<msg>` text, with `<line>` children joined by `"; "`.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The raw response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Re-parse the retained body for structured reads.
    pub fn document(&self) -> Result<Document<'_>, Error> {
        Document::parse(&self.body).map_err(|e| Error::Malformed {
            message: format!("invalid XML: {e}"),
            body: preview(&self.body),
        })
    }

    /// Text at a `find_node` path under the envelope root.
    pub fn find_text(&self, path: &str) -> Result<Option<String>, Error> {
        let doc = self.document()?;
        Ok(find_text(doc.root_element(), path))
    }

    /// Whether an element exists at a `find_node` path.
    pub fn contains(&self, path: &str) -> Result<bool, Error> {
        let doc = self.document()?;
        Ok(find_node(doc.root_element(), path).is_some())
    }

    /// Whether this is an error envelope for a missing object.
    pub(crate) fn is_object_missing(&self) -> bool {
        self.status == ResponseStatus::Error && self.code() == Some(CODE_OBJECT_NOT_PRESENT)
    }

    /// The device-reported error text, or a fallback naming the code.
    pub(crate) fn error_text(&self) -> String {
        match (&self.message, &self.code) {
            (Some(msg), _) if !msg.is_empty() => msg.clone(),
            (_, Some(code)) => format!("device returned error code {code}"),
            _ => "device returned an error without a message".into(),
        }
    }

    /// Convert an error envelope into the caller's error flavour.
    pub(crate) fn into_result(
        self,
        on_error: impl FnOnce(String, Option<String>) -> Error,
    ) -> Result<Self, Error> {
        match self.status {
            ResponseStatus::Success => Ok(self),
            ResponseStatus::Error => {
                let text = self.error_text();
                Err(on_error(text, self.code))
            }
        }
    }
}

// ── Path helpers ─────────────────────────────────────────────────────

/// Find a node by a slash-separated path: the first segment matches any
/// descendant of `node`, the remaining segments match direct children.
///
/// `find_node(root, "group/local-info/state")` behaves like `.//group/local-info/state`.
pub fn find_node<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Option<Node<'a, 'input>> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next()?;
    let rest: Vec<&str> = segments.collect();

    node.descendants()
        .filter(|n| n.is_element() && n.has_tag_name(first))
        .find_map(|start| {
            rest.iter().try_fold(start, |current, name| {
                current
                    .children()
                    .find(|c| c.is_element() && c.has_tag_name(*name))
            })
        })
}

/// Trimmed text content at a `find_node` path. Empty text is `None`.
pub fn find_text(node: Node<'_, '_>, path: &str) -> Option<String> {
    let found = find_node(node, path)?;
    let text: String = found
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Flatten a `<msg>` element. Multi-line messages come as `<line>` children.
fn message_text(msg: Node<'_, '_>) -> String {
    let lines: Vec<String> = msg
        .children()
        .filter(|c| c.is_element() && c.has_tag_name("line"))
        .filter_map(|line| {
            let text: String = line
                .descendants()
                .filter(Node::is_text)
                .filter_map(|n| n.text())
                .collect::<Vec<_>>()
                .join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then_some(text)
        })
        .collect();

    if lines.is_empty() {
        msg.descendants()
            .filter(Node::is_text)
            .filter_map(|n| n.text())
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        lines.join("; ")
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
