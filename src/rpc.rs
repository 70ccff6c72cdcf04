//! Wire codec for the XML-RPC dialect spoken by unoserver.
//!
//! The dialect is tiny but irregular: requests are `<methodCall>` documents
//! whose parameters are only ever strings or the reserved `<nil/>`
//! placeholder, and responses come in exactly two shapes — an empty success
//! (`<params><param><value><nil/>`) or a fault struct carrying a numeric
//! code and a free-text description. Requests are built by hand; responses
//! are decoded with [`roxmltree`] and matched structurally. Anything that
//! parses but fits neither shape is a decode failure, never coerced into a
//! success.

use crate::error::ErrorReason;
use serde::Serialize;
use thiserror::Error;

// ── Request encoding ─────────────────────────────────────────────────────

/// A positional call parameter. The dialect only carries strings and the
/// reserved nil placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    Str(&'a str),
    Nil,
}

/// Replace the XML-significant characters in a text value.
fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Encode a `<methodCall>` document with the given positional parameters.
pub fn encode_method_call(method: &str, params: &[Param<'_>]) -> String {
    let mut xml = String::with_capacity(256);
    xml.push_str("<?xml version=\"1.0\"?>\n<methodCall>\n");
    xml.push_str(&format!(
        "  <methodName>{}</methodName>\n",
        escape_xml(method)
    ));
    xml.push_str("  <params>\n");
    for param in params {
        match param {
            Param::Str(s) => xml.push_str(&format!(
                "    <param><value><string>{}</string></value></param>\n",
                escape_xml(s)
            )),
            Param::Nil => xml.push_str("    <param><value><nil/></value></param>\n"),
        }
    }
    xml.push_str("  </params>\n</methodCall>\n");
    xml
}

/// `convert(input, nil, output)` — the middle parameter is reserved by the
/// protocol and always nil.
pub fn convert_call(input: &str, output: &str) -> String {
    encode_method_call(
        "convert",
        &[Param::Str(input), Param::Nil, Param::Str(output)],
    )
}

/// `compare(input, nil, output)` — same three-parameter layout as `convert`.
pub fn compare_call(input: &str, output: &str) -> String {
    encode_method_call(
        "compare",
        &[Param::Str(input), Param::Nil, Param::Str(output)],
    )
}

/// Minimal readiness probe. Any HTTP-OK answer means the server is up;
/// the response body is never inspected.
pub fn list_methods_call() -> String {
    encode_method_call("system.listMethods", &[])
}

// ── Response decoding ────────────────────────────────────────────────────

/// A decoded `<methodResponse>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcResponse {
    /// Success with no payload: `methodResponse.params.param.value.nil`.
    Empty,
    /// Structured error: `methodResponse.fault.value.struct`.
    Fault(Fault),
}

/// A structured protocol error: numeric code plus free-text description.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("fault {fault_code}: {fault_string}")]
pub struct Fault {
    pub fault_code: i32,
    pub fault_string: String,
}

impl Fault {
    fn from_members(members: &MemberStruct) -> Result<Self, DecodeError> {
        Ok(Self {
            fault_code: members.get_int("faultCode")?,
            fault_string: members.get_str("faultString")?.to_owned(),
        })
    }

    /// The canonical reason for this fault. See [`fault_reason`].
    pub fn reason(&self) -> ErrorReason {
        fault_reason(self.fault_code, &self.fault_string)
    }

    /// Render this fault as a complete `<methodResponse>` document — the
    /// inverse of decoding. Runtime code only ever decodes faults; this
    /// exists for constructing fixtures and keeping the codec symmetric.
    pub fn to_response_xml(&self) -> String {
        let mut members = MemberStruct::default();
        members.push("faultCode", Scalar::Int(self.fault_code));
        members.push("faultString", Scalar::Str(self.fault_string.clone()));
        format!(
            "<?xml version=\"1.0\"?>\n<methodResponse>\n  <fault>\n    <value>\n      \
             <struct>\n{}      </struct>\n    </value>\n  </fault>\n</methodResponse>\n",
            members.to_xml()
        )
    }
}

/// Why a response body failed to decode.
///
/// Malformed XML and "well-formed but not a shape we know" are distinct
/// failures: the first points at transport corruption, the second at a
/// server speaking a different dialect. Both surface to callers as
/// [`ErrorReason::Unknown`], never as a successful decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body is not well-formed XML.
    #[error("malformed XML: {0}")]
    Parse(#[from] roxmltree::Error),
    /// Well-formed XML that matches neither known response shape.
    #[error("unrecognised response shape: {0}")]
    UnexpectedShape(String),
}

fn shape(msg: impl Into<String>) -> DecodeError {
    DecodeError::UnexpectedShape(msg.into())
}

fn element_child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// Decode a raw response body into [`RpcResponse`].
pub fn decode_response(body: &str) -> Result<RpcResponse, DecodeError> {
    let doc = roxmltree::Document::parse(body)?;
    let root = doc.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(shape(format!(
            "expected <methodResponse>, found <{}>",
            root.tag_name().name()
        )));
    }

    if let Some(params) = element_child(root, "params") {
        let nil = element_child(params, "param")
            .and_then(|p| element_child(p, "value"))
            .and_then(|v| element_child(v, "nil"));
        return match nil {
            Some(_) => Ok(RpcResponse::Empty),
            None => Err(shape(
                "response <params> does not carry the expected <nil/> value",
            )),
        };
    }

    if let Some(fault) = element_child(root, "fault") {
        let strukt = element_child(fault, "value")
            .and_then(|v| element_child(v, "struct"))
            .ok_or_else(|| shape("<fault> does not contain a <struct> value"))?;
        let members = MemberStruct::decode(strukt)?;
        return Ok(RpcResponse::Fault(Fault::from_members(&members)?));
    }

    Err(shape("<methodResponse> carries neither <params> nor <fault>"))
}

// ── Struct-member codec ──────────────────────────────────────────────────

/// Scalar payload of a struct member. The dialect's structs only ever carry
/// ints and strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Int(i32),
    Str(String),
}

/// A decoded `<struct>`: named scalar members in document order.
///
/// XML-RPC structs arrive as a list of
/// `<member><name>…</name><value><int|string>…</value></member>` pairs.
/// Decoding reconstructs the list once; the typed accessors then validate
/// presence and type per field, so a `faultCode` sent as `<string>` is a
/// shape error naming the offending field rather than a silent mis-read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberStruct(Vec<(String, Scalar)>);

impl MemberStruct {
    fn decode(struct_node: roxmltree::Node<'_, '_>) -> Result<Self, DecodeError> {
        let mut members = Vec::new();
        for member in struct_node
            .children()
            .filter(|c| c.is_element() && c.tag_name().name() == "member")
        {
            let name = element_child(member, "name")
                .and_then(|n| n.text())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| shape("struct <member> without a <name>"))?;
            let value = element_child(member, "value")
                .ok_or_else(|| shape(format!("member '{name}' has no <value>")))?;
            members.push((name.to_owned(), Self::decode_scalar(name, value)?));
        }
        Ok(Self(members))
    }

    fn decode_scalar(name: &str, value: roxmltree::Node<'_, '_>) -> Result<Scalar, DecodeError> {
        let inner = value
            .children()
            .find(|c| c.is_element())
            .ok_or_else(|| shape(format!("member '{name}' value has no typed payload")))?;
        match inner.tag_name().name() {
            "int" => {
                let text = inner.text().unwrap_or("").trim();
                text.parse::<i32>().map(Scalar::Int).map_err(|_| {
                    shape(format!("member '{name}' <int> is not an integer: '{text}'"))
                })
            }
            "string" => Ok(Scalar::Str(inner.text().unwrap_or("").to_owned())),
            other => Err(shape(format!(
                "member '{name}' has unsupported value type <{other}>"
            ))),
        }
    }

    fn get(&self, name: &str) -> Option<&Scalar> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Typed accessor: fails when the member is absent or not an `<int>`.
    pub fn get_int(&self, name: &str) -> Result<i32, DecodeError> {
        match self.get(name) {
            Some(Scalar::Int(v)) => Ok(*v),
            Some(Scalar::Str(_)) => Err(shape(format!("member '{name}' must be an <int>"))),
            None => Err(shape(format!("member '{name}' is missing"))),
        }
    }

    /// Typed accessor: fails when the member is absent or not a `<string>`.
    pub fn get_str(&self, name: &str) -> Result<&str, DecodeError> {
        match self.get(name) {
            Some(Scalar::Str(v)) => Ok(v),
            Some(Scalar::Int(_)) => Err(shape(format!("member '{name}' must be a <string>"))),
            None => Err(shape(format!("member '{name}' is missing"))),
        }
    }

    /// Append a named member (encode direction).
    pub fn push(&mut self, name: impl Into<String>, value: Scalar) {
        self.0.push((name.into(), value));
    }

    /// Render the members back to `<member>` XML — the encode direction of
    /// the codec, used for fixture construction.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        for (name, value) in &self.0 {
            let rendered = match value {
                Scalar::Int(v) => format!("<int>{v}</int>"),
                Scalar::Str(v) => format!("<string>{}</string>", escape_xml(v)),
            };
            xml.push_str(&format!(
                "        <member><name>{}</name><value>{}</value></member>\n",
                escape_xml(name),
                rendered
            ));
        }
        xml
    }
}

// ── Fault classification ─────────────────────────────────────────────────

/// Map a decoded fault onto the shared error taxonomy.
///
/// Ordered substring match against the fault text; the first hit wins. Only
/// code-1 faults carry classifiable engine messages — any other code
/// degrades to `Unknown`. Substring matching is brittle against engine
/// version and locale changes, but the fault text is the only signal the
/// server exposes; the needles and their order mirror what unoserver
/// actually emits.
pub fn fault_reason(fault_code: i32, fault_string: &str) -> ErrorReason {
    if fault_code != 1 {
        return ErrorReason::Unknown;
    }
    const TABLE: &[(&str, ErrorReason)] = &[
        ("does not exist", ErrorReason::InputFileNotFound),
        ("Unknown export file type", ErrorReason::BadOutputExtension),
        ("is not supported", ErrorReason::MethodNotFound),
        ("PermissionError", ErrorReason::PermissionDenied),
        ("Permission denied", ErrorReason::PermissionDenied),
    ];
    TABLE
        .iter()
        .find(|(needle, _)| fault_string.contains(needle))
        .map(|(_, reason)| *reason)
        .unwrap_or(ErrorReason::Unknown)
}
