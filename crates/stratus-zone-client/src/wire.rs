//! Minimal XML-RPC wire codec.
//!
//! The cluster core speaks classic XML-RPC with one extension: 64-bit
//! integers travel as `<i8>`. Payload strings inside a reply are themselves
//! markup documents (resource and pool dumps), so this module also carries a
//! generic element-tree to JSON translation. Everything above this module
//! works on [`RpcValue`] and `serde_json::Value`; raw markup never escapes.

use serde_json::{Map, Value};
use thiserror::Error;

/// Nesting guard for hostile or corrupted documents.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Int(i64),
    Bool(bool),
    Double(f64),
    Text(String),
    Array(Vec<RpcValue>),
    Struct(Vec<(String, RpcValue)>),
}

/// A parsed `<methodResponse>`.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Parameters(Vec<RpcValue>),
    Fault { code: i64, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed markup at byte {at}: {reason}")]
    Malformed { at: usize, reason: &'static str },
    #[error("unexpected document shape: {0}")]
    UnexpectedShape(&'static str),
}

/// Encodes a `<methodCall>` document with positional parameters.
pub fn encode_call(method: &str, args: &[RpcValue]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str("<?xml version=\"1.0\"?>");
    out.push_str("<methodCall><methodName>");
    push_escaped(&mut out, method);
    out.push_str("</methodName><params>");
    for arg in args {
        out.push_str("<param>");
        encode_value(&mut out, arg);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn encode_value(out: &mut String, value: &RpcValue) {
    out.push_str("<value>");
    match value {
        RpcValue::Int(n) => {
            // i4 range stays <int>; wider values use the de-facto <i8> extension.
            if i32::try_from(*n).is_ok() {
                out.push_str("<int>");
                out.push_str(&n.to_string());
                out.push_str("</int>");
            } else {
                out.push_str("<i8>");
                out.push_str(&n.to_string());
                out.push_str("</i8>");
            }
        }
        RpcValue::Bool(flag) => {
            out.push_str("<boolean>");
            out.push(if *flag { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        RpcValue::Double(d) => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        RpcValue::Text(text) => {
            out.push_str("<string>");
            push_escaped(out, text);
            out.push_str("</string>");
        }
        RpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(out, item);
            }
            out.push_str("</data></array>");
        }
        RpcValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                push_escaped(out, name);
                out.push_str("</name>");
                encode_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Parses a `<methodResponse>` document into parameters or a fault.
pub fn parse_response(body: &str) -> Result<RpcReply, WireError> {
    let root = parse_tree(body)?;
    if root.name != "methodResponse" {
        return Err(WireError::UnexpectedShape("not a methodResponse document"));
    }
    if let Some(params) = root.child("params") {
        let mut values = Vec::new();
        for param in params.children_named("param") {
            let value = param
                .child("value")
                .ok_or(WireError::UnexpectedShape("param without value"))?;
            values.push(value_from_node(value)?);
        }
        return Ok(RpcReply::Parameters(values));
    }
    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or(WireError::UnexpectedShape("fault without value"))?;
        let mut code = 0;
        let mut message = String::new();
        if let RpcValue::Struct(members) = value_from_node(value)? {
            for (name, member) in members {
                match (name.as_str(), member) {
                    ("faultCode", RpcValue::Int(n)) => code = n,
                    ("faultString", RpcValue::Text(text)) => message = text,
                    _ => {}
                }
            }
        }
        return Ok(RpcReply::Fault { code, message });
    }
    Err(WireError::UnexpectedShape(
        "methodResponse without params or fault",
    ))
}

fn value_from_node(node: &Node) -> Result<RpcValue, WireError> {
    let Some(typed) = node.children.first() else {
        // Untyped <value>text</value> is an implicit string.
        return Ok(RpcValue::Text(node.text.clone()));
    };
    match typed.name.as_str() {
        "int" | "i4" | "i8" => typed
            .text
            .trim()
            .parse::<i64>()
            .map(RpcValue::Int)
            .map_err(|_| WireError::UnexpectedShape("non-numeric integer value")),
        "boolean" => match typed.text.trim() {
            "1" | "true" => Ok(RpcValue::Bool(true)),
            "0" | "false" => Ok(RpcValue::Bool(false)),
            _ => Err(WireError::UnexpectedShape("non-boolean value")),
        },
        "double" => typed
            .text
            .trim()
            .parse::<f64>()
            .map(RpcValue::Double)
            .map_err(|_| WireError::UnexpectedShape("non-numeric double value")),
        "string" => Ok(RpcValue::Text(typed.text.clone())),
        "array" => {
            let data = typed
                .child("data")
                .ok_or(WireError::UnexpectedShape("array without data"))?;
            let mut items = Vec::new();
            for value in data.children_named("value") {
                items.push(value_from_node(value)?);
            }
            Ok(RpcValue::Array(items))
        }
        "struct" => {
            let mut members = Vec::new();
            for member in typed.children_named("member") {
                let name = member
                    .child("name")
                    .map(|n| n.text.clone())
                    .ok_or(WireError::UnexpectedShape("struct member without name"))?;
                let value = member
                    .child("value")
                    .ok_or(WireError::UnexpectedShape("struct member without value"))?;
                members.push((name, value_from_node(value)?));
            }
            Ok(RpcValue::Struct(members))
        }
        "nil" => Ok(RpcValue::Text(String::new())),
        _ => Err(WireError::UnexpectedShape("unknown value type")),
    }
}

/// Translates a payload markup document (a resource or pool dump) into JSON.
///
/// Elements become objects keyed by child name, repeated children collapse
/// into arrays, leaf text becomes a number, a bool, or a string by shape.
/// Attributes are ignored; the core does not use them.
pub fn markup_to_json(markup: &str) -> Result<Value, WireError> {
    let root = parse_tree(markup)?;
    let mut wrapped = Map::new();
    let name = root.name.clone();
    wrapped.insert(name, node_to_json(&root));
    Ok(Value::Object(wrapped))
}

fn node_to_json(node: &Node) -> Value {
    if node.children.is_empty() {
        return leaf_to_json(&node.text);
    }
    let mut map = Map::new();
    for child in &node.children {
        let rendered = node_to_json(child);
        match map.get_mut(&child.name) {
            None => {
                map.insert(child.name.clone(), rendered);
            }
            Some(Value::Array(items)) => items.push(rendered),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, rendered]);
            }
        }
    }
    Value::Object(map)
}

fn leaf_to_json(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    // Leading zeros mark identifiers, not numbers.
    let zero_padded = trimmed.len() > 1 && (trimmed.starts_with('0') || trimmed.starts_with("-0"));
    if !zero_padded {
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    name: String,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn leaf(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

fn parse_tree(src: &str) -> Result<Node, WireError> {
    let mut tokens = Tokenizer::new(src);
    match tokens.next_token()? {
        Some(Token::Open(name)) => {
            let name = name.to_string();
            parse_element(&mut tokens, name, 0)
        }
        Some(Token::SelfClose(name)) => Ok(Node::leaf(name)),
        Some(Token::Text(_) | Token::CData(_)) => {
            Err(WireError::UnexpectedShape("text before root element"))
        }
        Some(Token::Close(_)) => Err(WireError::UnexpectedShape("close tag before root element")),
        None => Err(WireError::UnexpectedShape("empty document")),
    }
}

fn parse_element(tokens: &mut Tokenizer, name: String, depth: usize) -> Result<Node, WireError> {
    if depth > MAX_DEPTH {
        return Err(WireError::Malformed {
            at: tokens.pos,
            reason: "nesting too deep",
        });
    }
    let mut node = Node {
        name,
        children: Vec::new(),
        text: String::new(),
    };
    loop {
        match tokens.next_token()? {
            Some(Token::Open(child)) => {
                let child = child.to_string();
                node.children.push(parse_element(tokens, child, depth + 1)?);
            }
            Some(Token::SelfClose(child)) => node.children.push(Node::leaf(child)),
            Some(Token::Text(raw)) => node.text.push_str(&decode_entities(raw)),
            Some(Token::CData(raw)) => node.text.push_str(raw),
            Some(Token::Close(close)) => {
                if close == node.name {
                    return Ok(node);
                }
                return Err(WireError::Malformed {
                    at: tokens.pos,
                    reason: "misnested close tag",
                });
            }
            None => {
                return Err(WireError::Malformed {
                    at: tokens.pos,
                    reason: "unterminated element",
                });
            }
        }
    }
}

enum Token<'a> {
    Open(&'a str),
    Close(&'a str),
    SelfClose(&'a str),
    Text(&'a str),
    CData(&'a str),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, WireError> {
        loop {
            if self.pos >= self.src.len() {
                return Ok(None);
            }
            let rest = &self.src[self.pos..];
            if let Some(after) = rest.strip_prefix("<![CDATA[") {
                let Some(end) = after.find("]]>") else {
                    return Err(WireError::Malformed {
                        at: self.pos,
                        reason: "unterminated CDATA section",
                    });
                };
                let start = self.pos + "<![CDATA[".len();
                self.pos = start + end + "]]>".len();
                return Ok(Some(Token::CData(&self.src[start..start + end])));
            }
            if let Some(after) = rest.strip_prefix("<!--") {
                let Some(end) = after.find("-->") else {
                    return Err(WireError::Malformed {
                        at: self.pos,
                        reason: "unterminated comment",
                    });
                };
                self.pos += "<!--".len() + end + "-->".len();
                continue;
            }
            if let Some(after) = rest.strip_prefix("<?") {
                let Some(end) = after.find("?>") else {
                    return Err(WireError::Malformed {
                        at: self.pos,
                        reason: "unterminated processing instruction",
                    });
                };
                self.pos += "<?".len() + end + "?>".len();
                continue;
            }
            if let Some(after) = rest.strip_prefix("<!") {
                let Some(end) = after.find('>') else {
                    return Err(WireError::Malformed {
                        at: self.pos,
                        reason: "unterminated declaration",
                    });
                };
                self.pos += "<!".len() + end + 1;
                continue;
            }
            if rest.starts_with('<') {
                return self.read_tag().map(Some);
            }
            let end = rest.find('<').unwrap_or(rest.len());
            let chunk = &self.src[self.pos..self.pos + end];
            self.pos += end;
            if chunk.trim().is_empty() {
                continue;
            }
            return Ok(Some(Token::Text(chunk)));
        }
    }

    fn read_tag(&mut self) -> Result<Token<'a>, WireError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut i = self.pos + 1;
        let closing = bytes.get(i) == Some(&b'/');
        if closing {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            return Err(WireError::Malformed {
                at: start,
                reason: "empty tag name",
            });
        }
        let name = &self.src[name_start..i];
        let mut self_close = false;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let byte = bytes[i];
            match quote {
                Some(open) => {
                    if byte == open {
                        quote = None;
                    }
                }
                None => match byte {
                    b'"' | b'\'' => quote = Some(byte),
                    b'/' => self_close = bytes.get(i + 1) == Some(&b'>'),
                    b'>' => {
                        self.pos = i + 1;
                        if closing {
                            return Ok(Token::Close(name));
                        }
                        if self_close {
                            return Ok(Token::SelfClose(name));
                        }
                        return Ok(Token::Open(name));
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        Err(WireError::Malformed {
            at: start,
            reason: "unterminated tag",
        })
    }
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.' | b':')
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let Some(end) = rest.find(';') else {
            // Dangling ampersand, keep it literal.
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let decoded = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| {
                        entity
                            .strip_prefix('#')
                            .and_then(|dec| dec.parse::<u32>().ok())
                    })
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        // Unknown entity, keep it literal.
                        out.push('&');
                        out.push_str(entity);
                        out.push(';');
                    }
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}
