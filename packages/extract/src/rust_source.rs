//! Declaration extraction over Rust source, standing in for the original
//! tool's `go/packages` type-aware loader (§4.3.3/§4.3.4). This is a
//! Rust-native rewrite: it indexes Rust repositories via `syn` rather than Go
//! ones via `go/packages`/`gopls`.
//!
//! Kind mapping (spec §3's {func, method, type, const, var, symbol}):
//! a free `fn` is `func`; an `fn` inside an `impl` block is `method` with its
//! `recv` set to the impl's self type; `struct`/`enum`/`union` declarations
//! are `type`; `const` items are `const`; `static` items are `var`.

use proc_macro2::LineColumn;
use quote::ToTokens;
use syn::spanned::Spanned;
use syn::{Item, ImplItem, Visibility};

use crate::common::{normalize_body, sha256_hex};
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct Decl {
    pub pkg: String,
    pub name: String,
    pub kind: String,
    pub recv: Option<String>,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub body_text: String,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub exported: bool,
}

impl Decl {
    pub fn symbol_hash(&self) -> String {
        sha256_hex(&format!(
            "{}|{}|{}|{}|{}",
            self.pkg,
            self.name,
            self.kind,
            self.recv.as_deref().unwrap_or(""),
            self.signature.as_deref().unwrap_or("")
        ))
    }

    pub fn normalized_body(&self) -> String {
        normalize_body(&self.body_text)
    }
}

fn line_col_to_offset(source: &str, lc: LineColumn) -> usize {
    let mut offset = 0usize;
    for (i, line) in source.split('\n').enumerate() {
        if i + 1 == lc.line {
            return offset + lc.column.min(line.len());
        }
        offset += line.len() + 1;
    }
    source.len()
}

fn span_text(source: &str, span: proc_macro2::Span) -> (&str, LineColumn, LineColumn) {
    let start = span.start();
    let end = span.end();
    let start_off = line_col_to_offset(source, start);
    let end_off = line_col_to_offset(source, end).max(start_off);
    (&source[start_off..end_off], start, end)
}

fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let syn::Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) = &nv.value
                {
                    lines.push(s.value().trim().to_string());
                }
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn is_exported(vis: &Visibility) -> bool {
    matches!(vis, Visibility::Public(_))
}

fn signature_of(tokens: impl ToTokens) -> String {
    tokens.to_token_stream().to_string()
}

/// Parses `source` (the content of one Rust file) into top-level
/// declarations. `pkg` identifies the owning module (typically the file's
/// repo-relative path without extension, `/` replaced by `::`).
pub fn parse_file_declarations(pkg: &str, source: &str) -> Result<Vec<Decl>> {
    let file = syn::parse_file(source).map_err(|e| Error::parse(format!("syn parse error: {}", e)))?;
    let mut decls = Vec::new();
    for item in &file.items {
        collect_item(pkg, source, item, &mut decls);
    }
    Ok(decls)
}

fn collect_item(pkg: &str, source: &str, item: &Item, out: &mut Vec<Decl>) {
    match item {
        Item::Fn(f) => {
            let (body, start, end) = span_text(source, f.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: f.sig.ident.to_string(),
                kind: "func".to_string(),
                recv: None,
                signature: Some(signature_of(&f.sig)),
                doc: doc_comment(&f.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&f.vis),
            });
        }
        Item::Struct(s) => {
            let (body, start, end) = span_text(source, s.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: s.ident.to_string(),
                kind: "type".to_string(),
                recv: None,
                signature: Some(format!("struct {}", s.ident)),
                doc: doc_comment(&s.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&s.vis),
            });
        }
        Item::Enum(e) => {
            let (body, start, end) = span_text(source, e.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: e.ident.to_string(),
                kind: "type".to_string(),
                recv: None,
                signature: Some(format!("enum {}", e.ident)),
                doc: doc_comment(&e.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&e.vis),
            });
        }
        Item::Union(u) => {
            let (body, start, end) = span_text(source, u.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: u.ident.to_string(),
                kind: "type".to_string(),
                recv: None,
                signature: Some(format!("union {}", u.ident)),
                doc: doc_comment(&u.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&u.vis),
            });
        }
        Item::Const(c) => {
            let (body, start, end) = span_text(source, c.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: c.ident.to_string(),
                kind: "const".to_string(),
                recv: None,
                signature: Some(signature_of_type(&c.ty)),
                doc: doc_comment(&c.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&c.vis),
            });
        }
        Item::Static(s) => {
            let (body, start, end) = span_text(source, s.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: s.ident.to_string(),
                kind: "var".to_string(),
                recv: None,
                signature: Some(signature_of_type(&s.ty)),
                doc: doc_comment(&s.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&s.vis),
            });
        }
        Item::Trait(t) => {
            let (body, start, end) = span_text(source, t.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: t.ident.to_string(),
                kind: "symbol".to_string(),
                recv: None,
                signature: Some(format!("trait {}", t.ident)),
                doc: doc_comment(&t.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&t.vis),
            });
        }
        Item::Type(ty) => {
            let (body, start, end) = span_text(source, ty.span());
            out.push(Decl {
                pkg: pkg.to_string(),
                name: ty.ident.to_string(),
                kind: "type".to_string(),
                recv: None,
                signature: Some(format!("type {} = {}", ty.ident, signature_of_type(&ty.ty))),
                doc: doc_comment(&ty.attrs),
                body_text: body.to_string(),
                start_line: start.line as i64,
                start_col: start.column as i64 + 1,
                end_line: end.line as i64,
                end_col: end.column as i64 + 1,
                exported: is_exported(&ty.vis),
            });
        }
        Item::Impl(imp) => {
            let recv = signature_of_type(&imp.self_ty);
            for impl_item in &imp.items {
                if let ImplItem::Fn(m) = impl_item {
                    let (body, start, end) = span_text(source, m.span());
                    out.push(Decl {
                        pkg: pkg.to_string(),
                        name: m.sig.ident.to_string(),
                        kind: "method".to_string(),
                        recv: Some(recv.clone()),
                        signature: Some(signature_of(&m.sig)),
                        doc: doc_comment(&m.attrs),
                        body_text: body.to_string(),
                        start_line: start.line as i64,
                        start_col: start.column as i64 + 1,
                        end_line: end.line as i64,
                        end_col: end.column as i64 + 1,
                        exported: is_exported(&m.vis),
                    });
                }
            }
        }
        Item::Mod(m) => {
            if let Some((_, items)) = &m.content {
                let nested_pkg = format!("{}::{}", pkg, m.ident);
                for item in items {
                    collect_item(&nested_pkg, source, item, out);
                }
            }
        }
        _ => {}
    }
}

fn signature_of_type(ty: &syn::Type) -> String {
    ty.to_token_stream().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_struct_method_func_const() {
        let source = r#"
pub struct Person { pub name: String }

impl Person {
    pub fn greet(&self) -> String { format!("hi {}", self.name) }
}

pub fn add(a: i32, b: i32) -> i32 { a + b }

pub const ANSWER: i32 = 42;
"#;
        let decls = parse_file_declarations("crate::person", source).unwrap();
        let kinds: Vec<(&str, &str)> = decls.iter().map(|d| (d.name.as_str(), d.kind.as_str())).collect();
        assert!(kinds.contains(&("Person", "type")));
        assert!(kinds.contains(&("greet", "method")));
        assert!(kinds.contains(&("add", "func")));
        assert!(kinds.contains(&("ANSWER", "const")));

        let add_decl = decls.iter().find(|d| d.name == "add").unwrap();
        assert!(add_decl.body_text.contains("fn add"));
        let person_decl = decls.iter().find(|d| d.name == "Person").unwrap();
        assert!(person_decl.body_text.contains("struct Person"));
    }

    #[test]
    fn symbol_hash_is_stable_for_identical_decls() {
        let source = "pub fn add(a: i32, b: i32) -> i32 { a + b }";
        let d1 = parse_file_declarations("pkg", source).unwrap();
        let d2 = parse_file_declarations("pkg", source).unwrap();
        assert_eq!(d1[0].symbol_hash(), d2[0].symbol_hash());
    }
}
