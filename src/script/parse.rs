//! Line-oriented parser for the reference script format
//!
//! Parsing collects every diagnostic instead of stopping at the first, the
//! way a compiler front end is expected to behave. A source with at least
//! one error never yields an image.

use crate::compiler::{CompileOptions, Diagnostic};
use crate::ident::ModuleId;
use crate::value::Value;

use super::image::{Expr, FnImage, Param, TypeImage, TypeTag, UnitImage, IMAGE_VERSION};

pub(crate) fn parse(
    module: &ModuleId,
    source: &str,
    options: &CompileOptions,
) -> Result<UnitImage, Vec<Diagnostic>> {
    let mut parser = Parser {
        diagnostics: Vec::new(),
        types: Vec::new(),
        namespace: String::new(),
        current: None,
        allow_unsafe: options.allow_unsafe,
    };
    for (index, raw) in source.lines().enumerate() {
        parser.line(index + 1, raw.trim());
    }
    parser.finish(module)
}

struct Parser {
    diagnostics: Vec<Diagnostic>,
    types: Vec<TypeImage>,
    namespace: String,
    current: Option<TypeImage>,
    allow_unsafe: bool,
}

impl Parser {
    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(line, message));
    }

    fn line(&mut self, line: usize, text: &str) {
        if text.is_empty() || text.starts_with('#') {
            return;
        }

        if let Some(rest) = text.strip_prefix("namespace ") {
            if self.current.is_some() {
                self.error(line, "namespace declarations must appear outside type blocks");
                return;
            }
            let name = rest.trim();
            if is_identifier_path(name) {
                self.namespace = name.to_string();
            } else {
                self.error(line, format!("invalid namespace name '{name}'"));
            }
            return;
        }

        if let Some(rest) = text.strip_prefix("type ") {
            self.begin_type(line, rest.trim());
            return;
        }

        if text == "}" {
            match self.current.take() {
                Some(ty) => self.push_type(line, ty),
                None => self.error(line, "unmatched '}'"),
            }
            return;
        }

        if self.current.is_some() {
            self.function_line(line, text);
        } else {
            self.error(line, format!("unexpected input outside a type block: '{text}'"));
        }
    }

    fn begin_type(&mut self, line: usize, header: &str) {
        if self.current.is_some() {
            self.error(line, "type blocks cannot nest");
            return;
        }
        let Some(decl) = header.strip_suffix('{') else {
            self.error(line, "expected '{' at end of type declaration");
            return;
        };
        let decl = decl.trim();

        let (name, ctor_params) = match decl.split_once('(') {
            Some((name, rest)) => {
                let Some(params_text) = rest.trim_end().strip_suffix(')') else {
                    self.error(line, "unclosed constructor parameter list");
                    return;
                };
                let params_text = params_text.to_string();
                let params = self.parse_params(line, &params_text);
                (name.trim().to_string(), params)
            }
            None => (decl.to_string(), Vec::new()),
        };

        if !is_identifier(&name) {
            self.error(line, format!("invalid type name '{name}'"));
        }

        self.current = Some(TypeImage {
            namespace: self.namespace.clone(),
            name,
            ctor_params,
            functions: Vec::new(),
        });
    }

    fn push_type(&mut self, line: usize, ty: TypeImage) {
        let duplicate = self
            .types
            .iter()
            .any(|t| t.namespace == ty.namespace && t.name == ty.name);
        if duplicate {
            self.error(line, format!("duplicate type '{}'", ty.name));
            return;
        }
        self.types.push(ty);
    }

    fn function_line(&mut self, line: usize, text: &str) {
        let mut is_static = false;
        let mut is_unsafe = false;
        let mut rest = text;
        loop {
            if let Some(r) = rest.strip_prefix("static ") {
                is_static = true;
                rest = r.trim_start();
                continue;
            }
            if let Some(r) = rest.strip_prefix("unsafe ") {
                is_unsafe = true;
                rest = r.trim_start();
                continue;
            }
            break;
        }

        let Some(rest) = rest.strip_prefix("fn ") else {
            self.error(line, format!("expected a function declaration, found '{text}'"));
            return;
        };
        if is_unsafe && !self.allow_unsafe {
            self.error(line, "unsafe functions require the engine's unsafe opt-in");
        }

        let Some((name, rest)) = rest.split_once('(') else {
            self.error(line, "expected '(' after function name");
            return;
        };
        let name = name.trim().to_string();
        if !is_identifier(&name) {
            self.error(line, format!("invalid function name '{name}'"));
            return;
        }

        let Some((params_text, tail)) = rest.split_once(')') else {
            self.error(line, "unclosed parameter list");
            return;
        };
        let params_text = params_text.to_string();
        let params = self.parse_params(line, &params_text);
        let tail = tail.trim();

        let (ret, body) = if tail == "{ }" || tail == "{}" {
            (TypeTag::Unit, Expr::Const(Value::Unit))
        } else if let Some(rest) = tail.strip_prefix("->") {
            let Some((ty_text, expr_text)) = rest.split_once('=') else {
                self.error(line, "expected '=' and a body expression after the return type");
                return;
            };
            let Some(ret) = TypeTag::parse(ty_text.trim()) else {
                self.error(line, format!("unknown return type '{}'", ty_text.trim()));
                return;
            };
            let Some(body) = self.parse_expr(line, expr_text.trim(), &params) else {
                return;
            };
            (ret, body)
        } else {
            self.error(
                line,
                format!("expected '{{ }}' or '-> type = expr' after the parameter list, found '{tail}'"),
            );
            return;
        };

        let Some(current) = self.current.as_mut() else {
            return;
        };
        let duplicate = current
            .functions
            .iter()
            .any(|f| f.name == name && f.params.len() == params.len());
        if duplicate {
            self.diagnostics.push(Diagnostic::error(
                line,
                format!(
                    "duplicate function '{}' with {} parameter(s)",
                    name,
                    params.len()
                ),
            ));
            return;
        }
        current.functions.push(FnImage {
            name,
            is_static,
            params,
            ret,
            body,
        });
    }

    fn parse_params(&mut self, line: usize, text: &str) -> Vec<Param> {
        let mut params: Vec<Param> = Vec::new();
        let text = text.trim();
        if text.is_empty() {
            return params;
        }
        for piece in text.split(',') {
            let Some((name, ty)) = piece.split_once(':') else {
                self.error(
                    line,
                    format!("parameter '{}' is missing a type annotation", piece.trim()),
                );
                continue;
            };
            let name = name.trim();
            if !is_identifier(name) {
                self.error(line, format!("invalid parameter name '{name}'"));
                continue;
            }
            if params.iter().any(|p| p.name == name) {
                self.error(line, format!("duplicate parameter '{name}'"));
                continue;
            }
            match TypeTag::parse(ty.trim()) {
                Some(tag) if tag != TypeTag::Unit => params.push(Param {
                    name: name.to_string(),
                    ty: tag,
                }),
                _ => self.error(line, format!("unknown parameter type '{}'", ty.trim())),
            }
        }
        params
    }

    fn parse_expr(&mut self, line: usize, text: &str, params: &[Param]) -> Option<Expr> {
        let mut terms = Vec::new();
        for piece in split_terms(text) {
            terms.push(self.parse_term(line, piece.trim(), params)?);
        }
        let mut iter = terms.into_iter();
        let first = match iter.next() {
            Some(first) => first,
            None => {
                self.error(line, "empty body expression");
                return None;
            }
        };
        let mut expr = first;
        for term in iter {
            expr = Expr::Add(Box::new(expr), Box::new(term));
        }
        Some(expr)
    }

    fn parse_term(&mut self, line: usize, text: &str, params: &[Param]) -> Option<Expr> {
        if text.is_empty() {
            self.error(line, "missing operand");
            return None;
        }
        if let Some(rest) = text.strip_prefix('"') {
            let Some(inner) = rest.strip_suffix('"') else {
                self.error(line, "unterminated string literal");
                return None;
            };
            if inner.contains('"') {
                self.error(line, "string literals cannot contain '\"'");
                return None;
            }
            return Some(Expr::Const(Value::Str(inner.to_string())));
        }
        if text == "true" {
            return Some(Expr::Const(Value::Bool(true)));
        }
        if text == "false" {
            return Some(Expr::Const(Value::Bool(false)));
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(Expr::Const(Value::Int(i)));
        }
        if text.contains('.') {
            if let Ok(x) = text.parse::<f64>() {
                return Some(Expr::Const(Value::Float(x)));
            }
        }
        if let Some(index) = params.iter().position(|p| p.name == text) {
            return Some(Expr::Param(index));
        }
        self.error(line, format!("unknown operand '{text}'"));
        None
    }

    fn finish(mut self, module: &ModuleId) -> Result<UnitImage, Vec<Diagnostic>> {
        if let Some(ty) = self.current.take() {
            self.diagnostics.push(Diagnostic::error(
                0,
                format!("type '{}' is missing its closing '}}'", ty.name),
            ));
        }
        if self.diagnostics.is_empty() {
            Ok(UnitImage {
                version: IMAGE_VERSION,
                module: module.to_string(),
                types: self.types,
            })
        } else {
            Err(self.diagnostics)
        }
    }
}

/// Split a body expression on `+` operators outside string literals.
fn split_terms(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '+' if !in_string => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_identifier_path(text: &str) -> bool {
    !text.is_empty() && text.split('.').all(is_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> UnitImage {
        parse(&ModuleId::new("M"), source, &CompileOptions::default()).unwrap()
    }

    fn parse_err(source: &str) -> Vec<Diagnostic> {
        parse(&ModuleId::new("M"), source, &CompileOptions::default()).unwrap_err()
    }

    #[test]
    fn parses_namespaced_type_with_functions() {
        let image = parse_ok(
            "namespace NS\n\
             type C {\n\
                 static fn F() { }\n\
                 static fn G() -> int = 42\n\
                 fn H(text: str) { }\n\
             }\n",
        );

        assert_eq!(image.types.len(), 1);
        let ty = &image.types[0];
        assert_eq!(ty.namespace, "NS");
        assert_eq!(ty.name, "C");
        assert_eq!(ty.functions.len(), 3);
        assert!(ty.functions[0].is_static);
        assert!(!ty.functions[2].is_static);
        assert_eq!(ty.functions[2].params[0].name, "text");
    }

    #[test]
    fn type_before_namespace_line_is_unqualified() {
        let image = parse_ok("type Plain {\n    static fn F() { }\n}\n");
        assert_eq!(image.types[0].namespace, "");
    }

    #[test]
    fn explicit_constructor_params_are_recorded() {
        let image = parse_ok("type D(seed: int) {\n    fn Poke() { }\n}\n");
        assert_eq!(image.types[0].ctor_params.len(), 1);
        assert_eq!(image.types[0].ctor_params[0].name, "seed");
    }

    #[test]
    fn parses_addition_chains() {
        let image = parse_ok(
            "type C {\n    static fn Add(a: int, b: int) -> int = a + b + 1\n}\n",
        );
        let body = &image.types[0].functions[0].body;
        assert!(matches!(body, Expr::Add(_, _)));
    }

    #[test]
    fn string_literal_with_plus_inside_is_one_term() {
        let image = parse_ok(
            "type C {\n    static fn P() -> str = \"a+b\"\n}\n",
        );
        let body = &image.types[0].functions[0].body;
        assert!(matches!(body, Expr::Const(Value::Str(s)) if s == "a+b"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let image = parse_ok("# header\n\ntype C {\n    # inner\n    static fn F() { }\n}\n");
        assert_eq!(image.types[0].functions.len(), 1);
    }

    #[test]
    fn unknown_operand_is_a_diagnostic_with_line() {
        let diagnostics = parse_err("type C {\n    static fn F() -> int = nope\n}\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
        assert!(diagnostics[0].message.contains("unknown operand 'nope'"));
    }

    #[test]
    fn all_errors_are_collected() {
        let diagnostics = parse_err(
            "type C {\n\
                 static fn F() -> int = nope\n\
                 static fn G() -> wat = 1\n\
             }\n",
        );
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn duplicate_function_is_rejected() {
        let diagnostics = parse_err(
            "type C {\n    static fn F() { }\n    static fn F() { }\n}\n",
        );
        assert!(diagnostics[0].message.contains("duplicate function 'F'"));
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let diagnostics = parse_err(
            "type C {\n    static fn F() { }\n}\ntype C {\n    static fn G() { }\n}\n",
        );
        assert!(diagnostics[0].message.contains("duplicate type 'C'"));
    }

    #[test]
    fn missing_closing_brace_is_reported() {
        let diagnostics = parse_err("type C {\n    static fn F() { }\n");
        assert!(diagnostics[0].message.contains("missing its closing"));
    }

    #[test]
    fn unsafe_function_requires_opt_in() {
        let source = "type C {\n    unsafe fn Danger() { }\n}\n";

        let diagnostics =
            parse(&ModuleId::new("M"), source, &CompileOptions::default()).unwrap_err();
        assert!(diagnostics[0].message.contains("unsafe"));

        let allowed = CompileOptions { allow_unsafe: true };
        let image = parse(&ModuleId::new("M"), source, &allowed).unwrap();
        assert_eq!(image.types[0].functions.len(), 1);
    }

    #[test]
    fn unterminated_string_is_a_diagnostic() {
        let diagnostics = parse_err("type C {\n    static fn S() -> str = \"oops\n}\n");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("unterminated string")));
    }

    #[test]
    fn negative_and_float_literals() {
        let image = parse_ok(
            "type C {\n\
                 static fn N() -> int = -3\n\
                 static fn X() -> float = 2.5\n\
             }\n",
        );
        assert!(matches!(
            image.types[0].functions[0].body,
            Expr::Const(Value::Int(-3))
        ));
        assert!(matches!(
            image.types[0].functions[1].body,
            Expr::Const(Value::Float(_))
        ));
    }
}
