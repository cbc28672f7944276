//! Conditional expressions for `if ... then` lines and `Session::test`.
//!
//! ```text
//! fileExists("/etc/hosts")
//! and(commandExists("git"), not(fileIsDirectory($OUT)))
//! ```
//!
//! Variables are looked up when the expression is evaluated and always
//! produce a single string value; their contents are never parsed.

use std::fmt;
use std::str::FromStr;

use super::context::ExecContext;
use super::expand::name_len;
use super::path;
use crate::error::{Result, ShellError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Bool(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    FileExists,
    FileIsDirectory,
    FileIsRegular,
    CommandExists,
    Basename,
    Not,
    And,
    Or,
}

impl FromStr for Func {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "fileExists" => Func::FileExists,
            "fileIsDirectory" => Func::FileIsDirectory,
            "fileIsRegular" => Func::FileIsRegular,
            "commandExists" => Func::CommandExists,
            "basename" => Func::Basename,
            "not" => Func::Not,
            "and" => Func::And,
            "or" => Func::Or,
            other => return Err(ShellError::Eval(format!("unknown function {:?}", other))),
        })
    }
}

impl Func {
    fn name(self) -> &'static str {
        match self {
            Func::FileExists => "fileExists",
            Func::FileIsDirectory => "fileIsDirectory",
            Func::FileIsRegular => "fileIsRegular",
            Func::CommandExists => "commandExists",
            Func::Basename => "basename",
            Func::Not => "not",
            Func::And => "and",
            Func::Or => "or",
        }
    }

    fn check_arity(self, n: usize) -> Result<()> {
        let ok = match self {
            Func::And | Func::Or => n >= 1,
            _ => n == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(ShellError::Eval(format!(
                "{}: wrong number of arguments ({})",
                self.name(),
                n
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Call { func: Func, args: Vec<Expr> },
}

impl Expr {
    pub fn eval(&self, ctx: &ExecContext) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => Ok(Value::Str(ctx.var(name).unwrap_or_default().to_string())),
            Expr::Call { func, args } => call(*func, args, ctx),
        }
    }

    /// Evaluate and require a boolean result.
    pub fn eval_bool(&self, ctx: &ExecContext) -> Result<bool> {
        match self.eval(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(ShellError::Eval(format!(
                "expression produced {} {}, expected bool",
                other.type_name(),
                other
            ))),
        }
    }
}

fn call(func: Func, args: &[Expr], ctx: &ExecContext) -> Result<Value> {
    func.check_arity(args.len())?;

    match func {
        Func::And => {
            for arg in args {
                if !bool_arg(func, arg, ctx)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Func::Or => {
            for arg in args {
                if bool_arg(func, arg, ctx)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Func::Not => Ok(Value::Bool(!bool_arg(func, &args[0], ctx)?)),
        Func::Basename => Ok(Value::Str(path::basename(&str_arg(func, &args[0], ctx)?))),
        Func::CommandExists => Ok(Value::Bool(ctx.which(&str_arg(func, &args[0], ctx)?).is_some())),
        Func::FileExists | Func::FileIsDirectory | Func::FileIsRegular => {
            let arg = str_arg(func, &args[0], ctx)?;
            if arg.is_empty() {
                return Ok(Value::Bool(false));
            }
            let meta = std::fs::metadata(ctx.resolve(&arg)).ok();
            Ok(Value::Bool(match func {
                Func::FileIsDirectory => meta.is_some_and(|m| m.is_dir()),
                Func::FileIsRegular => meta.is_some_and(|m| m.is_file()),
                _ => meta.is_some(),
            }))
        }
    }
}

fn bool_arg(func: Func, arg: &Expr, ctx: &ExecContext) -> Result<bool> {
    match arg.eval(ctx)? {
        Value::Bool(b) => Ok(b),
        other => Err(ShellError::Eval(format!(
            "{}: expected bool argument, got {} {}",
            func.name(),
            other.type_name(),
            other
        ))),
    }
}

fn str_arg(func: Func, arg: &Expr, ctx: &ExecContext) -> Result<String> {
    match arg.eval(ctx)? {
        Value::Str(s) => Ok(s),
        other => Err(ShellError::Eval(format!(
            "{}: expected string argument, got {}",
            func.name(),
            other
        ))),
    }
}

/// Parse a complete expression.
pub fn parse(input: &str) -> Result<Expr> {
    let (expr, rest) = parse_prefix(input)?;
    if !rest.is_empty() {
        return Err(ShellError::Eval(format!("unexpected trailing input {:?}", rest)));
    }
    Ok(expr)
}

/// Parse one expression from the start of `input`, returning it with the
/// remaining text (leading whitespace trimmed).
pub fn parse_prefix(input: &str) -> Result<(Expr, &str)> {
    let mut p = Parser { src: input, pos: 0 };
    let expr = p.expr()?;
    p.skip_ws();
    Ok((expr, &input[p.pos..]))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, msg: &str) -> ShellError {
        ShellError::Eval(format!("{} at offset {} in {:?}", msg, self.pos, self.src))
    }

    fn expr(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.double_quoted().map(|s| Expr::Literal(Value::Str(s))),
            Some('\'') => self.single_quoted().map(|s| Expr::Literal(Value::Str(s))),
            Some('$') => self.variable(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.word(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("expected expression")),
        }
    }

    fn word(&mut self) -> Result<Expr> {
        let len = name_len(self.rest());
        let ident = &self.rest()[..len];
        self.pos += len;

        self.skip_ws();
        if self.peek() != Some('(') {
            return match ident {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                _ => Err(self.error(&format!("unknown identifier {:?}", ident))),
            };
        }

        let func: Func = ident.parse()?;
        self.bump();
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Expr::Call { func, args });
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => break,
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        Ok(Expr::Call { func, args })
    }

    fn variable(&mut self) -> Result<Expr> {
        self.bump();
        if self.peek() == Some('{') {
            self.bump();
            let len = name_len(self.rest());
            let name = self.rest()[..len].to_string();
            self.pos += len;
            if len == 0 || self.bump() != Some('}') {
                return Err(self.error("malformed ${...} reference"));
            }
            return Ok(Expr::Var(name));
        }
        let len = name_len(self.rest());
        if len == 0 {
            return Err(self.error("expected variable name after '$'"));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        Ok(Expr::Var(name))
    }

    fn double_quoted(&mut self) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(self.error("unterminated string"))
    }

    fn single_quoted(&mut self) -> Result<String> {
        self.bump();
        let rest = self.rest();
        match rest.find('\'') {
            Some(end) => {
                let s = rest[..end].to_string();
                self.pos += end + 1;
                Ok(s)
            }
            None => Err(self.error("unterminated string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ctx() -> ExecContext {
        ExecContext::from_process().unwrap()
    }

    fn test(expr: &str, ctx: &ExecContext) -> Result<bool> {
        parse(expr)?.eval_bool(ctx)
    }

    #[test]
    fn test_file_exists() {
        assert!(!test(r#"fileExists("/definitely/missing/path")"#, &ctx()).unwrap());
        assert!(test(r#"fileExists(".")"#, &ctx()).unwrap());
        assert!(test("fileIsDirectory('.')", &ctx()).unwrap());
        assert!(!test("fileIsRegular('.')", &ctx()).unwrap());
    }

    #[test]
    fn test_empty_path_does_not_exist() {
        let ctx = ctx();
        for expr in [
            "fileExists($UNSET_VARIABLE_FOR_TEST)",
            "fileIsDirectory(\"\")",
            "fileExists('  ')",
            "fileIsDirectory(${UNSET_VARIABLE_FOR_TEST})",
        ] {
            assert!(!test(expr, &ctx).unwrap(), "{expr}");
        }
    }

    #[test]
    fn test_paths_relative_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "x").unwrap();
        let ctx = ExecContext {
            cwd: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(test(r#"fileIsRegular("data.txt")"#, &ctx).unwrap());
    }

    #[test]
    fn test_variables_are_atomic() {
        let mut ctx = ctx();
        ctx.env.insert("WEIRD".into(), r#"x"), true, ("#.into());
        ctx.env.insert("DIR".into(), "/usr/local/bin/".into());
        assert!(!test("fileExists($WEIRD)", &ctx).unwrap());
        let value = parse("basename(${DIR})").unwrap().eval(&ctx).unwrap();
        assert_eq!(value, Value::Str("bin".into()));
        // unset variables are empty strings
        assert!(!test("fileIsRegular($UNSET_VARIABLE_FOR_TEST)", &ctx).unwrap());
    }

    #[test]
    fn test_combinators() {
        let ctx = ctx();
        assert!(test("and(true, not(false), or(false, true))", &ctx).unwrap());
        assert!(!test("and(true, false)", &ctx).unwrap());
        assert!(test("or(true, fileExists(\"/nope\"))", &ctx).unwrap());
    }

    #[test]
    fn test_eval_errors() {
        let ctx = ctx();
        for expr in [
            "frobnicate(1)",
            "fileExists()",
            "fileExists('a', 'b')",
            "not('text')",
            "basename('/a/b')",
            "fileExists('.') extra",
            "fileExists('.'",
            "\"unterminated",
            "",
            "maybe",
        ] {
            let err = test(expr, &ctx).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Eval, "{expr}");
        }
    }

    #[test]
    fn test_parse_prefix_returns_rest() {
        let (expr, rest) = parse_prefix("fileExists( $HOME ) then echo hi").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                func: Func::FileExists,
                args: vec![Expr::Var("HOME".into())]
            }
        );
        assert_eq!(rest, "then echo hi");
    }
}
