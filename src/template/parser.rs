//! Parser for the `{{ ... }}` action syntax.
//!
//! Grammar inside an action:
//!
//! ```text
//! pipeline := command ('|' command)*
//! command  := name operand*             (space separated)
//!           | name '(' [operand (',' operand)*] ')'
//! operand  := "quoted" | `raw` | number | true | false
//!           | name | name '(' ... ')' | '(' pipeline ')' | '(' operand ')'
//! ```
//!
//! `{{-` and `-}}` trim whitespace on that side of the action and
//! `{{/* ... */}}` is a comment. Function names are checked against the
//! registry while parsing.

use super::registry::FunctionRegistry;
use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action { pipeline: Pipeline, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub function: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Literal(String),
    Pipeline(Pipeline),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const TRIM_CLOSE: &str = "-}}";

/// Parses `source` into text and action nodes.
pub(crate) fn parse(source: &str, registry: &FunctionRegistry) -> Result<Vec<Node>, TemplateError> {
    Parser {
        src: source,
        pos: 0,
        line: 1,
        registry,
    }
    .parse_template()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    registry: &'a FunctionRegistry,
}

impl<'a> Parser<'a> {
    fn parse_template(&mut self) -> Result<Vec<Node>, TemplateError> {
        let src = self.src;
        let mut nodes = Vec::new();
        let mut trim_leading = false;

        while self.pos < src.len() {
            let rest = &src[self.pos..];
            let text_len = rest.find(OPEN).unwrap_or(rest.len());
            let mut text = &rest[..text_len];
            if trim_leading {
                text = text.trim_start();
            }
            self.advance(text_len);

            if self.pos >= src.len() {
                push_text(&mut nodes, text);
                break;
            }

            self.advance(OPEN.len());
            if self.eat_trim_marker() {
                text = text.trim_end();
            }
            push_text(&mut nodes, text);

            let line = self.line;
            self.skip_ws();
            if self.rest().starts_with("/*") {
                self.skip_comment()?;
            } else {
                let pipeline = self.parse_pipeline()?;
                nodes.push(Node::Action { pipeline, line });
            }
            trim_leading = self.expect_close()?;
        }

        Ok(nodes)
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, TemplateError> {
        let mut commands = vec![self.parse_command()?];
        loop {
            self.skip_ws();
            if self.peek() == Some('|') {
                self.bump();
                commands.push(self.parse_command()?);
            } else {
                break;
            }
        }
        Ok(Pipeline { commands })
    }

    fn parse_command(&mut self) -> Result<Command, TemplateError> {
        self.skip_ws();
        let function = match self.peek() {
            Some(c) if is_ident_start(c) => self.parse_ident(),
            Some(c) => return Err(self.error(format!("unexpected {c:?} in command"))),
            None => return Err(self.error("unclosed action")),
        };
        self.check_defined(&function)?;

        if self.peek() == Some('(') {
            self.bump();
            let args = self.parse_call_args()?;
            return Ok(Command { function, args });
        }

        let mut args = Vec::new();
        loop {
            let spaced = self.skip_ws();
            if self.at_command_end() {
                break;
            }
            if !spaced {
                let c = self.peek().unwrap_or(' ');
                return Err(self.error(format!("unexpected {c:?} in operand")));
            }
            args.push(self.parse_operand()?);
        }
        Ok(Command { function, args })
    }

    /// Parses `a, b, c)` after the opening parenthesis of a call.
    fn parse_call_args(&mut self) -> Result<Vec<Arg>, TemplateError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(args);
        }

        loop {
            self.skip_ws();
            args.push(self.parse_operand()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {
                    self.bump();
                    return Ok(args);
                }
                Some(c) => return Err(self.error(format!("expected ',' or ')' in call, found {c:?}"))),
                None => return Err(self.error("unclosed call")),
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Arg, TemplateError> {
        match self.peek() {
            Some('"') => self.parse_quoted().map(Arg::Literal),
            Some('`') => self.parse_raw().map(Arg::Literal),
            Some('(') => {
                self.bump();
                self.skip_ws();
                let inner = if self.at_literal() {
                    self.parse_operand()?
                } else {
                    Arg::Pipeline(self.parse_pipeline()?)
                };
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(self.error("unclosed left paren"));
                }
                self.bump();
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                Ok(Arg::Literal(self.parse_number()?))
            }
            Some(c) if is_ident_start(c) => {
                let name = self.parse_ident();
                if self.peek() != Some('(') && (name == "true" || name == "false") {
                    return Ok(Arg::Literal(name));
                }
                self.check_defined(&name)?;
                let args = if self.peek() == Some('(') {
                    self.bump();
                    self.parse_call_args()?
                } else {
                    Vec::new()
                };
                Ok(Arg::Pipeline(Pipeline {
                    commands: vec![Command {
                        function: name,
                        args,
                    }],
                }))
            }
            Some(c) => Err(self.error(format!("unexpected {c:?} in operand"))),
            None => Err(self.error("unclosed action")),
        }
    }

    /// True if the cursor is on an operand that cannot start a command.
    fn at_literal(&self) -> bool {
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                let rest = self.rest();
                let len = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                matches!(&rest[..len], "true" | "false") && !rest[len..].starts_with('(')
            }
            Some('(') => false,
            _ => true,
        }
    }

    fn parse_ident(&mut self) -> String {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let ident = rest[..len].to_string();
        self.advance(len);
        ident
    }

    fn parse_number(&mut self) -> Result<String, TemplateError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-')))
            .unwrap_or(rest.len());
        let literal = &rest[..len];
        if !literal.chars().any(|c| c.is_ascii_digit()) {
            return Err(self.error(format!("bad number syntax: {literal:?}")));
        }
        let literal = literal.to_string();
        self.advance(len);
        Ok(literal)
    }

    fn parse_quoted(&mut self) -> Result<String, TemplateError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated quoted string")),
                Some('"') => return Ok(out),
                Some('\\') => out.push(self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self) -> Result<char, TemplateError> {
        let c = match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('u') => {
                let rest = self.rest();
                let hex = rest.get(..4).unwrap_or(rest);
                let code = u32::from_str_radix(hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("invalid unicode escape \\u{hex}")))?;
                self.advance(4);
                code
            }
            Some(other) => return Err(self.error(format!("unknown escape sequence \\{other}"))),
            None => return Err(self.error("unterminated quoted string")),
        };
        Ok(c)
    }

    fn parse_raw(&mut self) -> Result<String, TemplateError> {
        self.bump();
        let rest = self.rest();
        let Some(len) = rest.find('`') else {
            return Err(self.error("unterminated raw quoted string"));
        };
        let raw = rest[..len].to_string();
        self.advance(len + 1);
        Ok(raw)
    }

    fn skip_comment(&mut self) -> Result<(), TemplateError> {
        let Some(end) = self.rest().find("*/") else {
            return Err(self.error("unclosed comment"));
        };
        self.advance(end + 2);
        self.skip_ws();
        Ok(())
    }

    /// Consumes the closing delimiter, returning true for `-}}`.
    fn expect_close(&mut self) -> Result<bool, TemplateError> {
        let spaced = self.skip_ws() || self.src[..self.pos].ends_with(char::is_whitespace);
        let rest = self.rest();
        if spaced && rest.starts_with(TRIM_CLOSE) {
            self.advance(TRIM_CLOSE.len());
            return Ok(true);
        }
        if rest.starts_with(CLOSE) {
            self.advance(CLOSE.len());
            return Ok(false);
        }
        match self.peek() {
            Some(c) => Err(self.error(format!("unexpected {c:?} in action"))),
            None => Err(self.error("unclosed action")),
        }
    }

    /// Consumes `-` after `{{` when it is followed by whitespace.
    fn eat_trim_marker(&mut self) -> bool {
        let mut chars = self.rest().chars();
        if chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace) {
            self.advance(1);
            return true;
        }
        false
    }

    fn at_command_end(&self) -> bool {
        let rest = self.rest();
        rest.is_empty()
            || rest.starts_with('|')
            || rest.starts_with(')')
            || rest.starts_with(CLOSE)
            || rest.starts_with(TRIM_CLOSE)
    }

    fn check_defined(&self, name: &str) -> Result<(), TemplateError> {
        if self.registry.contains(name) {
            Ok(())
        } else {
            Err(self.error(format!("function {name:?} not defined")))
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.advance(c.len_utf8());
        Some(c)
    }

    fn advance(&mut self, len: usize) {
        let consumed = &self.src[self.pos..self.pos + len];
        self.line += consumed.matches('\n').count();
        self.pos += len;
    }

    /// Skips whitespace, returning true if any was skipped.
    fn skip_ws(&mut self) -> bool {
        let rest = self.rest();
        let len = rest.len() - rest.trim_start().len();
        self.advance(len);
        len > 0
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}
