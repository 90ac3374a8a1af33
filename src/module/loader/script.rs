//! Declarative script modules
//!
//! Module files on disk are interpreted, not handed to a shell. The accepted
//! language is the configuration subset of shell that modules use to shape a
//! session: assignments, exports, aliases and function definitions. Other
//! commands and control structures are recorded and skipped. The whole file
//! is parsed before anything runs, so a syntax error leaves the session
//! untouched.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, trace};

use crate::module::context::SessionContext;
use crate::module::traits::{Module, ModuleError};

/// Keywords opening a control structure, and the words closing one
const BLOCK_OPENERS: [&str; 6] = ["if", "for", "while", "until", "case", "select"];
const BLOCK_CLOSERS: [&str; 3] = ["fi", "done", "esac"];

/// Part of a word after quote removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Var { name: String, modifier: Modifier },
}

/// Parameter expansion form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// `$NAME` / `${NAME}`
    Plain,
    /// `${NAME:-default}`
    Default(String),
    /// `${NAME:?message}`
    Required(String),
}

pub type Word = Vec<Segment>;

/// One parsed statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Assign { name: String, value: Word, export: bool },
    Export { name: String },
    Unset { name: String },
    Alias { name: String, value: Word },
    Function { name: String, body: String },
    /// `return N` / `exit N`
    Return { code: i32 },
    Skipped { text: String },
}

/// A module backed by a script file
#[derive(Debug, Clone)]
pub struct ScriptModule {
    name: String,
    statements: Vec<(usize, Statement)>,
}

impl ScriptModule {
    /// Parse module source; fails on the first syntax error
    pub fn parse(name: &str, source: &str) -> Result<Self, ModuleError> {
        let statements = parse_source(source)?;
        trace!("Parsed {} statements from module {}", statements.len(), name);
        Ok(Self {
            name: name.to_string(),
            statements,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed statements in source order
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().map(|(_, stmt)| stmt)
    }
}

impl Module for ScriptModule {
    fn register(&self, ctx: &mut SessionContext) -> Result<(), ModuleError> {
        for (line, stmt) in &self.statements {
            match stmt {
                Statement::Assign {
                    name,
                    value,
                    export,
                } => {
                    let value = expand(value, ctx, *line)?;
                    ctx.set_var(name, &value);
                    if *export {
                        ctx.export_var(name);
                    }
                }
                Statement::Export { name } => ctx.export_var(name),
                Statement::Unset { name } => ctx.unset_var(name),
                Statement::Alias { name, value } => {
                    let value = expand(value, ctx, *line)?;
                    ctx.set_alias(name, &value);
                }
                Statement::Function { name, body } => ctx.define_command(name, body),
                Statement::Return { code: 0 } => {
                    trace!("{}:{}: early return", self.name, line);
                    return Ok(());
                }
                Statement::Return { code } => return Err(ModuleError::Exit(*code)),
                Statement::Skipped { text } => {
                    debug!("{}:{}: skipping command: {}", self.name, line, text)
                }
            }
        }
        Ok(())
    }
}

fn expand(word: &Word, ctx: &SessionContext, line: usize) -> Result<String, ModuleError> {
    let mut out = String::new();
    for segment in word {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Var { name, modifier } => {
                let value = ctx.var(name).filter(|v| !v.is_empty());
                match (value, modifier) {
                    (Some(value), _) => out.push_str(value),
                    (None, Modifier::Plain) => {}
                    (None, Modifier::Default(default)) => out.push_str(default),
                    (None, Modifier::Required(message)) => {
                        let message = if message.is_empty() {
                            "parameter null or not set"
                        } else {
                            message.as_str()
                        };
                        return Err(ModuleError::Execution(format!(
                            "line {}: {}: {}",
                            line, name, message
                        )));
                    }
                }
            }
        }
    }
    Ok(out)
}

fn syntax(line: usize, message: impl Into<String>) -> ModuleError {
    ModuleError::Script {
        line,
        message: message.into(),
    }
}

fn parse_source(source: &str) -> Result<Vec<(usize, Statement)>, ModuleError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut statements = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let number = idx + 1;
        let line = lines[idx].trim();
        idx += 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((name, rest)) = function_header(line) {
            let (body, consumed) = collect_body(&name, rest, &lines[idx..], number)?;
            idx += consumed;
            statements.push((number, Statement::Function { name, body }));
            continue;
        }

        let depth = block_balance(line);
        if depth > 0 {
            let opened_by = line.split_whitespace().next().unwrap_or_default().to_string();
            let mut depth = depth;
            idx += heredoc_length(line, &lines[idx..], number)?;
            while depth > 0 {
                let next = lines
                    .get(idx)
                    .ok_or_else(|| syntax(number, format!("unterminated '{}' block", opened_by)))?;
                depth += block_balance(next.trim());
                idx += 1;
                idx += heredoc_length(next, &lines[idx..], idx)?;
            }
            statements.push((
                number,
                Statement::Skipped {
                    text: line.to_string(),
                },
            ));
            continue;
        }

        let body_lines = heredoc_length(line, &lines[idx..], number)?;
        if body_lines > 0 {
            idx += body_lines;
            statements.push((
                number,
                Statement::Skipped {
                    text: line.to_string(),
                },
            ));
            continue;
        }

        parse_line(line, number, &mut statements)?;
    }

    Ok(statements)
}

/// Here-document opened on a line: its delimiter and whether leading tabs
/// are stripped from body lines (`<<-`)
///
/// Quoted text, comments, here-strings and arithmetic shifts do not count.
fn heredoc_delimiter(line: &str) -> Option<(String, bool)> {
    let masked: Vec<char> = mask_quoted(line).chars().collect();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i + 1 < masked.len() {
        match masked[i] {
            '#' if i == 0 || masked[i - 1].is_whitespace() => return None,
            '(' if masked[i + 1] == '(' => return None,
            '<' if masked[i + 1] == '<' => {
                let mut j = i + 2;
                if masked.get(j) == Some(&'<') {
                    i = j + 1;
                    continue;
                }
                let strip_tabs = masked.get(j) == Some(&'-');
                if strip_tabs {
                    j += 1;
                }
                while chars.get(j).is_some_and(|c| *c == ' ' || *c == '\t') {
                    j += 1;
                }
                let delimiter: String = chars[j..]
                    .iter()
                    .take_while(|c| {
                        !c.is_whitespace() && !matches!(c, ';' | '|' | '&' | '<' | '>' | '(' | ')')
                    })
                    .filter(|c| !matches!(c, '\'' | '"' | '\\'))
                    .collect();
                return (!delimiter.is_empty()).then_some((delimiter, strip_tabs));
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Number of following lines taken by a here-document body, terminator
/// included; zero when the line opens none
fn heredoc_length(line: &str, following: &[&str], number: usize) -> Result<usize, ModuleError> {
    let (delimiter, strip_tabs) = match heredoc_delimiter(line) {
        Some(found) => found,
        None => return Ok(0),
    };
    following
        .iter()
        .position(|body| {
            let body = if strip_tabs {
                body.trim_start_matches('\t')
            } else {
                body
            };
            body == delimiter
        })
        .map(|end| end + 1)
        .ok_or_else(|| syntax(number, format!("here-document '{}' is not terminated", delimiter)))
}

/// Net number of control structures opened on a line
///
/// Only words in command position count, and quoted text is ignored.
fn block_balance(line: &str) -> i32 {
    let mut balance = 0;
    let mut at_start = true;
    let masked = mask_quoted(line).replace(';', " ; ");
    for token in masked.split_whitespace() {
        if token.starts_with('#') {
            break;
        }
        if at_start {
            if BLOCK_OPENERS.contains(&token) {
                balance += 1;
            } else if BLOCK_CLOSERS.contains(&token) {
                balance -= 1;
            }
        }
        at_start = matches!(token, ";" | "then" | "do" | "else" | "&&" | "||" | "|" | "{");
    }
    balance
}

/// Replace quoted text (quotes included) with `_`
fn mask_quoted(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            out.push('_');
            continue;
        }
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('"'), '"') => quote = None,
            (Some('"'), '\\') | (None, '\\') => escaped = true,
            (None, '\'' | '"') => quote = Some(c),
            (None, _) => {
                out.push(c);
                continue;
            }
            _ => {}
        }
        out.push('_');
    }
    out
}

fn function_header(line: &str) -> Option<(String, &str)> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = HEADER
        .get_or_init(|| {
            Regex::new(
                r"^(?:function\s+([A-Za-z_][A-Za-z0-9_:.-]*)\s*(?:\(\s*\))?|([A-Za-z_][A-Za-z0-9_:.-]*)\s*\(\s*\))\s*(.*)$",
            )
            .ok()
        })
        .as_ref()?;

    let caps = re.captures(line)?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
    let rest = caps.get(3).map_or("", |m| m.as_str());
    if rest.is_empty() || rest.starts_with('{') || rest.starts_with('#') {
        Some((name, rest))
    } else {
        None
    }
}

/// Quote-aware brace counter carried across the lines of a function body
#[derive(Debug, Default)]
struct BraceScanner {
    depth: usize,
    single: bool,
    double: bool,
}

impl BraceScanner {
    /// Byte offset of the brace that closes the body, if it is on this line
    fn feed(&mut self, text: &str) -> Option<usize> {
        let mut escaped = false;
        let mut after_space = true;
        for (i, c) in text.char_indices() {
            if escaped {
                escaped = false;
                after_space = false;
                continue;
            }
            if self.single {
                self.single = c != '\'';
            } else if self.double {
                match c {
                    '\\' => escaped = true,
                    '"' => self.double = false,
                    _ => {}
                }
            } else {
                match c {
                    '\\' => escaped = true,
                    '\'' => self.single = true,
                    '"' => self.double = true,
                    '#' if after_space => return None,
                    '{' => self.depth += 1,
                    '}' => {
                        self.depth = self.depth.saturating_sub(1);
                        if self.depth == 0 {
                            return Some(i);
                        }
                    }
                    _ => {}
                }
            }
            after_space = c.is_whitespace() || c == ';';
        }
        None
    }
}

/// Collect a function body starting after its header
///
/// Returns the body and the number of following lines consumed.
fn collect_body(
    name: &str,
    rest: &str,
    following: &[&str],
    header_line: usize,
) -> Result<(String, usize), ModuleError> {
    let mut scanner = BraceScanner::default();
    let mut body = String::new();
    let mut consumed = 0;
    let mut pending = Some(rest);

    loop {
        let text = match pending.take() {
            Some(text) => text,
            None => {
                let text = following.get(consumed).ok_or_else(|| {
                    syntax(header_line, format!("unbalanced braces in function '{}'", name))
                })?;
                consumed += 1;
                *text
            }
        };

        let text = if scanner.depth == 0 {
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match trimmed.strip_prefix('{') {
                Some(inner) => {
                    scanner.depth = 1;
                    inner
                }
                None => {
                    return Err(syntax(
                        header_line,
                        format!("expected '{{' to open function '{}'", name),
                    ))
                }
            }
        } else {
            text
        };

        match scanner.feed(text) {
            Some(end) => {
                body.push_str(&text[..end]);
                let trailing = text[end + 1..].trim();
                if !trailing.is_empty() && !trailing.starts_with('#') {
                    debug!("Ignoring text after function '{}': {}", name, trailing);
                }
                return Ok((tidy_body(&body), consumed));
            }
            None => {
                body.push_str(text);
                body.push('\n');
                let heredoc = heredoc_length(text, &following[consumed..], header_line)?;
                for line in &following[consumed..consumed + heredoc] {
                    body.push_str(line);
                    body.push('\n');
                }
                consumed += heredoc;
            }
        }
    }
}

/// Drop surrounding blank lines and common indentation
fn tidy_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().map(str::trim_end).collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => return String::new(),
    };
    let lines = &lines[first..=last];

    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Character cursor over one line
struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    /// At a statement boundary: end of line, `;` or a comment
    fn at_boundary(&self) -> bool {
        matches!(self.peek(), None | Some(';') | Some('#'))
    }

    fn at_word_end(&self) -> bool {
        matches!(self.peek(), None | Some(' ') | Some('\t') | Some(';'))
    }

    /// Length of the identifier starting at the cursor
    fn identifier_len(&self) -> usize {
        let mut len = 0;
        while let Some(c) = self.peek_at(len) {
            let ok = c == '_' || c.is_ascii_alphabetic() || (len > 0 && c.is_ascii_digit());
            if !ok {
                break;
            }
            len += 1;
        }
        len
    }

    fn identifier(&mut self) -> Option<String> {
        let len = self.identifier_len();
        if len == 0 {
            return None;
        }
        let ident: String = self.chars[self.pos..self.pos + len].iter().collect();
        self.pos += len;
        Some(ident)
    }

    /// Whether an identifier followed by `=` starts here
    fn at_assignment(&self) -> bool {
        let len = self.identifier_len();
        len > 0 && self.peek_at(len) == Some('=')
    }

    /// Whether the keyword starts here as a whole word
    fn at_keyword(&self, keyword: &str) -> bool {
        let len = keyword.chars().count();
        self.chars[self.pos..].iter().take(len).copied().eq(keyword.chars())
            && matches!(self.peek_at(len), None | Some(' ') | Some('\t') | Some(';'))
    }

    /// Unquoted token up to the next blank or `;`
    fn token(&mut self) -> String {
        let mut token = String::new();
        while !self.at_word_end() {
            if let Some(c) = self.bump() {
                token.push(c);
            }
        }
        token
    }

    fn rest_from(&self, start: usize) -> String {
        self.chars[start..].iter().collect()
    }
}

enum Parsed {
    Statements(Vec<Statement>),
    /// Not part of the interpreted subset; the rest of the line is skipped
    Command,
}

fn parse_line(
    text: &str,
    number: usize,
    out: &mut Vec<(usize, Statement)>,
) -> Result<(), ModuleError> {
    let mut cur = Cursor::new(text);
    loop {
        cur.skip_blank();
        match cur.peek() {
            None | Some('#') => return Ok(()),
            Some(';') => {
                cur.bump();
                continue;
            }
            _ => {}
        }

        let start = cur.pos;
        match parse_statement(&mut cur, number)? {
            Parsed::Statements(statements) => {
                out.extend(statements.into_iter().map(|stmt| (number, stmt)));
            }
            Parsed::Command => {
                let text = cur.rest_from(start).trim().to_string();
                out.push((number, Statement::Skipped { text }));
                return Ok(());
            }
        }
    }
}

fn parse_statement(cur: &mut Cursor, line: usize) -> Result<Parsed, ModuleError> {
    if cur.at_assignment() {
        return parse_assignments(cur, line);
    }
    for keyword in ["export", "readonly", "declare", "typeset", "local"] {
        if cur.at_keyword(keyword) {
            cur.pos += keyword.len();
            return parse_declaration(cur, keyword, line);
        }
    }
    if cur.at_keyword("unset") {
        cur.pos += "unset".len();
        return parse_unset(cur, line);
    }
    if cur.at_keyword("alias") {
        cur.pos += "alias".len();
        return parse_alias(cur, line);
    }
    for keyword in ["return", "exit"] {
        if cur.at_keyword(keyword) {
            cur.pos += keyword.len();
            return parse_return(cur, line);
        }
    }
    Ok(Parsed::Command)
}

/// `A=1 B=2`; a trailing command turns the whole statement into a command
fn parse_assignments(cur: &mut Cursor, line: usize) -> Result<Parsed, ModuleError> {
    let mut statements = Vec::new();
    loop {
        let name = cur
            .identifier()
            .ok_or_else(|| syntax(line, "invalid variable name"))?;
        cur.bump(); // '='
        let value = parse_word(cur, line)?;
        statements.push(Statement::Assign {
            name,
            value,
            export: false,
        });

        cur.skip_blank();
        if cur.at_boundary() {
            return Ok(Parsed::Statements(statements));
        }
        if !cur.at_assignment() {
            return Ok(Parsed::Command);
        }
    }
}

fn parse_declaration(cur: &mut Cursor, keyword: &str, line: usize) -> Result<Parsed, ModuleError> {
    let mut export = keyword == "export";
    let mut statements = Vec::new();
    loop {
        cur.skip_blank();
        if cur.at_boundary() {
            return Ok(Parsed::Statements(statements));
        }
        if cur.peek() == Some('-') {
            let flags = cur.token();
            if matches!(keyword, "declare" | "typeset") && flags.contains('x') {
                export = true;
            }
            continue;
        }

        let name = cur.identifier();
        match (name, cur.peek()) {
            (Some(name), Some('=')) => {
                cur.bump();
                let value = parse_word(cur, line)?;
                statements.push(Statement::Assign {
                    name,
                    value,
                    export,
                });
            }
            (Some(name), _) if cur.at_word_end() => {
                if export {
                    statements.push(Statement::Export { name });
                }
            }
            _ => {
                return Err(syntax(
                    line,
                    format!("invalid variable name after '{}'", keyword),
                ))
            }
        }
    }
}

fn parse_unset(cur: &mut Cursor, line: usize) -> Result<Parsed, ModuleError> {
    let mut statements = Vec::new();
    loop {
        cur.skip_blank();
        if cur.at_boundary() {
            return Ok(Parsed::Statements(statements));
        }
        if cur.peek() == Some('-') {
            // `unset -f` removes functions, which modules cannot reach
            if cur.token().contains('f') {
                return Ok(Parsed::Command);
            }
            continue;
        }
        match cur.identifier() {
            Some(name) if cur.at_word_end() => statements.push(Statement::Unset { name }),
            _ => return Err(syntax(line, "invalid variable name after 'unset'")),
        }
    }
}

fn parse_alias(cur: &mut Cursor, line: usize) -> Result<Parsed, ModuleError> {
    let mut statements = Vec::new();
    loop {
        cur.skip_blank();
        if cur.at_boundary() {
            return Ok(Parsed::Statements(statements));
        }
        let mut name = String::new();
        while let Some(c) = cur.peek() {
            if c == '=' || c == ' ' || c == '\t' || c == ';' {
                break;
            }
            if matches!(c, '\'' | '"' | '$' | '/' | '`' | '\\') {
                return Err(syntax(line, format!("invalid alias name near '{}'", c)));
            }
            name.push(c);
            cur.bump();
        }
        if name.is_empty() {
            return Err(syntax(line, "missing alias name"));
        }
        if cur.peek() != Some('=') {
            // `alias name` only prints the alias
            return Ok(Parsed::Command);
        }
        cur.bump();
        let value = parse_word(cur, line)?;
        statements.push(Statement::Alias { name, value });
    }
}

fn parse_return(cur: &mut Cursor, line: usize) -> Result<Parsed, ModuleError> {
    cur.skip_blank();
    let code = if cur.at_boundary() {
        0
    } else {
        let token = cur.token();
        token
            .parse::<i32>()
            .map_err(|_| syntax(line, format!("numeric argument required: {}", token)))?
    };
    Ok(Parsed::Statements(vec![Statement::Return { code }]))
}

fn push_literal(segments: &mut Word, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// One shell word: quotes removed, expansions split out
fn parse_word(cur: &mut Cursor, line: usize) -> Result<Word, ModuleError> {
    let mut segments = Vec::new();
    let mut literal = String::new();

    while let Some(c) = cur.peek() {
        match c {
            ' ' | '\t' | ';' => break,
            '\'' => {
                cur.bump();
                loop {
                    match cur.bump() {
                        Some('\'') => break,
                        Some(c) => literal.push(c),
                        None => return Err(syntax(line, "unterminated single quote")),
                    }
                }
            }
            '"' => {
                cur.bump();
                parse_double_quoted(cur, line, &mut segments, &mut literal)?;
            }
            '\\' => {
                cur.bump();
                if let Some(c) = cur.bump() {
                    literal.push(c);
                }
            }
            '$' => parse_dollar(cur, line, &mut segments, &mut literal)?,
            '`' => literal.push_str(&parse_backticks(cur, line)?),
            _ => {
                literal.push(c);
                cur.bump();
            }
        }
    }

    push_literal(&mut segments, &mut literal);
    Ok(segments)
}

fn parse_double_quoted(
    cur: &mut Cursor,
    line: usize,
    segments: &mut Word,
    literal: &mut String,
) -> Result<(), ModuleError> {
    loop {
        match cur.peek() {
            None => return Err(syntax(line, "unterminated double quote")),
            Some('"') => {
                cur.bump();
                return Ok(());
            }
            Some('\\') => {
                cur.bump();
                match cur.bump() {
                    Some(c @ ('$' | '`' | '"' | '\\')) => literal.push(c),
                    Some(c) => {
                        literal.push('\\');
                        literal.push(c);
                    }
                    None => return Err(syntax(line, "unterminated double quote")),
                }
            }
            Some('$') => parse_dollar(cur, line, segments, literal)?,
            Some('`') => literal.push_str(&parse_backticks(cur, line)?),
            Some(c) => {
                literal.push(c);
                cur.bump();
            }
        }
    }
}

fn parse_dollar(
    cur: &mut Cursor,
    line: usize,
    segments: &mut Word,
    literal: &mut String,
) -> Result<(), ModuleError> {
    cur.bump(); // '$'
    match cur.peek() {
        Some('{') => {
            cur.bump();
            let mut inner = String::new();
            loop {
                match cur.bump() {
                    Some('}') => break,
                    Some(c) => inner.push(c),
                    None => return Err(syntax(line, "unterminated parameter expansion")),
                }
            }
            let (name, modifier) = parse_braced(&inner)
                .ok_or_else(|| syntax(line, format!("bad substitution: ${{{}}}", inner)))?;
            push_literal(segments, literal);
            segments.push(Segment::Var { name, modifier });
        }
        Some('(') => {
            // Command substitution is never run; the text stays as written
            let start = cur.pos;
            let mut depth = 0usize;
            loop {
                match cur.bump() {
                    Some('(') => depth += 1,
                    Some(')') => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => return Err(syntax(line, "unterminated command substitution")),
                }
            }
            let text = cur.chars[start..cur.pos].iter().collect::<String>();
            debug!("line {}: leaving command substitution unexpanded: ${}", line, text);
            literal.push('$');
            literal.push_str(&text);
        }
        _ => match cur.identifier() {
            Some(name) => {
                push_literal(segments, literal);
                segments.push(Segment::Var {
                    name,
                    modifier: Modifier::Plain,
                });
            }
            None => literal.push('$'),
        },
    }
    Ok(())
}

fn parse_braced(inner: &str) -> Option<(String, Modifier)> {
    let name_len = inner
        .char_indices()
        .find(|(i, c)| !(*c == '_' || c.is_ascii_alphabetic() || (*i > 0 && c.is_ascii_digit())))
        .map_or(inner.len(), |(i, _)| i);
    if name_len == 0 {
        return None;
    }
    let (name, rest) = inner.split_at(name_len);
    let modifier = if rest.is_empty() {
        Modifier::Plain
    } else if let Some(default) = rest.strip_prefix(":-").or_else(|| rest.strip_prefix('-')) {
        Modifier::Default(default.to_string())
    } else if let Some(message) = rest.strip_prefix(":?").or_else(|| rest.strip_prefix('?')) {
        Modifier::Required(message.to_string())
    } else {
        return None;
    };
    Some((name.to_string(), modifier))
}

fn parse_backticks(cur: &mut Cursor, line: usize) -> Result<String, ModuleError> {
    cur.bump();
    let mut text = String::from("`");
    loop {
        match cur.bump() {
            Some('`') => break,
            Some(c) => text.push(c),
            None => return Err(syntax(line, "unterminated backquote")),
        }
    }
    text.push('`');
    debug!("line {}: leaving command substitution unexpanded: {}", line, text);
    Ok(text)
}
