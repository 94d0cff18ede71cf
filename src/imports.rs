//! Import extraction for the tools declaration file.
//!
//! Only the package clause and the import declarations that follow it are
//! lexed. Everything after the last import is left untouched, so the rest of
//! the file does not need to be valid.

use crate::error::{Result, ToolError};
use crate::package::Package;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Semi,
    Dot,
    Other(char),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{s}'"),
            Token::Str(s) => format!("string {s:?}"),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Semi => "';'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Other(c) => format!("'{c}'"),
            Token::Eof => "end of file".to_string(),
        }
    }
}

struct Lexer<'a> {
    file: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(file: &'a str, src: &str) -> Self {
        Lexer {
            file,
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ToolError {
        ToolError::parse(self.file, line, message)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'*') => {
                    let start = self.line;
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek_char() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error(start, "comment not terminated")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Returns the next token and the line it starts on.
    fn next_token(&mut self) -> Result<(Token, usize)> {
        self.skip_trivia()?;
        let line = self.line;
        let Some(c) = self.bump() else {
            return Ok((Token::Eof, line));
        };
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ';' => Token::Semi,
            '.' => Token::Dot,
            '"' => Token::Str(self.interpreted_string(line)?),
            '`' => Token::Str(self.raw_string(line)?),
            c if c == '_' || c.is_alphabetic() => {
                let mut ident = String::from(c);
                while let Some(c) = self.peek_char() {
                    if c == '_' || c.is_alphanumeric() {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            other => Token::Other(other),
        };
        Ok((token, line))
    }

    fn interpreted_string(&mut self, line: usize) -> Result<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c @ ('"' | '\\')) => value.push(c),
                    Some(c) => return Err(self.error(line, format!("unknown escape sequence '\\{c}'"))),
                    None => return Err(self.error(line, "string literal not terminated")),
                },
                Some('\n') | None => return Err(self.error(line, "string literal not terminated")),
                Some(c) => value.push(c),
            }
        }
    }

    fn raw_string(&mut self, line: usize) -> Result<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(value),
                Some('\r') => {}
                Some(c) => value.push(c),
                None => return Err(self.error(line, "raw string literal not terminated")),
            }
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(Token, usize)>,
    imports: Vec<String>,
}

impl<'a> Parser<'a> {
    fn peek(&mut self) -> Result<&(Token, usize)> {
        let token = match self.peeked.take() {
            Some(t) => t,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn next(&mut self) -> Result<(Token, usize)> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next_token(),
        }
    }

    fn package_clause(&mut self) -> Result<()> {
        match self.next()? {
            (Token::Ident(kw), _) if kw == "package" => {}
            (other, line) => {
                return Err(self.lexer.error(
                    line,
                    format!("expected 'package', found {}", other.describe()),
                ));
            }
        }
        match self.next()? {
            (Token::Ident(name), _) if name != "_" => {}
            (other, line) => {
                return Err(self.lexer.error(
                    line,
                    format!("expected package name, found {}", other.describe()),
                ));
            }
        }
        self.skip_semis()
    }

    fn skip_semis(&mut self) -> Result<()> {
        while self.peek()?.0 == Token::Semi {
            self.next()?;
        }
        Ok(())
    }

    fn import_decls(&mut self) -> Result<()> {
        while matches!(&self.peek()?.0, Token::Ident(kw) if kw == "import") {
            let (_, line) = self.next()?;
            if self.peek()?.0 == Token::LParen {
                self.next()?;
                self.import_block(line)?;
            } else {
                self.import_spec()?;
            }
            self.skip_semis()?;
        }
        Ok(())
    }

    fn import_block(&mut self, open_line: usize) -> Result<()> {
        let mut last_line: Option<usize> = None;
        loop {
            let (token, line) = self.peek()?.clone();
            match token {
                Token::RParen => {
                    self.next()?;
                    return Ok(());
                }
                Token::Semi => {
                    self.next()?;
                    last_line = None;
                }
                Token::Eof => {
                    return Err(self.lexer.error(open_line, "import block not closed, expected ')'"));
                }
                _ => {
                    if last_line == Some(line) {
                        return Err(self.lexer.error(
                            line,
                            "expected ';' or newline between import specs",
                        ));
                    }
                    let end_line = self.import_spec()?;
                    last_line = Some(end_line);
                }
            }
        }
    }

    /// Parses `[name] "path"` and returns the line the spec ends on.
    fn import_spec(&mut self) -> Result<usize> {
        let (mut token, mut line) = self.next()?;
        if matches!(token, Token::Ident(_) | Token::Dot) {
            (token, line) = self.next()?;
        }
        match token {
            Token::Str(path) if path.is_empty() => Err(self.lexer.error(line, "invalid import path: empty")),
            Token::Str(path) => {
                self.imports.push(path);
                Ok(line)
            }
            other => Err(self.lexer.error(
                line,
                format!("expected import path, found {}", other.describe()),
            )),
        }
    }
}

/// Lists the import paths declared in `src`, in declaration order.
///
/// Duplicates are kept. `file_name` is only used in error messages.
pub fn extract_imports(file_name: &str, src: &str) -> Result<Vec<String>> {
    let mut parser = Parser {
        lexer: Lexer::new(file_name, src),
        peeked: None,
        imports: Vec::new(),
    };
    parser.package_clause()?;
    parser.import_decls()?;
    Ok(parser.imports)
}

/// Lists the tools declared in `src` as unresolved packages.
pub fn list_tools(file_name: &str, src: &str) -> Result<Vec<Package>> {
    let imports = extract_imports(file_name, src)?;
    Ok(imports.into_iter().map(Package::new).collect())
}
