use crate::error::{Result, ToolError};
use tracing::debug;

/// The parts of a `go.mod` file needed to pin tool versions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModFile {
    /// Path declared by the `module` directive, if any.
    pub module: Option<String>,
    /// Version from the `go` directive.
    pub go: Option<String>,
    pub require: Vec<Require>,
}

/// One `require` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub path: String,
    pub version: String,
    /// Marked `// indirect`, i.e. only needed transitively.
    pub indirect: bool,
}

impl ModFile {
    /// Parses manifest text laxly: unknown directives are skipped, but malformed
    /// `module` and `require` lines and unbalanced blocks are errors.
    pub fn parse(file_name: &str, src: &str) -> Result<ModFile> {
        let mut modfile = ModFile::default();
        let mut block: Option<(String, usize)> = None;

        for (idx, raw) in src.lines().enumerate() {
            let line_no = idx + 1;
            let (code, comment) = split_comment(raw);
            let words = tokenize(code);

            if let Some((directive, _)) = block.clone() {
                if words.first().map(String::as_str) == Some(")") {
                    if words.len() > 1 {
                        return Err(ToolError::parse(file_name, line_no, "unexpected text after ')'"));
                    }
                    block = None;
                    continue;
                }
                if words.is_empty() {
                    continue;
                }
                modfile.entry(file_name, line_no, &directive, &words, comment)?;
                continue;
            }

            let Some((directive, args)) = words.split_first() else {
                continue;
            };
            if directive == ")" {
                return Err(ToolError::parse(file_name, line_no, "unexpected ')'"));
            }
            if args.len() == 1 && args[0] == "(" {
                block = Some((directive.clone(), line_no));
                continue;
            }
            modfile.entry(file_name, line_no, directive, args, comment)?;
        }

        if let Some((directive, opened)) = block {
            return Err(ToolError::parse(
                file_name,
                opened,
                format!("{directive} block is never closed"),
            ));
        }
        Ok(modfile)
    }

    /// Direct (non-indirect) requirements, in manifest order.
    pub fn direct(&self) -> impl Iterator<Item = &Require> {
        self.require.iter().filter(|r| !r.indirect)
    }

    fn entry(
        &mut self,
        file_name: &str,
        line_no: usize,
        directive: &str,
        args: &[String],
        comment: Option<&str>,
    ) -> Result<()> {
        match directive {
            "module" => {
                let [path] = args else {
                    return Err(ToolError::parse(file_name, line_no, "usage: module module/path"));
                };
                self.module = Some(path.clone());
            }
            "go" => {
                if let [version] = args {
                    self.go = Some(version.clone());
                }
            }
            "require" => {
                let [path, version] = args else {
                    return Err(ToolError::parse(
                        file_name,
                        line_no,
                        "usage: require module/path v1.2.3",
                    ));
                };
                self.require.push(Require {
                    path: path.clone(),
                    version: version.clone(),
                    indirect: comment.is_some_and(is_indirect),
                });
            }
            other => debug!(directive = other, line = line_no, "skipping manifest directive"),
        }
        Ok(())
    }
}

fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.find("//") {
        Some(at) => (&line[..at], Some(line[at + 2..].trim())),
        None => (line, None),
    }
}

fn is_indirect(comment: &str) -> bool {
    comment == "indirect" || comment.starts_with("indirect;")
}

/// Splits a line into words, treating parentheses as their own words and
/// unquoting `"..."` strings.
fn tokenize(code: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => flush(&mut current, &mut words),
            '(' | ')' => {
                flush(&mut current, &mut words);
                words.push(c.to_string());
            }
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    current.push(c);
                }
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut words);
    words
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if !current.is_empty() {
        words.push(std::mem::take(current));
    }
}
