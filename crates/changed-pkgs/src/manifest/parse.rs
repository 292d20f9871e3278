use std::collections::HashMap;

use super::{ManifestSnapshot, ModuleVersion, Replacement, Requirement};
use crate::error::ChangedPkgsError;

const KNOWN_DIRECTIVES: &[&str] = &[
    "module",
    "go",
    "toolchain",
    "godebug",
    "require",
    "exclude",
    "replace",
    "retract",
    "tool",
    "ignore",
];

const BLOCK_DIRECTIVES: &[&str] = &[
    "godebug", "require", "exclude", "replace", "retract", "tool", "ignore",
];

/// Parses the raw bytes of a `go.mod` file. `file` is only used in error messages.
///
/// Only `module`, `require` and `replace` are retained; the remaining directives are
/// checked for shape and dropped.
pub fn parse_manifest(file: &str, data: &[u8]) -> Result<ManifestSnapshot, ChangedPkgsError> {
    let text = std::str::from_utf8(data).map_err(|err| ChangedPkgsError::Manifest {
        file: file.to_string(),
        line: 0,
        message: format!("invalid UTF-8: {err}"),
    })?;

    let mut parser = Parser {
        file,
        snapshot: ManifestSnapshot::default(),
        replaced: HashMap::new(),
    };
    let mut block: Option<(String, usize)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let (tokens, comment) = parser.tokenize(raw, line)?;
        if tokens.is_empty() {
            continue;
        }

        if let Some((verb, _)) = &block {
            if tokens == [")"] {
                block = None;
                continue;
            }
            let verb = verb.clone();
            parser.apply(&verb, &tokens, comment.as_deref(), line)?;
            continue;
        }

        let verb = tokens[0].as_str();
        if !KNOWN_DIRECTIVES.contains(&verb) {
            return Err(parser.error(line, format!("unknown directive: {verb}")));
        }
        let rest = &tokens[1..];
        if rest == ["("] && BLOCK_DIRECTIVES.contains(&verb) {
            block = Some((verb.to_string(), line));
            continue;
        }
        if rest == ["(", ")"] && BLOCK_DIRECTIVES.contains(&verb) {
            continue;
        }
        parser.apply(verb, rest, comment.as_deref(), line)?;
    }

    if let Some((verb, start)) = block {
        return Err(parser.error(start, format!("unterminated {verb} block")));
    }

    Ok(parser.snapshot)
}

struct Parser<'a> {
    file: &'a str,
    snapshot: ManifestSnapshot,
    // keyed by source path and optional source version
    replaced: HashMap<(String, Option<String>), ModuleVersion>,
}

impl Parser<'_> {
    fn error(&self, line: usize, message: impl Into<String>) -> ChangedPkgsError {
        ChangedPkgsError::Manifest {
            file: self.file.to_string(),
            line,
            message: message.into(),
        }
    }

    /// Splits a line into tokens and the trailing `//` comment, if any.
    fn tokenize(
        &self,
        raw: &str,
        line: usize,
    ) -> Result<(Vec<String>, Option<String>), ChangedPkgsError> {
        let mut tokens = Vec::new();
        let mut chars = raw.char_indices().peekable();

        while let Some(&(pos, ch)) = chars.peek() {
            match ch {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '/' if raw[pos..].starts_with("//") => {
                    return Ok((tokens, Some(raw[pos + 2..].trim().to_string())));
                }
                '(' | ')' => {
                    chars.next();
                    tokens.push(ch.to_string());
                }
                '=' if raw[pos..].starts_with("=>") => {
                    chars.next();
                    chars.next();
                    tokens.push("=>".to_string());
                }
                '"' => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some((_, c)) = chars.next() {
                        match c {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => match chars.next() {
                                Some((_, escaped)) => value.push(escaped),
                                None => break,
                            },
                            other => value.push(other),
                        }
                    }
                    if !closed {
                        return Err(self.error(line, "unterminated quoted string"));
                    }
                    tokens.push(value);
                }
                '`' => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '`' {
                            closed = true;
                            break;
                        }
                        value.push(c);
                    }
                    if !closed {
                        return Err(self.error(line, "unterminated raw string"));
                    }
                    tokens.push(value);
                }
                _ => {
                    let start = pos;
                    let mut end = raw.len();
                    while let Some(&(p, c)) = chars.peek() {
                        if c.is_whitespace()
                            || matches!(c, '(' | ')' | '"' | '`')
                            || raw[p..].starts_with("//")
                            || raw[p..].starts_with("=>")
                        {
                            end = p;
                            break;
                        }
                        chars.next();
                    }
                    tokens.push(raw[start..end].to_string());
                }
            }
        }

        Ok((tokens, None))
    }

    fn apply(
        &mut self,
        verb: &str,
        args: &[String],
        comment: Option<&str>,
        line: usize,
    ) -> Result<(), ChangedPkgsError> {
        match verb {
            "module" => {
                let [path] = args else {
                    return Err(self.error(line, "usage: module module/path"));
                };
                self.snapshot.module = Some(path.clone());
            }
            "go" | "toolchain" | "tool" | "ignore" => {
                if args.len() != 1 {
                    return Err(self.error(line, format!("usage: {verb} <value>")));
                }
            }
            "godebug" | "retract" => {
                if args.is_empty() {
                    return Err(self.error(line, format!("usage: {verb} <value>")));
                }
            }
            "exclude" => {
                if args.len() != 2 {
                    return Err(self.error(line, "usage: exclude module/path v1.2.3"));
                }
            }
            "require" => {
                let [module, version] = args else {
                    return Err(self.error(line, "usage: require module/path v1.2.3"));
                };
                self.snapshot.requirements.push(Requirement {
                    module: module.clone(),
                    version: version.clone(),
                    indirect: is_indirect(comment),
                });
            }
            "replace" => {
                let replacement = self.replacement(args, line)?;
                let key = (
                    replacement.source.clone(),
                    replacement.source_version.clone(),
                );
                if let Some(target) = self.replaced.get(&key) {
                    if *target == replacement.target {
                        return Ok(());
                    }
                    let source = match &replacement.source_version {
                        Some(version) => format!("{}@{version}", replacement.source),
                        None => replacement.source.clone(),
                    };
                    return Err(self.error(
                        line,
                        format!("conflicting replacements for {source}"),
                    ));
                }
                self.replaced.insert(key, replacement.target.clone());
                self.snapshot.replacements.push(replacement);
            }
            other => return Err(self.error(line, format!("unknown directive: {other}"))),
        }
        Ok(())
    }

    fn replacement(&self, args: &[String], line: usize) -> Result<Replacement, ChangedPkgsError> {
        const USAGE: &str = "usage: replace module/path [v1.2.3] => other/module v1.4\n\t or replace module/path [v1.2.3] => ../local/directory";

        let arrow = args
            .iter()
            .position(|tok| tok == "=>")
            .ok_or_else(|| self.error(line, USAGE))?;
        let (source, source_version) = match &args[..arrow] {
            [path] => (path.clone(), None),
            [path, version] => (path.clone(), Some(version.clone())),
            _ => return Err(self.error(line, USAGE)),
        };

        let target = match &args[arrow + 1..] {
            [path] => {
                if !is_directory_path(path) {
                    return Err(self.error(
                        line,
                        "replacement module without version must be directory path (rooted or starting with ./ or ../)",
                    ));
                }
                ModuleVersion {
                    path: path.clone(),
                    version: None,
                }
            }
            [path, version] => {
                if is_directory_path(path) {
                    return Err(self.error(
                        line,
                        "replacement module directory path cannot have version",
                    ));
                }
                ModuleVersion {
                    path: path.clone(),
                    version: Some(version.clone()),
                }
            }
            _ => return Err(self.error(line, USAGE)),
        };

        Ok(Replacement {
            source,
            source_version,
            target,
        })
    }
}

fn is_indirect(comment: Option<&str>) -> bool {
    match comment {
        Some(text) => text == "indirect" || text.starts_with("indirect;"),
        None => false,
    }
}

fn is_directory_path(path: &str) -> bool {
    path == "."
        || path == ".."
        || path.starts_with("./")
        || path.starts_with("../")
        || path.starts_with('/')
        || path.starts_with(".\\")
        || path.starts_with("..\\")
        || path.as_bytes().get(1) == Some(&b':')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"// service manifest
module example.com/service

go 1.22

toolchain go1.22.3

require example.com/single v0.3.0

require (
	example.com/lib v1.2.3
	"example.com/quoted" v0.0.1 // indirect
	example.com/other v2.0.0+incompatible // indirect; pinned
)

exclude example.com/lib v1.2.2

replace (
	example.com/other => example.com/other-fork v2.0.1
	example.com/local v1.0.0 => ../local
)

retract [v0.1.0, v0.1.5]
"#;

    fn parse(text: &str) -> Result<ManifestSnapshot, ChangedPkgsError> {
        parse_manifest("go.mod", text.as_bytes())
    }

    fn message(err: ChangedPkgsError) -> String {
        match err {
            ChangedPkgsError::Manifest { message, .. } => message,
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn parses_requirements_and_replacements() {
        let snap = parse(SAMPLE).expect("sample parses");

        assert_eq!(snap.module.as_deref(), Some("example.com/service"));
        let modules: Vec<_> = snap
            .requirements
            .iter()
            .map(|req| (req.module.as_str(), req.version.as_str(), req.indirect))
            .collect();
        assert_eq!(
            modules,
            vec![
                ("example.com/single", "v0.3.0", false),
                ("example.com/lib", "v1.2.3", false),
                ("example.com/quoted", "v0.0.1", true),
                ("example.com/other", "v2.0.0+incompatible", true),
            ]
        );

        let fork = snap.replacement("example.com/other").expect("fork replace");
        assert_eq!(fork.source_version, None);
        assert_eq!(fork.target.path, "example.com/other-fork");
        assert_eq!(fork.target.version.as_deref(), Some("v2.0.1"));

        let local = snap.replacement("example.com/local").expect("local replace");
        assert_eq!(local.source_version.as_deref(), Some("v1.0.0"));
        assert_eq!(local.target.path, "../local");
        assert_eq!(local.target.version, None);
    }

    #[test]
    fn empty_input_is_an_empty_snapshot() {
        let snap = parse("").unwrap();
        assert_eq!(snap, ManifestSnapshot::default());
    }

    #[test]
    fn single_line_replace_without_spaces_around_arrow() {
        let snap = parse("module m\nreplace example.com/a=>example.com/b v1.0.0\n").unwrap();
        let rep = snap.replacement("example.com/a").unwrap();
        assert_eq!(rep.target.path, "example.com/b");
    }

    #[test]
    fn empty_block_on_one_line_is_accepted() {
        let snap = parse("module m\nrequire ()\n").unwrap();
        assert!(snap.requirements.is_empty());
    }

    #[test]
    fn rejects_unknown_directive() {
        let err = parse("module m\nfrobnicate x\n").unwrap_err();
        assert!(message(err).contains("unknown directive: frobnicate"));
    }

    #[test]
    fn rejects_requirement_without_version() {
        let err = parse("module m\nrequire example.com/lib\n").unwrap_err();
        match err {
            ChangedPkgsError::Manifest { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.starts_with("usage: require"));
            }
            other => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_block() {
        let err = parse("module m\nrequire (\n\texample.com/lib v1.0.0\n").unwrap_err();
        assert!(message(err).contains("unterminated require block"));
    }

    #[test]
    fn rejects_unterminated_quote() {
        let err = parse("module \"example.com/m\n").unwrap_err();
        assert!(message(err).contains("unterminated quoted string"));
    }

    #[test]
    fn rejects_replace_without_arrow() {
        let err = parse("replace example.com/a example.com/b v1.0.0\n").unwrap_err();
        assert!(message(err).starts_with("usage: replace"));
    }

    #[test]
    fn rejects_module_target_without_version() {
        let err = parse("replace example.com/a => example.com/b\n").unwrap_err();
        assert!(message(err).contains("must be directory path"));
    }

    #[test]
    fn rejects_directory_target_with_version() {
        let err = parse("replace example.com/a => ../a v1.0.0\n").unwrap_err();
        assert!(message(err).contains("cannot have version"));
    }

    #[test]
    fn version_specific_replacements_of_one_path_coexist() {
        let snap = parse(
            "module m\n\nreplace example.com/a v1.0.0 => ../a1\nreplace example.com/a v1.1.0 => ../a2\nreplace example.com/a => ../a3\n",
        )
        .expect("distinct source versions parse");
        let targets: Vec<_> = snap
            .replacements
            .iter()
            .map(|rep| (rep.source_version.as_deref(), rep.target.path.as_str()))
            .collect();
        assert_eq!(
            targets,
            vec![
                (Some("v1.0.0"), "../a1"),
                (Some("v1.1.0"), "../a2"),
                (None, "../a3"),
            ]
        );
        assert_eq!(
            snap.replacement("example.com/a").map(|rep| rep.target.path.as_str()),
            Some("../a3")
        );
    }

    #[test]
    fn repeated_identical_replacement_is_kept_once() {
        let snap = parse(
            "module m\nreplace example.com/a v1.0.0 => ../a\nreplace example.com/a v1.0.0 => ../a\n",
        )
        .unwrap();
        assert_eq!(snap.replacements.len(), 1);
    }

    #[test]
    fn rejects_conflicting_replacement_of_same_version() {
        let err = parse(
            "replace example.com/a v1.0.0 => ../a\nreplace example.com/a v1.0.0 => ../b\n",
        )
        .unwrap_err();
        assert!(message(err).contains("conflicting replacements for example.com/a@v1.0.0"));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = parse_manifest("go.mod", &[0x6d, 0xff, 0xfe]).unwrap_err();
        assert!(message(err).contains("invalid UTF-8"));
    }
}
