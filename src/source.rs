use std::path::{Path, PathBuf};

use swc_core::{
    common::{comments::SingleThreadedComments, sync::Lrc, FileName, SourceMap},
    ecma::{
        ast::{EsVersion, Module},
        codegen::{text_writer::JsWriter, Config, Emitter},
        parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax},
    },
};
use tracing::debug;

use crate::error::{InstrumentError, Result};

// -----------------------------------------------------------------------------
// Source files & dialects
// -----------------------------------------------------------------------------

/// Language flags picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub typescript: bool,
    pub jsx: bool,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "ts" | "mts" | "cts" => Dialect { typescript: true, jsx: false },
            "tsx" => Dialect { typescript: true, jsx: true },
            // React Native projects routinely put JSX in plain .js files.
            _ => Dialect { typescript: false, jsx: true },
        }
    }

    fn syntax(self) -> Syntax {
        if self.typescript {
            Syntax::Typescript(TsSyntax {
                tsx: self.jsx,
                decorators: true,
                ..Default::default()
            })
        } else {
            Syntax::Es(EsSyntax {
                jsx: self.jsx,
                decorators: true,
                ..Default::default()
            })
        }
    }

    /// Second dialect to try when the first one rejects the file.
    fn alternate(self) -> Option<Dialect> {
        match (self.typescript, self.jsx) {
            (true, true) => None,
            // .ts with markup, or .js with type annotations
            _ => Some(Dialect { typescript: true, jsx: true }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub dialect: Dialect,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let dialect = Dialect::from_path(&path);
        Self { path, text: text.into(), dialect }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| InstrumentError::read(path, e))?;
        Ok(Self::new(path, text))
    }

    pub fn len(&self) -> u64 {
        self.text.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_oversize(&self, limit: u64) -> bool {
        self.len() > limit
    }
}

// -----------------------------------------------------------------------------
// Parser
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub message: String,
}

/// A parsed module together with everything the printer needs to re-emit it.
pub struct ParsedModule {
    pub module: Module,
    pub comments: SingleThreadedComments,
    pub dialect: Dialect,
    cm: Lrc<SourceMap>,
}

pub fn parse(file: &SourceFile) -> std::result::Result<ParsedModule, ParseFailure> {
    match parse_as(file, file.dialect) {
        Ok(parsed) => Ok(parsed),
        Err(first) => match file.dialect.alternate() {
            Some(alt) => {
                debug!(path = %file.path.display(), error = %first.message, "retrying with tsx dialect");
                parse_as(file, alt).map_err(|_| first)
            }
            None => Err(first),
        },
    }
}

fn parse_as(file: &SourceFile, dialect: Dialect) -> std::result::Result<ParsedModule, ParseFailure> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Real(file.path.clone())), file.text.clone());
    let comments = SingleThreadedComments::default();

    let module = {
        let lexer = Lexer::new(
            dialect.syntax(),
            EsVersion::latest(),
            StringInput::from(&*fm),
            Some(&comments),
        );
        let mut parser = Parser::new_from(lexer);
        let module = parser.parse_module().map_err(|e| ParseFailure {
            message: format!("{:?}", e.kind()),
        })?;
        // recoverable errors are tolerated
        let recovered = parser.take_errors();
        if !recovered.is_empty() {
            debug!(path = %file.path.display(), count = recovered.len(), "parsed with recoverable errors");
        }
        module
    };

    Ok(ParsedModule { module, comments, dialect, cm })
}

// -----------------------------------------------------------------------------
// Printer
// -----------------------------------------------------------------------------

impl ParsedModule {
    pub fn print(&self) -> std::io::Result<String> {
        let mut buf = Vec::new();
        {
            let wr = JsWriter::new(self.cm.clone(), "\n", &mut buf, None);
            let mut emitter = Emitter {
                cfg: Config::default().with_target(EsVersion::latest()),
                comments: Some(&self.comments),
                cm: self.cm.clone(),
                wr,
            };
            emitter.emit_module(&self.module)?;
        }
        String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_follows_extension() {
        assert_eq!(Dialect::from_path(Path::new("a/B.tsx")), Dialect { typescript: true, jsx: true });
        assert_eq!(Dialect::from_path(Path::new("a/b.ts")), Dialect { typescript: true, jsx: false });
        assert_eq!(Dialect::from_path(Path::new("a/B.js")), Dialect { typescript: false, jsx: true });
    }

    #[test]
    fn parses_typed_markup() {
        let file = SourceFile::new(
            "Card.tsx",
            "type Props = { title: string };\nexport const Card = ({ title }: Props) => <Text>{title}</Text>;\n",
        );
        let parsed = parse(&file).unwrap();
        assert_eq!(parsed.module.body.len(), 2);
    }

    #[test]
    fn ts_file_with_markup_is_retried_as_tsx() {
        let file = SourceFile::new("Card.ts", "export const Card = () => <View />;\n");
        let parsed = parse(&file).unwrap();
        assert!(parsed.dialect.jsx);
    }

    #[test]
    fn garbage_fails() {
        let file = SourceFile::new("Broken.tsx", "export function Broken( {{{ return <View");
        assert!(parse(&file).is_err());
    }

    #[test]
    fn printer_keeps_comments() {
        let file = SourceFile::new("Note.jsx", "// heading\nexport const x = 1;\n");
        let parsed = parse(&file).unwrap();
        let out = parsed.print().unwrap();
        assert!(out.contains("// heading"));
        assert!(out.contains("export const x = 1;"));
    }
}
