//! Schematic documents (`.kicad_sch` files) as a sequence of top-level
//! blocks.
//!
//! Parsing never rewrites anything. Each top-level list is captured as a
//! [`Block`] holding its exact source text, so the document can always be
//! reproduced byte for byte, and the kinds of blocks that matter for wiring
//! additionally carry their parsed fields.

use kicad_sexpr_lexer::{DefaultKeywords, Lexer, Span, Token, TokenKind};
use log::trace;

use crate::{convert::FromSexpr, convert::Parser, AutowireError, Diagnostic, SexprKind};

pub use self::{
    component::{ComponentInstance, LibraryPin, LibrarySymbol},
    element::{
        Element, GlobalLabel, Junction, Label, LabelShape, NoConnect, PowerSymbol, Wire,
        POWER_LIBRARY,
    },
};

mod component;
mod element;

/// The first file format version written by KiCad 8
const KICAD8_VERSION: f64 = 20231120.0;

/// Which KiCad release wrote the document. The two differ in small details
/// of the syntax, most visibly in whether `uuid` values are quoted.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Dialect {
    KiCad7,
    #[default]
    KiCad8,
}

/// How new blocks have to be written to blend in with the document.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DocumentStyle {
    /// One level of indentation
    pub indent: String,
    pub dialect: Dialect,
}

impl Default for DocumentStyle {
    fn default() -> Self {
        Self {
            indent: "\t".to_string(),
            dialect: Dialect::KiCad8,
        }
    }
}

impl DocumentStyle {
    pub fn kicad7() -> Self {
        Self {
            dialect: Dialect::KiCad7,
            ..Self::default()
        }
    }

    pub fn is_kicad7(&self) -> bool {
        self.dialect == Dialect::KiCad7
    }

    pub fn quoted_uuids(&self) -> bool {
        self.dialect == Dialect::KiCad8
    }

    fn detect(source: &str, tokens: &[Token<'_>]) -> Self {
        let indent = source
            .lines()
            .find_map(|line| {
                let trimmed = line.trim_start();
                let leading = &line[..line.len() - trimmed.len()];

                (!leading.is_empty() && trimmed.starts_with('(')).then_some(leading)
            })
            .map(|leading| {
                if leading.starts_with('\t') {
                    "\t".to_string()
                } else {
                    leading.to_string()
                }
            })
            .unwrap_or_else(|| "\t".to_string());

        let dialect = tokens
            .windows(3)
            .find_map(|window| match (window[0].kind, window[1].kind, window[2].kind) {
                (TokenKind::OpenParen, TokenKind::Symbol("uuid"), TokenKind::String(_)) => {
                    Some(Dialect::KiCad8)
                }
                (TokenKind::OpenParen, TokenKind::Symbol("uuid"), TokenKind::Symbol(_)) => {
                    Some(Dialect::KiCad7)
                }
                _ => None,
            })
            .or_else(|| {
                tokens.windows(3).find_map(|window| {
                    match (window[0].kind, window[1].kind, window[2].kind) {
                        (
                            TokenKind::OpenParen,
                            TokenKind::Symbol("version"),
                            TokenKind::Number(version),
                        ) if version < KICAD8_VERSION => Some(Dialect::KiCad7),
                        (TokenKind::OpenParen, TokenKind::Symbol("version"), TokenKind::Number(_)) => {
                            Some(Dialect::KiCad8)
                        }
                        _ => None,
                    }
                })
            })
            .unwrap_or_default();

        Self { indent, dialect }
    }
}

/// What a top-level block is, with its parsed fields.
#[derive(Debug, PartialEq, Clone)]
pub enum BlockKind {
    ComponentInstance(ComponentInstance),
    Wire(Wire),
    Label(Label),
    GlobalLabel(GlobalLabel),
    Junction(Junction),
    NoConnect(NoConnect),
    /// A `lib_symbols` container, or a bare library symbol definition
    LibrarySymbolDefs(Vec<LibrarySymbol>),
    /// Anything else, carried through untouched
    Other,
}

/// One top-level list of the document.
#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    /// Byte range of the block in the document, parentheses included
    pub span: Span,
    /// 1-based line the block starts on
    pub line: usize,
    /// The symbol right after the opening parenthesis, if there is one
    pub keyword: Option<String>,
    pub text: String,
    pub kind: BlockKind,
}

impl Block {
    fn read(
        source: &str,
        span: Span,
        line: usize,
        keyword: Option<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let text = span.slice(source).to_string();

        let kind = match classify(keyword.as_deref(), &text, line, diagnostics) {
            Ok(kind) => kind,
            Err(error) => {
                Diagnostic::UnreadableBlock {
                    keyword: keyword.clone().unwrap_or_default(),
                    line,
                    reason: error.to_string(),
                }
                .record(diagnostics);

                BlockKind::Other
            }
        };

        Self {
            span,
            line,
            keyword,
            text,
            kind,
        }
    }
}

fn classify(
    keyword: Option<&str>,
    text: &str,
    line: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<BlockKind, AutowireError> {
    let Some(keyword) = keyword else {
        return Ok(BlockKind::Other);
    };

    if !matches!(
        keyword,
        "symbol" | "wire" | "label" | "global_label" | "junction" | "no_connect" | "lib_symbols"
    ) {
        return Ok(BlockKind::Other);
    }

    let list = kicad_sexpr::from_str(text)?
        .take_list()
        .ok_or(AutowireError::UnexpectedSexprType {
            expected: SexprKind::List,
        })?;

    Ok(match keyword {
        "symbol" if LibrarySymbol::is_definition(&list) => {
            BlockKind::LibrarySymbolDefs(vec![LibrarySymbol::from_sexpr(Parser::new(list))?])
        }
        "symbol" => {
            let component = ComponentInstance::from_sexpr(Parser::new(list))?;

            if component.reference.is_none() {
                Diagnostic::MissingReference {
                    library_id: component.library_id.to_string(),
                    line,
                }
                .record(diagnostics);
            }

            BlockKind::ComponentInstance(component)
        }
        "lib_symbols" => {
            let mut symbols = Vec::new();

            // Broken definitions are skipped one at a time
            for definition in Parser::new(list).find_all("symbol") {
                match LibrarySymbol::from_sexpr(definition) {
                    Ok(symbol) => symbols.push(symbol),
                    Err(error) => Diagnostic::UnreadableBlock {
                        keyword: "lib_symbols".to_string(),
                        line,
                        reason: error.to_string(),
                    }
                    .record(diagnostics),
                }
            }

            BlockKind::LibrarySymbolDefs(symbols)
        }
        "wire" => BlockKind::Wire(Wire::from_sexpr(Parser::new(list))?),
        "label" => BlockKind::Label(Label::from_sexpr(Parser::new(list))?),
        "global_label" => BlockKind::GlobalLabel(GlobalLabel::from_sexpr(Parser::new(list))?),
        "junction" => BlockKind::Junction(Junction::from_sexpr(Parser::new(list))?),
        "no_connect" => BlockKind::NoConnect(NoConnect::from_sexpr(Parser::new(list))?),
        _ => BlockKind::Other,
    })
}

/// The list wrapping the whole file, e.g. `(kicad_sch ...)`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Root {
    pub keyword: String,
    pub span: Span,
}

impl Root {
    /// Byte offset of the final closing parenthesis
    pub fn closing_paren(&self) -> usize {
        self.span.end - 1
    }
}

/// A piece of the document, see [`Document::pieces`].
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Piece<'a> {
    /// Text between blocks, including the root list's own delimiters
    Text(&'a str),
    Block(&'a Block),
}

macro_rules! block_query {
    ($fn_name:ident, $variant:ident, $item:ty) => {
        pub fn $fn_name(&self) -> impl Iterator<Item = &$item> {
            self.blocks.iter().filter_map(|block| match &block.kind {
                BlockKind::$variant(value) => Some(value),
                _ => None,
            })
        }
    };
}

/// A parsed schematic document.
#[derive(Debug, PartialEq, Clone)]
pub struct Document {
    source: String,
    root: Option<Root>,
    blocks: Vec<Block>,
    style: DocumentStyle,
    diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Splits a document into top-level blocks.
    ///
    /// When the whole file is wrapped in a single list (as every KiCad file
    /// is), the blocks are the children of that list. Unbalanced parentheses
    /// and unterminated strings are fatal, since no block boundary could be
    /// trusted after them.
    pub fn parse(source: &str) -> Result<Self, AutowireError> {
        let tokens = tokenize(source)?;
        let root = find_root(&tokens);
        let top_depth = usize::from(root.is_some());

        let mut blocks = Vec::new();
        let mut diagnostics = Vec::new();
        let mut lines = LineCounter::default();

        let mut depth = 0;
        let mut start = None;

        for (index, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::OpenParen => {
                    if depth == top_depth {
                        start = Some((token.span.start, index));
                    }

                    depth += 1;
                }
                TokenKind::CloseParen => {
                    depth -= 1;

                    if depth != top_depth {
                        continue;
                    }

                    let Some((block_start, first)) = start.take() else {
                        continue;
                    };

                    let keyword = tokens
                        .get(first + 1)
                        .and_then(|t| t.kind.as_symbol())
                        .map(ToString::to_string);

                    let span = Span::new(block_start, token.span.end);
                    let line = lines.line_at(source, block_start);

                    trace!(
                        "block `{}` at line {line} ({} bytes)",
                        keyword.as_deref().unwrap_or_default(),
                        span.len()
                    );

                    blocks.push(Block::read(source, span, line, keyword, &mut diagnostics));
                }
                _ => {}
            }
        }

        let style = DocumentStyle::detect(source, &tokens);

        Ok(Self {
            source: source.to_string(),
            root: root.map(|(keyword, span)| Root {
                keyword: keyword.to_string(),
                span,
            }),
            blocks,
            style,
            diagnostics,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Option<&Root> {
        self.root.as_ref()
    }

    pub fn style(&self) -> &DocumentStyle {
        &self.style
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Problems found while reading individual blocks
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The document as alternating inter-block text and blocks, in order.
    pub fn pieces(&self) -> Vec<Piece<'_>> {
        let mut pieces = Vec::with_capacity(self.blocks.len() * 2 + 1);
        let mut position = 0;

        for block in &self.blocks {
            if block.span.start > position {
                pieces.push(Piece::Text(&self.source[position..block.span.start]));
            }

            pieces.push(Piece::Block(block));
            position = block.span.end;
        }

        if position < self.source.len() {
            pieces.push(Piece::Text(&self.source[position..]));
        }

        pieces
    }

    /// Concatenates every piece, which reproduces the original text.
    pub fn to_source(&self) -> String {
        self.pieces()
            .into_iter()
            .map(|piece| match piece {
                Piece::Text(text) => text,
                Piece::Block(block) => block.text.as_str(),
            })
            .collect()
    }

    pub fn blocks_with_keyword<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Block> {
        self.blocks
            .iter()
            .filter(move |block| block.keyword.as_deref() == Some(keyword))
    }

    block_query!(components, ComponentInstance, ComponentInstance);
    block_query!(wires, Wire, Wire);
    block_query!(labels, Label, Label);
    block_query!(global_labels, GlobalLabel, GlobalLabel);
    block_query!(junctions, Junction, Junction);
    block_query!(no_connects, NoConnect, NoConnect);

    pub fn library_symbols(&self) -> impl Iterator<Item = &LibrarySymbol> {
        self.blocks
            .iter()
            .filter_map(|block| match &block.kind {
                BlockKind::LibrarySymbolDefs(symbols) => Some(symbols),
                _ => None,
            })
            .flatten()
    }
}

/// Lexes the whole document, checking that parentheses balance.
fn tokenize(source: &str) -> Result<Vec<Token<'_>>, AutowireError> {
    let mut tokens = Vec::new();
    let mut open = Vec::new();

    for token in Lexer::<DefaultKeywords>::new(source) {
        let token = token.map_err(|e| AutowireError::MalformedDocument {
            message: e.kind.to_string(),
            line: e.line_number,
            column: e.column_number,
        })?;

        match token.kind {
            TokenKind::OpenParen => open.push(token.span.start),
            TokenKind::CloseParen => {
                if open.pop().is_none() {
                    return Err(malformed(
                        source,
                        token.span.start,
                        "closing parenthesis without a matching opening parenthesis",
                    ));
                }
            }
            _ => {}
        }

        tokens.push(token);
    }

    if let Some(&unclosed) = open.first() {
        return Err(malformed(
            source,
            unclosed,
            "opening parenthesis is never closed",
        ));
    }

    Ok(tokens)
}

fn malformed(source: &str, offset: usize, message: &str) -> AutowireError {
    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);

    AutowireError::MalformedDocument {
        message: message.to_string(),
        line: before.matches('\n').count() + 1,
        column: before[line_start..].chars().count() + 1,
    }
}

/// File roots are named `kicad_sch`, `kicad_symbol_lib` and so on. Any
/// other single list, such as a lone `(wire ...)`, is a block of its own.
fn is_file_root(keyword: &str) -> bool {
    keyword.starts_with("kicad_")
}

/// Returns the keyword and span of the file root list wrapping the whole
/// token stream, if there is one.
fn find_root<'a>(tokens: &[Token<'a>]) -> Option<(&'a str, Span)> {
    let (first, last) = (tokens.first()?, tokens.last()?);
    let keyword = tokens.get(1)?.kind.as_symbol()?;

    if !first.kind.is_open_paren() || !is_file_root(keyword) {
        return None;
    }

    let mut depth = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;

                if depth == 0 {
                    return (index == tokens.len() - 1)
                        .then(|| (keyword, Span::new(first.span.start, last.span.end)));
                }
            }
            _ => {}
        }
    }

    None
}

/// Turns increasing byte offsets into line numbers without rescanning.
#[derive(Debug, Default)]
struct LineCounter {
    offset: usize,
    line: usize,
}

impl LineCounter {
    fn line_at(&mut self, source: &str, offset: usize) -> usize {
        self.line += source[self.offset..offset].matches('\n').count();
        self.offset = offset;

        self.line + 1
    }
}
