//! Single-pass C compiler: lex, parse-and-elaborate, generate. No separate
//! IR or optimization pass; each translation unit flows straight from
//! source text to GNU assembler text.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod obj;
pub mod parser;
pub mod scope;
pub mod token;
pub mod ty;

use anyhow::Result;
use log::info;

use token::SourceFile;

/// Compiles one translation unit to GNU assembler text.
pub fn compile(src: &SourceFile) -> Result<String> {
    info!("compiling {}", src.name);
    let toks = token::tokenize(src)?;
    let mut p = parser::Parser::new(src, toks);
    p.parse_program()?;
    codegen::emit(&p.types, &p.nodes, &p.objs, &p.globals)
}
