pub mod ast;
pub mod builtin;
pub mod compiler;
pub mod interpreter;
pub mod lexer;
pub mod natives;
pub mod parser;
pub mod value;

use crate::battle::Code;
use interpreter::Interpreter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

pub use compiler::Program;
pub use natives::Host;
pub use value::Value;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Type,
    Reference,
    Range,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    /// Source line, or 0 when unknown.
    pub line: usize,
    pub msg: String,
}

impl Error {
    pub fn syntax(line: usize, msg: &str) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            line,
            msg: msg.to_string(),
        }
    }

    pub fn type_error(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Type,
            line: 0,
            msg: msg.to_string(),
        }
    }

    pub fn reference_error(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Reference,
            line: 0,
            msg: msg.to_string(),
        }
    }

    pub fn range_error(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Range,
            line: 0,
            msg: msg.to_string(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Range => "RangeError",
        };
        write!(f, "{} at line {}: {}", kind, self.line, self.msg)
    }
}

impl std::error::Error for Error {}

pub fn compile(source: &str) -> Result<Rc<Program>, Error> {
    let tokens = lexer::tokenize(source)?;
    let script = parser::parse(tokens)?;
    Ok(Rc::new(compiler::compile(&script)?))
}

/// Returns `None` for avatars that have no script.
pub fn new_avatar_controller(code: &Code, seed: u64) -> Result<Option<AvatarController>, Error> {
    match code {
        Code::None => Ok(None),
        Code::Js(source) => AvatarController::create(source, seed).map(Some),
        Code::Builtin(name) => match builtin::load_source(name) {
            Ok(code) => new_avatar_controller(&code, seed),
            Err(msg) => Err(Error::reference_error(&msg)),
        },
    }
}

pub struct AvatarController {
    interpreter: Interpreter,
}

impl AvatarController {
    pub fn create(source: &str, seed: u64) -> Result<AvatarController, Error> {
        let program = compile(source)?;
        log::debug!("Compiled script to {} ops", program.op_count());
        Ok(AvatarController {
            interpreter: Interpreter::new(program, seed),
        })
    }

    /// Runs one interpreter step against the avatar's primitives.
    pub fn step(&mut self, host: &mut dyn Host) -> Result<(), Error> {
        self.interpreter.step(host).map(|_| ())
    }

    pub fn is_done(&self) -> bool {
        self.interpreter.is_done()
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.interpreter.global(name)
    }
}
