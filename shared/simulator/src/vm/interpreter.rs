use super::ast::{BinaryOp, UnaryOp};
use super::compiler::{Chunk, Op, Program};
use super::natives::{self, Host};
use super::value::Value;
use super::Error;
use crate::rng::{new_rng, SeededRng};
use std::cmp::Ordering;
use std::rc::Rc;

pub const MAX_CALL_DEPTH: usize = 256;

/// Longest string, in bytes, a script may build.
pub const MAX_STRING_LENGTH: usize = 1 << 20;

struct Frame {
    /// `None` for the top-level script.
    function: Option<usize>,
    ip: usize,
    base: usize,
}

/// Executes a compiled program one op at a time so that the battle can
/// interleave many scripts within a tick.
pub struct Interpreter {
    program: Rc<Program>,
    globals: Vec<Option<Value>>,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    rng: SeededRng,
}

impl Interpreter {
    pub fn new(program: Rc<Program>, seed: u64) -> Self {
        let globals = program.globals.iter().map(|g| g.init.clone()).collect();
        Self {
            program,
            globals,
            stack: Vec::new(),
            frames: vec![Frame {
                function: None,
                ip: 0,
                base: 0,
            }],
            rng: new_rng(seed),
        }
    }

    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }

    /// Reads a global by name. Used by tests and debugging tools.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.program
            .globals
            .iter()
            .position(|g| g.name.as_str() == name)
            .and_then(|index| self.globals[index].clone())
    }

    fn chunk(&self, function: Option<usize>) -> &Chunk {
        match function {
            Some(index) => &self.program.functions[index].chunk,
            None => &self.program.main,
        }
    }

    /// Executes a single op. Returns false once the script has finished.
    pub fn step(&mut self, host: &mut dyn Host) -> Result<bool, Error> {
        let (function, ip) = match self.frames.last() {
            Some(frame) => (frame.function, frame.ip),
            None => return Ok(false),
        };
        let (op, line) = {
            let chunk = self.chunk(function);
            (chunk.ops[ip], chunk.lines[ip])
        };
        if let Some(frame) = self.frames.last_mut() {
            frame.ip += 1;
        }
        self.execute(op, host).map_err(|e| e.at_line(line))?;
        Ok(!self.frames.is_empty())
    }

    /// Steps until the script finishes or `max_steps` ops have run.
    pub fn run(&mut self, host: &mut dyn Host, max_steps: usize) -> Result<bool, Error> {
        for _ in 0..max_steps {
            if !self.step(host)? {
                return Ok(false);
            }
        }
        Ok(!self.frames.is_empty())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Undefined)
    }

    fn peek(&self) -> Value {
        self.stack.last().cloned().unwrap_or(Value::Undefined)
    }

    fn base(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.base)
    }

    fn jump(&mut self, target: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = target;
        }
    }

    fn execute(&mut self, op: Op, host: &mut dyn Host) -> Result<(), Error> {
        match op {
            Op::Number(n) => self.stack.push(Value::Number(n)),
            Op::Str(index) => self
                .stack
                .push(Value::Str(self.program.strings[index].clone())),
            Op::Undefined => self.stack.push(Value::Undefined),
            Op::Null => self.stack.push(Value::Null),
            Op::Bool(b) => self.stack.push(Value::Bool(b)),
            Op::GetGlobal(slot) => match &self.globals[slot] {
                Some(value) => self.stack.push(value.clone()),
                None => {
                    return Err(Error::reference_error(&format!(
                        "{} is not defined",
                        self.program.globals[slot].name
                    )))
                }
            },
            Op::SetGlobal(slot) => self.globals[slot] = Some(self.peek()),
            Op::GetLocal(slot) => {
                let value = self.stack[self.base() + slot].clone();
                self.stack.push(value);
            }
            Op::SetLocal(slot) => {
                let index = self.base() + slot;
                self.stack[index] = self.peek();
            }
            Op::TypeofGlobal(slot) => {
                let name = self.globals[slot]
                    .as_ref()
                    .map_or("undefined", Value::type_name);
                self.stack.push(Value::from(name));
            }
            Op::GetMember(index) => {
                let object = self.pop();
                let property = &self.program.strings[index];
                let value = match &object {
                    Value::Namespace(namespace) => natives::member(*namespace, property),
                    Value::Str(s) if &**property == "length" => {
                        Value::Number(s.chars().count() as f64)
                    }
                    Value::Undefined | Value::Null => {
                        return Err(Error::type_error(&format!(
                            "Cannot read property '{property}' of {object}"
                        )))
                    }
                    _ => Value::Undefined,
                };
                self.stack.push(value);
            }
            Op::Pop => {
                self.pop();
            }
            Op::Dup => self.stack.push(self.peek()),
            Op::Unary(op) => {
                let operand = self.pop();
                self.stack.push(unary(op, &operand));
            }
            Op::Binary(op) => {
                let right = self.pop();
                let left = self.pop();
                self.stack.push(binary(op, &left, &right)?);
            }
            Op::ToNumber => {
                let value = self.pop();
                self.stack.push(Value::Number(value.to_number()));
            }
            Op::Jump(target) => self.jump(target),
            Op::JumpIfFalse(target) => {
                if !self.pop().truthy() {
                    self.jump(target);
                }
            }
            Op::JumpIfFalseOrPop(target) => {
                if self.peek().truthy() {
                    self.pop();
                } else {
                    self.jump(target);
                }
            }
            Op::JumpIfTrueOrPop(target) => {
                if self.peek().truthy() {
                    self.jump(target);
                } else {
                    self.pop();
                }
            }
            Op::Call(argc) => self.call(argc, host)?,
            Op::Return => {
                let value = self.pop();
                if let Some(frame) = self.frames.pop() {
                    if frame.function.is_some() {
                        // Drops the arguments, locals and the callee itself.
                        self.stack.truncate(frame.base.saturating_sub(1));
                        self.stack.push(value);
                    } else {
                        self.stack.clear();
                    }
                }
            }
        }
        Ok(())
    }

    fn call(&mut self, argc: usize, host: &mut dyn Host) -> Result<(), Error> {
        let callee_index = self.stack.len() - argc - 1;
        match self.stack[callee_index].clone() {
            Value::Function(index) => {
                if self.frames.len() >= MAX_CALL_DEPTH {
                    return Err(Error::range_error("Maximum call stack size exceeded"));
                }
                let proto = &self.program.functions[index];
                let (params, locals) = (proto.params, proto.locals);
                let base = callee_index + 1;
                self.stack.truncate(base + argc.min(params));
                self.stack.resize(base + locals, Value::Undefined);
                self.frames.push(Frame {
                    function: Some(index),
                    ip: 0,
                    base,
                });
            }
            Value::Native(native) => {
                let args = self.stack.split_off(callee_index + 1);
                self.stack.pop();
                let result = natives::call(native, &args, host, &mut self.rng)?;
                self.stack.push(result);
            }
            other => {
                return Err(Error::type_error(&format!("{other} is not a function")));
            }
        }
        Ok(())
    }
}

fn unary(op: UnaryOp, operand: &Value) -> Value {
    match op {
        UnaryOp::Neg => Value::Number(-operand.to_number()),
        UnaryOp::Plus => Value::Number(operand.to_number()),
        UnaryOp::Not => Value::Bool(!operand.truthy()),
        UnaryOp::Typeof => Value::from(operand.type_name()),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn concat(left: &Value, right: &Value) -> Result<Value, Error> {
    let (left, right) = (left.to_string(), right.to_string());
    if left.len() + right.len() > MAX_STRING_LENGTH {
        return Err(Error::range_error("Invalid string length"));
    }
    Ok(Value::Str((left + right.as_str()).into()))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Error> {
    Ok(match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => concat(left, right)?,
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
    })
}
