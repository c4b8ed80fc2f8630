use super::ast::*;
use super::natives;
use super::value::Value;
use super::Error;
use std::collections::HashMap;
use std::rc::Rc;

/// One bytecode instruction. Executing one op is one interpreter step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    Number(f64),
    Str(usize),
    Undefined,
    Null,
    Bool(bool),
    GetGlobal(usize),
    /// Stores the top of the stack without popping it.
    SetGlobal(usize),
    GetLocal(usize),
    SetLocal(usize),
    TypeofGlobal(usize),
    GetMember(usize),
    Pop,
    Dup,
    Unary(UnaryOp),
    Binary(BinaryOp),
    ToNumber,
    Jump(usize),
    JumpIfFalse(usize),
    JumpIfFalseOrPop(usize),
    JumpIfTrueOrPop(usize),
    Call(usize),
    Return,
}

#[derive(Clone, Debug, Default)]
pub struct Chunk {
    pub ops: Vec<Op>,
    pub lines: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct FunctionProto {
    pub name: Name,
    pub params: usize,
    /// Parameters followed by hoisted variables.
    pub locals: usize,
    pub chunk: Chunk,
}

#[derive(Clone, Debug)]
pub struct GlobalSlot {
    pub name: Name,
    /// `None` until the script assigns it; reading it before then is a
    /// ReferenceError.
    pub init: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct Program {
    pub main: Chunk,
    pub functions: Vec<FunctionProto>,
    pub strings: Vec<Rc<str>>,
    pub globals: Vec<GlobalSlot>,
}

impl Program {
    pub fn op_count(&self) -> usize {
        self.main.ops.len() + self.functions.iter().map(|f| f.chunk.ops.len()).sum::<usize>()
    }
}

#[derive(Default)]
struct LoopContext {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

enum Slot {
    Local(usize),
    Global(usize),
}

struct Compiler {
    chunk: Chunk,
    functions: Vec<FunctionProto>,
    function_index: HashMap<Name, usize>,
    strings: Vec<Rc<str>>,
    string_index: HashMap<String, usize>,
    globals: Vec<Name>,
    global_index: HashMap<Name, usize>,
    declared: Vec<bool>,
    locals: Option<HashMap<Name, usize>>,
    loops: Vec<LoopContext>,
}

pub fn compile(script: &Script) -> Result<Program, Error> {
    let mut compiler = Compiler {
        chunk: Chunk::default(),
        functions: vec![],
        function_index: HashMap::new(),
        strings: vec![],
        string_index: HashMap::new(),
        globals: vec![],
        global_index: HashMap::new(),
        declared: vec![],
        locals: None,
        loops: vec![],
    };

    let mut decls = vec![];
    collect_functions(&script.body, &mut decls);
    for decl in decls.iter() {
        compiler.declare_global(&decl.name);
        compiler
            .function_index
            .insert(decl.name.clone(), compiler.functions.len());
        compiler.functions.push(FunctionProto {
            name: decl.name.clone(),
            params: decl.params.len(),
            locals: 0,
            chunk: Chunk::default(),
        });
    }
    let mut vars = vec![];
    collect_vars(&script.body, &mut vars);
    for name in vars.iter() {
        compiler.declare_global(name);
    }

    for decl in decls.iter() {
        compiler.function(decl)?;
    }
    for stmt in script.body.iter() {
        compiler.statement(stmt)?;
    }
    compiler.emit(Op::Undefined, 0);
    compiler.emit(Op::Return, 0);

    let globals = compiler
        .globals
        .iter()
        .zip(compiler.declared.iter())
        .map(|(name, declared)| {
            let init = if let Some(index) = compiler.function_index.get(name) {
                Some(Value::Function(*index))
            } else if let Some(value) = natives::global(name) {
                Some(value)
            } else if *declared {
                Some(Value::Undefined)
            } else {
                None
            };
            GlobalSlot {
                name: name.clone(),
                init,
            }
        })
        .collect();

    Ok(Program {
        main: compiler.chunk,
        functions: compiler.functions,
        strings: compiler.strings,
        globals,
    })
}

fn collect_functions<'a>(body: &'a [Stmt], out: &mut Vec<&'a FunctionDecl>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Function(decl) => out.push(decl),
            StmtKind::Block(body) => collect_functions(body, out),
            StmtKind::If {
                consequent,
                alternate,
                ..
            } => {
                collect_functions(std::slice::from_ref(consequent), out);
                if let Some(alternate) = alternate {
                    collect_functions(std::slice::from_ref(alternate), out);
                }
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::For { body, .. } => collect_functions(std::slice::from_ref(body), out),
            _ => {}
        }
    }
}

/// Names declared with `var` anywhere in `body`, not descending into
/// function declarations.
fn collect_vars(body: &[Stmt], out: &mut Vec<Name>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Var(decls) => {
                for (name, _) in decls {
                    if !out.contains(name) {
                        out.push(name.clone());
                    }
                }
            }
            StmtKind::Block(body) => collect_vars(body, out),
            StmtKind::If {
                consequent,
                alternate,
                ..
            } => {
                collect_vars(std::slice::from_ref(consequent), out);
                if let Some(alternate) = alternate {
                    collect_vars(std::slice::from_ref(alternate), out);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                collect_vars(std::slice::from_ref(body), out)
            }
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    collect_vars(std::slice::from_ref(init), out);
                }
                collect_vars(std::slice::from_ref(body), out);
            }
            _ => {}
        }
    }
}

fn contains_function(body: &[Stmt]) -> Option<usize> {
    let mut nested = vec![];
    collect_functions(body, &mut nested);
    nested.first().map(|decl| decl.line)
}

impl Compiler {
    fn emit(&mut self, op: Op, line: usize) -> usize {
        self.chunk.ops.push(op);
        self.chunk.lines.push(line);
        self.chunk.ops.len() - 1
    }

    fn here(&self) -> usize {
        self.chunk.ops.len()
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.chunk.ops[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::JumpIfFalseOrPop(t) | Op::JumpIfTrueOrPop(t) => {
                *t = target
            }
            op => unreachable!("patching non-jump {:?}", op),
        }
    }

    fn string(&mut self, s: &str) -> usize {
        if let Some(index) = self.string_index.get(s) {
            return *index;
        }
        let index = self.strings.len();
        self.strings.push(s.into());
        self.string_index.insert(s.to_string(), index);
        index
    }

    fn global(&mut self, name: &Name) -> usize {
        if let Some(index) = self.global_index.get(name) {
            return *index;
        }
        let index = self.globals.len();
        self.globals.push(name.clone());
        self.declared.push(false);
        self.global_index.insert(name.clone(), index);
        index
    }

    fn declare_global(&mut self, name: &Name) {
        let index = self.global(name);
        self.declared[index] = true;
    }

    fn resolve(&mut self, name: &Name) -> Slot {
        if let Some(slot) = self.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Slot::Local(*slot);
        }
        Slot::Global(self.global(name))
    }

    fn emit_get(&mut self, name: &Name, line: usize) {
        let op = match self.resolve(name) {
            Slot::Local(slot) => Op::GetLocal(slot),
            Slot::Global(slot) => Op::GetGlobal(slot),
        };
        self.emit(op, line);
    }

    fn emit_set(&mut self, name: &Name, line: usize) {
        let op = match self.resolve(name) {
            Slot::Local(slot) => Op::SetLocal(slot),
            Slot::Global(slot) => Op::SetGlobal(slot),
        };
        self.emit(op, line);
    }

    fn function(&mut self, decl: &FunctionDecl) -> Result<(), Error> {
        if let Some(line) = contains_function(&decl.body) {
            return Err(Error::syntax(
                line,
                "Function declarations are only allowed at the top level",
            ));
        }

        let mut locals = HashMap::new();
        for param in decl.params.iter() {
            let next = locals.len();
            locals.entry(param.clone()).or_insert(next);
        }
        let mut vars = vec![];
        collect_vars(&decl.body, &mut vars);
        let mut count = decl.params.len();
        for name in vars {
            if !locals.contains_key(&name) {
                locals.insert(name, count);
                count += 1;
            }
        }

        let outer_chunk = std::mem::take(&mut self.chunk);
        let outer_loops = std::mem::take(&mut self.loops);
        self.locals = Some(locals);
        let result = decl.body.iter().try_for_each(|stmt| self.statement(stmt));
        self.emit(Op::Undefined, decl.line);
        self.emit(Op::Return, decl.line);
        self.locals = None;
        self.loops = outer_loops;
        let chunk = std::mem::replace(&mut self.chunk, outer_chunk);
        result?;

        let index = self.function_index[&decl.name];
        let proto = &mut self.functions[index];
        proto.locals = count;
        proto.chunk = chunk;
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::Var(decls) => {
                for (name, init) in decls {
                    if let Some(init) = init {
                        self.expression(init)?;
                        self.emit_set(name, line);
                        self.emit(Op::Pop, line);
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.expression(expr)?;
                self.emit(Op::Pop, line);
            }
            StmtKind::Block(body) => {
                for stmt in body {
                    self.statement(stmt)?;
                }
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.expression(test)?;
                let else_jump = self.emit(Op::JumpIfFalse(0), line);
                self.statement(consequent)?;
                if let Some(alternate) = alternate {
                    let end_jump = self.emit(Op::Jump(0), line);
                    self.patch(else_jump, self.here());
                    self.statement(alternate)?;
                    self.patch(end_jump, self.here());
                } else {
                    self.patch(else_jump, self.here());
                }
            }
            StmtKind::While { test, body } => {
                let start = self.here();
                self.expression(test)?;
                let exit = self.emit(Op::JumpIfFalse(0), line);
                self.loop_body(body)?;
                self.emit(Op::Jump(start), line);
                let end = self.here();
                self.patch(exit, end);
                self.finish_loop(start, end);
            }
            StmtKind::DoWhile { body, test } => {
                let start = self.here();
                self.loop_body(body)?;
                let continue_target = self.here();
                self.expression(test)?;
                let exit = self.emit(Op::JumpIfFalse(0), line);
                self.emit(Op::Jump(start), line);
                let end = self.here();
                self.patch(exit, end);
                self.finish_loop(continue_target, end);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init)?;
                }
                let start = self.here();
                let exit = match test {
                    Some(test) => {
                        self.expression(test)?;
                        Some(self.emit(Op::JumpIfFalse(0), line))
                    }
                    None => None,
                };
                self.loop_body(body)?;
                let continue_target = self.here();
                if let Some(update) = update {
                    self.expression(update)?;
                    self.emit(Op::Pop, line);
                }
                self.emit(Op::Jump(start), line);
                let end = self.here();
                if let Some(exit) = exit {
                    self.patch(exit, end);
                }
                self.finish_loop(continue_target, end);
            }
            StmtKind::Break => {
                let jump = self.emit(Op::Jump(0), line);
                self.current_loop(line)?.breaks.push(jump);
            }
            StmtKind::Continue => {
                let jump = self.emit(Op::Jump(0), line);
                self.current_loop(line)?.continues.push(jump);
            }
            StmtKind::Return(value) => {
                match value {
                    Some(value) => self.expression(value)?,
                    None => {
                        self.emit(Op::Undefined, line);
                    }
                }
                self.emit(Op::Return, line);
            }
            // Compiled up front by `compile`.
            StmtKind::Function(_) => {}
            StmtKind::Empty => {}
        }
        Ok(())
    }

    fn loop_body(&mut self, body: &Stmt) -> Result<(), Error> {
        self.loops.push(LoopContext::default());
        self.statement(body)
    }

    fn current_loop(&mut self, line: usize) -> Result<&mut LoopContext, Error> {
        self.loops
            .last_mut()
            .ok_or_else(|| Error::syntax(line, "Jump outside of a loop"))
    }

    fn finish_loop(&mut self, continue_target: usize, end: usize) {
        if let Some(ctx) = self.loops.pop() {
            for at in ctx.continues {
                self.patch(at, continue_target);
            }
            for at in ctx.breaks {
                self.patch(at, end);
            }
        }
    }

    fn expression(&mut self, expr: &Expr) -> Result<(), Error> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Number(n) => {
                self.emit(Op::Number(*n), line);
            }
            ExprKind::Str(s) => {
                let index = self.string(s);
                self.emit(Op::Str(index), line);
            }
            ExprKind::Bool(b) => {
                self.emit(Op::Bool(*b), line);
            }
            ExprKind::Null => {
                self.emit(Op::Null, line);
            }
            ExprKind::Ident(name) => self.emit_get(name, line),
            ExprKind::Member { object, property } => {
                self.expression(object)?;
                let index = self.string(property);
                self.emit(Op::GetMember(index), line);
            }
            ExprKind::Call { callee, args } => {
                self.expression(callee)?;
                for arg in args {
                    self.expression(arg)?;
                }
                self.emit(Op::Call(args.len()), line);
            }
            ExprKind::Unary {
                op: UnaryOp::Typeof,
                operand,
            } if matches!(operand.kind, ExprKind::Ident(_)) => {
                let ExprKind::Ident(name) = &operand.kind else {
                    unreachable!()
                };
                match self.resolve(name) {
                    Slot::Local(slot) => {
                        self.emit(Op::GetLocal(slot), line);
                        self.emit(Op::Unary(UnaryOp::Typeof), line);
                    }
                    Slot::Global(slot) => {
                        self.emit(Op::TypeofGlobal(slot), line);
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                self.expression(operand)?;
                self.emit(Op::Unary(*op), line);
            }
            ExprKind::Binary { op, left, right } => {
                self.expression(left)?;
                self.expression(right)?;
                self.emit(Op::Binary(*op), line);
            }
            ExprKind::Logical { op, left, right } => {
                self.expression(left)?;
                let jump = match op {
                    LogicalOp::And => self.emit(Op::JumpIfFalseOrPop(0), line),
                    LogicalOp::Or => self.emit(Op::JumpIfTrueOrPop(0), line),
                };
                self.expression(right)?;
                self.patch(jump, self.here());
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expression(test)?;
                let else_jump = self.emit(Op::JumpIfFalse(0), line);
                self.expression(consequent)?;
                let end_jump = self.emit(Op::Jump(0), line);
                self.patch(else_jump, self.here());
                self.expression(alternate)?;
                self.patch(end_jump, self.here());
            }
            ExprKind::Assign { op, target, value } => {
                if let Some(op) = op {
                    self.emit_get(target, line);
                    self.expression(value)?;
                    self.emit(Op::Binary(*op), line);
                } else {
                    self.expression(value)?;
                }
                self.emit_set(target, line);
            }
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => {
                let op = if *increment {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                self.emit_get(target, line);
                self.emit(Op::ToNumber, line);
                if !*prefix {
                    self.emit(Op::Dup, line);
                }
                self.emit(Op::Number(1.0), line);
                self.emit(Op::Binary(op), line);
                self.emit_set(target, line);
                if !*prefix {
                    self.emit(Op::Pop, line);
                }
            }
        }
        Ok(())
    }
}
