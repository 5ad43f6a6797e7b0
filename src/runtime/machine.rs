//! The stack machine.
//!
//! One global stack, a frame stack for named slots, six registers and a
//! fetch/decode/execute loop over the flattened code stream. Labels and
//! constant-pool values are collected once at load; executing one is a
//! no-op step. `esp` is the stack's length, read when a `stw esp` asks for
//! it and applied as a truncation when an `ldw esp` writes it back, which
//! is what lets the epilogue discard a call's leftovers in one move.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use lasso::Rodeo;

use crate::compiler::opcode::{Code, Instr, Operand, PoolValue, Reg, Ty};

use super::value::Value;

/// The stack refuses to grow past this; runaway recursion surfaces as a
/// runtime error instead of eating the host's memory.
const STACK_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Registers {
    pub pc: usize,
    pub esp: usize,
    pub ebp: usize,
    pub lr: usize,
    pub jm: Value,
    pub rt: Value,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            pc: 0,
            esp: 0,
            ebp: 0,
            lr: 0,
            jm: Value::I32(0),
            rt: Value::I32(0),
        }
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pc={} esp={} ebp={} lr={} jm={:?} rt={:?}",
            self.pc, self.esp, self.ebp, self.lr, self.jm, self.rt
        )
    }
}

/// An execution failure, carrying enough of the machine to show where it
/// died: the offending instruction, a register snapshot and the code
/// stream itself.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: Box<str>,
    pub instr: Option<Instr>,
    pub registers: Registers,
    pub codes: Vec<Code>,
}

enum Action {
    Cont,
    Goto(usize),
    Stop,
}

struct Frame {
    #[allow(dead_code)]
    argc: u32,
    storage: HashMap<Box<str>, Value>,
}

impl Frame {
    fn new(argc: u32) -> Self {
        Self {
            argc,
            storage: HashMap::new(),
        }
    }
}

pub struct Machine {
    codes: Vec<Code>,
    labels: HashMap<Box<str>, usize>,
    pool: HashMap<Box<str>, Value>,
    interner: Rodeo,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    pc: usize,
    ebp: usize,
    lr: usize,
    jm: Value,
    rt: Value,
    out: Box<dyn Write>,
}

impl Machine {
    /// Scan the stream for labels and pool values, then stand ready at
    /// index zero.
    pub fn load(codes: Vec<Code>) -> Result<Self, RuntimeError> {
        let mut labels = HashMap::new();
        let mut pool = HashMap::new();
        let mut interner = Rodeo::default();

        for (index, code) in codes.iter().enumerate() {
            match code {
                Code::Label(name) => {
                    if labels.insert(name.clone(), index).is_some() {
                        return Err(RuntimeError {
                            message: format!("duplicate label {name}").into(),
                            instr: None,
                            registers: Registers::default(),
                            codes: codes.clone(),
                        });
                    }
                }
                Code::Value(entry) => {
                    let value = match &entry.value {
                        PoolValue::Str(s) => Value::Str(interner.get_or_intern(s)),
                        PoolValue::Symbol(s) => Value::Symbol(interner.get_or_intern(s)),
                        PoolValue::Id(target) => Value::Id(interner.get_or_intern(target)),
                    };
                    // the dedupe pass keeps the first of a label, do the same
                    pool.entry(entry.label.clone()).or_insert(value);
                }
                Code::Instr(_) => {}
            }
        }

        Ok(Self {
            codes,
            labels,
            pool,
            interner,
            stack: Vec::new(),
            frames: vec![Frame::new(0)],
            pc: 0,
            ebp: 0,
            lr: 0,
            jm: Value::I32(0),
            rt: Value::I32(0),
            out: Box::new(io::stdout()),
        })
    }

    /// Redirect `println` output, mostly so tests can capture it.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            match self.step()? {
                Action::Cont => self.pc += 1,
                Action::Goto(target) => self.pc = target,
                Action::Stop => return Ok(()),
            }
        }
    }

    fn step(&mut self) -> Result<Action, RuntimeError> {
        let code = match self.codes.get(self.pc) {
            Some(code) => code.clone(),
            None => return Err(self.error("program counter ran off the end", None)),
        };
        match code {
            Code::Label(_) | Code::Value(_) => Ok(Action::Cont),
            Code::Instr(instr) => self.execute(instr),
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn top(&self) -> Option<Value> {
        self.stack.last().copied()
    }

    pub fn registers(&self) -> Registers {
        Registers {
            pc: self.pc,
            esp: self.stack.len(),
            ebp: self.ebp,
            lr: self.lr,
            jm: self.jm,
            rt: self.rt,
        }
    }

    /// Render a value the way `println` would.
    pub fn show(&self, value: Value) -> String {
        match value {
            Value::I32(n) => n.to_string(),
            Value::True => "true".into(),
            Value::False => "false".into(),
            Value::Str(key) | Value::Symbol(key) => self.interner.resolve(&key).to_string(),
            Value::Id(key) | Value::Scope(key) => {
                format!("#<{}>", self.interner.resolve(&key))
            }
        }
    }

    fn execute(&mut self, instr: Instr) -> Result<Action, RuntimeError> {
        match &instr {
            Instr::Push(ty, operand) => {
                let value = self.value_of(*ty, operand, &instr)?;
                self.push(value, &instr)?;
                Ok(Action::Cont)
            }
            Instr::Add(_) | Instr::Sub(_) | Instr::Mul(_) => {
                let b = self.pop(&instr)?;
                let a = self.pop(&instr)?;
                let (Some(a), Some(b)) = (a.as_i32(), b.as_i32()) else {
                    return Err(self.error("arithmetic on a non-integer", Some(&instr)));
                };
                let result = match instr {
                    Instr::Add(_) => a.wrapping_add(b),
                    Instr::Sub(_) => a.wrapping_sub(b),
                    _ => a.wrapping_mul(b),
                };
                self.push(Value::I32(result), &instr)?;
                Ok(Action::Cont)
            }
            Instr::Concat => {
                let b = self.pop(&instr)?;
                let a = self.pop(&instr)?;
                let (Value::Str(a), Value::Str(b)) = (a, b) else {
                    return Err(self.error("concat on a non-string", Some(&instr)));
                };
                let joined = format!(
                    "{}{}",
                    self.interner.resolve(&a),
                    self.interner.resolve(&b)
                );
                let key = self.interner.get_or_intern(&joined);
                self.push(Value::Str(key), &instr)?;
                Ok(Action::Cont)
            }
            Instr::Load(_, label) => match self.lookup(label) {
                Some(value) => {
                    self.push(value, &instr)?;
                    Ok(Action::Cont)
                }
                None => Err(self.error(&format!("nothing bound to {label}"), Some(&instr))),
            },
            Instr::Store(_, label) => {
                let value = self.pop(&instr)?;
                let frame = self.frames.last_mut().expect("the root frame is permanent");
                frame.storage.insert(label.clone(), value);
                Ok(Action::Cont)
            }
            Instr::Jz(label) => {
                let value = self.pop(&instr)?;
                if value.is_zero() {
                    self.jump(label, &instr).map(Action::Goto)
                } else {
                    Ok(Action::Cont)
                }
            }
            Instr::Jmp(label) => self.jump(label, &instr).map(Action::Goto),
            Instr::Call(label) => {
                self.lr = self.pc + 1;
                if let Some(target) = self.labels.get(label.as_ref()) {
                    return Ok(Action::Goto(*target));
                }
                // not a direct entry: the label names a slot holding a
                // callable reference
                match self.lookup(label) {
                    Some(value) => self.resolve_callable(value, &instr).map(Action::Goto),
                    None => Err(self.error(&format!("cannot call {label}"), Some(&instr))),
                }
            }
            Instr::Call0 => {
                self.lr = self.pc + 1;
                let target = self.jm;
                self.resolve_callable(target, &instr).map(Action::Goto)
            }
            Instr::Ret => {
                let addr = self.pop(&instr)?;
                let Some(target) = addr.as_i32().and_then(|n| usize::try_from(n).ok()) else {
                    return Err(self.error("return to a non-address", Some(&instr)));
                };
                if self.frames.len() < 2 {
                    return Err(self.error("return outside a frame", Some(&instr)));
                }
                self.frames.pop();
                Ok(Action::Goto(target))
            }
            Instr::Mov(reg, operand) => {
                let value = match operand {
                    Some(operand) => self.value_of(Ty::I32, operand, &instr)?,
                    None => self.pop(&instr)?,
                };
                self.set_reg(*reg, value, &instr)?;
                Ok(Action::Cont)
            }
            Instr::Stw(reg) => {
                let value = self.read_reg(*reg);
                self.push(value, &instr)?;
                Ok(Action::Cont)
            }
            Instr::Ldw(reg) => {
                let value = self.pop(&instr)?;
                self.set_reg(*reg, value, &instr)?;
                Ok(Action::Cont)
            }
            Instr::Swap => {
                let a = self.pop(&instr)?;
                let b = self.pop(&instr)?;
                self.push(a, &instr)?;
                self.push(b, &instr)?;
                Ok(Action::Cont)
            }
            Instr::Frame(argc) => {
                self.frames.push(Frame::new(*argc));
                let lr = self.lr;
                self.push(Value::I32(lr as i32), &instr)?;
                Ok(Action::Cont)
            }
            Instr::FrameInit(_) => {
                Err(self.error("frame placeholder reached the machine", Some(&instr)))
            }
            Instr::Println => {
                let value = self.pop(&instr)?;
                let shown = self.show(value);
                if writeln!(self.out, "{shown}").is_err() {
                    return Err(self.error("output stream failed", Some(&instr)));
                }
                Ok(Action::Cont)
            }
            Instr::Halt => Ok(Action::Stop),
        }
    }

    fn error(&self, message: &str, instr: Option<&Instr>) -> RuntimeError {
        RuntimeError {
            message: Box::from(message),
            instr: instr.cloned(),
            registers: self.registers(),
            codes: self.codes.clone(),
        }
    }

    fn push(&mut self, value: Value, instr: &Instr) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(self.error("stack overflow", Some(instr)));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, instr: &Instr) -> Result<Value, RuntimeError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.error("stack underflow", Some(instr))),
        }
    }

    /// Walk the frame stack for a named slot, falling back to the constant
    /// pool (which is where definition references live).
    fn lookup(&self, label: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.storage.get(label))
            .copied()
            .or_else(|| self.pool.get(label).copied())
    }

    fn jump(&self, label: &str, instr: &Instr) -> Result<usize, RuntimeError> {
        match self.labels.get(label) {
            Some(target) => Ok(*target),
            None => Err(self.error(&format!("no such label {label}"), Some(instr))),
        }
    }

    fn resolve_callable(&self, value: Value, instr: &Instr) -> Result<usize, RuntimeError> {
        match value {
            Value::Id(key) | Value::Scope(key) => {
                let label = self.interner.resolve(&key).to_owned();
                self.jump(&label, instr)
            }
            other => Err(self.error(
                &format!("cannot call a value like {:?}", other),
                Some(instr),
            )),
        }
    }

    fn value_of(&mut self, ty: Ty, operand: &Operand, instr: &Instr) -> Result<Value, RuntimeError> {
        match (ty, operand) {
            (_, Operand::I32(n)) => Ok(Value::I32(*n)),
            (_, Operand::Bool(true)) => Ok(Value::True),
            (_, Operand::Bool(false)) => Ok(Value::False),
            (Ty::Const, Operand::Id(label)) => match self.pool.get(label.as_ref()) {
                Some(value) => Ok(*value),
                None => Err(self.error(&format!("unknown constant {label}"), Some(instr))),
            },
            (Ty::Scope, Operand::Id(label)) => {
                Ok(Value::Scope(self.interner.get_or_intern(label.as_ref())))
            }
            (Ty::Ref, Operand::Id(label)) => {
                Ok(Value::Id(self.interner.get_or_intern(label.as_ref())))
            }
            (_, Operand::Id(label)) => {
                Ok(Value::Id(self.interner.get_or_intern(label.as_ref())))
            }
        }
    }

    fn read_reg(&self, reg: Reg) -> Value {
        match reg {
            Reg::Pc => Value::I32(self.pc as i32),
            Reg::Esp => Value::I32(self.stack.len() as i32),
            Reg::Ebp => Value::I32(self.ebp as i32),
            Reg::Lr => Value::I32(self.lr as i32),
            Reg::Jm => self.jm,
            Reg::Rt => self.rt,
        }
    }

    fn set_reg(&mut self, reg: Reg, value: Value, instr: &Instr) -> Result<(), RuntimeError> {
        let as_index = |value: Value, this: &Self| {
            value
                .as_i32()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| this.error("register wants an address", Some(instr)))
        };
        match reg {
            Reg::Pc => self.pc = as_index(value, self)?,
            Reg::Esp => {
                let esp = as_index(value, self)?;
                if esp > self.stack.len() {
                    return Err(self.error("cannot grow the stack through esp", Some(instr)));
                }
                self.stack.truncate(esp);
            }
            Reg::Ebp => self.ebp = as_index(value, self)?,
            Reg::Lr => self.lr = as_index(value, self)?,
            Reg::Jm => self.jm = value,
            Reg::Rt => self.rt = value,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    use super::{Machine, Value};
    use assert2::{assert, check, let_assert};

    #[derive(Clone, Default)]
    struct SharedOut(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedOut {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run(src: &str) -> (Machine, String) {
        let codes = crate::compile("test.oat", src).unwrap();
        let out = SharedOut::default();
        let mut machine = Machine::load(codes)
            .unwrap()
            .with_output(Box::new(out.clone()));
        machine.run().unwrap();
        let text = String::from_utf8(out.0.borrow().clone()).unwrap();
        (machine, text)
    }

    #[test]
    fn prints_a_sum() {
        let (_, output) = run("begin println(1 + 2) end");
        check!(output == "3\n");
    }

    #[test]
    fn calls_a_let_bound_lambda() {
        let (machine, _) = run("let add = func (a, b) = a + b in add(4, 5)");
        check!(machine.top() == Some(Value::I32(9)));
    }

    #[test]
    fn recursive_factorial() {
        let src = "operator('infix, 50, '*)\n\
                   operator('infix, 30, '-)\n\
                   let fact = func (n) = if n then n * fact(n - 1) else 1 in fact(5)";
        let (machine, _) = run(src);
        check!(machine.top() == Some(Value::I32(120)));
    }

    #[test]
    fn a_returned_lambda_can_be_called() {
        let (machine, _) = run("let f = func () = func (x) = x + x in f()(7)");
        check!(machine.top() == Some(Value::I32(14)));
    }

    #[test]
    fn inline_assembly_runs_as_emitted() {
        let (machine, _) = run("begin opcode(\"push I32 #7\n halt\") end");
        check!(machine.top() == Some(Value::I32(7)));
    }

    #[test]
    fn conditionals_treat_zero_as_false_and_nonzero_as_true() {
        let (machine, _) = run("if 0 then 1 else 2");
        check!(machine.top() == Some(Value::I32(2)));

        let (machine, _) = run("if 7 then 1 else 2");
        check!(machine.top() == Some(Value::I32(1)));

        let (machine, _) = run("if false then 1 else 2");
        check!(machine.top() == Some(Value::I32(2)));
    }

    #[test]
    fn strings_concatenate_through_the_interner() {
        let src = "operator('infix, 40, '++)\nbegin println(%{oat} ++ %{meal}) end";
        let (_, output) = run(src);
        check!(output == "oatmeal\n");
    }

    #[test]
    fn symbols_evaluate_to_themselves() {
        let (machine, _) = run("'hello");
        let_assert!(Some(value) = machine.top());
        check!(machine.show(value) == "hello");
    }

    #[test]
    fn definitions_are_callable_before_and_after_their_use() {
        let (machine, _) = run("def double(x) = x + x\ndouble(21)");
        check!(machine.top() == Some(Value::I32(42)));
    }

    #[test]
    fn runaway_recursion_overflows_the_stack() {
        let codes = crate::compile("test.oat", "def spin(n) = spin(n)\nspin(1)").unwrap();
        let mut machine = Machine::load(codes)
            .unwrap()
            .with_output(Box::new(SharedOut::default()));
        let err = machine.run().unwrap_err();
        assert!(err.message.contains("stack overflow"));
        // the snapshot is taken at the point of death
        check!(err.registers.esp == super::STACK_LIMIT);
    }

    #[test]
    fn begin_yields_its_last_expression() {
        let (machine, _) = run("begin 1 2 3 end");
        check!(machine.top() == Some(Value::I32(3)));
    }
}
