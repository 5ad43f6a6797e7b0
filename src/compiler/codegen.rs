//! The opcode generator.
//!
//! Two names thread through every function here: the *scope* (name
//! resolution, a [`Scopes`] arena id) and the *block* (the section emitted
//! instructions are grouped under). They usually move together but split on
//! purpose: a `let` opens a unique scope while emitting into the enclosing
//! block, and a lambda forks both, emitting into a section named by its
//! pointer label. Keeping them separate means instructions are born in the
//! right section and never need to be regrouped afterwards.
//!
//! The emitted call convention:
//!
//! ```text
//! frame N                          ; opens the frame, saves the return addr
//! swap / store I32 <param>         ; once per parameter, in reverse
//! stw ebp / stw esp / ldw ebp      ; save caller's base, base := stack top
//! <body>
//! ldw rt                           ; result out of the way
//! stw ebp / ldw esp                ; stack top := base
//! ldw ebp                          ; caller's base back
//! stw rt / swap / ret              ; result under the return addr, jump
//! ```
//!
//! The epilogue is the prologue run backwards with the result shuttled
//! through `rt`; the machine executes exactly this discipline.

use std::collections::{HashMap, HashSet};

use crate::ir::typeless::{Ir, IrKind, Param};
use crate::ir::Labels;

use super::asm::{self, AsmItem};
use super::opcode::{Code, Instr, Operand, PoolEntry, PoolValue, Reg, Ty};
use super::scope::{ScopeId, Scopes};
use super::GeneratorError;

/// One element of the generator's working output: a section-tagged code
/// element or a constant-pool value awaiting placement.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Grouped { section: Box<str>, code: Code },
    Value(PoolEntry),
}

/// Compile a whole program into the flat code stream the machine loads.
pub fn generate(tree: &[Ir], labels: &mut Labels) -> Result<Vec<Code>, GeneratorError> {
    let (scopes, root) = Scopes::root("main");
    let mut generator = Generator {
        labels,
        scopes,
        output: Vec::new(),
        strings: HashMap::new(),
        symbols: HashMap::new(),
    };

    for node in tree {
        match &node.kind {
            IrKind::Def { .. } => generator.def(root, "main", node)?,
            // a top-level lambda emits its section and nothing else
            IrKind::Lambda { .. } => {
                generator.lambda(root, node)?;
            }
            _ => generator.plain(root, "main", node)?,
        }
    }

    let output = framed(deduped(generator.output));
    let (sections, pool) = labeled(output);
    Ok(sectioned(sections, pool))
}

struct Generator<'l> {
    labels: &'l mut Labels,
    scopes: Scopes,
    output: Vec<Output>,
    /// string/symbol contents already assigned a pool label, so repeats
    /// reuse it and fall to the dedupe pass
    strings: HashMap<Box<str>, Box<str>>,
    symbols: HashMap<Box<str>, Box<str>>,
}

impl Generator<'_> {
    fn emit(&mut self, block: &str, instr: Instr) {
        self.output.push(Output::Grouped {
            section: Box::from(block),
            code: Code::Instr(instr),
        });
    }

    fn emit_label(&mut self, block: &str, name: &str) {
        self.output.push(Output::Grouped {
            section: Box::from(block),
            code: Code::Label(Box::from(name)),
        });
    }

    fn emit_value(&mut self, entry: PoolEntry) {
        self.output.push(Output::Value(entry));
    }

    /// Expression-position emission: like [`Generator::plain`] except a
    /// lambda also pushes a `Scope` reference to itself so the surrounding
    /// expression can pick it up.
    fn expr(&mut self, scope: ScopeId, block: &str, ir: &Ir) -> Result<(), GeneratorError> {
        match &ir.kind {
            IrKind::Lambda { .. } => {
                let ptr = self.lambda(scope, ir)?;
                self.emit(block, Instr::Push(Ty::Scope, Operand::Id(ptr)));
                Ok(())
            }
            _ => self.plain(scope, block, ir),
        }
    }

    fn plain(&mut self, scope: ScopeId, block: &str, ir: &Ir) -> Result<(), GeneratorError> {
        match &ir.kind {
            IrKind::Num(lexeme) => match lexeme.parse::<i32>() {
                Ok(n) => {
                    self.emit(block, Instr::Push(Ty::I32, Operand::I32(n)));
                    Ok(())
                }
                Err(_) => Err(GeneratorError::BadPush {
                    lexeme: lexeme.clone(),
                    loc: ir.loc.clone(),
                }),
            },
            IrKind::Bool(b) => {
                self.emit(block, Instr::Push(Ty::Bool, Operand::Bool(*b)));
                Ok(())
            }
            IrKind::Str(content) => {
                let label = match self.strings.get(content) {
                    Some(label) => label.clone(),
                    None => {
                        let label = self.labels.tagged("str");
                        self.strings.insert(content.clone(), label.clone());
                        label
                    }
                };
                self.emit_value(PoolEntry {
                    ty: Ty::Str,
                    label: label.clone(),
                    value: PoolValue::Str(content.clone()),
                });
                self.emit(block, Instr::Push(Ty::Const, Operand::Id(label)));
                Ok(())
            }
            IrKind::Symbol(name) => {
                let label = match self.symbols.get(name) {
                    Some(label) => label.clone(),
                    None => {
                        let label = self.labels.tagged("sym");
                        self.symbols.insert(name.clone(), label.clone());
                        label
                    }
                };
                self.emit_value(PoolEntry {
                    ty: Ty::Symbol,
                    label: label.clone(),
                    value: PoolValue::Symbol(name.clone()),
                });
                self.emit(block, Instr::Push(Ty::Const, Operand::Id(label)));
                Ok(())
            }
            IrKind::Id(name) => {
                if self.scopes.contains(scope, name) {
                    let slot = self.scopes.qualified(scope, name);
                    self.emit(block, Instr::Load(Ty::I32, slot));
                    Ok(())
                } else {
                    Err(GeneratorError::UndeclaredIdentifier {
                        name: name.clone(),
                        loc: ir.loc.clone(),
                    })
                }
            }
            IrKind::Lambda { .. } => {
                self.lambda(scope, ir)?;
                Ok(())
            }
            IrKind::App { fun, args } => self.app(scope, block, fun, args, ir),
            IrKind::Cond { cond, pass, fail } => {
                let branch = self.labels.branch();
                self.expr(scope, block, cond)?;
                self.emit(block, Instr::Jz(branch.else_.clone()));
                self.emit_label(block, &branch.then_);
                self.expr(scope, block, pass)?;
                self.emit(block, Instr::Jmp(branch.done.clone()));
                self.emit_label(block, &branch.else_);
                self.expr(scope, block, fail)?;
                self.emit_label(block, &branch.done);
                Ok(())
            }
            IrKind::Let { bindings, body } => {
                let sub = self.scopes.unique(scope, self.labels);
                for binding in bindings {
                    // bound before the value is generated, so a lambda can
                    // call itself through the binding
                    self.scopes.define(sub, &binding.name, binding.value.clone());
                    match &binding.value.kind {
                        IrKind::Lambda { .. } => {
                            let ptr = self.lambda(sub, &binding.value)?;
                            self.emit(block, Instr::Push(Ty::Ref, Operand::Id(ptr)));
                        }
                        _ => self.expr(sub, block, &binding.value)?,
                    }
                    let slot = self.scopes.qualified(sub, &binding.name);
                    self.emit(block, Instr::Store(store_kind(&binding.value), slot));
                }
                self.expr(sub, block, body)
            }
            IrKind::Begin(exprs) => {
                let Some((last, rest)) = exprs.split_last() else {
                    return Ok(());
                };
                for e in rest {
                    self.plain(scope, block, e)?;
                }
                self.expr(scope, block, last)
            }
            IrKind::Def { name, .. } => Err(GeneratorError::CannotStoreDef {
                name: name.clone(),
                loc: ir.loc.clone(),
            }),
        }
    }

    fn app(
        &mut self,
        scope: ScopeId,
        block: &str,
        fun: &Ir,
        args: &[Ir],
        ir: &Ir,
    ) -> Result<(), GeneratorError> {
        match &fun.kind {
            IrKind::Id(name) if name.as_ref() == "opcode" => {
                let [arg] = args else {
                    return Err(GeneratorError::OpcodeSyntax {
                        detail: Box::from("opcode takes a single string literal"),
                        loc: ir.loc.clone(),
                    });
                };
                let IrKind::Str(text) = &arg.kind else {
                    return Err(GeneratorError::OpcodeSyntax {
                        detail: Box::from("opcode takes a single string literal"),
                        loc: arg.loc.clone(),
                    });
                };
                for item in asm::assemble(text, &arg.loc, &self.scopes, scope)? {
                    match item {
                        AsmItem::Label(name) => self.emit_label(block, &name),
                        AsmItem::Instr(instr) => self.emit(block, instr),
                    }
                }
                Ok(())
            }
            IrKind::Id(name) => {
                if let Some(instr) = builtin(name) {
                    for arg in args {
                        self.expr(scope, block, arg)?;
                    }
                    self.emit(block, instr);
                    return Ok(());
                }
                // a binding to a plain literal can never be called
                if let Some(bound) = self.scopes.get(scope, name) {
                    if matches!(
                        bound.kind,
                        IrKind::Num(_) | IrKind::Str(_) | IrKind::Bool(_) | IrKind::Symbol(_)
                    ) {
                        return Err(GeneratorError::BadCall {
                            loc: ir.loc.clone(),
                        });
                    }
                }
                for arg in args {
                    self.expr(scope, block, arg)?;
                }
                // unbound names are qualified under the current module and
                // left for the machine: they may name a later definition
                let target = self.scopes.qualified(scope, name);
                self.emit(block, Instr::Call(target));
                Ok(())
            }
            IrKind::Lambda { .. } => {
                for arg in args {
                    self.expr(scope, block, arg)?;
                }
                let ptr = self.lambda(scope, fun)?;
                self.emit(block, Instr::Call(ptr));
                Ok(())
            }
            // calling the result of an expression: args go down first so
            // nothing can clobber `jm` between the mov and the call
            IrKind::App { .. } | IrKind::Let { .. } | IrKind::Cond { .. } | IrKind::Begin(_) => {
                for arg in args {
                    self.expr(scope, block, arg)?;
                }
                self.expr(scope, block, fun)?;
                self.emit(block, Instr::Mov(Reg::Jm, None));
                self.emit(block, Instr::Call0);
                Ok(())
            }
            _ => Err(GeneratorError::BadCall {
                loc: ir.loc.clone(),
            }),
        }
    }

    /// Emit an anonymous lambda into its own section (named by its pointer)
    /// and record its constant-pool reference. Returns the pointer; the
    /// caller decides whether a reference gets pushed.
    fn lambda(&mut self, scope: ScopeId, ir: &Ir) -> Result<Box<str>, GeneratorError> {
        let IrKind::Lambda { params, body, ptr } = &ir.kind else {
            return Err(GeneratorError::BadCall {
                loc: ir.loc.clone(),
            });
        };
        let sub = self.scopes.forked(scope, ptr);
        self.body(sub, ptr, None, params, body)?;
        self.emit_value(PoolEntry {
            ty: Ty::Ref,
            label: ptr.clone(),
            value: PoolValue::Id(ptr.clone()),
        });
        Ok(ptr.clone())
    }

    fn def(&mut self, scope: ScopeId, block: &str, ir: &Ir) -> Result<(), GeneratorError> {
        let IrKind::Def { name, value } = &ir.kind else {
            unreachable!("routed by the top-level dispatch");
        };
        self.scopes.define(scope, name, (**value).clone());

        match &value.kind {
            IrKind::Lambda { params, body, ptr } => {
                let qualified =
                    self.scopes
                        .qualified_in(scope, name)
                        .ok_or_else(|| GeneratorError::Lookup {
                            name: name.clone(),
                            loc: ir.loc.clone(),
                        })?;
                let sub = self.scopes.scoped(scope);
                self.body(sub, &qualified, Some(ptr.as_ref()), params, body)?;
                self.emit_value(PoolEntry {
                    ty: Ty::Ref,
                    label: qualified.clone(),
                    value: PoolValue::Id(qualified),
                });
                Ok(())
            }
            _ => {
                self.expr(scope, block, value)?;
                let slot = self.scopes.qualified(scope, name);
                self.emit(block, Instr::Store(Ty::I32, slot));
                Ok(())
            }
        }
    }

    /// The shared lambda-body emission: prologue, body, epilogue. A
    /// `def`-bound lambda's section is its qualified name, so its pointer
    /// label is emitted inline; an anonymous lambda's section *is* its
    /// pointer, and the labeling pass provides the header.
    fn body(
        &mut self,
        scope: ScopeId,
        block: &str,
        entry: Option<&str>,
        params: &[Param],
        body: &Ir,
    ) -> Result<(), GeneratorError> {
        if let Some(ptr) = entry {
            self.emit_label(block, ptr);
        }
        self.emit(block, Instr::FrameInit(params.len() as u32));

        // arguments come off the stack in reverse, each swapped past the
        // return address the frame saved
        for param in params.iter().rev() {
            self.scopes.define(
                scope,
                &param.name,
                Ir::new(IrKind::Id(param.name.clone()), param.loc.clone()),
            );
            let slot = self.scopes.qualified(scope, &param.name);
            self.emit(block, Instr::Swap);
            self.emit(block, Instr::Store(Ty::I32, slot));
        }

        self.emit(block, Instr::Stw(Reg::Ebp));
        self.emit(block, Instr::Stw(Reg::Esp));
        self.emit(block, Instr::Ldw(Reg::Ebp));

        self.expr(scope, block, body)?;

        self.emit(block, Instr::Ldw(Reg::Rt));
        self.emit(block, Instr::Stw(Reg::Ebp));
        self.emit(block, Instr::Ldw(Reg::Esp));
        self.emit(block, Instr::Ldw(Reg::Ebp));
        self.emit(block, Instr::Stw(Reg::Rt));
        self.emit(block, Instr::Swap);
        self.emit(block, Instr::Ret);
        Ok(())
    }
}

fn builtin(name: &str) -> Option<Instr> {
    match name {
        "println" => Some(Instr::Println),
        "+" => Some(Instr::Add(Ty::I32)),
        "-" => Some(Instr::Sub(Ty::I32)),
        "*" => Some(Instr::Mul(Ty::I32)),
        "++" => Some(Instr::Concat),
        _ => None,
    }
}

fn store_kind(ir: &Ir) -> Ty {
    match &ir.kind {
        IrKind::Num(_) => Ty::I32,
        IrKind::Bool(_) => Ty::Bool,
        IrKind::Str(_) => Ty::Str,
        IrKind::Symbol(_) => Ty::Symbol,
        IrKind::Lambda { .. } => Ty::Ref,
        // XXX may not be an I32
        _ => Ty::I32,
    }
}

/// Drop every constant-pool value whose label was already seen.
pub fn deduped(output: Vec<Output>) -> Vec<Output> {
    let mut seen = HashSet::new();
    output
        .into_iter()
        .filter(|item| match item {
            Output::Value(entry) => seen.insert(entry.label.clone()),
            Output::Grouped { .. } => true,
        })
        .collect()
}

/// Rewrite every frame placeholder into a live `frame` instruction.
pub fn framed(output: Vec<Output>) -> Vec<Output> {
    output
        .into_iter()
        .map(|item| match item {
            Output::Grouped {
                section,
                code: Code::Instr(Instr::FrameInit(argc)),
            } => Output::Grouped {
                section,
                code: Code::Instr(Instr::Frame(argc)),
            },
            item => item,
        })
        .collect()
}

/// Partition grouped items by section, `main` first and the rest in order
/// of first appearance, prepending each section's header label; pool values
/// are pulled aside for final placement.
pub fn labeled(output: Vec<Output>) -> (Vec<(Box<str>, Vec<Code>)>, Vec<PoolEntry>) {
    let mut sections: Vec<(Box<str>, Vec<Code>)> =
        vec![(Box::from("main"), vec![Code::Label(Box::from("main"))])];
    let mut pool = Vec::new();

    for item in output {
        match item {
            Output::Grouped { section, code } => {
                match sections.iter_mut().find(|(name, _)| *name == section) {
                    Some((_, codes)) => codes.push(code),
                    None => {
                        let header = Code::Label(section.clone());
                        sections.push((section, vec![header, code]));
                    }
                }
            }
            Output::Value(entry) => pool.push(entry),
        }
    }

    (sections, pool)
}

/// Flatten to the final stream: `main`, `halt`, every other section, then
/// the constant pool.
pub fn sectioned(sections: Vec<(Box<str>, Vec<Code>)>, pool: Vec<PoolEntry>) -> Vec<Code> {
    let mut codes = Vec::new();
    let mut sections = sections.into_iter();

    let (_, main) = sections.next().expect("the main section is always present");
    codes.extend(main);
    codes.push(Code::Instr(Instr::Halt));

    for (_, section) in sections {
        codes.extend(section);
    }

    codes.extend(pool.into_iter().map(Code::Value));
    codes
}

#[cfg(test)]
mod tests {
    use super::super::opcode::{Code, Instr, Operand, Reg, Ty};
    use super::generate;
    use crate::ir::pass::dead_lambdas;
    use crate::ir::typeless::lift;
    use crate::ir::Labels;
    use crate::parser::parse;
    use assert2::{assert, check, let_assert};

    fn compile(src: &str) -> Vec<Code> {
        let tree = parse("test.oat", src).unwrap();
        let mut labels = Labels::default();
        let ir = dead_lambdas(lift(&tree, &mut labels));
        generate(&ir, &mut labels).unwrap()
    }

    fn instrs(codes: &[Code]) -> Vec<Instr> {
        codes
            .iter()
            .filter_map(|code| match code {
                Code::Instr(instr) => Some(instr.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn arithmetic_compiles_to_primitive_instructions() {
        let codes = compile("begin println(1 + 2) end");
        let instrs = instrs(&codes);

        let_assert!(
            [Instr::Push(Ty::I32, Operand::I32(1)), Instr::Push(Ty::I32, Operand::I32(2)), Instr::Add(Ty::I32), Instr::Println, Instr::Halt] =
                instrs.as_slice()
        );
    }

    #[test]
    fn halt_sits_between_main_and_the_other_sections() {
        let codes = compile("def id(x) = x\nid(1)");

        let halts = codes
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Code::Instr(Instr::Halt)))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let_assert!([halt] = halts.as_slice());

        // everything before the halt is main's, everything after belongs to
        // other sections or the pool
        let after = &codes[halt + 1..];
        let_assert!(Some(Code::Label(section)) = after.first());
        check!(section.as_ref() == "main.id");
    }

    #[test]
    fn constant_pool_values_are_deduped_and_last() {
        let codes = compile(r#"begin println("hi") println("hi") end"#);

        let values = codes
            .iter()
            .filter(|c| matches!(c, Code::Value(_)))
            .collect::<Vec<_>>();
        check!(values.len() == 1);
        check!(matches!(codes.last(), Some(Code::Value(_))));
    }

    #[test]
    fn lambda_bodies_follow_the_call_convention() {
        let codes = compile("def add(a, b) = a + b\nadd(1, 2)");

        // find the section the definition landed in
        let start = codes
            .iter()
            .position(|c| matches!(c, Code::Label(l) if l.as_ref() == "main.add"))
            .unwrap();
        let body = instrs(&codes[start..]);

        use Instr::*;
        let_assert!(
            [Frame(2), Swap, Store(Ty::I32, _), Swap, Store(Ty::I32, _), Stw(Reg::Ebp), Stw(Reg::Esp), Ldw(Reg::Ebp), rest @ ..] =
                body.as_slice()
        );
        let_assert!(
            [.., Ldw(Reg::Rt), Stw(Reg::Ebp), Ldw(Reg::Esp), Ldw(Reg::Ebp), Stw(Reg::Rt), Swap, Ret] =
                rest
        );
    }

    #[test]
    fn no_frame_placeholder_survives_to_the_final_stream() {
        let codes = compile("def id(x) = x\nid(1)");
        check!(!instrs(&codes)
            .iter()
            .any(|i| matches!(i, Instr::FrameInit(_))));
    }

    #[test]
    fn every_lambda_pointer_labels_exactly_one_location() {
        let codes = compile(
            "let f = func () = func (x) = x + x in f()(7)",
        );

        let mut pointer_labels = std::collections::HashMap::new();
        for code in &codes {
            if let Code::Label(name) = code {
                if name.starts_with("lambda-") {
                    *pointer_labels.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }
        check!(pointer_labels.len() == 2);
        assert!(pointer_labels.values().all(|&count| count == 1));
    }

    #[test]
    fn undeclared_identifiers_are_refused() {
        let tree = parse("test.oat", "begin ghost end").unwrap();
        let mut labels = Labels::default();
        let ir = lift(&tree, &mut labels);
        let err = generate(&ir, &mut labels).unwrap_err();
        check!(matches!(
            err,
            super::super::GeneratorError::UndeclaredIdentifier { .. }
        ));
    }

    #[test]
    fn non_integral_numbers_cannot_be_pushed() {
        let tree = parse("test.oat", "begin 1.5 end").unwrap();
        let mut labels = Labels::default();
        let ir = lift(&tree, &mut labels);
        let err = generate(&ir, &mut labels).unwrap_err();
        check!(matches!(err, super::super::GeneratorError::BadPush { .. }));
    }

    #[test]
    fn calling_a_literal_binding_is_refused() {
        let tree = parse("test.oat", "let x = 5 in x()").unwrap();
        let mut labels = Labels::default();
        let ir = lift(&tree, &mut labels);
        let err = generate(&ir, &mut labels).unwrap_err();
        check!(matches!(err, super::super::GeneratorError::BadCall { .. }));
    }

    #[test]
    fn let_code_stays_in_the_enclosing_section() {
        let codes = compile("let x = 1 in x + x");

        // everything up to the halt is main's; the binding's store and both
        // loads must be there
        let halt = codes
            .iter()
            .position(|c| matches!(c, Code::Instr(Instr::Halt)))
            .unwrap();
        let main = instrs(&codes[..halt]);
        check!(main
            .iter()
            .any(|i| matches!(i, Instr::Store(_, slot) if slot.ends_with(".x"))));
        check!(
            main.iter()
                .filter(|i| matches!(i, Instr::Load(_, slot) if slot.ends_with(".x")))
                .count()
                == 2
        );
    }
}
