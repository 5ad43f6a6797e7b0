//! The embedded assembler behind `opcode("...")`.
//!
//! A program is a sequence of lines, each either a label (`name:`) or an
//! instruction: mnemonic, optional value-type tag, operands. Immediates are
//! `#`-prefixed; identifier and label operands resolve through the
//! surrounding scope's qualification, which also applies to labels defined
//! in the assembly itself so local jumps land.

use crate::lexer::Location;

use super::opcode::{Instr, Operand, Reg, Ty};
use super::scope::{ScopeId, Scopes};
use super::GeneratorError;

#[derive(Debug, Clone, PartialEq)]
pub enum AsmItem {
    Label(Box<str>),
    Instr(Instr),
}

pub fn assemble(
    text: &str,
    loc: &Location,
    scopes: &Scopes,
    scope: ScopeId,
) -> Result<Vec<AsmItem>, GeneratorError> {
    let mut items = Vec::new();

    for line in text.lines() {
        let words = line.split_whitespace().collect::<Vec<_>>();
        let Some((&opname, operands)) = words.split_first() else {
            continue;
        };

        if operands.is_empty() && opname.len() > 1 && opname.ends_with(':') {
            let name = &opname[..opname.len() - 1];
            items.push(AsmItem::Label(scopes.qualified(scope, name)));
            continue;
        }

        items.push(AsmItem::Instr(instruction(
            opname, operands, loc, scopes, scope,
        )?));
    }

    Ok(items)
}

fn instruction(
    opname: &str,
    operands: &[&str],
    loc: &Location,
    scopes: &Scopes,
    scope: ScopeId,
) -> Result<Instr, GeneratorError> {
    let malformed = |detail: String| GeneratorError::OpcodeSyntax {
        detail: detail.into(),
        loc: loc.clone(),
    };

    match opname {
        "push" => {
            let (ty, rest) = leading_ty(operands);
            let [word] = rest else {
                return Err(malformed(format!("push wants one operand, got {}", rest.len())));
            };
            Ok(Instr::Push(ty, operand(word, loc, scopes, scope)?))
        }
        "add" | "sub" | "mul" => {
            let (ty, rest) = leading_ty(operands);
            if !rest.is_empty() {
                return Err(malformed(format!("{opname} takes no operands")));
            }
            Ok(match opname {
                "add" => Instr::Add(ty),
                "sub" => Instr::Sub(ty),
                _ => Instr::Mul(ty),
            })
        }
        "load" | "store" => {
            let (ty, rest) = leading_ty(operands);
            let [label] = rest else {
                return Err(malformed(format!("{opname} wants a label")));
            };
            let label = scopes.qualified(scope, label);
            Ok(if opname == "load" {
                Instr::Load(ty, label)
            } else {
                Instr::Store(ty, label)
            })
        }
        "jz" | "jmp" | "call" => {
            let [label] = operands else {
                return Err(malformed(format!("{opname} wants a label")));
            };
            let label = scopes.qualified(scope, label);
            Ok(match opname {
                "jz" => Instr::Jz(label),
                "jmp" => Instr::Jmp(label),
                _ => Instr::Call(label),
            })
        }
        "mov" => match operands {
            [reg] => Ok(Instr::Mov(register(reg, loc)?, None)),
            [reg, word] => Ok(Instr::Mov(
                register(reg, loc)?,
                Some(operand(word, loc, scopes, scope)?),
            )),
            _ => Err(malformed("mov wants a register and an optional operand".into())),
        },
        "stw" | "ldw" => {
            let [reg] = operands else {
                return Err(malformed(format!("{opname} wants a register")));
            };
            let reg = register(reg, loc)?;
            Ok(if opname == "stw" {
                Instr::Stw(reg)
            } else {
                Instr::Ldw(reg)
            })
        }
        "frame" | "frame_init" => {
            let [word] = operands else {
                return Err(malformed(format!("{opname} wants an arity")));
            };
            let argc = immediate(word, loc)?;
            let argc = u32::try_from(argc).map_err(|_| GeneratorError::InvalidI32 {
                lexeme: Box::from(*word),
                loc: loc.clone(),
            })?;
            Ok(if opname == "frame" {
                Instr::Frame(argc)
            } else {
                Instr::FrameInit(argc)
            })
        }
        "concat" | "call0" | "ret" | "swap" | "println" | "halt" => {
            if !operands.is_empty() {
                return Err(malformed(format!("{opname} takes no operands")));
            }
            Ok(match opname {
                "concat" => Instr::Concat,
                "call0" => Instr::Call0,
                "ret" => Instr::Ret,
                "swap" => Instr::Swap,
                "println" => Instr::Println,
                _ => Instr::Halt,
            })
        }
        _ => Err(GeneratorError::UnknownUserOpcode {
            opname: Box::from(opname),
            loc: loc.clone(),
        }),
    }
}

/// A leading word that reads as a value-type tag; `I32` when absent.
fn leading_ty<'a>(operands: &'a [&'a str]) -> (Ty, &'a [&'a str]) {
    match operands.split_first() {
        Some((&word, rest)) => match ty(word) {
            Some(ty) => (ty, rest),
            None => (Ty::I32, operands),
        },
        None => (Ty::I32, operands),
    }
}

fn ty(word: &str) -> Option<Ty> {
    match word {
        "I32" => Some(Ty::I32),
        "Str" => Some(Ty::Str),
        "Symbol" => Some(Ty::Symbol),
        "Bool" => Some(Ty::Bool),
        "Ref" => Some(Ty::Ref),
        "Scope" => Some(Ty::Scope),
        "Const" => Some(Ty::Const),
        _ => None,
    }
}

fn register(word: &str, loc: &Location) -> Result<Reg, GeneratorError> {
    match word {
        "pc" => Ok(Reg::Pc),
        "esp" => Ok(Reg::Esp),
        "ebp" => Ok(Reg::Ebp),
        "lr" => Ok(Reg::Lr),
        "jm" => Ok(Reg::Jm),
        "rt" => Ok(Reg::Rt),
        _ => Err(GeneratorError::OpcodeSyntax {
            detail: format!("unknown register {word}").into(),
            loc: loc.clone(),
        }),
    }
}

fn immediate(word: &str, loc: &Location) -> Result<i32, GeneratorError> {
    let digits = word.strip_prefix('#').unwrap_or(word);
    digits.parse::<i32>().map_err(|_| GeneratorError::InvalidI32 {
        lexeme: Box::from(word),
        loc: loc.clone(),
    })
}

fn operand(
    word: &str,
    loc: &Location,
    scopes: &Scopes,
    scope: ScopeId,
) -> Result<Operand, GeneratorError> {
    if let Some(digits) = word.strip_prefix('#') {
        let n = digits.parse::<i32>().map_err(|_| GeneratorError::InvalidI32 {
            lexeme: Box::from(word),
            loc: loc.clone(),
        })?;
        return Ok(Operand::I32(n));
    }
    match word {
        "true" => Ok(Operand::Bool(true)),
        "false" => Ok(Operand::Bool(false)),
        _ => Ok(Operand::Id(scopes.qualified(scope, word))),
    }
}
