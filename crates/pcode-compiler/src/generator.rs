//! Lowering of the AST into a flat instruction list.
//!
//! Control flow is emitted in one pass: `SKP`/`JMP` go out as placeholders
//! whose operand is unknown until the guarded region has been emitted, then
//! get rewritten in place. Every placeholder is tracked in an explicit
//! pending list and must be resolved exactly once before generation ends.

use pcode_ast::{Assign, Block, Expr, Stmt};
use pcode_core::{ArithOp, CmpOp, Instruction, Operand, Target, Temp};
use tracing::{debug, trace};

use crate::error::CompileError;

type Result<T> = core::result::Result<T, CompileError>;

// ─────────────────────────────────────────────────────────────────────────────
/* Jump placeholders */
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    /// Operand is a relative skip count.
    Skip,
    /// Operand is an absolute instruction index.
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingJump {
    at: usize,
    kind: JumpKind,
}

/// Handle on an emitted placeholder. Consumed by [`Generator::resolve`].
#[must_use = "a jump placeholder must be resolved"]
#[derive(Debug)]
struct Patch(PendingJump);

// ─────────────────────────────────────────────────────────────────────────────
/* Generator */
// ─────────────────────────────────────────────────────────────────────────────

/// Code generator state: output buffer, temporary counter, pending jumps.
///
/// A generator can be reused; every call to [`Generator::generate`] starts
/// from empty state, so temporaries restart at `t0`.
#[derive(Debug, Default)]
pub struct Generator {
    code: Vec<Instruction>,
    next_temp: u32,
    pending: Vec<PendingJump>,
}

impl Generator {
    /// New, empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers `program` into an instruction list with every jump resolved.
    pub fn generate(&mut self, program: &Block) -> Result<Vec<Instruction>> {
        self.reset();

        let lowered = self.block(program).and_then(|()| self.finish());
        let code = core::mem::take(&mut self.code);
        lowered?;

        debug!(instructions = code.len(), temps = self.next_temp, "generated pcode");
        Ok(code)
    }

    fn reset(&mut self) {
        self.code.clear();
        self.next_temp = 0;
        self.pending.clear();
    }

    fn finish(&self) -> Result<()> {
        match self.pending.first() {
            Some(p) => Err(CompileError::UnresolvedJump { at: p.at }),
            None => Ok(()),
        }
    }

    /* ───────────── emission primitives ───────────── */

    fn emit(&mut self, instr: Instruction) -> usize {
        trace!(pc = self.code.len(), %instr, "emit");
        self.code.push(instr);
        self.code.len() - 1
    }

    fn new_temp(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    fn placeholder(&mut self, kind: JumpKind) -> Patch {
        let instr = match kind {
            JumpKind::Skip => Instruction::Skp(0),
            JumpKind::Jump => Instruction::Jmp(0),
        };
        let at = self.emit(instr);
        let pending = PendingJump { at, kind };
        self.pending.push(pending);
        Patch(pending)
    }

    fn resolve(&mut self, patch: Patch, value: usize) -> Result<()> {
        let Patch(PendingJump { at, kind }) = patch;
        let pos = self
            .pending
            .iter()
            .position(|p| p.at == at && p.kind == kind)
            .ok_or(CompileError::PatchMismatch { at })?;
        self.pending.swap_remove(pos);

        let value = u32::try_from(value).map_err(|_| CompileError::ProgramTooLarge(value))?;
        let slot = self.code.get_mut(at).ok_or(CompileError::PatchMismatch { at })?;
        *slot = match kind {
            JumpKind::Skip => Instruction::Skp(value),
            JumpKind::Jump => Instruction::Jmp(value),
        };
        trace!(at, value, ?kind, "patched");
        Ok(())
    }

    /// Unconditional jump to an already-known index (loop back-edges).
    fn jump_to(&mut self, target: usize) -> Result<()> {
        let target = u32::try_from(target).map_err(|_| CompileError::ProgramTooLarge(target))?;
        self.emit(Instruction::Jmp(target));
        Ok(())
    }

    /* ───────────── statements ───────────── */

    fn block(&mut self, block: &Block) -> Result<()> {
        block.stmts.iter().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(e) => self.expr(e).map(drop),
            Stmt::Assign(a) => self.assign(a),
            Stmt::If { condition, then_block, else_block } => {
                self.if_stmt(condition, then_block, else_block.as_ref())
            }
            Stmt::While { condition, body } => self.while_stmt(condition, body),
            Stmt::For { init, bound, body } => self.for_stmt(init, bound, body),
            Stmt::Return(value) => {
                let value = value.as_ref().map(|v| self.expr(v)).transpose()?;
                self.emit(Instruction::Ret(value));
                Ok(())
            }
            Stmt::Block(b) => self.block(b),
            Stmt::Function { body } => {
                self.block(body)?;
                self.emit(Instruction::Ret(None));
                Ok(())
            }
        }
    }

    fn assign(&mut self, assign: &Assign) -> Result<()> {
        let value = self.expr(&assign.value)?;
        let target = match &assign.target {
            Expr::Ident(name) => Target::Var(name.clone()),
            Expr::Index { base, index } => {
                let array = self.array_operand(base)?;
                let index = self.expr(index)?;
                Target::Element { array, index }
            }
            other => return Err(CompileError::InvalidAssignTarget(other.kind())),
        };
        self.emit(Instruction::Asn { target, value });
        Ok(())
    }

    /// ```text
    /// <cond>            ; sets the flag
    /// SKP n             ; n = |then|, +1 when an else follows
    /// <then>
    /// JMP end           ; else only
    /// <else>
    /// end:
    /// ```
    fn if_stmt(&mut self, cond: &Expr, then_block: &Block, else_block: Option<&Block>) -> Result<()> {
        self.expr(cond)?;
        let skip = self.placeholder(JumpKind::Skip);
        let then_start = self.code.len();
        self.block(then_block)?;

        match else_block {
            Some(else_block) => {
                let exit = self.placeholder(JumpKind::Jump);
                // the skip also steps over the exit jump
                self.resolve(skip, self.code.len() - then_start)?;
                self.block(else_block)?;
                self.resolve(exit, self.code.len())
            }
            None => self.resolve(skip, self.code.len() - then_start),
        }
    }

    fn while_stmt(&mut self, cond: &Expr, body: &Block) -> Result<()> {
        let loop_start = self.code.len();
        self.expr(cond)?;
        let skip = self.placeholder(JumpKind::Skip);
        let body_start = self.code.len();
        self.block(body)?;
        self.jump_to(loop_start)?;
        self.resolve(skip, self.code.len() - body_start)
    }

    /// `for v <- start to bound` runs while `v <= bound`, then increments `v`.
    fn for_stmt(&mut self, init: &Assign, bound: &Expr, body: &Block) -> Result<()> {
        let var = match &init.target {
            Expr::Ident(name) => name.clone(),
            other => return Err(CompileError::InvalidLoopVariable(other.kind())),
        };
        self.assign(init)?;

        let loop_start = self.code.len();
        let bound = self.expr(bound)?;
        let dest = self.new_temp();
        self.emit(Instruction::Com { op: CmpOp::Le, lhs: Operand::Var(var.clone()), rhs: bound, dest });
        let skip = self.placeholder(JumpKind::Skip);
        let body_start = self.code.len();
        self.block(body)?;

        let next = self.new_temp();
        self.emit(Instruction::Aop {
            op: ArithOp::Add,
            lhs: Operand::Var(var.clone()),
            rhs: Some(Operand::Int(1)),
            dest: next,
        });
        self.emit(Instruction::Asn { target: Target::Var(var), value: Operand::Temp(next) });
        self.jump_to(loop_start)?;
        self.resolve(skip, self.code.len() - body_start)
    }

    /* ───────────── expressions ───────────── */

    /// Lowers `expr` and returns the operand holding its value.
    /// Literals and identifiers emit nothing.
    fn expr(&mut self, expr: &Expr) -> Result<Operand> {
        match expr {
            Expr::Literal(v) => Ok(Operand::Int(*v)),
            Expr::Ident(name) => Ok(Operand::Var(name.clone())),
            Expr::Array(_) => Err(CompileError::UnsupportedNode(expr.kind())),
            Expr::Index { base, index } => {
                let array = self.array_operand(base)?;
                let index = self.expr(index)?;
                let dest = self.new_temp();
                self.emit(Instruction::Idx { array, index, dest });
                Ok(dest.into())
            }
            Expr::Binary { left, op, right } => {
                let lhs = self.expr(left)?;
                let rhs = self.expr(right)?;
                let dest = self.new_temp();
                let instr = if let Some(op) = ArithOp::binary(op) {
                    Instruction::Aop { op, lhs, rhs: Some(rhs), dest }
                } else if let Some(op) = CmpOp::from_symbol(op) {
                    Instruction::Com { op, lhs, rhs, dest }
                } else {
                    return Err(CompileError::UnknownOperator(op.clone()));
                };
                self.emit(instr);
                Ok(dest.into())
            }
            Expr::Unary { op, expr } => {
                let lhs = self.expr(expr)?;
                let op = ArithOp::unary(op).ok_or_else(|| CompileError::UnknownOperator(op.clone()))?;
                let dest = self.new_temp();
                self.emit(Instruction::Aop { op, lhs, rhs: None, dest });
                Ok(dest.into())
            }
        }
    }

    /// Array base of an access: identifiers are named directly.
    fn array_operand(&mut self, base: &Expr) -> Result<Operand> {
        match base {
            Expr::Ident(name) => Ok(Operand::Var(name.clone())),
            other => self.expr(other),
        }
    }
}
