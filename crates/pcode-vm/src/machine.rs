//! The machine: program counter, variable store, comparison flag, return slot.

use std::sync::Arc;

use indexmap::IndexMap;
use pcode_core::{ArithOp, CmpOp, Instruction, Operand, Target, Temp, Value};
use tracing::{debug, instrument, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{error::VmError, infer::infer_inputs};

type Result<T> = core::result::Result<T, VmError>;

/// Largest array an element write may grow.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

/* ------------------------------ Options ------------------------------ */

/// Execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VmOptions {
    /// Maximum number of executed instructions per run. `None`: unlimited.
    pub step_limit: Option<u64>,
}

impl VmOptions {
    /// Options with a step ceiling.
    #[must_use]
    pub const fn with_step_limit(limit: u64) -> Self {
        Self { step_limit: Some(limit) }
    }
}

/* ------------------------------ Machine ------------------------------ */

/// A pcode machine bound to one instruction sequence.
///
/// The variable store survives across runs on the same instance; program
/// counter, comparison flag, return slot and temporaries are reset by every run. Use a
/// fresh instance for isolated executions.
#[derive(Debug, Clone)]
pub struct Vm {
    code: Arc<[Instruction]>,
    options: VmOptions,
    inputs: IndexMap<String, Option<Value>>,
    vars: IndexMap<String, Value>,
    temps: Vec<Value>,
    pc: usize,
    flag: bool,
    ret: Option<Value>,
    steps: u64,
}

impl Vm {
    /// Machine with default options. Infers the required inputs.
    pub fn new(code: Vec<Instruction>) -> Self {
        Self::with_options(code, VmOptions::default())
    }

    /// Machine with explicit options.
    pub fn with_options(code: Vec<Instruction>, options: VmOptions) -> Self {
        let inputs: IndexMap<_, _> = infer_inputs(&code).into_iter().map(|name| (name, None)).collect();
        debug!(instructions = code.len(), inputs = inputs.len(), "vm ready");
        Self {
            code: code.into(),
            options,
            inputs,
            vars: IndexMap::new(),
            temps: Vec::new(),
            pc: 0,
            flag: false,
            ret: None,
            steps: 0,
        }
    }

    /// Instruction sequence being executed.
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Required inputs, in first-read order, with their populated values.
    pub fn inputs(&self) -> &IndexMap<String, Option<Value>> {
        &self.inputs
    }

    /// Populates a required input. Returns `false` if `name` is not one.
    pub fn set_input(&mut self, name: &str, value: Value) -> bool {
        match self.inputs.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// Variable store (temporaries excluded), in first-write order.
    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.vars
    }

    /// Instructions executed by the current or last run.
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Current program counter.
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// Current comparison flag.
    pub const fn flag(&self) -> bool {
        self.flag
    }

    /// Return slot.
    pub const fn return_value(&self) -> Option<&Value> {
        self.ret.as_ref()
    }

    /// True while the program counter is inside the program.
    pub fn is_running(&self) -> bool {
        self.pc < self.code.len()
    }

    /// Runs the program to completion and returns the return slot.
    ///
    /// Populated inputs are stored first, then `bindings` for names that
    /// are required inputs; other bindings are ignored.
    #[instrument(level = "debug", skip_all, fields(instructions = self.code.len()))]
    pub fn run(&mut self, bindings: &[(&str, Value)]) -> Result<Option<Value>> {
        self.start(bindings);
        while self.step()? {}
        debug!(steps = self.steps, ret = ?self.ret, "run finished");
        Ok(self.ret.clone())
    }

    /// Resets pc, flag, return slot, temporaries and step count, then stores inputs.
    /// Follow with [`Vm::step`] to execute one instruction at a time.
    pub fn start(&mut self, bindings: &[(&str, Value)]) {
        self.pc = 0;
        self.flag = false;
        self.ret = None;
        self.steps = 0;
        self.temps.clear();

        for (name, value) in &self.inputs {
            if let Some(value) = value {
                self.vars.insert(name.clone(), value.clone());
            }
        }
        for (name, value) in bindings {
            if self.inputs.contains_key(*name) {
                self.vars.insert((*name).to_owned(), value.clone());
            } else {
                trace!(name = *name, "ignoring binding for a non-input");
            }
        }
    }

    /// Executes the instruction at `pc`. Returns whether the machine is still running.
    pub fn step(&mut self) -> Result<bool> {
        let code = Arc::clone(&self.code);
        let Some(instr) = code.get(self.pc) else {
            return Ok(false);
        };
        if let Some(limit) = self.options.step_limit {
            if self.steps >= limit {
                return Err(VmError::StepLimitExceeded { limit });
            }
        }

        trace!(pc = self.pc, %instr, "exec");
        let delta = self.exec(instr)?;
        self.steps += 1;

        // pc += 1 + delta; a negative landing is clamped past the end
        let next = i64::try_from(self.pc).unwrap_or(i64::MAX).saturating_add(1).saturating_add(delta);
        self.pc = usize::try_from(next).unwrap_or(usize::MAX);
        Ok(self.is_running())
    }

    /* -------------------------- Execution -------------------------- */

    /// Executes one instruction and returns the program-counter delta.
    fn exec(&mut self, instr: &Instruction) -> Result<i64> {
        let pc = self.pc;
        match instr {
            Instruction::Asn { target, value } => {
                let value = self.load(value);
                self.store(target, value)?;
                Ok(0)
            }
            Instruction::Aop { op, lhs, rhs, dest } => {
                let result = self.arith(*op, lhs, rhs.as_ref())?;
                self.set_temp(*dest, result)?;
                Ok(0)
            }
            Instruction::Com { op, lhs, rhs, dest } => {
                let result = self.compare(*op, &self.load(lhs), &self.load(rhs))?;
                self.flag = result;
                self.set_temp(*dest, Value::Bool(result))?;
                Ok(0)
            }
            Instruction::Idx { array, index, dest } => {
                let value = self.index(array, index)?;
                self.set_temp(*dest, Value::Int(value))?;
                Ok(0)
            }
            Instruction::Ret(value) => {
                self.ret = value.as_ref().map(|v| self.load(v));
                Ok(to_delta(self.code.len() - pc))
            }
            Instruction::Skp(n) => Ok(if self.flag { 0 } else { i64::from(*n) }),
            Instruction::Jmp(target) => Ok(i64::from(*target) - to_delta(pc) - 1),
        }
    }

    fn arith(&self, op: ArithOp, lhs: &Operand, rhs: Option<&Operand>) -> Result<Value> {
        let pc = self.pc;
        let lhs = self.load(lhs);
        let Some(rhs) = rhs else {
            return if op.is_unary() {
                Ok(Value::Bool(!lhs.truthy()))
            } else {
                Err(VmError::MalformedInstruction { pc, reason: "binary operator with one operand" })
            };
        };
        let rhs = self.load(rhs);

        let checked: fn(i64, i64) -> Option<i64> = match op {
            ArithOp::Copy => return Ok(rhs),
            ArithOp::Not => {
                return Err(VmError::MalformedInstruction { pc, reason: "unary operator with two operands" })
            }
            ArithOp::Add => i64::checked_add,
            ArithOp::Sub => i64::checked_sub,
            ArithOp::Mul => i64::checked_mul,
            ArithOp::Div => floor_div,
        };
        let a = self.int(op.symbol(), &lhs)?;
        let b = self.int(op.symbol(), &rhs)?;
        match checked(a, b) {
            Some(v) => Ok(Value::Int(v)),
            None if op == ArithOp::Div && b == 0 => Err(VmError::DivisionByZero { pc }),
            None => Err(VmError::Overflow { pc, op: op.symbol() }),
        }
    }

    fn compare(&self, op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool> {
        Ok(match op {
            CmpOp::Eq => lhs.loose_eq(rhs),
            CmpOp::Ne => !lhs.loose_eq(rhs),
            CmpOp::And => lhs.truthy() && rhs.truthy(),
            CmpOp::Or => lhs.truthy() || rhs.truthy(),
            CmpOp::Lt | CmpOp::Gt | CmpOp::Le | CmpOp::Ge => {
                let a = self.int(op.symbol(), lhs)?;
                let b = self.int(op.symbol(), rhs)?;
                match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Gt => a > b,
                    CmpOp::Le => a <= b,
                    _ => a >= b,
                }
            }
        })
    }

    /// `array[index]`; an absent array reads as empty, out of bounds reads 0.
    fn index(&self, array: &Operand, index: &Operand) -> Result<i64> {
        let index = self.int("IDX", &self.load(index))?;
        let items = match self.lookup(array) {
            None => return Ok(0),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(VmError::TypeMismatch {
                    pc: self.pc,
                    op: "IDX",
                    expected: "array",
                    found: other.type_name(),
                })
            }
        };
        Ok(usize::try_from(index).ok().and_then(|i| items.get(i)).copied().unwrap_or(0))
    }

    /* -------------------------- Store -------------------------- */

    fn lookup(&self, operand: &Operand) -> Option<&Value> {
        match operand {
            Operand::Var(name) => self.vars.get(name),
            Operand::Temp(t) => self.temps.get(t.0 as usize),
            Operand::Int(_) => None,
        }
    }

    /// Resolves an operand; unbound names read as `0`.
    fn load(&self, operand: &Operand) -> Value {
        match operand {
            Operand::Int(v) => Value::Int(*v),
            other => self.lookup(other).cloned().unwrap_or_default(),
        }
    }

    fn set_temp(&mut self, temp: Temp, value: Value) -> Result<()> {
        *self.temp_slot(temp)? = value;
        Ok(())
    }

    /// Slot of a temporary, grown on first write. A program of `n`
    /// instructions never uses a temporary at or beyond `n`.
    fn temp_slot(&mut self, temp: Temp) -> Result<&mut Value> {
        let i = temp.0 as usize;
        if i >= self.code.len() {
            return Err(VmError::MalformedInstruction { pc: self.pc, reason: "temporary out of range" });
        }
        if i >= self.temps.len() {
            self.temps.resize(i + 1, Value::default());
        }
        Ok(&mut self.temps[i])
    }

    fn store(&mut self, target: &Target, value: Value) -> Result<()> {
        let pc = self.pc;
        match target {
            Target::Var(name) => {
                self.vars.insert(name.clone(), value);
                Ok(())
            }
            Target::Element { array, index } => {
                let index = self.int("ASN", &self.load(index))?;
                let element = self.int("ASN", &value)?;
                let slot = usize::try_from(index).map_err(|_| VmError::NegativeIndex { pc, index })?;
                if slot >= MAX_ARRAY_LEN {
                    return Err(VmError::ArrayTooLarge { pc, index, max: MAX_ARRAY_LEN });
                }

                let cell = match array {
                    Operand::Var(name) => self.vars.entry(name.clone()).or_insert_with(|| Value::Array(Vec::new())),
                    Operand::Temp(t) => self.temp_slot(*t)?,
                    Operand::Int(_) => {
                        return Err(VmError::MalformedInstruction { pc, reason: "element write into a literal" })
                    }
                };
                let found = cell.type_name();
                let Value::Array(items) = cell else {
                    return Err(VmError::TypeMismatch { pc, op: "ASN", expected: "array", found });
                };
                if slot >= items.len() {
                    items.resize(slot + 1, 0);
                }
                items[slot] = element;
                Ok(())
            }
        }
    }

    fn int(&self, op: &'static str, value: &Value) -> Result<i64> {
        value.as_int().ok_or(VmError::TypeMismatch { pc: self.pc, op, expected: "integer", found: value.type_name() })
    }
}

/// Floor division (rounds toward negative infinity). `None` on zero divisor or overflow.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn to_delta(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/* ------------------------------ Tests ------------------------------ */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> Operand {
        Operand::var(name)
    }

    fn aop(op: ArithOp, lhs: Operand, rhs: Operand) -> Instruction {
        Instruction::Aop { op, lhs, rhs: Some(rhs), dest: Temp(0) }
    }

    fn eval(instr: Instruction) -> Result<Option<Value>> {
        Vm::new(vec![instr, Instruction::Ret(Some(Operand::Temp(Temp(0))))]).run(&[])
    }

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(-7, -2), Some(3));
        assert_eq!(floor_div(-6, 3), Some(-2));
        assert_eq!(floor_div(1, 0), None);
        assert_eq!(floor_div(i64::MIN, -1), None);
    }

    #[test]
    fn arithmetic_faults() {
        assert_eq!(
            eval(aop(ArithOp::Div, Operand::Int(1), Operand::Int(0))),
            Err(VmError::DivisionByZero { pc: 0 })
        );
        assert_eq!(
            eval(aop(ArithOp::Add, Operand::Int(i64::MAX), Operand::Int(1))),
            Err(VmError::Overflow { pc: 0, op: "+" })
        );
        assert_eq!(
            eval(aop(ArithOp::Div, Operand::Int(i64::MIN), Operand::Int(-1))),
            Err(VmError::Overflow { pc: 0, op: "/" })
        );
    }

    #[test]
    fn copy_and_not() {
        assert_eq!(eval(aop(ArithOp::Copy, Operand::Int(1), Operand::Int(9))), Ok(Some(Value::Int(9))));
        let not = Instruction::Aop { op: ArithOp::Not, lhs: Operand::Int(0), rhs: None, dest: Temp(0) };
        assert_eq!(eval(not), Ok(Some(Value::Bool(true))));
    }

    #[test]
    fn malformed_operand_arity() {
        let binary = Instruction::Aop { op: ArithOp::Add, lhs: Operand::Int(1), rhs: None, dest: Temp(0) };
        assert!(matches!(eval(binary), Err(VmError::MalformedInstruction { pc: 0, .. })));
        let unary = Instruction::Aop { op: ArithOp::Not, lhs: Operand::Int(1), rhs: Some(Operand::Int(1)), dest: Temp(0) };
        assert!(matches!(eval(unary), Err(VmError::MalformedInstruction { pc: 0, .. })));
    }

    #[test]
    fn boolean_operators_set_the_flag() {
        let mut vm = Vm::new(vec![
            Instruction::Com { op: CmpOp::And, lhs: Operand::Int(1), rhs: Operand::Int(2), dest: Temp(0) },
            Instruction::Ret(Some(Operand::Temp(Temp(0)))),
        ]);
        vm.start(&[]);
        assert!(vm.step().unwrap());
        assert!(vm.flag());
        assert!(!vm.step().unwrap());
        assert_eq!(vm.return_value(), Some(&Value::Bool(true)));
    }

    #[test]
    fn last_comparison_wins() {
        let code = vec![
            Instruction::Com { op: CmpOp::Lt, lhs: Operand::Int(1), rhs: Operand::Int(2), dest: Temp(0) },
            Instruction::Com { op: CmpOp::Gt, lhs: Operand::Int(1), rhs: Operand::Int(2), dest: Temp(1) },
            Instruction::Skp(1),
            Instruction::Ret(Some(Operand::Int(1))),
            Instruction::Ret(Some(Operand::Int(2))),
        ];
        assert_eq!(Vm::new(code).run(&[]), Ok(Some(Value::Int(2))));
    }

    #[test]
    fn ordering_on_arrays_is_a_type_mismatch() {
        let code = vec![
            Instruction::Asn {
                target: Target::Element { array: var("a"), index: Operand::Int(0) },
                value: Operand::Int(1),
            },
            Instruction::Com { op: CmpOp::Lt, lhs: var("a"), rhs: Operand::Int(2), dest: Temp(0) },
        ];
        assert_eq!(
            Vm::new(code).run(&[]),
            Err(VmError::TypeMismatch { pc: 1, op: "<", expected: "integer", found: "array" })
        );
    }

    #[test]
    fn element_writes_zero_fill_and_reject_negatives() {
        let write = |index: i64| Instruction::Asn {
            target: Target::Element { array: var("a"), index: Operand::Int(index) },
            value: Operand::Int(7),
        };
        let mut vm = Vm::new(vec![write(3)]);
        vm.run(&[]).unwrap();
        assert_eq!(vm.variables()["a"], Value::Array(vec![0, 0, 0, 7]));

        assert_eq!(Vm::new(vec![write(-1)]).run(&[]), Err(VmError::NegativeIndex { pc: 0, index: -1 }));
        assert!(matches!(
            Vm::new(vec![write(i64::MAX)]).run(&[]),
            Err(VmError::ArrayTooLarge { pc: 0, .. })
        ));
    }

    #[test]
    fn element_write_into_scalar_is_a_type_mismatch() {
        let code = vec![
            Instruction::Asn { target: Target::Var("a".into()), value: Operand::Int(1) },
            Instruction::Asn {
                target: Target::Element { array: var("a"), index: Operand::Int(0) },
                value: Operand::Int(7),
            },
        ];
        assert_eq!(
            Vm::new(code).run(&[]),
            Err(VmError::TypeMismatch { pc: 1, op: "ASN", expected: "array", found: "int" })
        );
    }

    #[test]
    fn reads_out_of_bounds_or_absent_are_zero() {
        let read = |array: &str, index: i64| Instruction::Idx { array: var(array), index: Operand::Int(index), dest: Temp(0) };
        let mut vm = Vm::new(vec![read("a", 0), Instruction::Ret(Some(Operand::Temp(Temp(0))))]);
        assert_eq!(vm.run(&[("a", Value::Array(vec![4]))]), Ok(Some(Value::Int(4))));

        for index in [1, -1] {
            let code = vec![read("a", index), Instruction::Ret(Some(Operand::Temp(Temp(0))))];
            assert_eq!(Vm::new(code).run(&[("a", Value::Array(vec![4]))]), Ok(Some(Value::Int(0))));
        }
        assert_eq!(eval(read("missing", 2)), Ok(Some(Value::Int(0))));
    }

    #[test]
    fn step_limit_stops_infinite_loops() {
        let mut vm = Vm::with_options(vec![Instruction::Jmp(0)], VmOptions::with_step_limit(100));
        assert_eq!(vm.run(&[]), Err(VmError::StepLimitExceeded { limit: 100 }));
        assert_eq!(vm.steps(), 100);
    }

    #[test]
    fn inputs_are_populated_and_unknown_names_rejected() {
        let code = vec![
            aop(ArithOp::Mul, var("n"), Operand::Int(2)),
            Instruction::Ret(Some(Operand::Temp(Temp(0)))),
        ];
        let mut vm = Vm::new(code);
        assert!(vm.set_input("n", Value::Int(21)));
        assert!(!vm.set_input("m", Value::Int(1)));
        assert_eq!(vm.run(&[("m", Value::Int(5))]), Ok(Some(Value::Int(42))));
        assert!(!vm.variables().contains_key("m"));

        // explicit bindings override populated inputs
        assert_eq!(vm.run(&[("n", Value::Int(5))]), Ok(Some(Value::Int(10))));
    }

    #[test]
    fn store_persists_between_runs() {
        // s <- s + 1 ; return s
        let code = vec![
            aop(ArithOp::Add, var("s"), Operand::Int(1)),
            Instruction::Asn { target: Target::Var("s".into()), value: Operand::Temp(Temp(0)) },
            Instruction::Ret(Some(var("s"))),
        ];
        let mut vm = Vm::new(code);
        assert_eq!(vm.run(&[]), Ok(Some(Value::Int(1))));
        assert_eq!(vm.run(&[]), Ok(Some(Value::Int(2))));
        assert_eq!(vm.pc(), 4);
    }

    #[test]
    fn flag_and_return_slot_reset_between_runs() {
        let code = vec![
            Instruction::Skp(1),
            Instruction::Ret(Some(Operand::Int(99))),
            Instruction::Com { op: CmpOp::Eq, lhs: var("s"), rhs: Operand::Int(0), dest: Temp(0) },
            Instruction::Skp(2),
            Instruction::Asn { target: Target::Var("s".into()), value: Operand::Int(1) },
            Instruction::Ret(Some(Operand::Int(7))),
            Instruction::Ret(None),
        ];
        let mut vm = Vm::new(code);

        assert_eq!(vm.run(&[]), Ok(Some(Value::Int(7))));
        assert!(vm.flag());

        // the leading SKP sees a cleared flag; `s` is now 1 so the bare RET is reached
        assert_eq!(vm.run(&[]), Ok(None));
        assert_eq!(vm.return_value(), None);
        assert!(!vm.flag());
    }

    #[test]
    fn start_clears_the_registers() {
        let mut vm = Vm::new(vec![
            Instruction::Com { op: CmpOp::Lt, lhs: Operand::Int(1), rhs: Operand::Int(2), dest: Temp(0) },
            Instruction::Ret(Some(Operand::Int(3))),
        ]);
        vm.run(&[]).unwrap();
        assert_eq!((vm.flag(), vm.return_value().cloned()), (true, Some(Value::Int(3))));

        vm.start(&[]);
        assert_eq!((vm.pc(), vm.flag(), vm.return_value(), vm.steps()), (0, false, None, 0));
    }

    #[test]
    fn out_of_range_temporaries_are_malformed() {
        let malformed: Result<Option<Value>> = Err(VmError::MalformedInstruction { pc: 0, reason: "temporary out of range" });

        let code = vec![
            Instruction::Aop { op: ArithOp::Add, lhs: Operand::Int(1), rhs: Some(Operand::Int(2)), dest: Temp(u32::MAX) },
            Instruction::Ret(Some(Operand::Temp(Temp(u32::MAX)))),
        ];
        assert_eq!(Vm::new(code).run(&[]), malformed);

        let write = Instruction::Asn {
            target: Target::Element { array: Operand::Temp(Temp(u32::MAX)), index: Operand::Int(0) },
            value: Operand::Int(1),
        };
        assert_eq!(Vm::new(vec![write]).run(&[]), malformed);
    }
}
