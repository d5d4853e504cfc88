// Path: crates/vm/src/machine.rs
//! The built-in interpreter: a metered, EVM-flavoured stack machine.
//!
//! It implements the arithmetic/comparison core, call environment reads,
//! memory, contract storage and control flow. Storage cells are 32-byte
//! words; a zero write clears the cell.

use primitive_types::U256;
use std::collections::HashSet;

use crate::{CallParams, CallState, Vm, VmError, VmOutput};

const STACK_LIMIT: usize = 1024;
const MEMORY_LIMIT: usize = 1 << 20;

// Opcode bytes, EVM numbering.
const STOP: u8 = 0x00;
const ADD: u8 = 0x01;
const MUL: u8 = 0x02;
const SUB: u8 = 0x03;
const DIV: u8 = 0x04;
const LT: u8 = 0x10;
const GT: u8 = 0x11;
const EQ: u8 = 0x14;
const ISZERO: u8 = 0x15;
const CALLER: u8 = 0x33;
const CALLVALUE: u8 = 0x34;
const CALLDATALOAD: u8 = 0x35;
const CALLDATASIZE: u8 = 0x36;
const POP: u8 = 0x50;
const MLOAD: u8 = 0x51;
const MSTORE: u8 = 0x52;
const SLOAD: u8 = 0x54;
const SSTORE: u8 = 0x55;
const JUMP: u8 = 0x56;
const JUMPI: u8 = 0x57;
const JUMPDEST: u8 = 0x5b;
const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7f;
const DUP1: u8 = 0x80;
const DUP16: u8 = 0x8f;
const SWAP1: u8 = 0x90;
const SWAP16: u8 = 0x9f;
const RETURN: u8 = 0xf3;
const REVERT: u8 = 0xfd;

fn base_gas(op: u8) -> u64 {
    match op {
        STOP | JUMPDEST => 1,
        SLOAD => 50,
        SSTORE => 100,
        JUMP | JUMPI => 8,
        _ => 3,
    }
}

// JUMPDEST positions, skipping bytes inside PUSH immediates.
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut pc = 0;
    while pc < code.len() {
        let op = code[pc];
        if op == JUMPDEST {
            dests.insert(pc);
        }
        if (PUSH1..=PUSH32).contains(&op) {
            pc += (op - PUSH1) as usize + 1;
        }
        pc += 1;
    }
    dests
}

struct Frame<'a> {
    code: &'a [u8],
    params: &'a CallParams,
    pc: usize,
    stack: Vec<U256>,
    memory: Vec<u8>,
    gas_used: u64,
    jump_dests: HashSet<usize>,
}

impl<'a> Frame<'a> {
    fn new(code: &'a [u8], params: &'a CallParams) -> Self {
        Frame {
            code,
            params,
            pc: 0,
            stack: Vec::new(),
            memory: Vec::new(),
            gas_used: 0,
            jump_dests: analyze_jump_dests(code),
        }
    }

    fn charge(&mut self, cost: u64) -> Result<(), VmError> {
        let next = self.gas_used.saturating_add(cost);
        if next > self.params.gas_limit {
            return Err(VmError::OutOfGas {
                gas_limit: self.params.gas_limit,
            });
        }
        self.gas_used = next;
        Ok(())
    }

    fn push(&mut self, value: U256) -> Result<(), VmError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(VmError::StackOverflow(self.pc));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<U256, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow(self.pc))
    }

    fn memory_slice(&mut self, offset: U256, len: U256) -> Result<(usize, usize), VmError> {
        let offset = usize::try_from(offset).map_err(|_| VmError::MemoryOutOfBounds(self.pc))?;
        let len = usize::try_from(len).map_err(|_| VmError::MemoryOutOfBounds(self.pc))?;
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= MEMORY_LIMIT)
            .ok_or(VmError::MemoryOutOfBounds(self.pc))?;
        if self.memory.len() < end {
            self.memory.resize(end, 0);
        }
        Ok((offset, len))
    }

    fn word_at(data: &[u8], offset: U256) -> U256 {
        let mut word = [0u8; 32];
        if let Ok(offset) = usize::try_from(offset) {
            for (i, slot) in word.iter_mut().enumerate() {
                *slot = data.get(offset + i).copied().unwrap_or(0);
            }
        }
        U256::from_big_endian(&word)
    }

    fn run(&mut self, state: &mut dyn CallState) -> Result<Vec<u8>, VmError> {
        while self.pc < self.code.len() {
            let op = self.code[self.pc];
            self.charge(base_gas(op))?;
            match op {
                STOP => return Ok(Vec::new()),
                ADD => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(a.overflowing_add(b).0)?;
                }
                MUL => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(a.overflowing_mul(b).0)?;
                }
                SUB => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(a.overflowing_sub(b).0)?;
                }
                DIV => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(if b.is_zero() { U256::zero() } else { a / b })?;
                }
                LT => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(U256::from((a < b) as u8))?;
                }
                GT => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(U256::from((a > b) as u8))?;
                }
                EQ => {
                    let (a, b) = (self.pop()?, self.pop()?);
                    self.push(U256::from((a == b) as u8))?;
                }
                ISZERO => {
                    let a = self.pop()?;
                    self.push(U256::from(a.is_zero() as u8))?;
                }
                CALLER => {
                    self.push(U256::from_big_endian(&self.params.caller))?;
                }
                CALLVALUE => {
                    self.push(U256::from(self.params.value))?;
                }
                CALLDATALOAD => {
                    let offset = self.pop()?;
                    let word = Self::word_at(&self.params.input, offset);
                    self.push(word)?;
                }
                CALLDATASIZE => {
                    self.push(U256::from(self.params.input.len()))?;
                }
                POP => {
                    self.pop()?;
                }
                MLOAD => {
                    let offset = self.pop()?;
                    let (offset, _) = self.memory_slice(offset, U256::from(32))?;
                    let mut word = [0u8; 32];
                    word.copy_from_slice(&self.memory[offset..offset + 32]);
                    self.push(U256::from_big_endian(&word))?;
                }
                MSTORE => {
                    let (offset, value) = (self.pop()?, self.pop()?);
                    let (offset, _) = self.memory_slice(offset, U256::from(32))?;
                    let mut word = [0u8; 32];
                    value.to_big_endian(&mut word);
                    self.memory[offset..offset + 32].copy_from_slice(&word);
                }
                SLOAD => {
                    let key = self.pop()?;
                    let mut key_bytes = [0u8; 32];
                    key.to_big_endian(&mut key_bytes);
                    let value = state.get_storage(&key_bytes)?;
                    self.push(Self::word_at(&value, U256::zero()))?;
                }
                SSTORE => {
                    let (key, value) = (self.pop()?, self.pop()?);
                    let mut key_bytes = [0u8; 32];
                    key.to_big_endian(&mut key_bytes);
                    if value.is_zero() {
                        state.set_storage(&key_bytes, &[])?;
                    } else {
                        let mut value_bytes = [0u8; 32];
                        value.to_big_endian(&mut value_bytes);
                        state.set_storage(&key_bytes, &value_bytes)?;
                    }
                }
                JUMP => {
                    let dest = self.pop()?;
                    self.pc = self.jump_to(dest)?;
                    continue;
                }
                JUMPI => {
                    let (dest, cond) = (self.pop()?, self.pop()?);
                    if !cond.is_zero() {
                        self.pc = self.jump_to(dest)?;
                        continue;
                    }
                }
                JUMPDEST => {}
                PUSH1..=PUSH32 => {
                    let width = (op - PUSH1) as usize + 1;
                    let start = self.pc + 1;
                    let mut word = [0u8; 32];
                    for i in 0..width {
                        word[32 - width + i] = self.code.get(start + i).copied().unwrap_or(0);
                    }
                    self.push(U256::from_big_endian(&word))?;
                    self.pc += width + 1;
                    continue;
                }
                DUP1..=DUP16 => {
                    let depth = (op - DUP1) as usize;
                    if self.stack.len() <= depth {
                        return Err(VmError::StackUnderflow(self.pc));
                    }
                    let value = self.stack[self.stack.len() - 1 - depth];
                    self.push(value)?;
                }
                SWAP1..=SWAP16 => {
                    let depth = (op - SWAP1) as usize + 1;
                    let top = self.stack.len();
                    if top <= depth {
                        return Err(VmError::StackUnderflow(self.pc));
                    }
                    self.stack.swap(top - 1, top - 1 - depth);
                }
                RETURN => {
                    let (offset, len) = (self.pop()?, self.pop()?);
                    let (offset, len) = self.memory_slice(offset, len)?;
                    return Ok(self.memory[offset..offset + len].to_vec());
                }
                REVERT => {
                    let (offset, len) = (self.pop()?, self.pop()?);
                    let (offset, len) = self.memory_slice(offset, len)?;
                    return Err(VmError::Reverted {
                        data: self.memory[offset..offset + len].to_vec(),
                        gas_used: self.gas_used,
                    });
                }
                other => return Err(VmError::InvalidOpcode(other)),
            }
            self.pc += 1;
        }
        Ok(Vec::new())
    }

    fn jump_to(&self, dest: U256) -> Result<usize, VmError> {
        let dest = usize::try_from(dest).map_err(|_| VmError::BadJumpDestination(usize::MAX))?;
        if !self.jump_dests.contains(&dest) {
            return Err(VmError::BadJumpDestination(dest));
        }
        Ok(dest)
    }
}

/// The built-in interpreter.
#[derive(Debug, Default, Clone, Copy)]
pub struct Machine;

impl Machine {
    /// A new interpreter instance.
    pub fn new() -> Self {
        Machine
    }
}

impl Vm for Machine {
    fn execute(
        &self,
        state: &mut dyn CallState,
        code: &[u8],
        params: &CallParams,
    ) -> Result<VmOutput, VmError> {
        let mut frame = Frame::new(code, params);
        let return_data = frame.run(state)?;
        Ok(VmOutput {
            return_data,
            gas_used: frame.gas_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemState(HashMap<Vec<u8>, Vec<u8>>);

    impl CallState for MemState {
        fn get_storage(&self, key: &[u8]) -> Result<Vec<u8>, VmError> {
            Ok(self.0.get(key).cloned().unwrap_or_default())
        }
        fn set_storage(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError> {
            if value.is_empty() {
                self.0.remove(key);
            } else {
                self.0.insert(key.to_vec(), value.to_vec());
            }
            Ok(())
        }
    }

    fn params(gas_limit: u64) -> CallParams {
        CallParams {
            caller: [1; 20],
            callee: [2; 20],
            input: vec![],
            value: 0,
            gas_limit,
        }
    }

    fn run(code: &[u8], gas_limit: u64) -> Result<VmOutput, VmError> {
        let mut state = MemState::default();
        Machine::new().execute(&mut state, code, &params(gas_limit))
    }

    #[test]
    fn arithmetic_and_return() {
        // PUSH1 2, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [
            PUSH1, 2, PUSH1, 3, ADD, PUSH1, 0, MSTORE, PUSH1, 32, PUSH1, 0, RETURN,
        ];
        let out = run(&code, 1000).unwrap();
        assert_eq!(U256::from_big_endian(&out.return_data), U256::from(5));
        assert!(out.gas_used > 0);
    }

    #[test]
    fn revert_carries_payload_and_gas() {
        // PUSH2 0xdead, PUSH1 0, MSTORE, PUSH1 2, PUSH1 30, REVERT
        let code = [
            PUSH1 + 1, 0xde, 0xad, PUSH1, 0, MSTORE, PUSH1, 2, PUSH1, 30, REVERT,
        ];
        let err = run(&code, 1000).unwrap_err();
        match err {
            VmError::Reverted { data, gas_used } => {
                assert_eq!(data, vec![0xde, 0xad]);
                assert!(gas_used > 0);
            }
            other => panic!("expected revert, got {other:?}"),
        }
    }

    #[test]
    fn out_of_gas_is_hard_fault() {
        let code = [PUSH1, 1, PUSH1, 2, ADD, STOP];
        let err = run(&code, 2).unwrap_err();
        assert_eq!(err, VmError::OutOfGas { gas_limit: 2 });
        assert!(!err.is_revert());
    }

    #[test]
    fn storage_roundtrip() {
        // PUSH1 7, PUSH1 1, SSTORE, PUSH1 1, SLOAD, PUSH1 0, MSTORE,
        // PUSH1 32, PUSH1 0, RETURN
        let code = [
            PUSH1, 7, PUSH1, 1, SSTORE, PUSH1, 1, SLOAD, PUSH1, 0, MSTORE, PUSH1, 32, PUSH1, 0,
            RETURN,
        ];
        let out = run(&code, 1000).unwrap();
        assert_eq!(U256::from_big_endian(&out.return_data), U256::from(7));
    }

    #[test]
    fn jump_requires_jumpdest() {
        // PUSH1 4, JUMP, STOP, <no JUMPDEST at 4>
        let code = [PUSH1, 4, JUMP, STOP, ADD];
        assert!(matches!(
            run(&code, 1000).unwrap_err(),
            VmError::BadJumpDestination(4)
        ));
        // PUSH1 3, JUMP, JUMPDEST, STOP
        let code = [PUSH1, 3, JUMP, JUMPDEST, STOP];
        run(&code, 1000).unwrap();
    }

    #[test]
    fn calldata_reads() {
        // CALLDATASIZE, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [CALLDATASIZE, PUSH1, 0, MSTORE, PUSH1, 32, PUSH1, 0, RETURN];
        let mut state = MemState::default();
        let mut p = params(1000);
        p.input = vec![1, 2, 3];
        let out = Machine::new().execute(&mut state, &code, &p).unwrap();
        assert_eq!(U256::from_big_endian(&out.return_data), U256::from(3));
    }
}
