//! Debugger-flow tests: stepping, breakpoints and fault accounting across
//! call frames.

use neodbg_vm::{ExecutionEngine, Script, VMState};

fn engine_with(script: &[u8]) -> ExecutionEngine {
    let mut engine = ExecutionEngine::new();
    engine
        .load_script(Script::new(script.to_vec()).unwrap(), -1)
        .unwrap();
    engine
}

#[test]
fn fresh_load_is_ready_at_zero() {
    let engine = engine_with(&[0x11, 0x12, 0x9e]);
    assert_eq!(engine.state(), VMState::Break);
    assert_eq!(engine.invocation_stack().len(), 1);
    let context = engine.current_context().unwrap();
    assert_eq!(context.instruction_pointer(), 0);
    assert!(context.evaluation_stack().is_empty());
}

#[test]
fn step_over_and_out_agree_on_depth() {
    // 0: CALL +4 -> 4; 2: PUSH2; 3: RET; 4: CALL +3 -> 7; 6: RET; 7: PUSH1; 8: RET
    let script = [0x34, 0x04, 0x12, 0x40, 0x34, 0x03, 0x40, 0x11, 0x40];
    // step_over at the entry CALL stays at depth 1.
    let mut engine = engine_with(&script);
    engine.step_over();
    assert_eq!(engine.invocation_depth(), 1);
    assert_eq!(engine.current_context().unwrap().instruction_pointer(), 2);

    // step_into enters the nested frame; step_out returns from it.
    let mut engine = engine_with(&script);
    engine.step_into();
    assert_eq!(engine.invocation_depth(), 2);
    engine.step_into(); // CALL +3 inside the first callee
    assert_eq!(engine.invocation_depth(), 3);
    engine.step_out();
    assert_eq!(engine.invocation_depth(), 2);
    engine.step_out();
    assert_eq!(engine.invocation_depth(), 1);
}

#[test]
fn breakpoint_wins_over_step_out() {
    // 0: CALL +3 -> 3; 2: RET; 3: PUSH1; 4: PUSH2; 5: RET
    let script = [0x34, 0x03, 0x40, 0x11, 0x12, 0x40];
    let mut engine = engine_with(&script);
    engine.step_into(); // inside the callee at 3
    engine.add_breakpoint(4).unwrap();
    // step_out stops at the breakpoint before leaving the frame.
    assert_eq!(engine.step_out(), VMState::Break);
    assert_eq!(engine.invocation_depth(), 2);
    assert_eq!(engine.current_context().unwrap().instruction_pointer(), 4);
}

#[test]
fn completed_step_parks_in_break_not_halt() {
    let mut engine = engine_with(&[0x11, 0x12]);
    assert_eq!(engine.step_into(), VMState::Break);
    assert_eq!(engine.step_into(), VMState::Break);
    // Only the implicit RET actually ends execution.
    assert_eq!(engine.step_into(), VMState::Halt);
    assert_eq!(engine.result_stack().len(), 2);
}

#[test]
fn fault_message_has_ip_and_mnemonic() {
    // PUSH1 PUSH0 DIV
    let mut engine = engine_with(&[0x11, 0x10, 0xa1]);
    assert_eq!(engine.continue_execution(), VMState::Fault);
    let message = engine.fault_message().unwrap();
    assert!(message.starts_with("at instruction 2 (DIV):"), "{message}");
    assert!(message.contains("division by zero"), "{message}");
}

#[test]
fn reference_cap_faults_instead_of_exhausting_memory() {
    // 0: NEWARRAY0; 1: DUP; 2: JMP -1: builds stack references forever.
    let script = [0xc2, 0x4a, 0x22, 0xff];
    let mut engine = engine_with(&script);
    assert_eq!(engine.continue_execution(), VMState::Fault);
    assert!(engine
        .fault_message()
        .unwrap()
        .contains("too many references"));
}

#[test]
fn cyclic_array_executes_and_counts() {
    // NEWARRAY0; DUP; DUP; APPEND: the array contains itself.
    let script = [0xc2, 0x4a, 0x4a, 0xcf];
    let mut engine = engine_with(&script);
    assert_eq!(engine.continue_execution(), VMState::Halt);
    assert_eq!(engine.result_stack().len(), 1);
}
