//! Stepping, breakpoints, and exception stops driven through a scripted ARM engine.

#![allow(clippy::pedantic, clippy::nursery)]

mod support;

use bitflags as _;
#[cfg(feature = "capstone")]
use capstone as _;
use log as _;
use proptest as _;
use regex as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
#[cfg(feature = "unicorn")]
use unicorn_engine as _;

use debugger_core::{
    Arch, BreakpointState, Debugger, DebuggerConfig, DebuggerError, MemRegion, ProcessorMode,
    RunState, StopReason,
};
use rstest::rstest;
use support::{
    add, arm_debugger, arm_program, bkpt, branch, mov, reg, svc, thumb_bkpt,
    thumb_debugger, thumb_movs, thumb_program, write_file, CODE_BASE, CPSR_T, NOP, THUMB_NOP, UDF,
};

#[test]
fn step_executes_exactly_the_requested_instructions() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(
        dir.path(),
        &[mov(0, 1), add(0, 0, 1), add(0, 0, 1), add(0, 0, 1), NOP],
    );
    assert_eq!(debugger.run_state(), RunState::Idle);

    let outcome = debugger.step(2).unwrap();
    assert_eq!(outcome.stop, StopReason::InstructionCount);
    assert_eq!(outcome.executed, 2);
    assert_eq!(outcome.pc, CODE_BASE + 8);
    assert!(!outcome.exception.occurred());
    assert_eq!(reg(&debugger, "r0"), 2);
    assert_eq!(
        debugger.run_state(),
        RunState::Stopped(StopReason::InstructionCount)
    );

    let outcome = debugger.step(1).unwrap();
    assert_eq!(outcome.pc, CODE_BASE + 12);
    assert_eq!(reg(&debugger, "r0"), 3);
}

#[test]
fn zero_step_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[NOP]);
    assert!(matches!(
        debugger.step(0),
        Err(DebuggerError::InvalidStepCount)
    ));
    assert_eq!(debugger.run_state(), RunState::Idle);
    assert!(debugger.engine().starts.is_empty());
}

#[test]
fn resume_stops_before_the_breakpoint_instruction() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[mov(0, 1), mov(0, 2), mov(0, 3), NOP]);
    let breakpoint = debugger.set_breakpoint(CODE_BASE + 4);

    let outcome = debugger.resume().unwrap();
    assert_eq!(
        outcome.stop,
        StopReason::Breakpoint {
            address: CODE_BASE + 4
        }
    );
    assert_eq!(outcome.pc, CODE_BASE + 4);
    assert_eq!(outcome.executed, 1);
    assert_eq!(reg(&debugger, "r0"), 1);

    let hit = debugger.breakpoints_at(CODE_BASE + 4);
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].id(), breakpoint.id());
    assert_eq!(hit[0].hit_count(), 1);
    assert_eq!(hit[0].state(), BreakpointState::Triggered);
}

#[test]
fn triggered_breakpoint_rearms_once_execution_moves_on() {
    let dir = tempfile::tempdir().unwrap();
    // r0 = 0; loop: r0 += 1; b loop
    let mut debugger = arm_debugger(dir.path(), &[mov(0, 0), add(0, 0, 1), branch(-1)]);
    let breakpoint = debugger.set_breakpoint(CODE_BASE + 4);

    for expected in 0..3 {
        let outcome = debugger.resume().unwrap();
        assert_eq!(
            outcome.stop,
            StopReason::Breakpoint {
                address: CODE_BASE + 4
            }
        );
        assert_eq!(reg(&debugger, "r0"), expected);
    }
    let breakpoints = debugger.breakpoints();
    assert_eq!(breakpoints[0].id(), breakpoint.id());
    assert_eq!(breakpoints[0].hit_count(), 3);
}

#[test]
fn breakpoint_at_the_starting_pc_fires_first_then_steps_over() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[mov(0, 7), NOP, NOP]);
    debugger.set_breakpoint(CODE_BASE);

    let outcome = debugger.step(1).unwrap();
    assert_eq!(outcome.stop, StopReason::Breakpoint { address: CODE_BASE });
    assert_eq!(outcome.executed, 0);
    assert_eq!(reg(&debugger, "r0"), 0);

    let outcome = debugger.step(1).unwrap();
    assert_eq!(outcome.stop, StopReason::InstructionCount);
    assert_eq!(outcome.pc, CODE_BASE + 4);
    assert_eq!(reg(&debugger, "r0"), 7);
}

#[test]
fn every_breakpoint_sharing_an_address_counts_the_hit() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[NOP, NOP, NOP]);
    let first = debugger.set_breakpoint(CODE_BASE + 8);
    let second = debugger.set_breakpoint(CODE_BASE + 8);
    assert_ne!(first.id(), second.id());

    debugger.resume().unwrap();
    let hits: Vec<u64> = debugger
        .breakpoints_at(CODE_BASE + 8)
        .iter()
        .map(|bp| bp.hit_count())
        .collect();
    assert_eq!(hits, vec![1, 1]);
}

#[test]
fn disabled_breakpoints_are_skipped_until_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(
        dir.path(),
        &[mov(0, 0), add(0, 0, 1), branch(-1)],
    );
    let breakpoint = debugger.set_breakpoint(CODE_BASE + 4);
    assert!(debugger.disable_breakpoint(breakpoint.id()));

    let outcome = debugger.step(10).unwrap();
    assert_eq!(outcome.stop, StopReason::InstructionCount);
    assert_eq!(debugger.breakpoints()[0].hit_count(), 0);
    assert_eq!(debugger.breakpoints()[0].state(), BreakpointState::Inactive);

    assert!(debugger.enable_breakpoint(breakpoint.id()));
    let outcome = debugger.resume().unwrap();
    assert_eq!(
        outcome.stop,
        StopReason::Breakpoint {
            address: CODE_BASE + 4
        }
    );
    assert_eq!(debugger.breakpoints()[0].hit_count(), 1);
}

#[test]
fn removed_breakpoints_no_longer_stop_execution() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[NOP, NOP, bkpt(1)]);
    let kept = debugger.set_breakpoint(CODE_BASE + 4);
    debugger.set_breakpoint(CODE_BASE + 4);
    assert_eq!(debugger.remove_breakpoints_at(CODE_BASE + 4), 2);
    assert!(debugger.remove_breakpoint(kept.id()).is_none());
    assert!(debugger.breakpoints().is_empty());

    let outcome = debugger.resume().unwrap();
    assert_eq!(outcome.stop, StopReason::Exception { number: 7 });

    debugger.set_breakpoint(CODE_BASE);
    debugger.remove_all_breakpoints();
    let fresh = debugger.set_breakpoint(CODE_BASE);
    assert!(fresh.id().get() > kept.id().get());
}

#[test]
fn reset_breakpoint_clears_hits() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[NOP, NOP]);
    let breakpoint = debugger.set_breakpoint(CODE_BASE + 4);
    debugger.resume().unwrap();
    assert!(debugger.reset_breakpoint(breakpoint.id()));
    let after = debugger.breakpoints()[0].clone();
    assert_eq!(after.hit_count(), 0);
    assert_eq!(after.state(), BreakpointState::Armed);
}

#[rstest]
#[case::bkpt(bkpt(0x1234), 7, 0, "Breakpoint #0x1234 (4660)")]
#[case::bkpt_zero(bkpt(0), 7, 0, "Breakpoint #0x0000 (0)")]
#[case::svc(svc(0x42), 2, 4, "Software Interrupt")]
#[case::undefined(UDF, 1, 0, "Undefined Instruction")]
fn exceptions_stop_with_a_description(
    #[case] instruction: u32,
    #[case] number: u32,
    #[case] pc_advance: u64,
    #[case] description: &str,
) {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[NOP, instruction, NOP, NOP]);

    let outcome = debugger.resume().unwrap();
    assert_eq!(outcome.stop, StopReason::Exception { number });
    assert!(outcome.exception.occurred());
    assert_eq!(outcome.exception.number(), number);
    assert_eq!(outcome.exception.description(), description);
    assert_eq!(outcome.exception.pc(), CODE_BASE + 4 + pc_advance);
    assert_eq!(outcome.pc, CODE_BASE + 4 + pc_advance);
    assert_eq!(
        debugger.run_state(),
        RunState::Stopped(StopReason::Exception { number })
    );
}

#[test]
fn running_off_the_end_of_code_reports_end_of_code() {
    let dir = tempfile::tempdir().unwrap();
    let program = arm_program(&[mov(0, 5), NOP, add(0, 0, 1)]);
    let path = write_file(dir.path(), "code.bin", &program);
    let region = MemRegion::new("code", CODE_BASE, program.len() as u64, "rx".parse().unwrap())
        .with_input_file(&path);
    let config = DebuggerConfig::new(Default::default())
        .with_region(region)
        .unwrap();
    let mut debugger: support::TestDebugger = Debugger::new(config).unwrap();

    let outcome = debugger.resume().unwrap();
    assert_eq!(outcome.stop, StopReason::EndOfCode);
    assert_eq!(outcome.executed, 3);
    assert_eq!(outcome.pc, CODE_BASE + 12);
    assert_eq!(reg(&debugger, "r0"), 6);
    assert_eq!(
        debugger.run_state(),
        RunState::Stopped(StopReason::EndOfCode)
    );
}

#[test]
fn thumb_state_survives_a_stop_inside_the_code_hook() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = thumb_debugger(
        dir.path(),
        &[thumb_movs(0, 1), thumb_movs(1, 2), THUMB_NOP, thumb_bkpt(0x2a), THUMB_NOP],
    );
    assert_eq!(debugger.engine().starts, Vec::<u64>::new());

    let outcome = debugger.step(1).unwrap();
    assert_eq!(outcome.stop, StopReason::InstructionCount);
    assert_eq!(outcome.pc, CODE_BASE + 2);
    assert_eq!(debugger.current_mode().unwrap(), ProcessorMode::Thumb);
    assert_ne!(reg(&debugger, "cpsr") & CPSR_T, 0);
    assert_eq!(debugger.pc().unwrap(), (CODE_BASE + 2) | 1);
    assert_eq!(reg(&debugger, "r0"), 1);
    assert_eq!(debugger.engine().starts, vec![CODE_BASE | 1]);

    let outcome = debugger.resume().unwrap();
    assert_eq!(outcome.stop, StopReason::Exception { number: 7 });
    assert_eq!(outcome.exception.description(), "Breakpoint #0x002a (42)");
    assert_eq!(outcome.pc, CODE_BASE + 6);
    assert_eq!(reg(&debugger, "r1"), 2);
    assert_eq!(debugger.engine().starts[1], (CODE_BASE + 2) | 1);
}

#[test]
fn stop_without_the_engine_quirk_restores_the_same_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = thumb_debugger(dir.path(), &[THUMB_NOP, THUMB_NOP, THUMB_NOP]);
    debugger.engine_mut().clobber_on_stop = false;
    let outcome = debugger.step(2).unwrap();
    assert_eq!(outcome.pc, CODE_BASE + 4);
    assert_eq!(debugger.current_mode().unwrap(), ProcessorMode::Thumb);
}

#[test]
fn thumb_breakpoint_in_the_last_halfword_of_code_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let program = thumb_program(&[THUMB_NOP, thumb_bkpt(5)]);
    let path = write_file(dir.path(), "code.bin", &program);
    let region = MemRegion::new("code", CODE_BASE, program.len() as u64, "rx".parse().unwrap())
        .with_input_file(&path);
    let config = DebuggerConfig::new("arm:thumb".parse().unwrap())
        .with_region(region)
        .unwrap();
    let mut debugger: support::TestDebugger = Debugger::new(config).unwrap();

    let outcome = debugger.resume().unwrap();
    assert_eq!(outcome.stop, StopReason::Exception { number: 7 });
    assert_eq!(outcome.exception.description(), "Breakpoint #0x0005 (5)");
    assert_eq!(outcome.exception.pc(), CODE_BASE + 2);
}

#[test]
fn hook_failures_surface_after_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let program = arm_program(&[NOP, svc(1)]);
    let path = write_file(dir.path(), "code.bin", &program);
    let region = MemRegion::new("code", CODE_BASE, program.len() as u64, "rx".parse().unwrap())
        .with_input_file(&path);
    let config = DebuggerConfig::new(Default::default())
        .with_region(region)
        .unwrap();
    let mut debugger: support::TestDebugger = Debugger::new(config).unwrap();

    // The exception handler reads the instruction after the svc, which is unmapped.
    let err = debugger.resume().unwrap_err();
    assert!(matches!(
        err,
        DebuggerError::MemoryRead { address, .. } if address == CODE_BASE + 8
    ));
    assert_eq!(debugger.run_state(), RunState::Idle);
}

#[test]
fn engine_faults_are_reported_as_run_errors() {
    let dir = tempfile::tempdir().unwrap();
    // Branch into the non-executable stack region.
    let offset = i32::try_from((0x8000 - CODE_BASE) / 4).unwrap();
    let mut debugger = arm_debugger(dir.path(), &[branch(offset)]);
    let err = debugger.resume().unwrap_err();
    assert!(matches!(err, DebuggerError::Run(_)));
    assert_eq!(debugger.run_state(), RunState::Idle);
}

#[test]
fn snapshot_restore_failures_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut debugger = arm_debugger(dir.path(), &[NOP, NOP]);
    let r0 = debugger.arch().register("r0").unwrap().engine_id;
    debugger.engine_mut().failing_register_write = Some(r0);
    let err = debugger.step(1).unwrap_err();
    assert!(matches!(
        err,
        DebuggerError::RegisterWrite { register: "r0", .. }
    ));
}
