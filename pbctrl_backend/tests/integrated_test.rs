use pbctrl_backend::mock::{CallArgs, MockCall, MockLoader, MockSpinApi};
use pbctrl_backend::units::US;
use pbctrl_backend::*;

fn mock_board() -> (MockSpinApi, PulseBlaster<MockLoader>) {
    let mock = MockSpinApi::new();
    let pb = PulseBlaster::new(MockLoader::new(mock.clone()));
    (mock, pb)
}

fn call(entry: EntryPoint, args: CallArgs) -> MockCall {
    MockCall { entry, args }
}

#[test]
fn library_loads_once_on_first_call() {
    let (_mock, mut pb) = mock_board();
    assert!(!pb.is_loaded());
    assert_eq!(pb.loader().load_count(), 0);

    pb.init().unwrap();
    assert!(pb.is_loaded());
    assert_eq!(pb.loader().load_count(), 1);

    pb.core_clock(75.0).unwrap();
    pb.version().unwrap();
    assert_eq!(pb.loader().load_count(), 1);
}

#[test]
fn failed_load_is_retried() {
    let mut pb = PulseBlaster::new(MockLoader::new(MockSpinApi::new()).failing("no spinapi here"));

    let err = pb.init().unwrap_err();
    assert!(matches!(err, SpinError::LoadFailed { .. }));
    assert!(!pb.is_loaded());
    assert!(pb.count_boards().is_err());
    assert_eq!(pb.loader().load_count(), 2);
}

#[test]
fn unsupported_platform_fails_before_loading() {
    let loader = NativeLoader::for_platform(LoaderConfig::new(), Platform::new("plan9", 64));
    let mut pb = PulseBlaster::new(loader);

    let err = pb.init().unwrap_err();
    assert!(err.is_unsupported_platform());
    assert!(pb.select_board(0).unwrap_err().is_unsupported_platform());
    assert!(!pb.is_loaded());
}

#[test]
fn nonzero_policy_reports_library_message() {
    let (mock, mut pb) = mock_board();
    mock.set_code(EntryPoint::Init, 1);
    mock.set_error_message("Board not found");

    let err = pb.init().unwrap_err();
    assert_eq!(err.native_message(), Some("Board not found"));
    match err {
        SpinError::Native { symbol, code, .. } => {
            assert_eq!(symbol, "pb_init");
            assert_eq!(code, 1);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(mock.entries(), vec![EntryPoint::Init, EntryPoint::GetError]);

    mock.set_code(EntryPoint::Stop, -1);
    assert!(pb.stop().is_err());
    mock.clear_code(EntryPoint::Init);
    assert!(pb.init().is_ok());
}

#[test]
fn negative_policy_accepts_positive_codes() {
    let (mock, mut pb) = mock_board();
    mock.set_error_message("Frequency out of range");

    mock.set_code(EntryPoint::SetFreq, 1);
    pb.set_freq(10.0).unwrap();
    mock.set_code(EntryPoint::SetFreq, -1);
    let err = pb.set_freq(1e6).unwrap_err();
    assert_eq!(err.native_message(), Some("Frequency out of range"));

    mock.set_code(EntryPoint::SetPhase, 3);
    pb.set_phase(90.0).unwrap();
    mock.set_code(EntryPoint::SetAmp, -2);
    assert!(pb.set_amp(0.5, 0).is_err());
    mock.set_code(EntryPoint::SelectDds, -1);
    assert!(pb.select_dds(1).is_err());
}

#[test]
fn count_boards_returns_count() {
    let (mock, mut pb) = mock_board();
    mock.set_board_count(3);
    assert_eq!(pb.count_boards().unwrap(), 3);

    mock.set_board_count(0);
    assert_eq!(pb.count_boards().unwrap(), 0);

    mock.set_code(EntryPoint::CountBoards, -1);
    assert!(pb.count_boards().is_err());
}

#[test]
fn core_clock_code_is_ignored() {
    let (mock, mut pb) = mock_board();
    mock.set_code(EntryPoint::CoreClock, 42);
    pb.core_clock(100.0).unwrap();
    assert_eq!(mock.count(EntryPoint::GetError), 0);

    mock.set_code(EntryPoint::WriteRegister, -1);
    assert_eq!(pb.write_register(0x40008, 0).unwrap(), -1);
}

#[test]
fn select_board_is_remembered() {
    let (mock, mut pb) = mock_board();
    assert_eq!(pb.selected_board(), None);

    pb.select_board(2).unwrap();
    assert_eq!(pb.selected_board(), Some(2));

    mock.set_code(EntryPoint::SelectBoard, -1);
    assert!(pb.select_board(5).is_err());
    assert_eq!(pb.selected_board(), Some(2));
}

#[test]
fn inst_returns_address() {
    let (mock, mut pb) = mock_board();
    pb.start_programming(ProgramTarget::PulseProgram).unwrap();
    let start = pb.inst("111111111111", Opcode::Continue, 0, 100.0 * US).unwrap();
    let branch = pb.inst("000000000000", Opcode::Branch, start, 100.0 * US).unwrap();
    pb.stop_programming().unwrap();
    assert_eq!((start, branch), (0, 1));

    let calls = mock.calls();
    assert_eq!(calls[0], call(EntryPoint::StartProgramming, CallArgs::Int(0)));
    match &calls[1].args {
        CallArgs::Inst(raw) => {
            assert_eq!(raw.flags, 0xFFF);
            assert_eq!(raw.inst, Opcode::Continue.code());
            assert_eq!(raw.length, 100000.0);
            assert_eq!((raw.freq0, raw.dds_en0, raw.freq1, raw.dds_en1), (0, 0, 0, 0));
        }
        other => panic!("unexpected args {:?}", other),
    }
    assert_eq!(*calls.last().unwrap(), call(EntryPoint::StopProgramming, CallArgs::None));

    mock.set_code(EntryPoint::InstDds2, 7);
    assert_eq!(pb.inst(0u32, Opcode::Stop, 0, 1.0).unwrap(), 7);
    mock.set_code(EntryPoint::InstDds2, -1);
    assert!(pb.inst(0u32, Opcode::Stop, 0, 1.0).is_err());
}

#[test]
fn inst_dds2_passes_register_selection() {
    let (mock, mut pb) = mock_board();
    let instr = DdsInstruction::new(
        DdsChannel::new(1, 2, 3, true, false),
        DdsChannel::new(4, 5, 6, false, true),
        Instruction::new(0b101u32, Opcode::Loop, 10, 50.0),
    );
    assert_eq!(pb.inst_dds2(&instr).unwrap(), 0);

    match &mock.calls()[0].args {
        CallArgs::Inst(raw) => {
            assert_eq!((raw.freq0, raw.phase0, raw.amp0), (1, 2, 3));
            assert_eq!((raw.dds_en0, raw.phase_reset0), (ANALOG_ON, NO_PHASE_RESET));
            assert_eq!((raw.freq1, raw.phase1, raw.amp1), (4, 5, 6));
            assert_eq!((raw.dds_en1, raw.phase_reset1), (ANALOG_OFF, PHASE_RESET));
            assert_eq!((raw.flags, raw.inst, raw.inst_data), (5, 2, 10));
        }
        other => panic!("unexpected args {:?}", other),
    }
}

#[test]
fn malformed_flags_never_reach_the_library() {
    let (mock, mut pb) = mock_board();
    let err = pb.inst("10x", Opcode::Continue, 0, 1.0).unwrap_err();
    assert!(matches!(err, SpinError::Flags(FlagsError::InvalidChar { ch: 'x', .. })));
    assert!(pb.write_default_flags("").is_err());
    assert!(!pb.is_loaded());
    assert!(mock.calls().is_empty());
}

#[test]
fn default_flags_register() {
    let (mock, mut pb) = mock_board();
    pb.write_default_flags("1011").unwrap();
    pb.write_default_flags(0xFFu32).unwrap();
    assert_eq!(
        mock.calls(),
        vec![
            call(EntryPoint::WriteRegister, CallArgs::Register(0x40008, 0b1101)),
            call(EntryPoint::WriteRegister, CallArgs::Register(0x40008, 0xFF)),
        ]
    );
}

#[test]
fn freq_and_phase_helpers() {
    let (mock, mut pb) = mock_board();
    assert_eq!(pb.program_freq_regs(&[10.0]).unwrap(), Registers::Single(0));
    assert_eq!(
        mock.calls(),
        vec![
            call(EntryPoint::StartProgramming, CallArgs::Int(1)),
            call(EntryPoint::SetFreq, CallArgs::Double(10.0)),
            call(EntryPoint::StopProgramming, CallArgs::None),
        ]
    );

    mock.clear_calls();
    let registers = pb.program_phase_regs(&[0.0, 90.0, 180.0]).unwrap();
    assert_eq!(registers, Registers::Many(vec![0, 1, 2]));
    assert_eq!(
        mock.calls(),
        vec![
            call(EntryPoint::StartProgramming, CallArgs::Int(2)),
            call(EntryPoint::SetPhase, CallArgs::Double(0.0)),
            call(EntryPoint::SetPhase, CallArgs::Double(90.0)),
            call(EntryPoint::SetPhase, CallArgs::Double(180.0)),
            call(EntryPoint::StopProgramming, CallArgs::None),
        ]
    );

    mock.clear_calls();
    assert_eq!(pb.program_phase_regs(&[45.0]).unwrap(), Registers::Single(0));
    assert_eq!(
        mock.calls(),
        vec![
            call(EntryPoint::StartProgramming, CallArgs::Int(2)),
            call(EntryPoint::SetPhase, CallArgs::Double(45.0)),
            call(EntryPoint::StopProgramming, CallArgs::None),
        ]
    );

    mock.clear_calls();
    assert_eq!(pb.program_freq_regs(&[]).unwrap(), Registers::Many(vec![]));
    assert_eq!(mock.count(EntryPoint::SetFreq), 0);
}

#[test]
fn amp_helper_skips_programming_mode() {
    let (mock, mut pb) = mock_board();
    assert_eq!(pb.program_amp_regs(&[0.5, 0.25]).unwrap(), Registers::Many(vec![0, 1]));
    assert_eq!(
        mock.calls(),
        vec![
            call(EntryPoint::SetAmp, CallArgs::Amp(0.5, 0)),
            call(EntryPoint::SetAmp, CallArgs::Amp(0.25, 1)),
        ]
    );
    assert_eq!(pb.program_amp_regs(&[1.0]).unwrap(), Registers::Single(0));
}

#[test]
fn helper_stops_at_first_failure() {
    let (mock, mut pb) = mock_board();
    mock.set_code(EntryPoint::SetFreq, -1);
    assert!(pb.program_freq_regs(&[1.0, 2.0]).is_err());
    assert_eq!(mock.count(EntryPoint::SetFreq), 1);
    assert_eq!(mock.count(EntryPoint::StopProgramming), 0);
}

#[test]
fn debug_mode_set_after_load() {
    let mock = MockSpinApi::new();
    let mut pb = PulseBlaster::new(MockLoader::new(mock.clone()).with_debug(true));
    pb.version().unwrap();
    pb.version().unwrap();
    assert_eq!(
        mock.calls(),
        vec![
            call(EntryPoint::SetDebug, CallArgs::Int(1)),
            call(EntryPoint::GetVersion, CallArgs::None),
            call(EntryPoint::GetVersion, CallArgs::None),
        ]
    );
}

#[test]
fn failing_debug_call_keeps_library() {
    let mock = MockSpinApi::new();
    mock.remove_symbol(EntryPoint::SetDebug);
    let mut pb = PulseBlaster::new(MockLoader::new(mock.clone()).with_debug(true));
    pb.init().unwrap();
    pb.start().unwrap();
    assert!(pb.is_loaded());
    assert_eq!(pb.loader().load_count(), 1);
    assert_eq!(
        mock.entries(),
        vec![EntryPoint::SetDebug, EntryPoint::Init, EntryPoint::Start]
    );
}

#[test]
fn queries() {
    let (mock, mut pb) = mock_board();
    mock.set_version("20230101");
    mock.set_status_word(0b0100);
    assert_eq!(pb.version().unwrap(), "20230101");
    assert_eq!(pb.firmware_id().unwrap(), 0x0E01);

    let status = pb.read_status().unwrap();
    assert!(status.running);
    assert!(!status.stopped);

    mock.push_status_messages(["Board is running.\n"]);
    assert_eq!(pb.status_message().unwrap(), "Board is running.\n");
    assert_eq!(pb.status_message().unwrap(), "Board is running.\n");

    mock.set_error_message("last error");
    assert_eq!(pb.get_error().unwrap(), "last error");
}
