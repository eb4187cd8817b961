use hmi_core::codec::{LINE_CAPACITY, format_mould};
use hmi_core::{
    ControllerModel, InboundCommand, LineCodec, MachineState, MockCommand, Query, Received,
    SafetyWhitelist, SendError,
};
use hmi_hardware::SimulatedLink;
use rstest::rstest;

fn feed(codec: &mut LineCodec, model: &mut ControllerModel, text: &str) -> Vec<Received> {
    codec.receive(text.as_bytes(), model)
}

#[test]
fn enc_sets_position() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    let r = feed(&mut codec, &mut model, "ENC|45.30\n");
    assert_eq!(r, [Received::Applied(InboundCommand::Enc)]);
    assert_eq!(model.status.position_turns, 45.30);
}

#[test]
fn mould_ok_populates_all_fifteen_fields() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    feed(
        &mut codec,
        &mut model,
        "MOULD_OK|Sample|10|5|50|2|2|40|2|5|100|100|100|100|2D|0.5\n",
    );
    let m = &model.mould;
    assert_eq!(m.name, "Sample");
    assert_eq!(
        m.motion_values(),
        [10.0, 5.0, 50.0, 2.0, 2.0, 40.0, 2.0, 5.0, 100.0, 100.0, 100.0, 100.0]
    );
    assert_eq!(m.mode, "2D");
    assert_eq!(m.inject_torque, 0.5);
}

#[test]
fn common_ok_parses_counts_and_floats() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    feed(
        &mut codec,
        &mut model,
        "common_ok|1.5|2.5|300|40|1|2|3|4|5|6|7|8|1234|-9\r\n",
    );
    let c = &model.common;
    assert_eq!(c.trap_accel, 1.5);
    assert_eq!(c.compress_torque, 2.5);
    assert_eq!(c.micro_interval_ms, 300);
    assert_eq!(c.micro_duration_ms, 40);
    assert_eq!(c.purge_up, 1.0);
    assert_eq!(c.release_current, 8.0);
    assert_eq!(c.contactor_cycles, 1234);
    // negative counters clamp to zero
    assert_eq!(c.contactor_limit, 0);
}

#[test]
fn missing_trailing_fields_keep_current_values() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    feed(
        &mut codec,
        &mut model,
        "MOULD_OK|Full|1|2|3|4|5|6|7|8|9|10|11|12|3D|0.7\n",
    );
    feed(&mut codec, &mut model, "MOULD_OK|Short|99\n");
    let m = &model.mould;
    assert_eq!(m.name, "Short");
    assert_eq!(m.fill_volume, 99.0);
    assert_eq!(m.fill_speed, 2.0);
    assert_eq!(m.mode, "3D");
    assert_eq!(m.inject_torque, 0.7);

    feed(&mut codec, &mut model, "ENC|12\nENC\n");
    assert_eq!(model.status.position_turns, 12.0);
}

#[test]
fn malformed_numbers_parse_to_zero() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    feed(&mut codec, &mut model, "TEMP|210\nTEMP|hot\n");
    assert_eq!(model.status.temperature_c, 0.0);
}

#[test]
fn error_line_sets_hex_code_and_bounded_message() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    let long = "x".repeat(100);
    feed(&mut codec, &mut model, &format!("ERROR|1F|{long}\n"));
    assert_eq!(model.status.error_code, 0x1F);
    assert_eq!(model.status.error_message.len(), 63);

    feed(&mut codec, &mut model, "ERROR|0|clear|with bar\n");
    assert_eq!(model.status.error_code, 0);
    assert_eq!(model.status.error_message, "clear|with bar");
}

#[rstest]
#[case("STATE|REFILL", MachineState::Refill, "REFILL")]
#[case("state|ready_to_inject", MachineState::ReadyToInject, "ready_to_inject")]
#[case("STATE|INJECTING", MachineState::Unknown, "INJECTING")]
fn state_lines_keep_raw_name_and_parsed_state(
    #[case] line: &str,
    #[case] state: MachineState,
    #[case] raw: &str,
) {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    feed(&mut codec, &mut model, &format!("{line}\n"));
    assert_eq!(model.status.state, state);
    assert_eq!(model.status.state_name, raw);
}

#[test]
fn unknown_commands_are_ignored() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    let before = model.clone();
    let r = feed(&mut codec, &mut model, "HELLO|world\nPING\n");
    assert_eq!(r, [Received::Ignored, Received::Ignored]);
    assert_eq!(model, before);
}

#[test]
fn mock_lines_on_the_link_are_ignored() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    let before = model.clone();
    let r = feed(
        &mut codec,
        &mut model,
        "MOCK|STATE|REFILL\nMOCK|POS|30.5\nMOCK|OFF\n",
    );
    assert_eq!(r, [Received::Ignored, Received::Ignored, Received::Ignored]);
    assert_eq!(model, before);
}

#[rstest]
#[case("MOCK|STATE|REFILL", Some(MockCommand::State("REFILL".into())))]
#[case("state| READY_TO_INJECT ", Some(MockCommand::State("READY_TO_INJECT".into())))]
#[case("POS|30.5", Some(MockCommand::Position(30.5)))]
#[case("mock|off", Some(MockCommand::Off))]
#[case("MOCK|BOGUS|1", None)]
#[case("MOCK|POS", None)]
#[case("", None)]
fn debug_mock_commands_parse(#[case] line: &str, #[case] expected: Option<MockCommand>) {
    assert_eq!(MockCommand::parse(line), expected);
}

#[test]
fn mould_name_is_trimmed() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    feed(
        &mut codec,
        &mut model,
        "MOULD_OK| Sample |10|5|50|2|2|40|2|5|100|100|100|100|2D|0.5\n",
    );
    assert_eq!(model.mould.name, "Sample");
}

#[test]
fn lines_split_across_reads_are_reassembled() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    assert!(feed(&mut codec, &mut model, "EN").is_empty());
    assert!(feed(&mut codec, &mut model, "C|7.2").is_empty());
    assert_eq!(feed(&mut codec, &mut model, "5\r").len(), 1);
    assert_eq!(model.status.position_turns, 7.25);
}

#[test]
fn longest_fitting_line_is_accepted() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    // 255 bytes total: "ENC|1" padded with spaces before the terminator
    let line = format!("ENC|1{}", " ".repeat(LINE_CAPACITY - 1 - 5));
    assert_eq!(line.len(), LINE_CAPACITY - 1);
    let r = feed(&mut codec, &mut model, &format!("{line}\n"));
    assert_eq!(r.len(), 1);
    assert_eq!(model.status.position_turns, 1.0);
    assert_eq!(codec.line_buffer().overflows(), 0);
}

#[test]
fn overflowing_line_is_discarded_entirely() {
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    let junk = format!("ENC|{}", "9".repeat(400));
    let r = feed(&mut codec, &mut model, &format!("{junk}\nENC|3\n"));
    assert_eq!(r, [Received::Applied(InboundCommand::Enc)]);
    assert_eq!(model.status.position_turns, 3.0);
    assert_eq!(codec.line_buffer().overflows(), 1);
}

#[test]
fn queries_are_always_sent() {
    let codec = LineCodec::default();
    let mut link = SimulatedLink::new();
    let probe = link.probe();
    for q in Query::ALL {
        codec.send_query(&mut link, q).unwrap();
    }
    assert_eq!(
        probe.sent(),
        ["QUERY_STATE", "QUERY_MOULD", "QUERY_COMMON", "QUERY_ERROR"]
    );
}

#[test]
fn mould_send_is_gated_by_state() {
    let mut codec = LineCodec::new(SafetyWhitelist::default());
    let mut model = ControllerModel::default();
    let mut link = SimulatedLink::new();
    let probe = link.probe();
    feed(
        &mut codec,
        &mut model,
        "MOULD_OK|Sample|10|5|50|2|2|40|2|5|100|100|100|100|2D|0.5\nSTATE|INJECTING\n",
    );

    let err = codec
        .send_mould(&mut link, &model.status, &model.mould)
        .expect_err("unsafe state must block the write");
    assert_eq!(
        err,
        SendError::UnsafeState {
            state: "INJECTING".into()
        }
    );
    assert!(probe.sent().is_empty());

    feed(&mut codec, &mut model, "STATE|purge_zero\n");
    codec
        .send_mould(&mut link, &model.status, &model.mould)
        .unwrap();
    assert_eq!(
        probe.last_sent().unwrap(),
        "MOULD|Sample|10.000|5.000|50.000|2.000|2.000|40.000|2.000|5.000|100.000|100.000|100.000|100.000|2D|0.500"
    );
    assert_eq!(probe.last_sent().unwrap(), format_mould(&model.mould));
}

#[test]
fn common_send_blocked_with_empty_state() {
    let codec = LineCodec::default();
    let model = ControllerModel::default();
    let mut link = SimulatedLink::new();
    let probe = link.probe();
    assert!(
        codec
            .send_common(&mut link, &model.status, &model.common)
            .is_err()
    );
    assert!(probe.sent().is_empty());
}

#[test]
fn link_failures_surface_as_send_errors() {
    let codec = LineCodec::default();
    let mut link = SimulatedLink::new();
    link.set_fail_writes(true);
    let err = codec.send_query(&mut link, Query::Mould).unwrap_err();
    assert!(matches!(err, SendError::Link(msg) if msg.contains("closed")));
}
