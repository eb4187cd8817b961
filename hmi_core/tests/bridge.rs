use hmi_core::error::BuildError;
use hmi_core::mocks::MemFs;
use hmi_core::{
    Bridge, BridgeError, MachineState, MockCommand, MouldParams, ProfileError, ProfileStore,
    RefillOutcome, RunnerCfg, SendError, StoreCfg, StoreError,
};
use hmi_hardware::{LinkProbe, SimulatedLink};
use hmi_traits::clock::ManualClock;

const SAMPLE: &str = "MOULD_OK|Sample|10|5|50|2|2|40|2|5|100|100|100|100|2D|0.5";

fn bridge_with(link: SimulatedLink, fs: MemFs) -> (Bridge, LinkProbe) {
    let probe = link.probe();
    let bridge = Bridge::builder()
        .with_link(link)
        .with_storage(fs)
        .with_clock(ManualClock::new())
        .build()
        .unwrap();
    (bridge, probe)
}

#[test]
fn builder_reports_missing_pieces() {
    let err = Bridge::builder()
        .with_storage(MemFs::new())
        .try_build()
        .expect_err("link is required");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingLink) => {}
        other => panic!("expected MissingLink, got: {other:?}"),
    }

    let err = Bridge::builder()
        .with_link(SimulatedLink::new())
        .try_build()
        .expect_err("storage is required");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingStorage)
    ));
}

#[test]
fn builder_rejects_invalid_runtime_config() {
    let err = Bridge::builder()
        .with_link(SimulatedLink::new())
        .with_storage(MemFs::new())
        .with_runner(RunnerCfg {
            poll_hz: 0,
            ..RunnerCfg::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn start_sends_the_four_queries() {
    let (mut bridge, probe) = bridge_with(SimulatedLink::new(), MemFs::new());
    bridge.start().unwrap();
    assert_eq!(
        probe.sent(),
        ["QUERY_STATE", "QUERY_MOULD", "QUERY_COMMON", "QUERY_ERROR"]
    );
}

#[test]
fn scripted_session_mirrors_profile_and_tracks_material() {
    let link = SimulatedLink::from_script([
        "STATE|INIT_HOT_WAIT",
        SAMPLE,
        "ENC|300",
        "STATE|REFILL",
        "ENC|60.5",
        "STATE|READY_TO_INJECT",
        "ENC|70.5",
    ]);
    let (mut bridge, _probe) = bridge_with(link, MemFs::new());
    assert_eq!(bridge.book().profiles()[0].name, "Awaiting QUERY_MOULD");

    let mut refills = Vec::new();
    for _ in 0..7 {
        let s = bridge.tick().unwrap();
        assert_eq!(s.lines, 1);
        refills.extend(s.refill);
    }

    assert_eq!(bridge.book().profiles()[0].name, "Sample");
    assert_eq!(refills, [RefillOutcome::Pushed { volume: 300.0 }]);
    let snap = bridge.snapshot();
    assert_eq!(snap.blocks.len(), 1);
    assert_eq!(snap.total_volume, 290.0);
    assert_eq!(snap.status.state, MachineState::ReadyToInject);
    assert!(snap.safe_for_update);
    assert!(!snap.is_refilling);
    assert!((snap.plunger_volume - 47.97).abs() < 1e-3);
}

#[test]
fn mirrored_slot_tracks_renames_without_growing_the_list() {
    let link = SimulatedLink::from_script([
        SAMPLE,
        "MOULD_OK|Other|1|1|1|1|1|1|1|1|1|1|1|1|3D|2",
        "MOULD_OK|Other|9",
    ]);
    let (mut bridge, _) = bridge_with(link, MemFs::new());
    for _ in 0..3 {
        bridge.tick().unwrap();
    }
    let profiles = bridge.book().profiles();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].name, "Other");
    assert_eq!(profiles[0].fill_volume, 9.0);
    assert_eq!(profiles[0].mode, "3D");
}

#[test]
fn mock_override_drives_ledger_and_snapshot() {
    let (mut bridge, _) = bridge_with(SimulatedLink::new(), MemFs::new());
    bridge.apply_mock(MockCommand::State("REFILL".into()));
    bridge.apply_mock(MockCommand::Position(100.5));
    bridge.tick().unwrap();
    assert!(bridge.snapshot().mock_active);
    assert!(bridge.ledger().is_refilling());

    bridge.apply_mock(MockCommand::State("READY_TO_INJECT".into()));
    let s = bridge.tick().unwrap();
    assert_eq!(s.refill, Some(RefillOutcome::Pushed { volume: 260.0 }));
    // the real status never changed, so writes stay blocked
    assert!(!bridge.is_safe_for_update());

    bridge.apply_mock(MockCommand::Off);
    assert!(!bridge.snapshot().mock_active);
}

#[test]
fn mock_lines_on_the_link_do_not_override_status() {
    let link = SimulatedLink::from_script(["MOCK|STATE|REFILL", "MOCK|POS|100"]);
    let (mut bridge, _) = bridge_with(link, MemFs::new());
    bridge.tick().unwrap();
    bridge.tick().unwrap();
    assert!(!bridge.snapshot().mock_active);
    assert!(!bridge.ledger().is_refilling());
    assert_eq!(bridge.effective_status().state, MachineState::Unknown);
}

#[test]
fn profile_lifecycle_persists_each_change() {
    let fs = MemFs::new();
    let (mut bridge, _) = bridge_with(SimulatedLink::from_script([SAMPLE]), fs.clone());
    bridge.tick().unwrap();

    assert_eq!(bridge.create_profile().unwrap(), 1);
    assert_eq!(bridge.book().profiles()[1].name, "Local 2");
    let stored = ProfileStore::new(fs.clone(), StoreCfg::default()).load();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name, "Sample");

    bridge.select_profile(1).unwrap();
    let mut edited = bridge.book().selected_profile().unwrap().clone();
    edited.name = "Cup lid".into();
    edited.set_mode("3D");
    edited.inject_torque = 0.0;
    let err = bridge.update_selected_profile(edited.clone()).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Profile(ProfileError::TorqueTooLow)
    ));
    edited.inject_torque = 1.2;
    bridge.update_selected_profile(edited).unwrap();
    let stored = ProfileStore::new(fs.clone(), StoreCfg::default()).load();
    assert_eq!(stored[1].name, "Cup lid");
    assert_eq!(stored[1].mode, "3D");

    bridge.select_profile(0).unwrap();
    assert!(matches!(
        bridge.delete_selected_profile(),
        Err(BridgeError::Profile(ProfileError::MirrorSlot))
    ));
    bridge.select_profile(1).unwrap();
    let removed = bridge.delete_selected_profile().unwrap();
    assert_eq!(removed.name, "Cup lid");
    assert_eq!(bridge.book().selected(), None);
    assert_eq!(
        ProfileStore::new(fs, StoreCfg::default()).load().len(),
        1
    );
}

#[test]
fn stored_profiles_are_loaded_at_build() {
    let fs = MemFs::new();
    let mut store = ProfileStore::new(fs.clone(), StoreCfg::default());
    store
        .save(&[MouldParams::local(1), MouldParams::local(2)])
        .unwrap();
    let (bridge, _) = bridge_with(SimulatedLink::new(), fs);
    assert_eq!(bridge.snapshot().profiles, ["Local 1", "Local 2"]);
}

#[test]
fn save_failure_keeps_in_memory_change() {
    let fs = MemFs::new();
    let (mut bridge, _) = bridge_with(SimulatedLink::new(), fs.clone());
    fs.set_fail_create(true);
    let err = bridge.create_profile().unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Storage(StoreError::CreateTemp { .. })
    ));
    assert_eq!(bridge.book().len(), 2);
    assert!(fs.file_names().is_empty());
}

#[test]
fn profile_limit_is_enforced() {
    let (mut bridge, _) = bridge_with(SimulatedLink::new(), MemFs::new());
    for _ in 1..16 {
        bridge.create_profile().unwrap();
    }
    assert!(matches!(
        bridge.create_profile(),
        Err(BridgeError::Profile(ProfileError::LimitReached(16)))
    ));
}

#[test]
fn sending_the_selected_profile_respects_the_gate() {
    let link = SimulatedLink::from_script([SAMPLE, "STATE|INJECTING", "STATE|READY_TO_INJECT"]);
    let (mut bridge, probe) = bridge_with(link, MemFs::new());
    bridge.tick().unwrap();

    assert!(matches!(
        bridge.send_selected_mould(),
        Err(BridgeError::Profile(ProfileError::NoSelection))
    ));
    bridge.select_profile(0).unwrap();

    bridge.tick().unwrap();
    assert!(!bridge.book().can_send(bridge.is_safe_for_update()));
    assert!(matches!(
        bridge.send_selected_mould(),
        Err(BridgeError::Send(SendError::UnsafeState { .. }))
    ));
    assert!(probe.sent().is_empty());

    bridge.tick().unwrap();
    assert!(bridge.book().can_send(bridge.is_safe_for_update()));
    bridge.send_selected_mould().unwrap();
    assert!(probe.last_sent().unwrap().starts_with("MOULD|Sample|10.000|"));

    let common = bridge.model().common;
    bridge.send_common(&common).unwrap();
    assert!(probe.last_sent().unwrap().starts_with("COMMON|0.000|"));
}

#[test]
fn link_read_errors_propagate_from_tick() {
    struct Broken;
    impl hmi_traits::SerialLink for Broken {
        fn read_available(
            &mut self,
            _buf: &mut [u8],
        ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
            Err(Box::new(std::io::Error::other("read timeout")))
        }
        fn write_line(
            &mut self,
            _line: &str,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }
    let mut bridge = Bridge::builder()
        .with_link(Broken)
        .with_storage(MemFs::new())
        .build()
        .unwrap();
    let err = bridge.tick().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BridgeError>(),
        Some(BridgeError::Timeout)
    ));
}
