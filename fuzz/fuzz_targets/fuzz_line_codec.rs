#![no_main]
use hmi_core::{ControllerModel, LineCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|chunks: Vec<Vec<u8>>| {
    // Arbitrary bytes in arbitrary read sizes must never panic or grow the
    // pending line past its capacity.
    let mut codec = LineCodec::default();
    let mut model = ControllerModel::default();
    for chunk in &chunks {
        let _ = codec.receive(chunk, &mut model);
        assert!(codec.line_buffer().pending() < hmi_core::codec::LINE_CAPACITY);
    }
    assert!(model.mould.name.len() <= hmi_core::params::NAME_MAX);
    assert!(model.status.state_name.len() <= hmi_core::status::STATE_NAME_MAX);
    assert!(model.status.error_message.len() <= hmi_core::status::ERROR_MESSAGE_MAX);
});
