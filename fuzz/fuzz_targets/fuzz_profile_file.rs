#![no_main]
use hmi_core::mocks::MemFs;
use hmi_core::{ProfileStore, StoreCfg};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: Vec<u8>| {
    // Any file contents load without panicking and stay within the limit.
    let fs = MemFs::new();
    fs.put_file("moulds.bin", data);
    let store = ProfileStore::new(fs, StoreCfg::default());
    let loaded = store.load();
    assert!(loaded.len() <= StoreCfg::default().max_profiles);
});
