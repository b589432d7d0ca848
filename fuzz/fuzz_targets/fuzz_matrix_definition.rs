#![no_main]

//! Fuzz matrix definition loading.
//!
//! Arbitrary TOML must either be rejected with an error or yield a
//! definition that satisfies its own validation.

use std::path::Path;

use benchmatrix::config::MatrixConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 8192 {
        return;
    }

    if let Ok(config) = MatrixConfig::from_toml_str(input, Path::new("/fuzz")) {
        assert!(config.rounds >= 1);
        assert!(config.baseline_configuration().is_some());
        assert!(config.validate().is_ok());
        let _ = config.fingerprint();
    }
});
