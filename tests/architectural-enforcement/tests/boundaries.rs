//! Workspace-wide architectural rules

use architectural_enforcement::{assert_clean, find_violations};

const CORE: &str = "chatsync/core/src";
const CLI: &str = "chatsync/cli/src";

#[test]
fn no_blocking_sleep_in_production_code() {
    for dir in [CORE, CLI] {
        let found = find_violations(dir, &["thread::sleep", "std::thread::sleep"], &[]);
        assert_clean("Blocking sleep in async code (use tokio::time)", &found);
    }
}

#[test]
fn filesystem_access_stays_in_store_and_config() {
    let found = find_violations(
        CORE,
        &["std::fs", "fs::", "File::"],
        &["chatsync/core/src/store/", "chatsync/core/src/config.rs"],
    );
    assert_clean(
        "Filesystem access outside the persistence boundary",
        &found,
    );
}

#[test]
fn core_does_not_unwrap() {
    let found = find_violations(CORE, &[".unwrap()", ".expect("], &[]);
    assert_clean("unwrap/expect in core production code", &found);
}

#[test]
fn core_does_not_print() {
    let found = find_violations(CORE, &["println!", "eprintln!", "print!("], &[]);
    assert_clean("Core writes to the terminal (use tracing)", &found);
}

#[test]
fn engine_state_is_not_locked() {
    let found = find_violations(CORE, &["Mutex<", "RwLock<"], &[]);
    assert_clean("Shared locks in core (the engine is single-task)", &found);
}
