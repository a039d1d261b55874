// src/utils/log.rs

//! Banner helpers on top of the `log` facade.

const RULE_WIDTH: usize = 60;

/// Log a section header framed by rules.
pub fn header(title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    log::info!("{rule}");
    log::info!("{title}");
    log::info!("{rule}");
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {step_num}/{total}] {message}");
}

/// Log a progress counter for item-by-item loops.
pub fn progress(index: usize, total: usize, message: &str) {
    log::info!("[{index}/{total}] {message}");
}
