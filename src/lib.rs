//! Waits for a process to start, then suspends and resumes it from a hotkey,
//! either as a toggle (latch) or for as long as the key is held.

pub mod services;
