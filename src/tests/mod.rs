//! Session-level tests that drive [`crate::app::App`] the way the run loop does.
