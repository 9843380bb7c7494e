// Terminal control surface for Homebrew services.
//
// The `app::engine` module holds the piece that matters: a single worker
// that drives `brew services`, parses its listing and publishes snapshots.
// Everything under `app` besides it is presentation.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
