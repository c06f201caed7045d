//! # igsms-browser
//!
//! Drives a local Chromium over the Chrome DevTools Protocol.
//!
//! ```text
//! ┌──────────────┐   HTTP /json/*   ┌──────────────────┐
//! │    igsms     │ ───────────────► │     Chromium     │
//! │ (this crate) │ ◄──────────────► │ persistent profile│
//! └──────────────┘  WebSocket CDP   └──────────────────┘
//! ```
//!
//! The browser is launched lazily on first use and keeps its profile
//! directory, so a login made once survives restarts.

pub mod cdp;
pub mod keys;
pub mod launcher;
pub mod page;
pub mod session;

pub use launcher::LaunchOptions;
pub use page::CdpPage;
pub use session::BrowserSession;
