pub mod capture;
pub mod controller;
pub mod phash;
pub mod window_watch;

pub use capture::{CapturedImage, CommandScreenshotSource, ScreenshotSource};
pub use controller::WindowWatchController;
pub use window_watch::{ActiveWindowDebouncer, ActiveWindowEvent, FingerprintVerdict};
