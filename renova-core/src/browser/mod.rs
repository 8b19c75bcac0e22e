mod driver;
mod error;
mod session;

pub use driver::{CdpDriver, PortalDriver, RecordRaw};
pub use error::{BrowserError, BrowserResult};
pub use session::{BrowserLauncher, BrowserSession};
