//! Command implementations.

pub mod account;
pub mod reading;

use astro_dozi_app::Notice;
use tokio::sync::broadcast;

/// Print the notices posted while a command ran.
pub fn print_notices(notices: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        #[allow(clippy::print_stdout)]
        {
            println!("* {notice}");
        }
    }
}
