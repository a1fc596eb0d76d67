//! SRS workbook access: locating the row of a day and stamping its status

pub mod locator;
pub mod updater;

pub use locator::locate;
pub use updater::update;
