pub mod check;
pub mod exports;
pub mod label;
pub mod records;
pub mod run;

pub use check::handle_check_command;
pub use exports::handle_exports_command;
pub use label::handle_label_command;
pub use records::handle_records_command;
pub use run::handle_run_command;
