/// Build-time identity of the crate, used in diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    pub crate_name: &'static str,
    pub crate_version: &'static str,
}

pub const CONSTANTS: Constants = Constants {
    crate_name: env!("CARGO_PKG_NAME"),
    crate_version: env!("CARGO_PKG_VERSION"),
};
