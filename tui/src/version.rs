/// The chatline version.
///
/// Defaults to the workspace Cargo package version; release builds may inject a tag version via
/// the `CHATLINE_VERSION` environment variable.
pub const CHATLINE_VERSION: &str = match option_env!("CHATLINE_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
