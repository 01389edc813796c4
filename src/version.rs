/// Global rearrange version number
///
/// All client code should refer directly to this copy instead of using various possibly conflicting environment variables
pub const REARRANGE_VERSION: &str = env!("CARGO_PKG_VERSION");
