pub mod filesystem;
pub mod test_helpers;
