//! Build script which collects information about the program build for the metadata file.
fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");
}
