#![forbid(unsafe_code)]

fn main() {
    // Capture the compiler version so /env can report it at runtime.
    build_data::set_RUSTC_VERSION();

    // Tells cargo not to rebuild build.rs during debug builds when other files change.
    // This speeds up development builds.
    //build_data::no_debug_rebuilds();
}
