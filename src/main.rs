#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use orbit_showcase::{ViewerConfig, flow};

    flow::init_logging();
    let config = match std::env::args().nth(1).as_deref() {
        Some("--single") => ViewerConfig::single("curiosity_rover"),
        _ => ViewerConfig::load_native()?,
    };
    flow::run(config)
}

// The browser build starts from `run_web` in the library.
#[cfg(target_arch = "wasm32")]
fn main() {}
