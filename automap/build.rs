//! Generates mappers for the bundled orders schema, used by the
//! integration tests.

use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let schema = Path::new("schemas/orders.xml");
    println!("cargo:rerun-if-changed={}", schema.display());

    let code = automap_codegen::generate_from_file(schema)?;
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    std::fs::write(out_dir.join("orders_mappers.rs"), code)?;
    Ok(())
}
