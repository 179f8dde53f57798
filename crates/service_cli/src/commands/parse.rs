//! Parse command implementation
//!
//! Builds a product file's product and dumps what the analysis produced.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::product_file::ProductFile;
use crate::Result;

/// Returns the variable table, the analysed events and the compiled stream
/// sizes of the product in `product_path`.
pub fn run(product_path: &Path) -> Result<String> {
    info!(product = %product_path.display(), "Parsing product");
    let product = ProductFile::load(product_path)?.build_product(true)?;

    let mut out = String::new();
    let _ = writeln!(out, "VARIABLES");
    for (i, name) in product.var_names().iter().enumerate() {
        let marker = if i == product.payoff_index() { " (payoff)" } else { "" };
        let _ = writeln!(out, "  [{}] {}{}", i, name, marker);
    }
    let _ = writeln!(out, "MAX NESTED IFS {}", product.max_nested_ifs());
    let _ = writeln!(out);
    out.push_str(&product.describe());
    let _ = writeln!(out);
    let _ = writeln!(out, "COMPILED");
    for (i, event) in product.compiled().iter().enumerate() {
        let _ = writeln!(
            out,
            "  event {}: {} words, {} constants, stack {}/{}",
            i,
            event.code().len(),
            event.constants().len(),
            event.max_stack(),
            event.max_bool_stack()
        );
    }
    Ok(out)
}
