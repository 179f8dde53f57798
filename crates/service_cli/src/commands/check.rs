//! Check command implementation
//!
//! Reports the machine's parallelism and the resolved configuration.

use std::fmt::Write as _;

use crate::config::AppConfig;
use crate::Result;

/// Renders the thread counts and `config` as TOML.
pub fn run(config: &AppConfig) -> Result<String> {
    let resolved = toml::to_string(config).map_err(std::io::Error::other)?;
    let sim = config.simulation_config()?;

    let mut out = String::new();
    let _ = writeln!(out, "scriptmc {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "logical cpus:   {}", num_cpus::get());
    let _ = writeln!(out, "physical cpus:  {}", num_cpus::get_physical());
    let _ = writeln!(out, "rayon threads:  {}", rayon::current_num_threads());
    let _ = writeln!(out, "workers:        {}", sim.effective_threads());
    let _ = writeln!(
        out,
        "batch size:     {}",
        sim.effective_batch_size(sim.effective_threads())
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "# resolved configuration");
    out.push_str(&resolved);
    Ok(out)
}
