use crate::cli::Output;
use anyhow::Result;
use clap::Args;

#[derive(Args, Default)]
pub struct VersionArgs {}

pub async fn execute(_args: VersionArgs, output: &Output) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");

    if output.is_quiet() {
        output.result(version);
        return Ok(());
    }

    output.header(&format!("{name} v{version}"));
    output.key_value("Description:", env!("CARGO_PKG_DESCRIPTION"), false);

    output.category("Build Information");
    output.key_value("Rust edition:", "2024", false);
    output.key_value("Target:", std::env::consts::ARCH, false);
    output.key_value(
        "Profile:",
        if cfg!(debug_assertions) { "debug" } else { "release" },
        false,
    );
    output.key_value("CPU cores:", &num_cpus::get().to_string(), false);
    output.blank_line();
    Ok(())
}
