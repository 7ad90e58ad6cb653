//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `dpapi_core` linkage.
//! - Replay a fixed two-node scenario and print its provtrace.

use dpapi_core::model::keys::{KEY_INPUT, KEY_NAME, KEY_TYPE, TYPE_PROC};
use dpapi_core::{CreateNodeOptions, Kernel, KernelConfig, KernelError, XRefOptions};

fn main() -> Result<(), KernelError> {
    println!("dpapi_core ping={}", dpapi_core::ping());
    println!("dpapi_core version={}", dpapi_core::core_version());

    let kernel = Kernel::new(KernelConfig {
        trace: true,
        ..KernelConfig::from_env()?
    })?;

    let parent = kernel.create_node(CreateNodeOptions::default())?;
    let child = kernel.create_node(CreateNodeOptions::adjacent_to(parent))?;
    kernel.add_str(child, KEY_TYPE, TYPE_PROC)?;
    kernel.add_xref(child, KEY_INPUT, parent, XRefOptions::default())?;
    kernel.add_str(child, KEY_NAME, "smoke")?;
    kernel.freeze(child)?;

    print!("{}", kernel.trace_text().unwrap_or_default());
    Ok(())
}
