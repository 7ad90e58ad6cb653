//! FFI provenance API for binding-facing calls.
//!
//! # Responsibility
//! - Expose the DPAPI operation set to foreign callers via FRB.
//! - Own the process-wide kernel instance.
//! - Translate `KernelError` into stable negative status codes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Handle-returning calls return `>= 0` on success, a negative code otherwise.
//! - Void calls never fail visibly; errors are logged at `warn` and dropped.
//!
//! # See also
//! - `dpapi_core::kernel::error` for the code table.

use dpapi_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CreateNodeOptions, Handle, Kernel, KernelConfig, KernelError, KernelResult, VersionSelector,
    XRefOptions,
};
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use uuid::Uuid;

static KERNEL: OnceCell<Kernel> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Brings up the process-wide kernel from `DPAPI_*` environment settings.
///
/// # FFI contract
/// - Idempotent: later calls return `0` without rereading the environment.
/// - Returns `0` on success or `INIT_FAILURE` (`-1`).
#[flutter_rust_bridge::frb(sync)]
pub fn init() -> i32 {
    let result = KERNEL.get_or_try_init(|| {
        let config = KernelConfig::from_env()?;
        Kernel::new(config)
    });
    match result {
        Ok(_) => 0,
        Err(err) => {
            error!(
                "event=ffi_init module=ffi status=error code={} error={err}",
                err.code()
            );
            err.code()
        }
    }
}

/// Opens `name` and returns a file handle bound to its provenance node.
#[flutter_rust_bridge::frb(sync)]
pub fn open_file(name: String, for_writing: bool) -> i32 {
    handle_or_code(
        "open_file",
        with_kernel(|kernel| kernel.open_file(&name, for_writing)),
    )
}

/// Releases a file or node handle.
#[flutter_rust_bridge::frb(sync)]
pub fn close_handle(fd: i32) {
    log_ignored(
        "close_handle",
        with_kernel(|kernel| kernel.close_handle(Handle::from_raw(fd))),
    );
}

/// Creates a phony node, optionally adjacent to another handle.
#[flutter_rust_bridge::frb(sync)]
pub fn create_node(adjacent: Option<i32>) -> i32 {
    let options = CreateNodeOptions {
        adjacent: adjacent.map(Handle::from_raw),
    };
    handle_or_code(
        "create_node",
        with_kernel(|kernel| kernel.create_node(options)),
    )
}

/// Freezes the current version of `fd`.
#[flutter_rust_bridge::frb(sync)]
pub fn freeze(fd: i32) {
    log_ignored(
        "freeze",
        with_kernel(|kernel| kernel.freeze(Handle::from_raw(fd))),
    );
}

/// Appends `fd --key--> xref`, pinned to `version` or the target's latest.
#[flutter_rust_bridge::frb(sync)]
pub fn add_xref(fd: i32, key: String, xref: i32, version: Option<u32>) {
    let options = XRefOptions {
        version: VersionSelector::from(version),
    };
    log_ignored(
        "add_xref",
        with_kernel(|kernel| {
            kernel.add_xref(
                Handle::from_raw(fd),
                &key,
                Handle::from_raw(xref),
                options,
            )
        }),
    );
}

/// Appends a string annotation under `key`.
#[flutter_rust_bridge::frb(sync)]
pub fn add_str(fd: i32, key: String, value: String) {
    log_ignored(
        "add_str",
        with_kernel(|kernel| kernel.add_str(Handle::from_raw(fd), &key, &value)),
    );
}

/// Returns the stable node id behind `fd`, or an empty string.
#[flutter_rust_bridge::frb(sync)]
pub fn node_id(fd: i32) -> String {
    match with_kernel(|kernel| kernel.node_info(Handle::from_raw(fd))) {
        Ok(info) => info.node.to_string(),
        Err(err) => {
            warn!(
                "event=ffi_call module=ffi status=error call=node_id code={}",
                err.code()
            );
            String::new()
        }
    }
}

/// Writes the node behind `fd` to the configured database.
///
/// Returns `0` or a negative code (`STORAGE` when no database is set).
#[flutter_rust_bridge::frb(sync)]
pub fn sync_node(fd: i32) -> i32 {
    match with_kernel(|kernel| kernel.sync(Handle::from_raw(fd))) {
        Ok(()) => 0,
        Err(err) => report("sync_node", &err),
    }
}

/// Returns a new handle for a known node id.
///
/// Unparseable ids fail like unknown nodes.
#[flutter_rust_bridge::frb(sync)]
pub fn revive_node(node_id: String, version: Option<u32>) -> i32 {
    let Ok(node) = Uuid::parse_str(node_id.trim()) else {
        warn!("event=ffi_call module=ffi status=error call=revive_node reason=bad_node_id");
        return KernelError::NodeNotFound(Uuid::nil()).code();
    };
    handle_or_code(
        "revive_node",
        with_kernel(|kernel| kernel.revive(node, VersionSelector::from(version))),
    )
}

/// Returns the recorded provtrace, or an empty string when tracing is off.
#[flutter_rust_bridge::frb(sync)]
pub fn export_trace() -> String {
    KERNEL
        .get()
        .and_then(Kernel::trace_text)
        .unwrap_or_default()
}

fn with_kernel<T>(f: impl FnOnce(&Kernel) -> KernelResult<T>) -> KernelResult<T> {
    let kernel = KERNEL
        .get()
        .ok_or_else(|| KernelError::InitFailure("kernel is not initialized".to_string()))?;
    f(kernel)
}

fn handle_or_code(call: &'static str, result: KernelResult<Handle>) -> i32 {
    match result {
        Ok(handle) => {
            info!(
                "event=ffi_call module=ffi status=ok call={call} handle={}",
                handle.raw()
            );
            handle.raw()
        }
        Err(err) => report(call, &err),
    }
}

fn report(call: &'static str, err: &KernelError) -> i32 {
    warn!(
        "event=ffi_call module=ffi status=error call={call} code={} kind={}",
        err.code(),
        err.label()
    );
    err.code()
}

fn log_ignored<T>(call: &'static str, result: KernelResult<T>) {
    if let Err(err) = result {
        report(call, &err);
    }
}
