//! Registers the `sqlite-vec` extension as a SQLite auto-extension so every
//! connection opened afterwards can call `vec_distance_cosine`.

use rusqlite::Connection;
use std::sync::OnceLock;

/// Set to `0`, `false` or `off` to keep guideline KNN on the in-process path.
pub const AUTO_ENABLE_ENV: &str = "CAREMIND_SQLITE_VEC";

static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Register sqlite-vec once per process.
///
/// Registration only affects connections opened after this call returns.
///
/// # Errors
///
/// Returns a description when the extension is disabled through
/// [`AUTO_ENABLE_ENV`] or SQLite refuses the auto-extension.
pub fn register_auto_extension() -> Result<(), String> {
    if disabled_by_env(std::env::var(AUTO_ENABLE_ENV).ok().as_deref()) {
        return Err(format!("sqlite-vec disabled by {AUTO_ENABLE_ENV}"));
    }

    REGISTRATION.get_or_init(register_once).clone()
}

/// Report the sqlite-vec version visible on `conn`, if the extension is loaded.
#[must_use]
pub fn vec_version(conn: &Connection) -> Option<String> {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .ok()
}

fn disabled_by_env(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("0" | "false" | "off")
    )
}

fn register_once() -> Result<(), String> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(format!("sqlite3_auto_extension failed with rc={rc}"))
    }
}
