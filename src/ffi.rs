//! FFI bindings for Nagwatch
//!
//! This module provides C-compatible functions for driving a nag session from a host UI
//! (WebView bridge, native shell). All functions use C strings (null-terminated) and
//! return allocated memory that must be freed by the caller using `nagwatch_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::config::NagConfig;
use crate::error::NagError;
use crate::input::SessionInput;
use crate::progress::ProgressSnapshot;
use crate::session::NagSession;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to a NagSession
pub struct NagSessionHandle {
    session: NagSession,
}

/// Create a new session.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer to a newly allocated session that must be freed with
///   `nagwatch_session_free`.
/// - Returns NULL on error; call `nagwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_session_new(config_json: *const c_char) -> *mut NagSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(NagConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => NagConfig::from_json(&json),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    match config.and_then(|config| NagSession::new(config, Utc::now())) {
        Ok(session) => Box::into_raw(Box::new(NagSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `nagwatch_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_session_free(session: *mut NagSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Apply one `nagwatch.input.v1` record and return the resulting events as a JSON array.
///
/// # Safety
/// - `session` must be a valid pointer returned by `nagwatch_session_new`.
/// - `input_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nagwatch_free_string`.
/// - Returns NULL on error; call `nagwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_session_apply(
    session: *mut NagSessionHandle,
    input_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *session;

    let input_str = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<SessionInput>(&input_str)
        .map_err(NagError::from)
        .and_then(|input| handle.session.apply(input))
        .and_then(|events| {
            serde_json::to_string(&events).map_err(|e| NagError::EncodingError(e.to_string()))
        });

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save session progress to JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `nagwatch_session_new`.
/// - Returns a newly allocated string that must be freed with `nagwatch_free_string`.
/// - Returns NULL on error; call `nagwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_session_save_progress(
    session: *mut NagSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *session;

    match handle.session.save_progress(Utc::now()).to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load session progress from JSON. Malformed fields fall back to defaults.
///
/// # Safety
/// - `session` must be a valid pointer returned by `nagwatch_session_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `nagwatch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_session_load_progress(
    session: *mut NagSessionHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *session;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    let snapshot = ProgressSnapshot::from_json_lenient(&json_str);
    handle.session.restore_progress(snapshot, Utc::now());
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Nagwatch functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Nagwatch function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Nagwatch function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Nagwatch library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn nagwatch_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
