//! Quoting for commands evaluated by the *remote* shell.
//!
//! ssh hands its command argument to the login shell on the old server, so
//! paths embedded in it must be quoted there. Local processes are always
//! started from an argument vector and never need this.

/// Quote `value` as a single POSIX shell word.
///
/// The value is wrapped in single quotes and every embedded `'` becomes `'\''`.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}
