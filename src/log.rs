//! Logging utilities that behave correctly in async contexts.
//!
//! `println!`/`eprintln!` output from concurrent tokio tasks can interleave
//! or sit in a stdio buffer until the process exits. These macros flush
//! immediately so a request's log lines stay contiguous.

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stdout(), $($arg)*);
        let _ = std::io::stdout().flush();
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

/// Prints only when `debug_assertions` is set.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        {
            use std::io::Write;
            let _ = writeln!(std::io::stderr(), "[DEBUG] {}", format!($($arg)*));
            let _ = std::io::stderr().flush();
        }
    }};
}
