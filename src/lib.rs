pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod profiles;
pub mod provisioning;
pub mod records;
pub mod server;

// Test-only printing helper: expands to eprintln! during tests and is absent otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
