#![allow(unused_macros)]

// Levels map one to one onto the defmt macros of the same name.
#[cfg(feature = "defmt-logging")]
macro_rules! dali_log {
    ($level:ident, $($arg:expr),*) => { defmt::$level!($($arg),*) };
}

#[cfg(not(feature = "defmt-logging"))]
macro_rules! dali_log {
    ($level:ident, $($arg:expr),*) => {{ $( let _ = &$arg; )* }};
}

macro_rules! dali_trace { ($($arg:expr),*) => { dali_log!(trace, $($arg),*) }; }
macro_rules! dali_debug { ($($arg:expr),*) => { dali_log!(debug, $($arg),*) }; }
macro_rules! dali_info { ($($arg:expr),*) => { dali_log!(info, $($arg),*) }; }
macro_rules! dali_warn { ($($arg:expr),*) => { dali_log!(warn, $($arg),*) }; }
macro_rules! dali_error { ($($arg:expr),*) => { dali_log!(error, $($arg),*) }; }
