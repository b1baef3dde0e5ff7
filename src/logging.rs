//! Log targets and the small macros the loaders report through.
//!
//! Everything goes through the `log` facade. Messages are split by target so
//! that a host can, for instance, silence parse tracing while keeping
//! malformed-SWF reports: `RUST_LOG=swf::malformed=warn`.

/// Per-tag parse tracing.
pub const PARSE: &str = "swf::parse";
/// Reports about input that breaks the SWF format but can be recovered from.
pub const MALFORMED: &str = "swf::malformed";
/// Features that are recognised but not supported.
pub const UNIMPLEMENTED: &str = "swf::unimplemented";

macro_rules! parse_trace {
    ($($arg:tt)+) => {
        log::trace!(target: $crate::logging::PARSE, $($arg)+)
    };
}

macro_rules! malformed {
    ($($arg:tt)+) => {
        log::warn!(target: $crate::logging::MALFORMED, $($arg)+)
    };
}

// Only the first call site hit in the process logs; later ones are dropped.
macro_rules! unimplemented_once {
    ($($arg:tt)+) => {{
        static ONCE: ::std::sync::Once = ::std::sync::Once::new();
        ONCE.call_once(|| log::info!(target: $crate::logging::UNIMPLEMENTED, $($arg)+));
    }};
}
