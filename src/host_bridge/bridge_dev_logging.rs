// MEMORY MARSHALLING LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_bridge")]
macro_rules! bridge_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_bridge"))]
macro_rules! bridge_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// HANDLE TABLE LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_handles")]
macro_rules! handle_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_handles"))]
macro_rules! handle_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// HOST CALLBACK LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_host_calls")]
macro_rules! host_call_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_host_calls"))]
macro_rules! host_call_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// Extra timer logging
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        saying::say!($msg, Green #$time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        // Nothing
    };
}
