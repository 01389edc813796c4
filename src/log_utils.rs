pub use log::debug;

/// Print log message for either of two debug scenarios:
/// (1) The global debug log level has been activated
/// (2) The user asked for verbose progress messages
///
/// The local verbose flag is given as the first argument, and determines whether the message is directly printed to stderr.
///
/// # Examples
///
/// ```
/// debug_msg!(false, "At phase foo {}", x); // prints debug log msg only if global --debug flag is given
/// debug_msg!(true, "At phase foo {}", x); // prints directly to stderr
/// ```
macro_rules! debug_msg {
    ($flag:expr, $($arg:tt)+) => {
        if $flag {
            eprintln!($($arg)+);
        } else {
            $crate::log_utils::debug!($($arg)+);
        }
    }
}

pub(crate) use debug_msg;
