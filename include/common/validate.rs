/// Checks an input invariant, logging the failed condition and returning
/// `Err($error)` instead of panicking.
macro_rules! validate_input {
    (($condition:expr, $error:expr$(,)?)) => {{
        let condition = $condition;
        if !condition {
            log::error!(
                "Input validation check '{}' failed in {}:{}!",
                stringify!($condition),
                file!(),
                line!(),
            );
            Err($error)
        } else {
            Ok(())
        }
    }};
}

pub(crate) use validate_input;
