//! Macros for building and returning [`crate::error::ScalingError`] values.

/// Creates a [`crate::error::ScalingError`] from an error kind, a static description and
/// an optional detail.
#[macro_export]
macro_rules! scaling_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::ScalingError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::ScalingError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Returns early from the current function with a [`crate::error::ScalingError`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::scaling_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::scaling_error!($kind, $desc, $detail))
    };
}
