/// A suspension site inside a coroutine body.
///
/// Each site carries a resume-point code that is recorded when the body
/// suspends there and dispatched on when the coroutine is next resumed.
/// Codes must be distinct, strictly greater than the initial code (0), and
/// strictly less than the final code (`u16::MAX`).
///
/// Implementations are normally generated with [`suspend_points!`], which
/// numbers the sites `1..=COUNT` from the enum declaration order and rejects
/// declarations that would collide with the reserved codes at compile time.
///
/// [`suspend_points!`]: crate::suspend_points
pub trait SuspendPoint: Copy {
    /// Number of suspension sites in the body.
    const COUNT: u16;

    /// The resume-point code recorded when the body suspends at this site.
    fn code(self) -> u16;

    /// Decode a stored resume-point code back into its site.
    fn from_code(code: u16) -> Option<Self>
    where
        Self: Sized;
}

/// Declare the suspension points of a coroutine body.
///
/// Expands to a `#[repr(u16)]` enum with one variant per site and an
/// implementation of [`SuspendPoint`] that numbers the sites `1..=COUNT` in
/// declaration order. Duplicate sites are impossible by construction, and a
/// body with enough sites to reach the reserved final code fails to compile.
///
/// ```rust
/// use stackless_coro::suspend_points;
///
/// suspend_points! {
///     enum ParsePoint {
///         InWord,
///         AfterPunct,
///     }
/// }
/// ```
#[macro_export]
macro_rules! suspend_points {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u16)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )+
        }

        impl $crate::SuspendPoint for $name {
            const COUNT: u16 = {
                let mut count: u16 = 0;
                $(
                    let _ = stringify!($variant);
                    count += 1;
                )+
                count
            };

            fn code(self) -> u16 {
                self as u16 + 1
            }

            fn from_code(code: u16) -> Option<Self> {
                $(
                    if code == $name::$variant as u16 + 1 {
                        return Some($name::$variant);
                    }
                )+
                None
            }
        }

        // Keep every real code strictly below the reserved final code
        const _: () = assert!(<$name as $crate::SuspendPoint>::COUNT < u16::MAX);
    };
}
