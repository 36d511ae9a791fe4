// SPDX-License-Identifier: MIT

/// Wires the driver's error layers together.
///
/// `top` lists the layers folded into the top-level error, `messages` the
/// layers (plus the top) that take a bare `&'static str` as `Other`, and
/// `nested` which mid layers wrap a lower one. Every listed layer also gets
/// a `Display` printing its message and then its cause chain.
#[macro_export]
macro_rules! e3_error_layers {
    (
        top => $top:ident { $($src:ty => $variant:ident),+ $(,)? },
        messages => [ $($msg:ident),* $(,)? ],
        nested => { $($low:ty => [ $($dst:ident :: $dv:ident),+ ]),* $(,)? } $(,)?
    ) => {
        $crate::__e3_wrap!{ $( $src => $top::$variant ),+ }
        $( $crate::__e3_wrap!{ $( $low => $dst::$dv ),+ } )*
        $crate::__e3_message!{ $top $(, $msg)* }
        $crate::__e3_chain_display!{ $top $(, $msg)* }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __e3_wrap {
    ($($src:ty => $dst:ident :: $variant:ident),+ $(,)?) => {
        $(
            impl From<$src> for $dst {
                #[inline]
                fn from(e: $src) -> Self { $dst::$variant(e) }
            }
        )+
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __e3_message {
    ($($t:ident),+ $(,)?) => {
        $(
            impl From<&'static str> for $t {
                #[inline]
                fn from(msg: &'static str) -> Self { $t::Other(msg) }
            }
        )+
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __e3_chain_display {
    ($($t:ident),+ $(,)?) => {
        $(
            impl ::core::fmt::Display for $t {
                fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                    f.write_str(self.msg())?;
                    let mut current = self.source();
                    while let Some(src) = current {
                        write!(f, "\n  caused by: {}", src.msg())?;
                        current = src.source();
                    }
                    Ok(())
                }
            }
        )+
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}
