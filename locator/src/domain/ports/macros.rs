//! Declarative helper for port error enums.
//!
//! Each generated enum derives `thiserror::Error`, gets one snake_case
//! constructor per variant (fields accept `impl Into<T>`), and a
//! `kind()` accessor returning the variant name for structured log fields.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            #[doc = concat!("Construct the `", stringify!($variant), "` variant.")]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            #[doc = concat!("Construct the `", stringify!($variant), "` variant.")]
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };

    (@pattern $name:ident $variant:ident) => { $name::$variant };
    (@pattern $name:ident $variant:ident { $($field:ident : $ty:ty),* }) => {
        $name::$variant { .. }
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*

            /// Variant name, suitable for a structured log field.
            pub fn kind(&self) -> &'static str {
                match self {
                    $(
                        define_port_error!(@pattern $name $variant $( { $($field : $ty),* } )?) =>
                            stringify!($variant),
                    )*
                }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor and `kind()` coverage for generated port errors.
    use std::time::Duration;

    define_port_error! {
        pub enum SamplePortError {
            Offline => "source offline",
            Throttled { retry_after: Option<Duration> } => "throttled: {retry_after:?}",
            Refused { status: u16, message: String } => "refused ({status}): {message}",
        }
    }

    #[test]
    fn unit_variant_constructor_and_kind() {
        let err = SamplePortError::offline();
        assert_eq!(err.to_string(), "source offline");
        assert_eq!(err.kind(), "Offline");
    }

    #[test]
    fn option_fields_accept_bare_values() {
        let err = SamplePortError::throttled(Duration::from_secs(3));
        assert_eq!(
            err,
            SamplePortError::Throttled {
                retry_after: Some(Duration::from_secs(3))
            }
        );
        assert_eq!(err.kind(), "Throttled");
    }

    #[test]
    fn mixed_fields_render_in_message() {
        let err = SamplePortError::refused(403_u16, "forbidden");
        assert_eq!(err.to_string(), "refused (403): forbidden");
        assert_eq!(err.kind(), "Refused");
    }
}
