use crate::plan::BarrierSelector;
use crate::util::constants::{DEFAULT_LOG_BYTES_IN_CARD, MAX_LOG_BYTES_IN_CARD, MIN_LOG_BYTES_IN_CARD};
use std::default::Default;

/// The prefix of environment variables that override option defaults,
/// e.g. `CARDMARK_LOG_BYTES_IN_CARD=10`.
pub const ENV_VAR_PREFIX: &str = "CARDMARK_";

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($(#[$outer])* $name: $type[$validator] = $default),*);
    ];
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        /// Options of the card-marking barrier. Each option has a type, a validator and a default.
        /// Defaults may be overridden by environment variables (see [`ENV_VAR_PREFIX`]) and then by
        /// [`Options::set_from_str`].
        #[derive(Clone, Debug)]
        pub struct Options {
            $($(#[$outer])* pub $name: $type),*
        }
        impl Options {
            /// Set an option by its snake_case name. Returns false if the name is unknown, or the
            /// value cannot be parsed or fails validation. The old value is kept in that case.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling set_option()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Can't parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => {
                        warn!("Unknown option {}", s);
                        false
                    }
                }
            }

            /// The defaults of all options, without looking at environment variables.
            pub fn without_env() -> Self {
                Options {
                    $($name: $default),*
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Self::without_env();

                // If we have env vars that start with CARDMARK_ and match any option (such as CARDMARK_LOG_BYTES_IN_CARD),
                // we set the option to its value (if it is a valid value). Otherwise, use the default value.
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(ENV_VAR_PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { options.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
                options
            }
        }
    ]
}

options! {
    /// Which barrier to install. This is decided once when the barrier set is built.
    barrier:                   BarrierSelector [always_valid] = BarrierSelector::CardTableBarrier,
    /// log2 of the card size in bytes.
    log_bytes_in_card:         u8              [|v: &u8| (MIN_LOG_BYTES_IN_CARD..=MAX_LOG_BYTES_IN_CARD).contains(v)] = DEFAULT_LOG_BYTES_IN_CARD,
    /// Allow the code generator to elide the initializing store barriers of newly allocated
    /// objects, and defer their card marks to the next safepoint or thread detach.
    reduce_initial_card_marks: bool            [always_valid] = true,
    /// Does the collector scan cards while mutators run? If so, card marks must be strictly
    /// ordered after the stores they record.
    concurrent_card_scanning:  bool            [always_valid] = false,
}
