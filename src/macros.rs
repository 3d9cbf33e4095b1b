// src/macros.rs
#[macro_export]
macro_rules! s {
    // String shorthand!

    // Zero-arg → String::new()
    () => {
        ::std::string::String::new()
    };
    // Any single expression: literals, consts or vars
    ($expr:expr) => {
        ::std::string::String::from($expr)
    };
}

#[macro_export]
macro_rules! join {
    // String-type concatenation shorthand!
    ($first:expr $(, $rest:expr)+ $(,)?) => {{
        let mut s = ::std::string::String::from($first);
        $(
            s.push_str($rest);
        )+
        s
    }};
}

/// Label table shorthand: `"CANON" => ["src", "Source Label", ...]`.
/// A `drop` entry lists source labels that are derived elsewhere and skipped.
#[macro_export]
macro_rules! label_rules {
    (
        $( $canon:literal => [ $( $src:literal ),+ $(,)? ] ),* $(,)?
        ; drop [ $( $dropped:literal ),* $(,)? ]
    ) => {
        &[
            $( $( ($src, ::std::option::Option::Some($canon)), )+ )*
            $( ($dropped, ::std::option::Option::None), )*
        ]
    };
}
