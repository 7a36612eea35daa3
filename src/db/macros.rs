//! Macros for building parameters and dispatching over connections.

/// Build a [`Params`](crate::models::Params) map from `name => value` pairs.
///
/// Values go through `Value::from`, so integers, floats, strings and
/// `Option`s of those can be used directly.
///
/// ```
/// use item_store::params;
/// use item_store::models::Value;
///
/// let params = params! { "name" => "Widget", "price" => 9.99 };
/// assert_eq!(params.get("name"), Some(&Value::from("Widget")));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::models::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::models::Params::new();
        $(
            params.insert(
                ::std::string::String::from($name),
                $crate::models::Value::from($value),
            );
        )+
        params
    }};
}

/// Generate match arms over the `DbConnection` variants.
///
/// ```ignore
/// impl_connection_dispatch!(connection, {
///     Sqlite(c) => c.kind(),
///     MySql(c) => c.kind(),
///     DocumentStore(c) => c.kind(),
/// });
/// ```
#[macro_export]
macro_rules! impl_connection_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::connection::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_connection_dispatch;
