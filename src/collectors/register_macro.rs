macro_rules! register_collectors {
    (
        $(
            $module:ident => $collector_type:ident : $default_enabled:literal
        ),* $(,)?
    ) => {
        // Import all collector modules
        $(
            pub mod $module;
            pub use $module::$collector_type;
        )*

        /// Register every built-in collector, in declaration order.
        ///
        /// # Errors
        ///
        /// Returns an error if a name is invalid or already registered.
        pub fn register_builtin(
            registry: &mut $crate::collectors::registry::CollectorRegistry,
        ) -> Result<(), $crate::collectors::error::CollectorError> {
            $(
                registry.register(
                    stringify!($module),
                    |config| Ok(std::sync::Arc::new($collector_type::new(config)) as std::sync::Arc<dyn Collector>),
                    $default_enabled,
                )?;
            )*
            Ok(())
        }

        // Generate array of collector names
        pub const COLLECTOR_NAMES: &[&'static str] = &[
            $(stringify!($module),)*
        ];

        /// Built-in collector names with their default-enabled flag.
        pub const COLLECTORS: &[(&'static str, bool)] = &[
            $((stringify!($module), $default_enabled),)*
        ];
    };
}
